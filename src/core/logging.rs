//! Logging abstraction
//!
//! Provides the crate's unified logging macros. Every module logs through
//! `crate::log_info!` and friends instead of calling a backend directly, so the
//! backend can change in one place. The macros forward to `tracing`; the host
//! application decides where events go by installing a subscriber.
//!
//! ## Usage
//!
//! ```ignore
//! crate::log_info!("Link {} added", link_id);
//! crate::log_warn!("Logging disabled: {}", reason);
//! ```
//!
//! Tests can call `init_test_logging` to get output through the test harness.

/// Log informational message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        $crate::__tracing::info!($($arg)*);
    }};
}

/// Log warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        $crate::__tracing::warn!($($arg)*);
    }};
}

/// Log error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        $crate::__tracing::error!($($arg)*);
    }};
}

/// Log debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        $crate::__tracing::debug!($($arg)*);
    }};
}

/// Log trace message
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        $crate::__tracing::trace!($($arg)*);
    }};
}

/// Install a `tracing-subscriber` formatter that writes through the test harness.
///
/// Honors `RUST_LOG`. Safe to call from every test; only the first call installs.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
