//! MAVLink Link Abstraction
//!
//! This module defines the interface the protocol engine consumes from the
//! transport layer. Concrete links (serial ports, UDP and TCP sockets, log
//! replay) live in the host application; the engine only needs to identify a
//! link, ask whether it is connected, and hand it framed bytes.
//!
//! # Design Pattern
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │        MavlinkProtocol                │
//! │  (decoder, tracker, dispatcher, ...)  │
//! └──────────┬───────────────────────────┘
//!            │ push: receive_bytes(link, bytes)
//!            │ pull: link.write_bytes(frame)
//!            ▼
//! ┌──────────────────────────────────────┐
//! │      LinkRouter                       │
//! │  (links associated with protocol)     │
//! └──────────┬───────────────────────────┘
//!            │ Holds Arc<dyn LinkInterface>
//!            ▼
//! ┌─────────────────┬────────────────┬───────────────┐
//! │   Serial link   │    UDP link    │   TCP link    │
//! └─────────────────┴────────────────┴───────────────┘
//! ```
//!
//! Inbound bytes are pushed by the transport into
//! [`MavlinkProtocol::receive_bytes`](super::protocol::MavlinkProtocol::receive_bytes);
//! the engine never reads from a link.

use std::fmt;
use std::sync::Arc;

/// Link identity, owned by the transport layer (0-255)
///
/// Link id 0 is the default link: outbound headers on it are sent as built by
/// the application instead of being finalized for the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u8);

impl LinkId {
    /// The default link identity
    pub const DEFAULT: LinkId = LinkId(0);

    pub fn is_default(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Link({})", self.0)
    }
}

/// Interface for a connected MAVLink transport
///
/// Links are shared between the transport layer, the protocol engine and
/// message subscribers, so every method takes `&self`; implementations use
/// interior mutability for their write path.
///
/// # Implementation Guidelines
///
/// - `id()` must be stable for the lifetime of the link
/// - `write_bytes()` may write fewer bytes than given; the engine reports the count
/// - `write_bytes()` is only called while `is_connected()` returns `true`
pub trait LinkInterface: Send + Sync {
    /// Identity of this link
    fn id(&self) -> LinkId;

    /// Human-readable link name for log output
    fn name(&self) -> String {
        self.id().to_string()
    }

    /// Whether the link can currently carry bytes
    fn is_connected(&self) -> bool;

    /// Write framed bytes to the link
    ///
    /// # Returns
    ///
    /// - `Ok(n)` - Number of bytes accepted by the link
    /// - `Err(TransportError)` - I/O error or disconnection
    fn write_bytes(&self, bytes: &[u8]) -> Result<usize, TransportError>;
}

/// Shared handle to a link
pub type SharedLink = Arc<dyn LinkInterface>;

/// Transport error types
///
/// Categorizes transport failures for appropriate error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Generic I/O error
    ///
    /// Examples: driver error, socket send failure, buffer overflow
    #[error("I/O error")]
    IoError,

    /// Transport disconnected
    ///
    /// Examples: serial cable unplugged, TCP connection closed
    #[error("Transport disconnected")]
    Disconnected,
}

#[cfg(test)]
pub mod mock {
    //! Mock link implementation for testing
    //!
    //! Records every write and can simulate disconnection and write errors.

    use super::{LinkId, LinkInterface, TransportError};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Mock link for testing
    pub struct MockLink {
        id: LinkId,
        connected: AtomicBool,
        /// Every `write_bytes()` call, in order
        writes: Mutex<Vec<Vec<u8>>>,
        /// Error to return from write_bytes()
        write_error: Mutex<Option<TransportError>>,
    }

    impl MockLink {
        /// Create a new, connected mock link
        pub fn new(id: u8) -> Self {
            Self {
                id: LinkId(id),
                connected: AtomicBool::new(true),
                writes: Mutex::new(Vec::new()),
                write_error: Mutex::new(None),
            }
        }

        pub fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        pub fn set_write_error(&self, error: TransportError) {
            *self.write_error.lock() = Some(error);
        }

        /// Get every buffer written to the link
        pub fn written(&self) -> Vec<Vec<u8>> {
            self.writes.lock().clone()
        }
    }

    impl LinkInterface for MockLink {
        fn id(&self) -> LinkId {
            self.id
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn write_bytes(&self, bytes: &[u8]) -> Result<usize, TransportError> {
            if let Some(error) = *self.write_error.lock() {
                return Err(error);
            }
            self.writes.lock().push(bytes.to_vec());
            Ok(bytes.len())
        }
    }
}
