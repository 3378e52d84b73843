use std::path::PathBuf;

use crate::communication::mavlink::transport::{LinkId, TransportError};

/// Result type alias for protocol operations.
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Errors surfaced by the protocol engine's fallible operations.
///
/// The receive pipeline never returns these to the transport; failures there are
/// turned into status events. These errors come from setters, settings
/// persistence, the log sink and explicit sends.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid system id: {0} (must be 1-255)")]
    InvalidSystemId(u8),

    #[error("Invalid heartbeat rate: {0} Hz (must be > 0)")]
    InvalidHeartbeatRate(u32),

    #[error("Settings file error: {path}")]
    Settings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Settings format error: {0}")]
    SettingsFormat(#[from] serde_json::Error),

    #[error("Log file error: {path}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Short write to log: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Message serialization failed: {0}")]
    Serialization(String),

    #[error("{link}: {source}")]
    Transport {
        link: LinkId,
        #[source]
        source: TransportError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
