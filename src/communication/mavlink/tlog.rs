//! Telemetry Log Sink
//!
//! Appends every decoded frame to a packet log. Each record is an 8-byte
//! little-endian receive timestamp in microseconds followed by the raw frame,
//! start marker through checksum (and signature, if present). Records have no
//! separator; the frame's own length field delimits them.
//!
//! A record is handed to the sink in a single `write` call. If the sink accepts
//! fewer bytes than the record holds, or fails, the sink closes itself and the
//! caller is told so it can turn logging off. The receive pipeline keeps
//! running either way.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ProtocolError, Result};

/// File name of the default packet log
pub const DEFAULT_LOG_FILE_NAME: &str = "mavlink_gcs_packetlog.mavlink";

/// Size of the timestamp preceding each frame
pub const TIMESTAMP_LEN: usize = 8;

/// Destination of log records
pub type LogSink = Box<dyn Write + Send>;

/// Default packet log location: the user's home directory
///
/// Falls back to the current directory when no home is set.
pub fn default_log_path() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(DEFAULT_LOG_FILE_NAME)
}

/// Log sink statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStats {
    pub records_written: u64,
    pub bytes_written: u64,
}

/// Append-only telemetry log
#[derive(Default)]
pub struct TelemetryLog {
    path: Option<PathBuf>,
    sink: Option<LogSink>,
    stats: LogStats,
}

impl TelemetryLog {
    /// Closed log
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` in append mode, creating it if needed
    ///
    /// Any previously open sink is closed first.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        self.close();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ProtocolError::LogFile {
                path: path.to_path_buf(),
                source,
            })?;
        crate::log_info!("Packet log opened at {}", path.display());
        self.path = Some(path.to_path_buf());
        self.sink = Some(Box::new(file));
        Ok(())
    }

    /// Log into an arbitrary writer
    pub fn open_sink(&mut self, sink: LogSink) {
        self.close();
        self.sink = Some(sink);
    }

    /// Flush and close the sink
    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.flush() {
                crate::log_warn!("Packet log flush failed: {}", e);
            }
            crate::log_debug!("Packet log closed");
        }
        self.path = None;
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Path of the open log file, if the sink is a file
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn stats(&self) -> LogStats {
        self.stats
    }

    /// Append one record
    ///
    /// Does nothing while closed. On a short or failed write the sink is closed
    /// and the error returned.
    pub fn record(&mut self, frame: &[u8], timestamp_us: u64) -> Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };

        let mut record = Vec::with_capacity(TIMESTAMP_LEN + frame.len());
        record.extend_from_slice(&timestamp_us.to_le_bytes());
        record.extend_from_slice(frame);

        let result = match sink.write(&record) {
            Ok(written) if written == record.len() => {
                self.stats.records_written += 1;
                self.stats.bytes_written += written as u64;
                return Ok(());
            }
            Ok(written) => Err(ProtocolError::ShortWrite {
                written,
                expected: record.len(),
            }),
            Err(source) => Err(match self.path.clone() {
                Some(path) => ProtocolError::LogFile { path, source },
                None => ProtocolError::Io(source),
            }),
        };
        self.close();
        result
    }
}

impl Drop for TelemetryLog {
    fn drop(&mut self) {
        self.close();
    }
}
