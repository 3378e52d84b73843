//! Protocol Notification System
//!
//! Centralized event bus for everything the protocol engine reports to the rest
//! of the application: advisory status messages, settings changes, per-system
//! loss ratios, and the primary message-received event.
//!
//! # Architecture
//!
//! - **Broadcast channel**: every observer gets its own receiver via `subscribe()`
//! - **Severity API**: status messages carry a MAVLink `MavSeverity`, with one
//!   helper per severity the engine uses
//! - **Never blocks**: sending with no subscribers is not an error; slow
//!   subscribers lag and miss events instead of stalling the receive pipeline
//!
//! # Usage
//!
//! ```ignore
//! let mut events = protocol.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if let ProtocolEvent::MessageReceived { link, message } = event {
//!         // ...
//!     }
//! }
//! ```

use std::sync::Arc;

use mavlink::common::MavSeverity;
use tokio::sync::broadcast;

use super::parser::DecodedMessage;
use super::transport::LinkId;

/// Default event queue capacity per subscriber
pub const EVENT_CAPACITY: usize = 1024;

/// Events emitted by the protocol engine
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    /// Advisory, user-visible status message
    Status {
        severity: MavSeverity,
        title: String,
        detail: String,
    },
    HeartbeatChanged(bool),
    LoggingChanged(bool),
    VersionCheckChanged(bool),
    /// Loss ratio over the last reporting window
    ReceiveLossChanged { system_id: u8, loss_percent: f32 },
    /// A validated message from a known vehicle
    MessageReceived {
        link: LinkId,
        message: Arc<DecodedMessage>,
    },
}

/// StatusNotifier fans protocol events out to subscribers
#[derive(Clone)]
pub struct StatusNotifier {
    sender: broadcast::Sender<ProtocolEvent>,
}

impl StatusNotifier {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Emit an event
    pub fn emit(&self, event: ProtocolEvent) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    /// Send an ERROR severity status message
    ///
    /// Error messages report a failure that disabled a feature, e.g. logging.
    pub fn send_error(&self, title: &str, detail: &str) {
        crate::log_error!("{}: {}", title, detail);
        self.send_status(MavSeverity::MAV_SEVERITY_ERROR, title, detail);
    }

    /// Send a WARNING severity status message
    ///
    /// Warning messages report conditions the operator should know about but
    /// that do not stop processing, e.g. a system id conflict.
    pub fn send_warning(&self, title: &str, detail: &str) {
        crate::log_warn!("{}: {}", title, detail);
        self.send_status(MavSeverity::MAV_SEVERITY_WARNING, title, detail);
    }

    fn send_status(&self, severity: MavSeverity, title: &str, detail: &str) {
        self.emit(ProtocolEvent::Status {
            severity,
            title: title.to_string(),
            detail: detail.to_string(),
        });
    }
}

impl Default for StatusNotifier {
    fn default() -> Self {
        Self::new()
    }
}
