//! MAVLink Message Dispatcher
//!
//! Final stage of the receive pipeline: accounts for every admitted message in
//! the sequence tracker, reports loss ratios, then hands the message to
//! subscribers together with the link it arrived on.
//!
//! # Design Principles
//!
//! - Only admitted messages reach the dispatcher; the vehicle handle is proof
//!   the registry knows the sender
//! - Loss accounting happens before emission, so a `ReceiveLossChanged` event
//!   always precedes the message that triggered it
//! - Messages are shared with subscribers as `Arc<DecodedMessage>`

use std::sync::Arc;

use super::parser::DecodedMessage;
use super::sequence::{LossCounters, SequenceTracker};
use super::status_notifier::{ProtocolEvent, StatusNotifier};
use super::transport::LinkId;
use super::vehicle::VehicleHandle;

/// Dispatcher statistics for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Messages emitted to subscribers
    pub messages_dispatched: u64,
    /// Loss ratio reports emitted
    pub loss_reports: u64,
}

/// MAVLink message dispatcher
///
/// Owns the sequence table shared by all links.
#[derive(Debug, Default)]
pub struct MessageDispatcher {
    tracker: SequenceTracker,
    stats: DispatchStats,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for and emit an admitted message
    pub fn dispatch(
        &mut self,
        link: LinkId,
        vehicle: &VehicleHandle,
        message: DecodedMessage,
        notifier: &StatusNotifier,
    ) {
        debug_assert_eq!(vehicle.system_id, message.system_id());

        let observation =
            self.tracker
                .observe(message.system_id(), message.component_id(), message.sequence());

        if let Some(report) = observation.report {
            self.stats.loss_reports += 1;
            notifier.emit(ProtocolEvent::ReceiveLossChanged {
                system_id: report.system_id,
                loss_percent: report.loss_percent,
            });
        }

        self.stats.messages_dispatched += 1;
        notifier.emit(ProtocolEvent::MessageReceived {
            link,
            message: Arc::new(message),
        });
    }

    pub fn counters(&self) -> LossCounters {
        self.tracker.counters()
    }

    pub fn tracker(&self) -> &SequenceTracker {
        &self.tracker
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}
