//! Vehicle Admission Bridge
//!
//! Resolves the sender of a decoded message to a vehicle handle, creating the
//! vehicle in the host registry on the first admissible heartbeat.
//!
//! # Ordering
//!
//! The registry's `create` call completes before this module returns the handle,
//! and the dispatcher only emits messages that carry a handle. No subscriber can
//! therefore see a message from a system the registry does not know yet.
//!
//! # Rules
//!
//! - Known system: return the registered handle
//! - Unknown system, heartbeat: run the version gate, warn on a system id equal
//!   to our own (advisory only), then create the vehicle
//! - Unknown system, any other message: drop; vehicles are only discovered via
//!   heartbeat

use super::parser::DecodedMessage;
use super::status_notifier::StatusNotifier;
use super::transport::SharedLink;
use super::vehicle::{VehicleHandle, VehicleRegistry};
use super::version_gate::{GateDecision, VersionGate};

/// Settings the admission decision depends on
#[derive(Debug, Clone, Copy)]
pub struct AdmissionContext {
    /// This ground station's system id
    pub local_system_id: u8,
    pub version_check_enabled: bool,
}

/// Why a message was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Non-heartbeat message from a system with no vehicle
    UnknownSender,
    /// Heartbeat refused by the version gate
    VersionMismatch,
}

/// Result of resolving a message's sender
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Vehicle already existed
    Known(VehicleHandle),
    /// Vehicle was created for this heartbeat
    Created(VehicleHandle),
    Dropped(DropReason),
}

impl Admission {
    /// Handle to dispatch with, if admitted
    pub fn handle(&self) -> Option<&VehicleHandle> {
        match self {
            Admission::Known(handle) | Admission::Created(handle) => Some(handle),
            Admission::Dropped(_) => None,
        }
    }
}

/// Admission bridge between decoded traffic and the vehicle registry
#[derive(Debug, Default)]
pub struct AdmissionBridge {
    gate: VersionGate,
}

impl AdmissionBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the vehicle for `message`, creating it if this is its first
    /// admissible heartbeat
    pub fn resolve_or_create(
        &mut self,
        registry: &dyn VehicleRegistry,
        link: &SharedLink,
        message: &DecodedMessage,
        ctx: AdmissionContext,
        notifier: &StatusNotifier,
    ) -> Admission {
        let system_id = message.system_id();
        if let Some(handle) = registry.lookup(system_id) {
            return Admission::Known(handle);
        }

        let Some(heartbeat) = message.heartbeat() else {
            crate::log_trace!(
                "Dropping message {} from unknown system {}",
                message.message_id,
                system_id
            );
            return Admission::Dropped(DropReason::UnknownSender);
        };

        if let GateDecision::Reject { warning } =
            self.gate.check(system_id, heartbeat, ctx.version_check_enabled)
        {
            if let Some(warning) = warning {
                notifier.send_warning(&warning.title, &warning.detail);
            }
            return Admission::Dropped(DropReason::VersionMismatch);
        }

        if system_id == ctx.local_system_id {
            notifier.send_warning(
                "SYSTEM ID CONFLICT!",
                &format!(
                    "Warning: A second system is using the same system id ({})",
                    ctx.local_system_id
                ),
            );
        }

        Admission::Created(registry.create(link, system_id, heartbeat))
    }

    pub fn version_gate(&self) -> &VersionGate {
        &self.gate
    }
}
