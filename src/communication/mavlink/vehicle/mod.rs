//! Vehicle registry interface
//!
//! The registry that owns logical vehicle objects belongs to the host
//! application. The protocol engine only looks vehicles up by system id and asks
//! for one to be created on the first valid heartbeat from an unknown system.
//!
//! Vehicle flavour is a closed set of [`VehicleFamily`] variants chosen by a pure
//! function of the heartbeat, so the registry can branch on it with a `match`.

mod registry;

pub use registry::InMemoryVehicleRegistry;

use mavlink::common::{MavAutopilot, MavType, HEARTBEAT_DATA};

use super::transport::{LinkId, SharedLink};

/// Autopilot family of a remote system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleFamily {
    Px4,
    ArduPilot,
    Slugs,
    Generic,
}

impl VehicleFamily {
    /// Select the family from the heartbeat's declared autopilot
    pub fn from_heartbeat(heartbeat: &HEARTBEAT_DATA) -> Self {
        match heartbeat.autopilot {
            MavAutopilot::MAV_AUTOPILOT_PX4 => VehicleFamily::Px4,
            MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA => VehicleFamily::ArduPilot,
            MavAutopilot::MAV_AUTOPILOT_SLUGS => VehicleFamily::Slugs,
            _ => VehicleFamily::Generic,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VehicleFamily::Px4 => "PX4",
            VehicleFamily::ArduPilot => "ArduPilot",
            VehicleFamily::Slugs => "SLUGS",
            VehicleFamily::Generic => "Generic",
        }
    }
}

/// Reference to the registry's representation of a remote system
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleHandle {
    pub system_id: u8,
    pub family: VehicleFamily,
    pub mav_type: MavType,
    /// Link the vehicle was discovered on
    pub link: LinkId,
}

impl VehicleHandle {
    /// Build the handle for a vehicle announced by `heartbeat`
    pub fn from_heartbeat(system_id: u8, link: LinkId, heartbeat: &HEARTBEAT_DATA) -> Self {
        Self {
            system_id,
            family: VehicleFamily::from_heartbeat(heartbeat),
            mav_type: heartbeat.mavtype,
            link,
        }
    }
}

/// Vehicle registry consumed by the admission bridge
pub trait VehicleRegistry: Send + Sync {
    /// Look up an existing vehicle
    fn lookup(&self, system_id: u8) -> Option<VehicleHandle>;

    /// Create a vehicle for a newly discovered system
    ///
    /// The returned handle is authoritative for dispatch.
    fn create(&self, link: &SharedLink, system_id: u8, heartbeat: &HEARTBEAT_DATA)
        -> VehicleHandle;
}
