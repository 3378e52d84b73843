use std::collections::HashMap;

use mavlink::common::HEARTBEAT_DATA;
use parking_lot::RwLock;

use super::{VehicleHandle, VehicleRegistry};
use crate::communication::mavlink::transport::SharedLink;

/// Registry keeping vehicle handles in memory, keyed by system id.
///
/// Used when the host has no registry of its own, and by tests.
#[derive(Default)]
pub struct InMemoryVehicleRegistry {
    vehicles: RwLock<HashMap<u8, VehicleHandle>>,
}

impl InMemoryVehicleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// List all known system ids.
    pub fn list(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.vehicles.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.vehicles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.read().is_empty()
    }
}

impl VehicleRegistry for InMemoryVehicleRegistry {
    fn lookup(&self, system_id: u8) -> Option<VehicleHandle> {
        self.vehicles.read().get(&system_id).cloned()
    }

    fn create(
        &self,
        link: &SharedLink,
        system_id: u8,
        heartbeat: &HEARTBEAT_DATA,
    ) -> VehicleHandle {
        let handle = VehicleHandle::from_heartbeat(system_id, link.id(), heartbeat);
        crate::log_info!(
            "Vehicle {} ({}) discovered on {}",
            system_id,
            handle.family.name(),
            link.name()
        );
        self.vehicles
            .write()
            .entry(system_id)
            .or_insert(handle)
            .clone()
    }
}
