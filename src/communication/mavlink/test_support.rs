//! Frame builders shared by the protocol unit tests

use std::io::Cursor;

use mavlink::common::{
    MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, HEARTBEAT_DATA, PING_DATA,
};
use mavlink::{MavHeader, MavlinkVersion};

/// Encode a MAVLink v2 frame
pub fn encode(system_id: u8, component_id: u8, sequence: u8, message: &MavMessage) -> Vec<u8> {
    encode_versioned(MavlinkVersion::V2, system_id, component_id, sequence, message)
}

/// Encode a MAVLink v1 frame
pub fn encode_v1(system_id: u8, component_id: u8, sequence: u8, message: &MavMessage) -> Vec<u8> {
    encode_versioned(MavlinkVersion::V1, system_id, component_id, sequence, message)
}

fn encode_versioned(
    version: MavlinkVersion,
    system_id: u8,
    component_id: u8,
    sequence: u8,
    message: &MavMessage,
) -> Vec<u8> {
    let header = MavHeader {
        system_id,
        component_id,
        sequence,
    };
    let mut buf = Cursor::new(Vec::with_capacity(280));
    mavlink::write_versioned_msg(&mut buf, version, header, message).unwrap();
    buf.into_inner()
}

/// Heartbeat from a PX4 quadrotor announcing `mavlink_version`
pub fn heartbeat(mavlink_version: u8) -> MavMessage {
    heartbeat_from(MavAutopilot::MAV_AUTOPILOT_PX4, mavlink_version)
}

pub fn heartbeat_from(autopilot: MavAutopilot, mavlink_version: u8) -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_QUADROTOR,
        autopilot,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_STANDBY,
        mavlink_version,
    })
}

/// A non-heartbeat message
pub fn ping(seq: u32) -> MavMessage {
    MavMessage::PING(PING_DATA {
        time_usec: 0,
        seq,
        target_system: 0,
        target_component: 0,
    })
}
