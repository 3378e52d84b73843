//! MAVLink Protocol Parameter Definitions
//!
//! # Parameters
//!
//! - `GCS_SYSTEM_ID` - Local system id (1-255, default 255)
//! - `HEARTBEAT_RATE` - Heartbeat rate in Hz (> 0, default 1)
//! - `HEARTBEATS_ENABLED` - Send periodic heartbeats (default false)
//! - `LOGGING_ENABLED` - Write the packet log (default false)
//! - `VERSION_CHECK_ENABLED` - Refuse systems with another protocol version
//!   (default true)
//! - `LOGFILE_NAME` - Packet log path; empty selects the default location
//!
//! Values of the wrong type or outside their range are replaced by the
//! default when loaded.

use std::path::PathBuf;

use super::storage::{ParamValue, ParameterStore};
use crate::error::{ProtocolError, Result};

/// Settings group holding the protocol parameters
pub const GROUP: &str = "MAVLINK_PROTOCOL";

pub const DEFAULT_SYSTEM_ID: u8 = 255;
pub const DEFAULT_HEARTBEAT_RATE_HZ: u32 = 1;

const SYSTEM_ID: &str = "GCS_SYSTEM_ID";
const HEARTBEAT_RATE: &str = "HEARTBEAT_RATE";
const HEARTBEATS_ENABLED: &str = "HEARTBEATS_ENABLED";
const LOGGING_ENABLED: &str = "LOGGING_ENABLED";
const VERSION_CHECK_ENABLED: &str = "VERSION_CHECK_ENABLED";
const LOGFILE_NAME: &str = "LOGFILE_NAME";

/// Protocol parameters loaded from parameter store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolParams {
    pub system_id: u8,
    pub heartbeat_rate_hz: u32,
    pub heartbeats_enabled: bool,
    pub logging_enabled: bool,
    pub version_check_enabled: bool,
    /// Packet log path; `None` selects the default location
    pub log_file: Option<PathBuf>,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            system_id: DEFAULT_SYSTEM_ID,
            heartbeat_rate_hz: DEFAULT_HEARTBEAT_RATE_HZ,
            heartbeats_enabled: false,
            logging_enabled: false,
            version_check_enabled: true,
            log_file: None,
        }
    }
}

/// Check a local system id
pub fn validate_system_id(system_id: u8) -> Result<u8> {
    if system_id == 0 {
        return Err(ProtocolError::InvalidSystemId(system_id));
    }
    Ok(system_id)
}

/// Check a heartbeat rate
pub fn validate_heartbeat_rate(rate_hz: u32) -> Result<u32> {
    if rate_hz == 0 {
        return Err(ProtocolError::InvalidHeartbeatRate(rate_hz));
    }
    Ok(rate_hz)
}

impl ProtocolParams {
    /// Register protocol parameters with default values
    ///
    /// Parameters already present in the store are left alone.
    pub fn register_defaults(store: &mut ParameterStore) {
        let defaults = Self::default();
        store.register(SYSTEM_ID, ParamValue::Int(defaults.system_id.into()));
        store.register(
            HEARTBEAT_RATE,
            ParamValue::Int(defaults.heartbeat_rate_hz.into()),
        );
        store.register(
            HEARTBEATS_ENABLED,
            ParamValue::Bool(defaults.heartbeats_enabled),
        );
        store.register(LOGGING_ENABLED, ParamValue::Bool(defaults.logging_enabled));
        store.register(
            VERSION_CHECK_ENABLED,
            ParamValue::Bool(defaults.version_check_enabled),
        );
        store.register(LOGFILE_NAME, ParamValue::String(String::new()));
    }

    /// Load protocol parameters from parameter store
    pub fn from_store(store: &ParameterStore) -> Self {
        let defaults = Self::default();

        let system_id = match store.get(SYSTEM_ID) {
            Some(ParamValue::Int(id)) => match u8::try_from(*id).ok().filter(|id| *id != 0) {
                Some(id) => id,
                None => {
                    crate::log_warn!("{} out of range ({}), using {}", SYSTEM_ID, id, DEFAULT_SYSTEM_ID);
                    defaults.system_id
                }
            },
            _ => defaults.system_id,
        };

        let heartbeat_rate_hz = match store.get(HEARTBEAT_RATE) {
            Some(ParamValue::Int(rate)) => match u32::try_from(*rate).ok().filter(|r| *r > 0) {
                Some(rate) => rate,
                None => {
                    crate::log_warn!(
                        "{} out of range ({}), using {}",
                        HEARTBEAT_RATE,
                        rate,
                        DEFAULT_HEARTBEAT_RATE_HZ
                    );
                    defaults.heartbeat_rate_hz
                }
            },
            _ => defaults.heartbeat_rate_hz,
        };

        let flag = |name: &str, default: bool| match store.get(name) {
            Some(ParamValue::Bool(b)) => *b,
            _ => default,
        };

        let log_file = match store.get(LOGFILE_NAME) {
            Some(ParamValue::String(s)) if !s.is_empty() => Some(PathBuf::from(s)),
            _ => None,
        };

        Self {
            system_id,
            heartbeat_rate_hz,
            heartbeats_enabled: flag(HEARTBEATS_ENABLED, defaults.heartbeats_enabled),
            logging_enabled: flag(LOGGING_ENABLED, defaults.logging_enabled),
            version_check_enabled: flag(VERSION_CHECK_ENABLED, defaults.version_check_enabled),
            log_file,
        }
    }

    /// Write these parameters into the store
    pub fn write_to(&self, store: &mut ParameterStore) -> Result<()> {
        Self::register_defaults(store);
        store.set(SYSTEM_ID, ParamValue::Int(self.system_id.into()))?;
        store.set(HEARTBEAT_RATE, ParamValue::Int(self.heartbeat_rate_hz.into()))?;
        store.set(HEARTBEATS_ENABLED, ParamValue::Bool(self.heartbeats_enabled))?;
        store.set(LOGGING_ENABLED, ParamValue::Bool(self.logging_enabled))?;
        store.set(
            VERSION_CHECK_ENABLED,
            ParamValue::Bool(self.version_check_enabled),
        )?;
        let log_file = self
            .log_file
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default();
        store.set(LOGFILE_NAME, ParamValue::String(log_file))?;
        Ok(())
    }
}
