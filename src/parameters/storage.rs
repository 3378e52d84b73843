//! Parameter Store
//!
//! In-memory parameter map persisted as one group of a JSON settings file.
//! Several groups can share a file; saving a group rewrites only that group and
//! keeps the others as they were on disk.
//!
//! # File Layout
//!
//! ```json
//! {
//!   "MAVLINK_PROTOCOL": {
//!     "GCS_SYSTEM_ID": 255,
//!     "HEARTBEAT_RATE": 1,
//!     "LOGGING_ENABLED": false
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Parameter value
///
/// Stored untagged, so the JSON type of the value decides the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

type ParamGroup = BTreeMap<String, ParamValue>;
type SettingsFile = BTreeMap<String, serde_json::Value>;

/// Parameter store for one settings group
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    group: String,
    parameters: ParamGroup,
    dirty: bool,
}

impl ParameterStore {
    /// Empty store for `group`
    pub fn new(group: &str) -> Self {
        Self {
            group: group.to_string(),
            parameters: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load `group` from the settings file at `path`
    ///
    /// A missing file, or a file without the group, gives an empty store.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Settings` - The file exists but cannot be read
    /// - `ProtocolError::SettingsFormat` - The file or group is not valid JSON
    ///   of the expected shape
    pub fn load_from_file(path: &Path, group: &str) -> Result<Self> {
        let mut store = Self::new(group);
        let Some(mut file) = read_settings(path)? else {
            crate::log_debug!("No settings file at {}", path.display());
            return Ok(store);
        };

        if let Some(value) = file.remove(group) {
            store.parameters = serde_json::from_value(value)?;
        }
        crate::log_debug!(
            "Loaded {} {} parameters from {}",
            store.count(),
            group,
            path.display()
        );
        Ok(store)
    }

    /// Write this group to the settings file at `path`
    ///
    /// Clears the dirty flag.
    pub fn save_to_file(&mut self, path: &Path) -> Result<()> {
        // An unreadable or malformed file is replaced rather than merged
        let mut file = match read_settings(path) {
            Ok(file) => file.unwrap_or_default(),
            Err(e) => {
                crate::log_warn!("Replacing unreadable settings file: {}", e);
                SettingsFile::new()
            }
        };
        file.insert(self.group.clone(), serde_json::to_value(&self.parameters)?);

        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json).map_err(|source| ProtocolError::Settings {
            path: path.to_path_buf(),
            source,
        })?;

        self.dirty = false;
        crate::log_debug!(
            "Saved {} {} parameters to {}",
            self.count(),
            self.group,
            path.display()
        );
        Ok(())
    }

    /// Get parameter value
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name)
    }

    /// Set the value of a registered parameter
    ///
    /// Marks the store as dirty.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let Some(slot) = self.parameters.get_mut(name) else {
            return Err(ProtocolError::UnknownParameter(name.to_string()));
        };
        if *slot != value {
            *slot = value;
            self.dirty = true;
        }
        Ok(())
    }

    /// Register a parameter with its default value
    ///
    /// An existing value is kept.
    pub fn register(&mut self, name: &str, default_value: ParamValue) {
        if !self.parameters.contains_key(name) {
            self.parameters.insert(name.to_string(), default_value);
            self.dirty = true;
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn iter_names(&self) -> impl Iterator<Item = &String> {
        self.parameters.keys()
    }

    pub fn count(&self) -> usize {
        self.parameters.len()
    }

    /// Check if store has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

fn read_settings(path: &Path) -> Result<Option<SettingsFile>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ProtocolError::Settings {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    Ok(Some(serde_json::from_str(&text)?))
}
