use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{
    fs::{read_to_string, write},
    path::PathBuf,
};

use crate::error::LibraryError;

/// Source of the configured library root directories. The root list is
/// external configuration; the engine never edits it on its own.
pub trait LocationsProvider: Send + Sync {
    fn get_locations(&self) -> Result<Vec<PathBuf>, LibraryError>;
    fn set_locations(&self, locations: Vec<PathBuf>) -> Result<(), LibraryError>;
}

/// Reads and writes the `locations` list in a TOML configuration file.
#[derive(Debug, Serialize, Deserialize)]
pub struct TomlLocationsProvider {
    path: PathBuf,
}

impl TomlLocationsProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlLocationsProvider { path }
    }
}

impl LocationsProvider for TomlLocationsProvider {
    fn get_locations(&self) -> Result<Vec<PathBuf>, LibraryError> {
        tracing::debug!("Attempting to read library locations from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, returning empty location list.");
            return Ok(Vec::new());
        }
        let content = read_to_string(&self.path)?;
        let config: BTreeMap<String, Vec<PathBuf>> = toml::from_str(&content)?;
        config
            .get("locations")
            .cloned()
            .ok_or_else(|| LibraryError::NotFound("locations not found in config".to_string()))
    }

    fn set_locations(&self, locations: Vec<PathBuf>) -> Result<(), LibraryError> {
        tracing::debug!("Attempting to write library locations to: {:?}", &self.path);
        let mut config = BTreeMap::new();
        config.insert("locations".to_string(), locations);
        let toml_string = toml::to_string(&config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

/// Fixed location list for embedders that manage configuration themselves.
#[derive(Debug, Default)]
pub struct StaticLocationsProvider {
    locations: parking_lot::RwLock<Vec<PathBuf>>,
}

impl StaticLocationsProvider {
    pub fn new(locations: Vec<PathBuf>) -> Self {
        StaticLocationsProvider {
            locations: parking_lot::RwLock::new(locations),
        }
    }
}

impl LocationsProvider for StaticLocationsProvider {
    fn get_locations(&self) -> Result<Vec<PathBuf>, LibraryError> {
        Ok(self.locations.read().clone())
    }

    fn set_locations(&self, locations: Vec<PathBuf>) -> Result<(), LibraryError> {
        *self.locations.write() = locations;
        Ok(())
    }
}
