//! Graph configuration, loadable from TOML
//!
//! ```toml
//! location = "graph-cache"
//! store = "memory_mapped"
//! bytes_for_flags = 8
//! with_turn_costs = true
//!
//! [[ch_profiles]]
//! name = "car"
//! edge_based = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use roadgraph_common::{Error, Result};
use roadgraph_io::{DataAccessKind, Directory};
use serde::Deserialize;

use crate::storage::fixed::MAX_DISTANCE_METERS;
use crate::storage::BaseGraphBuilder;

/// One contraction hierarchy to prepare
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChProfileConfig {
    pub name: String,
    #[serde(default)]
    pub edge_based: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    /// Directory holding the table files; required unless `store` is `in_memory`
    pub location: Option<PathBuf>,
    pub store: DataAccessKind,
    pub bytes_for_flags: u32,
    pub with_elevation: bool,
    pub with_turn_costs: bool,
    pub max_distance_meters: f64,
    pub initial_capacity_bytes: u64,
    pub ch_profiles: Vec<ChProfileConfig>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            location: None,
            store: DataAccessKind::InMemory,
            bytes_for_flags: 4,
            with_elevation: false,
            with_turn_costs: false,
            max_distance_meters: MAX_DISTANCE_METERS,
            initial_capacity_bytes: 1 << 16,
            ch_profiles: Vec::new(),
        }
    }
}

impl GraphConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bytes_for_flags == 0 || self.bytes_for_flags % 4 != 0 {
            return Err(Error::Config(format!(
                "bytes_for_flags must be a positive multiple of 4, got {}",
                self.bytes_for_flags
            )));
        }
        if !(self.max_distance_meters > 0.0 && self.max_distance_meters <= MAX_DISTANCE_METERS) {
            return Err(Error::Config(format!(
                "max_distance_meters must be in (0, {MAX_DISTANCE_METERS}], got {}",
                self.max_distance_meters
            )));
        }
        if self.store.is_persistent() && self.location.is_none() {
            return Err(Error::Config(format!(
                "store {:?} needs a location",
                self.store
            )));
        }

        let mut names: Vec<&str> = self.ch_profiles.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::Config(format!(
                "duplicate CH profile '{}'",
                pair[0]
            )));
        }
        if let Some(bad) = self
            .ch_profiles
            .iter()
            .find(|p| p.name.is_empty() || !p.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        {
            return Err(Error::Config(format!(
                "CH profile name '{}' must be non-empty and use [A-Za-z0-9_]",
                bad.name
            )));
        }
        Ok(())
    }

    pub fn directory(&self) -> Directory {
        match &self.location {
            Some(location) => Directory::new(location.clone(), self.store),
            None => Directory::in_memory(),
        }
    }

    pub fn graph_builder(&self) -> Result<BaseGraphBuilder> {
        self.validate()?;
        Ok(BaseGraphBuilder::new(self.bytes_for_flags)
            .set_dir(self.directory())
            .with_elevation(self.with_elevation)
            .with_turn_costs(self.with_turn_costs)
            .set_max_distance(self.max_distance_meters)
            .set_initial_capacity(self.initial_capacity_bytes))
    }
}
