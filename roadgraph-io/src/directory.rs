//! Named data accesses under one location

use std::fs;
use std::path::{Path, PathBuf};

use roadgraph_common::{Error, Result};

use crate::data_access::{DataAccess, DataAccessKind};
use crate::mmap::MmapDataAccess;
use crate::ram::RamDataAccess;

/// Factory handing out one data access per table name
#[derive(Debug, Clone)]
pub struct Directory {
    location: Option<PathBuf>,
    default_kind: DataAccessKind,
}

impl Directory {
    /// Heap-only directory, nothing is ever written
    pub fn in_memory() -> Self {
        Self {
            location: None,
            default_kind: DataAccessKind::InMemory,
        }
    }

    /// Directory rooted at `location`, tables use `kind` unless told otherwise
    pub fn new(location: impl Into<PathBuf>, kind: DataAccessKind) -> Self {
        Self {
            location: Some(location.into()),
            default_kind: kind,
        }
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn default_kind(&self) -> DataAccessKind {
        self.default_kind
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn DataAccess>> {
        self.create_with(name, self.default_kind)
    }

    pub fn create_with(&self, name: &str, kind: DataAccessKind) -> Result<Box<dyn DataAccess>> {
        if !kind.is_persistent() {
            return Ok(Box::new(RamDataAccess::new(name)));
        }
        let Some(location) = &self.location else {
            return Err(Error::Config(format!(
                "'{name}' needs a location for {kind:?}"
            )));
        };
        fs::create_dir_all(location).map_err(|e| Error::io(name, e))?;

        let path = location.join(name);
        Ok(match kind {
            DataAccessKind::MemoryMapped => Box::new(MmapDataAccess::new(name, path)),
            _ => Box::new(RamDataAccess::with_store(name, path)),
        })
    }
}
