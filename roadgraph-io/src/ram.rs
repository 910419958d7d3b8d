//! Heap-backed data access

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::PathBuf;

use roadgraph_common::{Error, Result};

use crate::data_access::{
    grown_capacity, read_i32, write_i32, DataAccess, DataAccessKind, FilePrefix,
    FILE_PREFIX_BYTES, HEADER_INTS,
};

/// Data access keeping all bytes in one `Vec<u8>`.
///
/// With a path it is written on [`flush`](DataAccess::flush) and read back on
/// [`load_existing`](DataAccess::load_existing); without one it is purely in-memory.
pub struct RamDataAccess {
    name: String,
    path: Option<PathBuf>,
    header: [i32; HEADER_INTS],
    data: Vec<u8>,
    closed: bool,
}

impl RamDataAccess {
    /// In-memory only, flush is a no-op
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            header: [0; HEADER_INTS],
            data: Vec::new(),
            closed: false,
        }
    }

    /// Heap-backed, persisted to `path`
    pub fn with_store(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(name)
        }
    }
}

impl DataAccess for RamDataAccess {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DataAccessKind {
        if self.path.is_some() {
            DataAccessKind::InMemoryStore
        } else {
            DataAccessKind::InMemory
        }
    }

    fn create(&mut self, bytes: u64) -> Result<()> {
        if !self.data.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "'{}' already created",
                self.name
            )));
        }
        self.data = vec![0; bytes as usize];
        self.closed = false;
        Ok(())
    }

    fn ensure_capacity(&mut self, bytes: u64) -> Result<bool> {
        let current = self.data.len() as u64;
        if bytes <= current {
            return Ok(false);
        }
        let new_capacity = grown_capacity(current, bytes);
        self.data.resize(new_capacity as usize, 0);
        Ok(true)
    }

    fn capacity(&self) -> u64 {
        self.data.len() as u64
    }

    #[inline]
    fn get_int(&self, pos: u64) -> i32 {
        read_i32(&self.data, pos as usize)
    }

    #[inline]
    fn set_int(&mut self, pos: u64, value: i32) {
        write_i32(&mut self.data, pos as usize, value);
    }

    fn get_bytes(&self, pos: u64, out: &mut [u8]) {
        let start = pos as usize;
        out.copy_from_slice(&self.data[start..start + out.len()]);
    }

    fn set_bytes(&mut self, pos: u64, values: &[u8]) {
        let start = pos as usize;
        self.data[start..start + values.len()].copy_from_slice(values);
    }

    fn get_header(&self, index: usize) -> i32 {
        self.header[index]
    }

    fn set_header(&mut self, index: usize, value: i32) {
        self.header[index] = value;
    }

    fn flush(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if self.closed {
            return Err(Error::InvalidArgument(format!(
                "cannot flush closed '{}'",
                self.name
            )));
        }

        let file = File::create(path).map_err(|e| Error::io(&self.name, e))?;
        let mut writer = BufWriter::new(file);
        let prefix = FilePrefix::new(&self.data, self.header);
        writer
            .write_all(&prefix.to_bytes())
            .and_then(|_| writer.write_all(&self.data))
            .and_then(|_| writer.flush())
            .map_err(|e| Error::io(&self.name, e))?;

        log::debug!("flushed '{}' ({} bytes)", self.name, self.data.len());
        Ok(())
    }

    fn load_existing(&mut self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::io(&self.name, e)),
        };

        let prefix = FilePrefix::from_bytes(&self.name, &bytes)?;
        let data = &bytes[FILE_PREFIX_BYTES..];
        prefix.verify(&self.name, data)?;

        self.header = prefix.header;
        self.data = data.to_vec();
        self.closed = false;
        Ok(true)
    }

    fn close(&mut self) {
        self.data = Vec::new();
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
