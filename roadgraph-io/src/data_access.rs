//! The storage abstraction every table is written against
//!
//! File layout of a persisted data access (little-endian):
//!
//! ```text
//! magic:        u32 = 0x52474441  // "RGDA"
//! version:      u16 = 1           // container version, not the store's format version
//! reserved:     u16
//! data_len:     u64
//! data_crc64:   u64
//! header:       [i32; 20]         // interpreted by the owning store
//! data:         [u8; data_len]
//! ```

use crc::{Crc, CRC_64_GO_ISO};
use roadgraph_common::{Error, Result};
use serde::Deserialize;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

pub const MAGIC: u32 = 0x5247_4441; // "RGDA"
pub const CONTAINER_VERSION: u16 = 1;

/// Number of i32 header slots available to the owning store
pub const HEADER_INTS: usize = 20;

/// Bytes in front of the data region
pub const FILE_PREFIX_BYTES: usize = 24 + HEADER_INTS * 4;

/// Smallest growth step, so tiny graphs do not remap on every edge
pub const MIN_GROWTH_BYTES: u64 = 1 << 12;

/// Where a data access keeps its bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataAccessKind {
    /// Heap only, never written to disk
    InMemory,
    /// Heap, written on flush and read on load
    #[default]
    InMemoryStore,
    /// Memory-mapped file
    MemoryMapped,
}

impl DataAccessKind {
    pub fn is_persistent(self) -> bool {
        !matches!(self, DataAccessKind::InMemory)
    }
}

/// Growable byte-addressable region plus a block of header integers.
///
/// Offsets are byte positions into the data region. Reads and writes outside the current
/// capacity panic; owners call [`DataAccess::ensure_capacity`] before writing new records.
pub trait DataAccess: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> DataAccessKind;

    /// Initialise an empty region of `bytes` capacity
    fn create(&mut self, bytes: u64) -> Result<()>;

    /// Grow to at least `bytes`; returns true if the region was enlarged
    fn ensure_capacity(&mut self, bytes: u64) -> Result<bool>;

    fn capacity(&self) -> u64;

    fn get_int(&self, pos: u64) -> i32;

    fn set_int(&mut self, pos: u64, value: i32);

    fn get_bytes(&self, pos: u64, out: &mut [u8]);

    fn set_bytes(&mut self, pos: u64, values: &[u8]);

    fn get_header(&self, index: usize) -> i32;

    fn set_header(&mut self, index: usize, value: i32);

    /// Persist header and data (no-op for [`DataAccessKind::InMemory`])
    fn flush(&mut self) -> Result<()>;

    /// Load previously flushed content; `Ok(false)` if there is nothing to load
    fn load_existing(&mut self) -> Result<bool>;

    fn close(&mut self);

    fn is_closed(&self) -> bool;

    fn get_long(&self, pos: u64) -> i64 {
        let low = self.get_int(pos) as u32 as u64;
        let high = self.get_int(pos + 4) as u32 as u64;
        ((high << 32) | low) as i64
    }

    fn set_long(&mut self, pos: u64, value: i64) {
        self.set_int(pos, value as i32);
        self.set_int(pos + 4, (value >> 32) as i32);
    }
}

/// Capacity to grow to when `required` bytes do not fit into `current`
pub(crate) fn grown_capacity(current: u64, required: u64) -> u64 {
    required.max(current.saturating_mul(2)).max(MIN_GROWTH_BYTES)
}

#[inline]
pub(crate) fn read_i32(buf: &[u8], pos: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[pos..pos + 4]);
    i32::from_le_bytes(bytes)
}

#[inline]
pub(crate) fn write_i32(buf: &mut [u8], pos: usize, value: i32) {
    buf[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
}

/// Decoded file prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FilePrefix {
    pub data_len: u64,
    pub data_crc: u64,
    pub header: [i32; HEADER_INTS],
}

impl FilePrefix {
    pub fn new(data: &[u8], header: [i32; HEADER_INTS]) -> Self {
        Self {
            data_len: data.len() as u64,
            data_crc: CRC64.checksum(data),
            header,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FILE_PREFIX_BYTES);
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&self.data_len.to_le_bytes());
        bytes.extend_from_slice(&self.data_crc.to_le_bytes());
        for value in &self.header {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_PREFIX_BYTES {
            return Err(corrupt(name, "file shorter than header"));
        }

        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != MAGIC {
            return Err(corrupt(
                name,
                format!("invalid magic: expected 0x{MAGIC:08x}, got 0x{magic:08x}"),
            ));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != CONTAINER_VERSION {
            return Err(Error::VersionMismatch {
                name: name.to_string(),
                expected: CONTAINER_VERSION as i32,
                found: version as i32,
            });
        }

        let u64_at = |pos: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[pos..pos + 8]);
            u64::from_le_bytes(raw)
        };
        let data_len = u64_at(8);
        let data_crc = u64_at(16);

        let mut header = [0i32; HEADER_INTS];
        for (i, slot) in header.iter_mut().enumerate() {
            *slot = read_i32(bytes, 24 + i * 4);
        }

        Ok(Self {
            data_len,
            data_crc,
            header,
        })
    }

    /// Check the stored checksum against the data region
    pub fn verify(&self, name: &str, data: &[u8]) -> Result<()> {
        if data.len() as u64 != self.data_len {
            return Err(corrupt(
                name,
                format!("expected {} data bytes, found {}", self.data_len, data.len()),
            ));
        }
        let computed = CRC64.checksum(data);
        if computed != self.data_crc {
            return Err(corrupt(
                name,
                format!(
                    "CRC mismatch: expected {:016x}, got {:016x}",
                    self.data_crc, computed
                ),
            ));
        }
        Ok(())
    }
}

pub(crate) fn corrupt(name: &str, reason: impl Into<String>) -> Error {
    Error::Corrupt {
        name: name.to_string(),
        reason: reason.into(),
    }
}
