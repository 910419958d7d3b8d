//! Memory-mapped data access

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;

use memmap2::MmapMut;
use roadgraph_common::{Error, Result};

use crate::data_access::{
    grown_capacity, read_i32, write_i32, DataAccess, DataAccessKind, FilePrefix,
    FILE_PREFIX_BYTES, HEADER_INTS,
};

/// Data access over a read-write mapping of `prefix + data`.
///
/// The header lives in memory until [`flush`](DataAccess::flush), which writes it together
/// with the checksum into the mapped prefix and syncs the mapping.
pub struct MmapDataAccess {
    name: String,
    path: PathBuf,
    header: [i32; HEADER_INTS],
    file: Option<File>,
    mmap: Option<MmapMut>,
}

impl MmapDataAccess {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            header: [0; HEADER_INTS],
            file: None,
            mmap: None,
        }
    }

    fn map(&mut self, file: File) -> Result<()> {
        // SAFETY: the file is owned by this data access and not resized while mapped
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| Error::io(&self.name, e))?;
        self.file = Some(file);
        self.mmap = Some(mmap);
        Ok(())
    }

    fn data(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[FILE_PREFIX_BYTES..],
            None => &[],
        }
    }

    fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.mmap {
            Some(mmap) => &mut mmap[FILE_PREFIX_BYTES..],
            None => &mut [],
        }
    }
}

impl DataAccess for MmapDataAccess {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DataAccessKind {
        DataAccessKind::MemoryMapped
    }

    fn create(&mut self, bytes: u64) -> Result<()> {
        if self.mmap.is_some() {
            return Err(Error::InvalidArgument(format!(
                "'{}' already created",
                self.name
            )));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| Error::io(&self.name, e))?;
        file.set_len(FILE_PREFIX_BYTES as u64 + bytes)
            .map_err(|e| Error::io(&self.name, e))?;
        self.map(file)
    }

    fn ensure_capacity(&mut self, bytes: u64) -> Result<bool> {
        let current = self.capacity();
        if bytes <= current {
            return Ok(false);
        }
        let Some(file) = self.file.take() else {
            return Err(Error::InvalidArgument(format!(
                "'{}' is not created",
                self.name
            )));
        };

        // Drop the old mapping before the file grows underneath it
        if let Some(mmap) = self.mmap.take() {
            mmap.flush().map_err(|e| Error::io(&self.name, e))?;
        }
        let new_capacity = grown_capacity(current, bytes);
        file.set_len(FILE_PREFIX_BYTES as u64 + new_capacity)
            .map_err(|e| Error::io(&self.name, e))?;
        self.map(file)?;

        log::trace!("grew '{}' to {} bytes", self.name, new_capacity);
        Ok(true)
    }

    fn capacity(&self) -> u64 {
        self.data().len() as u64
    }

    #[inline]
    fn get_int(&self, pos: u64) -> i32 {
        read_i32(self.data(), pos as usize)
    }

    #[inline]
    fn set_int(&mut self, pos: u64, value: i32) {
        write_i32(self.data_mut(), pos as usize, value);
    }

    fn get_bytes(&self, pos: u64, out: &mut [u8]) {
        let start = pos as usize;
        out.copy_from_slice(&self.data()[start..start + out.len()]);
    }

    fn set_bytes(&mut self, pos: u64, values: &[u8]) {
        let start = pos as usize;
        self.data_mut()[start..start + values.len()].copy_from_slice(values);
    }

    fn get_header(&self, index: usize) -> i32 {
        self.header[index]
    }

    fn set_header(&mut self, index: usize, value: i32) {
        self.header[index] = value;
    }

    fn flush(&mut self) -> Result<()> {
        let header = self.header;
        let Some(mmap) = self.mmap.as_mut() else {
            return Err(Error::InvalidArgument(format!(
                "cannot flush closed '{}'",
                self.name
            )));
        };
        let prefix = FilePrefix::new(&mmap[FILE_PREFIX_BYTES..], header);
        mmap[..FILE_PREFIX_BYTES].copy_from_slice(&prefix.to_bytes());
        mmap.flush().map_err(|e| Error::io(&self.name, e))?;

        log::debug!("flushed mapped '{}' ({} bytes)", self.name, prefix.data_len);
        Ok(())
    }

    fn load_existing(&mut self) -> Result<bool> {
        let file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::io(&self.name, e)),
        };
        self.map(file)?;

        let (prefix, data) = match &self.mmap {
            Some(mmap) => {
                let prefix = FilePrefix::from_bytes(&self.name, mmap)?;
                (prefix, &mmap[FILE_PREFIX_BYTES..])
            }
            None => return Ok(false),
        };
        prefix.verify(&self.name, data)?;
        self.header = prefix.header;
        Ok(true)
    }

    fn close(&mut self) {
        self.mmap = None;
        self.file = None;
    }

    fn is_closed(&self) -> bool {
        self.mmap.is_none()
    }
}
