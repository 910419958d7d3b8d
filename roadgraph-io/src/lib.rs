//! Binary storage layer for roadgraph
//!
//! A [`DataAccess`] is a growable, byte-addressable region with a small block of header
//! integers. Stores above it (node/edge tables, turn costs, CH shortcuts) address it with
//! fixed record strides and never care whether it lives on the heap or in a mapped file.

pub mod data_access;
pub mod directory;
pub mod mmap;
pub mod ram;

pub use data_access::{DataAccess, DataAccessKind, HEADER_INTS};
pub use directory::Directory;
pub use mmap::MmapDataAccess;
pub use ram::RamDataAccess;
