//! Error types for the roadgraph storage crates
//!
//! Errors fall into three groups: capacity/range violations, numeric problems that cannot
//! be saturated away, and structural or configuration errors. Saturation itself (distances
//! and weights beyond range) is not an error, it is handled where the value is encoded.

use std::io;
use thiserror::Error;

/// Main error type for roadgraph operations
#[derive(Debug, Error)]
pub enum Error {
    /// An id addressed a record that does not exist
    #[error("{what} {id} is out of bounds (len {len})")]
    OutOfBounds { what: &'static str, id: u64, len: u64 },

    /// A table would grow past its addressable limit
    #[error("maximum {what} count exceeded ({limit})")]
    CapacityExceeded { what: &'static str, limit: u64 },

    /// A value that cannot be stored (negative distance, NaN weight, ...)
    #[error("invalid {what}: {value}")]
    InvalidValue { what: &'static str, value: f64 },

    /// Mutation attempted after `freeze()`
    #[error("graph is frozen, cannot {0}")]
    Frozen(&'static str),

    /// Operation needs a frozen graph
    #[error("graph must be frozen before {0}")]
    NotFrozen(&'static str),

    /// Stored format version does not match the one this build writes
    #[error("incompatible format version for '{name}': expected {expected}, found {found}")]
    VersionMismatch {
        name: String,
        expected: i32,
        found: i32,
    },

    /// Persisted data failed a structural or checksum check
    #[error("corrupt data in '{name}': {reason}")]
    Corrupt { name: String, reason: String },

    /// Persisted data was written with a different configuration
    #[error("incompatible configuration: {0}")]
    IncompatibleConfig(String),

    /// Node-based and edge-based CH operations mixed on one storage
    #[error("cannot {operation} on a {mode} CH storage")]
    MixedChMode {
        operation: &'static str,
        mode: &'static str,
    },

    /// Two restrictions that cannot both be honoured
    #[error("conflicting turn restrictions: {0}")]
    ConflictingRestrictions(String),

    /// A restriction that does not describe a valid manoeuvre on this graph
    #[error("invalid turn restriction: {0}")]
    InvalidRestriction(String),

    /// A snap that cannot be spliced into a query graph
    #[error("invalid snap: {0}")]
    InvalidSnap(String),

    /// Invalid CH build input (levels, shortcut order)
    #[error("invalid contraction hierarchy: {0}")]
    InvalidHierarchy(String),

    /// Invalid argument to an accessor
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration or parameters
    #[error("invalid configuration: {0}")]
    Config(String),

    /// File I/O error on a named table
    #[error("I/O error on '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Wrap an I/O error with the name of the table it occurred on
    pub fn io(name: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            name: name.into(),
            source,
        }
    }

    /// Shorthand for range violations
    pub fn out_of_bounds(what: &'static str, id: impl Into<u64>, len: impl Into<u64>) -> Self {
        Error::OutOfBounds {
            what,
            id: id.into(),
            len: len.into(),
        }
    }
}

/// Result type alias for roadgraph operations
pub type Result<T> = std::result::Result<T, Error>;
