//! Common utilities for the roadgraph crates

pub mod error;

pub use error::{Error, Result};
