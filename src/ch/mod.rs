//! Contraction hierarchy stores
//!
//! One [`ChStorage`] per routing profile holds node levels and shortcuts computed by an
//! external contraction step over a frozen [`BaseGraph`](crate::BaseGraph).
//! [`ChStorageBuilder`] writes them, [`RoutingChGraph`] reads them back together with the
//! base edges.

pub mod builder;
pub mod graph;
pub mod ordering;
pub mod storage;

pub use builder::ChStorageBuilder;
pub use graph::{ChEdge, RoutingChGraph};
pub use ordering::NodeOrderingProvider;
pub use storage::{
    ChStorage, LowWeightShortcut, Shortcut, MAX_WEIGHT_INT, MIN_WEIGHT, SC_ACCESS_MASK, SC_BWD,
    SC_FWD,
};
