//! Per-request view of the graph with snapped query points spliced in
//!
//! A [`LocationIndex`] turns coordinates into [`Snap`]s, [`QueryGraph::create`] turns the
//! snaps into virtual nodes and edges on top of a frozen [`BaseGraph`](crate::BaseGraph).
//! The base graph is only read, so any number of query graphs can share it.

pub mod graph;
pub mod location_index;
pub mod overlay;
pub mod snap;
pub mod virtual_edge;

pub use graph::{QueryEdges, QueryGraph};
pub use location_index::LocationIndex;
pub use overlay::{EdgeChanges, QueryOverlay};
pub use snap::{ClosestEdge, Snap, SnapPosition, SnappedPoint};
pub use virtual_edge::VirtualEdge;
