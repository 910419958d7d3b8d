//! Base graph store and the read interfaces built on it

pub mod base_graph;
pub mod edge;
pub mod fixed;
pub mod turn_cost;
pub mod view;

pub use base_graph::{BBox, BaseEdgeViews, BaseGraph, BaseGraphBuilder};
pub use edge::{BaseEdge, BaseEdgeIter, EdgeMut};
pub use turn_cost::TurnCostEntry;
pub use view::{EdgeState, EdgeView, GraphView};
