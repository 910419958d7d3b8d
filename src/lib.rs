//! Road-network graph storage
//!
//! * [`storage`]: base graph of nodes, edges, geometry and turn costs over growable tables
//! * [`restrictions`]: turns no-turn / only-turn restrictions into turn costs
//! * [`ch`]: contraction hierarchy levels and shortcuts per profile
//! * [`query`]: per-request overlays that splice snapped points into the graph
//!
//! A typical lifecycle: build the base graph, apply restrictions, `freeze()`, prepare one
//! CH per profile, flush. At query time load everything read-only and create one
//! [`query::QueryGraph`] per request.

pub mod ch;
pub mod config;
pub mod geo;
pub mod point_list;
pub mod query;
pub mod restrictions;
pub mod storage;
pub mod types;

pub use config::GraphConfig;
pub use point_list::PointList;
pub use roadgraph_common::{Error, Result};
pub use storage::{BaseGraph, BaseGraphBuilder, EdgeState, EdgeView, GraphView};
pub use types::{EdgeFlags, EdgeId, FetchMode, NodeId};
