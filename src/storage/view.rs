//! Read interfaces shared by the base graph and query graphs

use roadgraph_common::Result;

use crate::point_list::PointList;
use crate::query::VirtualEdge;
use crate::storage::base_graph::BaseGraph;
use crate::storage::edge::BaseEdge;
use crate::types::{
    create_edge_key, reverse_edge_key, EdgeFlags, EdgeId, FetchMode, NodeId,
};

/// An edge seen from one of its end nodes
pub trait EdgeState {
    fn edge(&self) -> EdgeId;

    fn base_node(&self) -> NodeId;

    fn adj_node(&self) -> NodeId;

    /// True when this orientation runs against the stored direction
    fn is_reverse(&self) -> bool;

    fn distance(&self) -> f64;

    fn flags(&self) -> EdgeFlags;

    fn key_values_ref(&self) -> i32;

    fn fetch_way_geometry(&self, mode: FetchMode) -> PointList;

    fn edge_key(&self) -> u32 {
        create_edge_key(self.edge(), self.is_reverse())
    }

    fn reverse_edge_key(&self) -> u32 {
        reverse_edge_key(self.edge_key())
    }
}

/// A stored edge or a query-scoped virtual edge
#[derive(Debug, Clone, Copy)]
pub enum EdgeView<'a> {
    Base(BaseEdge<'a>),
    Virtual(&'a VirtualEdge),
}

impl EdgeView<'_> {
    pub fn is_virtual(&self) -> bool {
        matches!(self, EdgeView::Virtual(_))
    }
}

macro_rules! delegate {
    ($self:ident, $state:ident => $call:expr) => {
        match $self {
            EdgeView::Base($state) => $call,
            EdgeView::Virtual($state) => $call,
        }
    };
}

impl EdgeState for EdgeView<'_> {
    fn edge(&self) -> EdgeId {
        delegate!(self, s => s.edge())
    }

    fn base_node(&self) -> NodeId {
        delegate!(self, s => s.base_node())
    }

    fn adj_node(&self) -> NodeId {
        delegate!(self, s => s.adj_node())
    }

    fn is_reverse(&self) -> bool {
        delegate!(self, s => s.is_reverse())
    }

    fn distance(&self) -> f64 {
        delegate!(self, s => s.distance())
    }

    fn flags(&self) -> EdgeFlags {
        delegate!(self, s => s.flags())
    }

    fn key_values_ref(&self) -> i32 {
        delegate!(self, s => s.key_values_ref())
    }

    fn fetch_way_geometry(&self, mode: FetchMode) -> PointList {
        delegate!(self, s => s.fetch_way_geometry(mode))
    }

    fn edge_key(&self) -> u32 {
        delegate!(self, s => s.edge_key())
    }
}

/// Graph-shaped read interface consumed by search algorithms
pub trait GraphView {
    type Edges<'a>: Iterator<Item = EdgeView<'a>>
    where
        Self: 'a;

    /// The stored graph underneath any overlay
    fn base_graph(&self) -> &BaseGraph;

    fn node_count(&self) -> u32;

    fn edge_count(&self) -> u32;

    fn lat(&self, node: NodeId) -> f64;

    fn lon(&self, node: NodeId) -> f64;

    fn ele(&self, node: NodeId) -> f64;

    /// Edges touching `node`, each oriented with `node` as base
    fn edges(&self, node: NodeId) -> Self::Edges<'_>;

    /// `edge` oriented so that it ends at `adj_node` (stored direction when `None`)
    fn edge_state(&self, edge: EdgeId, adj_node: Option<NodeId>) -> Result<EdgeView<'_>>;

    fn edge_state_for_key(&self, edge_key: u32) -> Result<EdgeView<'_>>;

    /// Cost of turning from `from` onto `to` at `via`; `f64::INFINITY` when forbidden
    fn turn_cost(&self, from: EdgeId, via: NodeId, to: EdgeId) -> f64;
}
