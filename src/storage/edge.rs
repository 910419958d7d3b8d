//! Edge cursors over the base graph

use roadgraph_common::Result;

use crate::point_list::PointList;
use crate::storage::base_graph::BaseGraph;
use crate::storage::view::EdgeState;
use crate::types::{EdgeFlags, EdgeId, FetchMode, NodeId, NO_REF};

/// Read-only view of one stored edge, oriented from `base_node` to `adj_node`.
///
/// `reverse` is true when the orientation runs from the stored node B to node A.
#[derive(Clone, Copy)]
pub struct BaseEdge<'a> {
    pub(crate) graph: &'a BaseGraph,
    pub(crate) edge: EdgeId,
    pub(crate) base: NodeId,
    pub(crate) adj: NodeId,
    pub(crate) reverse: bool,
}

impl std::fmt::Debug for BaseEdge<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}-{}", self.edge, self.base, self.adj)
    }
}

impl EdgeState for BaseEdge<'_> {
    fn edge(&self) -> EdgeId {
        self.edge
    }

    fn base_node(&self) -> NodeId {
        self.base
    }

    fn adj_node(&self) -> NodeId {
        self.adj
    }

    fn is_reverse(&self) -> bool {
        self.reverse
    }

    fn distance(&self) -> f64 {
        self.graph.distance(self.edge)
    }

    fn flags(&self) -> EdgeFlags {
        self.graph.flags(self.edge)
    }

    fn key_values_ref(&self) -> i32 {
        self.graph.key_values_ref(self.edge)
    }

    fn fetch_way_geometry(&self, mode: FetchMode) -> PointList {
        self.graph
            .fetch_way_geometry(self.edge, self.base, self.adj, self.reverse, mode)
    }
}

/// Writable cursor returned by [`BaseGraph::add_edge`] and [`BaseGraph::edge_mut`]
pub struct EdgeMut<'a> {
    pub(crate) graph: &'a mut BaseGraph,
    pub(crate) edge: EdgeId,
    pub(crate) base: NodeId,
    pub(crate) adj: NodeId,
    pub(crate) reverse: bool,
}

impl EdgeMut<'_> {
    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    pub fn base_node(&self) -> NodeId {
        self.base
    }

    pub fn adj_node(&self) -> NodeId {
        self.adj
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// Read access to the same edge
    pub fn state(&self) -> BaseEdge<'_> {
        BaseEdge {
            graph: self.graph,
            edge: self.edge,
            base: self.base,
            adj: self.adj,
            reverse: self.reverse,
        }
    }

    /// Distance in metres; saturates at the configured maximum, negative values are rejected
    pub fn set_distance(&mut self, meters: f64) -> Result<&mut Self> {
        self.graph.set_distance(self.edge, meters)?;
        Ok(self)
    }

    pub fn set_flags(&mut self, flags: &EdgeFlags) -> Result<&mut Self> {
        self.graph.set_flags(self.edge, flags)?;
        Ok(self)
    }

    pub fn set_key_values_ref(&mut self, kv_ref: i32) -> Result<&mut Self> {
        self.graph.set_key_values_ref(self.edge, kv_ref)?;
        Ok(self)
    }

    /// Pillar points in the direction of this cursor; towers are not part of the list
    pub fn set_way_geometry(&mut self, pillars: &PointList) -> Result<&mut Self> {
        self.graph.set_way_geometry(self.edge, pillars, self.reverse)?;
        Ok(self)
    }
}

/// Iterator over the adjacency list of one node
pub struct BaseEdgeIter<'a> {
    pub(crate) graph: &'a BaseGraph,
    pub(crate) node: NodeId,
    pub(crate) next: i32,
}

impl<'a> Iterator for BaseEdgeIter<'a> {
    type Item = BaseEdge<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NO_REF {
            return None;
        }
        let edge = self.next as EdgeId;
        let node_a = self.graph.node_a(edge);
        let node_b = self.graph.node_b(edge);

        // A self-loop is linked through link A only
        let state = if node_a == self.node {
            self.next = self.graph.link_a(edge);
            BaseEdge {
                graph: self.graph,
                edge,
                base: self.node,
                adj: node_b,
                reverse: false,
            }
        } else {
            self.next = self.graph.link_b(edge);
            BaseEdge {
                graph: self.graph,
                edge,
                base: self.node,
                adj: node_a,
                reverse: true,
            }
        };
        Some(state)
    }
}
