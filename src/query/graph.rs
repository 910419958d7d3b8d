//! Read view over a frozen graph plus one request's overlay

use roadgraph_common::{Error, Result};

use crate::query::overlay::QueryOverlay;
use crate::query::snap::Snap;
use crate::query::virtual_edge::VirtualEdge;
use crate::storage::{BaseEdgeIter, BaseGraph, EdgeState, EdgeView, GraphView};
use crate::types::{edge_from_key, is_reverse_key, EdgeId, NodeId};

const NO_INDICES: &[usize] = &[];
const NO_EDGES: &[EdgeId] = &[];

pub struct QueryGraph<'a> {
    base: &'a BaseGraph,
    overlay: QueryOverlay,
}

impl<'a> QueryGraph<'a> {
    /// Build the overlay for `snaps`; each snap's `closest_node` then names a node of this graph
    pub fn create(base: &'a BaseGraph, snaps: &mut [Snap]) -> Result<Self> {
        let overlay = QueryOverlay::build(base, snaps)?;
        Ok(Self { base, overlay })
    }

    pub fn overlay(&self) -> &QueryOverlay {
        &self.overlay
    }

    pub fn is_virtual_node(&self, node: NodeId) -> bool {
        node >= self.base.node_count()
    }

    pub fn is_virtual_edge(&self, edge: EdgeId) -> bool {
        edge >= self.base.edge_count()
    }

    pub fn virtual_node_count(&self) -> u32 {
        self.overlay.virtual_node_count()
    }

    /// Number of virtual edge pairs
    pub fn virtual_edge_count(&self) -> u32 {
        self.overlay.virtual_edge_count()
    }

    fn virtual_pair(&self, edge: EdgeId) -> Result<usize> {
        let pair = edge - self.base.edge_count();
        if pair >= self.overlay.virtual_edge_count() {
            return Err(Error::out_of_bounds(
                "edge",
                edge,
                GraphView::edge_count(self),
            ));
        }
        Ok(pair as usize)
    }

    fn virtual_edge(&self, pair: usize, backward: bool) -> &VirtualEdge {
        &self.overlay.virtual_edges()[2 * pair + backward as usize]
    }

    /// The real edge behind `edge`; real edges map to themselves
    pub fn original_edge(&self, edge: EdgeId) -> Result<EdgeId> {
        if !self.is_virtual_edge(edge) {
            return Ok(edge);
        }
        let pair = self.virtual_pair(edge)?;
        Ok(self.virtual_edge(pair, false).original_edge())
    }
}

/// Adjacency of one node: untouched real edges, then virtual edges
pub struct QueryEdges<'a> {
    base: Option<BaseEdgeIter<'a>>,
    removed: &'a [EdgeId],
    virtual_edges: &'a [VirtualEdge],
    added: std::slice::Iter<'a, usize>,
}

impl<'a> Iterator for QueryEdges<'a> {
    type Item = EdgeView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(base) = self.base.as_mut() {
            for edge in base.by_ref() {
                if !self.removed.contains(&edge.edge()) {
                    return Some(EdgeView::Base(edge));
                }
            }
            self.base = None;
        }
        let virtual_edges = self.virtual_edges;
        self.added
            .next()
            .map(|&index| EdgeView::Virtual(&virtual_edges[index]))
    }
}

impl GraphView for QueryGraph<'_> {
    type Edges<'b> = QueryEdges<'b> where Self: 'b;

    fn base_graph(&self) -> &BaseGraph {
        self.base
    }

    fn node_count(&self) -> u32 {
        self.base.node_count() + self.overlay.virtual_node_count()
    }

    fn edge_count(&self) -> u32 {
        self.base.edge_count() + self.overlay.virtual_edge_count()
    }

    fn lat(&self, node: NodeId) -> f64 {
        if self.is_virtual_node(node) {
            let index = (node - self.base.node_count()) as usize;
            self.overlay.virtual_nodes().lat(index)
        } else {
            self.base.lat(node)
        }
    }

    fn lon(&self, node: NodeId) -> f64 {
        if self.is_virtual_node(node) {
            let index = (node - self.base.node_count()) as usize;
            self.overlay.virtual_nodes().lon(index)
        } else {
            self.base.lon(node)
        }
    }

    fn ele(&self, node: NodeId) -> f64 {
        if self.is_virtual_node(node) {
            let index = (node - self.base.node_count()) as usize;
            self.overlay.virtual_nodes().ele(index)
        } else {
            self.base.ele(node)
        }
    }

    fn edges(&self, node: NodeId) -> Self::Edges<'_> {
        let virtual_edges = self.overlay.virtual_edges();
        if self.is_virtual_node(node) {
            let index = (node - self.base.node_count()) as usize;
            return QueryEdges {
                base: None,
                removed: NO_EDGES,
                virtual_edges,
                added: self.overlay.node_edges(index).iter(),
            };
        }
        let changes = self.overlay.edge_changes(node);
        QueryEdges {
            base: Some(self.base.edges(node)),
            removed: changes.map_or(NO_EDGES, |c| c.removed.as_slice()),
            virtual_edges,
            added: changes.map_or(NO_INDICES, |c| c.added.as_slice()).iter(),
        }
    }

    fn edge_state(&self, edge: EdgeId, adj_node: Option<NodeId>) -> Result<EdgeView<'_>> {
        if !self.is_virtual_edge(edge) {
            return self.base.edge_state(edge, adj_node).map(EdgeView::Base);
        }
        let pair = self.virtual_pair(edge)?;
        let forward = self.virtual_edge(pair, false);
        match adj_node {
            None => Ok(EdgeView::Virtual(forward)),
            Some(adj) if adj == forward.adj_node() => Ok(EdgeView::Virtual(forward)),
            Some(adj) if adj == forward.base_node() => {
                Ok(EdgeView::Virtual(self.virtual_edge(pair, true)))
            }
            Some(adj) => Err(Error::InvalidArgument(format!(
                "virtual edge {edge} ({}-{}) does not touch node {adj}",
                forward.base_node(),
                forward.adj_node()
            ))),
        }
    }

    fn edge_state_for_key(&self, edge_key: u32) -> Result<EdgeView<'_>> {
        let edge = edge_from_key(edge_key);
        if !self.is_virtual_edge(edge) {
            return self.base.edge_state_for_key(edge_key).map(EdgeView::Base);
        }
        let pair = self.virtual_pair(edge)?;
        Ok(EdgeView::Virtual(
            self.virtual_edge(pair, is_reverse_key(edge_key)),
        ))
    }

    /// A U-turn at a virtual node is forbidden, other turns there are free. At real nodes
    /// virtual edges stand for their original edge.
    fn turn_cost(&self, from: EdgeId, via: NodeId, to: EdgeId) -> f64 {
        if self.is_virtual_node(via) {
            return if from == to { f64::INFINITY } else { 0.0 };
        }
        let (Ok(from), Ok(to)) = (self.original_edge(from), self.original_edge(to)) else {
            return 0.0;
        };
        self.base.turn_cost(from, via, to)
    }
}
