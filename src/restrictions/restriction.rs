//! Turn restrictions expressed on graph edges

use crate::types::{EdgeId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestrictionType {
    /// The manoeuvre is forbidden
    No,
    /// The manoeuvre is the only one allowed after the from edge
    Only,
}

/// What the manoeuvre passes through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Via {
    Node(NodeId),
    /// `nodes[i]` joins `edges[i - 1]` (or the from edge) and `edges[i]` (or the to edge)
    Way { edges: Vec<EdgeId>, nodes: Vec<NodeId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRestriction {
    from_edges: Vec<EdgeId>,
    via: Via,
    to_edges: Vec<EdgeId>,
}

impl GraphRestriction {
    pub fn node(from: EdgeId, via_node: NodeId, to: EdgeId) -> Self {
        Self::node_multi(vec![from], via_node, vec![to])
    }

    /// Via-node restriction applying to every combination of `froms` and `tos`
    pub fn node_multi(froms: Vec<EdgeId>, via_node: NodeId, tos: Vec<EdgeId>) -> Self {
        Self {
            from_edges: froms,
            via: Via::Node(via_node),
            to_edges: tos,
        }
    }

    /// Via-way restriction; `via_nodes` has one more entry than `via_edges`
    pub fn way(from: EdgeId, via_edges: Vec<EdgeId>, to: EdgeId, via_nodes: Vec<NodeId>) -> Self {
        Self {
            from_edges: vec![from],
            via: Via::Way {
                edges: via_edges,
                nodes: via_nodes,
            },
            to_edges: vec![to],
        }
    }

    pub fn from_edges(&self) -> &[EdgeId] {
        &self.from_edges
    }

    pub fn to_edges(&self) -> &[EdgeId] {
        &self.to_edges
    }

    pub fn via(&self) -> &Via {
        &self.via
    }

    pub fn is_via_way(&self) -> bool {
        matches!(self.via, Via::Way { .. })
    }

    /// Via edges, empty for via-node restrictions
    pub fn via_edges(&self) -> &[EdgeId] {
        match &self.via {
            Via::Node(_) => &[],
            Via::Way { edges, .. } => edges,
        }
    }
}

impl std::fmt::Display for GraphRestriction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.via {
            Via::Node(node) => write!(
                f,
                "from {:?} via node {} to {:?}",
                self.from_edges, node, self.to_edges
            ),
            Via::Way { edges, nodes } => write!(
                f,
                "from {:?} via edges {:?} (nodes {:?}) to {:?}",
                self.from_edges, edges, nodes, self.to_edges
            ),
        }
    }
}
