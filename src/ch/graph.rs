//! Read view over a base graph and one of its CH stores
//!
//! Edges use the combined id space: base edges keep their ids, shortcut `s` is
//! `base_edge_count + s`. A node sees all of its base edges plus the shortcuts it owns as
//! node A, which always lead to a higher level.

use roadgraph_common::{Error, Result};

use crate::ch::storage::{ChStorage, Shortcut};
use crate::storage::{BaseGraph, EdgeState};
use crate::types::{EdgeId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChEdge {
    Base {
        edge: EdgeId,
        base_node: NodeId,
        adj_node: NodeId,
    },
    Shortcut {
        /// Combined id
        edge: EdgeId,
        shortcut: Shortcut,
    },
}

impl ChEdge {
    pub fn edge(&self) -> EdgeId {
        match self {
            ChEdge::Base { edge, .. } | ChEdge::Shortcut { edge, .. } => *edge,
        }
    }

    pub fn adj_node(&self) -> NodeId {
        match self {
            ChEdge::Base { adj_node, .. } => *adj_node,
            ChEdge::Shortcut { shortcut, .. } => shortcut.node_b,
        }
    }

    pub fn is_shortcut(&self) -> bool {
        matches!(self, ChEdge::Shortcut { .. })
    }
}

#[derive(Clone, Copy)]
pub struct RoutingChGraph<'a> {
    base: &'a BaseGraph,
    ch: &'a ChStorage,
}

impl<'a> RoutingChGraph<'a> {
    pub fn new(base: &'a BaseGraph, ch: &'a ChStorage) -> Result<Self> {
        if ch.node_count() != base.node_count() || ch.base_edge_count() != base.edge_count() {
            return Err(Error::IncompatibleConfig(format!(
                "CH '{}' does not belong to this graph",
                ch.name()
            )));
        }
        Ok(Self { base, ch })
    }

    pub fn base_graph(&self) -> &'a BaseGraph {
        self.base
    }

    pub fn storage(&self) -> &'a ChStorage {
        self.ch
    }

    pub fn node_count(&self) -> u32 {
        self.base.node_count()
    }

    /// Base edges plus shortcuts
    pub fn edge_count(&self) -> u32 {
        self.base.edge_count() + self.ch.shortcut_count()
    }

    pub fn level(&self, node: NodeId) -> i32 {
        self.ch.level(node)
    }

    pub fn is_shortcut(&self, edge: EdgeId) -> bool {
        edge >= self.base.edge_count()
    }

    /// Base edges of `node` followed by its upward shortcuts
    pub fn edges(&self, node: NodeId) -> impl Iterator<Item = ChEdge> + 'a {
        let ch = self.ch;
        let base = self.base.edges(node).map(|e| ChEdge::Base {
            edge: e.edge(),
            base_node: e.base_node(),
            adj_node: e.adj_node(),
        });
        let shortcuts = ch.shortcuts_of(node).map(move |shortcut| ChEdge::Shortcut {
            edge: ch.to_combined_id(shortcut.id),
            shortcut,
        });
        base.chain(shortcuts)
    }

    fn endpoints(&self, edge: EdgeId) -> Result<(NodeId, NodeId)> {
        match self.ch.shortcut_for_combined_id(edge) {
            None => {
                let state = self.base.edge_state(edge, None)?;
                Ok((state.base_node(), state.adj_node()))
            }
            Some(shortcut) => {
                let shortcut = self.ch.shortcut(shortcut)?;
                Ok((shortcut.node_a, shortcut.node_b))
            }
        }
    }

    /// Base edges covered by `edge`, in travel order when leaving `from_node`
    pub fn unpack(&self, edge: EdgeId, from_node: NodeId) -> Result<Vec<EdgeId>> {
        let mut path = Vec::new();
        self.unpack_into(edge, from_node, &mut path)?;
        Ok(path)
    }

    /// Appends to `path` and returns the node reached
    fn unpack_into(&self, edge: EdgeId, from: NodeId, path: &mut Vec<EdgeId>) -> Result<NodeId> {
        let (a, b) = self.endpoints(edge)?;
        let to = if from == a {
            b
        } else if from == b {
            a
        } else {
            return Err(Error::InvalidArgument(format!(
                "edge {edge} ({a}-{b}) does not touch node {from}"
            )));
        };

        let Some(shortcut) = self.ch.shortcut_for_combined_id(edge) else {
            path.push(edge);
            return Ok(to);
        };

        let (skip1, skip2) = self.ch.raw_skipped(shortcut);
        let touches = |e: EdgeId| -> Result<bool> {
            let (x, y) = self.endpoints(e)?;
            Ok(x == from || y == from)
        };
        let (first, second) = match (touches(skip1)?, touches(skip2)?) {
            (true, false) => (skip1, skip2),
            (false, true) => (skip2, skip1),
            (true, true) if from == a => (skip1, skip2),
            (true, true) => (skip2, skip1),
            (false, false) => {
                return Err(Error::InvalidHierarchy(format!(
                    "shortcut {edge}: neither skipped edge {skip1} nor {skip2} touches node {from}"
                )))
            }
        };
        let middle = self.unpack_into(first, from, path)?;
        let end = self.unpack_into(second, middle, path)?;
        if end != to {
            return Err(Error::InvalidHierarchy(format!(
                "shortcut {edge} unpacks to node {end} instead of {to}"
            )));
        }
        Ok(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::builder::ChStorageBuilder;
    use crate::ch::storage::SC_ACCESS_MASK;
    use crate::storage::BaseGraphBuilder;

    /// 0 -e0- 1 -e1- 2 -e2- 3
    fn line() -> BaseGraph {
        let mut g = BaseGraphBuilder::new(4).create().unwrap();
        for n in 1..4 {
            g.add_edge(n - 1, n).unwrap().set_distance(10.0).unwrap();
        }
        g.freeze();
        g
    }

    /// contraction order 1, 2, then 0 and 3
    fn contracted(g: &BaseGraph) -> ChStorage {
        let mut ch = ChStorage::create(g, "car", false).unwrap();
        let mut builder = ChStorageBuilder::new(&mut ch);
        builder.set_level(1, 0).unwrap();
        builder.set_level(2, 1).unwrap();
        builder.set_level(0, 2).unwrap();
        builder.set_level(3, 3).unwrap();
        // id 3: 2-0 via 1, owned by the lower node 2
        builder
            .add_shortcut_node_based(2, 0, SC_ACCESS_MASK, 20.0, 1, 0)
            .unwrap();
        // id 4: 0-3 via 2, skipping the shortcut above and e2
        builder
            .add_shortcut_node_based(0, 3, SC_ACCESS_MASK, 30.0, 3, 2)
            .unwrap();
        ch
    }

    #[test]
    fn test_edges_include_shortcuts() {
        let g = line();
        let ch = contracted(&g);
        let graph = RoutingChGraph::new(&g, &ch).unwrap();
        assert_eq!(graph.edge_count(), 5);
        let at_two: Vec<_> = graph.edges(2).collect();
        assert_eq!(at_two.len(), 3);
        assert_eq!(at_two.iter().filter(|e| e.is_shortcut()).count(), 1);
        assert_eq!(graph.edges(0).count(), 2);
        assert_eq!(graph.edges(1).filter(|e| e.is_shortcut()).count(), 0);
        assert!(graph.is_shortcut(4));
    }

    #[test]
    fn test_unpack_in_both_directions() {
        let g = line();
        let ch = contracted(&g);
        let graph = RoutingChGraph::new(&g, &ch).unwrap();
        assert_eq!(graph.unpack(3, 0).unwrap(), vec![0, 1]);
        assert_eq!(graph.unpack(3, 2).unwrap(), vec![1, 0]);
        assert_eq!(graph.unpack(4, 3).unwrap(), vec![2, 1, 0]);
        assert_eq!(graph.unpack(4, 0).unwrap(), vec![0, 1, 2]);
        assert_eq!(graph.unpack(1, 1).unwrap(), vec![1]);
    }

    #[test]
    fn test_unpack_wrong_node() {
        let g = line();
        let ch = contracted(&g);
        let graph = RoutingChGraph::new(&g, &ch).unwrap();
        assert!(matches!(
            graph.unpack(3, 3),
            Err(Error::InvalidArgument(_))
        ));
    }
}
