//! Encodes turn restrictions as infinite turn costs
//!
//! Via-node restrictions forbid turns at a single node directly. A via-way restriction
//! (from edge, via edge, to edge) cannot be written as turn costs on its own: forbidding
//! `via -> to` would also block traffic that entered the via edge from anywhere else.
//! Each via edge therefore gets an artificial twin with the same geometry. Restricted
//! traffic is moved onto the twin and every limit is written there, so the real via edge
//! keeps all its turns for entrances no restriction names:
//!
//! * NO: the from edge may not enter the real via edge, the twin may not continue onto
//!   the to edge.
//! * ONLY: the from edge may only continue onto the twin, the twin may only continue onto
//!   the to edge.
//!
//! All restrictions on one via edge share its twin. Their exit limits add up, so a from
//! edge of one restriction is also bound by the limits of the others on the same via edge.
//!
//! The two copies are never connected by a turn, so a route cannot switch between them.

use log::{debug, info, warn};
use roadgraph_common::{Error, Result};
use rustc_hash::FxHashMap;

use crate::restrictions::restriction::{GraphRestriction, RestrictionType, Via};
use crate::storage::{BaseGraph, EdgeState};
use crate::types::{EdgeId, NodeId};

/// Counters returned by [`RestrictionSetter::set_restrictions`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestrictionStats {
    pub via_node: usize,
    pub via_way: usize,
    /// Via-way restrictions this setter cannot express (via chains of several edges)
    pub skipped: usize,
    pub artificial_edges: usize,
    pub forbidden_turns: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    ViaNode,
    ViaWay,
    Skip,
}

pub struct RestrictionSetter<'a> {
    graph: &'a mut BaseGraph,
    artificial: FxHashMap<EdgeId, EdgeId>,
    stats: RestrictionStats,
}

impl<'a> RestrictionSetter<'a> {
    pub fn new(graph: &'a mut BaseGraph) -> Self {
        Self {
            graph,
            artificial: FxHashMap::default(),
            stats: RestrictionStats::default(),
        }
    }

    /// Via edge to artificial twin
    pub fn artificial_edges(&self) -> &FxHashMap<EdgeId, EdgeId> {
        &self.artificial
    }

    /// Apply all restrictions. The whole batch is validated first, so an error leaves the
    /// graph unchanged.
    pub fn set_restrictions(
        &mut self,
        restrictions: &[(GraphRestriction, RestrictionType)],
    ) -> Result<RestrictionStats> {
        if self.graph.is_frozen() {
            return Err(Error::Frozen("set restrictions"));
        }
        if !self.graph.has_turn_costs() {
            return Err(Error::Config(
                "restrictions need a graph with turn costs".to_string(),
            ));
        }

        let plans = self.validate(restrictions)?;
        self.stats = RestrictionStats::default();

        // pass 1: one artificial twin per via edge
        for ((restriction, _), plan) in restrictions.iter().zip(&plans) {
            if *plan != Plan::ViaWay {
                continue;
            }
            for &via_edge in restriction.via_edges() {
                if !self.artificial.contains_key(&via_edge) {
                    let twin = self.graph.copy_edge(via_edge, true)?;
                    self.artificial.insert(via_edge, twin);
                    self.stats.artificial_edges += 1;
                }
            }
        }
        debug!("created {} artificial edges", self.stats.artificial_edges);

        // pass 2: via-way
        for ((restriction, kind), plan) in restrictions.iter().zip(&plans) {
            if *plan == Plan::ViaWay {
                self.apply_via_way(restriction, *kind)?;
                self.stats.via_way += 1;
            }
        }

        // pass 3: via-node
        for ((restriction, kind), plan) in restrictions.iter().zip(&plans) {
            if *plan == Plan::ViaNode {
                self.apply_via_node(restriction, *kind)?;
                self.stats.via_node += 1;
            }
        }

        info!(
            "applied {} via-node and {} via-way restrictions ({} skipped, {} artificial edges, {} forbidden turns)",
            self.stats.via_node,
            self.stats.via_way,
            self.stats.skipped,
            self.stats.artificial_edges,
            self.stats.forbidden_turns
        );
        Ok(self.stats.clone())
    }

    fn validate(&mut self, restrictions: &[(GraphRestriction, RestrictionType)]) -> Result<Vec<Plan>> {
        let mut plans = Vec::with_capacity(restrictions.len());
        let mut only_by_via: FxHashMap<EdgeId, usize> = FxHashMap::default();
        let mut skipped = 0;

        for (i, (restriction, kind)) in restrictions.iter().enumerate() {
            if restriction.from_edges().is_empty() || restriction.to_edges().is_empty() {
                return Err(Error::InvalidRestriction(format!(
                    "{restriction} has no from or to edge"
                )));
            }

            match restriction.via() {
                Via::Node(node) => {
                    if *node >= self.graph.node_count() {
                        return Err(Error::out_of_bounds("node", *node, self.graph.node_count()));
                    }
                    for &edge in restriction.from_edges().iter().chain(restriction.to_edges()) {
                        self.require_touch(restriction, edge, *node)?;
                    }
                    plans.push(Plan::ViaNode);
                }
                Via::Way { edges, nodes } => {
                    if edges.is_empty() || nodes.len() != edges.len() + 1 {
                        return Err(Error::InvalidRestriction(format!(
                            "{restriction} needs one more via node than via edges"
                        )));
                    }
                    if edges.len() > 1 {
                        warn!("skipping restriction {restriction}: via chains of several edges are not supported");
                        skipped += 1;
                        plans.push(Plan::Skip);
                        continue;
                    }

                    let via_edge = edges[0];
                    let state = self.graph.edge_state(via_edge, None)?;
                    let (a, b) = (state.base_node(), state.adj_node());
                    if !((a == nodes[0] && b == nodes[1]) || (a == nodes[1] && b == nodes[0])) {
                        return Err(Error::InvalidRestriction(format!(
                            "{restriction}: via edge {via_edge} does not join nodes {} and {}",
                            nodes[0], nodes[1]
                        )));
                    }
                    for &from in restriction.from_edges() {
                        self.require_touch(restriction, from, nodes[0])?;
                    }
                    for &to in restriction.to_edges() {
                        self.require_touch(restriction, to, nodes[1])?;
                    }

                    if *kind == RestrictionType::Only {
                        if let Some(&other) = only_by_via.get(&via_edge) {
                            return Err(Error::ConflictingRestrictions(format!(
                                "ONLY restrictions {} and {} share via edge {via_edge}",
                                restrictions[other].0, restriction
                            )));
                        }
                        only_by_via.insert(via_edge, i);
                    }
                    plans.push(Plan::ViaWay);
                }
            }
        }

        self.stats.skipped = skipped;
        Ok(plans)
    }

    fn require_touch(&self, restriction: &GraphRestriction, edge: EdgeId, node: NodeId) -> Result<()> {
        let state = self.graph.edge_state(edge, None)?;
        if state.base_node() != node && state.adj_node() != node {
            return Err(Error::InvalidRestriction(format!(
                "{restriction}: edge {edge} does not touch node {node}"
            )));
        }
        Ok(())
    }

    /// The edge itself plus its artificial twin, if any
    fn with_twin(&self, edge: EdgeId) -> Vec<EdgeId> {
        match self.artificial.get(&edge) {
            Some(&twin) => vec![edge, twin],
            None => vec![edge],
        }
    }

    fn edges_at(&self, node: NodeId) -> Vec<EdgeId> {
        self.graph.edges(node).map(|e| e.edge()).collect()
    }

    fn forbid(&mut self, from: EdgeId, via: NodeId, to: EdgeId) -> Result<()> {
        self.graph.set_turn_cost(from, via, to, f64::INFINITY)?;
        self.stats.forbidden_turns += 1;
        Ok(())
    }

    fn apply_via_way(&mut self, restriction: &GraphRestriction, kind: RestrictionType) -> Result<()> {
        let Via::Way { edges, nodes } = restriction.via() else {
            return Ok(());
        };
        let via = edges[0];
        let Some(&twin) = self.artificial.get(&via) else {
            return Err(Error::InvalidRestriction(format!(
                "{restriction}: via edge {via} has no artificial twin"
            )));
        };
        let (node_a, node_b) = (nodes[0], nodes[1]);
        let froms = self.with_twin(restriction.from_edges()[0]);
        let tos = self.with_twin(restriction.to_edges()[0]);

        for node in [node_a, node_b] {
            self.forbid(via, node, twin)?;
            self.forbid(twin, node, via)?;
        }

        match kind {
            RestrictionType::No => {
                for &from in &froms {
                    self.forbid(from, node_a, via)?;
                }
                for &to in &tos {
                    self.forbid(twin, node_b, to)?;
                }
            }
            RestrictionType::Only => {
                for edge in self.edges_at(node_a) {
                    if edge == twin {
                        continue;
                    }
                    for &from in &froms {
                        self.forbid(from, node_a, edge)?;
                    }
                }
                for edge in self.edges_at(node_b) {
                    if !tos.contains(&edge) {
                        self.forbid(twin, node_b, edge)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_via_node(&mut self, restriction: &GraphRestriction, kind: RestrictionType) -> Result<()> {
        let Via::Node(node) = *restriction.via() else {
            return Ok(());
        };
        let froms: Vec<EdgeId> = restriction
            .from_edges()
            .iter()
            .flat_map(|&e| self.with_twin(e))
            .collect();
        let tos: Vec<EdgeId> = restriction
            .to_edges()
            .iter()
            .flat_map(|&e| self.with_twin(e))
            .collect();

        match kind {
            RestrictionType::No => {
                for &from in &froms {
                    for &to in &tos {
                        self.forbid(from, node, to)?;
                    }
                }
            }
            RestrictionType::Only => {
                let others: Vec<EdgeId> = self
                    .edges_at(node)
                    .into_iter()
                    .filter(|e| !tos.contains(e))
                    .collect();
                for &from in &froms {
                    for &edge in &others {
                        self.forbid(from, node, edge)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BaseGraphBuilder;

    //   0 --e0-- 1 --e1-- 2 --e2-- 3
    //                     |
    //                     e3
    //                     |
    //                     4
    fn graph() -> BaseGraph {
        let mut g = BaseGraphBuilder::new(4)
            .with_turn_costs(true)
            .create()
            .unwrap();
        g.add_edge(0, 1).unwrap();
        g.add_edge(1, 2).unwrap();
        g.add_edge(2, 3).unwrap();
        g.add_edge(2, 4).unwrap();
        g
    }

    #[test]
    fn test_via_node_no() {
        let mut g = graph();
        let stats = RestrictionSetter::new(&mut g)
            .set_restrictions(&[(GraphRestriction::node(1, 2, 2), RestrictionType::No)])
            .unwrap();
        assert_eq!(stats.via_node, 1);
        assert_eq!(stats.artificial_edges, 0);
        assert_eq!(g.turn_cost(1, 2, 2), f64::INFINITY);
        assert_eq!(g.turn_cost(1, 2, 3), 0.0);
    }

    #[test]
    fn test_via_node_only() {
        let mut g = graph();
        RestrictionSetter::new(&mut g)
            .set_restrictions(&[(GraphRestriction::node(1, 2, 3), RestrictionType::Only)])
            .unwrap();
        assert_eq!(g.turn_cost(1, 2, 3), 0.0);
        assert_eq!(g.turn_cost(1, 2, 2), f64::INFINITY);
        // u-turn back onto the from edge is another turn and forbidden too
        assert_eq!(g.turn_cost(1, 2, 1), f64::INFINITY);
        // other from edges are unaffected
        assert_eq!(g.turn_cost(2, 2, 3), 0.0);
    }

    #[test]
    fn test_via_way_creates_one_twin_per_via_edge() {
        let mut g = graph();
        let mut setter = RestrictionSetter::new(&mut g);
        let stats = setter
            .set_restrictions(&[
                (GraphRestriction::way(0, vec![1], 2, vec![1, 2]), RestrictionType::No),
                (GraphRestriction::way(0, vec![1], 3, vec![1, 2]), RestrictionType::No),
            ])
            .unwrap();
        assert_eq!(stats.artificial_edges, 1);
        assert_eq!(stats.via_way, 2);
        let twin = setter.artificial_edges()[&1];
        assert_eq!(twin, 4);
        assert_eq!(g.edge_count(), 5);
    }

    #[test]
    fn test_twins_are_mutually_unreachable() {
        let mut g = graph();
        RestrictionSetter::new(&mut g)
            .set_restrictions(&[(
                GraphRestriction::way(0, vec![1], 2, vec![1, 2]),
                RestrictionType::No,
            )])
            .unwrap();
        for node in [1, 2] {
            assert_eq!(g.turn_cost(1, node, 4), f64::INFINITY);
            assert_eq!(g.turn_cost(4, node, 1), f64::INFINITY);
        }
    }

    #[test]
    fn test_no_via_way_limits_the_twin_only() {
        let mut g = graph();
        RestrictionSetter::new(&mut g)
            .set_restrictions(&[(
                GraphRestriction::way(0, vec![1], 2, vec![1, 2]),
                RestrictionType::No,
            )])
            .unwrap();
        assert_eq!(g.turn_cost(0, 1, 1), f64::INFINITY);
        assert_eq!(g.turn_cost(0, 1, 4), 0.0);
        assert_eq!(g.turn_cost(4, 2, 2), f64::INFINITY);
        assert_eq!(g.turn_cost(4, 2, 3), 0.0);
        // the real via edge keeps its exits
        assert_eq!(g.turn_cost(1, 2, 2), 0.0);
        assert_eq!(g.turn_cost(1, 2, 3), 0.0);
    }

    #[test]
    fn test_rejected_batch_leaves_graph_untouched() {
        let mut g = graph();
        let result = RestrictionSetter::new(&mut g).set_restrictions(&[
            (GraphRestriction::way(0, vec![1], 2, vec![1, 2]), RestrictionType::Only),
            (GraphRestriction::way(0, vec![1], 3, vec![1, 2]), RestrictionType::Only),
        ]);
        assert!(matches!(result, Err(Error::ConflictingRestrictions(_))));
        assert_eq!(g.edge_count(), 4);
        assert_eq!(g.turn_cost_entry_count(), 0);
    }

    #[test]
    fn test_disconnected_restriction_is_invalid() {
        let mut g = graph();
        let result = RestrictionSetter::new(&mut g)
            .set_restrictions(&[(GraphRestriction::node(0, 2, 2), RestrictionType::No)]);
        assert!(matches!(result, Err(Error::InvalidRestriction(_))));

        let result = RestrictionSetter::new(&mut g).set_restrictions(&[(
            GraphRestriction::way(0, vec![2], 3, vec![1, 2]),
            RestrictionType::No,
        )]);
        assert!(matches!(result, Err(Error::InvalidRestriction(_))));
    }

    #[test]
    fn test_via_chain_is_skipped() {
        let mut g = graph();
        let stats = RestrictionSetter::new(&mut g)
            .set_restrictions(&[(
                GraphRestriction::way(0, vec![1, 2], 3, vec![1, 2, 3]),
                RestrictionType::No,
            )])
            .unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.via_way, 0);
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn test_needs_turn_costs() {
        let mut g = BaseGraphBuilder::new(4).create().unwrap();
        g.add_edge(0, 1).unwrap();
        g.add_edge(1, 2).unwrap();
        let result = RestrictionSetter::new(&mut g)
            .set_restrictions(&[(GraphRestriction::node(0, 1, 1), RestrictionType::No)]);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
