//! Write side of a CH store
//!
//! The contraction itself happens elsewhere. The builder only records its outcome and
//! enforces the ordering the read side relies on: every shortcut hangs off its lower-level
//! node A, and shortcuts arrive grouped by node A in ascending level order, so the
//! shortcuts of one node form a contiguous run ending at `last_shortcut(node)`.

use log::debug;
use roadgraph_common::{Error, Result};
use rustc_hash::FxHashMap;

use crate::ch::storage::ChStorage;
use crate::types::{EdgeId, NodeId};

pub struct ChStorageBuilder<'a> {
    storage: &'a mut ChStorage,
    /// level -> node, for the distinct-level check
    used_levels: FxHashMap<i32, NodeId>,
}

impl<'a> ChStorageBuilder<'a> {
    pub fn new(storage: &'a mut ChStorage) -> Self {
        let mut used_levels = FxHashMap::default();
        for node in 0..storage.node_count() {
            let level = storage.level(node);
            if level >= 0 {
                used_levels.insert(level, node);
            }
        }
        Self {
            storage,
            used_levels,
        }
    }

    /// Level of every node equals its id
    pub fn set_identity_levels(&mut self) -> Result<()> {
        for node in 0..self.storage.node_count() {
            self.storage.set_level(node, node as i32)?;
        }
        self.used_levels = (0..self.storage.node_count())
            .map(|node| (node as i32, node))
            .collect();
        Ok(())
    }

    pub fn set_level(&mut self, node: NodeId, level: i32) -> Result<()> {
        if node >= self.storage.node_count() {
            return Err(Error::out_of_bounds("node", node, self.storage.node_count()));
        }
        if let Some(&other) = self.used_levels.get(&level) {
            if other != node {
                return Err(Error::InvalidHierarchy(format!(
                    "level {level} already assigned to node {other}"
                )));
            }
        }
        let previous = self.storage.level(node);
        self.storage.set_level(node, level)?;
        if previous >= 0 {
            self.used_levels.remove(&previous);
        }
        self.used_levels.insert(level, node);
        Ok(())
    }

    fn check_shortcut(
        &self,
        node_a: NodeId,
        node_b: NodeId,
        skip1: EdgeId,
        skip2: EdgeId,
    ) -> Result<()> {
        let node_count = self.storage.node_count();
        for node in [node_a, node_b] {
            if node >= node_count {
                return Err(Error::out_of_bounds("node", node, node_count));
            }
        }
        let level_a = self.storage.level(node_a);
        let level_b = self.storage.level(node_b);
        if level_a < 0 || level_b < 0 {
            return Err(Error::InvalidHierarchy(format!(
                "levels of shortcut nodes {node_a} and {node_b} must be set first"
            )));
        }
        // loops (edge-based only) connect a node to itself
        if node_a != node_b && level_a >= level_b {
            return Err(Error::InvalidHierarchy(format!(
                "node A {node_a} (level {level_a}) must be below node B {node_b} (level {level_b})"
            )));
        }
        let count = self.storage.shortcut_count();
        if count > 0 {
            let last_a = self.storage.raw_node_a(count - 1);
            let last_level = self.storage.level(last_a);
            if level_a < last_level {
                return Err(Error::InvalidHierarchy(format!(
                    "shortcut at node {node_a} (level {level_a}) added after node {last_a} \
                     (level {last_level})"
                )));
            }
        }
        let combined = self.storage.base_edge_count() + count;
        for skip in [skip1, skip2] {
            if skip >= combined {
                return Err(Error::InvalidHierarchy(format!(
                    "skipped edge {skip} does not exist yet ({combined} edges and shortcuts)"
                )));
            }
        }
        Ok(())
    }

    /// Returns the shortcut id (index into the shortcut table)
    pub fn add_shortcut_node_based(
        &mut self,
        node_a: NodeId,
        node_b: NodeId,
        access: u32,
        weight: f64,
        skip1: EdgeId,
        skip2: EdgeId,
    ) -> Result<u32> {
        self.check_shortcut(node_a, node_b, skip1, skip2)?;
        let shortcut = self
            .storage
            .push_shortcut(node_a, node_b, access, weight, skip1, skip2, None)?;
        self.storage.set_last_shortcut(node_a, shortcut);
        Ok(shortcut)
    }

    /// Like [`Self::add_shortcut_node_based`], plus the keys of the first and last original
    /// edges the shortcut covers
    #[allow(clippy::too_many_arguments)]
    pub fn add_shortcut_edge_based(
        &mut self,
        node_a: NodeId,
        node_b: NodeId,
        access: u32,
        weight: f64,
        skip1: EdgeId,
        skip2: EdgeId,
        orig_key_first: u32,
        orig_key_last: u32,
    ) -> Result<u32> {
        self.check_shortcut(node_a, node_b, skip1, skip2)?;
        let shortcut = self.storage.push_shortcut(
            node_a,
            node_b,
            access,
            weight,
            skip1,
            skip2,
            Some((orig_key_first, orig_key_last)),
        )?;
        self.storage.set_last_shortcut(node_a, shortcut);
        Ok(shortcut)
    }

    /// Rewrite the skipped edges of every shortcut, e.g. after renumbering shortcuts
    pub fn replace_skipped_edges(&mut self, mut mapping: impl FnMut(EdgeId) -> EdgeId) {
        let count = self.storage.shortcut_count();
        for shortcut in 0..count {
            let (skip1, skip2) = self.storage.raw_skipped(shortcut);
            self.storage
                .set_skipped_edges(shortcut, mapping(skip1), mapping(skip2));
        }
        debug!("replaced skipped edges of {count} shortcuts");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::storage::{SC_ACCESS_MASK, SC_FWD};
    use crate::storage::{BaseGraph, BaseGraphBuilder};

    /// 0 - 1 - 2 - 3 as a path of 10 m edges
    fn frozen_line() -> BaseGraph {
        let mut g = BaseGraphBuilder::new(4).create().unwrap();
        for n in 1..4 {
            g.add_edge(n - 1, n).unwrap().set_distance(10.0).unwrap();
        }
        g.freeze();
        g
    }

    #[test]
    fn test_levels_must_be_distinct() {
        let g = frozen_line();
        let mut ch = ChStorage::create(&g, "car", false).unwrap();
        let mut builder = ChStorageBuilder::new(&mut ch);
        builder.set_level(0, 1).unwrap();
        assert!(matches!(
            builder.set_level(1, 1),
            Err(Error::InvalidHierarchy(_))
        ));
        // moving a node frees its old level
        builder.set_level(0, 2).unwrap();
        builder.set_level(1, 1).unwrap();
    }

    #[test]
    fn test_shortcut_needs_levels() {
        let g = frozen_line();
        let mut ch = ChStorage::create(&g, "car", false).unwrap();
        let mut builder = ChStorageBuilder::new(&mut ch);
        assert!(matches!(
            builder.add_shortcut_node_based(0, 2, SC_FWD, 20.0, 0, 1),
            Err(Error::InvalidHierarchy(_))
        ));
    }

    #[test]
    fn test_node_a_must_be_lower() {
        let g = frozen_line();
        let mut ch = ChStorage::create(&g, "car", false).unwrap();
        let mut builder = ChStorageBuilder::new(&mut ch);
        builder.set_identity_levels().unwrap();
        assert!(matches!(
            builder.add_shortcut_node_based(2, 0, SC_FWD, 20.0, 0, 1),
            Err(Error::InvalidHierarchy(_))
        ));
    }

    #[test]
    fn test_ascending_order_and_last_shortcut() {
        let g = frozen_line();
        let mut ch = ChStorage::create(&g, "car", false).unwrap();
        {
            let mut builder = ChStorageBuilder::new(&mut ch);
            builder.set_level(1, 0).unwrap();
            builder.set_level(2, 1).unwrap();
            builder.set_level(0, 2).unwrap();
            builder.set_level(3, 3).unwrap();
            // contracting 1 connects 2 and 0, owned by the lower node 2
            builder
                .add_shortcut_node_based(2, 0, SC_ACCESS_MASK, 20.0, 1, 0)
                .unwrap();
            // contracting 2 connects 0 and 3 over shortcut 0 (id 3) and e2
            builder
                .add_shortcut_node_based(0, 3, SC_ACCESS_MASK, 30.0, 3, 2)
                .unwrap();
            // back to a lower level node
            assert!(matches!(
                builder.add_shortcut_node_based(2, 3, SC_FWD, 30.0, 1, 2),
                Err(Error::InvalidHierarchy(_))
            ));
            // skipped edge that does not exist yet
            assert!(matches!(
                builder.add_shortcut_node_based(0, 3, SC_FWD, 30.0, 9, 2),
                Err(Error::InvalidHierarchy(_))
            ));
        }
        assert_eq!(ch.shortcut_count(), 2);
        assert_eq!(ch.last_shortcut(2), 0);
        assert_eq!(ch.last_shortcut(0), 1);
        assert_eq!(ch.last_shortcut(1), -1);
        let of_two: Vec<_> = ch.shortcuts_of(2).map(|s| s.node_b).collect();
        assert_eq!(of_two, vec![0]);
    }

    #[test]
    fn test_replace_skipped_edges() {
        let g = frozen_line();
        let mut ch = ChStorage::create(&g, "car", false).unwrap();
        let mut builder = ChStorageBuilder::new(&mut ch);
        builder.set_identity_levels().unwrap();
        builder
            .add_shortcut_node_based(1, 3, SC_FWD, 20.0, 1, 2)
            .unwrap();
        builder.replace_skipped_edges(|e| e + 10);
        assert_eq!(ch.skipped_edge1(0).unwrap(), 11);
        assert_eq!(ch.skipped_edge2(0).unwrap(), 12);
    }
}
