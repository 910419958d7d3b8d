//! Contraction hierarchy store for one profile
//!
//! ```text
//! nodes_ch_<name>:  level i32 | last_shortcut i32
//! shortcuts_<name>: node_a i32 | node_b i32 | weight_and_access i32 | skip1 i32 | skip2 i32
//!                   [ | orig_key_first i32 | orig_key_last i32 ]   (edge-based only)
//! ```
//!
//! `weight_and_access` is `(weight_millis << 2) | access`, with bit 0 the forward and bit 1
//! the backward direction. Shortcut ids are indices into the shortcut table; skipped edges
//! use the combined id space where `0..base_edge_count` are base edges and shortcut `s` is
//! `base_edge_count + s`.

use log::{debug, info, warn};
use roadgraph_common::{Error, Result};
use roadgraph_io::DataAccess;

use crate::ch::ordering::NodeOrderingProvider;
use crate::storage::BaseGraph;
use crate::types::{EdgeId, NodeId, MAX_ID_COUNT, NO_REF};

pub const CH_NODES_VERSION: i32 = 1;
pub const SHORTCUTS_VERSION: i32 = 1;

pub const SC_FWD: u32 = 1;
pub const SC_BWD: u32 = 2;
pub const SC_ACCESS_MASK: u32 = SC_FWD | SC_BWD;

/// Stored weight meaning "infinite"
pub const MAX_WEIGHT_INT: i32 = i32::MAX >> 2;
const WEIGHT_SCALE: f64 = 1000.0;
/// Smallest storable shortcut weight
pub const MIN_WEIGHT: f64 = 1.0 / WEIGHT_SCALE;

const N_LEVEL: u64 = 0;
const N_LAST_SC: u64 = 4;
const NODE_BYTES: u64 = 8;

const S_NODEA: u64 = 0;
const S_NODEB: u64 = 4;
const S_WEIGHT: u64 = 8;
const S_SKIP1: u64 = 12;
const S_SKIP2: u64 = 16;
const S_ORIG_FIRST: u64 = 20;
const S_ORIG_LAST: u64 = 24;

const H_VERSION: usize = 0;
const H_STRIDE: usize = 1;
const H_COUNT: usize = 2;
const H_EXCEEDED: usize = 3;
const H_EDGE_BASED: usize = 4;
const H_BASE_EDGES: usize = 5;

/// Reported when a shortcut weight had to be clamped up to [`MIN_WEIGHT`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowWeightShortcut {
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub shortcut: u32,
    pub weight: f64,
    pub min_weight: f64,
}

/// One decoded shortcut
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shortcut {
    pub id: u32,
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub access: u32,
    pub weight: f64,
    pub skipped_edge1: EdgeId,
    pub skipped_edge2: EdgeId,
    /// Edge-based only
    pub orig_edge_key_first: Option<u32>,
    pub orig_edge_key_last: Option<u32>,
}

impl Shortcut {
    pub fn is_forward(&self) -> bool {
        self.access & SC_FWD != 0
    }

    pub fn is_backward(&self) -> bool {
        self.access & SC_BWD != 0
    }
}

type LowWeightConsumer = Box<dyn Fn(&LowWeightShortcut) + Send + Sync>;

pub struct ChStorage {
    name: String,
    nodes: Box<dyn DataAccess>,
    shortcuts: Box<dyn DataAccess>,
    edge_based: bool,
    shortcut_stride: u64,
    node_count: u32,
    base_edge_count: u32,
    shortcut_count: u32,
    exceeded: u32,
    low_weight_consumer: Option<LowWeightConsumer>,
}

impl std::fmt::Debug for ChStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChStorage")
            .field("name", &self.name)
            .field("edge_based", &self.edge_based)
            .field("nodes", &self.node_count)
            .field("shortcuts", &self.shortcut_count)
            .finish()
    }
}

fn table_names(name: &str) -> (String, String) {
    (format!("nodes_ch_{name}"), format!("shortcuts_{name}"))
}

fn mode_name(edge_based: bool) -> &'static str {
    if edge_based {
        "edge-based"
    } else {
        "node-based"
    }
}

impl ChStorage {
    fn allocate(base: &BaseGraph, name: &str, edge_based: bool) -> Result<Self> {
        if !base.is_frozen() {
            return Err(Error::NotFrozen("creating a CH storage"));
        }
        let (nodes_name, shortcuts_name) = table_names(name);
        let dir = base.directory();
        Ok(Self {
            name: name.to_string(),
            nodes: dir.create(&nodes_name)?,
            shortcuts: dir.create(&shortcuts_name)?,
            edge_based,
            shortcut_stride: if edge_based { 28 } else { 20 },
            node_count: base.node_count(),
            base_edge_count: base.edge_count(),
            shortcut_count: 0,
            exceeded: 0,
            low_weight_consumer: None,
        })
    }

    /// Empty CH for the frozen `base`; every level starts unset (-1)
    pub fn create(base: &BaseGraph, name: &str, edge_based: bool) -> Result<Self> {
        let mut ch = Self::allocate(base, name, edge_based)?;
        let initial = base.initial_capacity();
        ch.nodes
            .create(initial.max(ch.node_count as u64 * NODE_BYTES))?;
        ch.shortcuts.create(initial)?;
        for node in 0..ch.node_count {
            let pos = node as u64 * NODE_BYTES;
            ch.nodes.set_int(pos + N_LEVEL, NO_REF);
            ch.nodes.set_int(pos + N_LAST_SC, NO_REF);
        }
        info!(
            "created {} CH '{}' for {} nodes",
            mode_name(edge_based),
            name,
            ch.node_count
        );
        Ok(ch)
    }

    /// Previously flushed CH, `None` if nothing was stored under `name`
    pub fn load_existing(base: &BaseGraph, name: &str, edge_based: bool) -> Result<Option<Self>> {
        let mut ch = Self::allocate(base, name, edge_based)?;
        if !ch.nodes.load_existing()? {
            return Ok(None);
        }
        if !ch.shortcuts.load_existing()? {
            return Err(Error::Corrupt {
                name: ch.shortcuts.name().to_string(),
                reason: "CH levels exist but shortcuts are missing".to_string(),
            });
        }

        for (data, expected) in [
            (&ch.nodes, CH_NODES_VERSION),
            (&ch.shortcuts, SHORTCUTS_VERSION),
        ] {
            let found = data.get_header(H_VERSION);
            if found != expected {
                return Err(Error::VersionMismatch {
                    name: data.name().to_string(),
                    expected,
                    found,
                });
            }
        }

        let stored_edge_based = ch.shortcuts.get_header(H_EDGE_BASED) == 1;
        if stored_edge_based != edge_based {
            return Err(Error::IncompatibleConfig(format!(
                "CH '{name}' was stored {} but requested {}",
                mode_name(stored_edge_based),
                mode_name(edge_based)
            )));
        }
        let stored_nodes = ch.nodes.get_header(H_COUNT) as u32;
        let stored_edges = ch.shortcuts.get_header(H_BASE_EDGES) as u32;
        if stored_nodes != base.node_count() || stored_edges != base.edge_count() {
            return Err(Error::IncompatibleConfig(format!(
                "CH '{name}' was prepared for {stored_nodes} nodes / {stored_edges} edges, \
                 graph has {} / {}",
                base.node_count(),
                base.edge_count()
            )));
        }

        ch.shortcut_count = ch.shortcuts.get_header(H_COUNT) as u32;
        ch.exceeded = ch.shortcuts.get_header(H_EXCEEDED) as u32;
        info!("loaded CH '{}' with {} shortcuts", name, ch.shortcut_count);
        Ok(Some(ch))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.nodes.set_header(H_VERSION, CH_NODES_VERSION);
        self.nodes.set_header(H_STRIDE, NODE_BYTES as i32);
        self.nodes.set_header(H_COUNT, self.node_count as i32);

        self.shortcuts.set_header(H_VERSION, SHORTCUTS_VERSION);
        self.shortcuts
            .set_header(H_STRIDE, self.shortcut_stride as i32);
        self.shortcuts.set_header(H_COUNT, self.shortcut_count as i32);
        self.shortcuts.set_header(H_EXCEEDED, self.exceeded as i32);
        self.shortcuts
            .set_header(H_EDGE_BASED, self.edge_based as i32);
        self.shortcuts
            .set_header(H_BASE_EDGES, self.base_edge_count as i32);

        self.nodes.flush()?;
        self.shortcuts.flush()?;
        if self.exceeded > 0 {
            warn!(
                "CH '{}': {} shortcuts exceeded the maximum weight",
                self.name, self.exceeded
            );
        }
        info!(
            "flushed CH '{}' with {} shortcuts",
            self.name, self.shortcut_count
        );
        Ok(())
    }

    pub fn close(&mut self) {
        self.nodes.close();
        self.shortcuts.close();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_edge_based(&self) -> bool {
        self.edge_based
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    pub fn base_edge_count(&self) -> u32 {
        self.base_edge_count
    }

    pub fn shortcut_count(&self) -> u32 {
        self.shortcut_count
    }

    /// Shortcuts whose weight was stored as infinite
    pub fn num_shortcuts_exceeding_weight(&self) -> u32 {
        self.exceeded
    }

    /// Called whenever a shortcut weight below [`MIN_WEIGHT`] is clamped up
    pub fn set_low_shortcut_weight_consumer(
        &mut self,
        consumer: impl Fn(&LowWeightShortcut) + Send + Sync + 'static,
    ) {
        self.low_weight_consumer = Some(Box::new(consumer));
    }

    // ---- levels ----

    fn check_node(&self, node: NodeId) -> Result<()> {
        if node >= self.node_count {
            return Err(Error::out_of_bounds("node", node, self.node_count));
        }
        Ok(())
    }

    /// Contraction level, -1 while unset
    pub fn level(&self, node: NodeId) -> i32 {
        assert!(node < self.node_count, "node {node} out of bounds");
        self.nodes.get_int(node as u64 * NODE_BYTES + N_LEVEL)
    }

    pub fn set_level(&mut self, node: NodeId, level: i32) -> Result<()> {
        self.check_node(node)?;
        if level < 0 || level as u32 >= self.node_count {
            return Err(Error::InvalidHierarchy(format!(
                "level {level} of node {node} outside 0..{}",
                self.node_count
            )));
        }
        self.nodes.set_int(node as u64 * NODE_BYTES + N_LEVEL, level);
        Ok(())
    }

    /// Id of the last shortcut with `node` as node A, -1 if none
    pub fn last_shortcut(&self, node: NodeId) -> i32 {
        assert!(node < self.node_count, "node {node} out of bounds");
        self.nodes.get_int(node as u64 * NODE_BYTES + N_LAST_SC)
    }

    pub(crate) fn set_last_shortcut(&mut self, node: NodeId, shortcut: u32) {
        self.nodes
            .set_int(node as u64 * NODE_BYTES + N_LAST_SC, shortcut as i32);
    }

    /// Level to node map; fails unless every node has a distinct level
    pub fn node_ordering_provider(&self) -> Result<NodeOrderingProvider> {
        let mut order = vec![NO_REF; self.node_count as usize];
        for node in 0..self.node_count {
            let level = self.level(node);
            if level < 0 {
                return Err(Error::InvalidHierarchy(format!(
                    "level of node {node} is not set"
                )));
            }
            let slot = &mut order[level as usize];
            if *slot != NO_REF {
                return Err(Error::InvalidHierarchy(format!(
                    "nodes {} and {node} share level {level}",
                    *slot
                )));
            }
            *slot = node as i32;
        }
        Ok(NodeOrderingProvider::new(
            order.into_iter().map(|n| n as NodeId).collect(),
        ))
    }

    // ---- shortcuts ----

    #[inline]
    fn shortcut_pos(&self, shortcut: u32) -> u64 {
        shortcut as u64 * self.shortcut_stride
    }

    fn check_shortcut(&self, shortcut: u32) -> Result<()> {
        if shortcut >= self.shortcut_count {
            return Err(Error::out_of_bounds(
                "shortcut",
                shortcut,
                self.shortcut_count,
            ));
        }
        Ok(())
    }

    fn require_edge_based(&self, operation: &'static str) -> Result<()> {
        if !self.edge_based {
            return Err(Error::MixedChMode {
                operation,
                mode: mode_name(false),
            });
        }
        Ok(())
    }

    /// Encode a weight, saturating to infinity and clamping tiny values up
    fn weight_to_int(&mut self, weight: f64, node_a: NodeId, node_b: NodeId) -> Result<i32> {
        if weight.is_nan() || weight < 0.0 {
            return Err(Error::InvalidValue {
                what: "shortcut weight",
                value: weight,
            });
        }
        let weight = if weight < MIN_WEIGHT {
            let low = LowWeightShortcut {
                node_a,
                node_b,
                shortcut: self.shortcut_count,
                weight,
                min_weight: MIN_WEIGHT,
            };
            match &self.low_weight_consumer {
                Some(consumer) => consumer(&low),
                None => debug!("clamped low shortcut weight {low:?}"),
            }
            MIN_WEIGHT
        } else {
            weight
        };
        // anything that rounds onto the ceiling would decode as infinite
        let rounded = (weight * WEIGHT_SCALE).round();
        if rounded >= MAX_WEIGHT_INT as f64 {
            self.exceeded += 1;
            return Ok(MAX_WEIGHT_INT);
        }
        Ok(rounded as i32)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn push_shortcut(
        &mut self,
        node_a: NodeId,
        node_b: NodeId,
        access: u32,
        weight: f64,
        skip1: EdgeId,
        skip2: EdgeId,
        orig_keys: Option<(u32, u32)>,
    ) -> Result<u32> {
        match (self.edge_based, orig_keys.is_some()) {
            (true, false) => {
                return Err(Error::MixedChMode {
                    operation: "add node-based shortcut",
                    mode: mode_name(true),
                })
            }
            (false, true) => {
                return Err(Error::MixedChMode {
                    operation: "add edge-based shortcut",
                    mode: mode_name(false),
                })
            }
            _ => {}
        }
        if self.base_edge_count as u64 + self.shortcut_count as u64 >= MAX_ID_COUNT {
            return Err(Error::CapacityExceeded {
                what: "shortcut",
                limit: MAX_ID_COUNT - self.base_edge_count as u64,
            });
        }
        if access > SC_ACCESS_MASK {
            return Err(Error::InvalidArgument(format!(
                "shortcut access flags {access} exceed {SC_ACCESS_MASK}"
            )));
        }

        let weight_int = self.weight_to_int(weight, node_a, node_b)?;
        let shortcut = self.shortcut_count;
        let pos = self.shortcut_pos(shortcut);
        self.shortcuts.ensure_capacity(pos + self.shortcut_stride)?;
        self.shortcuts.set_int(pos + S_NODEA, node_a as i32);
        self.shortcuts.set_int(pos + S_NODEB, node_b as i32);
        self.shortcuts
            .set_int(pos + S_WEIGHT, (weight_int << 2) | access as i32);
        self.shortcuts.set_int(pos + S_SKIP1, skip1 as i32);
        self.shortcuts.set_int(pos + S_SKIP2, skip2 as i32);
        if let Some((first, last)) = orig_keys {
            self.shortcuts.set_int(pos + S_ORIG_FIRST, first as i32);
            self.shortcuts.set_int(pos + S_ORIG_LAST, last as i32);
        }
        self.shortcut_count += 1;
        Ok(shortcut)
    }

    pub(crate) fn set_skipped_edges(&mut self, shortcut: u32, skip1: EdgeId, skip2: EdgeId) {
        let pos = self.shortcut_pos(shortcut);
        self.shortcuts.set_int(pos + S_SKIP1, skip1 as i32);
        self.shortcuts.set_int(pos + S_SKIP2, skip2 as i32);
    }

    #[inline]
    pub(crate) fn raw_node_a(&self, shortcut: u32) -> NodeId {
        self.shortcuts
            .get_int(self.shortcut_pos(shortcut) + S_NODEA) as NodeId
    }

    #[inline]
    pub(crate) fn raw_node_b(&self, shortcut: u32) -> NodeId {
        self.shortcuts
            .get_int(self.shortcut_pos(shortcut) + S_NODEB) as NodeId
    }

    #[inline]
    fn raw_weight_and_access(&self, shortcut: u32) -> i32 {
        self.shortcuts
            .get_int(self.shortcut_pos(shortcut) + S_WEIGHT)
    }

    #[inline]
    pub(crate) fn raw_skipped(&self, shortcut: u32) -> (EdgeId, EdgeId) {
        let pos = self.shortcut_pos(shortcut);
        (
            self.shortcuts.get_int(pos + S_SKIP1) as EdgeId,
            self.shortcuts.get_int(pos + S_SKIP2) as EdgeId,
        )
    }

    fn decode_weight(value: i32) -> f64 {
        let weight_int = value >> 2;
        if weight_int == MAX_WEIGHT_INT {
            f64::INFINITY
        } else {
            weight_int as f64 / WEIGHT_SCALE
        }
    }

    pub fn node_a(&self, shortcut: u32) -> Result<NodeId> {
        self.check_shortcut(shortcut)?;
        Ok(self.raw_node_a(shortcut))
    }

    pub fn node_b(&self, shortcut: u32) -> Result<NodeId> {
        self.check_shortcut(shortcut)?;
        Ok(self.raw_node_b(shortcut))
    }

    pub fn is_forward(&self, shortcut: u32) -> Result<bool> {
        self.check_shortcut(shortcut)?;
        Ok(self.raw_weight_and_access(shortcut) as u32 & SC_FWD != 0)
    }

    pub fn is_backward(&self, shortcut: u32) -> Result<bool> {
        self.check_shortcut(shortcut)?;
        Ok(self.raw_weight_and_access(shortcut) as u32 & SC_BWD != 0)
    }

    /// Weight, `f64::INFINITY` when saturated
    pub fn weight(&self, shortcut: u32) -> Result<f64> {
        self.check_shortcut(shortcut)?;
        Ok(Self::decode_weight(self.raw_weight_and_access(shortcut)))
    }

    pub fn skipped_edge1(&self, shortcut: u32) -> Result<EdgeId> {
        self.check_shortcut(shortcut)?;
        Ok(self.raw_skipped(shortcut).0)
    }

    pub fn skipped_edge2(&self, shortcut: u32) -> Result<EdgeId> {
        self.check_shortcut(shortcut)?;
        Ok(self.raw_skipped(shortcut).1)
    }

    pub fn orig_edge_key_first(&self, shortcut: u32) -> Result<u32> {
        self.require_edge_based("read original edge keys")?;
        self.check_shortcut(shortcut)?;
        Ok(self
            .shortcuts
            .get_int(self.shortcut_pos(shortcut) + S_ORIG_FIRST) as u32)
    }

    pub fn orig_edge_key_last(&self, shortcut: u32) -> Result<u32> {
        self.require_edge_based("read original edge keys")?;
        self.check_shortcut(shortcut)?;
        Ok(self
            .shortcuts
            .get_int(self.shortcut_pos(shortcut) + S_ORIG_LAST) as u32)
    }

    /// All fields of one shortcut
    pub fn shortcut(&self, shortcut: u32) -> Result<Shortcut> {
        self.check_shortcut(shortcut)?;
        Ok(self.decode(shortcut))
    }

    pub(crate) fn decode(&self, shortcut: u32) -> Shortcut {
        let pos = self.shortcut_pos(shortcut);
        let packed = self.raw_weight_and_access(shortcut);
        let (skipped_edge1, skipped_edge2) = self.raw_skipped(shortcut);
        let (orig_edge_key_first, orig_edge_key_last) = if self.edge_based {
            (
                Some(self.shortcuts.get_int(pos + S_ORIG_FIRST) as u32),
                Some(self.shortcuts.get_int(pos + S_ORIG_LAST) as u32),
            )
        } else {
            (None, None)
        };
        Shortcut {
            id: shortcut,
            node_a: self.raw_node_a(shortcut),
            node_b: self.raw_node_b(shortcut),
            access: packed as u32 & SC_ACCESS_MASK,
            weight: Self::decode_weight(packed),
            skipped_edge1,
            skipped_edge2,
            orig_edge_key_first,
            orig_edge_key_last,
        }
    }

    /// Shortcuts with `node` as node A, newest first
    pub fn shortcuts_of(&self, node: NodeId) -> ShortcutsOf<'_> {
        ShortcutsOf {
            ch: self,
            node,
            next: self.last_shortcut(node),
        }
    }

    /// Combined id of shortcut `s` next to the base edges
    pub fn to_combined_id(&self, shortcut: u32) -> EdgeId {
        self.base_edge_count + shortcut
    }

    /// Shortcut index for a combined id, `None` for base edges
    pub fn shortcut_for_combined_id(&self, id: EdgeId) -> Option<u32> {
        id.checked_sub(self.base_edge_count)
    }
}

/// Walks backwards from a node's last shortcut while node A matches
pub struct ShortcutsOf<'a> {
    ch: &'a ChStorage,
    node: NodeId,
    next: i32,
}

impl Iterator for ShortcutsOf<'_> {
    type Item = Shortcut;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next < 0 {
            return None;
        }
        let shortcut = self.next as u32;
        if self.ch.raw_node_a(shortcut) != self.node {
            self.next = NO_REF;
            return None;
        }
        self.next -= 1;
        Some(self.ch.decode(shortcut))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BaseGraphBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn frozen_line(nodes: u32) -> BaseGraph {
        let mut g = BaseGraphBuilder::new(4).create().unwrap();
        for n in 1..nodes {
            g.add_edge(n - 1, n).unwrap().set_distance(10.0).unwrap();
        }
        g.freeze();
        g
    }

    #[test]
    fn test_requires_frozen_base() {
        let g = BaseGraphBuilder::new(4).create().unwrap();
        assert!(matches!(
            ChStorage::create(&g, "car", false),
            Err(Error::NotFrozen(_))
        ));
    }

    #[test]
    fn test_levels_start_unset() {
        let g = frozen_line(3);
        let mut ch = ChStorage::create(&g, "car", false).unwrap();
        assert_eq!(ch.level(2), -1);
        ch.set_level(2, 0).unwrap();
        assert_eq!(ch.level(2), 0);
        assert!(matches!(ch.set_level(3, 0), Err(Error::OutOfBounds { .. })));
        assert!(ch.set_level(0, 3).is_err());
    }

    #[test]
    fn test_weight_encoding() {
        let g = frozen_line(3);
        let mut ch = ChStorage::create(&g, "car", false).unwrap();
        let s = ch.push_shortcut(0, 2, SC_FWD, 12.3456, 0, 1, None).unwrap();
        assert_eq!(ch.weight(s).unwrap(), 12.346);
        assert!(ch.is_forward(s).unwrap());
        assert!(!ch.is_backward(s).unwrap());

        let inf = ch.push_shortcut(0, 2, SC_ACCESS_MASK, 1e9, 0, 1, None).unwrap();
        assert_eq!(ch.weight(inf).unwrap(), f64::INFINITY);
        assert!(ch.is_backward(inf).unwrap());
        assert_eq!(ch.num_shortcuts_exceeding_weight(), 1);

        assert!(matches!(
            ch.push_shortcut(0, 2, SC_FWD, f64::NAN, 0, 1, None),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_low_weight_is_clamped_and_reported() {
        let g = frozen_line(3);
        let mut ch = ChStorage::create(&g, "car", false).unwrap();
        let reported = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reported);
        ch.set_low_shortcut_weight_consumer(move |low| {
            assert_eq!(low.min_weight, MIN_WEIGHT);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let s = ch.push_shortcut(0, 2, SC_FWD, 0.0001, 0, 1, None).unwrap();
        assert_eq!(ch.weight(s).unwrap(), MIN_WEIGHT);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mixed_modes_rejected() {
        let g = frozen_line(3);
        let mut node_based = ChStorage::create(&g, "car", false).unwrap();
        assert!(matches!(
            node_based.push_shortcut(0, 2, SC_FWD, 1.0, 0, 1, Some((0, 2))),
            Err(Error::MixedChMode { .. })
        ));
        let s = node_based.push_shortcut(0, 2, SC_FWD, 1.0, 0, 1, None).unwrap();
        assert!(matches!(
            node_based.orig_edge_key_first(s),
            Err(Error::MixedChMode { .. })
        ));

        let mut edge_based = ChStorage::create(&g, "car_tc", true).unwrap();
        assert!(matches!(
            edge_based.push_shortcut(0, 2, SC_FWD, 1.0, 0, 1, None),
            Err(Error::MixedChMode { .. })
        ));
        let s = edge_based
            .push_shortcut(0, 2, SC_FWD, 1.0, 0, 1, Some((0, 2)))
            .unwrap();
        assert_eq!(edge_based.orig_edge_key_first(s).unwrap(), 0);
        assert_eq!(edge_based.orig_edge_key_last(s).unwrap(), 2);
    }

    #[test]
    fn test_shortcut_accessors_check_bounds() {
        let g = frozen_line(3);
        let ch = ChStorage::create(&g, "car", false).unwrap();
        assert!(matches!(ch.node_a(0), Err(Error::OutOfBounds { .. })));
        assert!(matches!(ch.shortcut(5), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_combined_ids() {
        let g = frozen_line(4);
        let ch = ChStorage::create(&g, "car", false).unwrap();
        assert_eq!(ch.base_edge_count(), 3);
        assert_eq!(ch.to_combined_id(0), 3);
        assert_eq!(ch.shortcut_for_combined_id(2), None);
        assert_eq!(ch.shortcut_for_combined_id(4), Some(1));
    }

    #[test]
    fn test_ordering_needs_all_levels() {
        let g = frozen_line(3);
        let mut ch = ChStorage::create(&g, "car", false).unwrap();
        ch.set_level(0, 2).unwrap();
        ch.set_level(1, 0).unwrap();
        assert!(ch.node_ordering_provider().is_err());
        ch.set_level(2, 0).unwrap();
        assert!(ch.node_ordering_provider().is_err());
        ch.set_level(2, 1).unwrap();
        let order = ch.node_ordering_provider().unwrap();
        assert_eq!(order.node_for_level(0), 1);
        assert_eq!(order.node_for_level(1), 2);
        assert_eq!(order.node_for_level(2), 0);
    }
}
