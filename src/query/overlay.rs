//! Virtual nodes and edges spliced into a frozen graph for one request
//!
//! ## Building
//!
//! 1. Every snap that is not on a tower node gets its closest edge turned so that the lower
//!    node id is the base (latitude decides for self-loops). All snaps on one edge then
//!    share an orientation and their way indices are comparable.
//! 2. Snaps are grouped per edge and ordered by way index, then by distance from that way
//!    point.
//! 3. Each group cuts the edge's geometry into slices. Every distinct snapped point becomes a
//!    virtual node, every slice a forward/backward pair of virtual edges. Snaps at the same
//!    coordinate share a node.
//! 4. The real end nodes of a cut edge record the edge as removed and the outermost virtual
//!    edges as added.
//!
//! Virtual node `i` has id `base_node_count + i`, virtual pair `k` has id
//! `base_edge_count + k` and lives at indices `2k` (forward) and `2k + 1` (backward).

use log::debug;
use roadgraph_common::{Error, Result};
use rustc_hash::FxHashMap;

use crate::geo::{calc_normalized_dist, haversine_distance, point_list_length};
use crate::point_list::PointList;
use crate::query::snap::{Snap, SnapPosition, SnappedPoint};
use crate::query::virtual_edge::VirtualEdge;
use crate::storage::{BaseGraph, EdgeState};
use crate::types::{EdgeId, FetchMode, NodeId, MAX_ID_COUNT};

/// Adjacency changes at a real node touched by a cut edge
#[derive(Debug, Default, Clone)]
pub struct EdgeChanges {
    /// Indices into the virtual edge list
    pub added: Vec<usize>,
    pub removed: Vec<EdgeId>,
}

#[derive(Debug)]
pub struct QueryOverlay {
    base_node_count: u32,
    base_edge_count: u32,
    virtual_nodes: PointList,
    virtual_edges: Vec<VirtualEdge>,
    /// Virtual edge indices starting at each virtual node
    node_edges: Vec<Vec<usize>>,
    /// Edge each virtual node was cut from
    closest_edges: Vec<EdgeId>,
    edge_changes: FxHashMap<NodeId, EdgeChanges>,
}

struct Slice {
    from: NodeId,
    to: NodeId,
    points: PointList,
}

impl QueryOverlay {
    fn empty(graph: &BaseGraph) -> Self {
        Self {
            base_node_count: graph.node_count(),
            base_edge_count: graph.edge_count(),
            virtual_nodes: PointList::new(graph.with_elevation()),
            virtual_edges: Vec::new(),
            node_edges: Vec::new(),
            closest_edges: Vec::new(),
            edge_changes: FxHashMap::default(),
        }
    }

    /// Splice `snaps` into `graph`, assigning each snap its closest node in the result
    pub fn build(graph: &BaseGraph, snaps: &mut [Snap]) -> Result<Self> {
        if !graph.is_frozen() {
            return Err(Error::NotFrozen("building a query overlay"));
        }
        let mut overlay = Self::empty(graph);
        for (edge, members) in group_snaps(graph, snaps)? {
            overlay.split_edge(graph, edge, snaps, members)?;
        }
        debug!(
            "query overlay: {} snaps, {} virtual nodes, {} virtual edges",
            snaps.len(),
            overlay.virtual_node_count(),
            overlay.virtual_edge_count()
        );
        Ok(overlay)
    }

    pub fn virtual_node_count(&self) -> u32 {
        self.virtual_nodes.len() as u32
    }

    /// Number of virtual edge pairs
    pub fn virtual_edge_count(&self) -> u32 {
        (self.virtual_edges.len() / 2) as u32
    }

    pub fn virtual_nodes(&self) -> &PointList {
        &self.virtual_nodes
    }

    /// Both members of every pair, forward first
    pub fn virtual_edges(&self) -> &[VirtualEdge] {
        &self.virtual_edges
    }

    pub(crate) fn node_edges(&self, virtual_node: usize) -> &[usize] {
        &self.node_edges[virtual_node]
    }

    /// Original edge of virtual node `virtual_node`
    pub fn closest_edge(&self, virtual_node: usize) -> EdgeId {
        self.closest_edges[virtual_node]
    }

    pub fn edge_changes(&self, node: NodeId) -> Option<&EdgeChanges> {
        self.edge_changes.get(&node)
    }

    fn add_virtual_node(&mut self, point: SnappedPoint, closest_edge: EdgeId) -> Result<NodeId> {
        let id = self.base_node_count as u64 + self.virtual_nodes.len() as u64;
        if id >= MAX_ID_COUNT {
            return Err(Error::CapacityExceeded {
                what: "virtual node",
                limit: MAX_ID_COUNT - self.base_node_count as u64,
            });
        }
        self.virtual_nodes.add(point.lat, point.lon, point.ele);
        self.node_edges.push(Vec::new());
        self.closest_edges.push(closest_edge);
        Ok(id as NodeId)
    }

    fn attach(&mut self, node: NodeId, index: usize, original: EdgeId) {
        if node >= self.base_node_count {
            self.node_edges[(node - self.base_node_count) as usize].push(index);
        } else {
            let changes = self.edge_changes.entry(node).or_default();
            changes.added.push(index);
            if !changes.removed.contains(&original) {
                changes.removed.push(original);
            }
        }
    }

    fn split_edge(
        &mut self,
        graph: &BaseGraph,
        edge: EdgeId,
        snaps: &mut [Snap],
        mut members: Vec<usize>,
    ) -> Result<()> {
        let closest = snaps[members[0]]
            .closest_edge
            .ok_or_else(|| Error::InvalidSnap(format!("no closest edge for edge {edge}")))?;
        let state = closest.state(graph)?;
        let full = state.fetch_way_geometry(FetchMode::All);
        let last = full.len() - 1;

        let from_way_point = |snap: &Snap| {
            snap.snapped_point.map_or(0.0, |p| {
                calc_normalized_dist(
                    full.lat(snap.way_index),
                    full.lon(snap.way_index),
                    p.lat,
                    p.lon,
                )
            })
        };
        members.sort_by(|&x, &y| {
            let (a, b) = (&snaps[x], &snaps[y]);
            a.way_index
                .cmp(&b.way_index)
                .then_with(|| from_way_point(a).total_cmp(&from_way_point(b)))
        });

        let mut prev_point = SnappedPoint::new(full.lat(0), full.lon(0), full.ele(0));
        let mut prev_way_index = 1;
        let mut prev_node = closest.base_node;
        let mut prev_snap: Option<(usize, SnapPosition)> = None;
        let mut slices = Vec::new();

        for &index in &members {
            let snap = &mut snaps[index];
            let own_base = snap.closest_edge.map(|c| c.base_node);
            if own_base != Some(closest.base_node) {
                return Err(Error::InvalidSnap(format!(
                    "snap on edge {edge} has base node {own_base:?}, group uses {}",
                    closest.base_node
                )));
            }
            let current = snap.snapped_point.ok_or_else(|| {
                Error::InvalidSnap(format!("snap on edge {edge} has no snapped point"))
            })?;

            if prev_point.is_same_as(&current) {
                let (way_index, position) = prev_snap.unwrap_or((0, SnapPosition::Tower));
                snap.closest_node = Some(prev_node);
                snap.snapped_point = Some(prev_point);
                snap.way_index = way_index;
                snap.position = position;
                snap.query_distance = haversine_distance(
                    prev_point.lat,
                    prev_point.lon,
                    snap.query_lat,
                    snap.query_lon,
                );
                continue;
            }

            let node = self.add_virtual_node(current, edge)?;
            slices.push(Slice {
                from: prev_node,
                to: node,
                points: slice_points(
                    &full,
                    prev_point,
                    prev_way_index,
                    snap.position == SnapPosition::Pillar,
                    current,
                    snap.way_index,
                ),
            });
            snap.closest_node = Some(node);
            prev_node = node;
            prev_way_index = snap.way_index + 1;
            prev_point = current;
            prev_snap = Some((snap.way_index, snap.position));
        }

        if slices.is_empty() {
            return Ok(());
        }
        let end = SnappedPoint::new(full.lat(last), full.lon(last), full.ele(last));
        slices.push(Slice {
            from: prev_node,
            to: closest.adj_node,
            points: slice_points(&full, prev_point, prev_way_index, false, end, last - 1),
        });

        let lengths: Vec<f64> = slices.iter().map(|s| point_list_length(&s.points)).collect();
        let total: f64 = lengths.iter().sum();
        let count = lengths.len();
        let stored = state.distance();
        let flags = state.flags();
        let key_values_ref = state.key_values_ref();

        for (slice, length) in slices.into_iter().zip(lengths) {
            let pair = self.virtual_edges.len() / 2;
            let id = self.base_edge_count as u64 + pair as u64;
            if id >= MAX_ID_COUNT {
                return Err(Error::CapacityExceeded {
                    what: "virtual edge",
                    limit: MAX_ID_COUNT - self.base_edge_count as u64,
                });
            }
            // slices of a zero-length geometry split the distance evenly
            let distance = if total > 0.0 {
                stored * length / total
            } else {
                stored / count as f64
            };
            let forward = VirtualEdge {
                edge: id as EdgeId,
                base: slice.from,
                adj: slice.to,
                backward: false,
                reverse: state.is_reverse(),
                original_edge_key: state.edge_key(),
                distance,
                flags: flags.clone(),
                key_values_ref,
                points: slice.points,
            };
            let backward = forward.reversed();
            let index = self.virtual_edges.len();
            self.attach(slice.from, index, edge);
            self.attach(slice.to, index + 1, edge);
            self.virtual_edges.push(forward);
            self.virtual_edges.push(backward);
        }
        Ok(())
    }
}

/// Snaps grouped by closest edge, in order of first appearance
fn group_snaps(graph: &BaseGraph, snaps: &mut [Snap]) -> Result<Vec<(EdgeId, Vec<usize>)>> {
    let mut groups: Vec<(EdgeId, Vec<usize>)> = Vec::new();
    let mut by_edge: FxHashMap<EdgeId, usize> = FxHashMap::default();

    for (i, snap) in snaps.iter_mut().enumerate() {
        let Some(closest) = snap.closest_edge else {
            if snap.position == SnapPosition::Tower && snap.closest_node.is_some() {
                continue;
            }
            return Err(Error::InvalidSnap(format!(
                "snap {i} at ({}, {}) has no closest edge",
                snap.query_lat, snap.query_lon
            )));
        };
        if snap.snapped_point.is_none() {
            snap.calc_snapped_point(graph)?;
        }
        if snap.position == SnapPosition::Tower {
            if snap.closest_node.is_none() {
                snap.closest_node = Some(if snap.way_index == 0 {
                    closest.base_node
                } else {
                    closest.adj_node
                });
            }
            continue;
        }
        canonicalize(graph, snap)?;

        let slot = *by_edge.entry(closest.edge).or_insert_with(|| {
            groups.push((closest.edge, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(i);
    }
    Ok(groups)
}

/// Orient the closest edge from its lower node id to the higher one
fn canonicalize(graph: &BaseGraph, snap: &mut Snap) -> Result<()> {
    let Some(closest) = snap.closest_edge else {
        return Ok(());
    };
    let mut reverse = closest.base_node > closest.adj_node;
    if closest.base_node == closest.adj_node {
        let pillars = closest.state(graph)?.fetch_way_geometry(FetchMode::PillarOnly);
        if pillars.len() > 1 {
            reverse = pillars.lat(0) > pillars.lat(pillars.len() - 1);
        }
    }
    if !reverse {
        return Ok(());
    }

    let reversed = closest.reversed();
    let points = reversed.state(graph)?.fetch_way_geometry(FetchMode::All).len();
    let skip = if snap.position == SnapPosition::Pillar { 1 } else { 2 };
    let way_index = points.checked_sub(snap.way_index + skip).ok_or_else(|| {
        Error::InvalidSnap(format!(
            "way index {} does not fit reversed edge {}",
            snap.way_index, closest.edge
        ))
    })?;
    snap.closest_edge = Some(reversed);
    snap.way_index = way_index;
    Ok(())
}

/// `start`, the way points `from_index..=way_index`, then `end` unless it is a pillar
/// already included
fn slice_points(
    full: &PointList,
    start: SnappedPoint,
    from_index: usize,
    end_is_pillar: bool,
    end: SnappedPoint,
    way_index: usize,
) -> PointList {
    let mut points = PointList::with_capacity(
        way_index.saturating_sub(from_index) + 3,
        full.is_3d(),
    );
    points.add(start.lat, start.lon, start.ele);
    for i in from_index..=way_index {
        points.add_from(full, i);
    }
    if !end_is_pillar {
        points.add(end.lat, end.lon, end.ele);
    }
    points
}
