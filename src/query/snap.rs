//! Result of projecting a coordinate onto the graph

use roadgraph_common::{Error, Result};

use crate::geo::{calc_crossing_point_to_edge, haversine_distance, valid_edge_distance};
use crate::storage::{BaseEdge, BaseGraph, EdgeState};
use crate::types::{create_edge_key, EdgeId, FetchMode, NodeId};

/// Coordinates closer than this (degrees) are treated as the same point
pub const EQUAL_DEGREES: f64 = 1e-6;

pub fn consider_equal(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> bool {
    (lat1 - lat2).abs() < EQUAL_DEGREES && (lon1 - lon2).abs() < EQUAL_DEGREES
}

/// Where on the closest edge the snapped point lies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapPosition {
    /// On the base or adjacent node
    Tower,
    /// On an intermediate shape point
    Pillar,
    /// Between shape points `way_index` and `way_index + 1`
    Edge,
}

/// The closest edge, oriented from `base_node` to `adj_node`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosestEdge {
    pub edge: EdgeId,
    pub base_node: NodeId,
    pub adj_node: NodeId,
    /// Orientation against the stored direction; needed to orient self-loops
    pub reverse: bool,
}

impl ClosestEdge {
    pub fn from_state(state: &impl EdgeState) -> Self {
        Self {
            edge: state.edge(),
            base_node: state.base_node(),
            adj_node: state.adj_node(),
            reverse: state.is_reverse(),
        }
    }

    /// Same edge, opposite orientation
    pub fn reversed(&self) -> Self {
        Self {
            edge: self.edge,
            base_node: self.adj_node,
            adj_node: self.base_node,
            reverse: !self.reverse,
        }
    }

    pub fn state<'a>(&self, graph: &'a BaseGraph) -> Result<BaseEdge<'a>> {
        let state = graph.edge_state_for_key(create_edge_key(self.edge, self.reverse))?;
        if state.base_node() != self.base_node || state.adj_node() != self.adj_node {
            return Err(Error::InvalidSnap(format!(
                "closest edge {} is stored as {}-{}, not {}-{}",
                self.edge,
                state.base_node(),
                state.adj_node(),
                self.base_node,
                self.adj_node
            )));
        }
        Ok(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedPoint {
    pub lat: f64,
    pub lon: f64,
    /// NaN without elevation
    pub ele: f64,
}

impl SnappedPoint {
    pub fn new(lat: f64, lon: f64, ele: f64) -> Self {
        Self { lat, lon, ele }
    }

    pub fn is_same_as(&self, other: &SnappedPoint) -> bool {
        consider_equal(self.lat, self.lon, other.lat, other.lon)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snap {
    pub query_lat: f64,
    pub query_lon: f64,
    /// `None` when nothing was found
    pub closest_edge: Option<ClosestEdge>,
    /// Tower node for [`SnapPosition::Tower`], the virtual node once a query graph was built
    pub closest_node: Option<NodeId>,
    /// Index into the full geometry (base node, pillars, adjacent node) of the closest edge
    pub way_index: usize,
    pub position: SnapPosition,
    /// Metres between query and snapped point
    pub query_distance: f64,
    pub snapped_point: Option<SnappedPoint>,
}

impl Snap {
    /// Unresolved snap for a query coordinate
    pub fn new(query_lat: f64, query_lon: f64) -> Self {
        Self {
            query_lat,
            query_lon,
            closest_edge: None,
            closest_node: None,
            way_index: 0,
            position: SnapPosition::Tower,
            query_distance: f64::INFINITY,
            snapped_point: None,
        }
    }

    /// Snap on `closest` at `way_index`, with the snapped point still to be calculated
    pub fn on_edge(
        query_lat: f64,
        query_lon: f64,
        closest: ClosestEdge,
        way_index: usize,
        position: SnapPosition,
    ) -> Self {
        Self {
            closest_edge: Some(closest),
            way_index,
            position,
            ..Self::new(query_lat, query_lon)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.closest_edge.is_some()
    }

    /// Project the query point onto the closest edge.
    ///
    /// A crossing point that coincides with a way point turns the snap into a pillar snap,
    /// or a tower snap at either end of the edge.
    pub fn calc_snapped_point(&mut self, graph: &BaseGraph) -> Result<()> {
        let closest = self
            .closest_edge
            .ok_or_else(|| Error::InvalidSnap("snap has no closest edge".to_string()))?;
        let full = closest.state(graph)?.fetch_way_geometry(FetchMode::All);
        let last = full.len() - 1;
        let max_index = if self.position == SnapPosition::Edge {
            last.saturating_sub(1)
        } else {
            last
        };
        if self.way_index > max_index {
            return Err(Error::InvalidSnap(format!(
                "way index {} outside edge {} with {} points",
                self.way_index,
                closest.edge,
                full.len()
            )));
        }

        let i = self.way_index;
        let here = SnappedPoint::new(full.lat(i), full.lon(i), full.ele(i));
        let snapped = if self.position != SnapPosition::Edge {
            here
        } else {
            let next = SnappedPoint::new(full.lat(i + 1), full.lon(i + 1), full.ele(i + 1));
            if valid_edge_distance(
                self.query_lat,
                self.query_lon,
                here.lat,
                here.lon,
                next.lat,
                next.lon,
            ) {
                let (lat, lon) = calc_crossing_point_to_edge(
                    self.query_lat,
                    self.query_lon,
                    here.lat,
                    here.lon,
                    next.lat,
                    next.lon,
                );
                if consider_equal(lat, lon, here.lat, here.lon) {
                    self.position = if i == 0 {
                        SnapPosition::Tower
                    } else {
                        SnapPosition::Pillar
                    };
                    here
                } else if consider_equal(lat, lon, next.lat, next.lon) {
                    self.way_index += 1;
                    self.position = if self.way_index == last {
                        SnapPosition::Tower
                    } else {
                        SnapPosition::Pillar
                    };
                    next
                } else {
                    SnappedPoint::new(lat, lon, (here.ele + next.ele) / 2.0)
                }
            } else {
                // perpendicular falls outside the segment
                here
            }
        };

        if self.position == SnapPosition::Tower {
            self.closest_node = Some(if self.way_index == 0 {
                closest.base_node
            } else {
                closest.adj_node
            });
        }
        self.query_distance =
            haversine_distance(self.query_lat, self.query_lon, snapped.lat, snapped.lon);
        self.snapped_point = Some(snapped);
        Ok(())
    }
}
