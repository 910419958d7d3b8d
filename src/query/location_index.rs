//! Spatial index for snapping coordinates to edges
//!
//! Every segment between consecutive way points of an edge goes into an R-tree. Coordinates
//! are projected to a plane with longitudes shrunk by the cosine of the graph's mean
//! latitude, so tree distances order candidates like the normalized distances used
//! elsewhere.

use log::debug;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geo::{calc_normalized_dist, valid_edge_distance};
use crate::query::snap::{ClosestEdge, Snap, SnapPosition};
use crate::storage::{BaseEdge, BaseGraph, EdgeState};
use crate::types::{EdgeId, FetchMode};

/// One segment of an edge's geometry, `[x, y]` in projected coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedSegment {
    pub from: [f64; 2],
    pub to: [f64; 2],
    pub edge: EdgeId,
    /// Index of `from` in the edge's full geometry (stored direction)
    pub way_index: u32,
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.from, self.to)
    }
}

impl PointDistance for IndexedSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let (dx, dy) = (self.to[0] - self.from[0], self.to[1] - self.from[1]);
        let len_sq = dx * dx + dy * dy;
        let t = if len_sq == 0.0 {
            0.0
        } else {
            (((point[0] - self.from[0]) * dx + (point[1] - self.from[1]) * dy) / len_sq)
                .clamp(0.0, 1.0)
        };
        let px = self.from[0] + t * dx - point[0];
        let py = self.from[1] + t * dy - point[1];
        px * px + py * py
    }
}

pub struct LocationIndex {
    tree: RTree<IndexedSegment>,
    shrink: f64,
}

impl LocationIndex {
    /// Index every edge of `graph`
    pub fn build(graph: &BaseGraph) -> Self {
        let bounds = graph.bounds();
        let shrink = if bounds.is_valid() {
            ((bounds.min_lat + bounds.max_lat) / 2.0).to_radians().cos()
        } else {
            1.0
        };
        let project = |lat: f64, lon: f64| [lon * shrink, lat];

        let mut segments = Vec::new();
        for edge in 0..graph.edge_count() {
            let Ok(state) = graph.edge_state(edge, None) else {
                continue;
            };
            let points = state.fetch_way_geometry(FetchMode::All);
            for i in 1..points.len() {
                segments.push(IndexedSegment {
                    from: project(points.lat(i - 1), points.lon(i - 1)),
                    to: project(points.lat(i), points.lon(i)),
                    edge,
                    way_index: (i - 1) as u32,
                });
            }
        }
        debug!(
            "indexed {} segments of {} edges",
            segments.len(),
            graph.edge_count()
        );
        Self {
            tree: RTree::bulk_load(segments),
            shrink,
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Closest edge accepted by `filter`; an invalid snap if there is none
    pub fn find_closest(
        &self,
        graph: &BaseGraph,
        lat: f64,
        lon: f64,
        filter: impl Fn(&BaseEdge<'_>) -> bool,
    ) -> Snap {
        let mut snap = Snap::new(lat, lon);
        let query = [lon * self.shrink, lat];
        let found = self.tree.nearest_neighbor_iter(&query).find_map(|segment| {
            let state = graph.edge_state(segment.edge, None).ok()?;
            filter(&state).then_some((state, segment.way_index as usize))
        });
        let Some((state, index)) = found else {
            return snap;
        };

        let points = state.fetch_way_geometry(FetchMode::All);
        let last = points.len() - 1;
        let (a_lat, a_lon) = (points.lat(index), points.lon(index));
        let (b_lat, b_lon) = (points.lat(index + 1), points.lon(index + 1));
        let (way_index, position) = if valid_edge_distance(lat, lon, a_lat, a_lon, b_lat, b_lon) {
            (index, SnapPosition::Edge)
        } else {
            let to_a = calc_normalized_dist(lat, lon, a_lat, a_lon);
            let to_b = calc_normalized_dist(lat, lon, b_lat, b_lon);
            let nearer = if to_a <= to_b { index } else { index + 1 };
            let position = if nearer == 0 || nearer == last {
                SnapPosition::Tower
            } else {
                SnapPosition::Pillar
            };
            (nearer, position)
        };

        snap.closest_edge = Some(ClosestEdge::from_state(&state));
        snap.way_index = way_index;
        snap.position = position;
        // an unusable geometry leaves the snap invalid
        if snap.calc_snapped_point(graph).is_err() {
            snap.closest_edge = None;
        }
        snap
    }
}
