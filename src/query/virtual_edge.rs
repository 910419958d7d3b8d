use crate::point_list::PointList;
use crate::storage::EdgeState;
use crate::types::{
    create_edge_key, edge_from_key, reverse_edge_key, EdgeFlags, EdgeId, FetchMode, NodeId,
};

/// One direction of a query-scoped edge covering a slice of a real edge.
///
/// Virtual edges come in pairs sharing one id: the forward member runs along the slice
/// from its start, the backward member against it.
#[derive(Debug, Clone)]
pub struct VirtualEdge {
    pub(crate) edge: EdgeId,
    pub(crate) base: NodeId,
    pub(crate) adj: NodeId,
    pub(crate) backward: bool,
    /// Orientation relative to the stored direction of the original edge
    pub(crate) reverse: bool,
    pub(crate) original_edge_key: u32,
    pub(crate) distance: f64,
    pub(crate) flags: EdgeFlags,
    pub(crate) key_values_ref: i32,
    /// Base node, pillars and adjacent node in travel order
    pub(crate) points: PointList,
}

impl VirtualEdge {
    /// Key of the real edge this slice was cut from, in the same orientation
    pub fn original_edge_key(&self) -> u32 {
        self.original_edge_key
    }

    pub fn original_edge(&self) -> EdgeId {
        edge_from_key(self.original_edge_key)
    }

    /// Is this the backward member of its pair
    pub fn is_backward(&self) -> bool {
        self.backward
    }

    /// The other member of the pair
    pub(crate) fn reversed(&self) -> VirtualEdge {
        let mut points = self.points.clone();
        points.reverse();
        VirtualEdge {
            edge: self.edge,
            base: self.adj,
            adj: self.base,
            backward: !self.backward,
            reverse: !self.reverse,
            original_edge_key: reverse_edge_key(self.original_edge_key),
            distance: self.distance,
            flags: self.flags.clone(),
            key_values_ref: self.key_values_ref,
            points,
        }
    }
}

impl EdgeState for VirtualEdge {
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
        self.distance
    }

    fn flags(&self) -> EdgeFlags {
        self.flags.clone()
    }

    fn key_values_ref(&self) -> i32 {
        self.key_values_ref
    }

    fn fetch_way_geometry(&self, mode: FetchMode) -> PointList {
        let last = self.points.len() - 1;
        let mut out = PointList::with_capacity(self.points.len(), self.points.is_3d());
        if mode.includes_base() {
            out.add_from(&self.points, 0);
        }
        if mode.includes_pillars() {
            for i in 1..last {
                out.add_from(&self.points, i);
            }
        }
        if mode.includes_adj() {
            out.add_from(&self.points, last);
        }
        out
    }

    /// Keyed by the pair member, independent of the original orientation
    fn edge_key(&self) -> u32 {
        create_edge_key(self.edge, self.backward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::is_reverse_key;

    fn forward() -> VirtualEdge {
        VirtualEdge {
            edge: 10,
            base: 0,
            adj: 5,
            backward: false,
            reverse: true,
            original_edge_key: create_edge_key(3, true),
            distance: 12.5,
            flags: EdgeFlags::new(1),
            key_values_ref: 7,
            points: PointList::from_coords(&[(0.0, 0.0), (0.0, 0.5), (0.0, 1.0)]),
        }
    }

    #[test]
    fn test_geometry_modes() {
        let edge = forward();
        assert_eq!(edge.fetch_way_geometry(FetchMode::All).len(), 3);
        assert_eq!(edge.fetch_way_geometry(FetchMode::TowerOnly).len(), 2);
        let pillars = edge.fetch_way_geometry(FetchMode::PillarOnly);
        assert_eq!(pillars.len(), 1);
        assert_eq!(pillars.lon(0), 0.5);
        assert_eq!(edge.fetch_way_geometry(FetchMode::PillarAndAdj).lon(1), 1.0);
        assert_eq!(edge.fetch_way_geometry(FetchMode::BaseAndPillar).lon(0), 0.0);
    }

    #[test]
    fn test_pair_members() {
        let fwd = forward();
        let bwd = fwd.reversed();
        assert_eq!(bwd.base_node(), 5);
        assert!(!bwd.is_reverse());
        assert!(bwd.is_backward());
        assert_eq!(bwd.edge_key(), fwd.reverse_edge_key());
        assert!(!is_reverse_key(bwd.original_edge_key()));
        assert_eq!(bwd.original_edge(), 3);
        assert_eq!(bwd.fetch_way_geometry(FetchMode::All).lon(0), 1.0);
    }
}
