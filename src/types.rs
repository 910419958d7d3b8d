//! Shared id types, edge keys and the opaque per-edge flag vector

/// Node id, dense `0..node_count`
pub type NodeId = u32;

/// Edge id, dense `0..edge_count`
pub type EdgeId = u32;

/// Stored "none" value for adjacency links and table references
pub const NO_REF: i32 = -1;

/// Largest number of nodes or edges a table can address
pub const MAX_ID_COUNT: u64 = i32::MAX as u64;

/// Direction-aware edge id: `2 * edge + reverse`
#[inline]
pub fn create_edge_key(edge: EdgeId, reverse: bool) -> u32 {
    (edge << 1) | reverse as u32
}

#[inline]
pub fn edge_from_key(key: u32) -> EdgeId {
    key >> 1
}

#[inline]
pub fn is_reverse_key(key: u32) -> bool {
    key & 1 == 1
}

/// Same edge, opposite direction
#[inline]
pub fn reverse_edge_key(key: u32) -> u32 {
    key ^ 1
}

/// Which points of an edge geometry to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Base tower, pillars, adjacent tower
    All,
    /// Base and adjacent tower only
    TowerOnly,
    /// Pillars only
    PillarOnly,
    /// Base tower and pillars
    BaseAndPillar,
    /// Pillars and adjacent tower
    PillarAndAdj,
}

impl FetchMode {
    pub fn includes_base(self) -> bool {
        matches!(self, FetchMode::All | FetchMode::TowerOnly | FetchMode::BaseAndPillar)
    }

    pub fn includes_adj(self) -> bool {
        matches!(self, FetchMode::All | FetchMode::TowerOnly | FetchMode::PillarAndAdj)
    }

    pub fn includes_pillars(self) -> bool {
        !matches!(self, FetchMode::TowerOnly)
    }
}

/// Fixed-width bit vector attached to every edge.
///
/// The graph never interprets it; road attributes are encoded into it elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EdgeFlags(Vec<i32>);

impl EdgeFlags {
    /// All-zero flags of `ints` 32-bit words
    pub fn new(ints: usize) -> Self {
        Self(vec![0; ints])
    }

    pub fn from_ints(ints: Vec<i32>) -> Self {
        Self(ints)
    }

    pub fn ints(&self) -> &[i32] {
        &self.0
    }

    pub fn ints_mut(&mut self) -> &mut [i32] {
        &mut self.0
    }

    pub fn len_bytes(&self) -> usize {
        self.0.len() * 4
    }

    pub fn get_bit(&self, bit: usize) -> bool {
        self.0[bit / 32] & (1 << (bit % 32)) != 0
    }

    pub fn set_bit(&mut self, bit: usize, value: bool) {
        let word = &mut self.0[bit / 32];
        if value {
            *word |= 1 << (bit % 32);
        } else {
            *word &= !(1 << (bit % 32));
        }
    }
}
