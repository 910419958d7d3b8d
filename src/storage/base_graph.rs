//! Base graph store
//!
//! Nodes and edges live in fixed-stride records of two data accesses. Every node keeps the
//! head of its adjacency list; every edge keeps one "next" link per endpoint, so the list of
//! node `n` is walked by following link A where `n` is node A and link B where it is node B.
//!
//! ```text
//! node:  edge_ref i32 | lat i32 | lon i32 | [ele i32] | [turn_cost_ref i32]
//! edge:  node_a i32 | node_b i32 | link_a i32 | link_b i32 | flags [i32; n]
//!        | distance i32 | geo_ref i64 | kv_ref i32
//! geometry record: count i32 | (lat i32, lon i32, [ele i32]) * count
//! ```

use log::{debug, info, warn};
use roadgraph_common::{Error, Result};
use roadgraph_io::{DataAccess, Directory};
use rustc_hash::FxHashSet;

use crate::point_list::PointList;
use crate::storage::edge::{BaseEdge, BaseEdgeIter, EdgeMut};
use crate::storage::fixed::{
    degree_to_int, distance_to_int, ele_to_int, int_to_degree, int_to_distance, int_to_ele,
    int_to_turn_cost, turn_cost_to_int, MAX_DISTANCE_METERS, MILLI_SCALE,
};
use crate::storage::turn_cost::{TurnCostEntry, TurnCostStorage};
use crate::storage::view::{EdgeView, GraphView};
use crate::types::{
    edge_from_key, is_reverse_key, EdgeFlags, EdgeId, FetchMode, NodeId, MAX_ID_COUNT, NO_REF,
};

pub const NODES_VERSION: i32 = 2;
pub const EDGES_VERSION: i32 = 2;
pub const GEOMETRY_VERSION: i32 = 1;

const N_EDGE_REF: u64 = 0;
const N_LAT: u64 = 4;
const N_LON: u64 = 8;

const E_NODEA: u64 = 0;
const E_NODEB: u64 = 4;
const E_LINKA: u64 = 8;
const E_LINKB: u64 = 12;
const E_FLAGS: u64 = 16;

// header slots shared by all tables
const H_VERSION: usize = 0;
const H_STRIDE: usize = 1;
const H_COUNT: usize = 2;

// nodes
const H_MIN_LON: usize = 3;
const H_MAX_LON: usize = 4;
const H_MIN_LAT: usize = 5;
const H_MAX_LAT: usize = 6;
const H_WITH_ELEVATION: usize = 7;
const H_FROZEN: usize = 8;
const H_WITH_TURN_COSTS: usize = 9;

// edges
const H_BYTES_FOR_FLAGS: usize = 3;
const H_MAX_GEO_LOW: usize = 4;
const H_MAX_GEO_HIGH: usize = 5;

/// Geometry offset 0 means "no pillars", so records start behind it
const FIRST_GEO_REF: u64 = 4;

const DEFAULT_INITIAL_BYTES: u64 = 1 << 16;

/// Bounding box of all nodes, in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BBox {
    /// False until the first node has been set
    pub fn is_valid(&self) -> bool {
        self.min_lon <= self.max_lon && self.min_lat <= self.max_lat
    }
}

/// Bounds kept in stored units so flush/load reproduces them exactly
#[derive(Debug, Clone, Copy)]
struct FixedBounds {
    min_lon: i32,
    max_lon: i32,
    min_lat: i32,
    max_lat: i32,
}

impl FixedBounds {
    fn empty() -> Self {
        Self {
            min_lon: i32::MAX,
            max_lon: i32::MIN,
            min_lat: i32::MAX,
            max_lat: i32::MIN,
        }
    }

    fn update(&mut self, lat: i32, lon: i32) {
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }

    fn to_bbox(self) -> BBox {
        if self.min_lon > self.max_lon {
            return BBox {
                min_lon: f64::MAX,
                max_lon: f64::MIN,
                min_lat: f64::MAX,
                max_lat: f64::MIN,
            };
        }
        BBox {
            min_lon: int_to_degree(self.min_lon),
            max_lon: int_to_degree(self.max_lon),
            min_lat: int_to_degree(self.min_lat),
            max_lat: int_to_degree(self.max_lat),
        }
    }
}

/// Record offsets derived from the configuration
#[derive(Debug, Clone, Copy)]
struct Layout {
    node_stride: u64,
    n_ele: Option<u64>,
    n_turn_cost: Option<u64>,
    edge_stride: u64,
    e_dist: u64,
    e_geo: u64,
    e_kv: u64,
    bytes_for_flags: u64,
    point_bytes: u64,
}

impl Layout {
    fn new(bytes_for_flags: u32, with_elevation: bool, with_turn_costs: bool) -> Self {
        let mut node_stride = N_LON + 4;
        let n_ele = with_elevation.then(|| {
            node_stride += 4;
            node_stride - 4
        });
        let n_turn_cost = with_turn_costs.then(|| {
            node_stride += 4;
            node_stride - 4
        });

        let bytes_for_flags = bytes_for_flags as u64;
        let e_dist = E_FLAGS + bytes_for_flags;
        let e_geo = e_dist + 4;
        let e_kv = e_geo + 8;
        Self {
            node_stride,
            n_ele,
            n_turn_cost,
            edge_stride: e_kv + 4,
            e_dist,
            e_geo,
            e_kv,
            bytes_for_flags,
            point_bytes: if with_elevation { 12 } else { 8 },
        }
    }
}

/// Configures and creates a [`BaseGraph`]
#[derive(Debug, Clone)]
pub struct BaseGraphBuilder {
    bytes_for_flags: u32,
    dir: Directory,
    with_elevation: bool,
    with_turn_costs: bool,
    max_distance_meters: f64,
    initial_capacity: u64,
}

impl BaseGraphBuilder {
    /// `bytes_for_flags` must be a positive multiple of 4
    pub fn new(bytes_for_flags: u32) -> Self {
        Self {
            bytes_for_flags,
            dir: Directory::in_memory(),
            with_elevation: false,
            with_turn_costs: false,
            max_distance_meters: MAX_DISTANCE_METERS,
            initial_capacity: DEFAULT_INITIAL_BYTES,
        }
    }

    pub fn set_dir(mut self, dir: Directory) -> Self {
        self.dir = dir;
        self
    }

    pub fn with_elevation(mut self, with_elevation: bool) -> Self {
        self.with_elevation = with_elevation;
        self
    }

    pub fn with_turn_costs(mut self, with_turn_costs: bool) -> Self {
        self.with_turn_costs = with_turn_costs;
        self
    }

    /// Distances at or above this value are stored as the maximum
    pub fn set_max_distance(mut self, meters: f64) -> Self {
        self.max_distance_meters = meters;
        self
    }

    pub fn set_initial_capacity(mut self, bytes: u64) -> Self {
        self.initial_capacity = bytes;
        self
    }

    /// Graph with its tables allocated but not yet created or loaded
    pub fn build(self) -> Result<BaseGraph> {
        if self.bytes_for_flags == 0 || self.bytes_for_flags % 4 != 0 {
            return Err(Error::Config(format!(
                "bytes_for_flags must be a positive multiple of 4, got {}",
                self.bytes_for_flags
            )));
        }
        if !(self.max_distance_meters > 0.0 && self.max_distance_meters <= MAX_DISTANCE_METERS) {
            return Err(Error::Config(format!(
                "max distance must be in (0, {MAX_DISTANCE_METERS}] m, got {}",
                self.max_distance_meters
            )));
        }

        let turn_costs = if self.with_turn_costs {
            Some(TurnCostStorage::new(self.dir.create("turn_costs")?))
        } else {
            None
        };

        Ok(BaseGraph {
            nodes: self.dir.create("nodes")?,
            edges: self.dir.create("edges")?,
            geometry: self.dir.create("geometry")?,
            turn_costs,
            layout: Layout::new(
                self.bytes_for_flags,
                self.with_elevation,
                self.with_turn_costs,
            ),
            node_count: 0,
            edge_count: 0,
            max_geo_ref: FIRST_GEO_REF,
            shared_geo: FxHashSet::default(),
            bounds: FixedBounds::empty(),
            max_distance_mm: (self.max_distance_meters * MILLI_SCALE).round() as i32,
            initial_capacity: self.initial_capacity,
            frozen: false,
            initialized: false,
            dir: self.dir,
        })
    }

    /// Build and create empty tables
    pub fn create(self) -> Result<BaseGraph> {
        let initial = self.initial_capacity;
        let mut graph = self.build()?;
        graph.create(initial)?;
        Ok(graph)
    }
}

/// Node and edge tables plus geometry and optional turn costs
pub struct BaseGraph {
    nodes: Box<dyn DataAccess>,
    edges: Box<dyn DataAccess>,
    geometry: Box<dyn DataAccess>,
    turn_costs: Option<TurnCostStorage>,
    layout: Layout,
    node_count: u32,
    edge_count: u32,
    max_geo_ref: u64,
    /// Geometry records referenced by more than one edge, never rewritten in place
    shared_geo: FxHashSet<i64>,
    bounds: FixedBounds,
    max_distance_mm: i32,
    initial_capacity: u64,
    frozen: bool,
    initialized: bool,
    dir: Directory,
}

impl BaseGraph {
    /// Create empty tables of `initial_bytes` each
    pub fn create(&mut self, initial_bytes: u64) -> Result<()> {
        if self.initialized {
            return Err(Error::InvalidArgument(
                "base graph is already created or loaded".to_string(),
            ));
        }
        let initial_bytes = initial_bytes.max(self.layout.edge_stride);
        self.nodes.create(initial_bytes)?;
        self.edges.create(initial_bytes)?;
        self.geometry.create(initial_bytes)?;
        if let Some(turn_costs) = self.turn_costs.as_mut() {
            turn_costs.create(initial_bytes)?;
        }
        self.initialized = true;

        info!(
            "created base graph ({:?}, {} flag bytes, elevation: {}, turn costs: {})",
            self.dir.default_kind(),
            self.layout.bytes_for_flags,
            self.with_elevation(),
            self.has_turn_costs()
        );
        Ok(())
    }

    /// Load previously flushed tables; `Ok(false)` when there is nothing to load
    pub fn load_existing(&mut self) -> Result<bool> {
        if self.initialized {
            return Err(Error::InvalidArgument(
                "base graph is already created or loaded".to_string(),
            ));
        }
        if !self.nodes.load_existing()? {
            return Ok(false);
        }
        if !self.edges.load_existing()? {
            return Err(Error::Corrupt {
                name: "edges".to_string(),
                reason: "nodes exist but edges are missing".to_string(),
            });
        }
        if !self.geometry.load_existing()? {
            return Err(Error::Corrupt {
                name: "geometry".to_string(),
                reason: "nodes exist but geometry is missing".to_string(),
            });
        }

        check_version(self.nodes.as_ref(), NODES_VERSION)?;
        check_version(self.edges.as_ref(), EDGES_VERSION)?;
        check_version(self.geometry.as_ref(), GEOMETRY_VERSION)?;

        let stored_elevation = self.nodes.get_header(H_WITH_ELEVATION) == 1;
        let stored_turn_costs = self.nodes.get_header(H_WITH_TURN_COSTS) == 1;
        let stored_flags = self.edges.get_header(H_BYTES_FOR_FLAGS) as u64;
        if stored_elevation != self.with_elevation()
            || stored_turn_costs != self.has_turn_costs()
            || stored_flags != self.layout.bytes_for_flags
        {
            return Err(Error::IncompatibleConfig(format!(
                "stored graph has elevation: {stored_elevation}, turn costs: {stored_turn_costs}, \
                 {stored_flags} flag bytes; configured elevation: {}, turn costs: {}, {} flag bytes",
                self.with_elevation(),
                self.has_turn_costs(),
                self.layout.bytes_for_flags
            )));
        }
        if self.nodes.get_header(H_STRIDE) as u64 != self.layout.node_stride
            || self.edges.get_header(H_STRIDE) as u64 != self.layout.edge_stride
        {
            return Err(Error::IncompatibleConfig(
                "stored record strides differ from the configured layout".to_string(),
            ));
        }

        if let Some(turn_costs) = self.turn_costs.as_mut() {
            if !turn_costs.load_existing()? {
                return Err(Error::Corrupt {
                    name: "turn_costs".to_string(),
                    reason: "graph has turn costs but the table is missing".to_string(),
                });
            }
        }

        self.node_count = self.nodes.get_header(H_COUNT) as u32;
        self.edge_count = self.edges.get_header(H_COUNT) as u32;
        self.bounds = FixedBounds {
            min_lon: self.nodes.get_header(H_MIN_LON),
            max_lon: self.nodes.get_header(H_MAX_LON),
            min_lat: self.nodes.get_header(H_MIN_LAT),
            max_lat: self.nodes.get_header(H_MAX_LAT),
        };
        self.frozen = self.nodes.get_header(H_FROZEN) == 1;
        let low = self.edges.get_header(H_MAX_GEO_LOW) as u32 as u64;
        let high = self.edges.get_header(H_MAX_GEO_HIGH) as u32 as u64;
        self.max_geo_ref = (high << 32) | low;
        self.initialized = true;

        info!(
            "loaded base graph: {} nodes, {} edges",
            self.node_count, self.edge_count
        );
        Ok(true)
    }

    /// Write all tables; the graph must be frozen
    pub fn flush(&mut self) -> Result<()> {
        if !self.frozen {
            return Err(Error::NotFrozen("flush"));
        }

        self.nodes.set_header(H_VERSION, NODES_VERSION);
        self.nodes.set_header(H_STRIDE, self.layout.node_stride as i32);
        self.nodes.set_header(H_COUNT, self.node_count as i32);
        self.nodes.set_header(H_MIN_LON, self.bounds.min_lon);
        self.nodes.set_header(H_MAX_LON, self.bounds.max_lon);
        self.nodes.set_header(H_MIN_LAT, self.bounds.min_lat);
        self.nodes.set_header(H_MAX_LAT, self.bounds.max_lat);
        self.nodes
            .set_header(H_WITH_ELEVATION, self.with_elevation() as i32);
        self.nodes.set_header(H_FROZEN, self.frozen as i32);
        self.nodes
            .set_header(H_WITH_TURN_COSTS, self.has_turn_costs() as i32);

        self.edges.set_header(H_VERSION, EDGES_VERSION);
        self.edges.set_header(H_STRIDE, self.layout.edge_stride as i32);
        self.edges.set_header(H_COUNT, self.edge_count as i32);
        self.edges
            .set_header(H_BYTES_FOR_FLAGS, self.layout.bytes_for_flags as i32);
        self.edges.set_header(H_MAX_GEO_LOW, self.max_geo_ref as i32);
        self.edges
            .set_header(H_MAX_GEO_HIGH, (self.max_geo_ref >> 32) as i32);

        self.geometry.set_header(H_VERSION, GEOMETRY_VERSION);

        self.nodes.flush()?;
        self.edges.flush()?;
        self.geometry.flush()?;
        if let Some(turn_costs) = self.turn_costs.as_mut() {
            turn_costs.flush()?;
        }

        info!(
            "flushed base graph: {} nodes, {} edges",
            self.node_count, self.edge_count
        );
        Ok(())
    }

    pub fn close(&mut self) {
        self.nodes.close();
        self.edges.close();
        self.geometry.close();
        if let Some(turn_costs) = self.turn_costs.as_mut() {
            turn_costs.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.nodes.is_closed()
    }

    /// Make the graph read-only; needed before CH preparation and flush
    pub fn freeze(&mut self) {
        if !self.frozen {
            self.frozen = true;
            debug!(
                "froze base graph with {} nodes, {} edges",
                self.node_count, self.edge_count
            );
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn with_elevation(&self) -> bool {
        self.layout.n_ele.is_some()
    }

    pub fn has_turn_costs(&self) -> bool {
        self.turn_costs.is_some()
    }

    pub fn bytes_for_flags(&self) -> u32 {
        self.layout.bytes_for_flags as u32
    }

    pub fn directory(&self) -> &Directory {
        &self.dir
    }

    pub(crate) fn initial_capacity(&self) -> u64 {
        self.initial_capacity
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    pub fn edge_count(&self) -> u32 {
        self.edge_count
    }

    pub fn bounds(&self) -> BBox {
        self.bounds.to_bbox()
    }

    /// Largest storable distance in metres
    pub fn max_distance(&self) -> f64 {
        int_to_distance(self.max_distance_mm)
    }

    fn check_not_frozen(&self, operation: &'static str) -> Result<()> {
        if self.frozen {
            return Err(Error::Frozen(operation));
        }
        Ok(())
    }

    fn check_node(&self, node: NodeId) -> Result<()> {
        if node >= self.node_count {
            return Err(Error::out_of_bounds("node", node, self.node_count));
        }
        Ok(())
    }

    fn check_edge(&self, edge: EdgeId) -> Result<()> {
        if edge >= self.edge_count {
            return Err(Error::out_of_bounds("edge", edge, self.edge_count));
        }
        Ok(())
    }

    // ---- nodes ----

    #[inline]
    fn node_pos(&self, node: NodeId) -> u64 {
        node as u64 * self.layout.node_stride
    }

    /// Grow the node table so that `node` is a valid id
    fn ensure_node(&mut self, node: NodeId) -> Result<()> {
        if node < self.node_count {
            return Ok(());
        }
        if node as u64 >= MAX_ID_COUNT {
            return Err(Error::CapacityExceeded {
                what: "node",
                limit: MAX_ID_COUNT,
            });
        }
        let new_count = node + 1;
        self.nodes
            .ensure_capacity(new_count as u64 * self.layout.node_stride)?;
        for n in self.node_count..new_count {
            let pos = self.node_pos(n);
            self.nodes.set_int(pos + N_EDGE_REF, NO_REF);
            self.nodes.set_int(pos + N_LAT, 0);
            self.nodes.set_int(pos + N_LON, 0);
            if let Some(offset) = self.layout.n_ele {
                self.nodes.set_int(pos + offset, 0);
            }
            if let Some(offset) = self.layout.n_turn_cost {
                self.nodes.set_int(pos + offset, NO_REF);
            }
        }
        self.node_count = new_count;
        Ok(())
    }

    /// Set coordinates, growing the node table if needed; `ele` is ignored without elevation
    pub fn set_node(&mut self, node: NodeId, lat: f64, lon: f64, ele: f64) -> Result<()> {
        self.check_not_frozen("set node")?;
        self.ensure_node(node)?;

        let pos = self.node_pos(node);
        let lat_int = degree_to_int(lat);
        let lon_int = degree_to_int(lon);
        self.nodes.set_int(pos + N_LAT, lat_int);
        self.nodes.set_int(pos + N_LON, lon_int);
        if let Some(offset) = self.layout.n_ele {
            self.nodes.set_int(pos + offset, ele_to_int(ele));
        }
        self.bounds.update(lat_int, lon_int);
        Ok(())
    }

    pub fn lat(&self, node: NodeId) -> f64 {
        assert!(node < self.node_count, "node {node} out of bounds");
        int_to_degree(self.nodes.get_int(self.node_pos(node) + N_LAT))
    }

    pub fn lon(&self, node: NodeId) -> f64 {
        assert!(node < self.node_count, "node {node} out of bounds");
        int_to_degree(self.nodes.get_int(self.node_pos(node) + N_LON))
    }

    /// Elevation in metres, NaN when the graph has no elevation
    pub fn ele(&self, node: NodeId) -> f64 {
        assert!(node < self.node_count, "node {node} out of bounds");
        match self.layout.n_ele {
            Some(offset) => int_to_ele(self.nodes.get_int(self.node_pos(node) + offset)),
            None => f64::NAN,
        }
    }

    #[inline]
    fn edge_ref(&self, node: NodeId) -> i32 {
        self.nodes.get_int(self.node_pos(node) + N_EDGE_REF)
    }

    #[inline]
    fn set_edge_ref(&mut self, node: NodeId, edge: i32) {
        let pos = self.node_pos(node);
        self.nodes.set_int(pos + N_EDGE_REF, edge);
    }

    // ---- edges ----

    #[inline]
    fn edge_pos(&self, edge: EdgeId) -> u64 {
        edge as u64 * self.layout.edge_stride
    }

    #[inline]
    pub(crate) fn node_a(&self, edge: EdgeId) -> NodeId {
        self.edges.get_int(self.edge_pos(edge) + E_NODEA) as NodeId
    }

    #[inline]
    pub(crate) fn node_b(&self, edge: EdgeId) -> NodeId {
        self.edges.get_int(self.edge_pos(edge) + E_NODEB) as NodeId
    }

    #[inline]
    pub(crate) fn link_a(&self, edge: EdgeId) -> i32 {
        self.edges.get_int(self.edge_pos(edge) + E_LINKA)
    }

    #[inline]
    pub(crate) fn link_b(&self, edge: EdgeId) -> i32 {
        self.edges.get_int(self.edge_pos(edge) + E_LINKB)
    }

    /// Append an edge and prepend it onto both endpoints' adjacency lists
    pub fn add_edge(&mut self, node_a: NodeId, node_b: NodeId) -> Result<EdgeMut<'_>> {
        self.check_not_frozen("add edge")?;
        self.ensure_node(node_a.max(node_b))?;
        if self.edge_count as u64 >= MAX_ID_COUNT {
            return Err(Error::CapacityExceeded {
                what: "edge",
                limit: MAX_ID_COUNT,
            });
        }

        let edge = self.edge_count;
        let pos = self.edge_pos(edge);
        self.edges.ensure_capacity(pos + self.layout.edge_stride)?;
        self.edge_count += 1;

        let zero_flags = vec![0u8; self.layout.bytes_for_flags as usize];
        self.edges.set_int(pos + E_NODEA, node_a as i32);
        self.edges.set_int(pos + E_NODEB, node_b as i32);
        self.edges.set_bytes(pos + E_FLAGS, &zero_flags);
        self.edges.set_int(pos + self.layout.e_dist, 0);
        self.edges.set_long(pos + self.layout.e_geo, 0);
        self.edges.set_int(pos + self.layout.e_kv, 0);

        let head_a = self.edge_ref(node_a);
        self.edges.set_int(pos + E_LINKA, head_a);
        self.set_edge_ref(node_a, edge as i32);
        if node_a != node_b {
            let head_b = self.edge_ref(node_b);
            self.edges.set_int(pos + E_LINKB, head_b);
            self.set_edge_ref(node_b, edge as i32);
        } else {
            self.edges.set_int(pos + E_LINKB, NO_REF);
        }

        Ok(EdgeMut {
            graph: self,
            edge,
            base: node_a,
            adj: node_b,
            reverse: false,
        })
    }

    /// Add a structural duplicate of `edge` with the same endpoints, flags, distance and
    /// key-value reference. With `reuse_geometry` both edges point at one geometry record
    /// until either is given new geometry.
    pub fn copy_edge(&mut self, edge: EdgeId, reuse_geometry: bool) -> Result<EdgeId> {
        self.check_edge(edge)?;
        let node_a = self.node_a(edge);
        let node_b = self.node_b(edge);
        let flags = self.flags(edge);
        let distance_mm = self.edges.get_int(self.edge_pos(edge) + self.layout.e_dist);
        let kv_ref = self.key_values_ref(edge);
        let geo_ref = self.geo_ref(edge);
        let pillars = if reuse_geometry {
            None
        } else {
            Some(self.pillars(edge, false))
        };

        let copy = self.add_edge(node_a, node_b)?.edge();
        let pos = self.edge_pos(copy);
        self.set_flags(copy, &flags)?;
        self.set_key_values_ref(copy, kv_ref)?;
        self.edges.set_int(pos + self.layout.e_dist, distance_mm);
        match pillars {
            None => {
                if geo_ref > 0 {
                    self.shared_geo.insert(geo_ref);
                }
                self.edges.set_long(pos + self.layout.e_geo, geo_ref)
            }
            Some(pillars) => self.set_way_geometry(copy, &pillars, false)?,
        }
        Ok(copy)
    }

    /// `edge` oriented towards `adj_node`; `None` gives the stored direction
    pub fn edge_state(&self, edge: EdgeId, adj_node: Option<NodeId>) -> Result<BaseEdge<'_>> {
        self.check_edge(edge)?;
        let node_a = self.node_a(edge);
        let node_b = self.node_b(edge);
        let reverse = match adj_node {
            None => false,
            Some(adj) if adj == node_b => false,
            Some(adj) if adj == node_a => true,
            Some(adj) => {
                return Err(Error::InvalidArgument(format!(
                    "edge {edge} ({node_a}-{node_b}) does not touch node {adj}"
                )))
            }
        };
        Ok(self.oriented(edge, node_a, node_b, reverse))
    }

    pub fn edge_state_for_key(&self, edge_key: u32) -> Result<BaseEdge<'_>> {
        let edge = edge_from_key(edge_key);
        self.check_edge(edge)?;
        Ok(self.oriented(
            edge,
            self.node_a(edge),
            self.node_b(edge),
            is_reverse_key(edge_key),
        ))
    }

    fn oriented(&self, edge: EdgeId, node_a: NodeId, node_b: NodeId, reverse: bool) -> BaseEdge<'_> {
        let (base, adj) = if reverse {
            (node_b, node_a)
        } else {
            (node_a, node_b)
        };
        BaseEdge {
            graph: self,
            edge,
            base,
            adj,
            reverse,
        }
    }

    pub fn edge_mut(&mut self, edge: EdgeId, adj_node: Option<NodeId>) -> Result<EdgeMut<'_>> {
        let state = self.edge_state(edge, adj_node)?;
        let (base, adj, reverse) = (state.base, state.adj, state.reverse);
        Ok(EdgeMut {
            graph: self,
            edge,
            base,
            adj,
            reverse,
        })
    }

    /// Adjacency list of `node`, each edge oriented with `node` as base
    pub fn edges(&self, node: NodeId) -> BaseEdgeIter<'_> {
        assert!(node < self.node_count, "node {node} out of bounds");
        BaseEdgeIter {
            graph: self,
            node,
            next: self.edge_ref(node),
        }
    }

    pub(crate) fn distance(&self, edge: EdgeId) -> f64 {
        int_to_distance(self.edges.get_int(self.edge_pos(edge) + self.layout.e_dist))
    }

    pub(crate) fn set_distance(&mut self, edge: EdgeId, meters: f64) -> Result<()> {
        self.check_not_frozen("set distance")?;
        let (value, saturated) = distance_to_int(meters, self.max_distance_mm)?;
        if saturated {
            warn!(
                "distance {meters} m of edge {edge} exceeds the maximum, stored as {} m",
                self.max_distance()
            );
        }
        let pos = self.edge_pos(edge);
        self.edges.set_int(pos + self.layout.e_dist, value);
        Ok(())
    }

    pub(crate) fn flags(&self, edge: EdgeId) -> EdgeFlags {
        let mut raw = vec![0u8; self.layout.bytes_for_flags as usize];
        self.edges
            .get_bytes(self.edge_pos(edge) + E_FLAGS, &mut raw);
        EdgeFlags::from_ints(
            raw.chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }

    pub(crate) fn set_flags(&mut self, edge: EdgeId, flags: &EdgeFlags) -> Result<()> {
        self.check_not_frozen("set flags")?;
        if flags.len_bytes() as u64 != self.layout.bytes_for_flags {
            return Err(Error::InvalidArgument(format!(
                "flags are {} bytes, graph stores {}",
                flags.len_bytes(),
                self.layout.bytes_for_flags
            )));
        }
        let raw: Vec<u8> = flags.ints().iter().flat_map(|v| v.to_le_bytes()).collect();
        let pos = self.edge_pos(edge);
        self.edges.set_bytes(pos + E_FLAGS, &raw);
        Ok(())
    }

    pub(crate) fn key_values_ref(&self, edge: EdgeId) -> i32 {
        self.edges.get_int(self.edge_pos(edge) + self.layout.e_kv)
    }

    pub(crate) fn set_key_values_ref(&mut self, edge: EdgeId, kv_ref: i32) -> Result<()> {
        self.check_not_frozen("set key values")?;
        let pos = self.edge_pos(edge);
        self.edges.set_int(pos + self.layout.e_kv, kv_ref);
        Ok(())
    }

    // ---- geometry ----

    fn geo_ref(&self, edge: EdgeId) -> i64 {
        self.edges.get_long(self.edge_pos(edge) + self.layout.e_geo)
    }

    /// Pillar points in stored direction, reversed when `reverse`
    pub(crate) fn pillars(&self, edge: EdgeId, reverse: bool) -> PointList {
        let geo_ref = self.geo_ref(edge);
        if geo_ref <= 0 {
            return PointList::new(self.with_elevation());
        }
        let pos = geo_ref as u64;
        let count = self.geometry.get_int(pos) as usize;
        let mut points = PointList::with_capacity(count, self.with_elevation());
        let mut p = pos + 4;
        for _ in 0..count {
            let lat = int_to_degree(self.geometry.get_int(p));
            let lon = int_to_degree(self.geometry.get_int(p + 4));
            let ele = if self.with_elevation() {
                int_to_ele(self.geometry.get_int(p + 8))
            } else {
                f64::NAN
            };
            points.add(lat, lon, ele);
            p += self.layout.point_bytes;
        }
        if reverse {
            points.reverse();
        }
        points
    }

    /// Store pillars given in the direction of a state with `reverse`.
    ///
    /// A record of the same size is overwritten in place, otherwise a new one is appended.
    pub(crate) fn set_way_geometry(
        &mut self,
        edge: EdgeId,
        pillars: &PointList,
        reverse: bool,
    ) -> Result<()> {
        self.check_not_frozen("set geometry")?;
        if self.with_elevation() && !pillars.is_3d() && !pillars.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "graph stores elevation but geometry of edge {edge} is 2D"
            )));
        }

        let edge_pos = self.edge_pos(edge);
        if pillars.is_empty() {
            self.edges.set_long(edge_pos + self.layout.e_geo, 0);
            return Ok(());
        }

        let mut stored = pillars.clone();
        if reverse {
            stored.reverse();
        }

        let count = stored.len();
        let existing = self.geo_ref(edge);
        let pos = if existing > 0
            && !self.shared_geo.contains(&existing)
            && self.geometry.get_int(existing as u64) as usize == count
        {
            existing as u64
        } else {
            let bytes = 4 + count as u64 * self.layout.point_bytes;
            let pos = self.max_geo_ref;
            self.geometry.ensure_capacity(pos + bytes)?;
            self.max_geo_ref += bytes;
            pos
        };

        self.geometry.set_int(pos, count as i32);
        let mut p = pos + 4;
        for i in 0..count {
            self.geometry.set_int(p, degree_to_int(stored.lat(i)));
            self.geometry.set_int(p + 4, degree_to_int(stored.lon(i)));
            if self.with_elevation() {
                self.geometry.set_int(p + 8, ele_to_int(stored.ele(i)));
            }
            p += self.layout.point_bytes;
        }
        self.edges.set_long(edge_pos + self.layout.e_geo, pos as i64);
        Ok(())
    }

    pub(crate) fn fetch_way_geometry(
        &self,
        edge: EdgeId,
        base: NodeId,
        adj: NodeId,
        reverse: bool,
        mode: FetchMode,
    ) -> PointList {
        let pillars = if mode.includes_pillars() {
            self.pillars(edge, reverse)
        } else {
            PointList::new(self.with_elevation())
        };
        let mut points = PointList::with_capacity(pillars.len() + 2, self.with_elevation());
        if mode.includes_base() {
            points.add(self.lat(base), self.lon(base), self.ele(base));
        }
        for i in 0..pillars.len() {
            points.add_from(&pillars, i);
        }
        if mode.includes_adj() {
            points.add(self.lat(adj), self.lon(adj), self.ele(adj));
        }
        points
    }

    // ---- turn costs ----

    /// Set the cost of turning from `from` onto `to` at `via`; `f64::INFINITY` forbids it
    pub fn set_turn_cost(&mut self, from: EdgeId, via: NodeId, to: EdgeId, cost: f64) -> Result<()> {
        self.check_not_frozen("set turn cost")?;
        self.check_node(via)?;
        self.check_edge(from)?;
        self.check_edge(to)?;
        let Some(offset) = self.layout.n_turn_cost else {
            return Err(Error::Config(
                "turn costs are not enabled for this graph".to_string(),
            ));
        };
        let cost = turn_cost_to_int(cost)?;

        let pos = self.node_pos(via) + offset;
        let head = self.nodes.get_int(pos);
        if let Some(turn_costs) = self.turn_costs.as_mut() {
            let new_head = turn_costs.set(head, from, to, cost)?;
            self.nodes.set_int(pos, new_head);
        }
        Ok(())
    }

    /// 0 when no entry exists or turn costs are disabled
    pub fn turn_cost(&self, from: EdgeId, via: NodeId, to: EdgeId) -> f64 {
        let (Some(turn_costs), Some(offset)) = (&self.turn_costs, self.layout.n_turn_cost) else {
            return 0.0;
        };
        if via >= self.node_count {
            return 0.0;
        }
        let head = self.nodes.get_int(self.node_pos(via) + offset);
        turn_costs
            .get(head, from, to)
            .map(int_to_turn_cost)
            .unwrap_or(0.0)
    }

    /// All entries stored for `via`
    pub fn turn_cost_entries(&self, via: NodeId) -> Vec<TurnCostEntry> {
        let (Some(turn_costs), Some(offset)) = (&self.turn_costs, self.layout.n_turn_cost) else {
            return Vec::new();
        };
        if via >= self.node_count {
            return Vec::new();
        }
        let head = self.nodes.get_int(self.node_pos(via) + offset);
        turn_costs.entries(head, via).collect()
    }

    pub fn turn_cost_entry_count(&self) -> u32 {
        self.turn_costs.as_ref().map_or(0, |tc| tc.count())
    }
}

fn check_version(data: &dyn DataAccess, expected: i32) -> Result<()> {
    let found = data.get_header(H_VERSION);
    if found != expected {
        return Err(Error::VersionMismatch {
            name: data.name().to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

/// [`BaseEdgeIter`] yielding [`EdgeView`]s
pub struct BaseEdgeViews<'a>(BaseEdgeIter<'a>);

impl<'a> Iterator for BaseEdgeViews<'a> {
    type Item = EdgeView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(EdgeView::Base)
    }
}

impl GraphView for BaseGraph {
    type Edges<'a> = BaseEdgeViews<'a>;

    fn base_graph(&self) -> &BaseGraph {
        self
    }

    fn node_count(&self) -> u32 {
        self.node_count
    }

    fn edge_count(&self) -> u32 {
        self.edge_count
    }

    fn lat(&self, node: NodeId) -> f64 {
        BaseGraph::lat(self, node)
    }

    fn lon(&self, node: NodeId) -> f64 {
        BaseGraph::lon(self, node)
    }

    fn ele(&self, node: NodeId) -> f64 {
        BaseGraph::ele(self, node)
    }

    fn edges(&self, node: NodeId) -> Self::Edges<'_> {
        BaseEdgeViews(BaseGraph::edges(self, node))
    }

    fn edge_state(&self, edge: EdgeId, adj_node: Option<NodeId>) -> Result<EdgeView<'_>> {
        BaseGraph::edge_state(self, edge, adj_node).map(EdgeView::Base)
    }

    fn edge_state_for_key(&self, edge_key: u32) -> Result<EdgeView<'_>> {
        BaseGraph::edge_state_for_key(self, edge_key).map(EdgeView::Base)
    }

    fn turn_cost(&self, from: EdgeId, via: NodeId, to: EdgeId) -> f64 {
        BaseGraph::turn_cost(self, from, via, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::view::EdgeState;

    fn graph() -> BaseGraph {
        BaseGraphBuilder::new(4).create().unwrap()
    }

    fn adjacent(graph: &BaseGraph, node: NodeId) -> Vec<(EdgeId, NodeId)> {
        graph.edges(node).map(|e| (e.edge(), e.adj_node())).collect()
    }

    #[test]
    fn test_add_edge_prepends() {
        let mut g = graph();
        let e0 = g.add_edge(0, 1).unwrap().edge();
        let e1 = g.add_edge(0, 2).unwrap().edge();
        let e2 = g.add_edge(2, 1).unwrap().edge();

        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(adjacent(&g, 0), vec![(e1, 2), (e0, 1)]);
        assert_eq!(adjacent(&g, 1), vec![(e2, 2), (e0, 0)]);
        assert_eq!(adjacent(&g, 2), vec![(e2, 1), (e1, 0)]);
    }

    #[test]
    fn test_self_loop_listed_once() {
        let mut g = graph();
        let loop_edge = g.add_edge(3, 3).unwrap().edge();
        g.add_edge(3, 1).unwrap();
        let at_3: Vec<_> = g.edges(3).map(|e| e.edge()).collect();
        assert_eq!(at_3.iter().filter(|&&e| e == loop_edge).count(), 1);
        assert_eq!(at_3.len(), 2);
    }

    #[test]
    fn test_new_nodes_have_no_edges() {
        let mut g = graph();
        g.add_edge(0, 5).unwrap();
        assert_eq!(g.node_count(), 6);
        assert_eq!(g.edges(3).count(), 0);
    }

    #[test]
    fn test_edge_state_orientation() {
        let mut g = graph();
        let edge = g.add_edge(4, 7).unwrap().edge();

        let forward = g.edge_state(edge, Some(7)).unwrap();
        assert_eq!((forward.base_node(), forward.adj_node()), (4, 7));
        assert!(!forward.is_reverse());

        let backward = g.edge_state(edge, Some(4)).unwrap();
        assert_eq!((backward.base_node(), backward.adj_node()), (7, 4));
        assert_eq!(backward.edge_key(), forward.edge_key() + 1);

        assert!(g.edge_state(edge, Some(5)).is_err());
        assert!(matches!(
            g.edge_state(9, None),
            Err(Error::OutOfBounds { .. })
        ));

        let by_key = g.edge_state_for_key(backward.edge_key()).unwrap();
        assert_eq!(by_key.base_node(), 7);
    }

    #[test]
    fn test_distance_round_trip_and_saturation() {
        let mut g = BaseGraphBuilder::new(4)
            .set_max_distance(1000.0)
            .create()
            .unwrap();
        let e = g.add_edge(0, 1).unwrap().set_distance(12.3456).unwrap().edge();
        assert_eq!(g.distance(e), 12.346);

        let far = g.add_edge(1, 2).unwrap().set_distance(5000.0).unwrap().edge();
        assert_eq!(g.distance(far), 1000.0);

        assert!(matches!(
            g.edge_mut(e, None).unwrap().set_distance(-1.0),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_flags_width_is_checked() {
        let mut g = BaseGraphBuilder::new(8).create().unwrap();
        let mut flags = EdgeFlags::new(2);
        flags.set_bit(40, true);
        let e = g.add_edge(0, 1).unwrap().set_flags(&flags).unwrap().edge();
        assert_eq!(g.edge_state(e, None).unwrap().flags(), flags);
        assert!(g
            .edge_mut(e, None)
            .unwrap()
            .set_flags(&EdgeFlags::new(1))
            .is_err());
    }

    #[test]
    fn test_way_geometry_modes_and_reverse() {
        let mut g = graph();
        g.set_node(0, 1.0, 1.0, 0.0).unwrap();
        g.set_node(1, 2.0, 2.0, 0.0).unwrap();
        let pillars = PointList::from_coords(&[(1.2, 1.2), (1.5, 1.5)]);
        let e = g
            .add_edge(0, 1)
            .unwrap()
            .set_way_geometry(&pillars)
            .unwrap()
            .edge();

        let forward = g.edge_state(e, Some(1)).unwrap();
        let all = forward.fetch_way_geometry(FetchMode::All);
        assert_eq!(all.len(), 4);
        assert_eq!((all.lat(0), all.lat(3)), (1.0, 2.0));
        assert_eq!(forward.fetch_way_geometry(FetchMode::PillarOnly), pillars);
        assert_eq!(forward.fetch_way_geometry(FetchMode::TowerOnly).len(), 2);
        assert_eq!(forward.fetch_way_geometry(FetchMode::BaseAndPillar).lat(0), 1.0);
        assert_eq!(forward.fetch_way_geometry(FetchMode::PillarAndAdj).lat(2), 2.0);

        let backward = g.edge_state(e, Some(0)).unwrap();
        let reversed = backward.fetch_way_geometry(FetchMode::All);
        assert_eq!(reversed.lat(0), 2.0);
        assert_eq!(reversed.lat(1), 1.5);
        assert_eq!(reversed.lat(3), 1.0);
    }

    #[test]
    fn test_geometry_set_from_reverse_state() {
        let mut g = graph();
        g.set_node(0, 1.0, 1.0, 0.0).unwrap();
        g.set_node(1, 2.0, 2.0, 0.0).unwrap();
        let e = g.add_edge(0, 1).unwrap().edge();
        g.edge_mut(e, Some(0))
            .unwrap()
            .set_way_geometry(&PointList::from_coords(&[(1.7, 1.7), (1.3, 1.3)]))
            .unwrap();
        let forward = g.edge_state(e, None).unwrap();
        let pillars = forward.fetch_way_geometry(FetchMode::PillarOnly);
        assert_eq!((pillars.lat(0), pillars.lat(1)), (1.3, 1.7));
    }

    #[test]
    fn test_copy_edge() {
        let mut g = graph();
        g.set_node(0, 0.0, 0.0, 0.0).unwrap();
        g.set_node(1, 0.0, 0.01, 0.0).unwrap();
        let e = g
            .add_edge(0, 1)
            .unwrap()
            .set_distance(1111.0)
            .unwrap()
            .set_key_values_ref(17)
            .unwrap()
            .set_way_geometry(&PointList::from_coords(&[(0.0, 0.005)]))
            .unwrap()
            .edge();

        for reuse in [true, false] {
            let copy = g.copy_edge(e, reuse).unwrap();
            let state = g.edge_state(copy, None).unwrap();
            assert_eq!((state.base_node(), state.adj_node()), (0, 1));
            assert_eq!(state.distance(), 1111.0);
            assert_eq!(state.key_values_ref(), 17);
            assert_eq!(state.fetch_way_geometry(FetchMode::PillarOnly).len(), 1);
        }
        assert_eq!(g.edges(0).count(), 3);
    }

    #[test]
    fn test_shared_geometry_is_copied_on_write() {
        let mut g = graph();
        let e = g
            .add_edge(0, 1)
            .unwrap()
            .set_way_geometry(&PointList::from_coords(&[(0.0, 0.005)]))
            .unwrap()
            .edge();
        let copy = g.copy_edge(e, true).unwrap();
        assert_eq!(g.geo_ref(copy), g.geo_ref(e));

        // same point count as the shared record
        g.edge_mut(copy, None)
            .unwrap()
            .set_way_geometry(&PointList::from_coords(&[(0.002, 0.007)]))
            .unwrap();
        assert_ne!(g.geo_ref(copy), g.geo_ref(e));

        let original = g.edge_state(e, None).unwrap().fetch_way_geometry(FetchMode::PillarOnly);
        assert!((original.lon(0) - 0.005).abs() < 1e-7);
        let changed = g
            .edge_state(copy, None)
            .unwrap()
            .fetch_way_geometry(FetchMode::PillarOnly);
        assert!((changed.lat(0) - 0.002).abs() < 1e-7);
        assert!((changed.lon(0) - 0.007).abs() < 1e-7);
    }

    #[test]
    fn test_frozen_rejects_mutation() {
        let mut g = graph();
        let e = g.add_edge(0, 1).unwrap().edge();
        g.freeze();
        assert!(matches!(g.add_edge(1, 2), Err(Error::Frozen(_))));
        assert!(matches!(g.set_node(0, 1.0, 1.0, 0.0), Err(Error::Frozen(_))));
        assert!(matches!(
            g.edge_mut(e, None).unwrap().set_distance(1.0),
            Err(Error::Frozen(_))
        ));
    }

    #[test]
    fn test_flush_requires_freeze() {
        let mut g = graph();
        assert!(matches!(g.flush(), Err(Error::NotFrozen(_))));
    }

    #[test]
    fn test_bounds() {
        let mut g = graph();
        assert!(!g.bounds().is_valid());
        g.set_node(0, 50.0, 4.0, 0.0).unwrap();
        g.set_node(1, 51.5, 3.5, 0.0).unwrap();
        let bounds = g.bounds();
        assert_eq!(bounds.min_lat, 50.0);
        assert_eq!(bounds.max_lat, 51.5);
        assert_eq!(bounds.min_lon, 3.5);
        assert_eq!(bounds.max_lon, 4.0);
    }

    #[test]
    fn test_turn_costs() {
        let mut g = BaseGraphBuilder::new(4)
            .with_turn_costs(true)
            .create()
            .unwrap();
        let e0 = g.add_edge(0, 1).unwrap().edge();
        let e1 = g.add_edge(1, 2).unwrap().edge();
        assert_eq!(g.turn_cost(e0, 1, e1), 0.0);
        g.set_turn_cost(e0, 1, e1, 12.5).unwrap();
        g.set_turn_cost(e1, 1, e0, f64::INFINITY).unwrap();
        assert_eq!(g.turn_cost(e0, 1, e1), 12.5);
        assert_eq!(g.turn_cost(e1, 1, e0), f64::INFINITY);
        assert_eq!(g.turn_cost_entries(1).len(), 2);
        assert!(g.turn_cost_entries(0).is_empty());
    }

    #[test]
    fn test_turn_costs_disabled() {
        let mut g = graph();
        let e0 = g.add_edge(0, 1).unwrap().edge();
        assert!(matches!(
            g.set_turn_cost(e0, 1, e0, 1.0),
            Err(Error::Config(_))
        ));
        assert_eq!(g.turn_cost(e0, 1, e0), 0.0);
    }

    #[test]
    fn test_invalid_builder_config() {
        assert!(matches!(
            BaseGraphBuilder::new(3).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            BaseGraphBuilder::new(4).set_max_distance(3e6).build(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_elevation() {
        let mut g = BaseGraphBuilder::new(4)
            .with_elevation(true)
            .create()
            .unwrap();
        g.set_node(0, 1.0, 2.0, 123.456).unwrap();
        assert_eq!(g.ele(0), 123.456);

        let e = g.add_edge(0, 1).unwrap().edge();
        let flat = PointList::from_coords(&[(1.0, 2.5)]);
        assert!(g.edge_mut(e, None).unwrap().set_way_geometry(&flat).is_err());

        let mut flat_graph = graph();
        flat_graph.set_node(0, 1.0, 2.0, 123.0).unwrap();
        assert!(flat_graph.ele(0).is_nan());
    }
}
