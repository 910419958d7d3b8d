mod common;

use roadgraph::{
    BaseGraph, BaseGraphBuilder, EdgeFlags, EdgeState, Error, FetchMode, GraphConfig, PointList,
};
use roadgraph_io::{DataAccessKind, Directory};
use tempfile::TempDir;

use common::assert_adjacency_consistent;

fn builder(dir: &TempDir, kind: DataAccessKind) -> BaseGraphBuilder {
    BaseGraphBuilder::new(8)
        .set_dir(Directory::new(dir.path(), kind))
        .with_elevation(true)
        .with_turn_costs(true)
}

fn populate(g: &mut BaseGraph) {
    g.set_node(0, 52.5, 13.4, 34.5).unwrap();
    g.set_node(1, 52.51, 13.41, 40.25).unwrap();
    g.set_node(2, 52.52, 13.39, 0.0).unwrap();

    let mut pillars = PointList::new(true);
    pillars.add(52.505, 13.402, 36.0);
    pillars.add(52.507, 13.406, 38.0);

    let mut flags = EdgeFlags::new(2);
    flags.set_bit(3, true);
    flags.set_bit(40, true);
    g.add_edge(0, 1)
        .unwrap()
        .set_distance(1320.5)
        .unwrap()
        .set_flags(&flags)
        .unwrap()
        .set_key_values_ref(17)
        .unwrap()
        .set_way_geometry(&pillars)
        .unwrap();
    g.add_edge(1, 2).unwrap().set_distance(2010.0).unwrap();
    g.add_edge(2, 2).unwrap().set_distance(55.0).unwrap();
    g.set_turn_cost(0, 1, 1, 12.5).unwrap();
    g.set_turn_cost(1, 1, 0, f64::INFINITY).unwrap();
}

fn assert_populated(g: &BaseGraph) {
    assert_eq!(g.node_count(), 3);
    assert_eq!(g.edge_count(), 3);
    assert!(g.is_frozen());
    assert!((g.lat(1) - 52.51).abs() < 1e-7);
    assert!((g.lon(2) - 13.39).abs() < 1e-7);
    assert!((g.ele(0) - 34.5).abs() < 1e-3);

    let e0 = g.edge_state(0, Some(1)).unwrap();
    assert!((e0.distance() - 1320.5).abs() < 1e-3);
    assert!(e0.flags().get_bit(3));
    assert!(e0.flags().get_bit(40));
    assert!(!e0.flags().get_bit(4));
    assert_eq!(e0.key_values_ref(), 17);
    let pillars = e0.fetch_way_geometry(FetchMode::PillarOnly);
    assert_eq!(pillars.len(), 2);
    assert!((pillars.lon(1) - 13.406).abs() < 1e-7);
    assert!((pillars.ele(0) - 36.0).abs() < 1e-3);

    assert_eq!(g.turn_cost(0, 1, 1), 12.5);
    assert_eq!(g.turn_cost(1, 1, 0), f64::INFINITY);
    assert_eq!(g.turn_cost(1, 2, 2), 0.0);
    assert_adjacency_consistent(g);
}

fn round_trip(kind: DataAccessKind) {
    let dir = TempDir::new().unwrap();
    let bounds = {
        let mut g = builder(&dir, kind).create().unwrap();
        populate(&mut g);
        g.freeze();
        g.flush().unwrap();
        let bounds = g.bounds();
        g.close();
        bounds
    };
    assert!(bounds.is_valid());
    assert!((bounds.min_lat - 52.5).abs() < 1e-7);
    assert!((bounds.max_lon - 13.41).abs() < 1e-7);

    let mut loaded = builder(&dir, kind).build().unwrap();
    assert!(loaded.load_existing().unwrap());
    assert_populated(&loaded);
    assert_eq!(loaded.bounds(), bounds);
}

#[test]
fn test_round_trip_in_memory_store() {
    round_trip(DataAccessKind::InMemoryStore);
}

#[test]
fn test_round_trip_memory_mapped() {
    round_trip(DataAccessKind::MemoryMapped);
}

#[test]
fn test_nothing_to_load() {
    let dir = TempDir::new().unwrap();
    let mut g = builder(&dir, DataAccessKind::InMemoryStore).build().unwrap();
    assert!(!g.load_existing().unwrap());
}

#[test]
fn test_load_with_different_layout_fails() {
    let dir = TempDir::new().unwrap();
    let mut g = builder(&dir, DataAccessKind::InMemoryStore).create().unwrap();
    populate(&mut g);
    g.freeze();
    g.flush().unwrap();

    let mut other = BaseGraphBuilder::new(8)
        .set_dir(Directory::new(dir.path(), DataAccessKind::InMemoryStore))
        .with_turn_costs(true)
        .build()
        .unwrap();
    assert!(matches!(
        other.load_existing(),
        Err(Error::IncompatibleConfig(_))
    ));

    let mut other = BaseGraphBuilder::new(4)
        .set_dir(Directory::new(dir.path(), DataAccessKind::InMemoryStore))
        .with_elevation(true)
        .with_turn_costs(true)
        .build()
        .unwrap();
    assert!(matches!(
        other.load_existing(),
        Err(Error::IncompatibleConfig(_))
    ));
}

#[test]
fn test_load_newer_version_fails() {
    let dir = TempDir::new().unwrap();
    let mut g = builder(&dir, DataAccessKind::InMemoryStore).create().unwrap();
    populate(&mut g);
    g.freeze();
    g.flush().unwrap();
    g.close();

    let directory = Directory::new(dir.path(), DataAccessKind::InMemoryStore);
    let mut nodes = directory.create("nodes").unwrap();
    assert!(nodes.load_existing().unwrap());
    nodes.set_header(0, 99);
    nodes.flush().unwrap();

    let mut loaded = builder(&dir, DataAccessKind::InMemoryStore).build().unwrap();
    assert!(matches!(
        loaded.load_existing(),
        Err(Error::VersionMismatch { found: 99, .. })
    ));
}

#[test]
fn test_frozen_graph_rejects_writes() {
    let mut g = BaseGraphBuilder::new(4).with_turn_costs(true).create().unwrap();
    populate_plain(&mut g);
    assert!(matches!(g.flush(), Err(Error::NotFrozen(_))));
    g.freeze();
    assert!(matches!(g.add_edge(0, 2), Err(Error::Frozen(_))));
    assert!(matches!(g.set_node(3, 1.0, 1.0, 0.0), Err(Error::Frozen(_))));
    assert!(matches!(
        g.set_turn_cost(0, 1, 1, 1.0),
        Err(Error::Frozen(_))
    ));
    // reads still work
    assert_eq!(g.edges(1).count(), 2);
}

fn populate_plain(g: &mut BaseGraph) {
    g.set_node(0, 0.0, 0.0, 0.0).unwrap();
    g.set_node(1, 0.0, 0.01, 0.0).unwrap();
    g.set_node(2, 0.01, 0.01, 0.0).unwrap();
    g.add_edge(0, 1).unwrap();
    g.add_edge(1, 2).unwrap();
}

#[test]
fn test_adjacency_after_many_edges() {
    let mut g = BaseGraphBuilder::new(4).create().unwrap();
    for i in 0..50u32 {
        g.add_edge(i % 7, (i * 3) % 11).unwrap().set_distance(i as f64).unwrap();
    }
    assert_adjacency_consistent(&g);
    let at_zero = g.edges(0).count();
    let expected = (0..50u32)
        .filter(|i| i % 7 == 0 || (i * 3) % 11 == 0)
        .count();
    assert_eq!(at_zero, expected);
}

#[test]
fn test_config_drives_builder() {
    let dir = TempDir::new().unwrap();
    let toml = format!(
        r#"
        location = "{}"
        store = "in_memory_store"
        bytes_for_flags = 8
        with_elevation = true
        with_turn_costs = true
        "#,
        dir.path().display()
    );
    let config = GraphConfig::from_toml_str(&toml).unwrap();
    let mut g = config.graph_builder().unwrap().create().unwrap();
    populate(&mut g);
    g.freeze();
    g.flush().unwrap();

    let mut loaded = builder(&dir, DataAccessKind::InMemoryStore).build().unwrap();
    assert!(loaded.load_existing().unwrap());
    assert_populated(&loaded);
}
