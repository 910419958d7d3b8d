#![allow(dead_code)]

use roadgraph::{BaseGraph, BaseGraphBuilder, EdgeState, GraphView, NodeId, PointList};

#[ctor::ctor]
fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two nodes on the equator joined by one 1000 m edge
pub fn straight_road() -> BaseGraph {
    let mut g = BaseGraphBuilder::new(4).create().unwrap();
    g.set_node(0, 0.0, 0.0, 0.0).unwrap();
    g.set_node(1, 0.0, 0.009, 0.0).unwrap();
    g.add_edge(0, 1).unwrap().set_distance(1000.0).unwrap();
    g.freeze();
    g
}

/// ```text
///   0 --e0-- 1 --e1-- 2 --e2-- 3
///                     |
///                     e3
///                     |
///                     4
/// ```
pub fn junction(with_turn_costs: bool) -> BaseGraph {
    let mut g = BaseGraphBuilder::new(4)
        .with_turn_costs(with_turn_costs)
        .create()
        .unwrap();
    let coords = [(0.0, 0.0), (0.0, 0.01), (0.0, 0.02), (0.0, 0.03), (-0.01, 0.02)];
    for (node, (lat, lon)) in coords.into_iter().enumerate() {
        g.set_node(node as NodeId, lat, lon, 0.0).unwrap();
    }
    for (a, b) in [(0, 1), (1, 2), (2, 3), (2, 4)] {
        g.add_edge(a, b).unwrap().set_distance(1100.0).unwrap();
    }
    g
}

/// Node 0 at (0,0) to node 1 at (0,0.004) with pillars every 0.001 degrees
pub fn curved_road() -> BaseGraph {
    let mut g = BaseGraphBuilder::new(4).create().unwrap();
    g.set_node(0, 0.0, 0.0, 0.0).unwrap();
    g.set_node(1, 0.0, 0.004, 0.0).unwrap();
    g.add_edge(0, 1)
        .unwrap()
        .set_distance(445.0)
        .unwrap()
        .set_way_geometry(&PointList::from_coords(&[
            (0.0005, 0.001),
            (0.0005, 0.002),
            (0.0005, 0.003),
        ]))
        .unwrap();
    g.freeze();
    g
}

/// Each edge must be listed exactly once at each endpoint, oriented away from the node.
/// A self-loop has a single endpoint and is listed there once.
pub fn assert_adjacency_consistent<G: GraphView>(graph: &G) {
    for node in 0..graph.node_count() {
        for edge in graph.edges(node) {
            assert_eq!(edge.base_node(), node, "edge {} at node {node}", edge.edge());
            let here = graph
                .edges(node)
                .filter(|e| e.edge() == edge.edge())
                .count();
            assert_eq!(here, 1, "edge {} listed {here} times at node {node}", edge.edge());
            let back = graph
                .edges(edge.adj_node())
                .filter(|e| e.edge() == edge.edge())
                .count();
            assert_eq!(
                back,
                1,
                "edge {} listed {back} times at node {}",
                edge.edge(),
                edge.adj_node()
            );
        }
    }
}
