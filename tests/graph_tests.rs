mod common;

use common::test_config;
use hopflow::{EngineConfig, Graph, GraphError, HopSpec, NodeRegistry, NodeSpec, Partitioning};

fn registry() -> NodeRegistry {
    NodeRegistry::with_builtins()
}

fn chain() -> (Vec<NodeSpec>, Vec<HopSpec>) {
    (
        vec![
            NodeSpec::new("sink", "log"),
            NodeSpec::new("source", "generate"),
            NodeSpec::new("transform", "passthrough"),
        ],
        vec![
            HopSpec::new("transform", "sink"),
            HopSpec::new("source", "transform"),
        ],
    )
}

fn build_err(nodes: Vec<NodeSpec>, hops: Vec<HopSpec>) -> GraphError {
    match Graph::build(&registry(), nodes, hops) {
        Ok(_) => panic!("graph should have been rejected"),
        Err(e) => e,
    }
}

// --- build ---

#[test]
fn test_topological_order_puts_producers_first() {
    let (nodes, hops) = chain();
    let graph = Graph::build(&registry(), nodes, hops).unwrap();
    assert_eq!(graph.topological_order(), vec!["source", "transform", "sink"]);
    assert_eq!(graph.sources(), vec!["source"]);
    assert_eq!(graph.sinks(), vec!["sink"]);
}

#[test]
fn test_cycle_rejected() {
    let nodes = vec![
        NodeSpec::new("a", "passthrough"),
        NodeSpec::new("b", "passthrough"),
        NodeSpec::new("c", "passthrough"),
    ];
    let hops = vec![
        HopSpec::new("a", "b"),
        HopSpec::new("b", "c"),
        HopSpec::new("c", "a"),
    ];
    match build_err(nodes, hops) {
        GraphError::Cycle(names) => assert_eq!(names.len(), 3),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_error_hop_back_edge_is_not_a_cycle() {
    let nodes = vec![
        NodeSpec::new("a", "passthrough"),
        NodeSpec::new("b", "reject"),
    ];
    let hops = vec![HopSpec::new("a", "b"), HopSpec::error("b", "a")];
    let graph = Graph::build(&registry(), nodes, hops).unwrap();
    assert_eq!(graph.error_hop("b").map(|h| h.to.as_str()), Some("a"));
    assert!(graph.error_hop("a").is_none());
}

#[test]
fn test_disabled_hop_is_ignored() {
    let nodes = vec![
        NodeSpec::new("a", "passthrough"),
        NodeSpec::new("b", "passthrough"),
    ];
    let hops = vec![HopSpec::new("a", "b"), HopSpec::new("b", "a").disabled()];
    let graph = Graph::build(&registry(), nodes, hops).unwrap();
    assert_eq!(graph.hops().len(), 1);
}

#[test]
fn test_unknown_hop_node() {
    let err = build_err(
        vec![NodeSpec::new("a", "generate")],
        vec![HopSpec::new("a", "ghost")],
    );
    assert_eq!(
        err,
        GraphError::UnknownHopNode {
            from: "a".to_string(),
            to: "ghost".to_string(),
            missing: "ghost".to_string(),
        }
    );
}

#[test]
fn test_multiple_error_hops() {
    let nodes = vec![
        NodeSpec::new("a", "reject"),
        NodeSpec::new("e1", "log"),
        NodeSpec::new("e2", "log"),
    ];
    let hops = vec![HopSpec::error("a", "e1"), HopSpec::error("a", "e2")];
    assert_eq!(
        build_err(nodes, hops),
        GraphError::MultipleErrorHops("a".to_string())
    );
}

#[test]
fn test_duplicate_hop() {
    let nodes = vec![NodeSpec::new("a", "generate"), NodeSpec::new("b", "log")];
    let hops = vec![HopSpec::new("a", "b"), HopSpec::new("a", "b")];
    assert!(matches!(
        build_err(nodes, hops),
        GraphError::DuplicateHop { .. }
    ));
}

#[test]
fn test_node_validation() {
    let dup = vec![NodeSpec::new("a", "log"), NodeSpec::new("a", "log")];
    assert_eq!(
        build_err(dup, vec![]),
        GraphError::DuplicateNode("a".to_string())
    );

    let zero = vec![NodeSpec::new("a", "log").copies(0)];
    assert_eq!(
        build_err(zero, vec![]),
        GraphError::ZeroCopies("a".to_string())
    );

    let unnamed = vec![NodeSpec::new(" ", "log")];
    assert_eq!(build_err(unnamed, vec![]), GraphError::EmptyName);

    let unknown = vec![NodeSpec::new("a", "spreadsheet")];
    assert!(matches!(
        build_err(unknown, vec![]),
        GraphError::UnknownNodeType { .. }
    ));

    let no_key = vec![NodeSpec::new("a", "log").partitioning(Partitioning::Hash { fields: vec![] })];
    assert_eq!(
        build_err(no_key, vec![]),
        GraphError::EmptyPartitionKey("a".to_string())
    );
}

#[test]
fn test_cycle_message_names_nodes() {
    let nodes = vec![
        NodeSpec::new("x", "passthrough"),
        NodeSpec::new("y", "passthrough"),
    ];
    let hops = vec![HopSpec::new("x", "y"), HopSpec::new("y", "x")];
    let msg = build_err(nodes, hops).to_string();
    assert!(msg.contains("Cycle"));
    assert!(msg.contains("x") && msg.contains("y"));
}

// --- expand ---

#[test]
fn test_expand_full_mesh_wiring() {
    let nodes = vec![
        NodeSpec::new("source", "generate"),
        NodeSpec::new("transform", "passthrough")
            .copies(2)
            .partitioning(Partitioning::hash(["key"])),
        NodeSpec::new("sink", "log").copies(3),
    ];
    let hops = vec![
        HopSpec::new("source", "transform"),
        HopSpec::new("transform", "sink"),
    ];
    let graph = Graph::build(&registry(), nodes, hops).unwrap();
    let plan = graph.expand(&test_config(16)).unwrap();

    assert_eq!(plan.len(), 6);
    assert_eq!(plan.channels().len(), 2 + 2 * 3);
    assert_eq!(plan.channel_capacity(), 16);

    for copy in plan.copies_of("transform") {
        assert_eq!(copy.io().input_count(), 1);
        assert_eq!(copy.io().outputs()[0].senders().len(), 3);
    }
    for copy in plan.copies_of("sink") {
        assert_eq!(copy.io().input_count(), 2);
        assert!(copy.io().outputs().is_empty());
    }
    let source = plan.copies_of("source").next().unwrap();
    assert_eq!(source.io().outputs()[0].target(), "transform");
    assert!(plan.describe().contains("source.0 -> transform.1"));
}

#[test]
fn test_expand_wires_error_hop_separately() {
    let nodes = vec![
        NodeSpec::new("source", "generate"),
        NodeSpec::new("filter", "reject").copies(2),
        NodeSpec::new("ok", "log"),
        NodeSpec::new("rejects", "log"),
    ];
    let hops = vec![
        HopSpec::new("source", "filter"),
        HopSpec::new("filter", "ok"),
        HopSpec::error("filter", "rejects"),
    ];
    let graph = Graph::build(&registry(), nodes, hops).unwrap();
    let plan = graph.expand(&EngineConfig::default()).unwrap();
    for copy in plan.copies_of("filter") {
        assert!(copy.io().has_error_hop());
        assert_eq!(copy.io().outputs().len(), 1);
        assert_eq!(copy.io().error_output().unwrap().target(), "rejects");
    }
    assert_eq!(plan.copies_of("rejects").next().unwrap().io().input_count(), 2);
}

#[test]
fn test_expand_rejects_zero_capacity() {
    let (nodes, hops) = chain();
    let graph = Graph::build(&registry(), nodes, hops).unwrap();
    let err = match graph.expand(&EngineConfig::default().with_capacity(0)) {
        Ok(_) => panic!("zero capacity accepted"),
        Err(e) => e,
    };
    assert_eq!(
        err.downcast_ref::<GraphError>(),
        Some(&GraphError::ZeroCapacity)
    );
}
