mod common;

use common::{Lifecycle, register_tracked, test_config, test_registry};
use hopflow::engine::start_interruptible;
use hopflow::{Graph, HopSpec, NodeSpec};
use std::sync::Arc;

// --- interrupt handler ---

#[test]
fn test_handler_failure_drains_started_run() {
    // Only one Ctrl+C handler may exist per process; take the slot first.
    ctrlc::set_handler(|| {}).unwrap();

    let mut registry = test_registry();
    let lifecycle = Arc::new(Lifecycle::default());
    register_tracked(&mut registry, "tracked_generate", "generate", &lifecycle);
    register_tracked(&mut registry, "tracked_passthrough", "passthrough", &lifecycle);
    let nodes = vec![
        NodeSpec::new("source", "tracked_generate"),
        NodeSpec::new("sink", "tracked_passthrough").copies(2),
    ];
    let graph = Graph::build(&registry, nodes, vec![HopSpec::new("source", "sink")]).unwrap();

    let err = start_interruptible(graph.expand(&test_config(16)).unwrap())
        .err()
        .unwrap();
    assert!(format!("{err:#}").contains("Ctrl+C"));
    assert_eq!(lifecycle.inits(), 3);
    assert_eq!(lifecycle.disposes(), 3);
}
