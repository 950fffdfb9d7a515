//! Node type registry: maps a type identifier to a factory.
//!
//! Owned by the caller and passed into [`Graph::build`](crate::graph::Graph::build); there is no
//! process-wide registry.

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::node::Node;
use crate::graph::NodeSpec;
use crate::nodes;

/// Creates one node instance per copy from its spec.
pub type NodeFactory = Arc<dyn Fn(&NodeSpec) -> Result<Box<dyn Node>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: BTreeMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in node types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        nodes::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) a node type.
    pub fn register<F>(&mut self, node_type: &str, factory: F) -> &mut Self
    where
        F: Fn(&NodeSpec) -> Result<Box<dyn Node>> + Send + Sync + 'static,
    {
        self.factories
            .insert(node_type.to_string(), Arc::new(factory));
        self
    }

    pub fn get(&self, node_type: &str) -> Option<NodeFactory> {
        self.factories.get(node_type).cloned()
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Registered type identifiers, sorted.
    pub fn types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.types())
            .finish()
    }
}
