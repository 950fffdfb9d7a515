//! Logical pipeline graph: node and hop definitions, validation, and topological order.
//!
//! ```text
//! [source] ──► [transform ×2, hash(id)] ──► [sink]
//!                      └──(error hop)──► [rejects]
//! ```
//!
//! Error hops are exempt from the cycle check: they carry fail-over rows, not steady-state flow.

pub mod expand;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::engine::registry::{NodeFactory, NodeRegistry};
use crate::error::GraphError;
use crate::pipeline::error_handler::ErrorHandling;
use crate::pipeline::partition::Partitioning;

pub use expand::{ExecutionPlan, NodeCopy};

/// Where rows go when a node has several outgoing (non-error) hops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Round robin: each row goes down exactly one hop.
    #[default]
    Distribute,
    /// Every row goes down every hop.
    Copy,
}

fn default_copies() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// One logical node as defined by the pipeline configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Parallel copies to run.
    #[serde(default = "default_copies")]
    pub copies: usize,
    /// How producers spread rows over this node's copies.
    #[serde(default, rename = "partition")]
    pub partitioning: Partitioning,
    #[serde(default)]
    pub output_mode: OutputMode,
    #[serde(default)]
    pub error_handling: ErrorHandling,
    /// Opaque to the engine; read by the node implementation.
    #[serde(default)]
    pub config: toml::Table,
}

impl NodeSpec {
    pub fn new(name: &str, node_type: &str) -> Self {
        Self {
            name: name.to_string(),
            node_type: node_type.to_string(),
            copies: 1,
            partitioning: Partitioning::default(),
            output_mode: OutputMode::default(),
            error_handling: ErrorHandling::default(),
            config: toml::Table::new(),
        }
    }

    pub fn copies(mut self, copies: usize) -> Self {
        self.copies = copies;
        self
    }

    pub fn partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn error_handling(mut self, handling: ErrorHandling) -> Self {
        self.error_handling = handling;
        self
    }

    pub fn config(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }
}

/// One logical edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopSpec {
    pub from: String,
    pub to: String,
    /// Carries rejected rows of `from` instead of its normal output.
    #[serde(default)]
    pub error: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl HopSpec {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            error: false,
            enabled: true,
        }
    }

    pub fn error(from: &str, to: &str) -> Self {
        Self {
            error: true,
            ..Self::new(from, to)
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Validated node with its resolved factory.
pub(crate) struct GraphNode {
    pub(crate) spec: NodeSpec,
    pub(crate) factory: NodeFactory,
}

/// A validated graph, ready to be expanded into node copies.
pub struct Graph {
    nodes: Vec<GraphNode>,
    hops: Vec<HopSpec>,
    index: HashMap<String, usize>,
    /// Node indices in topological order over normal hops.
    order: Vec<usize>,
}

impl Graph {
    /// Validate `nodes` and `hops` and resolve node types against `registry`.
    /// Disabled hops are dropped.
    pub fn build(
        registry: &NodeRegistry,
        nodes: Vec<NodeSpec>,
        hops: Vec<HopSpec>,
    ) -> Result<Graph, GraphError> {
        let mut index = HashMap::with_capacity(nodes.len());
        let mut resolved = Vec::with_capacity(nodes.len());
        for spec in nodes {
            validate_node(&spec)?;
            if index.contains_key(&spec.name) {
                return Err(GraphError::DuplicateNode(spec.name));
            }
            let factory =
                registry
                    .get(&spec.node_type)
                    .ok_or_else(|| GraphError::UnknownNodeType {
                        node: spec.name.clone(),
                        node_type: spec.node_type.clone(),
                    })?;
            index.insert(spec.name.clone(), resolved.len());
            resolved.push(GraphNode { spec, factory });
        }

        let hops: Vec<HopSpec> = hops.into_iter().filter(|h| h.enabled).collect();
        validate_hops(&index, &hops)?;
        let order = topological_order(&resolved, &index, &hops)?;

        log::debug!(
            "graph: {} nodes, {} hops, order [{}]",
            resolved.len(),
            hops.len(),
            order
                .iter()
                .map(|&i| resolved[i].spec.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Graph {
            nodes: resolved,
            hops,
            index,
            order,
        })
    }

    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.index.get(name).map(|&i| &self.nodes[i].spec)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().map(|n| &n.spec)
    }

    pub fn hops(&self) -> &[HopSpec] {
        &self.hops
    }

    /// Node names with every producer before its consumers (normal hops only).
    pub fn topological_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.nodes[i].spec.name.as_str())
            .collect()
    }

    /// Hops leaving `node`, error hop included.
    pub fn outgoing(&self, node: &str) -> impl Iterator<Item = &HopSpec> {
        self.hops.iter().filter(move |h| h.from == node)
    }

    /// Hops entering `node`, error hops included.
    pub fn incoming(&self, node: &str) -> impl Iterator<Item = &HopSpec> {
        self.hops.iter().filter(move |h| h.to == node)
    }

    pub fn error_hop(&self, node: &str) -> Option<&HopSpec> {
        self.outgoing(node).find(|h| h.error)
    }

    /// Nodes with no incoming hops.
    pub fn sources(&self) -> Vec<&str> {
        self.nodes()
            .filter(|n| self.incoming(&n.name).next().is_none())
            .map(|n| n.name.as_str())
            .collect()
    }

    /// Nodes with no outgoing hops.
    pub fn sinks(&self) -> Vec<&str> {
        self.nodes()
            .filter(|n| self.outgoing(&n.name).next().is_none())
            .map(|n| n.name.as_str())
            .collect()
    }

    pub(crate) fn graph_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().map(|&i| &self.nodes[i])
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("order", &self.topological_order())
            .field("hops", &self.hops)
            .finish()
    }
}

fn validate_node(spec: &NodeSpec) -> Result<(), GraphError> {
    if spec.name.trim().is_empty() {
        return Err(GraphError::EmptyName);
    }
    if spec.copies == 0 {
        return Err(GraphError::ZeroCopies(spec.name.clone()));
    }
    if let Partitioning::Hash { fields } = &spec.partitioning
        && fields.is_empty()
    {
        return Err(GraphError::EmptyPartitionKey(spec.name.clone()));
    }
    Ok(())
}

fn validate_hops(index: &HashMap<String, usize>, hops: &[HopSpec]) -> Result<(), GraphError> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut error_sources: HashSet<&str> = HashSet::new();
    for hop in hops {
        for end in [&hop.from, &hop.to] {
            if !index.contains_key(end) {
                return Err(GraphError::UnknownHopNode {
                    from: hop.from.clone(),
                    to: hop.to.clone(),
                    missing: end.clone(),
                });
            }
        }
        if !seen.insert((hop.from.as_str(), hop.to.as_str())) {
            return Err(GraphError::DuplicateHop {
                from: hop.from.clone(),
                to: hop.to.clone(),
            });
        }
        if hop.error && !error_sources.insert(hop.from.as_str()) {
            return Err(GraphError::MultipleErrorHops(hop.from.clone()));
        }
    }
    Ok(())
}

/// Kahn's algorithm over normal hops. Nodes left over sit on (or behind) a cycle.
fn topological_order(
    nodes: &[GraphNode],
    index: &HashMap<String, usize>,
    hops: &[HopSpec],
) -> Result<Vec<usize>, GraphError> {
    let n = nodes.len();
    let mut in_degree = vec![0usize; n];
    let mut fwd_adj = vec![Vec::new(); n];
    for hop in hops.iter().filter(|h| !h.error) {
        let (from, to) = (index[&hop.from], index[&hop.to]);
        fwd_adj[from].push(to);
        in_degree[to] += 1;
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &next in &fwd_adj[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < n {
        let stuck = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| nodes[i].spec.name.clone())
            .collect();
        return Err(GraphError::Cycle(stuck));
    }
    Ok(order)
}
