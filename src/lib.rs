//! Hopflow: concurrent row-streaming pipeline engine.
//!
//! A pipeline is a graph of nodes joined by hops. Each node runs as one or more parallel copies,
//! each on its own thread; copies exchange rows over bounded channels, so a slow consumer
//! throttles its producers. Rows are spread over a node's copies by its partitioning scheme,
//! rows that fail inside a node can be diverted to an error hop, and a single fatal error stops
//! the whole run.
//!
//! ```ignore
//! let registry = hopflow::NodeRegistry::with_builtins();
//! let graph = hopflow::Graph::build(&registry, nodes, hops)?;
//! let plan = graph.expand(&hopflow::EngineConfig::default())?;
//! let result = hopflow::Supervisor::start(plan)?.await_completion(None);
//! assert_eq!(result.status, hopflow::RunStatus::Completed);
//! ```

pub mod engine;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use engine::{Node, NodeContext, NodeRegistry, ProcessResult};
pub use error::{EngineError, FailureKind, FatalError, GraphError};
pub use graph::{ExecutionPlan, Graph, HopSpec, NodeCopy, NodeSpec, OutputMode};
pub use pipeline::{
    ErrorHandling, NodeIo, Partitioning, RunHandle, RunMonitor, RunResult, RunStatistics,
    RunStatus, Supervisor,
};
pub use utils::config::EngineConfig;

use std::time::Duration;

/// Result alias used by public hopflow API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Build, expand and run a pipeline, blocking until it finishes.
///
/// `timeout` cancels the run once it elapses; the result is then `Cancelled` unless a fatal error
/// happened first.
pub fn run_pipeline(
    registry: &NodeRegistry,
    nodes: Vec<NodeSpec>,
    hops: Vec<HopSpec>,
    config: &EngineConfig,
    timeout: Option<Duration>,
) -> Result<RunResult> {
    let graph = Graph::build(registry, nodes, hops)?;
    let plan = graph.expand(config)?;
    log::debug!("{}", plan.describe());
    let handle = Supervisor::start(plan)?;
    Ok(handle.await_completion(timeout))
}
