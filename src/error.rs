//! Error taxonomy: graph validation errors, engine errors raised while rows move, and run-level failures.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Rejected graph definitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node with empty name")]
    EmptyName,

    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("Node {0} must run at least one copy")]
    ZeroCopies(String),

    #[error("Node {node}: unknown node type '{node_type}'")]
    UnknownNodeType { node: String, node_type: String },

    #[error("Hop {from} -> {to} references unknown node {missing}")]
    UnknownHopNode {
        from: String,
        to: String,
        missing: String,
    },

    #[error("Duplicate hop {from} -> {to}")]
    DuplicateHop { from: String, to: String },

    #[error("Node {0} has more than one error hop")]
    MultipleErrorHops(String),

    #[error("Cycle detected in pipeline graph among: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("Node {0}: hash partitioning needs at least one key field")]
    EmptyPartitionKey(String),

    #[error("Channel capacity must be at least 1")]
    ZeroCapacity,
}

/// Errors raised by the engine while a run is in flight.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The run is stopping; not a failure of the caller.
    #[error("Run is stopping")]
    Stopped,

    #[error("Channel {channel}: row schema {got} does not match negotiated schema {expected}")]
    SchemaMismatch {
        channel: String,
        expected: String,
        got: String,
    },

    #[error("Channel {0}: consumer is gone")]
    ConsumerClosed(String),

    #[error("Node {node} has no error hop; row error: {message}")]
    NoErrorHop { node: String, message: String },

    #[error("Partitioning for {node}: {message}")]
    Partition { node: String, message: String },

    #[error("Node {node} has no output hop to {target}")]
    UnknownTarget { node: String, target: String },

    #[error("Node {node} has no input hop from {source_node}")]
    UnknownInput { node: String, source_node: String },

    #[error("Node {node}: too many rejected rows ({detail})")]
    TooManyRejected { node: String, detail: String },

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Failed to spawn worker {0}")]
    Spawn(String),
}

impl EngineError {
    /// True if `err` is (or wraps) [`EngineError::Stopped`].
    pub fn is_stop(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<EngineError>(), Some(EngineError::Stopped))
    }
}

/// Which phase a fatal error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// `init()` failed; the copy never ran.
    Initialization,
    /// `process_batch()` failed or a channel/partition protocol was violated.
    Processing,
    /// Error-hop rejection thresholds were exceeded.
    Rejection,
    /// Node code panicked.
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Initialization => "initialization",
            FailureKind::Processing => "processing",
            FailureKind::Rejection => "rejection",
            FailureKind::Panic => "panic",
        };
        f.write_str(s)
    }
}

/// A run-fatal error reported by one node copy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FatalError {
    pub node: String,
    pub copy: usize,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} ({} error): {}",
            self.node, self.copy, self.kind, self.message
        )
    }
}
