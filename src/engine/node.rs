//! Node abstraction: the contract every pluggable step implements.
//!
//! A node copy is driven through `init` → repeated `process_batch` → `dispose` by its own worker
//! thread. All row movement goes through [`NodeIo`]; a node never touches channels directly.

use anyhow::Result;

use crate::pipeline::NodeIo;
use crate::types::ErrorRow;

/// What a node reports after one batch.
#[derive(Debug)]
pub enum ProcessResult {
    /// Keep going. Rows produced during the batch were already routed.
    Continue,
    /// No more work: all inputs reached end of stream, or the node chose to finish.
    Done,
    /// One row failed. It is routed to the error hop and processing continues;
    /// without an error hop the run fails.
    RowError(ErrorRow),
}

/// Read-only context handed to [`Node::init`].
pub struct NodeContext<'a> {
    /// Logical node name.
    pub node: &'a str,
    /// Index of this copy, `0..copies`.
    pub copy: usize,
    /// Total copies of this node.
    pub copies: usize,
    /// Opaque node configuration from the pipeline definition.
    pub config: &'a toml::Table,
    /// Number of input channels wired to this copy.
    pub input_count: usize,
    /// Whether an error hop is attached.
    pub has_error_hop: bool,
}

/// A pluggable row-processing step.
///
/// `process_batch` returning `Err` is a fatal error for the whole run, except when the error is
/// [`EngineError::Stopped`](crate::error::EngineError::Stopped) surfacing from `NodeIo` during
/// cancellation.
pub trait Node: Send {
    /// Prepare resources. An error here is an initialization failure; the copy never runs.
    fn init(&mut self, _ctx: &NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Process one batch of work: read from `io`, write to `io`.
    fn process_batch(&mut self, io: &mut NodeIo) -> Result<ProcessResult>;

    /// Release resources. Called once for every copy whose `init` succeeded, on every exit path.
    fn dispose(&mut self) {}
}
