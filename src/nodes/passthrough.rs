use anyhow::Result;

use crate::engine::node::{Node, ProcessResult};
use crate::nodes::NodeConsts;
use crate::pipeline::NodeIo;

/// Forwards every input row unchanged.
pub struct PassthroughNode;

impl Node for PassthroughNode {
    fn process_batch(&mut self, io: &mut NodeIo) -> Result<ProcessResult> {
        for _ in 0..NodeConsts::BATCH_SIZE {
            match io.get()? {
                Some(row) => io.put(row)?,
                None => return Ok(ProcessResult::Done),
            }
        }
        Ok(ProcessResult::Continue)
    }
}
