use anyhow::Result;

use crate::engine::node::{Node, NodeContext, ProcessResult};
use crate::nodes::{NodeConsts, config_u64};
use crate::pipeline::NodeIo;

/// Writes rows to the log at info level, then forwards them.
///
/// Config: `limit` caps how many rows are logged per copy (all rows are still forwarded).
#[derive(Default)]
pub struct LogNode {
    label: String,
    limit: Option<u64>,
    logged: u64,
}

impl Node for LogNode {
    fn init(&mut self, ctx: &NodeContext<'_>) -> Result<()> {
        self.label = format!("{}.{}", ctx.node, ctx.copy);
        self.limit = config_u64(ctx.config, "limit")?;
        Ok(())
    }

    fn process_batch(&mut self, io: &mut NodeIo) -> Result<ProcessResult> {
        for _ in 0..NodeConsts::BATCH_SIZE {
            let Some(row) = io.get()? else {
                return Ok(ProcessResult::Done);
            };
            if self.limit.is_none_or(|n| self.logged < n) {
                log::info!("{}: {}", self.label, row);
                self.logged += 1;
            }
            io.put(row)?;
        }
        Ok(ProcessResult::Continue)
    }

    fn dispose(&mut self) {
        if self.logged > 0 {
            log::debug!("{}: logged {} rows", self.label, self.logged);
        }
    }
}
