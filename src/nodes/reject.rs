use anyhow::{Context, Result};

use crate::engine::node::{Node, NodeContext, ProcessResult};
use crate::nodes::{NodeConsts, config_str};
use crate::pipeline::NodeIo;
use crate::types::{ErrorRow, Value};

/// Forwards rows, except those whose `field` renders as `value`: those become row errors.
///
/// Config: `field` (required), `value` (string, integer, float or boolean), `code`
/// (error code, default `REJECTED`).
#[derive(Default)]
pub struct RejectNode {
    field: String,
    value: String,
    code: String,
}

impl Node for RejectNode {
    fn init(&mut self, ctx: &NodeContext<'_>) -> Result<()> {
        self.field = config_str(ctx.config, "field")?
            .context("reject node needs a 'field' setting")?
            .to_string();
        self.value = match ctx.config.get("value") {
            Some(toml::Value::String(s)) => s.clone(),
            Some(toml::Value::Integer(i)) => i.to_string(),
            Some(toml::Value::Float(f)) => f.to_string(),
            Some(toml::Value::Boolean(b)) => b.to_string(),
            Some(other) => anyhow::bail!("'value' must be a scalar, got {other}"),
            None => anyhow::bail!("reject node needs a 'value' setting"),
        };
        self.code = config_str(ctx.config, "code")?
            .unwrap_or("REJECTED")
            .to_string();
        if !ctx.has_error_hop {
            log::warn!(
                "{}.{}: no error hop, a rejected row will fail the run",
                ctx.node,
                ctx.copy
            );
        }
        Ok(())
    }

    fn process_batch(&mut self, io: &mut NodeIo) -> Result<ProcessResult> {
        for _ in 0..NodeConsts::BATCH_SIZE {
            let Some(row) = io.get()? else {
                return Ok(ProcessResult::Done);
            };
            let matches = match row.get_by_name(&self.field) {
                Some(Value::Null) | None => false,
                Some(v) => v.to_string() == self.value,
            };
            if matches {
                let message = format!("{} = {}", self.field, self.value);
                let err = ErrorRow::new(row, self.code.as_str(), message).with_field(&self.field);
                return Ok(ProcessResult::RowError(err));
            }
            io.put(row)?;
        }
        Ok(ProcessResult::Continue)
    }
}
