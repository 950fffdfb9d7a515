use anyhow::Result;
use std::sync::Arc;

use crate::engine::node::{Node, NodeContext, ProcessResult};
use crate::nodes::{NodeConsts, config_str, config_u64};
use crate::pipeline::NodeIo;
use crate::types::{FieldType, Row, RowSchema, Value};

/// Source producing `(id, key, text)` rows.
///
/// Config: `rows` (omit for an unbounded stream), `key_modulus` (`key = id % key_modulus`,
/// default: `key = id`), `text` (constant string column, default empty).
pub struct GenerateNode {
    schema: Arc<RowSchema>,
    limit: Option<u64>,
    key_modulus: Option<u64>,
    text: String,
    next_id: u64,
}

impl Default for GenerateNode {
    fn default() -> Self {
        Self {
            schema: GenerateNode::schema(),
            limit: None,
            key_modulus: None,
            text: String::new(),
            next_id: 0,
        }
    }
}

impl GenerateNode {
    pub fn schema() -> Arc<RowSchema> {
        RowSchema::of(&[
            ("id", FieldType::Integer),
            ("key", FieldType::Integer),
            ("text", FieldType::String),
        ])
    }

    fn row(&self, id: u64) -> Result<Row> {
        let key = match self.key_modulus {
            Some(m) if m > 0 => id % m,
            _ => id,
        };
        let row = Row::new(
            Arc::clone(&self.schema),
            vec![
                Value::Integer(id as i64),
                Value::Integer(key as i64),
                Value::String(self.text.clone()),
            ],
        )?;
        Ok(row)
    }
}

impl Node for GenerateNode {
    fn init(&mut self, ctx: &NodeContext<'_>) -> Result<()> {
        self.limit = config_u64(ctx.config, "rows")?;
        self.key_modulus = config_u64(ctx.config, "key_modulus")?;
        self.text = config_str(ctx.config, "text")?.unwrap_or_default().to_string();
        match self.limit {
            Some(n) => log::debug!("{}.{}: generating {} rows", ctx.node, ctx.copy, n),
            None => log::debug!("{}.{}: generating until stopped", ctx.node, ctx.copy),
        }
        Ok(())
    }

    fn process_batch(&mut self, io: &mut NodeIo) -> Result<ProcessResult> {
        for _ in 0..NodeConsts::BATCH_SIZE {
            if self.limit.is_some_and(|n| self.next_id >= n) {
                return Ok(ProcessResult::Done);
            }
            let row = self.row(self.next_id)?;
            io.put(row)?;
            self.next_id += 1;
        }
        Ok(ProcessResult::Continue)
    }
}
