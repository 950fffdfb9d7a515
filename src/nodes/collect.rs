use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::node::{Node, NodeContext, ProcessResult};
use crate::engine::registry::NodeRegistry;
use crate::nodes::NodeConsts;
use crate::pipeline::NodeIo;
use crate::types::{ErrorRow, Row};

/// A row plus the copy of the collecting node that received it.
#[derive(Clone, Debug)]
pub struct Collected {
    pub copy: usize,
    pub row: Row,
}

/// Caller-owned store that `collect` nodes append to. Cheap to clone; clones share rows.
#[derive(Clone, Debug, Default)]
pub struct RowCollector {
    rows: Arc<Mutex<Vec<Collected>>>,
}

impl RowCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type `node_type` whose copies append to this collector.
    pub fn register(&self, registry: &mut NodeRegistry, node_type: &str) {
        let collector = self.clone();
        registry.register(node_type, move |_| {
            Ok(Box::new(CollectNode::new(collector.clone())))
        });
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Collected>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rows received so far, in arrival order.
    pub fn rows(&self) -> Vec<Row> {
        self.lock().iter().map(|c| c.row.clone()).collect()
    }

    /// Rows received so far, tagged with the receiving copy.
    pub fn collected(&self) -> Vec<Collected> {
        self.lock().clone()
    }

    /// Received rows that carry error fields, decoded.
    pub fn error_rows(&self) -> Vec<ErrorRow> {
        self.lock()
            .iter()
            .filter_map(|c| ErrorRow::from_row(&c.row))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, copy: usize, row: Row) {
        self.lock().push(Collected { copy, row });
    }
}

/// Sink appending every input row to a [`RowCollector`], then forwarding it.
pub struct CollectNode {
    collector: RowCollector,
    copy: usize,
}

impl CollectNode {
    pub fn new(collector: RowCollector) -> Self {
        Self { collector, copy: 0 }
    }
}

impl Node for CollectNode {
    fn init(&mut self, ctx: &NodeContext<'_>) -> Result<()> {
        self.copy = ctx.copy;
        Ok(())
    }

    fn process_batch(&mut self, io: &mut NodeIo) -> Result<ProcessResult> {
        for _ in 0..NodeConsts::BATCH_SIZE {
            let Some(row) = io.get()? else {
                return Ok(ProcessResult::Done);
            };
            self.collector.push(self.copy, row.clone());
            io.put(row)?;
        }
        Ok(ProcessResult::Continue)
    }
}
