#![allow(dead_code)]

use anyhow::{Result, bail};
use hopflow::nodes::NodeConsts;
use hopflow::{
    EngineConfig, FieldType, Node, NodeContext, NodeIo, NodeRegistry, ProcessResult, Row,
    RowSchema, Value,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Small channels and a short poll interval keep tests fast and exercise backpressure.
pub fn test_config(capacity: usize) -> EngineConfig {
    EngineConfig::default()
        .with_capacity(capacity)
        .with_poll_interval(Duration::from_millis(5))
}

pub fn keyed_schema() -> Arc<RowSchema> {
    RowSchema::of(&[("key", FieldType::Integer), ("text", FieldType::String)])
}

pub fn keyed_row(schema: &Arc<RowSchema>, key: i64, text: &str) -> Row {
    Row::new(
        Arc::clone(schema),
        vec![Value::Integer(key), Value::String(text.to_string())],
    )
    .unwrap()
}

/// Rows with keys `0..n` and text `row-<key>`.
pub fn keyed_rows(n: i64) -> Vec<Row> {
    let schema = keyed_schema();
    (0..n)
        .map(|k| keyed_row(&schema, k, &format!("row-{k}")))
        .collect()
}

pub fn key_of(row: &Row) -> i64 {
    row.get_by_name("key").and_then(Value::as_i64).unwrap()
}

// --- test nodes ---

/// Source emitting a fixed list of rows, a few per batch.
pub struct ListSource {
    rows: VecDeque<Row>,
}

impl Node for ListSource {
    fn process_batch(&mut self, io: &mut NodeIo) -> Result<ProcessResult> {
        for _ in 0..7 {
            match self.rows.pop_front() {
                Some(row) => io.put(row)?,
                None => return Ok(ProcessResult::Done),
            }
        }
        Ok(ProcessResult::Continue)
    }
}

pub fn register_list_source(registry: &mut NodeRegistry, node_type: &str, rows: Vec<Row>) {
    registry.register(node_type, move |_| {
        Ok(Box::new(ListSource {
            rows: rows.clone().into(),
        }))
    });
}

/// Transform that fails the run when it sees a row whose `text` is `bad`.
pub struct FailOnBad;

impl Node for FailOnBad {
    fn process_batch(&mut self, io: &mut NodeIo) -> Result<ProcessResult> {
        let Some(row) = io.get()? else {
            return Ok(ProcessResult::Done);
        };
        if row.get_by_name("text").and_then(Value::as_str) == Some("bad") {
            bail!("cannot process row {row}");
        }
        io.put(row)?;
        Ok(ProcessResult::Continue)
    }
}

/// Node whose init always fails.
pub struct InitFails;

impl Node for InitFails {
    fn init(&mut self, ctx: &NodeContext<'_>) -> Result<()> {
        bail!("{} cannot connect", ctx.node)
    }

    fn process_batch(&mut self, _io: &mut NodeIo) -> Result<ProcessResult> {
        Ok(ProcessResult::Done)
    }
}

/// Node that panics on its first row.
pub struct Panics;

impl Node for Panics {
    fn process_batch(&mut self, io: &mut NodeIo) -> Result<ProcessResult> {
        if io.get()?.is_some() {
            panic!("boom");
        }
        Ok(ProcessResult::Done)
    }
}

/// Sends even keys to `even`, odd keys to `odd`.
pub struct ParityRouter;

impl Node for ParityRouter {
    fn process_batch(&mut self, io: &mut NodeIo) -> Result<ProcessResult> {
        for _ in 0..NodeConsts::BATCH_SIZE {
            let Some(row) = io.get()? else {
                return Ok(ProcessResult::Done);
            };
            let target = if key_of(&row) % 2 == 0 { "even" } else { "odd" };
            io.put_to(target, row)?;
        }
        Ok(ProcessResult::Continue)
    }
}

/// Counts init/dispose calls across all copies of the nodes it wraps.
#[derive(Debug, Default)]
pub struct Lifecycle {
    pub inits: AtomicUsize,
    pub disposes: AtomicUsize,
}

impl Lifecycle {
    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn disposes(&self) -> usize {
        self.disposes.load(Ordering::SeqCst)
    }
}

pub struct Tracked {
    inner: Box<dyn Node>,
    lifecycle: Arc<Lifecycle>,
}

impl Node for Tracked {
    fn init(&mut self, ctx: &NodeContext<'_>) -> Result<()> {
        self.inner.init(ctx)?;
        self.lifecycle.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn process_batch(&mut self, io: &mut NodeIo) -> Result<ProcessResult> {
        self.inner.process_batch(io)
    }

    fn dispose(&mut self) {
        self.lifecycle.disposes.fetch_add(1, Ordering::SeqCst);
        self.inner.dispose();
    }
}

/// Register `node_type` as a tracked wrapper around the registry's existing `inner_type`.
pub fn register_tracked(
    registry: &mut NodeRegistry,
    node_type: &str,
    inner_type: &str,
    lifecycle: &Arc<Lifecycle>,
) {
    let inner = registry.get(inner_type).unwrap();
    let lifecycle = Arc::clone(lifecycle);
    registry.register(node_type, move |spec| {
        Ok(Box::new(Tracked {
            inner: inner(spec)?,
            lifecycle: Arc::clone(&lifecycle),
        }))
    });
}

/// Built-ins plus the failure-injecting test nodes.
pub fn test_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::with_builtins();
    registry
        .register("fail_on_bad", |_| Ok(Box::new(FailOnBad)))
        .register("init_fails", |_| Ok(Box::new(InitFails)))
        .register("panics", |_| Ok(Box::new(Panics)))
        .register("parity_router", |_| Ok(Box::new(ParityRouter)));
    registry
}
