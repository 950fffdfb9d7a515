//! Per-copy row I/O handed to [`Node::process_batch`](crate::engine::Node::process_batch).
//!
//! Owns the copy's input receivers and output senders. Output rows are routed hop by hop: the
//! node's [`OutputMode`] picks the hop(s), the target node's partitioner picks the copy.

use crossbeam_channel::Select;
use std::sync::Arc;

use crate::error::EngineError;
use crate::graph::OutputMode;
use crate::pipeline::channel::{Received, RowReceiver, RowSender};
use crate::pipeline::context::StopSignal;
use crate::pipeline::error_handler::{ErrorHandling, ErrorRowEncoder};
use crate::pipeline::partition::Partitioner;
use crate::pipeline::stats::CopyStats;
use crate::types::{ErrorRow, Row};

/// All channels from one producer copy to the copies of one target node.
pub struct OutputHop {
    target: String,
    partitioner: Partitioner,
    /// Indexed by target copy.
    senders: Vec<RowSender>,
}

impl OutputHop {
    pub(crate) fn new(target: &str, partitioner: Partitioner, senders: Vec<RowSender>) -> Self {
        Self {
            target: target.to_string(),
            partitioner,
            senders,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn senders(&self) -> &[RowSender] {
        &self.senders
    }

    fn send(&mut self, row: Row, stop: &StopSignal) -> Result<(), EngineError> {
        let idx = self.partitioner.select(&row)?;
        self.senders[idx].put(row, stop)
    }

    fn mark_done(&mut self) {
        for tx in &mut self.senders {
            tx.mark_done();
        }
    }
}

pub struct NodeIo {
    node: String,
    copy: usize,
    inputs: Vec<RowReceiver>,
    outputs: Vec<OutputHop>,
    error_output: Option<OutputHop>,
    output_mode: OutputMode,
    hop_cursor: usize,
    error_handling: ErrorHandling,
    encoder: ErrorRowEncoder,
    stats: Arc<CopyStats>,
    stop: StopSignal,
}

impl NodeIo {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        node: &str,
        copy: usize,
        inputs: Vec<RowReceiver>,
        outputs: Vec<OutputHop>,
        error_output: Option<OutputHop>,
        output_mode: OutputMode,
        error_handling: ErrorHandling,
        stats: Arc<CopyStats>,
        stop: StopSignal,
    ) -> Self {
        Self {
            node: node.to_string(),
            copy,
            inputs,
            outputs,
            error_output,
            output_mode,
            hop_cursor: 0,
            error_handling,
            encoder: ErrorRowEncoder::default(),
            stats,
            stop,
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn copy(&self) -> usize {
        self.copy
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn inputs(&self) -> &[RowReceiver] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputHop] {
        &self.outputs
    }

    pub fn error_output(&self) -> Option<&OutputHop> {
        self.error_output.as_ref()
    }

    pub fn has_error_hop(&self) -> bool {
        self.error_output.is_some()
    }

    /// True once the run is stopping; long-running nodes should return soon.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Next row from any input, or `None` once every input reached end of stream.
    pub fn get(&mut self) -> Result<Option<Row>, EngineError> {
        self.next_row(None)
    }

    /// Next row from the copies of `source_node` only.
    pub fn get_from(&mut self, source_node: &str) -> Result<Option<Row>, EngineError> {
        if !self.inputs.iter().any(|r| r.id().from == source_node) {
            return Err(EngineError::UnknownInput {
                node: self.node.clone(),
                source_node: source_node.to_string(),
            });
        }
        self.next_row(Some(source_node))
    }

    fn next_row(&mut self, from: Option<&str>) -> Result<Option<Row>, EngineError> {
        loop {
            let active: Vec<usize> = self
                .inputs
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.is_done() && from.is_none_or(|f| r.id().from == f))
                .map(|(i, _)| i)
                .collect();
            match active.as_slice() {
                [] => return Ok(None),
                [single] => match self.inputs[*single].get(&self.stop)? {
                    Received::Row(row) => {
                        self.stats.add_read();
                        return Ok(Some(row));
                    }
                    Received::EndOfStream => continue,
                },
                _ => {}
            }

            let picked = {
                let mut sel = Select::new();
                for &i in &active {
                    sel.recv(self.inputs[i].receiver());
                }
                match sel.select_timeout(self.stop.poll_interval()) {
                    Ok(op) => {
                        let i = active[op.index()];
                        Some((i, op.recv(self.inputs[i].receiver())))
                    }
                    Err(_) => None,
                }
            };
            match picked {
                Some((_, Ok(row))) => {
                    self.stats.add_read();
                    return Ok(Some(row));
                }
                Some((i, Err(_))) => {
                    log::debug!("{}.{}: input {} done", self.node, self.copy, self.inputs[i].id());
                    self.inputs[i].set_done();
                }
                None => {
                    if self.stop.is_stopped() {
                        return Err(EngineError::Stopped);
                    }
                }
            }
        }
    }

    /// Route `row` to the output hops. With no output hops the row is only counted.
    pub fn put(&mut self, row: Row) -> Result<(), EngineError> {
        let n = self.outputs.len();
        match n {
            0 => {
                self.stats.add_written();
                Ok(())
            }
            1 => self.send_to_hop(0, row),
            _ => match self.output_mode {
                OutputMode::Distribute => {
                    let i = self.hop_cursor;
                    self.hop_cursor = (i + 1) % n;
                    self.send_to_hop(i, row)
                }
                OutputMode::Copy => {
                    for i in 0..n - 1 {
                        self.send_to_hop(i, row.clone())?;
                    }
                    self.send_to_hop(n - 1, row)
                }
            },
        }
    }

    /// Send `row` down the hop to `target` only.
    pub fn put_to(&mut self, target: &str, row: Row) -> Result<(), EngineError> {
        let i = self
            .outputs
            .iter()
            .position(|h| h.target == target)
            .ok_or_else(|| EngineError::UnknownTarget {
                node: self.node.clone(),
                target: target.to_string(),
            })?;
        self.send_to_hop(i, row)
    }

    /// Send a rejected row down the error hop and enforce the rejection limits.
    pub fn put_error(&mut self, err: ErrorRow) -> Result<(), EngineError> {
        let Some(hop) = self.error_output.as_mut() else {
            return Err(EngineError::NoErrorHop {
                node: self.node.clone(),
                message: err.message,
            });
        };
        let row = self.encoder.encode(&self.node, err)?;
        hop.send(row, &self.stop)?;
        self.stats.add_rejected();
        self.error_handling.check(
            &self.node,
            self.stats.rows_rejected(),
            self.stats.rows_read(),
        )
    }

    fn send_to_hop(&mut self, i: usize, row: Row) -> Result<(), EngineError> {
        self.outputs[i].send(row, &self.stop)?;
        self.stats.add_written();
        Ok(())
    }

    /// Signal end of stream on every output, error hop included.
    pub(crate) fn mark_done(&mut self) {
        for hop in &mut self.outputs {
            hop.mark_done();
        }
        if let Some(hop) = self.error_output.as_mut() {
            hop.mark_done();
        }
    }

    pub(crate) fn is_source(&self) -> bool {
        self.inputs.is_empty()
    }
}
