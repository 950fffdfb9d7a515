//! Graph expansion: one [`NodeCopy`] per copy of each node, one row channel per
//! (producer copy, consumer copy) pair of every hop.
//!
//! Hop `A (Na copies) -> B (Nb copies)` becomes `Na * Nb` channels, so every copy of A can reach
//! every copy of B. Each copy of A gets its own partitioner for the hop, built from B's
//! partitioning scheme.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::node::Node;
use crate::graph::Graph;
use crate::pipeline::channel::{ChannelId, RowReceiver, row_channel};
use crate::pipeline::context::StopSignal;
use crate::pipeline::io::{NodeIo, OutputHop};
use crate::pipeline::partition::Partitioner;
use crate::pipeline::stats::CopyStats;
use crate::utils::config::EngineConfig;

/// One runtime instance of a node, with exactly the channels assigned to it.
pub struct NodeCopy {
    pub(crate) node: String,
    pub(crate) index: usize,
    pub(crate) copies: usize,
    pub(crate) config: toml::Table,
    pub(crate) implementation: Box<dyn Node>,
    pub(crate) io: NodeIo,
    pub(crate) stats: Arc<CopyStats>,
}

impl NodeCopy {
    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn io(&self) -> &NodeIo {
        &self.io
    }

    pub fn label(&self) -> String {
        format!("{}.{}", self.node, self.index)
    }
}

/// Concrete copies and channels for one run.
pub struct ExecutionPlan {
    pub(crate) copies: Vec<NodeCopy>,
    pub(crate) channels: Vec<ChannelId>,
    pub(crate) stop: StopSignal,
    pub(crate) channel_capacity: usize,
}

impl ExecutionPlan {
    pub fn copies(&self) -> &[NodeCopy] {
        &self.copies
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Copies of `node`, in index order.
    pub fn copies_of<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a NodeCopy> {
        self.copies.iter().filter(move |c| c.node == node)
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    /// Human-readable wiring, one channel per line.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "{} copies, {} channels (capacity {})",
            self.copies.len(),
            self.channels.len(),
            self.channel_capacity
        );
        for id in &self.channels {
            out.push_str("\n  ");
            out.push_str(&id.to_string());
        }
        out
    }
}

#[derive(Default)]
struct CopyWiring {
    inputs: Vec<RowReceiver>,
    outputs: Vec<OutputHop>,
    error_output: Option<OutputHop>,
}

impl Graph {
    /// Expand into node copies and wired channels. Instantiates every copy through its factory.
    pub fn expand(&self, config: &EngineConfig) -> Result<ExecutionPlan> {
        config.validate()?;
        let stop = StopSignal::new(config.poll_interval);

        let mut wiring: HashMap<&str, Vec<CopyWiring>> = self
            .nodes()
            .map(|n| {
                (
                    n.name.as_str(),
                    (0..n.copies).map(|_| CopyWiring::default()).collect(),
                )
            })
            .collect();
        let mut channels = Vec::new();

        for hop in self.hops() {
            let source = self
                .node(&hop.from)
                .with_context(|| format!("hop source {} vanished", hop.from))?;
            let target = self
                .node(&hop.to)
                .with_context(|| format!("hop target {} vanished", hop.to))?;

            for a in 0..source.copies {
                let mut senders = Vec::with_capacity(target.copies);
                for b in 0..target.copies {
                    let id = ChannelId {
                        from: source.name.clone(),
                        from_copy: a,
                        to: target.name.clone(),
                        to_copy: b,
                    };
                    channels.push(id.clone());
                    let (tx, rx) = row_channel(id, config.channel_capacity);
                    if let Some(w) = wiring.get_mut(target.name.as_str()) {
                        w[b].inputs.push(rx);
                    }
                    senders.push(tx);
                }
                let partitioner =
                    Partitioner::new(&target.name, target.partitioning.clone(), target.copies);
                let out = OutputHop::new(&target.name, partitioner, senders);
                if let Some(w) = wiring.get_mut(source.name.as_str()) {
                    if hop.error {
                        w[a].error_output = Some(out);
                    } else {
                        w[a].outputs.push(out);
                    }
                }
            }
        }

        let mut copies = Vec::new();
        for graph_node in self.graph_nodes() {
            let spec = &graph_node.spec;
            let terminal = !self.outgoing(&spec.name).any(|h| !h.error);
            let per_copy = wiring.remove(spec.name.as_str()).unwrap_or_default();
            for (index, w) in per_copy.into_iter().enumerate() {
                let implementation = (graph_node.factory)(spec).with_context(|| {
                    format!(
                        "create {}.{} (type {})",
                        spec.name, index, spec.node_type
                    )
                })?;
                let stats = Arc::new(CopyStats::new(&spec.name, index, terminal));
                let io = NodeIo::new(
                    &spec.name,
                    index,
                    w.inputs,
                    w.outputs,
                    w.error_output,
                    spec.output_mode,
                    spec.error_handling.clone(),
                    Arc::clone(&stats),
                    stop.clone(),
                );
                copies.push(NodeCopy {
                    node: spec.name.clone(),
                    index,
                    copies: spec.copies,
                    config: spec.config.clone(),
                    implementation,
                    io,
                    stats,
                });
            }
        }

        log::debug!(
            "expanded {} copies over {} channels",
            copies.len(),
            channels.len()
        );

        Ok(ExecutionPlan {
            copies,
            channels,
            stop,
            channel_capacity: config.channel_capacity,
        })
    }
}
