//! Pipeline definition files (TOML).
//!
//! ```toml
//! [settings]
//! channel_capacity = 1000
//! timeout_secs = 30
//!
//! [[node]]
//! name = "source"
//! type = "generate"
//! [node.config]
//! rows = 100
//!
//! [[node]]
//! name = "transform"
//! type = "passthrough"
//! copies = 2
//! partition = { method = "hash", fields = ["key"] }
//!
//! [[hop]]
//! from = "source"
//! to = "transform"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::engine::registry::NodeRegistry;
use crate::error::GraphError;
use crate::graph::{Graph, HopSpec, NodeSpec};
use crate::utils::config::EngineConfig;

/// Parsed pipeline file.
#[derive(Debug, Default, Deserialize)]
pub struct PipelineFile {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeSpec>,
    #[serde(default, rename = "hop")]
    pub hops: Vec<HopSpec>,
}

/// `[settings]`: every key optional, missing keys keep engine defaults.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Settings {
    pub channel_capacity: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
}

/// Overwrite a config field from the file when present.
macro_rules! apply_file_opt {
    ($settings:expr, $config:expr, $file_field:ident => $config_field:ident) => {
        if let Some(v) = $settings.$file_field {
            $config.$config_field = v;
        }
    };
}

impl Settings {
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        apply_file_opt!(self, config, channel_capacity => channel_capacity);
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms.max(1));
        }
        config
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl PipelineFile {
    /// Validate the nodes and hops against `registry`.
    pub fn graph(&self, registry: &NodeRegistry) -> Result<Graph, GraphError> {
        Graph::build(registry, self.nodes.clone(), self.hops.clone())
    }
}

/// Parse a pipeline definition from TOML text.
pub fn parse_pipeline(text: &str) -> Result<PipelineFile> {
    toml::from_str(text).context("parse pipeline definition")
}

/// Read and parse the pipeline file at `path`.
pub fn load_pipeline(path: &Path) -> Result<PipelineFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read pipeline file {}", path.display()))?;
    let file = parse_pipeline(&text).with_context(|| path.display().to_string())?;
    log::debug!(
        "{}: {} nodes, {} hops",
        path.display(),
        file.nodes.len(),
        file.hops.len()
    );
    Ok(file)
}
