//! Built-in node types.
//!
//! | type          | role                                                         |
//! |---------------|--------------------------------------------------------------|
//! | `generate`    | source: `id`, `key`, `text` rows, bounded or unbounded       |
//! | `passthrough` | forwards every input row                                     |
//! | `reject`      | forwards rows, rejects those where `field == value`          |
//! | `log`         | writes each row to the log and forwards it                   |
//! | `collect`     | library only: gathers rows into a shared [`RowCollector`]    |

pub mod collect;
pub mod generate;
pub mod log_sink;
pub mod passthrough;
pub mod reject;

use anyhow::{Result, bail};

use crate::engine::registry::NodeRegistry;

pub use collect::{CollectNode, RowCollector};
pub use generate::GenerateNode;
pub use log_sink::LogNode;
pub use passthrough::PassthroughNode;
pub use reject::RejectNode;

/// Rows a built-in transform moves per `process_batch` call.
pub struct NodeConsts;

impl NodeConsts {
    pub const BATCH_SIZE: usize = 256;
}

/// Register every built-in type except `collect`, which needs a caller-owned collector.
pub fn register_builtins(registry: &mut NodeRegistry) {
    registry
        .register("generate", |_| Ok(Box::new(GenerateNode::default())))
        .register("passthrough", |_| Ok(Box::new(PassthroughNode)))
        .register("reject", |_| Ok(Box::new(RejectNode::default())))
        .register("log", |_| Ok(Box::new(LogNode::default())));
}

/// Optional non-negative integer setting.
pub(crate) fn config_u64(config: &toml::Table, key: &str) -> Result<Option<u64>> {
    match config.get(key) {
        None => Ok(None),
        Some(toml::Value::Integer(v)) if *v >= 0 => Ok(Some(*v as u64)),
        Some(other) => bail!("'{key}' must be a non-negative integer, got {other}"),
    }
}

/// Optional string setting.
pub(crate) fn config_str<'a>(config: &'a toml::Table, key: &str) -> Result<Option<&'a str>> {
    match config.get(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => bail!("'{key}' must be a string, got {other}"),
    }
}
