//! Engine module: node contract, node registry, and the CLI around them.

pub mod arg_parser;
pub mod cli;
pub mod node;
pub mod progress;
pub mod registry;

pub use arg_parser::{Cli, Commands, CommonArgs, RunArgs};
pub use cli::{handle_cli, handle_nodes, handle_run, handle_validate, start_interruptible};
pub use node::{Node, NodeContext, ProcessResult};
pub use registry::{NodeFactory, NodeRegistry};
