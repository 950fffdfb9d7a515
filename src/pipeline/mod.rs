//! Runtime: channels, partitioning, per-copy I/O, workers, and run supervision.

pub mod channel;
pub mod context;
pub mod error_handler;
pub mod io;
pub mod orchestrator;
pub mod partition;
pub mod stats;
mod worker;

pub use channel::{ChannelId, Received, RowReceiver, RowSender, row_channel};
pub use context::StopSignal;
pub use error_handler::{ErrorHandling, ErrorRowEncoder};
pub use io::{NodeIo, OutputHop};
pub use orchestrator::{RunHandle, RunMonitor, RunResult, RunStatus, Supervisor};
pub use partition::{Partitioner, Partitioning, partition_hash};
pub use stats::{CopyState, CopyStats, RunStatistics};
