//! Engine configuration constants and runtime settings.
//! Tuning and thresholds in one place.

use std::time::Duration;

use crate::error::GraphError;

// ---- Channels ----

/// Row channel tuning.
pub struct ChannelConsts;

impl ChannelConsts {
    /// Rows buffered per channel before the producer blocks.
    pub const DEFAULT_CAPACITY: usize = 10_000;
    /// How long a blocked `put`/`get` waits before re-checking the stop flag (ms).
    pub const POLL_INTERVAL_MS: u64 = 50;
}

// ---- Progress ----

/// Progress display for the CLI.
pub struct ProgressConsts;

impl ProgressConsts {
    /// How often the progress thread samples run statistics (ms).
    pub const REFRESH_INTERVAL_MS: u64 = 200;
}

// ---- Runtime settings ----

/// Settings applied when a graph is expanded and run.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Capacity of every row channel.
    pub channel_capacity: usize,
    /// Cooperative cancellation check interval for blocked channel operations.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: ChannelConsts::DEFAULT_CAPACITY,
            poll_interval: Duration::from_millis(ChannelConsts::POLL_INTERVAL_MS),
        }
    }
}

impl EngineConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        if self.channel_capacity == 0 {
            return Err(GraphError::ZeroCapacity);
        }
        Ok(())
    }
}
