//! Per-copy run statistics.
//!
//! Each counter has exactly one writer, the copy's own worker thread. Readers (the supervisor,
//! progress displays) take relaxed snapshots at any time without locking.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Lifecycle of a node copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyState {
    Created,
    Initialized,
    Running,
    /// Finished normally; marking outputs done and disposing.
    Finishing,
    /// Stopped by failure or cancellation; marking outputs done and disposing.
    Stopping,
    Disposed,
}

impl CopyState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => CopyState::Created,
            1 => CopyState::Initialized,
            2 => CopyState::Running,
            3 => CopyState::Finishing,
            4 => CopyState::Stopping,
            _ => CopyState::Disposed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            CopyState::Created => 0,
            CopyState::Initialized => 1,
            CopyState::Running => 2,
            CopyState::Finishing => 3,
            CopyState::Stopping => 4,
            CopyState::Disposed => 5,
        }
    }
}

impl fmt::Display for CopyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CopyState::Created => "created",
            CopyState::Initialized => "initialized",
            CopyState::Running => "running",
            CopyState::Finishing => "finishing",
            CopyState::Stopping => "stopping",
            CopyState::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

/// Live counters for one copy.
#[derive(Debug)]
pub struct CopyStats {
    node: String,
    copy: usize,
    /// Whether the node has no output hops (a terminal node).
    terminal: bool,
    state: AtomicU8,
    rows_read: AtomicU64,
    rows_written: AtomicU64,
    rows_rejected: AtomicU64,
    errors: AtomicU64,
    /// Microseconds since the Unix epoch; 0 = not yet.
    started_us: AtomicU64,
    finished_us: AtomicU64,
}

impl CopyStats {
    pub fn new(node: &str, copy: usize, terminal: bool) -> Self {
        Self {
            node: node.to_string(),
            copy,
            terminal,
            state: AtomicU8::new(CopyState::Created.as_u8()),
            rows_read: AtomicU64::new(0),
            rows_written: AtomicU64::new(0),
            rows_rejected: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started_us: AtomicU64::new(0),
            finished_us: AtomicU64::new(0),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn copy(&self) -> usize {
        self.copy
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn state(&self) -> CopyState {
        CopyState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read.load(Ordering::Relaxed)
    }

    pub fn rows_rejected(&self) -> u64 {
        self.rows_rejected.load(Ordering::Relaxed)
    }

    // Writer side: only the owning worker calls these.

    pub(crate) fn set_state(&self, state: CopyState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn add_read(&self) {
        self.rows_read.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_written(&self) {
        self.rows_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_rejected(&self) {
        self.rows_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn mark_started(&self) {
        self.started_us.store(now_us(), Ordering::Relaxed);
    }

    pub(crate) fn mark_finished(&self) {
        self.finished_us.store(now_us(), Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> RunStatistics {
        RunStatistics {
            node: self.node.clone(),
            copy: self.copy,
            state: self.state(),
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_rejected: self.rows_rejected.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            started_at: from_us(self.started_us.load(Ordering::Relaxed)),
            finished_at: from_us(self.finished_us.load(Ordering::Relaxed)),
        }
    }
}

/// Snapshot of one copy's counters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunStatistics {
    pub node: String,
    pub copy: usize,
    pub state: CopyState,
    pub rows_read: u64,
    pub rows_written: u64,
    /// Rows sent down the error hop.
    pub rows_rejected: u64,
    /// Fatal errors raised by this copy (0 or 1).
    pub errors: u64,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
}

impl RunStatistics {
    /// Wall time between start and finish, when both are known.
    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.finished_at?);
        end.duration_since(start).ok()
    }
}

fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(1)
        .max(1)
}

fn from_us(us: u64) -> Option<SystemTime> {
    (us != 0).then(|| UNIX_EPOCH + Duration::from_micros(us))
}
