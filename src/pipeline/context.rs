//! Run-wide shared state: the stop flags every worker checks between batches and while blocked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct StopFlags {
    /// Every worker must stop at its next safe point.
    stopped: AtomicBool,
    /// Stop was requested from outside (cancel or timeout), not caused by a failure.
    cancelled: AtomicBool,
    /// Source copies should finish so the rest of the graph drains.
    safe_stop: AtomicBool,
    /// Copies hold at their next batch boundary until resumed.
    paused: AtomicBool,
}

/// Cloneable handle on a run's stop flags.
#[derive(Clone, Debug)]
pub struct StopSignal {
    flags: Arc<StopFlags>,
    poll_interval: Duration,
}

impl StopSignal {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            flags: Arc::new(StopFlags::default()),
            poll_interval,
        }
    }

    /// How long a blocked channel operation waits before re-checking the flags.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_stopped(&self) -> bool {
        self.flags.stopped.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.cancelled.load(Ordering::Acquire)
    }

    pub fn is_safe_stop(&self) -> bool {
        self.flags.safe_stop.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::Acquire)
    }

    /// Returns false if the run was already paused.
    pub fn pause(&self) -> bool {
        !self.flags.paused.swap(true, Ordering::AcqRel)
    }

    /// Returns false if the run was not paused.
    pub fn resume(&self) -> bool {
        self.flags.paused.swap(false, Ordering::AcqRel)
    }

    /// Stop because something failed.
    pub fn stop(&self) {
        self.flags.stopped.store(true, Ordering::Release);
    }

    /// Stop on request. Returns false if the run was already stopping.
    pub fn cancel(&self) -> bool {
        self.flags.cancelled.store(true, Ordering::Release);
        !self.flags.stopped.swap(true, Ordering::AcqRel)
    }

    /// Ask source copies to finish; downstream copies drain what was produced.
    pub fn safe_stop(&self) {
        self.flags.cancelled.store(true, Ordering::Release);
        self.flags.safe_stop.store(true, Ordering::Release);
    }
}
