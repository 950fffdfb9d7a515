//! Run supervision: launch one worker per node copy, gate them on init, wait for completion,
//! and aggregate statistics and fatal errors into a [`RunResult`].

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded, unbounded};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{EngineError, FailureKind, FatalError};
use crate::graph::ExecutionPlan;
use crate::pipeline::context::StopSignal;
use crate::pipeline::stats::{CopyState, CopyStats, RunStatistics};
use crate::pipeline::worker::{FinishReport, InitReport, WorkerLink, spawn_worker};

/// Overall outcome of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    /// Stopped on request (cancel, safe stop or timeout) without any fatal error.
    Cancelled,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What the caller gets back once every copy is disposed.
#[derive(Clone, Debug, Serialize)]
pub struct RunResult {
    pub status: RunStatus,
    /// One entry per node copy, in topological node order.
    pub statistics: Vec<RunStatistics>,
    pub errors: Vec<FatalError>,
    pub elapsed: Duration,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Statistics of every copy of `node`.
    pub fn statistics_for<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a RunStatistics> {
        self.statistics.iter().filter(move |s| s.node == node)
    }

    /// Rows read by all copies of `node`.
    pub fn rows_read(&self, node: &str) -> u64 {
        self.statistics_for(node).map(|s| s.rows_read).sum()
    }

    /// Rows written by all copies of `node`.
    pub fn rows_written(&self, node: &str) -> u64 {
        self.statistics_for(node).map(|s| s.rows_written).sum()
    }

    /// Rows sent down the error hop by all copies of `node`.
    pub fn rows_rejected(&self, node: &str) -> u64 {
        self.statistics_for(node).map(|s| s.rows_rejected).sum()
    }
}

/// Cloneable view on a live run: statistics snapshots and stop requests.
#[derive(Clone, Debug)]
pub struct RunMonitor {
    stats: Arc<[Arc<CopyStats>]>,
    stop: StopSignal,
}

impl RunMonitor {
    /// Current statistics of every copy.
    pub fn snapshot(&self) -> Vec<RunStatistics> {
        self.stats.iter().map(|s| s.snapshot()).collect()
    }

    /// Rows written so far by copies of terminal nodes.
    pub fn terminal_rows(&self) -> u64 {
        self.stats
            .iter()
            .filter(|s| s.is_terminal())
            .map(|s| s.rows_written())
            .sum()
    }

    /// Ask every copy to stop at its next safe point.
    pub fn cancel(&self) {
        if self.stop.cancel() {
            log::warn!("run cancelled");
        }
    }

    /// Ask source copies to finish; the rest of the graph drains normally.
    pub fn safe_stop(&self) {
        log::warn!("safe stop requested");
        self.stop.safe_stop();
    }

    /// Hold every copy at its next batch boundary. Stop requests still apply while paused.
    pub fn pause(&self) {
        if self.stop.pause() {
            log::info!("run paused");
        }
    }

    pub fn resume(&self) {
        if self.stop.resume() {
            log::info!("run resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.stop.is_paused()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// True once every copy reached `Disposed`.
    pub fn is_finished(&self) -> bool {
        self.stats.iter().all(|s| s.state() == CopyState::Disposed)
    }
}

/// Launches runs.
pub struct Supervisor;

impl Supervisor {
    /// Spawn one worker per copy of `plan`, wait until every copy ran `init`, then release them.
    ///
    /// If any init fails the stop flag is raised before release, so no copy starts processing
    /// and every initialized copy is disposed.
    pub fn start(plan: ExecutionPlan) -> Result<RunHandle> {
        let ExecutionPlan { copies, stop, .. } = plan;
        let total = copies.len();
        let stats: Arc<[Arc<CopyStats>]> = copies.iter().map(|c| Arc::clone(&c.stats)).collect();

        let (init_tx, init_rx) = unbounded::<InitReport>();
        let (finish_tx, finish_rx) = unbounded::<FinishReport>();
        let (gate_tx, gate_rx) = bounded::<()>(0);

        log::info!("starting {total} node copies");
        let started = Instant::now();
        let mut workers = Vec::with_capacity(total);
        let mut pending = copies.into_iter();
        while let Some(copy) = pending.next() {
            let label = copy.label();
            let copy_stats = Arc::clone(&copy.stats);
            let link = WorkerLink {
                init_tx: init_tx.clone(),
                finish_tx: finish_tx.clone(),
                gate: gate_rx.clone(),
                stop: stop.clone(),
            };
            match spawn_worker(copy, link) {
                Ok(handle) => workers.push((copy_stats, handle)),
                Err(e) => {
                    log::error!("failed to spawn worker {label}: {e}");
                    stop.stop();
                    drop(pending);
                    drop(gate_tx);
                    for (_, handle) in workers {
                        let _ = handle.join();
                    }
                    return Err(EngineError::Spawn(format!("{label}: {e}")).into());
                }
            }
        }
        drop(init_tx);
        drop(finish_tx);

        let mut failed = Vec::new();
        for _ in 0..total {
            match init_rx.recv() {
                Ok(report) if !report.ok => failed.push(report.label),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        if failed.is_empty() {
            log::debug!("all {total} copies initialized");
        } else {
            log::error!(
                "initialization failed for {}; stopping run",
                failed.join(", ")
            );
            stop.stop();
        }
        drop(gate_tx);

        Ok(RunHandle {
            workers,
            finish_rx,
            monitor: RunMonitor { stats, stop },
            started,
        })
    }
}

/// A run in flight.
pub struct RunHandle {
    workers: Vec<(Arc<CopyStats>, JoinHandle<()>)>,
    finish_rx: Receiver<FinishReport>,
    monitor: RunMonitor,
    started: Instant,
}

impl RunHandle {
    pub fn monitor(&self) -> RunMonitor {
        self.monitor.clone()
    }

    pub fn cancel(&self) {
        self.monitor.cancel();
    }

    /// Block until every copy is disposed. With `timeout`, the run is cancelled once it elapses
    /// and this still waits for the copies to dispose.
    pub fn await_completion(self, timeout: Option<Duration>) -> RunResult {
        let RunHandle {
            workers,
            finish_rx,
            monitor,
            started,
        } = self;
        let mut deadline = timeout.map(|t| Instant::now() + t);
        let mut errors = Vec::new();
        let mut remaining = workers.len();
        let mut interrupted = false;

        while remaining > 0 {
            let received = match deadline {
                Some(at) => match finish_rx.recv_deadline(at) {
                    Ok(report) => Some(report),
                    Err(RecvTimeoutError::Timeout) => {
                        log::warn!("run timed out after {:?}", started.elapsed());
                        monitor.cancel();
                        deadline = None;
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => None,
                },
                None => finish_rx.recv().ok(),
            };
            let Some(report) = received else { break };
            remaining -= 1;
            interrupted |= report.interrupted;
            if let Some(fatal) = report.fatal {
                log::debug!("{}: reported fatal error", report.label);
                errors.push(fatal);
            }
        }

        for (stats, handle) in workers {
            if handle.join().is_err() {
                stats.set_state(CopyState::Disposed);
                errors.push(FatalError {
                    node: stats.node().to_string(),
                    copy: stats.copy(),
                    kind: FailureKind::Panic,
                    message: "worker thread panicked".to_string(),
                });
            }
        }

        // A cancel that lands after every copy already finished does not change the outcome.
        let status = if !errors.is_empty() {
            RunStatus::Failed
        } else if monitor.stop.is_cancelled() && interrupted {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        let elapsed = started.elapsed();
        match status {
            RunStatus::Failed => log::error!(
                "run failed after {:?} with {} fatal error(s)",
                elapsed,
                errors.len()
            ),
            _ => log::info!("run {status} in {elapsed:?}"),
        }

        RunResult {
            status,
            statistics: monitor.snapshot(),
            errors,
            elapsed,
        }
    }
}
