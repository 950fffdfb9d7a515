//! One worker thread per node copy: init, wait for the start gate, run batches, dispose.

use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::engine::node::{NodeContext, ProcessResult};
use crate::error::{EngineError, FailureKind, FatalError};
use crate::graph::NodeCopy;
use crate::pipeline::context::StopSignal;
use crate::pipeline::stats::{CopyState, CopyStats};

/// Reported by a worker once `init` returned (or panicked).
#[derive(Debug)]
pub(crate) struct InitReport {
    pub label: String,
    pub ok: bool,
}

/// Reported by a worker just before its thread exits.
#[derive(Debug)]
pub(crate) struct FinishReport {
    pub label: String,
    pub fatal: Option<FatalError>,
    /// Left through the stop or safe-stop path rather than by finishing its work.
    pub interrupted: bool,
}

/// How a copy's batch loop ended.
enum LoopExit {
    Finished,
    Interrupted,
    Failed(FatalError),
}

/// Channels tying a worker to its supervisor.
pub(crate) struct WorkerLink {
    pub init_tx: Sender<InitReport>,
    pub finish_tx: Sender<FinishReport>,
    /// Closed by the supervisor once every copy reported init.
    pub gate: Receiver<()>,
    pub stop: StopSignal,
}

/// Spawn the thread driving `copy`. The thread is named `node.copy`.
pub(crate) fn spawn_worker(copy: NodeCopy, link: WorkerLink) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(copy.label())
        .spawn(move || run_copy(copy, link))
}

fn run_copy(mut copy: NodeCopy, link: WorkerLink) {
    let label = copy.label();
    let stats = Arc::clone(&copy.stats);

    let init = init_copy(&mut copy);
    let initialized = init.is_ok();
    if initialized {
        stats.set_state(CopyState::Initialized);
    }
    let _ = link.init_tx.send(InitReport {
        label: label.clone(),
        ok: initialized,
    });

    let exit = match init {
        Err(fatal) => {
            stats.set_state(CopyState::Stopping);
            LoopExit::Failed(fatal)
        }
        Ok(()) => {
            // Blocks until the supervisor drops the gate sender.
            let _ = link.gate.recv();
            if link.stop.is_stopped() {
                log::debug!("{label}: stopped before start");
                stopping(&stats)
            } else {
                run_loop(&mut copy, &link.stop)
            }
        }
    };
    let (fatal, interrupted) = match exit {
        LoopExit::Finished => (None, false),
        LoopExit::Interrupted => (None, true),
        LoopExit::Failed(fatal) => (Some(fatal), false),
    };

    if fatal.is_some() {
        stats.add_error();
        link.stop.stop();
    }
    copy.io.mark_done();
    if initialized {
        dispose_copy(&mut copy);
    }
    stats.set_state(CopyState::Disposed);
    stats.mark_finished();
    log::debug!(
        "{label}: finished (read {}, written {}, rejected {})",
        stats.rows_read(),
        stats.rows_written(),
        stats.rows_rejected()
    );
    let _ = link.finish_tx.send(FinishReport {
        label,
        fatal,
        interrupted,
    });
}

fn init_copy(copy: &mut NodeCopy) -> Result<(), FatalError> {
    let ctx = NodeContext {
        node: &copy.node,
        copy: copy.index,
        copies: copy.copies,
        config: &copy.config,
        input_count: copy.io.input_count(),
        has_error_hop: copy.io.has_error_hop(),
    };
    let outcome = catch_unwind(AssertUnwindSafe(|| copy.implementation.init(&ctx)));
    let (kind, message) = match outcome {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => (FailureKind::Initialization, format!("{e:#}")),
        Err(panic) => (FailureKind::Panic, panic_message(panic.as_ref())),
    };
    log::error!("{}: init failed: {}", copy.label(), message);
    Err(fatal_error(copy, kind, message))
}

/// Drive `process_batch` until the node is done, the run stops, or something fails.
fn run_loop(copy: &mut NodeCopy, stop: &StopSignal) -> LoopExit {
    let stats = Arc::clone(&copy.stats);
    stats.set_state(CopyState::Running);
    stats.mark_started();

    loop {
        wait_while_paused(stop);
        if stop.is_stopped() {
            return stopping(&stats);
        }
        if stop.is_safe_stop() && copy.io.is_source() {
            log::debug!("{}: safe stop, finishing source", copy.label());
            stats.set_state(CopyState::Finishing);
            return LoopExit::Interrupted;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            copy.implementation.process_batch(&mut copy.io)
        }));
        match outcome {
            Ok(Ok(ProcessResult::Continue)) => {}
            Ok(Ok(ProcessResult::Done)) => {
                stats.set_state(CopyState::Finishing);
                return LoopExit::Finished;
            }
            Ok(Ok(ProcessResult::RowError(err))) => match copy.io.put_error(err) {
                Ok(()) => {}
                Err(EngineError::Stopped) => return stopping(&stats),
                Err(e @ EngineError::TooManyRejected { .. }) => {
                    return fail(copy, stop, FailureKind::Rejection, e.to_string());
                }
                Err(e) => return fail(copy, stop, FailureKind::Processing, e.to_string()),
            },
            Ok(Err(e)) if EngineError::is_stop(&e) && stop.is_stopped() => {
                return stopping(&stats);
            }
            Ok(Err(e)) => {
                return fail(copy, stop, FailureKind::Processing, format!("{e:#}"));
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                return fail(copy, stop, FailureKind::Panic, message);
            }
        }
    }
}

/// Park between batches while the run is paused. A stop ends the wait.
fn wait_while_paused(stop: &StopSignal) {
    let nap = stop.poll_interval().min(Duration::from_millis(10));
    while stop.is_paused() && !stop.is_stopped() {
        thread::sleep(nap);
    }
}

fn stopping(stats: &CopyStats) -> LoopExit {
    stats.set_state(CopyState::Stopping);
    LoopExit::Interrupted
}

/// Record a fatal error and raise the stop flag for every other copy.
fn fail(copy: &NodeCopy, stop: &StopSignal, kind: FailureKind, message: String) -> LoopExit {
    log::error!("{}: {} error: {}", copy.label(), kind, message);
    copy.stats.set_state(CopyState::Stopping);
    stop.stop();
    LoopExit::Failed(fatal_error(copy, kind, message))
}

fn fatal_error(copy: &NodeCopy, kind: FailureKind, message: String) -> FatalError {
    FatalError {
        node: copy.node.clone(),
        copy: copy.index,
        kind,
        message,
    }
}

fn dispose_copy(copy: &mut NodeCopy) {
    if catch_unwind(AssertUnwindSafe(|| copy.implementation.dispose())).is_err() {
        log::warn!("{}: dispose panicked", copy.label());
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
