//! Progress display for runs: a kdam counter of rows reaching terminal nodes.

use kdam::{Animation, Bar, BarExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::pipeline::RunMonitor;
use crate::utils::config::ProgressConsts;

pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a counter for unknown total (shows count without percentage)
pub fn create_counter(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " rows"
    )))
}

/// Uses try_lock so a contended bar never blocks the caller; the next update catches up.
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.update(n);
    }
}

pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.lock() {
        let _ = bar.refresh();
    }
}

/// Background thread sampling a [`RunMonitor`] until [`ProgressThread::finish`].
pub struct ProgressThread {
    done: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ProgressThread {
    pub fn spawn(monitor: RunMonitor) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let done_flag = Arc::clone(&done);
        let handle = thread::spawn(move || {
            let bar = create_counter("rows");
            refresh_bar(&bar);
            let interval = Duration::from_millis(ProgressConsts::REFRESH_INTERVAL_MS);
            let mut shown = 0u64;
            loop {
                let finished = done_flag.load(Ordering::Relaxed);
                let now = monitor.terminal_rows();
                if now > shown {
                    update_progress_bar(&bar, (now - shown) as usize);
                    shown = now;
                }
                if finished {
                    break;
                }
                thread::sleep(interval);
            }
            refresh_bar(&bar);
            eprintln!();
        });
        Self { done, handle }
    }

    /// Take a last sample and stop the thread.
    pub fn finish(self) {
        self.done.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}
