//! Single-slot rebuild debouncer.
//!
//! ```text
//! schedule({a})  ──► slot = {a}, due = now + quiet
//! schedule({b})  ──► slot = {b}, due = now + quiet     ({a} never runs)
//!        ...quiet...
//! worker         ──► take {b} ──► handler({b})        (slot free again)
//! ```
//!
//! One worker thread runs every rebuild, so rebuilds never overlap. A
//! rebuild that has started is never interrupted; only the pending one
//! can be replaced.

use crate::{debug, log};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::{
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Quiet period used by the watch loop.
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

struct Pending {
    paths: Vec<PathBuf>,
    due: Instant,
}

#[derive(Default)]
struct Slot {
    pending: Option<Pending>,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    wake: Condvar,
}

/// Delays rebuilds until changes stop arriving for `quiet`.
pub struct Debouncer {
    quiet: Duration,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Spawn the worker; `handler` runs once per surviving batch.
    pub fn new<H>(quiet: Duration, handler: H) -> Self
    where
        H: FnMut(Vec<PathBuf>) + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("statik-rebuild".into())
                .spawn(move || run_worker(&shared, handler))
                .ok()
        };
        if worker.is_none() {
            log!("error"; "failed to spawn rebuild worker, changes will not be rebuilt");
        }

        Self {
            quiet,
            shared,
            worker,
        }
    }

    /// Replace any not-yet-started batch with `paths`.
    pub fn schedule(&self, paths: Vec<PathBuf>) {
        let mut slot = self.shared.slot.lock();
        if slot.shutdown {
            return;
        }
        if let Some(dropped) = slot.pending.take() {
            debug!("watch"; "superseded pending rebuild of {} paths", dropped.paths.len());
        }
        slot.pending = Some(Pending {
            paths,
            due: Instant::now() + self.quiet,
        });
        self.shared.wake.notify_one();
    }

    /// Whether a batch is waiting for its quiet period to end.
    pub fn has_pending(&self) -> bool {
        self.shared.slot.lock().pending.is_some()
    }

    /// Drop the pending batch and wait for a running rebuild to finish.
    pub fn shutdown(&mut self) {
        {
            let mut slot = self.shared.slot.lock();
            slot.shutdown = true;
            slot.pending = None;
            self.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log!("error"; "rebuild worker panicked");
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<H: FnMut(Vec<PathBuf>)>(shared: &Shared, mut handler: H) {
    let mut slot = shared.slot.lock();
    loop {
        if slot.shutdown {
            return;
        }
        match slot.pending.as_ref().map(|p| p.due) {
            None => shared.wake.wait(&mut slot),
            Some(due) if Instant::now() < due => {
                let _ = shared.wake.wait_until(&mut slot, due);
            }
            Some(_) => {
                if let Some(batch) = slot.pending.take() {
                    MutexGuard::unlocked(&mut slot, || handler(batch.paths));
                }
            }
        }
    }
}
