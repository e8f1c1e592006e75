//! File system watcher for live rebuilds.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        WatchLoop                             │
//! │                                                              │
//! │  recv() first event ──► try_iter() drain ──► collect()       │
//! │                                                │             │
//! │      new dir  → register subtree              │             │
//! │      gone dir → unregister, not forwarded      ▼             │
//! │                                     Debouncer::schedule()    │
//! │                                                │ 200ms quiet │
//! │                                                ▼             │
//! │                                     rebuild worker thread    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every directory is watched non-recursively so the set of watched
//! directories is explicit and can grow while the loop runs.

mod debounce;

pub use debounce::{Debouncer, QUIET_PERIOD};

use crate::{
    config::{ConfigHandle, SiteLayout},
    debug, log,
};
use anyhow::{Context, Result};
use notify::{
    Event, EventKind, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
};
use walkdir::WalkDir;

// =============================================================================
// Backend
// =============================================================================

/// Directory-level watch registration.
pub trait WatchBackend {
    fn watch_dir(&mut self, dir: &Path) -> notify::Result<()>;
    fn unwatch_dir(&mut self, dir: &Path) -> notify::Result<()>;
}

/// Adapts any `notify` watcher.
pub struct NotifyBackend<W>(pub W);

impl<W: Watcher> WatchBackend for NotifyBackend<W> {
    fn watch_dir(&mut self, dir: &Path) -> notify::Result<()> {
        self.0.watch(dir, RecursiveMode::NonRecursive)
    }

    fn unwatch_dir(&mut self, dir: &Path) -> notify::Result<()> {
        self.0.unwatch(dir)
    }
}

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Create, data/name modification and removal; metadata-only touches are ignored.
const fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any | ModifyKind::Other)
    )
}

// =============================================================================
// Watch Loop
// =============================================================================

/// Watch registry plus event filtering for one site.
pub struct WatchLoop<B: WatchBackend> {
    backend: B,
    layout: SiteLayout,
    /// Source of the current layout after config reloads.
    config: Option<ConfigHandle>,
    watched: FxHashSet<PathBuf>,
}

impl<B: WatchBackend> WatchLoop<B> {
    pub fn new(backend: B, layout: SiteLayout) -> Self {
        Self {
            backend,
            layout,
            config: None,
            watched: FxHashSet::default(),
        }
    }

    /// Re-read the layout from `config` at the start of every wake cycle.
    pub fn follow(mut self, config: ConfigHandle) -> Self {
        self.layout = config.load().layout();
        self.config = Some(config);
        self
    }

    /// Register every source subtree plus the site root (for the config file).
    ///
    /// Returns the number of directories watched.
    pub fn register_all(&mut self) -> usize {
        let root = self.layout.root.clone();
        self.register(&root);

        let dirs: Vec<PathBuf> = self.layout.source_dirs().into_iter().map(Path::to_path_buf).collect();
        for dir in dirs.iter().filter(|d| d.is_dir()) {
            self.register_tree(dir);
        }
        self.watched.len()
    }

    pub fn is_watched(&self, dir: &Path) -> bool {
        self.watched.contains(dir)
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    /// Register `dir` and every directory below it. Returns files found inside.
    fn register_tree(&mut self, dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let output = self.layout.output.clone();
        let entries = WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(e.path().starts_with(&output) || is_temp_file(e.path())))
            .filter_map(Result::ok);

        for entry in entries {
            if entry.file_type().is_dir() {
                self.register(entry.path());
            } else if entry.depth() > 0 {
                files.push(entry.into_path());
            }
        }
        files
    }

    fn register(&mut self, dir: &Path) -> bool {
        if self.watched.contains(dir) {
            return true;
        }
        match self.backend.watch_dir(dir) {
            Ok(()) => {
                debug!("watch"; "watching {}", dir.display());
                self.watched.insert(dir.to_path_buf());
                true
            }
            Err(err) => {
                log!("warn"; "cannot watch {}: {err}", dir.display());
                false
            }
        }
    }

    fn unregister_tree(&mut self, dir: &Path) {
        let gone: Vec<PathBuf> = self.watched.iter().filter(|w| w.starts_with(dir)).cloned().collect();
        for path in gone {
            self.unregister(&path);
        }
    }

    fn unregister(&mut self, dir: &Path) {
        self.watched.remove(dir);
        // The OS usually drops watches on deleted directories itself.
        if let Err(err) = self.backend.unwatch_dir(dir) {
            debug!("watch"; "unwatch {}: {err}", dir.display());
        }
    }

    /// Pick up directory changes from a reloaded config.
    fn sync_layout(&mut self) {
        let Some(fresh) = self.config.as_ref().map(|config| config.load().layout()) else {
            return;
        };
        if fresh == self.layout {
            return;
        }

        self.layout = fresh;
        let stale: Vec<PathBuf> = self
            .watched
            .iter()
            .filter(|dir| **dir != self.layout.root && (!self.in_source_dir(dir) || self.layout.is_output(dir)))
            .cloned()
            .collect();
        for dir in &stale {
            self.unregister(dir);
        }

        let count = self.register_all();
        log!("watch"; "layout changed, watching {count} directories");
    }

    fn in_source_dir(&self, path: &Path) -> bool {
        self.layout.source_dirs().iter().any(|dir| path.starts_with(dir))
    }

    /// Process one wake cycle of events; returns the qualifying file paths.
    pub fn collect(&mut self, events: impl IntoIterator<Item = notify::Result<Event>>) -> Vec<PathBuf> {
        let mut changed = FxHashSet::default();

        for event in events {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    log!("watch"; "error: {err}");
                    continue;
                }
            };
            if !is_relevant(&event.kind) {
                continue;
            }

            for path in event.paths {
                if self.layout.is_output(&path) || is_temp_file(&path) {
                    continue;
                }
                self.route(&event.kind, path, &mut changed);
            }
        }

        let mut changed: Vec<PathBuf> = changed.into_iter().collect();
        changed.sort();
        changed
    }

    fn route(&mut self, kind: &EventKind, path: PathBuf, changed: &mut FxHashSet<PathBuf>) {
        if self.watched.contains(&path) && !path.is_dir() {
            // Removed or renamed away.
            debug!("watch"; "directory gone: {}", path.display());
            self.unregister_tree(&path);
            return;
        }

        if path.is_dir() {
            let created = matches!(
                kind,
                EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any | RenameMode::Both))
            );
            if created && self.in_source_dir(&path) && !self.watched.contains(&path) {
                debug!("watch"; "new directory: {}", path.display());
                changed.extend(self.register_tree(&path));
            }
            return;
        }

        changed.insert(path);
    }

    /// One wake cycle: follow the current layout, then filter `events`.
    pub fn cycle(&mut self, events: impl IntoIterator<Item = notify::Result<Event>>) -> Vec<PathBuf> {
        self.sync_layout();
        self.collect(events)
    }

    /// Block on events until the channel disconnects, feeding `debouncer`.
    pub fn run(mut self, events: Receiver<notify::Result<Event>>, mut debouncer: Debouncer) {
        while let Ok(first) = events.recv() {
            let batch = self.cycle(std::iter::once(first).chain(events.try_iter()));
            if !batch.is_empty() {
                debug!("watch"; "{} changed paths", batch.len());
                debouncer.schedule(batch);
            }
        }

        log!("watch"; "watcher stopped");
        debouncer.shutdown();
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Watch the site and call `rebuild` with each debounced batch. Blocks.
///
/// `rebuild` returns `true` when the site layout may have changed (a full
/// rebuild after a config change); the loop then wakes and re-registers
/// directories without waiting for the next file event.
pub fn watch_site<F>(config: ConfigHandle, mut rebuild: F) -> Result<()>
where
    F: FnMut(Vec<PathBuf>) -> bool + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let wake = tx.clone();
    let watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;

    let mut watch_loop = WatchLoop::new(NotifyBackend(watcher), SiteLayout::default()).follow(config);
    let count = watch_loop.register_all();
    log!("watch"; "watching {count} directories under {}", watch_loop.layout.root.display());

    let debouncer = Debouncer::new(QUIET_PERIOD, move |paths| {
        if rebuild(paths) {
            // Not a relevant kind, so it only triggers `sync_layout`.
            wake.send(Ok(Event::new(EventKind::Other))).ok();
        }
    });
    watch_loop.run(rx, debouncer);
    Ok(())
}
