// SPDX-License-Identifier: MIT OR Apache-2.0
//! Preset directory watching.
//!
//! Debounced file system events for the preset and sequence directories,
//! applied to a [`PresetStore`] from the tick loop.

use crate::presets::PresetStore;
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

/// A change to a record file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEvent {
    /// Created or modified
    Changed(PathBuf),
    /// Deleted
    Removed(PathBuf),
    /// The watcher reported an error
    Error(String),
}

fn is_record_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ron") || e.eq_ignore_ascii_case("json"))
}

/// Watches record directories for changes
pub struct PresetWatcher {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    event_rx: Receiver<RecordEvent>,
    watched: HashSet<PathBuf>,
}

impl PresetWatcher {
    /// Create a watcher that coalesces events within `debounce`
    pub fn new(debounce: Duration) -> Result<Self, notify::Error> {
        let (event_tx, event_rx) = mpsc::channel();

        let debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        let paths = event.paths.iter().filter(|p| is_record_file(p)).cloned();
                        match event.kind {
                            EventKind::Create(_) | EventKind::Modify(_) => {
                                for path in paths {
                                    let _ = event_tx.send(RecordEvent::Changed(path));
                                }
                            }
                            EventKind::Remove(_) => {
                                for path in paths {
                                    let _ = event_tx.send(RecordEvent::Removed(path));
                                }
                            }
                            EventKind::Any | EventKind::Access(_) | EventKind::Other => {}
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let _ = event_tx.send(RecordEvent::Error(error.to_string()));
                    }
                }
            }
        })?;

        Ok(Self {
            debouncer,
            event_rx,
            watched: HashSet::new(),
        })
    }

    /// Watch the store's directories that exist
    pub fn for_store(store: &PresetStore, debounce: Duration) -> Result<Self, notify::Error> {
        let mut watcher = Self::new(debounce)?;
        for dir in [store.preset_dir(), store.sequence_dir()].into_iter().flatten() {
            if dir.is_dir() {
                watcher.watch(dir)?;
            }
        }
        Ok(watcher)
    }

    /// Watch a directory, not descending into subdirectories
    pub fn watch(&mut self, dir: impl AsRef<Path>) -> Result<(), notify::Error> {
        let dir = dir.as_ref().to_path_buf();
        self.debouncer.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!("Watching {:?} for preset changes", dir);
        self.watched.insert(dir);
        Ok(())
    }

    /// Check if a directory is being watched
    pub fn is_watching(&self, dir: &Path) -> bool {
        self.watched.contains(dir)
    }

    /// Drain pending events without blocking
    pub fn poll_events(&self) -> Vec<RecordEvent> {
        let mut events = Vec::new();
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("Preset watcher channel disconnected");
                    break;
                }
            }
        }
        events
    }

    /// Apply pending events to `store`. Returns the names of records that
    /// were reloaded or dropped.
    pub fn apply(&self, store: &PresetStore) -> Vec<String> {
        apply_events(store, self.poll_events())
    }
}

/// Apply record events to `store`
pub fn apply_events(store: &PresetStore, events: impl IntoIterator<Item = RecordEvent>) -> Vec<String> {
    let mut touched = Vec::new();
    for event in events {
        let path = match event {
            RecordEvent::Changed(path) | RecordEvent::Removed(path) => path,
            RecordEvent::Error(e) => {
                tracing::warn!("Preset watcher error: {}", e);
                continue;
            }
        };
        match store.reload_path(&path) {
            Ok(Some(name)) => {
                if !touched.contains(&name) {
                    touched.push(name);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not reload {:?}: {}", path, e),
        }
    }
    touched
}

impl std::fmt::Debug for PresetWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresetWatcher")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}
