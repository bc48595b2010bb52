//! # Library Sync Service - File Watching and Cache Reconciliation
//!
//! [`LibrarySyncService`] keeps a [`LibraryHandler`] synchronized with
//! external edits to the library directories. It is meant for long-running
//! hosts (the editor shell, a headless indexer); one-shot tools can use the
//! handler's explicit scan instead.
//!
//! ## Behavior
//!
//! - **Debounced watching**: each library root is watched recursively via
//!   `notify-debouncer-full`, so editor save bursts collapse into one
//!   notification batch.
//! - **Extension filtering**: only `.xml` files are considered; dot files
//!   (`.git`, `.DS_Store`) are ignored.
//! - **Reconciliation**: a changed path that still exists is re-read and
//!   re-validated (`Updated`), an unknown path is probed for a VLNV and
//!   registered (`Added`), and a vanished path is unregistered (`Removed`)
//!   only after a removal grace re-check, so atomic-save delete+recreate
//!   sequences do not emit spurious removals.
//! - **Save suppression**: while a `begin_save`/`end_save` window is open on
//!   the handler, notifications for paths the engine itself wrote are
//!   dropped; foreign paths are still processed immediately.
//!
//! ## Threading Model
//!
//! The debouncer delivers batches on its own watcher thread; reconciliation
//! calls into the handler from that thread, serialized by the handler's
//! internal locks. Removal grace checks run on short-lived detached threads
//! so the watcher thread never sleeps.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ipxact_library::{
//!     config::StaticLocationsProvider, library::LibraryHandler, watch::LibrarySyncService,
//! };
//! use std::sync::{mpsc::channel, Arc};
//!
//! let (tx, rx) = channel();
//! let locations = Arc::new(StaticLocationsProvider::new(vec!["/ip/library".into()]));
//! let handler = Arc::new(LibraryHandler::new(locations, tx));
//! handler.search_for_ipxact_files()?;
//!
//! let service = LibrarySyncService::new(handler.clone());
//! service.watch_configured_locations()?;
//!
//! for event in rx {
//!     println!("library changed: {event}");
//! }
//! # Ok::<(), ipxact_library::LibraryError>(())
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher},
    DebounceEventResult, Debouncer, FileIdMap,
};
use parking_lot::Mutex;

use crate::error::LibraryError;
use crate::library::LibraryHandler;
use crate::loader::DOCUMENT_EXTENSION;

/// A debounced file system watcher for one library root.
type LocationWatcher = Debouncer<RecommendedWatcher, FileIdMap>;

/// Default coalescing window for filesystem notifications.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Default wait before a missing path is treated as removed.
const DEFAULT_REMOVAL_GRACE: Duration = Duration::from_millis(300);

pub struct LibrarySyncService {
    handler: Arc<LibraryHandler>,
    watchers: Mutex<HashMap<PathBuf, LocationWatcher>>,
    debounce: Duration,
    removal_grace: Duration,
}

impl LibrarySyncService {
    pub fn new(handler: Arc<LibraryHandler>) -> Self {
        Self::with_timing(handler, DEFAULT_DEBOUNCE, DEFAULT_REMOVAL_GRACE)
    }

    /// Custom debounce and removal-grace intervals, mainly for tests.
    pub fn with_timing(
        handler: Arc<LibraryHandler>,
        debounce: Duration,
        removal_grace: Duration,
    ) -> Self {
        LibrarySyncService {
            handler,
            watchers: Mutex::new(HashMap::new()),
            debounce,
            removal_grace,
        }
    }

    /// Enable a watcher for every configured library root.
    pub fn watch_configured_locations(&self) -> Result<(), LibraryError> {
        for location in self.handler.locations() {
            self.enable_location_syncer(&location)?;
        }
        Ok(())
    }

    /// Start watching one library root recursively.
    pub fn enable_location_syncer(&self, location: &Path) -> Result<(), LibraryError> {
        let mut watchers = self.watchers.lock();
        if watchers.contains_key(location) {
            return Err(LibraryError::AlreadyExists(format!(
                "file watcher for library location {location:?}"
            )));
        }

        let handler = self.handler.clone();
        let removal_grace = self.removal_grace;
        let mut debouncer = new_debouncer(
            self.debounce,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events.iter() {
                        match event.event.kind {
                            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                                for path in event.paths.iter().filter(|p| is_document_path(p)) {
                                    dispatch_path_change(&handler, path, removal_grace);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                Err(errors) => {
                    tracing::error!("Notify debouncer returned errors: {:?}", errors);
                }
            },
        )?;
        debouncer
            .watcher()
            .watch(location, RecursiveMode::Recursive)?;

        tracing::debug!("Watching library location {:?}", location);
        watchers.insert(location.to_path_buf(), debouncer);
        Ok(())
    }

    /// Stop watching one library root.
    pub fn disable_location_syncer(&self, location: &Path) -> Result<(), LibraryError> {
        let mut watchers = self.watchers.lock();
        if let Some(mut debouncer) = watchers.remove(location) {
            let unwatch_res = debouncer.watcher().unwatch(location);
            tracing::debug!("Unwatch_res(path: {:?}) = {:?}", location, unwatch_res);
            unwatch_res?;
        }
        Ok(())
    }

    pub fn watched_locations(&self) -> Vec<PathBuf> {
        self.watchers.lock().keys().cloned().collect()
    }
}

/// Document files only: `.xml`, not dot-prefixed.
fn is_document_path(path: &Path) -> bool {
    let dotfile = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false);
    !dotfile
        && path.extension().and_then(|ext| ext.to_str()) == Some(DOCUMENT_EXTENSION)
}

fn dispatch_path_change(handler: &Arc<LibraryHandler>, path: &Path, removal_grace: Duration) {
    if path.exists() {
        handler.on_file_changed(path);
        return;
    }
    // Hold off before declaring removal so atomic-save replace sequences
    // (delete then recreate) settle first. The handler re-checks existence.
    let handler = handler.clone();
    let path = path.to_path_buf();
    std::thread::spawn(move || {
        std::thread::sleep(removal_grace);
        handler.on_file_missing(&path);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_path_filter() {
        assert!(is_document_path(Path::new("/lib/v/l/cpu/1.0/cpu.1.0.xml")));
        assert!(!is_document_path(Path::new("/lib/.hidden.xml")));
        assert!(!is_document_path(Path::new("/lib/readme.md")));
        assert!(!is_document_path(Path::new("/lib/cpu")));
    }
}
