//! File-watch reconciliation tests: external edits, deletions, and additions
//! must flow back into the cache, while save windows suppress the engine's
//! own writes.
//!
//! These tests drive a real `notify` watcher over temp directories, so they
//! use short debounce intervals and generous settle waits.

mod common;

use std::time::{Duration, Instant};

use filetime::{set_file_mtime, FileTime};
use ipxact_library::event::{EventOrigin, LibraryEvent};
use ipxact_library::vlnv::DocumentKind;
use ipxact_library::watch::LibrarySyncService;
use tempfile::TempDir;

use common::*;

const DEBOUNCE: Duration = Duration::from_millis(200);
const REMOVAL_GRACE: Duration = Duration::from_millis(150);
const SETTLE: Duration = Duration::from_secs(3);

/// Wait until `predicate` matches an incoming event, collecting everything
/// seen along the way.
fn wait_for(
    rx: &std::sync::mpsc::Receiver<LibraryEvent>,
    predicate: impl Fn(&LibraryEvent) -> bool,
) -> Vec<LibraryEvent> {
    let deadline = Instant::now() + SETTLE;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        if let Ok(event) = rx.recv_timeout(Duration::from_millis(100)) {
            let matched = predicate(&event);
            seen.push(event);
            if matched {
                return seen;
            }
        }
    }
    panic!("no matching event within {SETTLE:?}; saw {seen:?}");
}

#[test]
fn external_delete_emits_one_removed_event() {
    init_logging();
    let root = TempDir::new().unwrap();
    let bus = bus_definition("bus1");
    let path = write_doc(root.path(), &bus);

    let (handler, rx) = new_library(root.path());
    handler.search_for_ipxact_files().unwrap();
    drain_events(&rx);

    let service = LibrarySyncService::with_timing(handler.clone(), DEBOUNCE, REMOVAL_GRACE);
    service.watch_configured_locations().unwrap();

    std::fs::remove_file(&path).unwrap();

    let seen = wait_for(&rx, |event| {
        matches!(event, LibraryEvent::Removed(vlnv, EventOrigin::External) if vlnv == bus.vlnv())
    });
    assert!(!handler.contains(bus.vlnv()));

    // Exactly one removal for that identity.
    std::thread::sleep(DEBOUNCE + REMOVAL_GRACE + Duration::from_millis(500));
    let removals = seen
        .iter()
        .chain(drain_events(&rx).iter())
        .filter(|event| matches!(event, LibraryEvent::Removed(vlnv, _) if vlnv == bus.vlnv()))
        .count();
    assert_eq!(removals, 1);
}

#[test]
fn external_modify_replaces_cached_entry() {
    init_logging();
    let root = TempDir::new().unwrap();
    let mut bus = bus_definition("bus1");
    let path = write_doc(root.path(), &bus);

    let (handler, rx) = new_library(root.path());
    handler.search_for_ipxact_files().unwrap();
    drain_events(&rx);

    let service = LibrarySyncService::with_timing(handler.clone(), DEBOUNCE, REMOVAL_GRACE);
    service.watch_configured_locations().unwrap();

    // Another process rewrites the document in place. Nudge the mtime as
    // well so coarse-timestamp filesystems still register the change.
    if let ipxact_library::document::Document::BusDefinition(inner) = &mut bus {
        inner.meta.description = Some("edited elsewhere".to_string());
    }
    ipxact_library::access::write_document(&bus, &path).unwrap();
    set_file_mtime(&path, FileTime::now()).unwrap();

    wait_for(&rx, |event| {
        matches!(event, LibraryEvent::Updated(vlnv, EventOrigin::External) if vlnv == bus.vlnv())
    });

    let cached = handler.get_model_read_only(bus.vlnv()).unwrap();
    assert_eq!(cached.meta().description.as_deref(), Some("edited elsewhere"));
}

#[test]
fn external_create_registers_newcomer() {
    init_logging();
    let root = TempDir::new().unwrap();
    let (handler, rx) = new_library(root.path());
    handler.search_for_ipxact_files().unwrap();
    drain_events(&rx);

    let service = LibrarySyncService::with_timing(handler.clone(), DEBOUNCE, REMOVAL_GRACE);
    service.watch_configured_locations().unwrap();

    let bus = bus_definition("bus1");
    write_doc(root.path(), &bus);

    wait_for(&rx, |event| {
        matches!(event, LibraryEvent::Added(vlnv, EventOrigin::External) if vlnv == bus.vlnv())
    });
    assert!(handler.contains(bus.vlnv()));
    assert!(handler.is_valid(bus.vlnv()));
}

#[test]
fn save_window_suppresses_own_writes_only() {
    init_logging();
    let root = TempDir::new().unwrap();
    let mut own = bus_definition("own_bus");
    let foreign = bus_definition("foreign_bus");
    write_doc(root.path(), &own);
    let foreign_path = write_doc(root.path(), &foreign);

    let (handler, rx) = new_library(root.path());
    handler.search_for_ipxact_files().unwrap();
    drain_events(&rx);

    let service = LibrarySyncService::with_timing(handler.clone(), DEBOUNCE, REMOVAL_GRACE);
    service.watch_configured_locations().unwrap();

    handler.begin_save();

    // The engine writes one document inside the window...
    if let ipxact_library::document::Document::BusDefinition(inner) = &mut own {
        inner.meta.description = Some("saved by the engine".to_string());
    }
    handler.write_model(&own).unwrap();

    // ...while another process touches a different file.
    let mut foreign_edit = foreign.clone();
    if let ipxact_library::document::Document::BusDefinition(inner) = &mut foreign_edit {
        inner.meta.description = Some("changed externally".to_string());
    }
    ipxact_library::access::write_document(&foreign_edit, &foreign_path).unwrap();

    // The foreign change lands while the window is still open.
    let seen = wait_for(&rx, |event| {
        matches!(event, LibraryEvent::Updated(vlnv, EventOrigin::External) if vlnv == foreign.vlnv())
    });
    assert!(
        !seen
            .iter()
            .any(|event| event.vlnv() == Some(own.vlnv())),
        "engine write leaked through the save window: {seen:?}"
    );

    // Closing the window resynchronizes the engine's write exactly once.
    handler.end_save();
    wait_for(&rx, |event| {
        matches!(event, LibraryEvent::Updated(vlnv, EventOrigin::Local) if vlnv == own.vlnv())
    });
    let cached = handler.get_model_read_only(own.vlnv()).unwrap();
    assert_eq!(
        cached.meta().description.as_deref(),
        Some("saved by the engine")
    );
}

#[test]
fn disabled_watcher_stops_reconciliation() {
    init_logging();
    let root = TempDir::new().unwrap();
    let bus = bus_definition("bus1");
    let path = write_doc(root.path(), &bus);

    let (handler, rx) = new_library(root.path());
    handler.search_for_ipxact_files().unwrap();
    drain_events(&rx);

    let service = LibrarySyncService::with_timing(handler.clone(), DEBOUNCE, REMOVAL_GRACE);
    service.enable_location_syncer(root.path()).unwrap();
    assert_eq!(service.watched_locations(), vec![root.path().to_path_buf()]);
    service.disable_location_syncer(root.path()).unwrap();
    assert!(service.watched_locations().is_empty());

    std::fs::remove_file(&path).unwrap();
    std::thread::sleep(DEBOUNCE + REMOVAL_GRACE + Duration::from_millis(500));
    assert!(drain_events(&rx).is_empty());
    assert!(handler.contains(bus.vlnv()));
}
