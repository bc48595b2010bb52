//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

use ipxact_library::access;
use ipxact_library::config::StaticLocationsProvider;
use ipxact_library::document::{
    BusDefinition, BusInterface, Catalog, Component, Document, DocumentMeta, IpxactFile,
};
use ipxact_library::event::LibraryEvent;
use ipxact_library::library::LibraryHandler;
use ipxact_library::vlnv::{DocumentKind, Vlnv};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times — subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A handler rooted at `root`, with its event receiver.
#[allow(dead_code)]
pub fn new_library(root: &Path) -> (Arc<LibraryHandler>, Receiver<LibraryEvent>) {
    let (tx, rx) = channel();
    let locations = Arc::new(StaticLocationsProvider::new(vec![root.to_path_buf()]));
    (Arc::new(LibraryHandler::new(locations, tx)), rx)
}

#[allow(dead_code)]
pub fn vlnv(kind: DocumentKind, name: &str) -> Vlnv {
    Vlnv::new(kind, "tut.fi", "ip.hwp", name, "1.0")
}

#[allow(dead_code)]
pub fn bus_definition(name: &str) -> Document {
    Document::BusDefinition(BusDefinition {
        meta: DocumentMeta::new(vlnv(DocumentKind::BusDefinition, name)),
        direct_connection: true,
        ..Default::default()
    })
}

/// A component whose only dependency is a bus interface typed `bus`.
#[allow(dead_code)]
pub fn component_referencing(name: &str, bus: &Vlnv) -> Document {
    Document::Component(Component {
        meta: DocumentMeta::new(vlnv(DocumentKind::Component, name)),
        bus_interfaces: vec![BusInterface {
            name: format!("{}_if", bus.name),
            bus_type: bus.clone(),
            abstraction_ref: None,
        }],
        views: vec![],
        file_sets: vec![],
    })
}

/// A catalog listing the given entries as `(identity, relative file path)`.
#[allow(dead_code)]
pub fn catalog(name: &str, entries: &[(Vlnv, &str)]) -> Document {
    Document::Catalog(Catalog {
        meta: DocumentMeta::new(vlnv(DocumentKind::Catalog, name)),
        files: entries
            .iter()
            .map(|(vlnv, path)| IpxactFile {
                vlnv: vlnv.clone(),
                path: path.to_string(),
            })
            .collect(),
    })
}

/// Serialize `document` into `dir` under the canonical `name.version.xml`
/// file name, without registering it anywhere.
#[allow(dead_code)]
pub fn write_doc(dir: &Path, document: &Document) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let identity = document.vlnv();
    let path = dir.join(format!("{}.{}.xml", identity.name, identity.version));
    access::write_document(document, &path).unwrap();
    path
}

/// Drain every event currently queued on the receiver.
#[allow(dead_code)]
pub fn drain_events(rx: &Receiver<LibraryEvent>) -> Vec<LibraryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
