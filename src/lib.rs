//! # ipxact-library
//!
//! A Rust library engine for IEEE 1685 (IP-XACT) document collections: it
//! turns a directory tree of XML documents into an addressable, validated,
//! dependency-aware in-memory catalog.
//!
//! ## Overview
//!
//! Every IP-XACT document is addressed by its **VLNV** (Vendor, Library,
//! Name, Version) plus a document-kind tag. The engine scans one or more
//! configured library roots, maps each file to its VLNV, and serves parsed
//! documents through a lazy read-through cache. Documents are validated both
//! structurally (schema-shape rules per kind) and referentially (every
//! VLNV, file, and directory a document depends on must resolve), and the
//! cache is kept in sync with concurrent external edits through debounced
//! file watching.
//!
//! ### Key Features
//!
//! - **Lazy read-through cache**: files are parsed on first access, at most
//!   once between resets
//! - **Clone-on-read discipline**: mutable callers get a deep clone,
//!   read-mostly callers a shared view; nobody aliases cache internals
//! - **Dependency closure**: transitive VLNV dependencies with cycle safety
//! - **Multi-kind validation**: structural rules per document kind plus
//!   cross-document referential integrity against the whole cache
//! - **File-watch reconciliation**: external edits, additions, and deletions
//!   flow back into the cache as `Updated`/`Added`/`Removed` events
//! - **Save windows**: multi-document save transactions suppress redundant
//!   re-validation until the transaction ends
//!
//! ## Architecture
//!
//! The library is organized around several key components:
//!
//! - **[`vlnv`]**: identity value type ([`vlnv::Vlnv`], [`vlnv::DocumentKind`])
//! - **[`document`]**: the in-memory model, a tagged union over the eight
//!   document kinds
//! - **[`access`]**: XML (de)serialization and the cheap VLNV probe
//! - **[`loader`]**: recursive library scans and directory cleanup
//! - **[`validator`]**: structural and referential validation
//! - **[`library`]**: [`library::LibraryHandler`], the central cache authority
//! - **[`watch`]**: [`watch::LibrarySyncService`], filesystem synchronization
//! - **[`event`]**: the change-notification stream consumed by observers
//! - **[`config`]**: library root location providers
//!
//! ## Quick Start
//!
//! Build a catalog from a library directory and query it:
//!
//! ```rust,no_run
//! use ipxact_library::{
//!     config::StaticLocationsProvider,
//!     library::LibraryHandler,
//!     vlnv::{DocumentKind, Vlnv},
//! };
//! use std::sync::{mpsc::channel, Arc};
//!
//! let (tx, _rx) = channel();
//! let locations = Arc::new(StaticLocationsProvider::new(vec!["./ip".into()]));
//! let handler = Arc::new(LibraryHandler::new(locations, tx));
//!
//! // Scan the configured roots and validate everything.
//! let report = handler.search_for_ipxact_files()?;
//! println!(
//!     "{} documents, {} invalid",
//!     report.document_count, report.invalid_documents
//! );
//!
//! // Look up a component and walk its dependency closure.
//! let cpu = Vlnv::new(DocumentKind::Component, "tut.fi", "ip.hwp", "cpu", "1.0");
//! if let Some(component) = handler.get_model_read_only(&cpu) {
//!     println!("{}: {} dependencies", component.vlnv(), handler.get_needed_vlnvs(&cpu).len());
//! }
//! # Ok::<(), ipxact_library::LibraryError>(())
//! ```
//!
//! ## Core Concepts
//!
//! ### Entry Lifecycle
//!
//! Each cache entry moves through `PathOnly → Loaded{valid|invalid}`. A scan
//! registers identity and path only; the first `get_model`/
//! `get_model_read_only` parses and validates; saves and external change
//! notifications re-read from disk so the cache always reflects the
//! persisted bytes. A file that fails to parse stays registered — invalid,
//! with a decode diagnostic — so its identity and path remain queryable.
//!
//! ### Mutation Discipline
//!
//! The cache is the single owner of document storage. [`library::LibraryHandler::get_model`]
//! returns a deep clone the caller may mutate freely; changes only become
//! visible after an explicit write through the handler, which persists the
//! bytes and re-validates. [`library::LibraryHandler::get_model_read_only`]
//! shares the cached instance and must never be used for mutation.
//!
//! ### Events
//!
//! Observers receive [`event::LibraryEvent`]s (`Added`, `Updated`,
//! `Removed`, `Reset`) over the channel passed at construction. No document
//! payloads cross the channel; observers re-query the handler.
//!
//! For watch-service usage see the [`watch`] module documentation.

pub mod access;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod library;
pub mod loader;
pub mod validator;
pub mod vlnv;
pub mod watch;

pub use error::*;
