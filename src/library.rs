//! The document cache: the single authority over every registered VLNV.
//!
//! Entries move through `PathOnly → Loaded{valid|invalid}`: the loader (or an
//! explicit add) registers identity and path, the first access parses the
//! file, and validation stamps the entry. A failed parse marks the entry
//! invalid with a decode diagnostic instead of dropping it, so the identity
//! and path stay queryable.
//!
//! The clone-vs-share decision is centralized in the two accessors:
//! [`LibraryHandler::get_model`] hands out a deep clone for mutation,
//! [`LibraryHandler::get_model_read_only`] a shared `Arc` view. Callers can
//! never alias the cache's mutable state.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc::Sender, Arc};

use parking_lot::{Mutex, RwLock};

use crate::access;
use crate::config::LocationsProvider;
use crate::document::Document;
use crate::error::LibraryError;
use crate::event::{EventOrigin, LibraryEvent};
use crate::loader::{absolute_from, LibraryLoader};
use crate::validator::{is_url_reference, DocumentStore, DocumentValidator};
use crate::vlnv::{DocumentKind, Vlnv};

/// All relevant data about one registered document.
#[derive(Debug, Clone)]
struct DocumentEntry {
    /// The file backing the document. Always present once registered.
    path: PathBuf,
    /// The parsed model. `None` until first access.
    document: Option<Arc<Document>>,
    /// Meaningful only after a validation pass over a parsed document.
    is_valid: bool,
    /// Findings of the most recent validation or decode attempt.
    errors: Vec<String>,
}

impl DocumentEntry {
    fn path_only(path: PathBuf) -> Self {
        DocumentEntry {
            path,
            document: None,
            is_valid: false,
            errors: Vec::new(),
        }
    }
}

/// Aggregate of a full integrity pass.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    /// Entries examined.
    pub document_count: usize,
    /// Entries that failed validation or could not be decoded.
    pub invalid_documents: usize,
    /// Dependent file references that resolved (locally or as URLs).
    pub file_count: usize,
    /// Per-VLNV findings for the failing entries.
    pub errors: BTreeMap<Vlnv, Vec<String>>,
    /// Scan-time notices: duplicate identities and skipped files. Only
    /// populated by [`LibraryHandler::search_for_ipxact_files`].
    pub notices: Vec<LibraryError>,
}

/// The library engine's central authority: a VLNV-keyed map of document
/// entries with lazy read-through, write-through save, and change
/// notifications fanned out to one `mpsc` receiver.
pub struct LibraryHandler {
    entries: RwLock<BTreeMap<Vlnv, DocumentEntry>>,
    loader: LibraryLoader,
    validator: DocumentValidator,
    locations: Arc<dyn LocationsProvider>,
    event_tx: Sender<LibraryEvent>,
    save_in_progress: AtomicBool,
    pending_saves: Mutex<HashSet<PathBuf>>,
    scan_cancelled: AtomicBool,
}

impl LibraryHandler {
    pub fn new(locations: Arc<dyn LocationsProvider>, event_tx: Sender<LibraryEvent>) -> Self {
        LibraryHandler {
            entries: RwLock::new(BTreeMap::new()),
            loader: LibraryLoader,
            validator: DocumentValidator,
            locations,
            event_tx,
            save_in_progress: AtomicBool::new(false),
            pending_saves: Mutex::new(HashSet::new()),
            scan_cancelled: AtomicBool::new(false),
        }
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Exact-key lookup, kind tag included.
    pub fn contains(&self, vlnv: &Vlnv) -> bool {
        self.entries.read().contains_key(vlnv)
    }

    /// Whether any kind-variant of this identity is registered.
    pub fn contains_identity(&self, vlnv: &Vlnv) -> bool {
        self.resolve_identity(vlnv).is_some()
    }

    pub fn all_vlnvs(&self) -> Vec<Vlnv> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn get_path(&self, vlnv: &Vlnv) -> Option<PathBuf> {
        self.entries.read().get(vlnv).map(|entry| entry.path.clone())
    }

    pub fn get_directory_path(&self, vlnv: &Vlnv) -> Option<PathBuf> {
        self.get_path(vlnv)
            .and_then(|path| path.parent().map(Path::to_path_buf))
    }

    /// The registered kind of this identity, whatever kind tag the query
    /// carries.
    pub fn get_document_kind(&self, vlnv: &Vlnv) -> Option<DocumentKind> {
        self.resolve_identity(vlnv).map(|registered| registered.kind)
    }

    /// The cached validity flag. False for unknown or never-validated
    /// entries.
    pub fn is_valid(&self, vlnv: &Vlnv) -> bool {
        self.entries
            .read()
            .get(vlnv)
            .map(|entry| entry.is_valid)
            .unwrap_or(false)
    }

    /// The registered key matching this identity: the exact key when
    /// present, otherwise the first kind-variant of the same identity.
    fn resolve_identity(&self, vlnv: &Vlnv) -> Option<Vlnv> {
        let entries = self.entries.read();
        if entries.contains_key(vlnv) {
            return Some(vlnv.clone());
        }
        entries
            .range(vlnv.identity_range())
            .map(|(key, _)| key.clone())
            .next()
    }

    // -----------------------------------------------------------------
    // Model access
    // -----------------------------------------------------------------

    /// A deep clone of the document for free mutation by the caller. Lazily
    /// parses the backing file on first access.
    pub fn get_model(&self, vlnv: &Vlnv) -> Option<Document> {
        self.ensure_loaded(vlnv)
            .map(|shared| Document::clone(&shared))
    }

    /// The shared, immutable view for read-mostly consumers. No clone.
    pub fn get_model_read_only(&self, vlnv: &Vlnv) -> Option<Arc<Document>> {
        self.ensure_loaded(vlnv)
    }

    fn ensure_loaded(&self, vlnv: &Vlnv) -> Option<Arc<Document>> {
        {
            let entries = self.entries.read();
            match entries.get(vlnv) {
                None => {
                    tracing::error!("VLNV: {vlnv} was not found in the library");
                    return None;
                }
                Some(entry) => {
                    if let Some(document) = &entry.document {
                        return Some(document.clone());
                    }
                }
            }
        }
        self.reload_entry(vlnv, EventOrigin::Local, false)
    }

    /// Re-read the entry's file from disk, re-validate, and replace the
    /// cached state. A decode failure marks the entry invalid but keeps the
    /// identity and path registered.
    fn reload_entry(
        &self,
        vlnv: &Vlnv,
        origin: EventOrigin,
        notify: bool,
    ) -> Option<Arc<Document>> {
        let path = self.get_path(vlnv)?;
        match access::read_document(&path) {
            Ok(document) => {
                let (is_valid, errors) = self.validate_document(&document, &path);
                let shared = Arc::new(document);
                {
                    let mut entries = self.entries.write();
                    let entry = entries.get_mut(vlnv)?;
                    entry.document = Some(shared.clone());
                    entry.is_valid = is_valid;
                    entry.errors = errors;
                }
                if notify {
                    self.emit(LibraryEvent::Updated(vlnv.clone(), origin));
                }
                Some(shared)
            }
            Err(e) => {
                tracing::error!("Document {vlnv} in {:?} could not be read: {e}", path);
                let mut entries = self.entries.write();
                if let Some(entry) = entries.get_mut(vlnv) {
                    entry.document = None;
                    entry.is_valid = false;
                    entry.errors =
                        vec![format!("{vlnv}: File {} could not be read: {e}", path.display())];
                }
                None
            }
        }
    }

    /// Validation runs against a snapshot of the registered identities so the
    /// validator never re-enters the entry lock.
    fn validate_document(&self, document: &Document, path: &Path) -> (bool, Vec<String>) {
        if !path.exists() {
            return (
                false,
                vec![format!(
                    "{}: File {} for the document was not found",
                    document.vlnv(),
                    path.display()
                )],
            );
        }
        let known: HashSet<Vlnv> = self.entries.read().keys().cloned().collect();
        let errors = self.validator.find_errors(document, path, &known);
        (errors.is_empty(), errors)
    }

    /// The cached findings for this entry, loading and validating first if
    /// the entry was never parsed.
    pub fn find_errors(&self, vlnv: &Vlnv) -> Vec<String> {
        let _ = self.ensure_loaded(vlnv);
        self.entries
            .read()
            .get(vlnv)
            .map(|entry| entry.errors.clone())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------
    // Registration and persistence
    // -----------------------------------------------------------------

    /// Register a document already persisted at `path` without writing.
    pub fn add_object(&self, document: Document, path: PathBuf) -> Result<(), LibraryError> {
        let vlnv = document.vlnv().clone();
        if self.contains(&vlnv) {
            return Err(LibraryError::AlreadyExists(vlnv.to_string()));
        }
        let (is_valid, errors) = self.validate_document(&document, &path);
        self.entries.write().insert(
            vlnv.clone(),
            DocumentEntry {
                path,
                document: Some(Arc::new(document)),
                is_valid,
                errors,
            },
        );
        self.emit(LibraryEvent::Added(vlnv, EventOrigin::Local));
        Ok(())
    }

    /// Persist a **new** document under `directory`, using the canonical
    /// `name.version.xml` file name. Fails without side effects when the
    /// VLNV is already registered or the directory cannot be created.
    pub fn write_model_to_file(
        &self,
        model: &Document,
        directory: &Path,
    ) -> Result<PathBuf, LibraryError> {
        let vlnv = model.vlnv().clone();
        if self.contains(&vlnv) {
            return Err(LibraryError::AlreadyExists(vlnv.to_string()));
        }
        fs::create_dir_all(directory).map_err(|e| {
            LibraryError::Io(format!(
                "Could not create directory {:?}: {e}",
                directory
            ))
        })?;
        let path = directory.join(format!("{}.{}.xml", vlnv.name, vlnv.version));
        access::write_document(model, &path)?;
        self.record_save(&path);

        let (is_valid, errors) = self.validate_document(model, &path);
        self.entries.write().insert(
            vlnv.clone(),
            DocumentEntry {
                path: path.clone(),
                document: Some(Arc::new(model.clone())),
                is_valid,
                errors,
            },
        );
        self.emit(LibraryEvent::Added(vlnv, EventOrigin::Local));
        Ok(path)
    }

    /// Overwrite the persisted file of an **already registered** VLNV, then
    /// re-read it from disk so the cached state reflects the stored bytes.
    /// No automatic backup; the previous content is gone.
    ///
    /// Attempting to overwrite-save an unregistered VLNV is a caller logic
    /// error and is rejected.
    pub fn write_model(&self, model: &Document) -> Result<(), LibraryError> {
        let vlnv = model.vlnv().clone();
        let path = self
            .get_path(&vlnv)
            .ok_or_else(|| LibraryError::NotFound(format!("VLNV {vlnv} is not registered")))?;
        access::write_document(model, &path)?;
        self.record_save(&path);

        if self.save_in_progress.load(Ordering::Acquire) {
            // Deferred: end_save() runs one consolidated resynchronization.
            tracing::debug!("Save window open, deferring re-validation of {vlnv}");
        } else {
            self.reload_entry(&vlnv, EventOrigin::Local, true);
        }
        Ok(())
    }

    /// Should be called every time an object is written to disk outside the
    /// write methods, so views and validity stay current.
    pub fn on_item_saved(&self, vlnv: &Vlnv) {
        if self.save_in_progress.load(Ordering::Acquire) {
            if let Some(path) = self.get_path(vlnv) {
                self.pending_saves.lock().insert(path);
            }
            return;
        }
        self.reload_entry(vlnv, EventOrigin::Local, true);
    }

    // -----------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------

    /// Unregister the VLNV and delete its backing file. Dependents are not
    /// cascaded; their dangling references surface on the next integrity
    /// pass.
    pub fn remove_object(&self, vlnv: &Vlnv) -> bool {
        let Some(registered) = self.resolve_identity(vlnv) else {
            return false;
        };
        let Some(entry) = self.entries.write().remove(&registered) else {
            return false;
        };
        if let Err(e) = fs::remove_file(&entry.path) {
            tracing::error!(
                "File {:?} could not be removed from the file system: {e}",
                entry.path
            );
        }
        self.emit(LibraryEvent::Removed(registered, EventOrigin::Local));
        true
    }

    /// Remove several objects, then sweep their emptied directories up to the
    /// library roots.
    pub fn remove_objects(&self, vlnvs: &[Vlnv]) {
        let mut changed_directories = Vec::new();
        let mut removed = 0usize;
        for vlnv in vlnvs {
            if let Some(directory) = self.get_directory_path(vlnv) {
                if !changed_directories.contains(&directory) {
                    changed_directories.push(directory);
                }
            }
            if self.remove_object(vlnv) {
                removed += 1;
            }
        }
        let roots = self.locations.get_locations().unwrap_or_default();
        self.loader.clean(&changed_directories, &roots);
        tracing::info!("Deleted {removed} VLNV item(s)");
    }

    // -----------------------------------------------------------------
    // Scan and integrity
    // -----------------------------------------------------------------

    /// Full resynchronization: clear the cache, re-scan every configured
    /// location, re-validate everything, signal a reset. O(library size) by
    /// design; meant for user-triggered rescans, not steady-state use.
    ///
    /// Rejected while a save window is open; retry after `end_save`.
    pub fn search_for_ipxact_files(&self) -> Result<IntegrityReport, LibraryError> {
        if self.save_in_progress.load(Ordering::Acquire) {
            return Err(LibraryError::SaveInProgress);
        }
        self.scan_cancelled.store(false, Ordering::Release);

        tracing::info!("Scanning library...");
        let locations = self.locations.get_locations()?;
        let outcome = self.loader.scan(&locations, &self.scan_cancelled);
        {
            let mut entries = self.entries.write();
            entries.clear();
            for target in outcome.targets {
                entries.insert(target.vlnv, DocumentEntry::path_only(target.path));
            }
        }

        let mut report = self.check_library_integrity();
        report.notices.extend(outcome.duplicates);
        report
            .notices
            .extend(outcome.skipped.into_iter().map(|(_, e)| e));
        self.emit(LibraryEvent::Reset);
        Ok(report)
    }

    /// Abandon an in-flight [`Self::search_for_ipxact_files`] between files.
    pub fn cancel_scan(&self) {
        self.scan_cancelled.store(true, Ordering::Release);
    }

    /// Re-read and re-validate every entry, aggregating pass/fail counts.
    /// Run after bulk external changes rather than per access.
    pub fn check_library_integrity(&self) -> IntegrityReport {
        tracing::info!("Validating library items...");
        let mut report = IntegrityReport::default();
        for vlnv in self.all_vlnvs() {
            report.document_count += 1;
            if let Some(document) = self.reload_entry(&vlnv, EventOrigin::Local, false) {
                if let Some(path) = self.get_path(&vlnv) {
                    report.file_count += resolved_file_count(&document, &path);
                }
            }
            let entries = self.entries.read();
            if let Some(entry) = entries.get(&vlnv) {
                if !entry.is_valid {
                    report.invalid_documents += 1;
                    report.errors.insert(vlnv.clone(), entry.errors.clone());
                }
            }
        }

        tracing::info!("========== Library integrity check complete ==========");
        tracing::info!("Total library object count: {}", report.document_count);
        tracing::info!("Total file count in the library: {}", report.file_count);
        if report.invalid_documents > 0 {
            tracing::error!("Total items containing errors: {}", report.invalid_documents);
        }
        report
    }

    // -----------------------------------------------------------------
    // Dependencies
    // -----------------------------------------------------------------

    /// The transitive closure of dependency VLNVs reachable from `vlnv`,
    /// including the root itself. Cycle-safe through a visited set; result
    /// order is traversal order, without duplicates.
    pub fn get_needed_vlnvs(&self, vlnv: &Vlnv) -> Vec<Vlnv> {
        let mut collected = Vec::new();
        let mut visited = HashSet::new();
        self.collect_needed(vlnv, &mut collected, &mut visited);
        collected
    }

    fn collect_needed(
        &self,
        vlnv: &Vlnv,
        collected: &mut Vec<Vlnv>,
        visited: &mut HashSet<Vlnv>,
    ) {
        let Some(registered) = self.resolve_identity(vlnv) else {
            tracing::error!("No item with following info was found in library: {vlnv}");
            return;
        };
        if !visited.insert(registered.clone()) {
            return;
        }
        let Some(document) = self.get_model_read_only(&registered) else {
            return;
        };
        collected.push(registered);
        for dependent in document.dependent_vlnvs() {
            self.collect_needed(&dependent, collected, visited);
        }
    }

    /// The direct (non-transitive) file dependencies of one document,
    /// resolved to absolute, existing, de-duplicated paths. URL references
    /// are external and excluded.
    pub fn get_dependency_files(&self, vlnv: &Vlnv) -> Vec<PathBuf> {
        let Some(document) = self.get_model_read_only(vlnv) else {
            return Vec::new();
        };
        let Some(document_path) = self.get_path(vlnv) else {
            return Vec::new();
        };

        let mut files = Vec::new();
        for reference in document.dependent_files() {
            if is_url_reference(&reference) {
                continue;
            }
            let absolute = absolute_from(&document_path, &reference);
            if !absolute.is_file() {
                continue;
            }
            let resolved = fs::canonicalize(&absolute).unwrap_or(absolute);
            if !files.contains(&resolved) {
                files.push(resolved);
            }
        }
        files
    }

    /// Chase a hierarchical reference to the design it denotes: a design
    /// reference is returned as-is, a design configuration is dereferenced
    /// through its design reference.
    pub fn design_vlnv(&self, hierarchy_ref: &Vlnv) -> Option<Vlnv> {
        match self.get_document_kind(hierarchy_ref) {
            Some(DocumentKind::Design) => {
                Some(hierarchy_ref.with_kind(DocumentKind::Design))
            }
            Some(DocumentKind::DesignConfiguration) => {
                let registered = self
                    .resolve_identity(hierarchy_ref)?
                    .with_kind(DocumentKind::DesignConfiguration);
                let document = self.get_model_read_only(&registered)?;
                let Document::DesignConfiguration(configuration) = document.as_ref() else {
                    return None;
                };
                let design_ref = configuration.design_ref.clone()?;
                if self.get_document_kind(&design_ref) == Some(DocumentKind::Design) {
                    Some(design_ref.with_kind(DocumentKind::Design))
                } else {
                    tracing::error!("VLNV: {design_ref} was not found in the library");
                    None
                }
            }
            Some(_) => {
                tracing::error!("VLNV: {hierarchy_ref} was not valid hierarchical reference");
                None
            }
            None => {
                tracing::error!("VLNV: {hierarchy_ref} was not found in the library");
                None
            }
        }
    }

    /// The design document behind a hierarchical reference, as a mutable
    /// clone.
    pub fn design(&self, hierarchy_ref: &Vlnv) -> Option<Document> {
        let design_vlnv = self.design_vlnv(hierarchy_ref)?;
        self.get_model(&design_vlnv)
    }

    // -----------------------------------------------------------------
    // Save windows
    // -----------------------------------------------------------------

    /// Open a scoped suppression window: until [`Self::end_save`], watcher
    /// notifications for paths written through this handler are ignored and
    /// re-validation of written entries is deferred.
    pub fn begin_save(&self) {
        self.save_in_progress.store(true, Ordering::Release);
    }

    /// Close the save window. If any writes happened inside the window, runs
    /// exactly one consolidated resynchronization over the written entries.
    pub fn end_save(&self) {
        self.save_in_progress.store(false, Ordering::Release);
        let pending: Vec<PathBuf> = self.pending_saves.lock().drain().collect();
        if pending.is_empty() {
            return;
        }
        tracing::info!(
            "Save window closed, resynchronizing {} written document(s)",
            pending.len()
        );
        let mut synced = HashSet::new();
        for path in pending {
            if let Some(vlnv) = self.vlnv_for_path(&path) {
                if synced.insert(vlnv.clone()) {
                    self.reload_entry(&vlnv, EventOrigin::Local, true);
                }
            }
        }
    }

    fn record_save(&self, path: &Path) {
        if self.save_in_progress.load(Ordering::Acquire) {
            let mut pending = self.pending_saves.lock();
            // Watcher notifications may carry the canonical form of the path.
            if let Ok(canonical) = fs::canonicalize(path) {
                pending.insert(canonical);
            }
            pending.insert(path.to_path_buf());
        }
    }

    /// Whether a watcher notification for this path belongs to a write this
    /// handler performed inside the open save window.
    pub fn is_save_suppressed(&self, path: &Path) -> bool {
        if !self.save_in_progress.load(Ordering::Acquire) {
            return false;
        }
        let pending = self.pending_saves.lock();
        pending.contains(path)
            || fs::canonicalize(path)
                .map(|canonical| pending.contains(&canonical))
                .unwrap_or(false)
    }

    // -----------------------------------------------------------------
    // File-watch reconciliation
    // -----------------------------------------------------------------

    /// The registered VLNV backed by `path`, if any.
    pub fn vlnv_for_path(&self, path: &Path) -> Option<Vlnv> {
        let entries = self.entries.read();
        if let Some((vlnv, _)) = entries.iter().find(|(_, entry)| entry.path == path) {
            return Some(vlnv.clone());
        }
        // Watcher paths may be canonicalized differently than scan paths.
        let canonical = fs::canonicalize(path).ok()?;
        entries
            .iter()
            .find(|(_, entry)| {
                fs::canonicalize(&entry.path)
                    .map(|entry_canonical| entry_canonical == canonical)
                    .unwrap_or(false)
            })
            .map(|(vlnv, _)| vlnv.clone())
    }

    /// Reconcile an external create/modify notification: re-read a known
    /// entry, or register a newcomer.
    pub fn on_file_changed(&self, path: &Path) {
        if self.is_save_suppressed(path) {
            tracing::debug!("Ignoring self-inflicted change notification for {:?}", path);
            return;
        }
        if let Some(vlnv) = self.vlnv_for_path(path) {
            tracing::debug!("External change detected for {vlnv}");
            self.reload_entry(&vlnv, EventOrigin::External, true);
            return;
        }
        match access::extract_vlnv(path) {
            Ok(vlnv) => {
                if self.contains(&vlnv) {
                    tracing::info!("VLNV {vlnv} was already found in the library");
                    return;
                }
                tracing::debug!("External document appeared: {vlnv} at {:?}", path);
                self.entries
                    .write()
                    .insert(vlnv.clone(), DocumentEntry::path_only(path.to_path_buf()));
                self.reload_entry(&vlnv, EventOrigin::External, false);
                self.emit(LibraryEvent::Added(vlnv, EventOrigin::External));
            }
            Err(e) => {
                tracing::warn!("Ignoring change to unidentifiable file {:?}: {e}", path);
            }
        }
    }

    /// Reconcile an external removal notification. The watcher re-checks
    /// existence after its debounce grace, and this checks once more, so an
    /// atomic-save replace does not unregister the entry.
    pub fn on_file_missing(&self, path: &Path) {
        if path.exists() {
            return;
        }
        if let Some(vlnv) = self.vlnv_for_path(path) {
            tracing::info!("Backing file disappeared, unregistering {vlnv}");
            self.entries.write().remove(&vlnv);
            self.emit(LibraryEvent::Removed(vlnv, EventOrigin::External));
        }
    }

    /// The configured root locations, as the synchronizer needs them.
    pub fn locations(&self) -> Vec<PathBuf> {
        self.locations.get_locations().unwrap_or_default()
    }

    fn emit(&self, event: LibraryEvent) {
        if let Err(e) = self.event_tx.send(event) {
            tracing::debug!("{}", LibraryError::from(e));
        }
    }
}

impl DocumentStore for LibraryHandler {
    fn contains_reference(&self, vlnv: &Vlnv) -> bool {
        self.contains_identity(vlnv)
    }
}

fn resolved_file_count(document: &Document, document_path: &Path) -> usize {
    document
        .dependent_files()
        .iter()
        .filter(|reference| {
            is_url_reference(reference) || absolute_from(document_path, reference).is_file()
        })
        .count()
}
