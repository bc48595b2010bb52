//! Scanning library root directories for IP-XACT files.
//!
//! The loader only establishes identity↔path mappings; it never validates
//! document content. A file it cannot read or identify is skipped with a
//! diagnostic, never fatal to the scan.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use walkdir::WalkDir;

use crate::access;
use crate::error::LibraryError;
use crate::vlnv::Vlnv;

/// File extension of IP-XACT documents.
pub const DOCUMENT_EXTENSION: &str = "xml";

/// One identity↔path mapping found during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTarget {
    pub vlnv: Vlnv,
    pub path: PathBuf,
}

/// Everything a scan produced: the surviving mappings plus the diagnostics
/// for files that were skipped or shadowed.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub targets: Vec<DocumentTarget>,
    /// Files whose VLNV could not be extracted, with the reason.
    pub skipped: Vec<(PathBuf, LibraryError)>,
    /// Second and later sightings of an already-mapped VLNV. First-seen wins.
    pub duplicates: Vec<LibraryError>,
}

#[derive(Debug, Default)]
pub struct LibraryLoader;

impl LibraryLoader {
    /// Recursively walk each root location, probing every `.xml` file for its
    /// VLNV. Duplicate identities keep the first-seen path.
    ///
    /// `cancel` is checked once per file so a user-triggered full rescan can
    /// be abandoned mid-flight; a cancelled scan returns what it had found.
    pub fn scan(&self, locations: &[PathBuf], cancel: &AtomicBool) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let mut seen: BTreeMap<Vlnv, PathBuf> = BTreeMap::new();

        for location in locations {
            tracing::debug!("Scanning library location {:?}", location);
            for entry in WalkDir::new(location)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable directory entry: {e}");
                        None
                    }
                })
            {
                if cancel.load(Ordering::Relaxed) {
                    tracing::info!("Library scan cancelled");
                    return outcome;
                }

                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXTENSION)
                {
                    continue;
                }

                match access::extract_vlnv(path) {
                    Ok(vlnv) => {
                        if let Some(existing) = seen.get(&vlnv) {
                            let notice = LibraryError::DuplicateVlnv {
                                vlnv: vlnv.to_string(),
                                existing: existing.display().to_string(),
                                duplicate: path.display().to_string(),
                            };
                            tracing::info!("{notice}");
                            outcome.duplicates.push(notice);
                        } else {
                            seen.insert(vlnv.clone(), path.to_path_buf());
                            outcome.targets.push(DocumentTarget {
                                vlnv,
                                path: path.to_path_buf(),
                            });
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Skipping {:?}: {e}", path);
                        outcome.skipped.push((path.to_path_buf(), e));
                    }
                }
            }
        }

        tracing::info!(
            "Library scan found {} documents ({} skipped, {} duplicates)",
            outcome.targets.len(),
            outcome.skipped.len(),
            outcome.duplicates.len()
        );
        outcome
    }

    /// Remove directories emptied by document deletion, walking upward from
    /// each changed directory toward the library roots. Stops at the first
    /// non-empty directory, and never removes a configured root itself.
    pub fn clean(&self, changed_directories: &[PathBuf], roots: &[PathBuf]) {
        for directory in changed_directories {
            let mut current = directory.clone();
            loop {
                if roots.iter().any(|root| *root == current) {
                    break;
                }
                match fs::read_dir(&current) {
                    Ok(mut entries) => {
                        if entries.next().is_some() {
                            break;
                        }
                        if let Err(e) = fs::remove_dir(&current) {
                            tracing::warn!("Could not remove empty directory {:?}: {e}", current);
                            break;
                        }
                        tracing::debug!("Removed empty library directory {:?}", current);
                    }
                    // Already gone, its parent may be empty now.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(_) => break,
                }
                match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                }
            }
        }
    }
}

/// Resolve a possibly-relative reference against the directory of `base`.
pub fn absolute_from(base: &Path, reference: &str) -> PathBuf {
    let reference_path = Path::new(reference);
    if reference_path.is_absolute() {
        reference_path.to_path_buf()
    } else {
        base.parent()
            .map(|dir| dir.join(reference_path))
            .unwrap_or_else(|| reference_path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BusDefinition, Document, DocumentMeta};
    use crate::vlnv::DocumentKind;
    use tempfile::TempDir;

    fn write_bus(dir: &Path, name: &str, version: &str) -> PathBuf {
        let vlnv = Vlnv::new(DocumentKind::BusDefinition, "v", "l", name, version);
        let document = Document::BusDefinition(BusDefinition {
            meta: DocumentMeta::new(vlnv),
            ..Default::default()
        });
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(format!("{name}.{version}.xml"));
        access::write_document(&document, &path).unwrap();
        path
    }

    #[test]
    fn scan_finds_nested_documents() {
        let root = TempDir::new().unwrap();
        write_bus(&root.path().join("v/l/ahb/1.0"), "ahb", "1.0");
        write_bus(&root.path().join("v/l/axi/1.0"), "axi", "1.0");
        fs::write(root.path().join("notes.txt"), "not xml").unwrap();

        let outcome = LibraryLoader.scan(
            &[root.path().to_path_buf()],
            &AtomicBool::new(false),
        );
        assert_eq!(outcome.targets.len(), 2);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn duplicate_vlnv_keeps_first_seen() {
        let root = TempDir::new().unwrap();
        write_bus(&root.path().join("a"), "ahb", "1.0");
        write_bus(&root.path().join("b"), "ahb", "1.0");

        let outcome = LibraryLoader.scan(
            &[root.path().to_path_buf()],
            &AtomicBool::new(false),
        );
        assert_eq!(outcome.targets.len(), 1);
        assert_eq!(outcome.duplicates.len(), 1);
    }

    #[test]
    fn malformed_file_is_skipped_not_fatal() {
        let root = TempDir::new().unwrap();
        write_bus(root.path(), "ahb", "1.0");
        fs::write(root.path().join("broken.xml"), "<not-closed").unwrap();

        let outcome = LibraryLoader.scan(
            &[root.path().to_path_buf()],
            &AtomicBool::new(false),
        );
        assert_eq!(outcome.targets.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
    }

    #[test]
    fn cancelled_scan_stops_early() {
        let root = TempDir::new().unwrap();
        write_bus(root.path(), "ahb", "1.0");

        let cancel = AtomicBool::new(true);
        let outcome = LibraryLoader.scan(&[root.path().to_path_buf()], &cancel);
        assert!(outcome.targets.is_empty());
    }

    #[test]
    fn clean_stops_at_root_and_non_empty() {
        let root = TempDir::new().unwrap();
        let deep = root.path().join("v/l/cpu/1.0");
        fs::create_dir_all(&deep).unwrap();
        let sibling = root.path().join("v/other.xml");
        fs::write(&sibling, "x").unwrap();

        LibraryLoader.clean(&[deep.clone()], &[root.path().to_path_buf()]);

        assert!(!deep.exists());
        assert!(!root.path().join("v/l").exists());
        // "v" still holds other.xml, so it survives.
        assert!(root.path().join("v").exists());
        assert!(root.path().exists());
    }
}
