//! Structural and referential validation of documents against the library.
//!
//! Validation is a pure query: it never mutates the document or the cache it
//! consults. Structural rules are kind-specific schema-shape checks; the
//! three cross-cutting checks (dependent VLNVs registered, dependent
//! directories present, dependent files present or URL-form) run against the
//! whole cache through the [`DocumentStore`] seam.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::document::Document;
use crate::error::LibraryError;
use crate::loader::absolute_from;
use crate::vlnv::Vlnv;

/// The validator's read-only view of the cache. Implemented by
/// [`crate::library::LibraryHandler`]; tests substitute simple sets.
pub trait DocumentStore {
    /// Whether any kind-variant of this identity is registered. Reference
    /// resolution is kind-agnostic because a referrer does not always know
    /// the kind of the document it points at.
    fn contains_reference(&self, vlnv: &Vlnv) -> bool;
}

impl DocumentStore for HashSet<Vlnv> {
    fn contains_reference(&self, vlnv: &Vlnv) -> bool {
        self.iter().any(|candidate| candidate.same_identity(vlnv))
    }
}

/// Recognizes strings that are meant as URLs (scheme followed by `://`), as
/// opposed to filesystem paths.
static URL_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://").expect("valid url regex"));

/// Token alphabet accepted in parameter value expressions. Well-formedness
/// only; no evaluation.
static EXPRESSION_ALPHABET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w \t()+\-*/%<>=!&|,.'$\x5B\x5D]*$").expect("valid expression regex"));

/// Whether a dependent-file reference is URL-form rather than a filesystem
/// path.
pub fn is_url_reference(value: &str) -> bool {
    URL_IDENTIFIER.is_match(value)
}

/// A parameter value is well formed when it stays inside the accepted token
/// alphabet and its parentheses balance.
pub fn expression_is_well_formed(value: &str) -> bool {
    if !EXPRESSION_ALPHABET.is_match(value) {
        return false;
    }
    let mut depth: i32 = 0;
    for ch in value.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[derive(Debug, Default)]
pub struct DocumentValidator;

impl DocumentValidator {
    /// True when the document passes every structural rule and all three
    /// cross-cutting checks.
    pub fn validate(&self, document: &Document, path: &Path, store: &dyn DocumentStore) -> bool {
        self.find_errors(document, path, store).is_empty()
    }

    /// Every rule violation as a human-readable message, tagged with the
    /// offending document's VLNV. Structural findings come first, then
    /// dangling VLNV references, missing directories, missing files.
    pub fn find_errors(
        &self,
        document: &Document,
        path: &Path,
        store: &dyn DocumentStore,
    ) -> Vec<String> {
        let vlnv = document.vlnv();
        let mut errors = Vec::new();
        let mut report = |message: String| errors.push(format!("{vlnv}: {message}"));

        self.find_structure_errors(document, &mut report);

        for reference in document.dependent_vlnvs() {
            if !store.contains_reference(&reference) {
                report(
                    LibraryError::Referential {
                        owner: vlnv.to_string(),
                        reference: reference.to_string(),
                    }
                    .to_string(),
                );
            }
        }

        for directory in document.dependent_dirs() {
            let resolved = absolute_from(path, &directory);
            if !resolved.is_dir() {
                report(format!(
                    "Directory {directory} was not found in the file system"
                ));
            }
        }

        for file in document.dependent_files() {
            if is_url_reference(&file) {
                // External URLs cannot be checked locally; only syntax counts.
                if Url::parse(&file).is_err() {
                    report(format!("URL {file} was not valid"));
                }
            } else if !absolute_from(path, &file).is_file() {
                report(format!("File {file} was not found in the file system"));
            }
        }

        errors
    }

    fn find_structure_errors(&self, document: &Document, report: &mut dyn FnMut(String)) {
        if !document.vlnv().is_valid() {
            report("Document identity is incomplete".to_string());
        }

        let mut parameter_names = HashSet::new();
        for parameter in &document.meta().parameters {
            if !parameter_names.insert(parameter.name.clone()) {
                report(format!("Parameter name '{}' is not unique", parameter.name));
            }
            if !expression_is_well_formed(&parameter.value) {
                report(format!(
                    "Parameter '{}' value '{}' is not a well-formed expression",
                    parameter.name, parameter.value
                ));
            }
        }

        match document {
            Document::BusDefinition(_) => {}
            Document::AbstractionDefinition(d) => {
                if d.bus_type.is_none() {
                    report("Abstraction definition has no bus type reference".to_string());
                }
                check_unique_names(
                    d.ports.iter().map(|p| p.logical_name.as_str()),
                    "Logical port",
                    report,
                );
            }
            Document::Component(d) => {
                check_unique_names(
                    d.bus_interfaces.iter().map(|b| b.name.as_str()),
                    "Bus interface",
                    report,
                );
                check_unique_names(d.views.iter().map(|v| v.name.as_str()), "View", report);
                check_unique_names(
                    d.file_sets.iter().map(|f| f.name.as_str()),
                    "File set",
                    report,
                );
            }
            Document::Design(d) => {
                check_unique_names(
                    d.instances.iter().map(|i| i.instance_name.as_str()),
                    "Component instance",
                    report,
                );
                for instance in &d.instances {
                    if !instance.component_ref.is_valid() {
                        report(format!(
                            "Component instance '{}' has an incomplete component reference",
                            instance.instance_name
                        ));
                    }
                }
            }
            Document::DesignConfiguration(d) => {
                if d.design_ref.is_none() {
                    report("Design configuration has no design reference".to_string());
                }
            }
            Document::Catalog(d) => {
                for file in &d.files {
                    if !file.vlnv.is_valid() {
                        report(format!(
                            "Catalog entry '{}' has an incomplete VLNV",
                            file.path
                        ));
                    }
                    if file.path.is_empty() {
                        report(format!("Catalog entry {} has no file location", file.vlnv));
                    }
                }
            }
            Document::ApiDefinition(d) => {
                check_unique_names(
                    d.data_types.iter().map(String::as_str),
                    "Data type",
                    report,
                );
            }
            Document::ComDefinition(d) => {
                check_unique_names(
                    d.transfer_types.iter().map(String::as_str),
                    "Transfer type",
                    report,
                );
                check_unique_names(
                    d.properties.iter().map(|p| p.name.as_str()),
                    "Property",
                    report,
                );
            }
        }
    }
}

fn check_unique_names<'a>(
    names: impl Iterator<Item = &'a str>,
    label: &str,
    report: &mut dyn FnMut(String),
) {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            report(format!("{label} with an empty name"));
        } else if !seen.insert(name) {
            report(format!("{label} name '{name}' is not unique"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        BusInterface, Component, ComponentInstance, Design, DocumentMeta, FileSet, Parameter,
    };
    use crate::vlnv::DocumentKind;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn component_vlnv() -> Vlnv {
        Vlnv::new(DocumentKind::Component, "v", "l", "cpu", "1.0")
    }

    #[test]
    fn expression_well_formedness() {
        assert!(expression_is_well_formed("8"));
        assert!(expression_is_well_formed("8*(2+width)"));
        assert!(expression_is_well_formed(""));
        assert!(!expression_is_well_formed("8*(2+width"));
        assert!(!expression_is_well_formed("8)+("));
        assert!(!expression_is_well_formed("value; drop"));
    }

    #[test]
    fn dangling_reference_is_reported_with_vlnv() {
        let bus = Vlnv::new(DocumentKind::BusDefinition, "v", "l", "missing_bus", "1.0");
        let document = Document::Component(Component {
            meta: DocumentMeta::new(component_vlnv()),
            bus_interfaces: vec![BusInterface {
                name: "bus_if".into(),
                bus_type: bus.clone(),
                abstraction_ref: None,
            }],
            views: vec![],
            file_sets: vec![],
        });

        let store = HashSet::new();
        let validator = DocumentValidator;
        let errors = validator.find_errors(&document, &PathBuf::from("/tmp/cpu.xml"), &store);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(&bus.to_string()));
        assert!(!validator.validate(&document, &PathBuf::from("/tmp/cpu.xml"), &store));

        let mut store = HashSet::new();
        store.insert(bus);
        assert!(validator.validate(&document, &PathBuf::from("/tmp/cpu.xml"), &store));
    }

    #[test]
    fn reference_resolution_ignores_kind_tag() {
        let design_ref = Vlnv::new(DocumentKind::Design, "v", "l", "top", "1.0");
        let mut store = HashSet::new();
        // Registered under a different kind tag: still the same identity.
        store.insert(design_ref.with_kind(DocumentKind::DesignConfiguration));
        assert!(store.contains_reference(&design_ref));
    }

    #[test]
    fn urls_accepted_files_checked() {
        let dir = TempDir::new().unwrap();
        let doc_path = dir.path().join("cpu.xml");
        std::fs::write(dir.path().join("present.v"), "module m; endmodule").unwrap();

        let component = |files: Vec<String>| {
            Document::Component(Component {
                meta: DocumentMeta::new(component_vlnv()),
                bus_interfaces: vec![],
                views: vec![],
                file_sets: vec![FileSet {
                    name: "rtl".into(),
                    files,
                    dependencies: vec![],
                }],
            })
        };

        let validator = DocumentValidator;
        let store = HashSet::new();
        assert!(validator.validate(
            &component(vec!["present.v".into(), "https://example.com/ip.v".into()]),
            &doc_path,
            &store
        ));
        let errors =
            validator.find_errors(&component(vec!["absent.v".into()]), &doc_path, &store);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("absent.v"));
    }

    #[test]
    fn duplicate_instance_names_are_structural_errors() {
        let component_ref = component_vlnv();
        let design = Document::Design(Design {
            meta: DocumentMeta::new(Vlnv::new(DocumentKind::Design, "v", "l", "top", "1.0")),
            instances: vec![
                ComponentInstance {
                    instance_name: "u0".into(),
                    component_ref: component_ref.clone(),
                },
                ComponentInstance {
                    instance_name: "u0".into(),
                    component_ref: component_ref.clone(),
                },
            ],
        });

        let mut store = HashSet::new();
        store.insert(component_ref);
        let errors =
            DocumentValidator.find_errors(&design, &PathBuf::from("/tmp/top.xml"), &store);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("u0"));
    }

    #[test]
    fn malformed_parameter_expressions_are_reported() {
        let document = Document::Component(Component {
            meta: DocumentMeta {
                vlnv: component_vlnv(),
                description: None,
                parameters: vec![Parameter {
                    name: "width".into(),
                    value: "8*(2".into(),
                }],
            },
            bus_interfaces: vec![],
            views: vec![],
            file_sets: vec![],
        });
        let errors = DocumentValidator.find_errors(
            &document,
            &PathBuf::from("/tmp/cpu.xml"),
            &HashSet::new(),
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("width"));
    }
}
