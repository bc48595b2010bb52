//! Integration tests for scan, validation, and dependency traversal over a
//! real on-disk library.

mod common;

use std::collections::HashSet;

use ipxact_library::vlnv::DocumentKind;
use tempfile::TempDir;
use test_log::test;

use common::*;

#[test]
fn referential_integrity_flips_with_registration() {
    let root = TempDir::new().unwrap();
    let bus = vlnv(DocumentKind::BusDefinition, "bus1");
    let component = component_referencing("comp1", &bus);
    write_doc(root.path(), &component);

    let (handler, _rx) = new_library(root.path());
    let report = handler.search_for_ipxact_files().unwrap();

    // Bus1 is absent: Comp1 must be invalid with one dangling-reference
    // finding naming it.
    let comp_vlnv = component.vlnv();
    assert_eq!(report.invalid_documents, 1);
    assert!(!handler.is_valid(comp_vlnv));
    let errors = handler.find_errors(comp_vlnv);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains(&bus.to_string()));

    // Register the missing bus definition and re-validate.
    let bus_document = bus_definition("bus1");
    let bus_path = write_doc(root.path(), &bus_document);
    handler.add_object(bus_document, bus_path).unwrap();

    let report = handler.check_library_integrity();
    assert_eq!(report.invalid_documents, 0);
    assert!(handler.is_valid(comp_vlnv));
    assert!(handler.find_errors(comp_vlnv).is_empty());
}

#[test]
fn removal_does_not_cascade() {
    let root = TempDir::new().unwrap();
    let bus = vlnv(DocumentKind::BusDefinition, "bus1");
    let component = component_referencing("comp1", &bus);
    write_doc(root.path(), &component);
    write_doc(root.path(), &bus_definition("bus1"));

    let (handler, _rx) = new_library(root.path());
    let report = handler.search_for_ipxact_files().unwrap();
    assert_eq!(report.document_count, 2);
    assert_eq!(report.invalid_documents, 0);

    // Removing the referenced bus leaves the component registered.
    assert!(handler.remove_object(&bus));
    assert!(!handler.contains(&bus));
    assert!(handler.contains(component.vlnv()));

    // The next integrity pass flags the now-dangling reference.
    let report = handler.check_library_integrity();
    assert_eq!(report.invalid_documents, 1);
    assert!(!handler.is_valid(component.vlnv()));
    assert!(report.errors[component.vlnv()]
        .iter()
        .any(|error| error.contains(&bus.to_string())));
}

#[test]
fn dependency_closure_tolerates_cycles() {
    let root = TempDir::new().unwrap();
    let a = vlnv(DocumentKind::Catalog, "cat_a");
    let b = vlnv(DocumentKind::Catalog, "cat_b");
    let c = vlnv(DocumentKind::Catalog, "cat_c");

    // A -> B -> C -> A
    write_doc(root.path(), &catalog("cat_a", &[(b.clone(), "cat_b.1.0.xml")]));
    write_doc(root.path(), &catalog("cat_b", &[(c.clone(), "cat_c.1.0.xml")]));
    write_doc(root.path(), &catalog("cat_c", &[(a.clone(), "cat_a.1.0.xml")]));

    let (handler, _rx) = new_library(root.path());
    let report = handler.search_for_ipxact_files().unwrap();
    assert_eq!(report.invalid_documents, 0);

    let needed = handler.get_needed_vlnvs(&a);
    let unique: HashSet<_> = needed.iter().cloned().collect();
    assert_eq!(needed.len(), 3, "no duplicates in {needed:?}");
    assert_eq!(unique, HashSet::from([a, b, c]));
}

#[test]
fn duplicate_vlnv_keeps_one_entry() {
    let root = TempDir::new().unwrap();
    let first = bus_definition("bus1");
    let mut second = bus_definition("bus1");
    if let ipxact_library::document::Document::BusDefinition(bus) = &mut second {
        bus.meta.description = Some("same identity, different content".to_string());
    }
    write_doc(&root.path().join("a"), &first);
    write_doc(&root.path().join("b"), &second);

    let (handler, _rx) = new_library(root.path());
    let report = handler.search_for_ipxact_files().unwrap();

    assert_eq!(report.document_count, 1);
    assert_eq!(handler.all_vlnvs().len(), 1);
    let duplicates: Vec<_> = report
        .notices
        .iter()
        .filter(|notice| matches!(notice, ipxact_library::LibraryError::DuplicateVlnv { .. }))
        .collect();
    assert_eq!(duplicates.len(), 1);
}

#[test]
fn lazy_load_reads_the_file_once() {
    let root = TempDir::new().unwrap();
    let bus = bus_definition("bus1");
    let path = write_doc(root.path(), &bus);

    let (handler, _rx) = new_library(root.path());
    handler.search_for_ipxact_files().unwrap();

    let first = handler.get_model_read_only(bus.vlnv()).unwrap();
    // Mutate the backing file behind the handler's back (no watcher here):
    // the cache must keep serving the parsed instance, not re-read.
    std::fs::write(&path, "<garbage").unwrap();
    let second = handler.get_model_read_only(bus.vlnv()).unwrap();
    assert_eq!(*first, *second);
}

#[test]
fn dependency_files_resolve_to_existing_absolute_paths() {
    let root = TempDir::new().unwrap();
    let bus = vlnv(DocumentKind::BusDefinition, "bus1");
    write_doc(root.path(), &bus_definition("bus1"));

    let mut component = component_referencing("comp1", &bus);
    if let ipxact_library::document::Document::Component(inner) = &mut component {
        inner.file_sets.push(ipxact_library::document::FileSet {
            name: "rtl".to_string(),
            files: vec![
                "rtl/cpu.v".to_string(),
                "rtl/cpu.v".to_string(),
                "missing.v".to_string(),
                "https://example.com/external.v".to_string(),
            ],
            dependencies: vec!["rtl".to_string()],
        });
    }
    std::fs::create_dir_all(root.path().join("rtl")).unwrap();
    std::fs::write(root.path().join("rtl/cpu.v"), "module cpu; endmodule").unwrap();
    write_doc(root.path(), &component);

    let (handler, _rx) = new_library(root.path());
    handler.search_for_ipxact_files().unwrap();

    // Only the existing local file survives, once, as an absolute path.
    let files = handler.get_dependency_files(component.vlnv());
    assert_eq!(files.len(), 1);
    assert!(files[0].is_absolute());
    assert!(files[0].ends_with("rtl/cpu.v"));
}

#[test]
fn design_resolution_through_configuration() {
    let root = TempDir::new().unwrap();

    let design_vlnv = vlnv(DocumentKind::Design, "top");
    let design = ipxact_library::document::Document::Design(ipxact_library::document::Design {
        meta: ipxact_library::document::DocumentMeta::new(design_vlnv.clone()),
        instances: vec![],
    });
    write_doc(root.path(), &design);

    let config_vlnv = vlnv(DocumentKind::DesignConfiguration, "top_conf");
    let configuration = ipxact_library::document::Document::DesignConfiguration(
        ipxact_library::document::DesignConfiguration {
            meta: ipxact_library::document::DocumentMeta::new(config_vlnv.clone()),
            design_ref: Some(design_vlnv.clone()),
            view_configurations: vec![],
        },
    );
    write_doc(root.path(), &configuration);

    let (handler, _rx) = new_library(root.path());
    handler.search_for_ipxact_files().unwrap();

    // A configuration reference is chased to its design, a design reference
    // resolves to itself, anything else is refused.
    assert_eq!(handler.design_vlnv(&config_vlnv), Some(design_vlnv.clone()));
    assert_eq!(handler.design_vlnv(&design_vlnv), Some(design_vlnv.clone()));
    assert!(handler
        .design(&config_vlnv)
        .is_some_and(|resolved| resolved.vlnv() == &design_vlnv));
    let bus = vlnv(DocumentKind::BusDefinition, "not_hierarchical");
    assert_eq!(handler.design_vlnv(&bus), None);
}
