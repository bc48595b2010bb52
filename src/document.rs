//! The in-memory document model: a tagged union over the eight IP-XACT
//! document kinds, reduced to the fields the library engine needs to track
//! identity, dependencies, and structural health.
//!
//! Matching on [`Document`] is exhaustive, so adding a kind forces every
//! dispatch site (reader, writer, validator) to handle it.

use crate::vlnv::{DocumentKind, Vlnv};

/// A named, possibly parameterized value attached to a document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// Fields shared by every document kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentMeta {
    pub vlnv: Vlnv,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
}

impl DocumentMeta {
    pub fn new(vlnv: Vlnv) -> Self {
        DocumentMeta {
            vlnv,
            description: None,
            parameters: Vec::new(),
        }
    }
}

/// A bus interface on a component, referencing a bus definition and
/// optionally the abstraction definition that details it.
#[derive(Debug, Clone, PartialEq)]
pub struct BusInterface {
    pub name: String,
    pub bus_type: Vlnv,
    pub abstraction_ref: Option<Vlnv>,
}

/// A component view; hierarchical views reference a design or design
/// configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentView {
    pub name: String,
    pub hierarchy_ref: Option<Vlnv>,
}

/// A named group of files belonging to a component. `dependencies` are
/// directories the files need on the include path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileSet {
    pub name: String,
    pub files: Vec<String>,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Component {
    pub meta: DocumentMeta,
    pub bus_interfaces: Vec<BusInterface>,
    pub views: Vec<ComponentView>,
    pub file_sets: Vec<FileSet>,
}

/// One component instantiation inside a design.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInstance {
    pub instance_name: String,
    pub component_ref: Vlnv,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Design {
    pub meta: DocumentMeta,
    pub instances: Vec<ComponentInstance>,
}

/// Pairs a design instance with the active view chosen for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfiguration {
    pub instance_name: String,
    pub view_name: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DesignConfiguration {
    pub meta: DocumentMeta,
    pub design_ref: Option<Vlnv>,
    pub view_configurations: Vec<ViewConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BusDefinition {
    pub meta: DocumentMeta,
    pub direct_connection: bool,
    pub is_addressable: bool,
    pub extends: Option<Vlnv>,
    pub max_initiators: Option<u32>,
    pub max_targets: Option<u32>,
}

/// A logical port declared by an abstraction definition.
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractionPort {
    pub logical_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AbstractionDefinition {
    pub meta: DocumentMeta,
    pub bus_type: Option<Vlnv>,
    pub extends: Option<Vlnv>,
    pub ports: Vec<AbstractionPort>,
}

/// One document listed by a catalog: its identity and the location of its
/// file relative to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct IpxactFile {
    pub vlnv: Vlnv,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    pub meta: DocumentMeta,
    pub files: Vec<IpxactFile>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApiDefinition {
    pub meta: DocumentMeta,
    pub language: Option<String>,
    pub com_definition_ref: Option<Vlnv>,
    pub data_types: Vec<String>,
}

/// A property a COM interface of this definition must supply.
#[derive(Debug, Clone, PartialEq)]
pub struct ComProperty {
    pub name: String,
    pub required: bool,
    pub prop_type: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComDefinition {
    pub meta: DocumentMeta,
    pub transfer_types: Vec<String>,
    pub properties: Vec<ComProperty>,
}

/// One IP-XACT document, backed by one XML file.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    BusDefinition(BusDefinition),
    AbstractionDefinition(AbstractionDefinition),
    Component(Component),
    Design(Design),
    DesignConfiguration(DesignConfiguration),
    Catalog(Catalog),
    ApiDefinition(ApiDefinition),
    ComDefinition(ComDefinition),
}

impl Document {
    pub fn meta(&self) -> &DocumentMeta {
        match self {
            Document::BusDefinition(d) => &d.meta,
            Document::AbstractionDefinition(d) => &d.meta,
            Document::Component(d) => &d.meta,
            Document::Design(d) => &d.meta,
            Document::DesignConfiguration(d) => &d.meta,
            Document::Catalog(d) => &d.meta,
            Document::ApiDefinition(d) => &d.meta,
            Document::ComDefinition(d) => &d.meta,
        }
    }

    pub fn vlnv(&self) -> &Vlnv {
        &self.meta().vlnv
    }

    pub fn kind(&self) -> DocumentKind {
        self.vlnv().kind
    }

    /// VLNVs of every document this one references. Order follows the
    /// declaration order in the document; duplicates are not filtered.
    pub fn dependent_vlnvs(&self) -> Vec<Vlnv> {
        match self {
            Document::BusDefinition(d) => d.extends.iter().cloned().collect(),
            Document::AbstractionDefinition(d) => {
                d.bus_type.iter().chain(d.extends.iter()).cloned().collect()
            }
            Document::Component(d) => {
                let mut refs: Vec<Vlnv> = Vec::new();
                for bus in &d.bus_interfaces {
                    refs.push(bus.bus_type.clone());
                    if let Some(abs_ref) = &bus.abstraction_ref {
                        refs.push(abs_ref.clone());
                    }
                }
                refs.extend(d.views.iter().filter_map(|v| v.hierarchy_ref.clone()));
                refs
            }
            Document::Design(d) => d.instances.iter().map(|i| i.component_ref.clone()).collect(),
            Document::DesignConfiguration(d) => d.design_ref.iter().cloned().collect(),
            Document::Catalog(d) => d.files.iter().map(|f| f.vlnv.clone()).collect(),
            Document::ApiDefinition(d) => d.com_definition_ref.iter().cloned().collect(),
            Document::ComDefinition(_) => Vec::new(),
        }
    }

    /// File paths this document references: absolute, relative to the
    /// document's directory, or URL-form. Not resolved here.
    pub fn dependent_files(&self) -> Vec<String> {
        match self {
            Document::Component(d) => d
                .file_sets
                .iter()
                .flat_map(|fs| fs.files.iter().cloned())
                .collect(),
            Document::Catalog(d) => d.files.iter().map(|f| f.path.clone()).collect(),
            _ => Vec::new(),
        }
    }

    /// Directories this document expects to exist, relative to its own file.
    pub fn dependent_dirs(&self) -> Vec<String> {
        match self {
            Document::Component(d) => d
                .file_sets
                .iter()
                .flat_map(|fs| fs.dependencies.iter().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }
}
