//! VLNV identity: the Vendor-Library-Name-Version tuple, plus the document
//! kind tag, that addresses every document in the library.
//!
//! Ordering is lexicographic over (vendor, library, name, version, kind).
//! Because the kind is the least significant field, every kind-variant of one
//! identity occupies a contiguous range in a `BTreeMap` keyed by [`Vlnv`],
//! which is what [`Vlnv::identity_range`] exploits for kind-agnostic lookups.

use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The eight IP-XACT document kinds addressable by a VLNV.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum DocumentKind {
    BusDefinition,
    AbstractionDefinition,
    #[default]
    Component,
    Design,
    DesignConfiguration,
    Catalog,
    ApiDefinition,
    ComDefinition,
}

impl DocumentKind {
    /// All kinds in `Ord` order. First and last bound the kind range of one
    /// identity inside a `BTreeMap<Vlnv, _>`.
    pub const ALL: [DocumentKind; 8] = [
        DocumentKind::BusDefinition,
        DocumentKind::AbstractionDefinition,
        DocumentKind::Component,
        DocumentKind::Design,
        DocumentKind::DesignConfiguration,
        DocumentKind::Catalog,
        DocumentKind::ApiDefinition,
        DocumentKind::ComDefinition,
    ];

    /// Map a root element's local name to a kind.
    pub fn from_root_element(local_name: &str) -> Option<Self> {
        match local_name {
            "busDefinition" => Some(DocumentKind::BusDefinition),
            "abstractionDefinition" => Some(DocumentKind::AbstractionDefinition),
            "component" => Some(DocumentKind::Component),
            "design" => Some(DocumentKind::Design),
            "designConfiguration" => Some(DocumentKind::DesignConfiguration),
            "catalog" => Some(DocumentKind::Catalog),
            "apiDefinition" => Some(DocumentKind::ApiDefinition),
            "comDefinition" => Some(DocumentKind::ComDefinition),
            _ => None,
        }
    }

    /// The root element local name used when serializing this kind.
    pub fn to_root_element(self) -> &'static str {
        match self {
            DocumentKind::BusDefinition => "busDefinition",
            DocumentKind::AbstractionDefinition => "abstractionDefinition",
            DocumentKind::Component => "component",
            DocumentKind::Design => "design",
            DocumentKind::DesignConfiguration => "designConfiguration",
            DocumentKind::Catalog => "catalog",
            DocumentKind::ApiDefinition => "apiDefinition",
            DocumentKind::ComDefinition => "comDefinition",
        }
    }
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_root_element())
    }
}

/// Vendor-Library-Name-Version identity of one document, tagged with its
/// document kind. Immutable value type.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Vlnv {
    pub vendor: String,
    pub library: String,
    pub name: String,
    pub version: String,
    pub kind: DocumentKind,
}

impl Vlnv {
    pub fn new(
        kind: DocumentKind,
        vendor: impl Into<String>,
        library: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Vlnv {
            vendor: vendor.into(),
            library: library.into(),
            name: name.into(),
            version: version.into(),
            kind,
        }
    }

    /// All four identity fields are present.
    pub fn is_valid(&self) -> bool {
        !self.vendor.is_empty()
            && !self.library.is_empty()
            && !self.name.is_empty()
            && !self.version.is_empty()
    }

    /// The same identity under a different kind tag. Used when resolving
    /// hierarchical references, where the referrer may not know the kind of
    /// the document it points at.
    pub fn with_kind(&self, kind: DocumentKind) -> Self {
        Vlnv {
            kind,
            ..self.clone()
        }
    }

    /// Compare the four identity fields, ignoring the kind tag.
    pub fn same_identity(&self, other: &Vlnv) -> bool {
        self.vendor == other.vendor
            && self.library == other.library
            && self.name == other.name
            && self.version == other.version
    }

    /// Inclusive key range covering every kind-variant of this identity in a
    /// `BTreeMap<Vlnv, _>`.
    pub fn identity_range(&self) -> RangeInclusive<Vlnv> {
        let lo = self.with_kind(DocumentKind::ALL[0]);
        let hi = self.with_kind(DocumentKind::ALL[DocumentKind::ALL.len() - 1]);
        lo..=hi
    }

    /// The export directory layout `vendor/library/name/version`.
    pub fn to_path(&self) -> PathBuf {
        [&self.vendor, &self.library, &self.name, &self.version]
            .iter()
            .collect()
    }
}

impl Display for Vlnv {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.vendor, self.library, self.name, self.version
        )
    }
}
