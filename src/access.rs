//! Reading and writing IP-XACT documents to and from XML files.
//!
//! The reader is a pull parser over `quick-xml` events. Document identity
//! (the four VLNV elements) is always the first content of the root element,
//! which lets [`extract_vlnv`] stop parsing as soon as the identity is known
//! instead of materializing the whole document during a scan.
//!
//! Root elements in a legacy `spirit` namespace (schema revisions before
//! 1685-2014) are rejected up front with `UnsupportedRevision` rather than
//! parsed and failed element by element.

use std::fmt::Display;
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::{Error as XmlError, Reader, Writer};

use crate::document::{
    AbstractionDefinition, AbstractionPort, ApiDefinition, BusDefinition, BusInterface, Catalog,
    ComDefinition, ComProperty, Component, ComponentInstance, ComponentView, Design,
    DesignConfiguration, Document, DocumentMeta, FileSet, IpxactFile, Parameter,
    ViewConfiguration,
};
use crate::error::LibraryError;
use crate::vlnv::{DocumentKind, Vlnv};

/// Namespace of the supported schema revision.
pub const IPXACT_2014_NS: &str = "http://www.accellera.org/XMLSchema/IPXACT/1685-2014";

/// Namespace prefix of pre-2014 schema revisions. Rejected, not parsed.
const LEGACY_PREFIX: &[u8] = b"spirit";

fn malformed(path: &Path, err: impl Display) -> LibraryError {
    LibraryError::MalformedXml(path.display().to_string(), err.to_string())
}

/// Read only the root tag and the four identity elements of the file.
///
/// This is the cheap scan-time probe used by the loader: the rest of the
/// document is never touched.
pub fn extract_vlnv(path: &Path) -> Result<Vlnv, LibraryError> {
    let content = fs::read_to_string(path)?;
    let mut reader = document_reader(&content);
    let kind = read_root(&mut reader, path)?;
    read_identity(&mut reader, path, kind)
}

/// Parse the whole document, dispatching on the kind encoded in the root
/// element.
pub fn read_document(path: &Path) -> Result<Document, LibraryError> {
    let content = fs::read_to_string(path)?;
    let mut reader = document_reader(&content);
    let kind = read_root(&mut reader, path)?;
    let vlnv = read_identity(&mut reader, path, kind)?;
    let meta = DocumentMeta::new(vlnv);

    match kind {
        DocumentKind::BusDefinition => {
            read_bus_definition(&mut reader, path, meta).map(Document::BusDefinition)
        }
        DocumentKind::AbstractionDefinition => {
            read_abstraction_definition(&mut reader, path, meta)
                .map(Document::AbstractionDefinition)
        }
        DocumentKind::Component => read_component(&mut reader, path, meta).map(Document::Component),
        DocumentKind::Design => read_design(&mut reader, path, meta).map(Document::Design),
        DocumentKind::DesignConfiguration => {
            read_design_configuration(&mut reader, path, meta).map(Document::DesignConfiguration)
        }
        DocumentKind::Catalog => read_catalog(&mut reader, path, meta).map(Document::Catalog),
        DocumentKind::ApiDefinition => {
            read_api_definition(&mut reader, path, meta).map(Document::ApiDefinition)
        }
        DocumentKind::ComDefinition => {
            read_com_definition(&mut reader, path, meta).map(Document::ComDefinition)
        }
    }
}

/// Serialize `document` to `path`, truncating any existing file.
///
/// Kind dispatch is exhaustive over the [`Document`] enum, so an
/// unserializable kind cannot reach this function.
pub fn write_document(document: &Document, path: &Path) -> Result<(), LibraryError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_document_events(&mut writer, document)
        .map_err(|e| LibraryError::Io(format!("XML write error for {}: {e}", path.display())))?;
    let xml = writer.into_inner();
    fs::write(path, xml)?;
    Ok(())
}

fn document_reader(content: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    reader
}

/// Locate the root element, reject legacy namespaces, and map it to a kind.
fn read_root(reader: &mut Reader<&[u8]>, path: &Path) -> Result<DocumentKind, LibraryError> {
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) => {
                let name = e.name();
                if name.prefix().is_some_and(|p| p.as_ref() == LEGACY_PREFIX) {
                    return Err(LibraryError::UnsupportedRevision(
                        path.display().to_string(),
                        "spirit namespace, 1685-2009 or older".to_string(),
                    ));
                }
                let local = String::from_utf8_lossy(name.local_name().as_ref()).to_string();
                return DocumentKind::from_root_element(&local)
                    .ok_or(LibraryError::UnsupportedKind(local));
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => {
                return Err(malformed(path, "no root element"));
            }
            other => {
                return Err(malformed(path, format!("unexpected content before root: {other:?}")));
            }
        }
    }
}

/// The four identity elements, in fixed order, as the first children of the
/// root.
fn read_identity(
    reader: &mut Reader<&[u8]>,
    path: &Path,
    kind: DocumentKind,
) -> Result<Vlnv, LibraryError> {
    let mut fields = Vec::with_capacity(4);
    for expected in ["vendor", "library", "name", "version"] {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) if e.local_name().as_ref() == expected.as_bytes() => {
                let text = reader
                    .read_text(e.name())
                    .map_err(|e| malformed(path, e))?;
                fields.push(text.trim().to_string());
            }
            other => {
                return Err(malformed(
                    path,
                    format!("expected identity element '{expected}', found {other:?}"),
                ));
            }
        }
    }
    Ok(Vlnv::new(
        kind,
        fields[0].clone(),
        fields[1].clone(),
        fields[2].clone(),
        fields[3].clone(),
    ))
}

/// A VLNV reference in attribute form, e.g.
/// `<ipxact:busType vendor="v" library="l" name="n" version="1.0"/>`.
/// The kind is implied by the referencing element.
fn read_vlnv_ref(e: &BytesStart, path: &Path, kind: DocumentKind) -> Result<Vlnv, LibraryError> {
    let mut vlnv = Vlnv {
        kind,
        ..Default::default()
    };
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| malformed(path, e))?;
        let value = attr
            .unescape_value()
            .map_err(|e| malformed(path, e))?
            .to_string();
        match attr.key.as_ref() {
            b"vendor" => vlnv.vendor = value,
            b"library" => vlnv.library = value,
            b"name" => vlnv.name = value,
            b"version" => vlnv.version = value,
            _ => {}
        }
    }
    Ok(vlnv)
}

fn read_text_element(
    reader: &mut Reader<&[u8]>,
    e: &BytesStart,
    path: &Path,
) -> Result<String, LibraryError> {
    Ok(reader
        .read_text(e.name())
        .map_err(|err| malformed(path, err))?
        .trim()
        .to_string())
}

fn skip_subtree(reader: &mut Reader<&[u8]>, e: &BytesStart, path: &Path) -> Result<(), LibraryError> {
    reader
        .read_to_end(e.name())
        .map_err(|err| malformed(path, err))?;
    Ok(())
}

/// Handle elements common to every kind (description, parameters). Returns
/// true if the element was consumed.
fn read_meta_element(
    reader: &mut Reader<&[u8]>,
    e: &BytesStart,
    path: &Path,
    meta: &mut DocumentMeta,
) -> Result<bool, LibraryError> {
    match e.local_name().as_ref() {
        b"description" => {
            meta.description = Some(read_text_element(reader, e, path)?);
            Ok(true)
        }
        b"parameters" => {
            meta.parameters = read_parameters(reader, path)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn read_parameters(reader: &mut Reader<&[u8]>, path: &Path) -> Result<Vec<Parameter>, LibraryError> {
    let mut parameters = Vec::new();
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"parameter" => {
                    let mut parameter = Parameter::default();
                    loop {
                        match reader.read_event().map_err(|e| malformed(path, e))? {
                            Event::Start(inner) => match inner.local_name().as_ref() {
                                b"name" => {
                                    parameter.name = read_text_element(reader, &inner, path)?
                                }
                                b"value" => {
                                    parameter.value = read_text_element(reader, &inner, path)?
                                }
                                _ => skip_subtree(reader, &inner, path)?,
                            },
                            Event::End(end) if end.local_name().as_ref() == b"parameter" => break,
                            Event::Eof => return Err(malformed(path, "unterminated parameter")),
                            _ => {}
                        }
                    }
                    parameters.push(parameter);
                }
                other => {
                    let name = String::from_utf8_lossy(other).to_string();
                    skip_subtree(reader, &e, path)?;
                    tracing::debug!("Skipping unknown element '{name}' in parameters");
                }
            },
            Event::End(end) if end.local_name().as_ref() == b"parameters" => break,
            Event::Eof => return Err(malformed(path, "unterminated parameters")),
            _ => {}
        }
    }
    Ok(parameters)
}

fn read_bus_definition(
    reader: &mut Reader<&[u8]>,
    path: &Path,
    meta: DocumentMeta,
) -> Result<BusDefinition, LibraryError> {
    let mut doc = BusDefinition {
        meta,
        ..Default::default()
    };
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) => {
                if read_meta_element(reader, &e, path, &mut doc.meta)? {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"directConnection" => {
                        doc.direct_connection = read_text_element(reader, &e, path)? == "true"
                    }
                    b"isAddressable" => {
                        doc.is_addressable = read_text_element(reader, &e, path)? == "true"
                    }
                    b"maxInitiators" => {
                        doc.max_initiators = read_text_element(reader, &e, path)?.parse().ok()
                    }
                    b"maxTargets" => {
                        doc.max_targets = read_text_element(reader, &e, path)?.parse().ok()
                    }
                    _ => skip_subtree(reader, &e, path)?,
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"extends" {
                    doc.extends = Some(read_vlnv_ref(&e, path, DocumentKind::BusDefinition)?);
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(malformed(path, "unterminated busDefinition")),
            _ => {}
        }
    }
    Ok(doc)
}

fn read_abstraction_definition(
    reader: &mut Reader<&[u8]>,
    path: &Path,
    meta: DocumentMeta,
) -> Result<AbstractionDefinition, LibraryError> {
    let mut doc = AbstractionDefinition {
        meta,
        ..Default::default()
    };
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) => {
                if read_meta_element(reader, &e, path, &mut doc.meta)? {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"ports" => loop {
                        match reader.read_event().map_err(|e| malformed(path, e))? {
                            Event::Start(port) if port.local_name().as_ref() == b"port" => {
                                let mut logical_name = String::new();
                                let mut description = None;
                                loop {
                                    match reader.read_event().map_err(|e| malformed(path, e))? {
                                        Event::Start(inner) => match inner.local_name().as_ref() {
                                            b"logicalName" => {
                                                logical_name =
                                                    read_text_element(reader, &inner, path)?
                                            }
                                            b"description" => {
                                                description = Some(read_text_element(
                                                    reader, &inner, path,
                                                )?)
                                            }
                                            _ => skip_subtree(reader, &inner, path)?,
                                        },
                                        Event::End(end)
                                            if end.local_name().as_ref() == b"port" =>
                                        {
                                            break
                                        }
                                        Event::Eof => {
                                            return Err(malformed(path, "unterminated port"))
                                        }
                                        _ => {}
                                    }
                                }
                                doc.ports.push(AbstractionPort {
                                    logical_name,
                                    description,
                                });
                            }
                            Event::End(end) if end.local_name().as_ref() == b"ports" => break,
                            Event::Eof => return Err(malformed(path, "unterminated ports")),
                            _ => {}
                        }
                    },
                    _ => skip_subtree(reader, &e, path)?,
                }
            }
            Event::Empty(e) => match e.local_name().as_ref() {
                b"busType" => {
                    doc.bus_type = Some(read_vlnv_ref(&e, path, DocumentKind::BusDefinition)?)
                }
                b"extends" => {
                    doc.extends =
                        Some(read_vlnv_ref(&e, path, DocumentKind::AbstractionDefinition)?)
                }
                _ => {}
            },
            Event::End(_) => break,
            Event::Eof => return Err(malformed(path, "unterminated abstractionDefinition")),
            _ => {}
        }
    }
    Ok(doc)
}

fn read_component(
    reader: &mut Reader<&[u8]>,
    path: &Path,
    meta: DocumentMeta,
) -> Result<Component, LibraryError> {
    let mut doc = Component {
        meta,
        ..Default::default()
    };
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) => {
                if read_meta_element(reader, &e, path, &mut doc.meta)? {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"busInterfaces" => doc.bus_interfaces = read_bus_interfaces(reader, path)?,
                    b"views" => doc.views = read_views(reader, path)?,
                    b"fileSets" => doc.file_sets = read_file_sets(reader, path)?,
                    _ => skip_subtree(reader, &e, path)?,
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(malformed(path, "unterminated component")),
            _ => {}
        }
    }
    Ok(doc)
}

fn read_bus_interfaces(
    reader: &mut Reader<&[u8]>,
    path: &Path,
) -> Result<Vec<BusInterface>, LibraryError> {
    let mut interfaces = Vec::new();
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) if e.local_name().as_ref() == b"busInterface" => {
                let mut name = String::new();
                let mut bus_type = None;
                let mut abstraction_ref = None;
                loop {
                    match reader.read_event().map_err(|e| malformed(path, e))? {
                        Event::Start(inner) if inner.local_name().as_ref() == b"name" => {
                            name = read_text_element(reader, &inner, path)?;
                        }
                        Event::Start(inner) => skip_subtree(reader, &inner, path)?,
                        Event::Empty(inner) => match inner.local_name().as_ref() {
                            b"busType" => {
                                bus_type =
                                    Some(read_vlnv_ref(&inner, path, DocumentKind::BusDefinition)?)
                            }
                            b"abstractionRef" => {
                                abstraction_ref = Some(read_vlnv_ref(
                                    &inner,
                                    path,
                                    DocumentKind::AbstractionDefinition,
                                )?)
                            }
                            _ => {}
                        },
                        Event::End(end) if end.local_name().as_ref() == b"busInterface" => break,
                        Event::Eof => return Err(malformed(path, "unterminated busInterface")),
                        _ => {}
                    }
                }
                interfaces.push(BusInterface {
                    name,
                    bus_type: bus_type
                        .ok_or_else(|| malformed(path, "busInterface without busType"))?,
                    abstraction_ref,
                });
            }
            Event::End(end) if end.local_name().as_ref() == b"busInterfaces" => break,
            Event::Eof => return Err(malformed(path, "unterminated busInterfaces")),
            _ => {}
        }
    }
    Ok(interfaces)
}

fn read_views(reader: &mut Reader<&[u8]>, path: &Path) -> Result<Vec<ComponentView>, LibraryError> {
    let mut views = Vec::new();
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) if e.local_name().as_ref() == b"view" => {
                let mut view = ComponentView {
                    name: String::new(),
                    hierarchy_ref: None,
                };
                loop {
                    match reader.read_event().map_err(|e| malformed(path, e))? {
                        Event::Start(inner) if inner.local_name().as_ref() == b"name" => {
                            view.name = read_text_element(reader, &inner, path)?;
                        }
                        Event::Start(inner) => skip_subtree(reader, &inner, path)?,
                        Event::Empty(inner) => match inner.local_name().as_ref() {
                            b"designRef" => {
                                view.hierarchy_ref =
                                    Some(read_vlnv_ref(&inner, path, DocumentKind::Design)?)
                            }
                            b"designConfigurationRef" => {
                                view.hierarchy_ref = Some(read_vlnv_ref(
                                    &inner,
                                    path,
                                    DocumentKind::DesignConfiguration,
                                )?)
                            }
                            _ => {}
                        },
                        Event::End(end) if end.local_name().as_ref() == b"view" => break,
                        Event::Eof => return Err(malformed(path, "unterminated view")),
                        _ => {}
                    }
                }
                views.push(view);
            }
            Event::End(end) if end.local_name().as_ref() == b"views" => break,
            Event::Eof => return Err(malformed(path, "unterminated views")),
            _ => {}
        }
    }
    Ok(views)
}

fn read_file_sets(reader: &mut Reader<&[u8]>, path: &Path) -> Result<Vec<FileSet>, LibraryError> {
    let mut file_sets = Vec::new();
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) if e.local_name().as_ref() == b"fileSet" => {
                let mut file_set = FileSet::default();
                loop {
                    match reader.read_event().map_err(|e| malformed(path, e))? {
                        Event::Start(inner) => match inner.local_name().as_ref() {
                            b"name" => file_set.name = read_text_element(reader, &inner, path)?,
                            b"file" => loop {
                                match reader.read_event().map_err(|e| malformed(path, e))? {
                                    Event::Start(file_el)
                                        if file_el.local_name().as_ref() == b"name" =>
                                    {
                                        file_set
                                            .files
                                            .push(read_text_element(reader, &file_el, path)?);
                                    }
                                    Event::Start(file_el) => {
                                        skip_subtree(reader, &file_el, path)?
                                    }
                                    Event::End(end)
                                        if end.local_name().as_ref() == b"file" =>
                                    {
                                        break
                                    }
                                    Event::Eof => {
                                        return Err(malformed(path, "unterminated file"))
                                    }
                                    _ => {}
                                }
                            },
                            b"dependency" => file_set
                                .dependencies
                                .push(read_text_element(reader, &inner, path)?),
                            _ => skip_subtree(reader, &inner, path)?,
                        },
                        Event::End(end) if end.local_name().as_ref() == b"fileSet" => break,
                        Event::Eof => return Err(malformed(path, "unterminated fileSet")),
                        _ => {}
                    }
                }
                file_sets.push(file_set);
            }
            Event::End(end) if end.local_name().as_ref() == b"fileSets" => break,
            Event::Eof => return Err(malformed(path, "unterminated fileSets")),
            _ => {}
        }
    }
    Ok(file_sets)
}

fn read_design(
    reader: &mut Reader<&[u8]>,
    path: &Path,
    meta: DocumentMeta,
) -> Result<Design, LibraryError> {
    let mut doc = Design {
        meta,
        ..Default::default()
    };
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) => {
                if read_meta_element(reader, &e, path, &mut doc.meta)? {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"componentInstances" => loop {
                        match reader.read_event().map_err(|e| malformed(path, e))? {
                            Event::Start(instance)
                                if instance.local_name().as_ref() == b"componentInstance" =>
                            {
                                let mut instance_name = String::new();
                                let mut component_ref = None;
                                loop {
                                    match reader.read_event().map_err(|e| malformed(path, e))? {
                                        Event::Start(inner)
                                            if inner.local_name().as_ref() == b"instanceName" =>
                                        {
                                            instance_name =
                                                read_text_element(reader, &inner, path)?;
                                        }
                                        Event::Start(inner) => {
                                            skip_subtree(reader, &inner, path)?
                                        }
                                        Event::Empty(inner)
                                            if inner.local_name().as_ref() == b"componentRef" =>
                                        {
                                            component_ref = Some(read_vlnv_ref(
                                                &inner,
                                                path,
                                                DocumentKind::Component,
                                            )?);
                                        }
                                        Event::End(end)
                                            if end.local_name().as_ref()
                                                == b"componentInstance" =>
                                        {
                                            break
                                        }
                                        Event::Eof => {
                                            return Err(malformed(
                                                path,
                                                "unterminated componentInstance",
                                            ))
                                        }
                                        _ => {}
                                    }
                                }
                                doc.instances.push(ComponentInstance {
                                    instance_name,
                                    component_ref: component_ref.ok_or_else(|| {
                                        malformed(path, "componentInstance without componentRef")
                                    })?,
                                });
                            }
                            Event::End(end)
                                if end.local_name().as_ref() == b"componentInstances" =>
                            {
                                break
                            }
                            Event::Eof => {
                                return Err(malformed(path, "unterminated componentInstances"))
                            }
                            _ => {}
                        }
                    },
                    _ => skip_subtree(reader, &e, path)?,
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(malformed(path, "unterminated design")),
            _ => {}
        }
    }
    Ok(doc)
}

fn read_design_configuration(
    reader: &mut Reader<&[u8]>,
    path: &Path,
    meta: DocumentMeta,
) -> Result<DesignConfiguration, LibraryError> {
    let mut doc = DesignConfiguration {
        meta,
        ..Default::default()
    };
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) => {
                if read_meta_element(reader, &e, path, &mut doc.meta)? {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"viewConfiguration" => {
                        let mut instance_name = String::new();
                        let mut view_name = String::new();
                        loop {
                            match reader.read_event().map_err(|e| malformed(path, e))? {
                                Event::Start(inner) => match inner.local_name().as_ref() {
                                    b"instanceName" => {
                                        instance_name = read_text_element(reader, &inner, path)?
                                    }
                                    b"viewName" => {
                                        view_name = read_text_element(reader, &inner, path)?
                                    }
                                    _ => skip_subtree(reader, &inner, path)?,
                                },
                                Event::End(end)
                                    if end.local_name().as_ref() == b"viewConfiguration" =>
                                {
                                    break
                                }
                                Event::Eof => {
                                    return Err(malformed(path, "unterminated viewConfiguration"))
                                }
                                _ => {}
                            }
                        }
                        doc.view_configurations.push(ViewConfiguration {
                            instance_name,
                            view_name,
                        });
                    }
                    _ => skip_subtree(reader, &e, path)?,
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"designRef" => {
                doc.design_ref = Some(read_vlnv_ref(&e, path, DocumentKind::Design)?);
            }
            Event::End(_) => break,
            Event::Eof => return Err(malformed(path, "unterminated designConfiguration")),
            _ => {}
        }
    }
    Ok(doc)
}

fn read_catalog(
    reader: &mut Reader<&[u8]>,
    path: &Path,
    meta: DocumentMeta,
) -> Result<Catalog, LibraryError> {
    let mut doc = Catalog {
        meta,
        ..Default::default()
    };
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) => {
                if read_meta_element(reader, &e, path, &mut doc.meta)? {
                    continue;
                }
                // Catalog entries are grouped by kind-named containers
                // (components, designs, busDefinitions, ...).
                let group = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if let Some(kind) = kind_from_group(&group) {
                    read_catalog_group(reader, path, kind, &mut doc.files, &group)?;
                } else {
                    skip_subtree(reader, &e, path)?;
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(malformed(path, "unterminated catalog")),
            _ => {}
        }
    }
    Ok(doc)
}

fn read_catalog_group(
    reader: &mut Reader<&[u8]>,
    path: &Path,
    kind: DocumentKind,
    files: &mut Vec<IpxactFile>,
    group: &str,
) -> Result<(), LibraryError> {
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) if e.local_name().as_ref() == b"ipxactFile" => {
                let mut vlnv = None;
                let mut file_path = String::new();
                loop {
                    match reader.read_event().map_err(|e| malformed(path, e))? {
                        Event::Start(inner) if inner.local_name().as_ref() == b"name" => {
                            file_path = read_text_element(reader, &inner, path)?;
                        }
                        Event::Start(inner) => skip_subtree(reader, &inner, path)?,
                        Event::Empty(inner) if inner.local_name().as_ref() == b"vlnv" => {
                            vlnv = Some(read_vlnv_ref(&inner, path, kind)?);
                        }
                        Event::End(end) if end.local_name().as_ref() == b"ipxactFile" => break,
                        Event::Eof => return Err(malformed(path, "unterminated ipxactFile")),
                        _ => {}
                    }
                }
                files.push(IpxactFile {
                    vlnv: vlnv.ok_or_else(|| malformed(path, "ipxactFile without vlnv"))?,
                    path: file_path,
                });
            }
            Event::End(end) if end.local_name().as_ref() == group.as_bytes() => break,
            Event::Eof => return Err(malformed(path, "unterminated catalog group")),
            _ => {}
        }
    }
    Ok(())
}

fn read_api_definition(
    reader: &mut Reader<&[u8]>,
    path: &Path,
    meta: DocumentMeta,
) -> Result<ApiDefinition, LibraryError> {
    let mut doc = ApiDefinition {
        meta,
        ..Default::default()
    };
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) => {
                if read_meta_element(reader, &e, path, &mut doc.meta)? {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"language" => doc.language = Some(read_text_element(reader, &e, path)?),
                    b"dataType" => doc.data_types.push(read_text_element(reader, &e, path)?),
                    _ => skip_subtree(reader, &e, path)?,
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"comDefinitionRef" => {
                doc.com_definition_ref =
                    Some(read_vlnv_ref(&e, path, DocumentKind::ComDefinition)?);
            }
            Event::End(_) => break,
            Event::Eof => return Err(malformed(path, "unterminated apiDefinition")),
            _ => {}
        }
    }
    Ok(doc)
}

fn read_com_definition(
    reader: &mut Reader<&[u8]>,
    path: &Path,
    meta: DocumentMeta,
) -> Result<ComDefinition, LibraryError> {
    let mut doc = ComDefinition {
        meta,
        ..Default::default()
    };
    loop {
        match reader.read_event().map_err(|e| malformed(path, e))? {
            Event::Start(e) => {
                if read_meta_element(reader, &e, path, &mut doc.meta)? {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"transferType" => {
                        doc.transfer_types.push(read_text_element(reader, &e, path)?)
                    }
                    b"property" => {
                        let mut property = ComProperty {
                            name: String::new(),
                            required: false,
                            prop_type: String::new(),
                        };
                        loop {
                            match reader.read_event().map_err(|e| malformed(path, e))? {
                                Event::Start(inner) => match inner.local_name().as_ref() {
                                    b"name" => {
                                        property.name = read_text_element(reader, &inner, path)?
                                    }
                                    b"required" => {
                                        property.required =
                                            read_text_element(reader, &inner, path)? == "true"
                                    }
                                    b"type" => {
                                        property.prop_type =
                                            read_text_element(reader, &inner, path)?
                                    }
                                    _ => skip_subtree(reader, &inner, path)?,
                                },
                                Event::End(end) if end.local_name().as_ref() == b"property" => {
                                    break
                                }
                                Event::Eof => {
                                    return Err(malformed(path, "unterminated property"))
                                }
                                _ => {}
                            }
                        }
                        doc.properties.push(property);
                    }
                    _ => skip_subtree(reader, &e, path)?,
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(malformed(path, "unterminated comDefinition")),
            _ => {}
        }
    }
    Ok(doc)
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

type XmlResult = Result<(), XmlError>;

fn write_document_events(writer: &mut Writer<Vec<u8>>, document: &Document) -> XmlResult {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let root_tag = format!("ipxact:{}", document.kind().to_root_element());
    let mut root = BytesStart::new(root_tag.as_str());
    root.push_attribute(("xmlns:ipxact", IPXACT_2014_NS));
    let root_end = root.to_end().into_owned();
    writer.write_event(Event::Start(root))?;

    write_identity(writer, document.vlnv())?;
    write_meta(writer, document.meta())?;

    match document {
        Document::BusDefinition(d) => write_bus_definition(writer, d)?,
        Document::AbstractionDefinition(d) => write_abstraction_definition(writer, d)?,
        Document::Component(d) => write_component(writer, d)?,
        Document::Design(d) => write_design(writer, d)?,
        Document::DesignConfiguration(d) => write_design_configuration(writer, d)?,
        Document::Catalog(d) => write_catalog(writer, d)?,
        Document::ApiDefinition(d) => write_api_definition(writer, d)?,
        Document::ComDefinition(d) => write_com_definition(writer, d)?,
    }

    writer.write_event(Event::End(root_end))?;
    Ok(())
}

fn write_text_el(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> XmlResult {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn write_identity(writer: &mut Writer<Vec<u8>>, vlnv: &Vlnv) -> XmlResult {
    write_text_el(writer, "ipxact:vendor", &vlnv.vendor)?;
    write_text_el(writer, "ipxact:library", &vlnv.library)?;
    write_text_el(writer, "ipxact:name", &vlnv.name)?;
    write_text_el(writer, "ipxact:version", &vlnv.version)?;
    Ok(())
}

fn write_meta(writer: &mut Writer<Vec<u8>>, meta: &DocumentMeta) -> XmlResult {
    if let Some(description) = &meta.description {
        write_text_el(writer, "ipxact:description", description)?;
    }
    if !meta.parameters.is_empty() {
        writer
            .create_element("ipxact:parameters")
            .write_inner_content(|w| {
                for parameter in &meta.parameters {
                    w.create_element("ipxact:parameter").write_inner_content(|w| {
                        write_text_el(w, "ipxact:name", &parameter.name)?;
                        write_text_el(w, "ipxact:value", &parameter.value)?;
                        Ok::<(), XmlError>(())
                    })?;
                }
                Ok::<(), XmlError>(())
            })?;
    }
    Ok(())
}

fn write_vlnv_ref(writer: &mut Writer<Vec<u8>>, tag: &str, vlnv: &Vlnv) -> XmlResult {
    writer
        .create_element(tag)
        .with_attributes([
            ("vendor", vlnv.vendor.as_str()),
            ("library", vlnv.library.as_str()),
            ("name", vlnv.name.as_str()),
            ("version", vlnv.version.as_str()),
        ])
        .write_empty()?;
    Ok(())
}

fn write_bus_definition(writer: &mut Writer<Vec<u8>>, doc: &BusDefinition) -> XmlResult {
    write_text_el(
        writer,
        "ipxact:directConnection",
        if doc.direct_connection { "true" } else { "false" },
    )?;
    write_text_el(
        writer,
        "ipxact:isAddressable",
        if doc.is_addressable { "true" } else { "false" },
    )?;
    if let Some(extends) = &doc.extends {
        write_vlnv_ref(writer, "ipxact:extends", extends)?;
    }
    if let Some(max) = doc.max_initiators {
        write_text_el(writer, "ipxact:maxInitiators", &max.to_string())?;
    }
    if let Some(max) = doc.max_targets {
        write_text_el(writer, "ipxact:maxTargets", &max.to_string())?;
    }
    Ok(())
}

fn write_abstraction_definition(
    writer: &mut Writer<Vec<u8>>,
    doc: &AbstractionDefinition,
) -> XmlResult {
    if let Some(bus_type) = &doc.bus_type {
        write_vlnv_ref(writer, "ipxact:busType", bus_type)?;
    }
    if let Some(extends) = &doc.extends {
        write_vlnv_ref(writer, "ipxact:extends", extends)?;
    }
    if !doc.ports.is_empty() {
        writer
            .create_element("ipxact:ports")
            .write_inner_content(|w| {
                for port in &doc.ports {
                    w.create_element("ipxact:port").write_inner_content(|w| {
                        write_text_el(w, "ipxact:logicalName", &port.logical_name)?;
                        if let Some(description) = &port.description {
                            write_text_el(w, "ipxact:description", description)?;
                        }
                        Ok::<(), XmlError>(())
                    })?;
                }
                Ok::<(), XmlError>(())
            })?;
    }
    Ok(())
}

fn write_component(writer: &mut Writer<Vec<u8>>, doc: &Component) -> XmlResult {
    if !doc.bus_interfaces.is_empty() {
        writer
            .create_element("ipxact:busInterfaces")
            .write_inner_content(|w| {
                for bus in &doc.bus_interfaces {
                    w.create_element("ipxact:busInterface")
                        .write_inner_content(|w| {
                            write_text_el(w, "ipxact:name", &bus.name)?;
                            write_vlnv_ref(w, "ipxact:busType", &bus.bus_type)?;
                            if let Some(abstraction_ref) = &bus.abstraction_ref {
                                write_vlnv_ref(w, "ipxact:abstractionRef", abstraction_ref)?;
                            }
                            Ok::<(), XmlError>(())
                        })?;
                }
                Ok::<(), XmlError>(())
            })?;
    }
    if !doc.views.is_empty() {
        writer
            .create_element("ipxact:views")
            .write_inner_content(|w| {
                for view in &doc.views {
                    w.create_element("ipxact:view").write_inner_content(|w| {
                        write_text_el(w, "ipxact:name", &view.name)?;
                        if let Some(hierarchy_ref) = &view.hierarchy_ref {
                            let tag = match hierarchy_ref.kind {
                                DocumentKind::DesignConfiguration => {
                                    "ipxact:designConfigurationRef"
                                }
                                _ => "ipxact:designRef",
                            };
                            write_vlnv_ref(w, tag, hierarchy_ref)?;
                        }
                        Ok::<(), XmlError>(())
                    })?;
                }
                Ok::<(), XmlError>(())
            })?;
    }
    if !doc.file_sets.is_empty() {
        writer
            .create_element("ipxact:fileSets")
            .write_inner_content(|w| {
                for file_set in &doc.file_sets {
                    w.create_element("ipxact:fileSet").write_inner_content(|w| {
                        write_text_el(w, "ipxact:name", &file_set.name)?;
                        for file in &file_set.files {
                            w.create_element("ipxact:file").write_inner_content(|w| {
                                write_text_el(w, "ipxact:name", file)?;
                                Ok::<(), XmlError>(())
                            })?;
                        }
                        for dependency in &file_set.dependencies {
                            write_text_el(w, "ipxact:dependency", dependency)?;
                        }
                        Ok::<(), XmlError>(())
                    })?;
                }
                Ok::<(), XmlError>(())
            })?;
    }
    Ok(())
}

fn write_design(writer: &mut Writer<Vec<u8>>, doc: &Design) -> XmlResult {
    if !doc.instances.is_empty() {
        writer
            .create_element("ipxact:componentInstances")
            .write_inner_content(|w| {
                for instance in &doc.instances {
                    w.create_element("ipxact:componentInstance")
                        .write_inner_content(|w| {
                            write_text_el(w, "ipxact:instanceName", &instance.instance_name)?;
                            write_vlnv_ref(w, "ipxact:componentRef", &instance.component_ref)?;
                            Ok::<(), XmlError>(())
                        })?;
                }
                Ok::<(), XmlError>(())
            })?;
    }
    Ok(())
}

fn write_design_configuration(
    writer: &mut Writer<Vec<u8>>,
    doc: &DesignConfiguration,
) -> XmlResult {
    if let Some(design_ref) = &doc.design_ref {
        write_vlnv_ref(writer, "ipxact:designRef", design_ref)?;
    }
    for view_configuration in &doc.view_configurations {
        writer
            .create_element("ipxact:viewConfiguration")
            .write_inner_content(|w| {
                write_text_el(w, "ipxact:instanceName", &view_configuration.instance_name)?;
                write_text_el(w, "ipxact:viewName", &view_configuration.view_name)?;
                Ok::<(), XmlError>(())
            })?;
    }
    Ok(())
}

/// Group tag for one catalog entry kind, e.g. `components` for
/// [`DocumentKind::Component`].
fn group_for_kind(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::BusDefinition => "busDefinitions",
        DocumentKind::AbstractionDefinition => "abstractionDefinitions",
        DocumentKind::Component => "components",
        DocumentKind::Design => "designs",
        DocumentKind::DesignConfiguration => "designConfigurations",
        DocumentKind::Catalog => "catalogs",
        DocumentKind::ApiDefinition => "apiDefinitions",
        DocumentKind::ComDefinition => "comDefinitions",
    }
}

fn kind_from_group(group: &str) -> Option<DocumentKind> {
    DocumentKind::ALL
        .into_iter()
        .find(|kind| group_for_kind(*kind) == group)
}

fn write_catalog(writer: &mut Writer<Vec<u8>>, doc: &Catalog) -> XmlResult {
    for kind in DocumentKind::ALL {
        let in_group: Vec<&IpxactFile> =
            doc.files.iter().filter(|f| f.vlnv.kind == kind).collect();
        if in_group.is_empty() {
            continue;
        }
        let tag = format!("ipxact:{}", group_for_kind(kind));
        writer
            .create_element(tag.as_str())
            .write_inner_content(|w| {
                for file in &in_group {
                    w.create_element("ipxact:ipxactFile").write_inner_content(|w| {
                        write_vlnv_ref(w, "ipxact:vlnv", &file.vlnv)?;
                        write_text_el(w, "ipxact:name", &file.path)?;
                        Ok::<(), XmlError>(())
                    })?;
                }
                Ok::<(), XmlError>(())
            })?;
    }
    Ok(())
}

fn write_api_definition(writer: &mut Writer<Vec<u8>>, doc: &ApiDefinition) -> XmlResult {
    if let Some(language) = &doc.language {
        write_text_el(writer, "ipxact:language", language)?;
    }
    if let Some(com_ref) = &doc.com_definition_ref {
        write_vlnv_ref(writer, "ipxact:comDefinitionRef", com_ref)?;
    }
    for data_type in &doc.data_types {
        write_text_el(writer, "ipxact:dataType", data_type)?;
    }
    Ok(())
}

fn write_com_definition(writer: &mut Writer<Vec<u8>>, doc: &ComDefinition) -> XmlResult {
    for transfer_type in &doc.transfer_types {
        write_text_el(writer, "ipxact:transferType", transfer_type)?;
    }
    for property in &doc.properties {
        writer
            .create_element("ipxact:property")
            .write_inner_content(|w| {
                write_text_el(w, "ipxact:name", &property.name)?;
                write_text_el(
                    w,
                    "ipxact:required",
                    if property.required { "true" } else { "false" },
                )?;
                write_text_el(w, "ipxact:type", &property.prop_type)?;
                Ok::<(), XmlError>(())
            })?;
    }
    Ok(())
}
