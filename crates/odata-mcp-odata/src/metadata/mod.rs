//! CSDL parsing: `parse(bytes, serviceRoot) -> MetadataCatalog` (§4.1).
//!
//! Implemented as a single event-driven pass over every `<Schema>` block
//! (quick-xml does not resolve namespace-qualified attribute names for us
//! the way an XSD-validating parser would, so `sap:creatable` and friends are
//! matched on their literal `sap:` prefix — exactly how they appear on the
//! wire). A common bug this guards against: only the first `Schema` block
//! gets processed, silently dropping entity sets declared in subsequent
//! schemas of a multi-namespace `$metadata` document.

use std::collections::BTreeMap;

use odata_mcp_domain::catalog::{
    Capabilities, EntitySet, EntityType, FunctionImport, FunctionParameter, HttpMethod,
    MetadataCatalog, NavigationProperty, ODataVersion, ParameterMode, Property,
};
use odata_mcp_domain::edm::EdmType;
use odata_mcp_domain::error::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Parse a `$metadata` document into a normalized, immutable catalog.
///
/// # Errors
/// Returns [`Error::MetadataParse`] with the offending schema/element named
/// when the document is not well-formed CSDL, or when an entity set's
/// `entityTypeRef` cannot be resolved against the parsed entity types.
pub fn parse(bytes: &[u8], service_root: &str) -> Result<MetadataCatalog> {
    let text = std::str::from_utf8(bytes).map_err(|e| Error::MetadataParse {
        schema: String::new(),
        element: String::new(),
        message: format!("metadata document is not valid UTF-8: {e}"),
    })?;

    let version = detect_version(text);

    let mut builder = Builder::default();
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(tag)) => builder.on_start(&tag)?,
            Ok(Event::Empty(tag)) => {
                builder.on_start(&tag)?;
                builder.on_end(local_name(&tag));
            }
            Ok(Event::End(tag)) => builder.on_end(local_name_end(&tag)),
            Ok(_) => {}
            Err(e) => {
                return Err(Error::MetadataParse {
                    schema: builder.current_schema.clone(),
                    element: String::new(),
                    message: format!("XML parse error: {e}"),
                })
            }
        }
    }

    let catalog = builder.finish(service_root, version)?;
    tracing::info!(
        service_root,
        version = ?catalog.version,
        entity_sets = catalog.entity_sets.len(),
        function_imports = catalog.function_imports.len(),
        "parsed $metadata"
    );
    Ok(catalog)
}

/// Detect protocol version per §4.1: a `Version` attribute on `DataServices`
/// means v2; its absence (with an `edmx:DataServices` wrapper present) means
/// v4. Defaults to v2 if ambiguous.
fn detect_version(text: &str) -> ODataVersion {
    if let Some(idx) = text.find("DataServices") {
        let tag_region = &text[idx..(idx + 400).min(text.len())];
        if tag_region.contains("Version=") {
            return ODataVersion::V2;
        }
    }
    if text.contains("edmx:DataServices") || text.contains("<DataServices") {
        ODataVersion::V4
    } else {
        ODataVersion::V2
    }
}

fn local_name(tag: &quick_xml::events::BytesStart) -> String {
    String::from_utf8_lossy(tag.local_name().as_ref()).into_owned()
}

fn local_name_end(tag: &quick_xml::events::BytesEnd) -> String {
    String::from_utf8_lossy(tag.local_name().as_ref()).into_owned()
}

fn attr_value(tag: &quick_xml::events::BytesStart, name: &str) -> Option<String> {
    tag.attributes().filter_map(std::result::Result::ok).find_map(|a| {
        if a.key.as_ref() == name.as_bytes() {
            Some(String::from_utf8_lossy(&a.value).into_owned())
        } else {
            None
        }
    })
}

#[derive(Default)]
struct Builder {
    current_schema: String,
    entity_types: BTreeMap<String, EntityType>,
    entity_sets: BTreeMap<String, EntitySet>,
    function_imports: BTreeMap<String, FunctionImport>,
    container_name: String,

    in_progress_entity_type: Option<EntityType>,
    in_progress_function: Option<(FunctionImport, bool)>, // (fn, is_function_v4)
    in_progress_entity_set: Option<(String, String, Capabilities)>,
    pending_capability_term: Option<CapabilityTerm>,
    pending_capability_property: Option<(bool, String)>, // (value, property name)
}

#[derive(Clone, Copy)]
enum CapabilityTerm {
    Insert,
    Update,
    Delete,
    Search,
    Paging,
}

impl Builder {
    fn on_start(&mut self, tag: &quick_xml::events::BytesStart) -> Result<()> {
        match local_name(tag).as_str() {
            "Schema" => {
                self.current_schema = attr_value(tag, "Namespace").unwrap_or_default();
            }
            "EntityContainer" => {
                if self.container_name.is_empty() {
                    self.container_name = attr_value(tag, "Name").unwrap_or_default();
                }
            }
            "EntityType" => {
                let name = attr_value(tag, "Name").ok_or_else(|| Error::MetadataParse {
                    schema: self.current_schema.clone(),
                    element: "EntityType".to_owned(),
                    message: "missing Name attribute".to_owned(),
                })?;
                self.in_progress_entity_type = Some(EntityType {
                    name,
                    properties: Vec::new(),
                    nav_properties: Vec::new(),
                    key_names: Vec::new(),
                });
            }
            "Property" => {
                if let Some(ty) = self.in_progress_entity_type.as_mut() {
                    let name = attr_value(tag, "Name").ok_or_else(|| Error::MetadataParse {
                        schema: self.current_schema.clone(),
                        element: "Property".to_owned(),
                        message: "missing Name attribute".to_owned(),
                    })?;
                    let edm_type = EdmType::parse(&attr_value(tag, "Type").unwrap_or_default());
                    let nullable = attr_value(tag, "Nullable")
                        .map(|v| v != "false")
                        .unwrap_or(true);
                    ty.properties.push(Property {
                        name,
                        edm_type,
                        nullable,
                        is_key: false,
                        description: attr_value(tag, "sap:label"),
                    });
                }
            }
            "NavigationProperty" => {
                if let Some(ty) = self.in_progress_entity_type.as_mut() {
                    let name = attr_value(tag, "Name").unwrap_or_default();
                    let target = attr_value(tag, "ToRole")
                        .or_else(|| attr_value(tag, "Type"))
                        .unwrap_or_default();
                    ty.nav_properties.push(NavigationProperty {
                        name,
                        target_entity_type: target,
                    });
                }
            }
            "PropertyRef" => {
                if let Some(ty) = self.in_progress_entity_type.as_mut() {
                    if let Some(name) = attr_value(tag, "Name") {
                        ty.key_names.push(name.clone());
                        if let Some(p) = ty.properties.iter_mut().find(|p| p.name == name) {
                            p.is_key = true;
                            p.nullable = false;
                        }
                    }
                }
            }
            "EntitySet" => {
                let name = attr_value(tag, "Name").ok_or_else(|| Error::MetadataParse {
                    schema: self.current_schema.clone(),
                    element: "EntitySet".to_owned(),
                    message: "missing Name attribute".to_owned(),
                })?;
                let entity_type_ref = attr_value(tag, "EntityType").unwrap_or_default();
                let mut caps = Capabilities::default();
                if let Some(v) = attr_value(tag, "sap:creatable") {
                    caps.creatable = v == "true";
                }
                if let Some(v) = attr_value(tag, "sap:updatable") {
                    caps.updatable = v == "true";
                }
                if let Some(v) = attr_value(tag, "sap:deletable") {
                    caps.deletable = v == "true";
                }
                if let Some(v) = attr_value(tag, "sap:searchable") {
                    caps.searchable = v == "true";
                }
                if let Some(v) = attr_value(tag, "sap:pageable") {
                    caps.pageable = v == "true";
                }
                self.in_progress_entity_set = Some((name, entity_type_ref, caps));
            }
            "FunctionImport" => {
                let name = attr_value(tag, "Name").unwrap_or_default();
                let http_method = match attr_value(tag, "m:HttpMethod").as_deref() {
                    Some("POST") => HttpMethod::Post,
                    _ => HttpMethod::Get,
                };
                let return_type = attr_value(tag, "ReturnType").map(|t| EdmType::parse(&t));
                self.in_progress_function = Some((
                    FunctionImport {
                        name,
                        http_method,
                        return_type,
                        parameters: Vec::new(),
                        is_action: false,
                    },
                    false,
                ));
            }
            "Function" => {
                let name = attr_value(tag, "Name").unwrap_or_default();
                self.in_progress_function = Some((
                    FunctionImport {
                        name,
                        http_method: HttpMethod::Get,
                        return_type: None,
                        parameters: Vec::new(),
                        is_action: false,
                    },
                    true,
                ));
            }
            "Action" => {
                let name = attr_value(tag, "Name").unwrap_or_default();
                self.in_progress_function = Some((
                    FunctionImport {
                        name,
                        http_method: HttpMethod::Post,
                        return_type: None,
                        parameters: Vec::new(),
                        is_action: true,
                    },
                    false,
                ));
            }
            "Parameter" => {
                if let Some((function, _)) = self.in_progress_function.as_mut() {
                    let name = attr_value(tag, "Name").unwrap_or_default();
                    let edm_type = EdmType::parse(&attr_value(tag, "Type").unwrap_or_default());
                    let nullable = attr_value(tag, "Nullable")
                        .map(|v| v != "false")
                        .unwrap_or(true);
                    let mode = match attr_value(tag, "Mode").as_deref() {
                        Some("Out") => ParameterMode::Out,
                        Some("InOut") => ParameterMode::InOut,
                        _ => ParameterMode::In,
                    };
                    function.parameters.push(FunctionParameter {
                        name,
                        edm_type,
                        nullable,
                        mode,
                    });
                }
            }
            "ReturnType" => {
                if let Some((function, _)) = self.in_progress_function.as_mut() {
                    if let Some(t) = attr_value(tag, "Type") {
                        function.return_type = Some(EdmType::parse(&t));
                    }
                }
            }
            "Annotation" => {
                if self.in_progress_entity_set.is_some() {
                    self.pending_capability_term =
                        match attr_value(tag, "Term").as_deref() {
                            Some(t) if t.ends_with("InsertRestrictions") => {
                                Some(CapabilityTerm::Insert)
                            }
                            Some(t) if t.ends_with("UpdateRestrictions") => {
                                Some(CapabilityTerm::Update)
                            }
                            Some(t) if t.ends_with("DeleteRestrictions") => {
                                Some(CapabilityTerm::Delete)
                            }
                            Some(t) if t.ends_with("SearchRestrictions") => {
                                Some(CapabilityTerm::Search)
                            }
                            Some(t) if t.ends_with("TopSupported") || t.ends_with("SkipSupported") => {
                                Some(CapabilityTerm::Paging)
                            }
                            _ => None,
                        };
                }
            }
            "PropertyValue" => {
                if let (Some(_), Some(prop)) =
                    (self.pending_capability_term, attr_value(tag, "Property"))
                {
                    if matches!(prop.as_str(), "Insertable" | "Updatable" | "Deletable" | "Searchable") {
                        let val = attr_value(tag, "Bool").map(|v| v == "true").unwrap_or(true);
                        self.pending_capability_property = Some((val, prop));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_end(&mut self, name: String) {
        match name.as_str() {
            "EntityType" => {
                if let Some(ty) = self.in_progress_entity_type.take() {
                    self.entity_types.insert(ty.name.clone(), ty);
                }
            }
            "FunctionImport" | "Function" | "Action" => {
                if let Some((function, _)) = self.in_progress_function.take() {
                    self.function_imports.insert(function.name.clone(), function);
                }
            }
            "EntitySet" => {
                if let Some((name, entity_type_ref, capabilities)) =
                    self.in_progress_entity_set.take()
                {
                    self.entity_sets.insert(
                        name.clone(),
                        EntitySet {
                            name,
                            entity_type_ref,
                            capabilities,
                        },
                    );
                }
            }
            "Annotation" => {
                self.pending_capability_term = None;
            }
            "PropertyValue" => {
                if let (Some((val, prop)), Some((_, _, caps))) = (
                    self.pending_capability_property.take(),
                    self.in_progress_entity_set.as_mut(),
                ) {
                    match prop.as_str() {
                        "Insertable" => caps.creatable = val,
                        "Updatable" => caps.updatable = val,
                        "Deletable" => caps.deletable = val,
                        "Searchable" => caps.searchable = val,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn finish(self, service_root: &str, version: ODataVersion) -> Result<MetadataCatalog> {
        let catalog = MetadataCatalog {
            service_root: service_root.to_owned(),
            version,
            schema_namespace: self.current_schema,
            container_name: self.container_name,
            entity_types: self.entity_types,
            entity_sets: self.entity_sets,
            function_imports: self.function_imports,
        };

        for set in catalog.entity_sets.values() {
            let entity_type = catalog.entity_type_for(set)?;
            for key in &entity_type.key_names {
                if !entity_type.properties.iter().any(|p| &p.name == key) {
                    return Err(Error::MetadataParse {
                        schema: catalog.schema_namespace.clone(),
                        element: format!("EntityType/{}", entity_type.name),
                        message: format!("key property '{key}' not declared"),
                    });
                }
            }
        }

        Ok(catalog)
    }
}
