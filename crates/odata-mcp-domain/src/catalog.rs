//! The normalized metadata catalog produced by parsing `$metadata`.
//!
//! A [`MetadataCatalog`] is immutable once built (§3): the parser crate
//! constructs it in one pass and hands it to the bridge, which never
//! mutates it again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::edm::EdmType;

/// OData protocol version, detected during metadata parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ODataVersion {
    V2,
    V4,
}

impl ODataVersion {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V4 => "v4",
        }
    }
}

/// A single property of an entity type or a function-import parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub edm_type: EdmType,
    pub nullable: bool,
    pub is_key: bool,
    pub description: Option<String>,
}

/// A navigation property (association to another entity type). The catalog
/// records only the name and target type; traversal is out of scope (§1
/// Non-goals: no automatic pagination/deep-insert).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationProperty {
    pub name: String,
    pub target_entity_type: String,
}

/// An entity type: an ordered set of properties (declaration order is
/// preserved since composite-key formatting and input-schema shape both
/// depend on it) plus the ordered list of key property names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub properties: Vec<Property>,
    pub nav_properties: Vec<NavigationProperty>,
    /// Ordered key component names, as declared in `<Key><PropertyRef>` order.
    pub key_names: Vec<String>,
}

impl EntityType {
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn is_composite_key(&self) -> bool {
        self.key_names.len() > 1
    }
}

/// CRUD/search/paging capability flags for an entity set. SAP `sap:*`
/// annotations (v2) or `Capabilities.*Restrictions` (v4) override these
/// defaults; everything defaults to `true` except `searchable` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub creatable: bool,
    pub updatable: bool,
    pub deletable: bool,
    pub searchable: bool,
    pub pageable: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            creatable: true,
            updatable: true,
            deletable: true,
            searchable: false,
            pageable: true,
        }
    }
}

/// A named entity-set endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySet {
    pub name: String,
    pub entity_type_ref: String,
    pub capabilities: Capabilities,
}

/// The HTTP method a function import / action is invoked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Parameter passing mode (v2 `m:HttpMethod`/`Parameter/@Mode`; always `In`
/// for v4 function/action parameters, which have no output mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterMode {
    In,
    Out,
    InOut,
}

/// A function-import (v2) or unbound function/action (v4) parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    pub edm_type: EdmType,
    pub nullable: bool,
    pub mode: ParameterMode,
}

/// A callable operation exposed by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionImport {
    pub name: String,
    pub http_method: HttpMethod,
    pub return_type: Option<EdmType>,
    pub parameters: Vec<FunctionParameter>,
    /// `true` for a v4 `Action` (always POST, side-effecting); `false` for a
    /// v2 `FunctionImport` or a v4 side-effect-free `Function`.
    pub is_action: bool,
}

/// The normalized, immutable result of parsing a service's `$metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataCatalog {
    pub service_root: String,
    pub version: ODataVersion,
    pub schema_namespace: String,
    pub container_name: String,
    pub entity_types: BTreeMap<String, EntityType>,
    pub entity_sets: BTreeMap<String, EntitySet>,
    pub function_imports: BTreeMap<String, FunctionImport>,
}

impl MetadataCatalog {
    /// Resolve the [`EntityType`] backing an entity set.
    ///
    /// # Errors
    /// Returns [`crate::Error::Internal`] if the entity set's `entityTypeRef`
    /// does not resolve — a build-time invariant violation, since the parser
    /// is required to validate this before publishing a catalog (§3).
    pub fn entity_type_for(&self, entity_set: &EntitySet) -> crate::Result<&EntityType> {
        let short_name = entity_set
            .entity_type_ref
            .rsplit('.')
            .next()
            .unwrap_or(&entity_set.entity_type_ref);
        self.entity_types
            .get(short_name)
            .or_else(|| self.entity_types.get(&entity_set.entity_type_ref))
            .ok_or_else(|| {
                crate::Error::internal(format!(
                    "entity set '{}' references unresolved entity type '{}'",
                    entity_set.name, entity_set.entity_type_ref
                ))
            })
    }

    /// An estimate of how many tools eager mode would synthesize, used to
    /// evaluate `--lazy-threshold` (§4.3): `sum over entity sets of
    /// (3 + searchable + creatable + updatable + deletable) + functions`.
    #[must_use]
    pub fn estimated_eager_tool_count(&self) -> usize {
        let sets: usize = self
            .entity_sets
            .values()
            .map(|set| {
                3 + usize::from(set.capabilities.searchable)
                    + usize::from(set.capabilities.creatable)
                    + usize::from(set.capabilities.updatable)
                    + usize::from(set.capabilities.deletable)
            })
            .sum();
        sets + self.function_imports.len()
    }
}
