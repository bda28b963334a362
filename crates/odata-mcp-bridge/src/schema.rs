//! JSON-Schema construction for a [`ToolDescriptor`](odata_mcp_domain::tool::ToolDescriptor)'s
//! `input_schema`, one builder per operation shape (§4.3).

use serde_json::{json, Map, Value};

use odata_mcp_domain::catalog::{EntityType, FunctionImport, ParameterMode};
use odata_mcp_domain::edm::EdmType;

use crate::naming::friendly_property_name;

fn edm_property_schema(edm_type: &EdmType) -> Value {
    let mut obj = Map::new();
    obj.insert("type".to_owned(), Value::String(edm_type.json_schema_type().to_owned()));
    if let Some(format) = edm_type.json_schema_format() {
        obj.insert("format".to_owned(), Value::String(format.to_owned()));
    }
    Value::Object(obj)
}

/// The four standard query-option properties shared by `filter`/`search`-style
/// tools, named per `claude_code_friendly`.
fn query_option_properties(claude_code_friendly: bool) -> Map<String, Value> {
    let mut props = Map::new();
    for (name, description, ty) in [
        ("$filter", "OData $filter expression", "string"),
        ("$select", "Comma-separated list of properties to return", "string"),
        ("$expand", "Comma-separated list of navigation properties to expand", "string"),
        ("$orderby", "Comma-separated list of properties to sort by", "string"),
        ("$search", "Free-text search expression", "string"),
    ] {
        props.insert(
            friendly_property_name(name, claude_code_friendly),
            json!({"type": ty, "description": description}),
        );
    }
    props.insert(
        friendly_property_name("$top", claude_code_friendly),
        json!({"type": "integer", "description": "Maximum number of entities to return", "minimum": 0}),
    );
    props.insert(
        friendly_property_name("$skip", claude_code_friendly),
        json!({"type": "integer", "description": "Number of entities to skip", "minimum": 0}),
    );
    props.insert(
        friendly_property_name("$count", claude_code_friendly),
        json!({"type": "boolean", "description": "Include the total match count"}),
    );
    props
}

/// Schema for `filter_{Set}`/`search_{Set}`/`list_entities` (lazy): every
/// standard query option, nothing required.
#[must_use]
pub fn list_schema(claude_code_friendly: bool, lazy: bool) -> Value {
    let mut props = query_option_properties(claude_code_friendly);
    if lazy {
        props.insert("entity_set".to_owned(), json!({"type": "string", "description": "Target entity set name"}));
    }
    json!({
        "type": "object",
        "properties": props,
        "required": if lazy { vec!["entity_set"] } else { vec![] },
    })
}

/// Schema for `count_{Set}`/`count_entities` (lazy): no arguments beyond the
/// optional `$filter`, plus `entity_set` when lazy.
#[must_use]
pub fn count_schema(claude_code_friendly: bool, lazy: bool) -> Value {
    let mut props = Map::new();
    props.insert(
        friendly_property_name("$filter", claude_code_friendly),
        json!({"type": "string", "description": "OData $filter expression"}),
    );
    let mut required = vec![];
    if lazy {
        props.insert("entity_set".to_owned(), json!({"type": "string"}));
        required.push("entity_set");
    }
    json!({"type": "object", "properties": props, "required": required})
}

/// Key-component properties for `get`/`update`/`delete`, typed from the
/// entity type's key properties.
fn key_properties(entity_type: &EntityType) -> Map<String, Value> {
    let mut props = Map::new();
    for key_name in &entity_type.key_names {
        if let Some(p) = entity_type.property(key_name) {
            props.insert(key_name.clone(), edm_property_schema(&p.edm_type));
        }
    }
    props
}

/// Schema for `get_{Set}` (eager): the composite key, all required. The
/// lazy counterpart (`get_entity`) isn't bound to one entity type, so it
/// uses [`get_entity_lazy_schema`] instead.
#[must_use]
pub fn get_schema(entity_type: &EntityType) -> Value {
    let props = key_properties(entity_type);
    let required: Vec<String> = entity_type.key_names.clone();
    json!({"type": "object", "properties": props, "required": required})
}

/// The writable (non-key) properties of `entity_type` as a JSON-Schema
/// object, with non-nullable properties marked `required` (§4.3: "schema
/// annotations document required fields from non-nullable non-key properties").
fn writable_payload_schema(entity_type: &EntityType) -> Value {
    let mut payload_props = Map::new();
    let mut required = vec![];
    for property in &entity_type.properties {
        if property.is_key {
            continue;
        }
        payload_props.insert(property.name.clone(), edm_property_schema(&property.edm_type));
        if !property.nullable {
            required.push(property.name.clone());
        }
    }
    json!({"type": "object", "properties": payload_props, "required": required})
}

/// Schema for `create_{Set}` (eager): a nested `data` object carrying the
/// writable fields, matching the lazy `create_entity` shape.
#[must_use]
pub fn create_schema(entity_type: &EntityType) -> Value {
    json!({
        "type": "object",
        "properties": {"data": writable_payload_schema(entity_type)},
        "required": ["data"],
    })
}

/// Schema for `update_{Set}` (eager): key properties (required) plus a
/// nested `data` object carrying the writable fields.
#[must_use]
pub fn update_schema(entity_type: &EntityType) -> Value {
    let mut props = key_properties(entity_type);
    props.insert("data".to_owned(), writable_payload_schema(entity_type));

    let mut required: Vec<String> = entity_type.key_names.clone();
    required.push("data".to_owned());
    json!({"type": "object", "properties": props, "required": required})
}

/// Schema for `delete_{Set}` (eager): the composite key only.
#[must_use]
pub fn delete_schema(entity_type: &EntityType) -> Value {
    get_schema(entity_type)
}

/// Schema for `get_entity`/`delete_entity` (lazy-only): an arbitrary entity
/// set plus an open-ended key object, since the lazy tools aren't bound to
/// one entity type at schema-construction time (the catalog is consulted at
/// call time instead, per §4.3).
#[must_use]
pub fn get_entity_lazy_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "entity_set": {"type": "string"},
            "key": {"type": "object", "description": "Key property name/value pairs"},
        },
        "required": ["entity_set", "key"],
    })
}

/// Schema for `create_entity` (lazy-only).
#[must_use]
pub fn create_entity_lazy_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "entity_set": {"type": "string"},
            "data": {"type": "object", "description": "Entity payload"},
        },
        "required": ["entity_set", "data"],
    })
}

/// Schema for `update_entity` (lazy-only).
#[must_use]
pub fn update_entity_lazy_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "entity_set": {"type": "string"},
            "key": {"type": "object", "description": "Key property name/value pairs"},
            "data": {"type": "object", "description": "Updated field values"},
        },
        "required": ["entity_set", "key", "data"],
    })
}

/// Schema for `call_function` (lazy-only).
#[must_use]
pub fn call_function_lazy_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "function_name": {"type": "string"},
            "parameters": {"type": "object", "description": "Function/action parameters"},
        },
        "required": ["function_name"],
    })
}

/// Schema for `get_entity_schema` (lazy-only introspection tool).
#[must_use]
pub fn get_entity_schema_schema() -> Value {
    json!({
        "type": "object",
        "properties": {"entity_set": {"type": "string"}},
        "required": ["entity_set"],
    })
}

/// Schema for an eager-mode function-import/action invocation tool, from its
/// declared parameters. The lazy counterpart (`call_function`) takes an
/// open-ended `parameters` object instead; see [`call_function_lazy_schema`].
#[must_use]
pub fn function_schema(function: &FunctionImport) -> Value {
    let mut props = Map::new();
    let mut required = vec![];
    for param in &function.parameters {
        if param.mode == ParameterMode::Out {
            continue;
        }
        props.insert(param.name.clone(), edm_property_schema(&param.edm_type));
        if !param.nullable {
            required.push(param.name.clone());
        }
    }
    json!({"type": "object", "properties": props, "required": required})
}

/// Schema for `list_functions` (lazy-only, no arguments).
#[must_use]
pub fn list_functions_schema() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

/// Schema for `odata_service_info` (no arguments).
#[must_use]
pub fn service_info_schema() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

#[cfg(test)]
mod tests {
    use super::*;
    use odata_mcp_domain::catalog::Property;

    fn product_type() -> EntityType {
        EntityType {
            name: "Product".to_owned(),
            properties: vec![
                Property {
                    name: "ProductID".to_owned(),
                    edm_type: EdmType::Int32,
                    nullable: false,
                    is_key: true,
                    description: None,
                },
                Property {
                    name: "Name".to_owned(),
                    edm_type: EdmType::String,
                    nullable: true,
                    is_key: false,
                    description: None,
                },
            ],
            nav_properties: vec![],
            key_names: vec!["ProductID".to_owned()],
        }
    }

    #[test]
    fn get_schema_requires_key_properties() {
        let schema = get_schema(&product_type());
        assert_eq!(schema["required"], json!(["ProductID"]));
        assert_eq!(schema["properties"]["ProductID"]["type"], "integer");
    }

    #[test]
    fn lazy_get_entity_schema_requires_entity_set_and_key() {
        let schema = get_entity_lazy_schema();
        assert_eq!(schema["required"], json!(["entity_set", "key"]));
    }

    #[test]
    fn create_schema_nests_writable_fields_under_data() {
        let schema = create_schema(&product_type());
        assert_eq!(schema["required"], json!(["data"]));
        let data_props = &schema["properties"]["data"]["properties"];
        assert!(data_props.get("Name").is_some());
        assert!(data_props.get("ProductID").is_none());
    }

    #[test]
    fn create_schema_requires_non_nullable_non_key_properties() {
        let mut entity_type = product_type();
        entity_type.properties.push(Property {
            name: "Sku".to_owned(),
            edm_type: EdmType::String,
            nullable: false,
            is_key: false,
            description: None,
        });
        let schema = create_schema(&entity_type);
        let data_required = schema["properties"]["data"]["required"].as_array().unwrap();
        assert!(data_required.contains(&json!("Sku")));
        assert!(!data_required.contains(&json!("Name")));
    }

    #[test]
    fn update_schema_requires_non_nullable_non_key_properties_under_data() {
        let mut entity_type = product_type();
        entity_type.properties.push(Property {
            name: "Sku".to_owned(),
            edm_type: EdmType::String,
            nullable: false,
            is_key: false,
            description: None,
        });
        let schema = update_schema(&entity_type);
        assert_eq!(schema["required"], json!(["ProductID", "data"]));
        let data_required = schema["properties"]["data"]["required"].as_array().unwrap();
        assert!(data_required.contains(&json!("Sku")));
    }

    #[test]
    fn claude_friendly_list_schema_strips_dollar_prefix() {
        let schema = list_schema(true, false);
        assert!(schema["properties"].get("filter").is_some());
        assert!(schema["properties"].get("$filter").is_none());
    }

    #[test]
    fn non_friendly_list_schema_keeps_dollar_prefix() {
        let schema = list_schema(false, false);
        assert!(schema["properties"].get("$filter").is_some());
    }
}
