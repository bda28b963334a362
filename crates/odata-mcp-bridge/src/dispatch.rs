//! Tool-call dispatch: resolve a [`ToolDescriptor`](odata_mcp_domain::tool::ToolDescriptor)
//! by name and route its JSON-RPC arguments to the matching
//! [`ODataClient`](odata_mcp_odata::client::ODataClient) operation (§4.3).
//!
//! Eager and lazy bindings share every helper below — the design note's
//! "lazy/eager equivalence" property holds because both paths funnel through
//! the same `list_entities`/`get_entity`/... functions, differing only in
//! where the `entity_set` name comes from (a fixed [`HandlerBinding`] field
//! versus a `entity_set` call argument).

use std::collections::BTreeMap;

use odata_mcp_domain::catalog::{HttpMethod as CatalogHttpMethod, MetadataCatalog, ODataVersion};
use odata_mcp_domain::config::Configuration;
use odata_mcp_domain::error::{Error, Result};
use odata_mcp_domain::hints::HintSet;
use odata_mcp_domain::tool::HandlerBinding;
use reqwest::Method;
use serde_json::{json, Map, Value};

use odata_mcp_odata::client::query::QueryOptions;
use odata_mcp_odata::client::ODataClient;

use crate::naming::friendly_property_name;
use crate::synth::ToolCatalog;

/// Everything a tool call needs to resolve and execute (§4.3): the published
/// catalog to look the tool name up in, the metadata catalog and client to
/// execute against, the configuration (for naming/response knobs), and the
/// hint set for `odata_service_info`.
pub struct BridgeContext<'a> {
    pub catalog: &'a MetadataCatalog,
    pub client: &'a ODataClient,
    pub config: &'a Configuration,
    pub hints: &'a HintSet,
    pub tools: &'a ToolCatalog,
}

/// Resolve `tool_name` against `ctx.tools` and execute its handler with
/// `arguments`, returning the MCP tool result's JSON payload (the server
/// crate wraps this as `{content:[{type:"text", text: <serialized>}]}`).
///
/// # Errors
/// [`Error::NotFound`] (kind `"tool"`) for an unresolved tool name;
/// [`Error::Protocol`] for a missing required argument; otherwise whatever
/// the underlying catalog lookup or client operation fails with.
pub async fn dispatch(ctx: &BridgeContext<'_>, tool_name: &str, arguments: Value) -> Result<Value> {
    let tool = ctx
        .tools
        .tools
        .iter()
        .find(|t| t.name == tool_name)
        .ok_or_else(|| Error::NotFound {
            kind: "tool".to_owned(),
            name: tool_name.to_owned(),
        })?;

    tracing::debug!(tool = tool_name, entity_set = ?tool.handler.fixed_entity_set(), "dispatching tool call");
    let result = dispatch_inner(ctx, tool_name, &tool.handler, arguments).await;
    if let Err(err) = &result {
        tracing::warn!(tool = tool_name, error = %err, "tool call failed");
    }
    result
}

async fn dispatch_inner(
    ctx: &BridgeContext<'_>,
    tool_name: &str,
    handler: &HandlerBinding,
    arguments: Value,
) -> Result<Value> {
    match handler {
        HandlerBinding::Filter { entity_set } | HandlerBinding::Search { entity_set } => {
            list_entities(ctx, tool_name, entity_set, &arguments).await
        }
        HandlerBinding::Count { entity_set } => count_entities(ctx, entity_set, &arguments).await,
        HandlerBinding::Get { entity_set } => {
            let keys = keys_from_eager_args(ctx, entity_set, &arguments)?;
            get_entity(ctx, entity_set, &keys).await
        }
        HandlerBinding::Create { entity_set } => {
            let data = arguments.get("data").cloned().unwrap_or_else(|| Value::Object(Map::new()));
            create_entity(ctx, entity_set, data).await
        }
        HandlerBinding::Update { entity_set } => update_entity_eager(ctx, entity_set, &arguments).await,
        HandlerBinding::Delete { entity_set } => {
            let keys = keys_from_eager_args(ctx, entity_set, &arguments)?;
            delete_entity(ctx, entity_set, &keys).await
        }
        HandlerBinding::Function { function_name } => call_function(ctx, function_name, &arguments).await,
        HandlerBinding::ServiceInfo => Ok(service_info(ctx)),

        HandlerBinding::LazyList => {
            let entity_set = required_str(&arguments, "entity_set")?.to_owned();
            list_entities(ctx, tool_name, &entity_set, &arguments).await
        }
        HandlerBinding::LazyCount => {
            let entity_set = required_str(&arguments, "entity_set")?.to_owned();
            count_entities(ctx, &entity_set, &arguments).await
        }
        HandlerBinding::LazyGet => {
            let entity_set = required_str(&arguments, "entity_set")?.to_owned();
            let keys = keys_from_lazy_args(&arguments)?;
            get_entity(ctx, &entity_set, &keys).await
        }
        HandlerBinding::LazyDelete => {
            let entity_set = required_str(&arguments, "entity_set")?.to_owned();
            let keys = keys_from_lazy_args(&arguments)?;
            delete_entity(ctx, &entity_set, &keys).await
        }
        HandlerBinding::LazyGetSchema => {
            let entity_set = required_str(&arguments, "entity_set")?;
            entity_schema(ctx, entity_set)
        }
        HandlerBinding::LazyCreate => {
            let entity_set = required_str(&arguments, "entity_set")?.to_owned();
            let data = arguments.get("data").cloned().unwrap_or_else(|| Value::Object(Map::new()));
            create_entity(ctx, &entity_set, data).await
        }
        HandlerBinding::LazyUpdate => {
            let entity_set = required_str(&arguments, "entity_set")?.to_owned();
            let keys = keys_from_lazy_args(&arguments)?;
            let data = arguments.get("data").cloned().unwrap_or_else(|| Value::Object(Map::new()));
            update_entity(ctx, &entity_set, &keys, data).await
        }
        HandlerBinding::LazyListFunctions => Ok(list_functions(ctx)),
        HandlerBinding::LazyCallFunction => {
            let function_name = required_str(&arguments, "function_name")?.to_owned();
            let params = arguments.get("parameters").cloned().unwrap_or_else(|| Value::Object(Map::new()));
            call_function(ctx, &function_name, &params).await
        }
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| Error::Protocol {
        message: format!("missing required argument '{key}'"),
    })
}

fn value_to_key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Read the composite key for an eager `get_{Set}`/`delete_{Set}` call: one
/// argument per key property, named directly after it (§4.3 input-schema shape).
fn keys_from_eager_args(ctx: &BridgeContext<'_>, entity_set: &str, args: &Value) -> Result<BTreeMap<String, String>> {
    let set = ctx.catalog.entity_sets.get(entity_set).ok_or_else(|| Error::NotFound {
        kind: "entity set".to_owned(),
        name: entity_set.to_owned(),
    })?;
    let entity_type = ctx.catalog.entity_type_for(set)?;
    let mut keys = BTreeMap::new();
    for key_name in &entity_type.key_names {
        let value = args.get(key_name).ok_or_else(|| Error::Protocol {
            message: format!("missing required key property '{key_name}'"),
        })?;
        keys.insert(key_name.clone(), value_to_key_string(value));
    }
    Ok(keys)
}

/// Read the key map for a lazy `get_entity`/`delete_entity`/`update_entity`
/// call: a nested `key` object of arbitrary property name/value pairs, since
/// the lazy tools aren't bound to a single entity type at schema time.
fn keys_from_lazy_args(args: &Value) -> Result<BTreeMap<String, String>> {
    let key_obj = args.get("key").and_then(Value::as_object).ok_or_else(|| Error::Protocol {
        message: "missing required argument 'key'".to_owned(),
    })?;
    Ok(key_obj.iter().map(|(k, v)| (k.clone(), value_to_key_string(v))).collect())
}

fn query_options_from_args(ctx: &BridgeContext<'_>, args: &Value) -> QueryOptions {
    let friendly = ctx.config.naming.claude_code_friendly;
    let str_opt = |odata_name: &str| -> Option<String> {
        args.get(&friendly_property_name(odata_name, friendly))
            .and_then(Value::as_str)
            .map(str::to_owned)
    };
    let u64_opt = |odata_name: &str| -> Option<u64> {
        args.get(&friendly_property_name(odata_name, friendly)).and_then(Value::as_u64)
    };
    let bool_opt = |odata_name: &str| -> Option<bool> {
        args.get(&friendly_property_name(odata_name, friendly)).and_then(Value::as_bool)
    };
    QueryOptions {
        filter: str_opt("$filter"),
        select: str_opt("$select"),
        expand: str_opt("$expand"),
        orderby: str_opt("$orderby"),
        top: u64_opt("$top"),
        skip: u64_opt("$skip"),
        count: bool_opt("$count"),
        search: str_opt("$search"),
    }
}

async fn list_entities(ctx: &BridgeContext<'_>, tool_name: &str, entity_set: &str, args: &Value) -> Result<Value> {
    let friendly = ctx.config.naming.claude_code_friendly;
    let skip = args.get(&friendly_property_name("$skip", friendly)).and_then(Value::as_u64).unwrap_or(0);
    let top = args.get(&friendly_property_name("$top", friendly)).and_then(Value::as_u64).unwrap_or(0);
    let opts = query_options_from_args(ctx, args);
    let result = ctx.client.list(ctx.catalog, entity_set, opts).await?;
    Ok(with_pagination_hints(ctx, tool_name, skip, top, result))
}

/// Attach the opt-in `pagination` block (§4.2 step 5) to an already-normalized
/// list response, if `--pagination-hints` is enabled.
fn with_pagination_hints(ctx: &BridgeContext<'_>, tool_name: &str, skip: u64, top: u64, mut result: Value) -> Value {
    if !ctx.config.response.pagination_hints {
        return result;
    }
    let Some(obj) = result.as_object_mut() else {
        return result;
    };
    let current_count = obj.get("value").and_then(Value::as_array).map(Vec::len).unwrap_or(0);
    let total_count = obj.get("count").and_then(Value::as_i64);
    let hint = odata_mcp_odata::client::envelope::pagination_hint(tool_name, current_count, total_count, skip, top);
    obj.insert("pagination".to_owned(), serde_json::to_value(hint).unwrap_or(Value::Null));
    result
}

async fn count_entities(ctx: &BridgeContext<'_>, entity_set: &str, args: &Value) -> Result<Value> {
    let friendly = ctx.config.naming.claude_code_friendly;
    let filter = args.get(&friendly_property_name("$filter", friendly)).and_then(Value::as_str);
    let count = ctx.client.count(ctx.catalog, entity_set, filter).await?;
    Ok(json!({"count": count}))
}

async fn get_entity(ctx: &BridgeContext<'_>, entity_set: &str, keys: &BTreeMap<String, String>) -> Result<Value> {
    ctx.client.get(ctx.catalog, entity_set, keys).await
}

async fn create_entity(ctx: &BridgeContext<'_>, entity_set: &str, payload: Value) -> Result<Value> {
    ctx.client.create(ctx.catalog, entity_set, payload).await
}

async fn update_entity_eager(ctx: &BridgeContext<'_>, entity_set: &str, args: &Value) -> Result<Value> {
    let keys = keys_from_eager_args(ctx, entity_set, args)?;
    let data = args.get("data").cloned().unwrap_or_else(|| Value::Object(Map::new()));
    update_entity(ctx, entity_set, &keys, data).await
}

async fn update_entity(
    ctx: &BridgeContext<'_>,
    entity_set: &str,
    keys: &BTreeMap<String, String>,
    data: Value,
) -> Result<Value> {
    let method = pick_update_method(ctx.catalog.version);
    ctx.client.update(ctx.catalog, entity_set, keys, data, method).await
}

/// v2 Gateway services traditionally accept `MERGE` for a partial update;
/// v4 uses the standard `PATCH`. Neither version name is user-configurable
/// here — the spec lists `{PATCH,PUT,MERGE}` as a set the implementation
/// chooses from, not a caller-exposed knob (see DESIGN.md).
fn pick_update_method(version: ODataVersion) -> Method {
    match version {
        ODataVersion::V2 => Method::from_bytes(b"MERGE").unwrap_or(Method::PATCH),
        ODataVersion::V4 => Method::PATCH,
    }
}

async fn delete_entity(ctx: &BridgeContext<'_>, entity_set: &str, keys: &BTreeMap<String, String>) -> Result<Value> {
    ctx.client.delete(ctx.catalog, entity_set, keys).await?;
    Ok(json!({"deleted": true}))
}

async fn call_function(ctx: &BridgeContext<'_>, function_name: &str, params_value: &Value) -> Result<Value> {
    let function = ctx.catalog.function_imports.get(function_name).ok_or_else(|| Error::NotFound {
        kind: "function".to_owned(),
        name: function_name.to_owned(),
    })?;
    let http_method = match function.http_method {
        CatalogHttpMethod::Get => Method::GET,
        CatalogHttpMethod::Post => Method::POST,
    };
    let mut params = BTreeMap::new();
    if let Some(obj) = params_value.as_object() {
        for (k, v) in obj {
            params.insert(k.clone(), value_to_key_string(v));
        }
    }
    ctx.client.call_function(ctx.catalog, function_name, &params, http_method).await
}

fn entity_schema(ctx: &BridgeContext<'_>, entity_set: &str) -> Result<Value> {
    let set = ctx.catalog.entity_sets.get(entity_set).ok_or_else(|| Error::NotFound {
        kind: "entity set".to_owned(),
        name: entity_set.to_owned(),
    })?;
    let entity_type = ctx.catalog.entity_type_for(set)?;
    Ok(json!({
        "entitySet": entity_set,
        "entityType": entity_type.name,
        "keyNames": entity_type.key_names,
        "properties": entity_type.properties.iter().map(|p| json!({
            "name": p.name,
            "type": p.edm_type.json_schema_type(),
            "nullable": p.nullable,
            "isKey": p.is_key,
        })).collect::<Vec<_>>(),
        "capabilities": set.capabilities,
    }))
}

fn list_functions(ctx: &BridgeContext<'_>) -> Value {
    let functions: Vec<Value> = ctx
        .catalog
        .function_imports
        .values()
        .map(|f| {
            json!({
                "name": f.name,
                "httpMethod": match f.http_method { CatalogHttpMethod::Get => "GET", CatalogHttpMethod::Post => "POST" },
                "isAction": f.is_action,
                "parameters": f.parameters.iter().map(|p| json!({
                    "name": p.name,
                    "type": p.edm_type.json_schema_type(),
                    "nullable": p.nullable,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({"functions": functions})
}

/// The `odata_service_info` tool (§4.3): the fields the spec names, plus the
/// resolved operation lattice and lazy-mode flag (§11 of `SPEC_FULL.md`).
fn service_info(ctx: &BridgeContext<'_>) -> Value {
    let merged_hints = ctx.hints.merged_for(&ctx.catalog.service_root);
    json!({
        "serviceUrl": ctx.catalog.service_root,
        "version": ctx.catalog.version.as_str(),
        "entitySets": ctx.catalog.entity_sets.keys().collect::<Vec<_>>(),
        "functionImports": ctx.catalog.function_imports.keys().collect::<Vec<_>>(),
        "implementationHints": merged_hints,
        "readOnly": ctx.config.operations.read_only,
        "readOnlyButFunctions": ctx.config.operations.read_only_but_functions,
        "enabledOps": ctx.config.operations.enabled_ops,
        "disabledOps": ctx.config.operations.disabled_ops,
        "lazyMode": ctx.tools.lazy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use odata_mcp_domain::catalog::{Capabilities, EntitySet, EntityType, Property};
    use odata_mcp_domain::config::{
        AuthMode, FilterConfig, HttpBindConfig, LazyConfig, NamingMode, ObservabilityConfig,
        OperationPolicy, ResponseConfig, RetryConfig, TimeoutConfig, ToolNamingConfig, TransportKind,
    };
    use odata_mcp_domain::edm::EdmType;
    use odata_mcp_domain::tool::ToolDescriptor;
    use std::collections::BTreeMap as Map2;

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

    fn catalog() -> MetadataCatalog {
        let mut entity_types = Map2::new();
        entity_types.insert("Product".to_owned(), product_type());
        let mut entity_sets = Map2::new();
        entity_sets.insert(
            "Products".to_owned(),
            EntitySet {
                name: "Products".to_owned(),
                entity_type_ref: "NorthSvc.Product".to_owned(),
                capabilities: Capabilities::default(),
            },
        );
        MetadataCatalog {
            service_root: "https://example.test/odata/NorthSvc".to_owned(),
            version: ODataVersion::V2,
            schema_namespace: "NorthSvc".to_owned(),
            container_name: "NorthSvcContainer".to_owned(),
            entity_types,
            entity_sets,
            function_imports: Map2::new(),
        }
    }

    fn config() -> Configuration {
        Configuration {
            service_url: "https://example.test/odata/NorthSvc".to_owned(),
            auth: AuthMode::Anonymous,
            transport: TransportKind::Stdio,
            http_bind: HttpBindConfig::default(),
            protocol_version: "2024-11-05".to_owned(),
            naming: ToolNamingConfig {
                mode: NamingMode::Postfix,
                service_id: "NorthSvc".to_owned(),
                ..Default::default()
            },
            entities: FilterConfig::default(),
            functions: FilterConfig::default(),
            operations: OperationPolicy::default(),
            retry: RetryConfig::default(),
            response: ResponseConfig::default(),
            timeouts: TimeoutConfig::default(),
            lazy: LazyConfig::default(),
            hints_file: None,
            inline_hints: vec![],
            observability: ObservabilityConfig::default(),
        }
    }

    #[test]
    fn keys_from_eager_args_reads_each_key_property() {
        let catalog = catalog();
        let config = config();
        let client = ODataClient::new(&config).unwrap();
        let hints = HintSet::default();
        let tools = ToolCatalog { tools: vec![], lazy: false };
        let ctx = BridgeContext {
            catalog: &catalog,
            client: &client,
            config: &config,
            hints: &hints,
            tools: &tools,
        };
        let keys = keys_from_eager_args(&ctx, "Products", &json!({"ProductID": 42})).unwrap();
        assert_eq!(keys.get("ProductID").map(String::as_str), Some("42"));
    }

    #[test]
    fn keys_from_eager_args_errors_on_missing_key() {
        let catalog = catalog();
        let config = config();
        let client = ODataClient::new(&config).unwrap();
        let hints = HintSet::default();
        let tools = ToolCatalog { tools: vec![], lazy: false };
        let ctx = BridgeContext {
            catalog: &catalog,
            client: &client,
            config: &config,
            hints: &hints,
            tools: &tools,
        };
        assert!(keys_from_eager_args(&ctx, "Products", &json!({})).is_err());
    }

    #[test]
    fn keys_from_lazy_args_reads_nested_key_object() {
        let keys = keys_from_lazy_args(&json!({"entity_set": "Products", "key": {"ProductID": 7}})).unwrap();
        assert_eq!(keys.get("ProductID").map(String::as_str), Some("7"));
    }

    #[test]
    fn keys_from_lazy_args_errors_without_key() {
        assert!(keys_from_lazy_args(&json!({"entity_set": "Products"})).is_err());
    }

    #[test]
    fn pick_update_method_differs_by_version() {
        assert_eq!(pick_update_method(ODataVersion::V4), Method::PATCH);
        assert_eq!(pick_update_method(ODataVersion::V2).as_str(), "MERGE");
    }

    #[test]
    fn query_options_from_args_honors_claude_friendly_naming() {
        let catalog = catalog();
        let mut config = config();
        config.naming.claude_code_friendly = true;
        let client = ODataClient::new(&config).unwrap();
        let hints = HintSet::default();
        let tools = ToolCatalog { tools: vec![], lazy: false };
        let ctx = BridgeContext {
            catalog: &catalog,
            client: &client,
            config: &config,
            hints: &hints,
            tools: &tools,
        };
        let opts = query_options_from_args(&ctx, &json!({"filter": "ProductID eq 1", "top": 5}));
        assert_eq!(opts.filter.as_deref(), Some("ProductID eq 1"));
        assert_eq!(opts.top, Some(5));
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_tool_name() {
        let catalog = catalog();
        let config = config();
        let client = ODataClient::new(&config).unwrap();
        let hints = HintSet::default();
        let tools = ToolCatalog { tools: vec![], lazy: false };
        let ctx = BridgeContext {
            catalog: &catalog,
            client: &client,
            config: &config,
            hints: &hints,
            tools: &tools,
        };
        let err = dispatch(&ctx, "does_not_exist", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn dispatch_reports_service_info_fields() {
        let catalog = catalog();
        let config = config();
        let client = ODataClient::new(&config).unwrap();
        let hints = HintSet::default();
        let tools = ToolCatalog {
            tools: vec![ToolDescriptor {
                name: "odata_service_info".to_owned(),
                description: "info".to_owned(),
                input_schema: json!({"type": "object"}),
                handler: HandlerBinding::ServiceInfo,
            }],
            lazy: false,
        };
        let ctx = BridgeContext {
            catalog: &catalog,
            client: &client,
            config: &config,
            hints: &hints,
            tools: &tools,
        };
        let result = dispatch(&ctx, "odata_service_info", json!({})).await.unwrap();
        assert_eq!(result["serviceUrl"], "https://example.test/odata/NorthSvc");
        assert_eq!(result["version"], "v2");
        assert_eq!(result["lazyMode"], false);
    }
}
