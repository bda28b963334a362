//! Catalog synthesis: metadata + configuration → a flat list of
//! [`ToolDescriptor`]s, in either eager or lazy mode (§4.3).

use odata_mcp_domain::catalog::MetadataCatalog;
use odata_mcp_domain::config::{Configuration, OpLetter};
use odata_mcp_domain::tool::{HandlerBinding, ToolDescriptor};

use crate::naming::{build_entity_tool_name, resolve_collisions, sanitize_name, shrink_verb};
use crate::schema;

/// The synthesized tool surface for a running service, plus whether it was
/// built in lazy mode (the bridge needs this at dispatch time to know how to
/// resolve `entity_set`/`function_name` arguments).
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    pub tools: Vec<ToolDescriptor>,
    pub lazy: bool,
}

/// Build the tool catalog for `catalog` under `config`, choosing eager or
/// lazy mode per `--lazy-metadata` / `--lazy-threshold` (§4.3).
#[must_use]
pub fn build_catalog(catalog: &MetadataCatalog, config: &Configuration) -> ToolCatalog {
    let lazy = config.lazy.lazy_metadata
        || (config.lazy.lazy_threshold > 0
            && catalog.estimated_eager_tool_count() > config.lazy.lazy_threshold);

    if lazy {
        ToolCatalog {
            tools: build_lazy_tools(),
            lazy: true,
        }
    } else {
        let mut tools = build_eager_tools(catalog, config);
        if config.naming.sort_tools {
            tools.sort_by(|a, b| a.name.cmp(&b.name));
        }
        ToolCatalog { tools, lazy: false }
    }
}

fn build_eager_tools(catalog: &MetadataCatalog, config: &Configuration) -> Vec<ToolDescriptor> {
    let mut tools = Vec::new();

    for (set_name, entity_set) in &catalog.entity_sets {
        if !config.entities.includes(set_name) {
            continue;
        }
        let Ok(entity_type) = catalog.entity_type_for(entity_set) else {
            continue;
        };
        let caps = entity_set.capabilities;

        let mut push = |verb: &str, op: OpLetter, schema_value: serde_json::Value, handler: HandlerBinding| {
            if !odata_mcp_domain::config::operation_allowed(&config.operations, caps, op) {
                return;
            }
            tools.push(raw_tool(config, verb, set_name, schema_value, handler));
        };

        push(
            "filter",
            OpLetter::Filter,
            schema::list_schema(config.naming.claude_code_friendly, false),
            HandlerBinding::Filter { entity_set: set_name.clone() },
        );
        push(
            "count",
            OpLetter::Filter,
            schema::count_schema(config.naming.claude_code_friendly, false),
            HandlerBinding::Count { entity_set: set_name.clone() },
        );
        push(
            "get",
            OpLetter::Get,
            schema::get_schema(entity_type),
            HandlerBinding::Get { entity_set: set_name.clone() },
        );
        if caps.searchable {
            push(
                "search",
                OpLetter::Search,
                schema::list_schema(config.naming.claude_code_friendly, false),
                HandlerBinding::Search { entity_set: set_name.clone() },
            );
        }
        push(
            "create",
            OpLetter::Create,
            schema::create_schema(entity_type),
            HandlerBinding::Create { entity_set: set_name.clone() },
        );
        push(
            "update",
            OpLetter::Update,
            schema::update_schema(entity_type),
            HandlerBinding::Update { entity_set: set_name.clone() },
        );
        push(
            "delete",
            OpLetter::Delete,
            schema::delete_schema(entity_type),
            HandlerBinding::Delete { entity_set: set_name.clone() },
        );
    }

    for (fn_name, function) in &catalog.function_imports {
        if !config.functions.includes(fn_name) {
            continue;
        }
        if !odata_mcp_domain::config::operation_allowed(
            &config.operations,
            odata_mcp_domain::catalog::Capabilities::default(),
            OpLetter::Action,
        ) {
            continue;
        }
        let raw = format!("{fn_name}_for_{}", config.naming.service_id);
        tools.push(ToolDescriptor {
            name: finalize_name(&raw),
            description: format!("Invoke the {fn_name} function import/action."),
            input_schema: schema::function_schema(function),
            handler: HandlerBinding::Function { function_name: fn_name.clone() },
        });
    }

    tools.push(ToolDescriptor {
        name: "odata_service_info".to_owned(),
        description: "Service metadata, capabilities, and matched hints.".to_owned(),
        input_schema: schema::service_info_schema(),
        handler: HandlerBinding::ServiceInfo,
    });

    let mut names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
    resolve_collisions(&mut names);
    for (tool, name) in tools.iter_mut().zip(names) {
        tool.name = name;
    }

    tools
}

fn raw_tool(
    config: &Configuration,
    verb: &str,
    set_name: &str,
    input_schema: serde_json::Value,
    handler: HandlerBinding,
) -> ToolDescriptor {
    let verb = shrink_verb(verb, config.naming.shrink);
    let mode = config.naming.mode;
    let raw_name = build_entity_tool_name(mode, verb, set_name, &config.naming.service_id);
    ToolDescriptor {
        name: finalize_name(&raw_name),
        description: format!("{verb} operation on entity set {set_name}."),
        input_schema,
        handler,
    }
}

fn finalize_name(raw: &str) -> String {
    sanitize_name(raw)
}

/// The exact ten fixed tools lazy mode emits regardless of catalog size
/// (§4.3, §8 "Lazy mode tool count").
fn build_lazy_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "odata_service_info".to_owned(),
            description: "Service metadata, capabilities, and matched hints.".to_owned(),
            input_schema: schema::service_info_schema(),
            handler: HandlerBinding::ServiceInfo,
        },
        ToolDescriptor {
            name: "list_entities".to_owned(),
            description: "List/filter entities from a named entity set.".to_owned(),
            input_schema: schema::list_schema(false, true),
            handler: HandlerBinding::LazyList,
        },
        ToolDescriptor {
            name: "count_entities".to_owned(),
            description: "Count entities in a named entity set.".to_owned(),
            input_schema: schema::count_schema(false, true),
            handler: HandlerBinding::LazyCount,
        },
        ToolDescriptor {
            name: "get_entity".to_owned(),
            description: "Fetch a single entity by key from a named entity set.".to_owned(),
            input_schema: schema::get_entity_lazy_schema(),
            handler: HandlerBinding::LazyGet,
        },
        ToolDescriptor {
            name: "get_entity_schema".to_owned(),
            description: "Return the property/key schema for a named entity set.".to_owned(),
            input_schema: schema::get_entity_schema_schema(),
            handler: HandlerBinding::LazyGetSchema,
        },
        ToolDescriptor {
            name: "create_entity".to_owned(),
            description: "Create a new entity in a named entity set.".to_owned(),
            input_schema: schema::create_entity_lazy_schema(),
            handler: HandlerBinding::LazyCreate,
        },
        ToolDescriptor {
            name: "update_entity".to_owned(),
            description: "Update an existing entity in a named entity set.".to_owned(),
            input_schema: schema::update_entity_lazy_schema(),
            handler: HandlerBinding::LazyUpdate,
        },
        ToolDescriptor {
            name: "delete_entity".to_owned(),
            description: "Delete an entity from a named entity set.".to_owned(),
            input_schema: schema::get_entity_lazy_schema(),
            handler: HandlerBinding::LazyDelete,
        },
        ToolDescriptor {
            name: "list_functions".to_owned(),
            description: "List available function imports/actions.".to_owned(),
            input_schema: schema::list_functions_schema(),
            handler: HandlerBinding::LazyListFunctions,
        },
        ToolDescriptor {
            name: "call_function".to_owned(),
            description: "Invoke a named function import/action.".to_owned(),
            input_schema: schema::call_function_lazy_schema(),
            handler: HandlerBinding::LazyCallFunction,
        },
    ]
}
