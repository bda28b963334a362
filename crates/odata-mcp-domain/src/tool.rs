//! [`ToolDescriptor`]: the unit the bridge publishes to the MCP server.
//!
//! Modeled as a tagged variant dispatched through a uniform execute
//! interface (§9 "Dynamic tool shape → static polymorphism"), rather than
//! via any kind of runtime method synthesis.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The operation a tool handler performs, tagging the payload needed to
/// execute it. `ServiceInfo` and the ten `Lazy*` variants have no
/// entity/function binding — they resolve their target from the call
/// arguments at invocation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum HandlerBinding {
    Filter { entity_set: String },
    Count { entity_set: String },
    Search { entity_set: String },
    Get { entity_set: String },
    Create { entity_set: String },
    Update { entity_set: String },
    Delete { entity_set: String },
    Function { function_name: String },
    ServiceInfo,
    LazyList,
    LazyCount,
    LazyGet,
    LazyGetSchema,
    LazyCreate,
    LazyUpdate,
    LazyDelete,
    LazyListFunctions,
    LazyCallFunction,
}

impl HandlerBinding {
    /// The entity set this binding targets, if it has a fixed one (eager-mode
    /// bindings only — lazy bindings resolve their target from call arguments).
    #[must_use]
    pub fn fixed_entity_set(&self) -> Option<&str> {
        match self {
            Self::Filter { entity_set }
            | Self::Count { entity_set }
            | Self::Search { entity_set }
            | Self::Get { entity_set }
            | Self::Create { entity_set }
            | Self::Update { entity_set }
            | Self::Delete { entity_set } => Some(entity_set),
            _ => None,
        }
    }
}

/// A tool as published to the MCP server: immutable once constructed, never
/// mutated after the bridge builds the catalog (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique name, matching `^[A-Za-z0-9_.-]{1,64}$`.
    pub name: String,
    pub description: String,
    /// JSON-Schema object describing accepted arguments.
    pub input_schema: Value,
    pub handler: HandlerBinding,
}

/// Validate the tool name character-set invariant (§8 property 6).
#[must_use]
pub fn is_valid_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_names() {
        assert!(is_valid_tool_name("filter_Products_for_NorthSvc"));
        assert!(is_valid_tool_name("a"));
    }

    #[test]
    fn rejects_empty_too_long_or_invalid_chars() {
        assert!(!is_valid_tool_name(""));
        assert!(!is_valid_tool_name(&"a".repeat(65)));
        assert!(!is_valid_tool_name("has space"));
        assert!(!is_valid_tool_name("has/slash"));
    }

    #[test]
    fn fixed_entity_set_is_none_for_lazy_bindings() {
        assert_eq!(HandlerBinding::LazyList.fixed_entity_set(), None);
        assert_eq!(
            HandlerBinding::Get {
                entity_set: "Products".to_owned()
            }
            .fixed_entity_set(),
            Some("Products")
        );
    }
}
