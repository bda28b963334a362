//! OData success/error envelope parsing and response normalization (§4.2).

use odata_mcp_domain::catalog::ODataVersion;
use odata_mcp_domain::config::ResponseConfig;
use odata_mcp_domain::error::Error;
use serde_json::{Map, Value};

use super::dates::legacy_to_iso;

/// A uniform view over a v2 or v4 success envelope.
#[derive(Debug, Clone, Default)]
pub struct NormalizedEnvelope {
    pub value: Value,
    pub count: Option<i64>,
    pub next_link: Option<String>,
}

/// Parse a raw OData success envelope into the uniform `{value, count?,
/// nextLink?}` view (§4.2 step 1).
#[must_use]
pub fn parse_envelope(body: &Value, version: ODataVersion) -> NormalizedEnvelope {
    match version {
        ODataVersion::V2 => {
            let d = body.get("d").cloned().unwrap_or_else(|| body.clone());
            let count = d
                .get("__count")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<i64>().ok());
            let next_link = d
                .get("__next")
                .and_then(Value::as_str)
                .map(str::to_owned);
            let value = d.get("results").cloned().unwrap_or(d);
            NormalizedEnvelope {
                value,
                count,
                next_link,
            }
        }
        ODataVersion::V4 => {
            let count = body.get("@odata.count").and_then(Value::as_i64);
            let next_link = body
                .get("@odata.nextLink")
                .and_then(Value::as_str)
                .map(str::to_owned);
            let value = body.get("value").cloned().unwrap_or_else(|| body.clone());
            NormalizedEnvelope {
                value,
                count,
                next_link,
            }
        }
    }
}

/// A normalized OData error, independent of wire version.
#[derive(Debug, Clone)]
pub struct ODataError {
    pub code: String,
    pub message: String,
    pub target: Option<String>,
    pub details: Vec<Value>,
}

/// Parse a v2 or v4 error envelope; if the body doesn't parse as either
/// shape, preserve the raw body so the caller can surface it verbatim.
///
/// # Errors
/// Never returns an `Err` itself (error envelopes are data, not failures);
/// on unparseable input it returns an [`ODataError`] whose message is the
/// raw body text.
#[must_use]
pub fn parse_error_envelope(raw_body: &str) -> ODataError {
    let Ok(parsed) = serde_json::from_str::<Value>(raw_body) else {
        return ODataError {
            code: String::new(),
            message: raw_body.to_owned(),
            target: None,
            details: vec![],
        };
    };
    let Some(error) = parsed.get("error") else {
        return ODataError {
            code: String::new(),
            message: raw_body.to_owned(),
            target: None,
            details: vec![],
        };
    };

    let code = error
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    // v2 nests the human message as {"value": "..."}; v4 is a plain string.
    let message = error
        .get("message")
        .and_then(|m| {
            m.as_str()
                .map(str::to_owned)
                .or_else(|| m.get("value").and_then(Value::as_str).map(str::to_owned))
        })
        .unwrap_or_default();

    let target = error
        .get("target")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let details = error
        .get("details")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    ODataError {
        code,
        message,
        target,
        details,
    }
}

impl From<ODataError> for Error {
    fn from(e: ODataError) -> Self {
        Error::ODataClient {
            code: e.code,
            message: e.message,
            raw_body: None,
        }
    }
}

/// Whether a 403 response body carries an SAP CSRF-failure signal.
#[must_use]
pub fn is_csrf_failure(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("csrf") && (lower.contains("fail") || lower.contains("invalid"))
}

/// Truncation, date conversion, GUID short-forming, `__metadata` stripping,
/// and optional pagination-hint enrichment, applied in the order the spec
/// prescribes (§4.2 step 4: items first, then serialized-size).
pub fn normalize_response(
    mut envelope: NormalizedEnvelope,
    config: &ResponseConfig,
) -> Value {
    if config.legacy_dates {
        walk_convert_dates(&mut envelope.value);
    }
    strip_guid_wrappers(&mut envelope.value);
    if !config.response_metadata {
        strip_metadata_blocks(&mut envelope.value);
    }

    let mut truncated = false;
    let mut returned_count = None;

    if let Value::Array(items) = &mut envelope.value {
        let original_len = items.len();
        if original_len > config.max_items {
            items.truncate(config.max_items);
            truncated = true;
        }
        returned_count = Some(items.len());
    }

    let mut body_value = envelope.value.clone();
    let serialized_len = serde_json::to_string(&body_value).map(|s| s.len()).unwrap_or(0);
    if serialized_len > config.max_response_size {
        if let Value::Array(items) = &mut body_value {
            while serde_json::to_string(&items)
                .map(|s| s.len())
                .unwrap_or(0)
                > config.max_response_size
                && !items.is_empty()
            {
                items.pop();
            }
            truncated = true;
            returned_count = Some(items.len());
        }
    }

    let mut out = Map::new();
    out.insert("value".to_owned(), body_value);
    if let Some(count) = envelope.count {
        out.insert("count".to_owned(), Value::from(count));
    }
    if let Some(next) = envelope.next_link {
        out.insert("nextLink".to_owned(), Value::String(next));
    }

    if truncated {
        let mut metadata = Map::new();
        metadata.insert("truncated".to_owned(), Value::Bool(true));
        if let Some(n) = returned_count {
            metadata.insert("returned_count".to_owned(), Value::from(n));
        }
        metadata.insert(
            "warning".to_owned(),
            Value::String("response truncated to fit configured limits".to_owned()),
        );
        out.insert("metadata".to_owned(), Value::Object(metadata));
    }

    Value::Object(out)
}

fn walk_convert_dates(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(iso) = legacy_to_iso(s) {
                *s = iso;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(walk_convert_dates),
        Value::Object(map) => map.values_mut().for_each(walk_convert_dates),
        _ => {}
    }
}

fn strip_guid_wrappers(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(inner) = s.strip_prefix("guid'").and_then(|v| v.strip_suffix('\'')) {
                *s = inner.to_owned();
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_guid_wrappers),
        Value::Object(map) => map.values_mut().for_each(strip_guid_wrappers),
        _ => {}
    }
}

fn strip_metadata_blocks(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(strip_metadata_blocks),
        Value::Object(map) => {
            map.remove("__metadata");
            map.values_mut().for_each(strip_metadata_blocks);
        }
        _ => {}
    }
}

/// A caller-facing pagination hint (§4.2 step 5, opt-in via `paginationHints`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaginationHint {
    pub total_count: Option<i64>,
    pub current_count: usize,
    pub has_more: bool,
    pub suggested_next_call: Option<String>,
    pub skip: u64,
    pub top: u64,
}

/// Build a [`PaginationHint`] for a page of results, given the tool name the
/// caller would re-invoke and the `$skip`/`$top` that were used for this page.
#[must_use]
pub fn pagination_hint(
    tool_name: &str,
    current_count: usize,
    total_count: Option<i64>,
    skip: u64,
    top: u64,
) -> PaginationHint {
    let has_more = match total_count {
        Some(total) => i64::try_from(skip + u64::try_from(current_count).unwrap_or(0))
            .map(|seen| seen < total)
            .unwrap_or(false),
        None => current_count as u64 >= top && top > 0,
    };
    let suggested_next_call = has_more.then(|| {
        format!(
            "{tool_name}(\"$skip\": {}, \"$top\": {})",
            skip + top,
            top
        )
    });
    PaginationHint {
        total_count,
        current_count,
        has_more,
        suggested_next_call,
        skip,
        top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_v2_envelope_with_results_and_count() {
        let body = serde_json::json!({
            "d": {"results": [{"ProductID": 1}], "__count": "42"}
        });
        let env = parse_envelope(&body, ODataVersion::V2);
        assert_eq!(env.count, Some(42));
        assert_eq!(env.value.as_array().unwrap().len(), 1);
    }

    #[test]
    fn parses_v2_single_entity_envelope() {
        let body = serde_json::json!({"d": {"ProductID": 1}});
        let env = parse_envelope(&body, ODataVersion::V2);
        assert_eq!(env.value["ProductID"], 1);
    }

    #[test]
    fn parses_v4_envelope() {
        let body = serde_json::json!({
            "value": [{"ProductID": 1}],
            "@odata.count": 42,
            "@odata.nextLink": "https://host/Products?$skip=10"
        });
        let env = parse_envelope(&body, ODataVersion::V4);
        assert_eq!(env.count, Some(42));
        assert!(env.next_link.is_some());
    }

    #[test]
    fn parses_v2_error_envelope() {
        let err = parse_error_envelope(
            r#"{"error":{"code":"001","message":{"value":"bad request"}}}"#,
        );
        assert_eq!(err.code, "001");
        assert_eq!(err.message, "bad request");
    }

    #[test]
    fn parses_v4_error_envelope() {
        let err = parse_error_envelope(
            r#"{"error":{"code":"E1","message":"bad","target":"Name","details":[{"code":"E2"}]}}"#,
        );
        assert_eq!(err.code, "E1");
        assert_eq!(err.target.as_deref(), Some("Name"));
        assert_eq!(err.details.len(), 1);
    }

    #[test]
    fn unparseable_body_is_preserved_raw() {
        let err = parse_error_envelope("not json at all");
        assert_eq!(err.message, "not json at all");
    }

    #[test]
    fn csrf_failure_detection() {
        assert!(is_csrf_failure("CSRF token validation failed"));
        assert!(!is_csrf_failure("Forbidden"));
    }

    #[test]
    fn truncation_sets_metadata_and_returned_count() {
        let items: Vec<Value> = (0..500).map(|i| serde_json::json!({"id": i})).collect();
        let env = NormalizedEnvelope {
            value: Value::Array(items),
            count: None,
            next_link: None,
        };
        let config = ResponseConfig {
            max_items: 100,
            ..Default::default()
        };
        let out = normalize_response(env, &config);
        assert_eq!(out["value"].as_array().unwrap().len(), 100);
        assert_eq!(out["metadata"]["truncated"], true);
        assert_eq!(out["metadata"]["returned_count"], 100);
    }

    #[test]
    fn max_items_zero_yields_empty_truncated_list() {
        let items: Vec<Value> = vec![serde_json::json!({"id": 1})];
        let env = NormalizedEnvelope {
            value: Value::Array(items),
            count: None,
            next_link: None,
        };
        let config = ResponseConfig {
            max_items: 0,
            ..Default::default()
        };
        let out = normalize_response(env, &config);
        assert_eq!(out["value"].as_array().unwrap().len(), 0);
        assert_eq!(out["metadata"]["truncated"], true);
    }

    #[test]
    fn guid_wrappers_are_stripped_to_bare_strings() {
        let env = NormalizedEnvelope {
            value: serde_json::json!({"Token": "guid'11111111-2222-3333-4444-555555555555'"}),
            count: None,
            next_link: None,
        };
        let out = normalize_response(env, &ResponseConfig::default());
        assert_eq!(out["value"]["Token"], "11111111-2222-3333-4444-555555555555");
    }

    #[test]
    fn metadata_blocks_are_stripped_unless_opted_in() {
        let env = NormalizedEnvelope {
            value: serde_json::json!({"__metadata": {"uri": "x"}, "ProductID": 1}),
            count: None,
            next_link: None,
        };
        let out = normalize_response(env, &ResponseConfig::default());
        assert!(out["value"].get("__metadata").is_none());
    }
}
