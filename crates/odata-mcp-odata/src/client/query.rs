//! Query-option translation, composite-key URL construction, and the SAP
//! GUID-literal rewriting quirk (§4.2).

use std::collections::BTreeMap;

use odata_mcp_domain::catalog::{EntityType, ODataVersion};
use odata_mcp_domain::edm::EdmType;

/// A single OData query option, version-agnostic on the caller's side — the
/// caller always supplies v4-style names (`$count`, `$search`); translation
/// to the target version's wire form happens in [`to_query_string`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filter: Option<String>,
    pub select: Option<String>,
    pub expand: Option<String>,
    pub orderby: Option<String>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: Option<bool>,
    pub search: Option<String>,
}

/// Render query options as a `key=value&...` string for `target_version`,
/// percent-encoding spaces as `%20` (never `+`, §4.2).
#[must_use]
pub fn to_query_string(opts: &QueryOptions, target_version: ODataVersion) -> String {
    let mut parts: Vec<(String, String)> = Vec::new();
    if let Some(f) = &opts.filter {
        parts.push(("$filter".to_owned(), f.clone()));
    }
    if let Some(s) = &opts.select {
        parts.push(("$select".to_owned(), s.clone()));
    }
    if let Some(e) = &opts.expand {
        parts.push(("$expand".to_owned(), e.clone()));
    }
    if let Some(o) = &opts.orderby {
        parts.push(("$orderby".to_owned(), o.clone()));
    }
    if let Some(t) = opts.top {
        parts.push(("$top".to_owned(), t.to_string()));
    }
    if let Some(s) = opts.skip {
        parts.push(("$skip".to_owned(), s.to_string()));
    }
    if let Some(count) = opts.count {
        match target_version {
            ODataVersion::V2 => {
                if count {
                    parts.push(("$inlinecount".to_owned(), "allpages".to_owned()));
                }
            }
            ODataVersion::V4 => {
                parts.push(("$count".to_owned(), count.to_string()));
            }
        }
    }
    if let Some(s) = &opts.search {
        parts.push(("$search".to_owned(), s.clone()));
    }

    parts
        .into_iter()
        .map(|(k, v)| format!("{k}={}", encode_query_value(&v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode a query value, using `%20` for spaces rather than `+`.
#[must_use]
pub fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b','
            | b':' | b'\'' | b'(' | b')' | b'/' | b'$' | b'=' | b'&' | b'*' => {
                out.push(byte as char);
            }
            b' ' => out.push_str("%20"),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Build the deterministic composite-key segment for a `GetEntity`-style URL:
/// `K1='v1',K2=guid'...'`, with key components sorted lexicographically by
/// name so identical key maps yield byte-identical URLs across runs (§4.2,
/// §8 property 1).
#[must_use]
pub fn format_key_segment(entity_type: &EntityType, keys: &BTreeMap<String, String>) -> String {
    let mut sorted: Vec<(&String, &String)> = keys.iter().collect();
    sorted.sort_by_key(|(name, _)| name.as_str());

    if sorted.len() == 1 {
        let (name, value) = sorted[0];
        return format_key_value(entity_type, name, value);
    }

    sorted
        .into_iter()
        .map(|(name, value)| format!("{name}={}", format_key_value(entity_type, name, value)))
        .collect::<Vec<_>>()
        .join(",")
}

fn format_key_value(entity_type: &EntityType, name: &str, value: &str) -> String {
    let edm_type = entity_type
        .property(name)
        .map(|p| &p.edm_type)
        .unwrap_or(&EdmType::String);
    match edm_type {
        EdmType::Guid => format!("guid'{value}'"),
        _ if edm_type.is_numeric() || matches!(edm_type, EdmType::Boolean) => value.to_owned(),
        _ => format!("'{value}'"),
    }
}

/// Rewrite bare GUID literals in a `$filter` expression into SAP's
/// `guid'...'` literal form, for every property of `entity_type` whose EDM
/// type is `Edm.Guid`. Tokenizes the filter instead of regex-matching across
/// quoted string literals, so a GUID-shaped value inside an unrelated string
/// constant is left untouched.
#[must_use]
pub fn rewrite_guid_literals(filter: &str, entity_type: &EntityType) -> String {
    let guid_props: Vec<&str> = entity_type
        .properties
        .iter()
        .filter(|p| p.edm_type == EdmType::Guid)
        .map(|p| p.name.as_str())
        .collect();
    if guid_props.is_empty() {
        return filter.to_owned();
    }

    let tokens = tokenize_filter(filter);
    let mut out = String::with_capacity(filter.len());
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if guid_props.contains(&token.as_str()) {
            // Expect: <prop> <op> '<guid>' — look ahead past whitespace/operator tokens
            // for the next quoted literal and rewrite it, unless it is already
            // immediately preceded by a `guid` marker (idempotency: rewriting twice
            // must equal rewriting once).
            if let Some(j) = find_next_quoted(&tokens, i + 1) {
                let already_wrapped = j > 0 && tokens[j - 1] == "guid";
                if !already_wrapped {
                    out.push_str(token);
                    for t in &tokens[i + 1..j] {
                        out.push_str(t);
                    }
                    out.push_str(&format!("guid{}", tokens[j]));
                    i = j + 1;
                    continue;
                }
            }
        }
        out.push_str(token);
        i += 1;
    }
    out
}

fn find_next_quoted(tokens: &[String], start: usize) -> Option<usize> {
    tokens[start..]
        .iter()
        .position(|t| is_quoted_literal(t))
        .map(|idx| start + idx)
        .filter(|&idx| idx - start <= 6) // only look within the immediate comparison
}

fn is_quoted_literal(token: &str) -> bool {
    token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'')
}

/// Split a filter expression into tokens: quoted string literals stay intact
/// as single tokens; everything else splits on word boundaries/whitespace,
/// preserving the original text exactly when tokens are re-joined.
fn tokenize_filter(filter: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = filter.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\'' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                i += 1;
            }
            if i < chars.len() {
                i += 1; // consume closing quote
            }
            tokens.push(chars[start..i].iter().collect());
        } else if chars[i].is_whitespace() {
            let start = i;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        } else if chars[i].is_alphanumeric() || chars[i] == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        } else {
            tokens.push(chars[i].to_string());
            i += 1;
        }
    }
    tokens
}

/// Stringify numeric JSON values in a create/update payload, because SAP v2
/// readers reject unquoted numerics for some EDM types (§4.2). Applied only
/// to top-level scalar fields matching properties typed as numeric.
pub fn stringify_numerics_for_sap(payload: &mut serde_json::Value, entity_type: &EntityType) {
    let Some(obj) = payload.as_object_mut() else {
        return;
    };
    for property in &entity_type.properties {
        if !property.edm_type.is_numeric() {
            continue;
        }
        if let Some(value) = obj.get_mut(&property.name) {
            if let Some(n) = value.as_f64() {
                *value = serde_json::Value::String(format_numeric(value, n));
            }
        }
    }
}

fn format_numeric(value: &serde_json::Value, fallback: f64) -> String {
    value
        .as_i64()
        .map(|v| v.to_string())
        .or_else(|| value.as_u64().map(|v| v.to_string()))
        .unwrap_or_else(|| fallback.to_string())
}
