//! Tool-name construction: postfix/prefix placement, shrinking, sanitizing,
//! and collision resolution (§4.3).

use std::collections::HashSet;

use odata_mcp_domain::config::NamingMode;

/// Shrink a verb per `--tool-shrink` (`update` → `upd`, `delete` → `del`).
#[must_use]
pub fn shrink_verb(verb: &str, shrink: bool) -> &str {
    if !shrink {
        return verb;
    }
    match verb {
        "update" => "upd",
        "delete" => "del",
        other => other,
    }
}

/// Build a raw (pre-sanitize, pre-collision) tool name for an entity-set
/// operation, in postfix mode `"{op}_{Set}_for_{ServiceID}"` (default) or
/// prefix mode `"{ServiceID}_{Set}_{op}"` (`--no-postfix`).
#[must_use]
pub fn build_entity_tool_name(mode: NamingMode, verb: &str, entity_set: &str, service_id: &str) -> String {
    match mode {
        NamingMode::Postfix => format!("{verb}_{entity_set}_for_{service_id}"),
        NamingMode::Prefix => format!("{service_id}_{entity_set}_{verb}"),
    }
}

/// Sanitize a raw name into the `^[A-Za-z0-9_.-]{1,64}$` alphabet, then
/// truncate to 64 bytes if still too long (§4.3, §8 property 6).
#[must_use]
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') { c } else { '_' })
        .collect();
    let cleaned = if cleaned.is_empty() { "_".to_owned() } else { cleaned };
    if cleaned.len() > 64 {
        cleaned.chars().take(64).collect()
    } else {
        cleaned
    }
}

/// Resolve collisions in `names` (parallel to the tools they name) by
/// appending a numeric suffix to later duplicates, re-truncating to stay
/// within the 64-character limit.
pub fn resolve_collisions(names: &mut [String]) {
    let mut seen: HashSet<String> = HashSet::new();
    for name in names.iter_mut() {
        if seen.insert(name.clone()) {
            continue;
        }
        let mut n = 2;
        loop {
            let suffix = format!("_{n}");
            let max_base_len = 64usize.saturating_sub(suffix.len());
            let base: String = name.chars().take(max_base_len).collect();
            let candidate = format!("{base}{suffix}");
            if seen.insert(candidate.clone()) {
                *name = candidate;
                break;
            }
            n += 1;
        }
    }
}

/// If `claude_code_friendly` is set, rewrite a `$`-prefixed OData query-option
/// name (`$filter`) into a bare identifier (`filter`) for the tool's exposed
/// input-schema property name (§4.3).
#[must_use]
pub fn friendly_property_name(odata_name: &str, claude_code_friendly: bool) -> String {
    if claude_code_friendly {
        odata_name.trim_start_matches('$').to_owned()
    } else {
        odata_name.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postfix_and_prefix_naming_match_spec_templates() {
        assert_eq!(
            build_entity_tool_name(NamingMode::Postfix, "filter", "Products", "NorthSvc"),
            "filter_Products_for_NorthSvc"
        );
        assert_eq!(
            build_entity_tool_name(NamingMode::Prefix, "filter", "Products", "NorthSvc"),
            "NorthSvc_Products_filter"
        );
    }

    #[test]
    fn shrink_abbreviates_update_and_delete_only() {
        assert_eq!(shrink_verb("update", true), "upd");
        assert_eq!(shrink_verb("delete", true), "del");
        assert_eq!(shrink_verb("filter", true), "filter");
        assert_eq!(shrink_verb("update", false), "update");
    }

    #[test]
    fn sanitize_replaces_invalid_characters_and_truncates() {
        assert_eq!(sanitize_name("filter Products!"), "filter_Products_");
        let long = "a".repeat(100);
        assert_eq!(sanitize_name(&long).len(), 64);
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let mut names = vec!["foo".to_owned(), "foo".to_owned(), "foo".to_owned()];
        resolve_collisions(&mut names);
        assert_eq!(names[0], "foo");
        assert_eq!(names[1], "foo_2");
        assert_eq!(names[2], "foo_3");
    }

    #[test]
    fn friendly_name_strips_dollar_prefix() {
        assert_eq!(friendly_property_name("$filter", true), "filter");
        assert_eq!(friendly_property_name("$filter", false), "$filter");
    }

}
