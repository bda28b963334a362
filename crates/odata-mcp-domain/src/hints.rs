//! Pattern-matched, priority-merged per-service hints (§3, §4.5).
//!
//! A [`HintSet`] is static configuration, not intelligence: it is used for
//! two distinct purposes kept deliberately separate in code (§9) — SAP-flavor
//! detection when URL heuristics are ambiguous, and surfacing documentation
//! through the `odata_service_info` tool. Callers needing the former should
//! use [`HintSet::sap_flavor_override`]; callers needing the latter should
//! use [`HintSet::merged_for`].

use serde::{Deserialize, Serialize};

/// A single documentation example attached to a hint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HintExample {
    pub description: String,
    pub query: String,
    pub note: Option<String>,
}

/// Per-field documentation (type/format/example/description) surfaced to
/// clients building query or payload arguments.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FieldHint {
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    pub format: Option<String>,
    pub example: Option<String>,
    pub description: Option<String>,
}

/// A single hint entry, matched against a service URL by glob pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hint {
    /// Glob pattern matched against the full service URL.
    pub pattern: String,
    pub priority: i32,
    pub service_type: Option<String>,
    #[serde(default)]
    pub known_issues: Vec<String>,
    #[serde(default)]
    pub workarounds: Vec<String>,
    #[serde(default)]
    pub field_hints: std::collections::BTreeMap<String, FieldHint>,
    #[serde(default)]
    pub examples: Vec<HintExample>,
}

/// The on-disk hints-file shape (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintsFile {
    pub version: u32,
    pub hints: Vec<Hint>,
}

/// A loaded collection of hints, ready to be matched against a service URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HintSet {
    pub hints: Vec<Hint>,
}

/// The result of merging every hint matching a URL, by priority (higher wins
/// on scalar conflicts; list fields are concatenated in priority order).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MergedHints {
    pub service_type: Option<String>,
    pub known_issues: Vec<String>,
    pub workarounds: Vec<String>,
    pub field_hints: std::collections::BTreeMap<String, FieldHint>,
    pub examples: Vec<HintExample>,
}

impl HintSet {
    /// Add a hint parsed from the `--hint pattern=json-fragment` CLI flag at
    /// maximum priority, so it always wins over file-sourced hints (§11 of
    /// `SPEC_FULL.md`).
    pub fn push_override(&mut self, mut hint: Hint) {
        hint.priority = i32::MAX;
        self.hints.push(hint);
    }

    fn matching(&self, service_url: &str) -> Vec<&Hint> {
        let mut matches: Vec<&Hint> = self
            .hints
            .iter()
            .filter(|h| crate::glob::glob_match_path(&h.pattern, service_url))
            .collect();
        matches.sort_by_key(|h| h.priority);
        matches
    }

    /// Priority-merge every hint matching `service_url` into one [`MergedHints`].
    #[must_use]
    pub fn merged_for(&self, service_url: &str) -> MergedHints {
        let mut merged = MergedHints::default();
        for hint in self.matching(service_url) {
            if hint.service_type.is_some() {
                merged.service_type = hint.service_type.clone();
            }
            merged.known_issues.extend(hint.known_issues.iter().cloned());
            merged.workarounds.extend(hint.workarounds.iter().cloned());
            for (k, v) in &hint.field_hints {
                merged.field_hints.insert(k.clone(), v.clone());
            }
            merged.examples.extend(hint.examples.iter().cloned());
        }
        merged
    }

    /// Whether any matching hint explicitly declares an SAP `serviceType`,
    /// used by SAP-flavor detection as an override when URL heuristics are
    /// ambiguous (§4.2, §9 Open Questions).
    #[must_use]
    pub fn sap_flavor_override(&self, service_url: &str) -> Option<bool> {
        self.matching(service_url)
            .iter()
            .rev()
            .find_map(|h| h.service_type.as_ref())
            .map(|t| t.to_ascii_lowercase().contains("sap"))
    }
}
