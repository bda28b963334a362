//! Thin wrapper around the `glob` crate's pattern matcher for full-URL hint
//! patterns (which, unlike entity/function name filters, need path-aware
//! semantics since they match against a complete service URL).

/// Match `text` (a full service URL) against `pattern` (a glob as used in
/// the hints file, e.g. `https://*.sap.example.com/*`).
#[must_use]
pub fn glob_match_path(pattern: &str, text: &str) -> bool {
    glob::Pattern::new(pattern)
        .map(|p| p.matches(text))
        .unwrap_or(false)
}
