//! The resolved [`Configuration`] value the core consumes.
//!
//! Nothing in this module parses CLI flags, `.env` files, or TOML — that is
//! the bin crate's job (§1 Non-goals). This module only defines the shape of
//! a fully-resolved configuration and the pure functions that derive
//! behavior from it, most importantly [`operation_allowed`], the single
//! pure function the spec's design notes (§9) call for to resolve the
//! `(Configuration, EntitySet, OperationLetter)` lattice.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::catalog::Capabilities;

/// Exactly one of these describes how the bridge authenticates to the
/// remote OData service (§6: "exactly one of ...").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthMode {
    Basic { user: String, password: String },
    CookieFile { path: String },
    CookieString { value: String },
    Anonymous,
}

/// Which MCP transport to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    Stdio,
    Http,
    StreamableHttp,
}

/// Tool-name postfix/prefix placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamingMode {
    /// `{op}_{Set}_for_{ServiceID}` (default).
    Postfix,
    /// `{ServiceID}_{Set}_{op}` (`--no-postfix`).
    Prefix,
}

/// A single operation letter from `{C,S,F,G,U,D,A,R}`. `R` is expanded to
/// `{S,F,G}` wherever it is parsed from configuration, so this enum never
/// needs an `R` variant itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpLetter {
    Create,
    Search,
    Filter,
    Get,
    Update,
    Delete,
    Action,
}

impl OpLetter {
    /// Parse the operation-letter grammar used by `--enable`/`--disable`,
    /// expanding `R` into `{Search, Filter, Get}`.
    #[must_use]
    pub fn parse_set(spec: &str) -> HashSet<Self> {
        let mut out = HashSet::new();
        for ch in spec.chars() {
            match ch.to_ascii_uppercase() {
                'C' => {
                    out.insert(Self::Create);
                }
                'S' => {
                    out.insert(Self::Search);
                }
                'F' => {
                    out.insert(Self::Filter);
                }
                'G' => {
                    out.insert(Self::Get);
                }
                'U' => {
                    out.insert(Self::Update);
                }
                'D' => {
                    out.insert(Self::Delete);
                }
                'A' => {
                    out.insert(Self::Action);
                }
                'R' => {
                    out.insert(Self::Search);
                    out.insert(Self::Filter);
                    out.insert(Self::Get);
                }
                _ => {}
            }
        }
        out
    }
}

/// Retry/backoff policy (§4.2): `delay = min(max, initial * multiplier^attempt)
/// ± jitterFraction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

/// Response-shaping knobs (§4.2 response normalization, §4.3 lazy mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    pub max_items: usize,
    pub max_response_size: usize,
    pub pagination_hints: bool,
    pub response_metadata: bool,
    pub legacy_dates: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            max_items: 1000,
            max_response_size: 2 * 1024 * 1024,
            pagination_hints: false,
            response_metadata: false,
            legacy_dates: false,
        }
    }
}

/// Tool-surface shaping (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolNamingConfig {
    pub mode: NamingMode,
    pub shrink: bool,
    pub claude_code_friendly: bool,
    pub sort_tools: bool,
    pub service_id: String,
}

impl Default for ToolNamingConfig {
    fn default() -> Self {
        Self {
            mode: NamingMode::Postfix,
            shrink: false,
            claude_code_friendly: false,
            sort_tools: false,
            service_id: "svc".to_owned(),
        }
    }
}

/// Operating-mode resolution inputs for the `(Configuration, EntitySet, Op) →
/// allow/deny` lattice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationPolicy {
    pub read_only: bool,
    pub read_only_but_functions: bool,
    pub enabled_ops: Option<HashSet<OpLetter>>,
    pub disabled_ops: Option<HashSet<OpLetter>>,
}

impl Default for OperationPolicy {
    fn default() -> Self {
        Self {
            read_only: false,
            read_only_but_functions: false,
            enabled_ops: None,
            disabled_ops: None,
        }
    }
}

impl OperationPolicy {
    /// Validate the mutual-exclusion rules (§6: "`--enable` and `--disable`
    /// are mutually exclusive").
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if both `enabled_ops` and
    /// `disabled_ops` are set, or if both `read_only` and
    /// `read_only_but_functions` are set.
    pub fn validate(&self) -> crate::Result<()> {
        if self.enabled_ops.is_some() && self.disabled_ops.is_some() {
            return Err(crate::Error::config(
                "--enable and --disable are mutually exclusive",
            ));
        }
        if self.read_only && self.read_only_but_functions {
            return Err(crate::Error::config(
                "--read-only and --read-only-but-functions are mutually exclusive",
            ));
        }
        Ok(())
    }
}

/// Whether `op` is permitted on an entity set with the given capabilities,
/// per the config/capability lattice (§4.3, §9 "Config → behavior lattice").
///
/// This is the single pure function the design notes call for: everything
/// that decides whether to synthesize a mutating tool routes through it.
#[must_use]
pub fn operation_allowed(policy: &OperationPolicy, caps: Capabilities, op: OpLetter) -> bool {
    let is_mutation = matches!(op, OpLetter::Create | OpLetter::Update | OpLetter::Delete);
    let is_function_call = op == OpLetter::Action;

    if policy.read_only && (is_mutation || is_function_call) {
        return false;
    }
    if policy.read_only_but_functions && is_mutation {
        return false;
    }

    if let Some(enabled) = &policy.enabled_ops {
        if !enabled.contains(&op) {
            return false;
        }
    }
    if let Some(disabled) = &policy.disabled_ops {
        if disabled.contains(&op) {
            return false;
        }
    }

    match op {
        OpLetter::Create => caps.creatable,
        OpLetter::Update => caps.updatable,
        OpLetter::Delete => caps.deletable,
        OpLetter::Search => caps.searchable,
        OpLetter::Filter | OpLetter::Get | OpLetter::Action => true,
    }
}

/// Glob allow/deny lists for entity sets and function imports (§4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Positive and negated (`!`-prefixed) glob patterns.
    pub patterns: Vec<String>,
}

impl FilterConfig {
    /// A name is included iff it matches at least one positive pattern and no
    /// negative pattern. An empty pattern list includes everything.
    #[must_use]
    pub fn includes(&self, name: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let (negatives, positives): (Vec<_>, Vec<_>) =
            self.patterns.iter().partition(|p| p.starts_with('!'));
        let matches_any_positive = positives.is_empty()
            || positives
                .iter()
                .any(|p| glob_match(p, name));
        let matches_any_negative = negatives
            .iter()
            .any(|p| glob_match(p.trim_start_matches('!'), name));
        matches_any_positive && !matches_any_negative
    }
}

/// Minimal `*`/`?` glob matcher, used instead of pulling in a dedicated
/// globbing dependency for single-segment name matching (entity-set and
/// function names never contain path separators, so full glob semantics are
/// unnecessary here; the `glob` crate is used instead for hint URL-pattern
/// matching, which does need path-aware semantics).
fn glob_match(pattern: &str, text: &str) -> bool {
    fn helper(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                helper(&p[1..], t) || (!t.is_empty() && helper(p, &t[1..]))
            }
            (Some(b'?'), Some(_)) => helper(&p[1..], &t[1..]),
            (Some(pc), Some(tc)) if pc == tc => helper(&p[1..], &t[1..]),
            _ => false,
        }
    }
    helper(pattern.as_bytes(), text.as_bytes())
}

/// Timeouts (§5): distinct budgets for ordinary requests versus metadata fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub http_timeout_secs: u64,
    pub metadata_timeout_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            metadata_timeout_secs: 60,
        }
    }
}

/// Lazy-mode shaping (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LazyConfig {
    pub lazy_metadata: bool,
    /// `0` disables threshold-based lazy activation.
    pub lazy_threshold: usize,
}

impl Default for LazyConfig {
    fn default() -> Self {
        Self {
            lazy_metadata: false,
            lazy_threshold: 0,
        }
    }
}

/// Observability toggles, consumed by the bin crate's logging/trace setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub verbose: bool,
    pub trace_mcp: bool,
    pub trace_file: Option<String>,
}

/// HTTP transport bind configuration (§4.5 security posture).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpBindConfig {
    pub addr: String,
    /// Required `true` to bind to a non-loopback address.
    pub security_expert_ack: bool,
}

impl Default for HttpBindConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_owned(),
            security_expert_ack: false,
        }
    }
}

/// The fully-resolved configuration value the core consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub service_url: String,
    pub auth: AuthMode,
    pub transport: TransportKind,
    pub http_bind: HttpBindConfig,
    pub protocol_version: String,
    pub naming: ToolNamingConfig,
    pub entities: FilterConfig,
    pub functions: FilterConfig,
    pub operations: OperationPolicy,
    pub retry: RetryConfig,
    pub response: ResponseConfig,
    pub timeouts: TimeoutConfig,
    pub lazy: LazyConfig,
    pub hints_file: Option<String>,
    pub inline_hints: Vec<String>,
    pub observability: ObservabilityConfig,
}

impl Configuration {
    /// Validate cross-field invariants not already enforced by individual
    /// sub-configs. Called once at startup; failures are fatal (`ConfigError`, §7).
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] on any invalid combination.
    pub fn validate(&self) -> crate::Result<()> {
        self.operations.validate()?;
        if self.service_url.trim().is_empty() {
            return Err(crate::Error::config("serviceUrl is required"));
        }
        if self.response.max_items > 10_000 {
            return Err(crate::Error::config("maxItems must be <= 10000"));
        }
        if self.transport != TransportKind::Stdio {
            let is_loopback = self.http_bind.addr.starts_with("127.")
                || self.http_bind.addr.starts_with("[::1]")
                || self.http_bind.addr.starts_with("localhost");
            if !is_loopback && !self.http_bind.security_expert_ack {
                return Err(crate::Error::config(
                    "binding to a non-loopback address requires an explicit security acknowledgement",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_letter_parsing_expands_r() {
        let set = OpLetter::parse_set("R");
        assert!(set.contains(&OpLetter::Search));
        assert!(set.contains(&OpLetter::Filter));
        assert!(set.contains(&OpLetter::Get));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn enable_and_disable_are_mutually_exclusive() {
        let policy = OperationPolicy {
            enabled_ops: Some(OpLetter::parse_set("G")),
            disabled_ops: Some(OpLetter::parse_set("D")),
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn read_only_blocks_mutations_and_functions() {
        let policy = OperationPolicy {
            read_only: true,
            ..Default::default()
        };
        let caps = Capabilities::default();
        assert!(!operation_allowed(&policy, caps, OpLetter::Create));
        assert!(!operation_allowed(&policy, caps, OpLetter::Action));
        assert!(operation_allowed(&policy, caps, OpLetter::Get));
    }

    #[test]
    fn read_only_but_functions_permits_actions() {
        let policy = OperationPolicy {
            read_only_but_functions: true,
            ..Default::default()
        };
        let caps = Capabilities::default();
        assert!(!operation_allowed(&policy, caps, OpLetter::Create));
        assert!(operation_allowed(&policy, caps, OpLetter::Action));
    }

    #[test]
    fn capability_flag_gates_mutation_even_when_enabled() {
        let policy = OperationPolicy::default();
        let mut caps = Capabilities::default();
        caps.creatable = false;
        assert!(!operation_allowed(&policy, caps, OpLetter::Create));
    }

    #[test]
    fn disabled_ops_overrides_capability_default() {
        let policy = OperationPolicy {
            disabled_ops: Some(OpLetter::parse_set("D")),
            ..Default::default()
        };
        let caps = Capabilities::default();
        assert!(!operation_allowed(&policy, caps, OpLetter::Delete));
    }

    #[test]
    fn filter_config_glob_and_negation() {
        let filter = FilterConfig {
            patterns: vec!["*".to_owned(), "!*Draft*".to_owned()],
        };
        assert!(filter.includes("Products"));
        assert!(!filter.includes("OrderDrafts"));
    }

    #[test]
    fn empty_filter_includes_everything() {
        let filter = FilterConfig::default();
        assert!(filter.includes("Anything"));
    }
}
