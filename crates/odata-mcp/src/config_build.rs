//! Merges defaults, an optional TOML file, and CLI flags into a resolved
//! [`Configuration`] (§10.3). The core never parses configuration itself —
//! this is the one place that boundary is crossed, mirroring the teacher's
//! `ConfigLoader::load` (read file, deserialize, validate) though onto a flat
//! TOML document rather than Loco's YAML `settings:` convention.

use std::collections::HashSet;

use serde::Deserialize;

use odata_mcp_domain::config::{
    AuthMode, Configuration, FilterConfig, HttpBindConfig, LazyConfig, NamingMode,
    ObservabilityConfig, OpLetter, OperationPolicy, ResponseConfig, RetryConfig, ToolNamingConfig,
    TransportKind,
};
use odata_mcp_domain::hints::{Hint, HintSet};

use crate::cli::Cli;

/// The subset of [`Configuration`] that may be set from a TOML file,
/// everything optional so an absent file (or an absent key within one)
/// falls through to the CLI default or the domain default in turn.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileConfig {
    pub service_url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub cookie_file: Option<String>,
    pub cookie_string: Option<String>,
    pub transport: Option<String>,
    pub http_addr: Option<String>,
    pub security_expert_ack: Option<bool>,
    pub protocol_version: Option<String>,
    pub no_postfix: Option<bool>,
    pub shrink: Option<bool>,
    pub claude_code_friendly: Option<bool>,
    pub sort_tools: Option<bool>,
    pub service_id: Option<String>,
    pub entities: Option<Vec<String>>,
    pub functions: Option<Vec<String>>,
    pub enable_ops: Option<String>,
    pub disable_ops: Option<String>,
    pub read_only: Option<bool>,
    pub read_only_but_functions: Option<bool>,
    pub legacy_dates: Option<bool>,
    pub max_items: Option<usize>,
    pub max_response_size: Option<usize>,
    pub pagination_hints: Option<bool>,
    pub response_metadata: Option<bool>,
    pub retry_max_attempts: Option<u32>,
    pub retry_initial_backoff_ms: Option<u64>,
    pub retry_max_backoff_ms: Option<u64>,
    pub retry_backoff_multiplier: Option<f64>,
    pub http_timeout: Option<u64>,
    pub metadata_timeout: Option<u64>,
    pub lazy_metadata: Option<bool>,
    pub lazy_threshold: Option<usize>,
    pub hints_file: Option<String>,
}

impl FileConfig {
    fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {path}: {e}"))?;
        toml::from_str(&content).map_err(|e| anyhow::anyhow!("failed to parse config file {path}: {e}"))
    }
}

fn parse_transport(value: &str) -> anyhow::Result<TransportKind> {
    match value {
        "stdio" => Ok(TransportKind::Stdio),
        "http" => Ok(TransportKind::Http),
        "streamable-http" => Ok(TransportKind::StreamableHttp),
        other => Err(anyhow::anyhow!("unrecognized transport '{other}'")),
    }
}

fn resolve_auth(cli: &Cli, file: &FileConfig) -> anyhow::Result<AuthMode> {
    let user = cli.user.clone().or_else(|| file.user.clone());
    let password = cli.password.clone().or_else(|| file.password.clone());
    let cookie_file = cli.cookie_file.clone().or_else(|| file.cookie_file.clone());
    let cookie_string = cli.cookie_string.clone().or_else(|| file.cookie_string.clone());

    match (user, password, cookie_file, cookie_string) {
        (Some(user), Some(password), None, None) => Ok(AuthMode::Basic { user, password }),
        (None, None, Some(path), None) => Ok(AuthMode::CookieFile { path }),
        (None, None, None, Some(value)) => Ok(AuthMode::CookieString { value }),
        (None, None, None, None) => Ok(AuthMode::Anonymous),
        _ => Err(anyhow::anyhow!(
            "exactly one of {{user+password}}, cookieFile, cookieString, or none may be set"
        )),
    }
}

/// Parse one `--hint pattern=json-fragment` flag into a [`Hint`] at maximum
/// priority. The fragment is a JSON object with the same optional fields as
/// a file-sourced hint entry, minus `pattern`/`priority` (both implied).
fn parse_inline_hint(raw: &str) -> anyhow::Result<Hint> {
    let (pattern, fragment) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("--hint must be 'pattern=json-fragment', got '{raw}'"))?;

    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct Fragment {
        service_type: Option<String>,
        known_issues: Vec<String>,
        workarounds: Vec<String>,
        field_hints: std::collections::BTreeMap<String, odata_mcp_domain::hints::FieldHint>,
        examples: Vec<odata_mcp_domain::hints::HintExample>,
    }

    let parsed: Fragment = serde_json::from_str(fragment)
        .map_err(|e| anyhow::anyhow!("invalid --hint JSON fragment '{fragment}': {e}"))?;

    Ok(Hint {
        pattern: pattern.to_owned(),
        priority: 0,
        service_type: parsed.service_type,
        known_issues: parsed.known_issues,
        workarounds: parsed.workarounds,
        field_hints: parsed.field_hints,
        examples: parsed.examples,
    })
}

/// Build the [`HintSet`] from an optional hints file plus any `--hint`
/// overrides (§6 "Hints file", always winning via [`HintSet::push_override`]).
pub fn load_hints(hints_file: Option<&str>, inline: &[String]) -> anyhow::Result<HintSet> {
    let mut set = match hints_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read hints file {path}: {e}"))?;
            let parsed: odata_mcp_domain::hints::HintsFile = serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("failed to parse hints file {path}: {e}"))?;
            HintSet { hints: parsed.hints }
        }
        None => HintSet::default(),
    };

    for raw in inline {
        set.push_override(parse_inline_hint(raw)?);
    }

    Ok(set)
}

/// Resolve a fully-validated [`Configuration`] from `cli`, loading
/// `cli.config_file` first if given. CLI flags win over the file; the file
/// wins over the domain defaults already baked into each sub-config's
/// `Default` impl.
pub fn resolve(cli: &Cli) -> anyhow::Result<Configuration> {
    let file = match &cli.config_file {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let service_url = cli
        .service_url
        .clone()
        .or_else(|| file.service_url.clone())
        .ok_or_else(|| anyhow::anyhow!("serviceUrl is required (--service-url or config file)"))?;

    let transport_str = cli
        .transport
        .map(|t| match t {
            crate::cli::TransportArg::Stdio => "stdio".to_owned(),
            crate::cli::TransportArg::Http => "http".to_owned(),
            crate::cli::TransportArg::StreamableHttp => "streamable-http".to_owned(),
        })
        .or_else(|| file.transport.clone())
        .unwrap_or_else(|| "stdio".to_owned());
    let transport = parse_transport(&transport_str)?;

    let retry_default = RetryConfig::default();
    let response_default = ResponseConfig::default();
    let timeouts_default = odata_mcp_domain::config::TimeoutConfig::default();
    let lazy_default = LazyConfig::default();
    let http_bind_default = HttpBindConfig::default();
    let naming_default = ToolNamingConfig::default();

    let enabled_ops = cli
        .enable_ops
        .clone()
        .or_else(|| file.enable_ops.clone())
        .map(|s| OpLetter::parse_set(&s));
    let disabled_ops = cli
        .disable_ops
        .clone()
        .or_else(|| file.disable_ops.clone())
        .map(|s| OpLetter::parse_set(&s));

    let entities = if cli.entities.is_empty() {
        file.entities.clone().unwrap_or_default()
    } else {
        cli.entities.clone()
    };
    let functions = if cli.functions.is_empty() {
        file.functions.clone().unwrap_or_default()
    } else {
        cli.functions.clone()
    };

    let config = Configuration {
        service_url,
        auth: resolve_auth(cli, &file)?,
        transport,
        http_bind: HttpBindConfig {
            addr: cli
                .http_addr
                .clone()
                .or_else(|| file.http_addr.clone())
                .unwrap_or(http_bind_default.addr),
            security_expert_ack: cli.security_expert_ack
                || file.security_expert_ack.unwrap_or(false),
        },
        protocol_version: cli
            .protocol_version
            .clone()
            .or_else(|| file.protocol_version.clone())
            .unwrap_or_else(|| "2025-06-18".to_owned()),
        naming: ToolNamingConfig {
            mode: if cli.no_postfix || file.no_postfix.unwrap_or(false) {
                NamingMode::Prefix
            } else {
                NamingMode::Postfix
            },
            shrink: cli.shrink || file.shrink.unwrap_or(false),
            claude_code_friendly: cli.claude_code_friendly
                || file.claude_code_friendly.unwrap_or(false),
            sort_tools: cli.sort_tools || file.sort_tools.unwrap_or(false),
            service_id: cli
                .service_id
                .clone()
                .or_else(|| file.service_id.clone())
                .unwrap_or(naming_default.service_id),
        },
        entities: FilterConfig { patterns: entities },
        functions: FilterConfig { patterns: functions },
        operations: OperationPolicy {
            read_only: cli.read_only || file.read_only.unwrap_or(false),
            read_only_but_functions: cli.read_only_but_functions
                || file.read_only_but_functions.unwrap_or(false),
            enabled_ops: enabled_ops.filter(|s: &HashSet<_>| !s.is_empty()),
            disabled_ops: disabled_ops.filter(|s: &HashSet<_>| !s.is_empty()),
        },
        retry: RetryConfig {
            max_attempts: cli
                .retry_max_attempts
                .or(file.retry_max_attempts)
                .unwrap_or(retry_default.max_attempts),
            initial_backoff_ms: cli
                .retry_initial_backoff_ms
                .or(file.retry_initial_backoff_ms)
                .unwrap_or(retry_default.initial_backoff_ms),
            max_backoff_ms: cli
                .retry_max_backoff_ms
                .or(file.retry_max_backoff_ms)
                .unwrap_or(retry_default.max_backoff_ms),
            backoff_multiplier: cli
                .retry_backoff_multiplier
                .or(file.retry_backoff_multiplier)
                .unwrap_or(retry_default.backoff_multiplier),
            jitter_fraction: retry_default.jitter_fraction,
        },
        response: ResponseConfig {
            max_items: cli.max_items.or(file.max_items).unwrap_or(response_default.max_items),
            max_response_size: cli
                .max_response_size
                .or(file.max_response_size)
                .unwrap_or(response_default.max_response_size),
            pagination_hints: cli.pagination_hints || file.pagination_hints.unwrap_or(false),
            response_metadata: cli.response_metadata || file.response_metadata.unwrap_or(false),
            legacy_dates: cli.legacy_dates || file.legacy_dates.unwrap_or(false),
        },
        timeouts: odata_mcp_domain::config::TimeoutConfig {
            http_timeout_secs: cli
                .http_timeout
                .or(file.http_timeout)
                .unwrap_or(timeouts_default.http_timeout_secs),
            metadata_timeout_secs: cli
                .metadata_timeout
                .or(file.metadata_timeout)
                .unwrap_or(timeouts_default.metadata_timeout_secs),
        },
        lazy: LazyConfig {
            lazy_metadata: cli.lazy_metadata || file.lazy_metadata.unwrap_or(false),
            lazy_threshold: cli.lazy_threshold.or(file.lazy_threshold).unwrap_or(lazy_default.lazy_threshold),
        },
        hints_file: cli.hints_file.clone().or_else(|| file.hints_file.clone()),
        inline_hints: cli.hint.clone(),
        observability: ObservabilityConfig {
            verbose: cli.verbose,
            trace_mcp: cli.trace_mcp,
            trace_file: cli.trace_file.clone(),
        },
    };

    config.validate()?;
    Ok(config)
}
