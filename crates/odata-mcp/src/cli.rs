//! Command-line surface (§6). Every flag here lands in a [`Configuration`]
//! field via [`crate::config_build::resolve`], which layers defaults, an
//! optional TOML file, and these flags (in that priority order — a scalar
//! left unset here falls through to the file, then to the domain default).
//! Nothing is interpreted here beyond parsing.

use clap::Parser;

use odata_mcp_domain::config::TransportKind;

#[derive(Debug, Parser)]
#[command(name = "odata-mcp")]
#[command(about = "Bridges an OData v2/v4 service to MCP tools")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Path to a TOML configuration file, merged underneath these flags.
    #[arg(long, env = "ODATA_MCP_CONFIG")]
    pub config_file: Option<String>,

    /// OData service base URL (required, here or in the config file).
    #[arg(long, env = "ODATA_MCP_SERVICE_URL")]
    pub service_url: Option<String>,

    /// Basic-auth username. Requires `--password`.
    #[arg(long, env = "ODATA_MCP_USER")]
    pub user: Option<String>,

    /// Basic-auth password. Requires `--user`.
    #[arg(long, env = "ODATA_MCP_PASSWORD")]
    pub password: Option<String>,

    /// Path to a file holding a raw `Cookie` header value.
    #[arg(long)]
    pub cookie_file: Option<String>,

    /// A raw `Cookie` header value, given directly.
    #[arg(long)]
    pub cookie_string: Option<String>,

    /// Which MCP transport to serve. Defaults to `stdio`.
    #[arg(long, value_enum)]
    pub transport: Option<TransportArg>,

    /// Listen address for `http`/`streamable-http` transports.
    #[arg(long)]
    pub http_addr: Option<String>,

    /// Required to bind `--http-addr` to a non-loopback address.
    #[arg(long)]
    pub security_expert_ack: bool,

    /// MCP protocol version to advertise in `initialize`.
    #[arg(long)]
    pub protocol_version: Option<String>,

    /// Use `{ServiceID}_{Set}_{op}` tool names instead of the postfix default.
    #[arg(long)]
    pub no_postfix: bool,

    /// Abbreviate verbs in synthesized tool names (`get`→`g`, etc.).
    #[arg(long)]
    pub shrink: bool,

    /// Strip `$` from OData system property names in input schemas.
    #[arg(long)]
    pub claude_code_friendly: bool,

    /// Alphabetize the synthesized tool catalog.
    #[arg(long)]
    pub sort_tools: bool,

    /// Short identifier embedded in synthesized tool names.
    #[arg(long)]
    pub service_id: Option<String>,

    /// Glob allow/deny patterns (repeatable, `!`-prefixed to deny) for entity sets.
    #[arg(long = "entities")]
    pub entities: Vec<String>,

    /// Glob allow/deny patterns (repeatable, `!`-prefixed to deny) for function imports.
    #[arg(long = "functions")]
    pub functions: Vec<String>,

    /// Operation letters from `{C,S,F,G,U,D,A,R}` to enable exclusively.
    #[arg(long)]
    pub enable_ops: Option<String>,

    /// Operation letters from `{C,S,F,G,U,D,A,R}` to suppress.
    #[arg(long)]
    pub disable_ops: Option<String>,

    /// Suppress every mutating and function-call tool.
    #[arg(long)]
    pub read_only: bool,

    /// Suppress mutating tools but keep function-import tools.
    #[arg(long)]
    pub read_only_but_functions: bool,

    /// Convert `/Date(…)/` literals to/from ISO-8601 at the bridge boundary.
    #[arg(long)]
    pub legacy_dates: bool,

    /// Maximum items returned by a single list/search call (≤10000).
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Maximum serialized response size in bytes before truncation.
    #[arg(long)]
    pub max_response_size: Option<usize>,

    /// Attach pagination cursors/hints to list responses.
    #[arg(long)]
    pub pagination_hints: bool,

    /// Attach response metadata (entity type, capabilities) to responses.
    #[arg(long)]
    pub response_metadata: bool,

    /// Maximum retry attempts for a retryable OData request.
    #[arg(long)]
    pub retry_max_attempts: Option<u32>,

    /// Initial retry backoff, in milliseconds.
    #[arg(long)]
    pub retry_initial_backoff_ms: Option<u64>,

    /// Maximum retry backoff, in milliseconds.
    #[arg(long)]
    pub retry_max_backoff_ms: Option<u64>,

    /// Retry backoff multiplier.
    #[arg(long)]
    pub retry_backoff_multiplier: Option<f64>,

    /// Per-request HTTP timeout, in seconds.
    #[arg(long)]
    pub http_timeout: Option<u64>,

    /// `$metadata` fetch timeout, in seconds.
    #[arg(long)]
    pub metadata_timeout: Option<u64>,

    /// Always build the ten fixed generic tools instead of one tool per
    /// entity-set operation.
    #[arg(long)]
    pub lazy_metadata: bool,

    /// Switch to lazy mode when the eager tool count would exceed this
    /// threshold. `0` disables threshold-based activation.
    #[arg(long)]
    pub lazy_threshold: Option<usize>,

    /// Path to a hints JSON document (§6).
    #[arg(long)]
    pub hints_file: Option<String>,

    /// An inline hint override, `pattern=json-fragment` (repeatable).
    #[arg(long = "hint")]
    pub hint: Vec<String>,

    /// Emit debug-level logs.
    #[arg(long)]
    pub verbose: bool,

    /// Log every JSON-RPC request/response at trace level.
    #[arg(long)]
    pub trace_mcp: bool,

    /// Write trace output to this file instead of stderr.
    #[arg(long)]
    pub trace_file: Option<String>,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportArg {
    Stdio,
    Http,
    StreamableHttp,
}

impl From<TransportArg> for TransportKind {
    fn from(value: TransportArg) -> Self {
        match value {
            TransportArg::Stdio => TransportKind::Stdio,
            TransportArg::Http => TransportKind::Http,
            TransportArg::StreamableHttp => TransportKind::StreamableHttp,
        }
    }
}
