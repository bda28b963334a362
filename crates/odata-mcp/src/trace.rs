//! Logging setup (§10.2): `tracing` + `tracing-subscriber`, stderr-only (or
//! an optional trace file) since stdio's JSON-RPC frames own stdout. A
//! masking function redacts sensitive-looking values before any line is
//! written, shared by both the ordinary logging layer and the `--trace-mcp`
//! traffic dumper.

use std::fs::OpenOptions;
use std::io;

use odata_mcp_domain::config::ObservabilityConfig;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

const SENSITIVE_KEYS: [&str; 6] = ["password", "token", "secret", "csrf", "authorization", "cookie"];

/// Redact the value of any `key: value` or `"key":"value"`-shaped pair whose
/// key matches a sensitive heuristic, case-insensitively. Conservative by
/// design: it only ever replaces a matched value with `"***"`, never removes
/// or reorders anything else in the line, so a missed match degrades to
/// "logged the value" rather than "corrupted the log line".
#[must_use]
pub fn redact_line(line: &str) -> String {
    let mut out = line.to_owned();
    for key in SENSITIVE_KEYS {
        out = redact_key(&out, key);
    }
    out
}

fn redact_key(line: &str, key: &str) -> String {
    let pattern = regex::Regex::new(&format!(
        r#"(?i)("{key}"\s*:\s*")([^"]*)(")|({key}\s*=\s*)(\S+)"#
    ))
    .expect("static redaction pattern is valid");
    pattern
        .replace_all(line, |caps: &regex::Captures| {
            if caps.get(1).is_some() {
                format!("{}***{}", &caps[1], &caps[3])
            } else {
                format!("{}***", &caps[4])
            }
        })
        .into_owned()
}

/// Initialize the global `tracing` subscriber per `observability` (§6
/// `verbose`/`traceFile`). stdout is never used as a writer target — the
/// stdio transport contract (§4.5) requires it stay reserved for JSON-RPC
/// frames.
///
/// # Errors
/// Returns an error if `observability.trace_file` cannot be opened for
/// appending.
pub fn init(observability: &ObservabilityConfig, json: bool) -> anyhow::Result<()> {
    let writer: BoxMakeWriter = match &observability.trace_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("failed to open trace file {path}: {e}"))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(io::stderr),
    };

    let default_level = if observability.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_json_shaped_password() {
        let line = r#"{"user":"alice","password":"hunter2"}"#;
        let redacted = redact_line(line);
        assert!(redacted.contains("\"password\":\"***\""));
        assert!(redacted.contains("\"user\":\"alice\""));
    }

    #[test]
    fn redacts_key_value_cookie() {
        let line = "sending request with cookie=sid-abc123";
        let redacted = redact_line(line);
        assert_eq!(redacted, "sending request with cookie=***");
    }

    #[test]
    fn leaves_unrelated_text_untouched() {
        let line = "fetched 42 entities from Products";
        assert_eq!(redact_line(line), line);
    }
}
