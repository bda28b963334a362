//! Exponential backoff, retryable-status classification, and `Retry-After`
//! parsing (§4.2, §8 "Retry bound").

use std::time::Duration;

use chrono::Utc;
use odata_mcp_domain::config::RetryConfig;
use rand::Rng;

/// Whether an HTTP status code is retried under the transient-failure policy.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Whether a request method is safe to retry after a network-level failure
/// (before any response was received). GET/HEAD and friends are always
/// retried; mutating methods are retried only when nothing could possibly
/// have reached the server.
#[must_use]
pub fn is_idempotent_method(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "GET" | "HEAD" | "OPTIONS"
    )
}

/// `delay = min(max, initial * multiplier^attempt) ± jitterFraction`,
/// `attempt` zero-indexed from the first retry (not the original try).
#[must_use]
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64);
    let jitter_span = capped * config.jitter_fraction;
    let jitter = if jitter_span > 0.0 {
        rand::thread_rng().gen_range(-jitter_span..=jitter_span)
    } else {
        0.0
    };
    let millis = (capped + jitter).max(0.0);
    Duration::from_millis(millis as u64)
}

/// Parse a `Retry-After` header value, which is either a delay in seconds or
/// an HTTP-date (RFC 7231 IMF-fixdate). Returns `None` for unparseable values
/// or dates in the past.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let target = chrono::NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT").ok()?;
    let target = target.and_utc();
    let now = Utc::now();
    (target > now)
        .then(|| (target - now).to_std().ok())
        .flatten()
}

/// The number of attempts permitted for a single logical operation:
/// the original try plus `max_attempts` retries (§8: "attempt count <=
/// retryMaxAttempts + 1").
#[must_use]
pub fn max_total_attempts(config: &RetryConfig) -> u32 {
    config.max_attempts + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }

    #[test]
    fn retryable_statuses_match_spec_set() {
        for s in [408, 429, 500, 502, 503, 504] {
            assert!(is_retryable_status(s));
        }
        for s in [400, 401, 403, 404, 409, 422] {
            assert!(!is_retryable_status(s));
        }
    }

    #[test]
    fn get_and_head_are_idempotent_post_is_not() {
        assert!(is_idempotent_method("get"));
        assert!(is_idempotent_method("HEAD"));
        assert!(!is_idempotent_method("POST"));
        assert!(!is_idempotent_method("PATCH"));
    }

    #[test]
    fn backoff_grows_and_respects_cap() {
        let cfg = config();
        let d0 = backoff_delay(0, &cfg);
        let d1 = backoff_delay(1, &cfg);
        assert!(d0.as_millis() >= 90 && d0.as_millis() <= 110);
        assert!(d1.as_millis() >= 180 && d1.as_millis() <= 220);
        let d_big = backoff_delay(20, &cfg);
        assert!(d_big.as_millis() <= (cfg.max_backoff_ms as f64 * 1.1) as u128);
    }

    #[test]
    fn total_attempts_is_max_attempts_plus_one() {
        assert_eq!(max_total_attempts(&config()), 4);
    }

    #[test]
    fn retry_after_parses_seconds() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
    }

    #[test]
    fn retry_after_rejects_garbage() {
        assert_eq!(parse_retry_after("not-a-date-or-number"), None);
    }
}
