//! SAP CSRF token state machine: fetch → cache → attach → on-403 refresh-once (§4.2).

use odata_mcp_domain::error::{Error, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};

use super::envelope::is_csrf_failure;
use super::state::ClientState;

const CSRF_HEADER: &str = "x-csrf-token";

/// Fetch a fresh CSRF token with `GET <serviceRoot>` and `x-csrf-token: fetch`,
/// caching it in `state`. Returns the fetched token.
///
/// # Errors
/// Returns [`Error::Network`] if the request fails, or [`Error::CsrfFailure`]
/// if the service didn't return a token header.
pub async fn fetch_token(client: &Client, service_root: &str, state: &ClientState) -> Result<String> {
    let response = client
        .get(service_root)
        .header(CSRF_HEADER, "fetch")
        .send()
        .await
        .map_err(|e| Error::network(format!("CSRF fetch request failed: {e}")))?;

    let token = response
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| Error::CsrfFailure {
            message: "service did not return an x-csrf-token header on fetch".to_owned(),
        })?;

    state.set_csrf_token(token.clone()).await;
    tracing::debug!(service_root, "fetched CSRF token");
    Ok(token)
}

/// Run `attempt` once with the currently cached token attached (fetching one
/// first if none is cached yet); on a CSRF-flavored 403, refresh the token
/// exactly once and retry `attempt` a single additional time.
///
/// `attempt` receives the token to attach as a header value and returns the
/// raw response headers together with its already-consumed body text, since
/// the caller needs to inspect the body to detect the CSRF-failure signal
/// without double-reading the response, and needs the headers (e.g.
/// `Retry-After`) to feed the outer retry/backoff policy.
///
/// # Errors
/// Propagates whatever `attempt` returns, or [`Error::CsrfFailure`] if the
/// refreshed token is rejected as well.
pub async fn with_csrf_retry<F, Fut>(
    client: &Client,
    service_root: &str,
    state: &ClientState,
    mut attempt: F,
) -> Result<(StatusCode, HeaderMap, String)>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<(StatusCode, HeaderMap, String)>>,
{
    let token = match state.csrf_token().await {
        Some(t) => t,
        None => fetch_token(client, service_root, state).await?,
    };

    let (status, headers, body) = attempt(token).await?;
    if status != StatusCode::FORBIDDEN || !is_csrf_failure(&body) {
        return Ok((status, headers, body));
    }

    tracing::warn!(service_root, "CSRF token rejected, refreshing once");
    state.clear_csrf_token().await;
    let refreshed = fetch_token(client, service_root, state).await?;
    let (status, headers, body) = attempt(refreshed).await?;
    if status == StatusCode::FORBIDDEN && is_csrf_failure(&body) {
        return Err(Error::CsrfFailure {
            message: "CSRF token rejected again after refresh".to_owned(),
        });
    }
    Ok((status, headers, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_token_caches_header_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-csrf-token", "fetch"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", "tok-1"))
            .mount(&server)
            .await;

        let client = Client::new();
        let state = ClientState::new();
        let token = fetch_token(&client, &server.uri(), &state).await.unwrap();
        assert_eq!(token, "tok-1");
        assert_eq!(state.csrf_token().await.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn fetch_without_token_header_is_csrf_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = Client::new();
        let state = ClientState::new();
        let err = fetch_token(&client, &server.uri(), &state).await.unwrap_err();
        assert!(matches!(err, Error::CsrfFailure { .. }));
    }

    #[tokio::test]
    async fn refreshes_exactly_once_on_csrf_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-csrf-token", "fetch"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", "tok-2"))
            .mount(&server)
            .await;

        let client = Client::new();
        let state = ClientState::new();
        state.set_csrf_token("tok-stale".to_owned()).await;

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let result = with_csrf_retry(&client, &server.uri(), &state, move |token| {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    assert_eq!(token, "tok-stale");
                    Ok((StatusCode::FORBIDDEN, HeaderMap::new(), "CSRF token validation failed".to_owned()))
                } else {
                    assert_eq!(token, "tok-2");
                    Ok((StatusCode::CREATED, HeaderMap::new(), "{}".to_owned()))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.0, StatusCode::CREATED);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(state.csrf_token().await.as_deref(), Some("tok-2"));
    }

    #[tokio::test]
    async fn surfaces_csrf_failure_when_refresh_is_rejected_too() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-csrf-token", "fetch"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", "tok-3"))
            .mount(&server)
            .await;

        let client = Client::new();
        let state = ClientState::new();
        state.set_csrf_token("tok-stale".to_owned()).await;

        let result = with_csrf_retry(&client, &server.uri(), &state, |_token| async move {
            Ok((StatusCode::FORBIDDEN, HeaderMap::new(), "CSRF token validation failed".to_owned()))
        })
        .await;

        assert!(matches!(result, Err(Error::CsrfFailure { .. })));
    }

    #[tokio::test]
    async fn non_csrf_403_passes_through_without_refetch() {
        let server = MockServer::start().await;
        let client = Client::new();
        let state = ClientState::new();
        state.set_csrf_token("tok-stable".to_owned()).await;

        let result = with_csrf_retry(&client, &server.uri(), &state, |token| async move {
            assert_eq!(token, "tok-stable");
            Ok((StatusCode::FORBIDDEN, HeaderMap::new(), "insufficient privileges".to_owned()))
        })
        .await
        .unwrap();

        assert_eq!(result.0, StatusCode::FORBIDDEN);
        assert_eq!(state.csrf_token().await.as_deref(), Some("tok-stable"));
    }
}
