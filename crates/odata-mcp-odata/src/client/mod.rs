//! The OData HTTP client: request construction, authentication, the CSRF
//! state machine, retry/backoff, and response normalization (§4.2).

pub mod csrf;
pub mod dates;
pub mod envelope;
pub mod query;
pub mod retry;
pub mod state;

use std::collections::BTreeMap;
use std::time::Duration;

use odata_mcp_domain::catalog::{EntityType, MetadataCatalog, ODataVersion};
use odata_mcp_domain::config::{AuthMode, Configuration};
use odata_mcp_domain::error::{Error, Result};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use self::envelope::{parse_envelope, parse_error_envelope};
use self::query::QueryOptions;
use self::state::ClientState;

/// Substrings in a service root that mark it as an SAP Gateway endpoint,
/// which in turn switches on CSRF tokens, GUID-literal rewriting, and
/// numeric stringification (§4.2, glossary "SAP-flavor service").
const SAP_URL_MARKERS: [&str; 3] = ["/sap/opu/odata", "sap.com", "S4HANA"];

/// Whether `service_root` looks like an SAP Gateway endpoint, absent an
/// explicit hint override.
#[must_use]
pub fn detect_sap_flavor(service_root: &str) -> bool {
    SAP_URL_MARKERS
        .iter()
        .any(|marker| service_root.to_ascii_lowercase().contains(&marker.to_ascii_lowercase()))
}

/// A bound, authenticated OData client for a single service root.
pub struct ODataClient {
    http: Client,
    service_root: String,
    auth: AuthMode,
    /// Pre-resolved `Cookie` header value for `CookieFile`/`CookieString` auth.
    /// Reading the file happens once at construction; the bridge's Non-goals
    /// explicitly exclude Netscape cookie-jar parsing, so the file is taken
    /// to hold a raw `Cookie` header value.
    cookie_header: Option<String>,
    state: ClientState,
    retry: odata_mcp_domain::config::RetryConfig,
    response: odata_mcp_domain::config::ResponseConfig,
    metadata_timeout: Duration,
    sap_flavor: bool,
}

impl ODataClient {
    /// Build a client from a resolved [`Configuration`]. The `reqwest::Client`
    /// is constructed once and reused for the process lifetime: its cookie
    /// jar is how session-cookie propagation (§4.2) is handled, so a fresh
    /// client per request would silently break that.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the underlying `reqwest::Client` cannot
    /// be built (e.g. a malformed cookie file for `CookieFile` auth).
    pub fn new(config: &Configuration) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeouts.http_timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        let cookie_header = match &config.auth {
            AuthMode::CookieFile { path } => Some(
                std::fs::read_to_string(path)
                    .map_err(|e| Error::config(format!("failed to read cookie file {path}: {e}")))?
                    .trim()
                    .to_owned(),
            ),
            AuthMode::CookieString { value } => Some(value.clone()),
            AuthMode::Basic { .. } | AuthMode::Anonymous => None,
        };

        Ok(Self {
            http,
            service_root: config.service_url.trim_end_matches('/').to_owned(),
            auth: config.auth.clone(),
            cookie_header,
            state: ClientState::new(),
            retry: config.retry.clone(),
            response: config.response.clone(),
            metadata_timeout: Duration::from_secs(config.timeouts.metadata_timeout_secs),
            sap_flavor: detect_sap_flavor(&config.service_url),
        })
    }

    /// Override SAP-flavor detection (`--sap` / hint file, §4.2).
    pub fn set_sap_flavor(&mut self, sap_flavor: bool) {
        self.sap_flavor = sap_flavor;
    }

    #[must_use]
    pub fn is_sap_flavor(&self) -> bool {
        self.sap_flavor
    }

    #[must_use]
    pub fn service_root(&self) -> &str {
        &self.service_root
    }

    /// Fetch the raw `$metadata` document. Uses the longer metadata timeout
    /// rather than the ordinary request timeout (§5).
    ///
    /// # Errors
    /// Returns [`Error::MetadataFetch`] on any non-2xx response or transport
    /// failure.
    pub async fn fetch_metadata_xml(&self) -> Result<String> {
        let url = format!("{}/$metadata", self.service_root);
        let mut builder = self.http.get(&url).timeout(self.metadata_timeout);
        builder = self.apply_auth(builder);
        let response = builder
            .send()
            .await
            .map_err(|e| Error::MetadataFetch {
                url: url.clone(),
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(Error::MetadataFetch {
                url,
                message: format!("HTTP {}", response.status()),
                source: None,
            });
        }
        response.text().await.map_err(|e| Error::MetadataFetch {
            url,
            message: e.to_string(),
            source: Some(Box::new(e)),
        })
    }

    /// `GET` an entity set's collection with the given query options.
    ///
    /// # Errors
    /// Returns [`Error::ODataClient`]/[`Error::ODataServer`] on a non-2xx
    /// response after retries, or [`Error::Network`] on transport failure.
    pub async fn list(
        &self,
        catalog: &MetadataCatalog,
        entity_set_name: &str,
        mut opts: QueryOptions,
    ) -> Result<Value> {
        let entity_set = self.resolve_entity_set(catalog, entity_set_name)?;
        let entity_type = catalog.entity_type_for(entity_set)?;

        if let Some(filter) = &opts.filter {
            if self.sap_flavor {
                opts.filter = Some(query::rewrite_guid_literals(filter, entity_type));
            }
        }

        let qs = query::to_query_string(&opts, catalog.version);
        let url = format!("{}/{}?{qs}", self.service_root, entity_set_name);
        let (status, body) = self.execute(Method::GET, &url, None, false).await?;
        self.into_normalized(status, &body, catalog.version)
    }

    /// `GET /EntitySet?$inlinecount=allpages&$top=0` (v2) or
    /// `GET /EntitySet/$count` (v4), returning the raw count.
    ///
    /// # Errors
    /// Same as [`Self::list`].
    pub async fn count(
        &self,
        catalog: &MetadataCatalog,
        entity_set_name: &str,
        filter: Option<&str>,
    ) -> Result<i64> {
        let entity_set = self.resolve_entity_set(catalog, entity_set_name)?;
        let entity_type = catalog.entity_type_for(entity_set)?;
        let filter = filter.map(|f| {
            if self.sap_flavor {
                query::rewrite_guid_literals(f, entity_type)
            } else {
                f.to_owned()
            }
        });

        let url = match catalog.version {
            ODataVersion::V2 => {
                let mut qs = "$inlinecount=allpages&$top=0".to_owned();
                if let Some(f) = &filter {
                    qs.push_str(&format!("&$filter={}", query::encode_query_value(f)));
                }
                format!("{}/{entity_set_name}?{qs}", self.service_root)
            }
            ODataVersion::V4 => {
                if let Some(f) = &filter {
                    format!(
                        "{}/{entity_set_name}/$count?$filter={}",
                        self.service_root,
                        query::encode_query_value(f)
                    )
                } else {
                    format!("{}/{entity_set_name}/$count", self.service_root)
                }
            }
        };
        let (status, body) = self.execute(Method::GET, &url, None, false).await?;
        self.ensure_success(status, &body)?;

        match catalog.version {
            ODataVersion::V2 => {
                let parsed = serde_json::from_str::<Value>(&body)
                    .map_err(|e| Error::internal(format!("malformed count response: {e}")))?;
                let env = parse_envelope(&parsed, catalog.version);
                env.count.ok_or_else(|| Error::internal("no __count in response".to_owned()))
            }
            ODataVersion::V4 => body
                .trim()
                .parse::<i64>()
                .map_err(|e| Error::internal(format!("malformed count response: {e}"))),
        }
    }

    /// `GET` a single entity by its composite key.
    ///
    /// # Errors
    /// Same as [`Self::list`].
    pub async fn get(
        &self,
        catalog: &MetadataCatalog,
        entity_set_name: &str,
        keys: &BTreeMap<String, String>,
    ) -> Result<Value> {
        let entity_set = self.resolve_entity_set(catalog, entity_set_name)?;
        let entity_type = catalog.entity_type_for(entity_set)?;
        let key_segment = query::format_key_segment(entity_type, keys);
        let url = format!("{}/{entity_set_name}({key_segment})", self.service_root);
        let (status, body) = self.execute(Method::GET, &url, None, false).await?;
        self.into_normalized(status, &body, catalog.version)
    }

    /// `POST` a new entity. CSRF-protected on SAP-flavor services.
    ///
    /// # Errors
    /// Same as [`Self::list`], plus [`Error::CsrfFailure`].
    pub async fn create(
        &self,
        catalog: &MetadataCatalog,
        entity_set_name: &str,
        mut payload: Value,
    ) -> Result<Value> {
        let entity_set = self.resolve_entity_set(catalog, entity_set_name)?;
        let entity_type = catalog.entity_type_for(entity_set)?;
        if self.sap_flavor {
            query::stringify_numerics_for_sap(&mut payload, entity_type);
        }
        let url = format!("{}/{entity_set_name}", self.service_root);
        let (status, body) = self.execute(Method::POST, &url, Some(payload), true).await?;
        self.into_normalized(status, &body, catalog.version)
    }

    /// `PATCH`/`PUT`/`MERGE` an existing entity. CSRF-protected on SAP-flavor
    /// services.
    ///
    /// # Errors
    /// Same as [`Self::create`].
    pub async fn update(
        &self,
        catalog: &MetadataCatalog,
        entity_set_name: &str,
        keys: &BTreeMap<String, String>,
        mut payload: Value,
        http_method: Method,
    ) -> Result<Value> {
        let entity_set = self.resolve_entity_set(catalog, entity_set_name)?;
        let entity_type = catalog.entity_type_for(entity_set)?;
        if self.sap_flavor {
            query::stringify_numerics_for_sap(&mut payload, entity_type);
        }
        let key_segment = query::format_key_segment(entity_type, keys);
        let url = format!("{}/{entity_set_name}({key_segment})", self.service_root);
        let (status, body) = self.execute(http_method, &url, Some(payload), true).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        self.into_normalized(status, &body, catalog.version)
    }

    /// `DELETE` an existing entity. CSRF-protected on SAP-flavor services.
    ///
    /// # Errors
    /// Same as [`Self::create`].
    pub async fn delete(
        &self,
        catalog: &MetadataCatalog,
        entity_set_name: &str,
        keys: &BTreeMap<String, String>,
    ) -> Result<()> {
        let entity_set = self.resolve_entity_set(catalog, entity_set_name)?;
        let entity_type = catalog.entity_type_for(entity_set)?;
        let key_segment = query::format_key_segment(entity_type, keys);
        let url = format!("{}/{entity_set_name}({key_segment})", self.service_root);
        let (status, body) = self.execute(Method::DELETE, &url, None, true).await?;
        self.ensure_success(status, &body)?;
        Ok(())
    }

    /// Invoke a function import / unbound function / action.
    ///
    /// # Errors
    /// Same as [`Self::list`], plus [`Error::CsrfFailure`] for non-GET
    /// invocations on SAP-flavor services.
    pub async fn call_function(
        &self,
        catalog: &MetadataCatalog,
        name: &str,
        params: &BTreeMap<String, String>,
        http_method: Method,
    ) -> Result<Value> {
        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", query::encode_query_value(v)))
            .collect::<Vec<_>>()
            .join("&");
        let url = if query_string.is_empty() {
            format!("{}/{name}", self.service_root)
        } else {
            format!("{}/{name}?{query_string}", self.service_root)
        };
        let mutating = http_method != Method::GET;
        let (status, body) = self.execute(http_method, &url, None, mutating).await?;
        self.into_normalized(status, &body, catalog.version)
    }

    fn resolve_entity_set<'a>(
        &self,
        catalog: &'a MetadataCatalog,
        name: &str,
    ) -> Result<&'a odata_mcp_domain::catalog::EntitySet> {
        catalog.entity_sets.get(name).ok_or_else(|| Error::NotFound {
            kind: "entity set".to_owned(),
            name: name.to_owned(),
        })
    }

    fn ensure_success(&self, status: StatusCode, body: &str) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }
        let parsed = parse_error_envelope(body);
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::AuthFailure {
                message: parsed.message,
            });
        }
        if status.is_server_error() {
            return Err(Error::ODataServer {
                code: parsed.code,
                message: parsed.message,
            });
        }
        Err(Error::ODataClient {
            code: parsed.code,
            message: parsed.message,
            raw_body: Some(body.to_owned()),
        })
    }

    fn into_normalized(&self, status: StatusCode, body: &str, version: ODataVersion) -> Result<Value> {
        self.ensure_success(status, body)?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        let parsed = serde_json::from_str::<Value>(body)
            .map_err(|e| Error::internal(format!("malformed OData response body: {e}")))?;
        let envelope = parse_envelope(&parsed, version);
        Ok(envelope::normalize_response(envelope, &self.response))
    }

    /// Run `method url` to completion, applying the CSRF state machine for
    /// mutating calls on SAP-flavor services and the retry/backoff policy
    /// around the whole attempt.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
        mutating: bool,
    ) -> Result<(StatusCode, String)> {
        let needs_csrf = mutating && self.sap_flavor;
        let max_attempts = retry::max_total_attempts(&self.retry);

        for attempt in 0..max_attempts {
            let outcome: Result<(StatusCode, reqwest::header::HeaderMap, String)> = if needs_csrf {
                csrf::with_csrf_retry(&self.http, &self.service_root, &self.state, |token| {
                    let method = method.clone();
                    let body = body.clone();
                    async move { self.send_once(method, url, body, Some(token)).await }
                })
                .await
            } else {
                self.send_once(method.clone(), url, body.clone(), None).await
            };

            match outcome {
                Ok((status, headers, text)) => {
                    let retryable = retry::is_retryable_status(status.as_u16());
                    if retryable && attempt + 1 < max_attempts {
                        let delay = headers
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(retry::parse_retry_after)
                            .unwrap_or_else(|| retry::backoff_delay(attempt, &self.retry));
                        tracing::warn!(
                            %method,
                            url,
                            attempt,
                            status = status.as_u16(),
                            delay_ms = delay.as_millis() as u64,
                            "retrying OData request"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    tracing::debug!(%method, url, attempt, status = status.as_u16(), "OData request completed");
                    return Ok((status, text));
                }
                Err(err) => {
                    let retry_network_error =
                        matches!(err, Error::Network { .. }) && retry::is_idempotent_method(method.as_str());
                    if retry_network_error && attempt + 1 < max_attempts {
                        let delay = retry::backoff_delay(attempt, &self.retry);
                        tracing::warn!(%method, url, attempt, error = %err, "retrying OData request after network error");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    tracing::debug!(%method, url, attempt, error = %err, "OData request failed");
                    return Err(err);
                }
            }
        }
        unreachable!("loop always returns before exhausting max_attempts")
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
        csrf_token: Option<String>,
    ) -> Result<(StatusCode, reqwest::header::HeaderMap, String)> {
        let mut builder = self.http.request(method, url);
        builder = self.apply_auth(builder);
        if let Some(token) = csrf_token {
            builder = builder.header("x-csrf-token", token);
        }
        if let Some(payload) = body {
            builder = builder.json(&payload);
        }

        let response = builder.send().await.map_err(|e| Error::Network {
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(|e| Error::Network {
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok((status, headers, text))
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = match &self.auth {
            AuthMode::Basic { user, password } => builder.basic_auth(user, Some(password)),
            AuthMode::CookieFile { .. } | AuthMode::CookieString { .. } | AuthMode::Anonymous => builder,
        };
        match &self.cookie_header {
            Some(value) => builder.header(reqwest::header::COOKIE, value),
            None => builder,
        }
    }
}
