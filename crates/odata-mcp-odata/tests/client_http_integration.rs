//! End-to-end exercises of [`ODataClient`] against a real HTTP server
//! (`wiremock`), covering the paths the unit tests in `src/client/*` can
//! only exercise in isolation: metadata fetch, the CSRF fetch-cache-retry
//! state machine over the wire, and transient-failure retry-then-success.

use std::collections::BTreeMap;

use odata_mcp_domain::catalog::{Capabilities, EntitySet, EntityType, ODataVersion, Property};
use odata_mcp_domain::config::{
    AuthMode, Configuration, FilterConfig, HttpBindConfig, LazyConfig, ObservabilityConfig,
    OperationPolicy, ResponseConfig, RetryConfig, TimeoutConfig, ToolNamingConfig, TransportKind,
};
use odata_mcp_domain::edm::EdmType;
use odata_mcp_odata::client::query::QueryOptions;
use odata_mcp_odata::client::ODataClient;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(service_url: String) -> Configuration {
    Configuration {
        service_url,
        auth: AuthMode::Anonymous,
        transport: TransportKind::Stdio,
        http_bind: HttpBindConfig::default(),
        protocol_version: "2024-11-05".to_owned(),
        naming: ToolNamingConfig::default(),
        entities: FilterConfig::default(),
        functions: FilterConfig::default(),
        operations: OperationPolicy::default(),
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 5,
            max_backoff_ms: 50,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.0,
        },
        response: ResponseConfig::default(),
        timeouts: TimeoutConfig::default(),
        lazy: LazyConfig::default(),
        hints_file: None,
        inline_hints: vec![],
        observability: ObservabilityConfig::default(),
    }
}

fn catalog_for(service_root: &str, version: ODataVersion) -> odata_mcp_domain::catalog::MetadataCatalog {
    let mut entity_types = BTreeMap::new();
    entity_types.insert(
        "Product".to_owned(),
        EntityType {
            name: "Product".to_owned(),
            properties: vec![Property {
                name: "Id".to_owned(),
                edm_type: EdmType::Int32,
                nullable: false,
                is_key: true,
                description: None,
            }],
            nav_properties: vec![],
            key_names: vec!["Id".to_owned()],
        },
    );
    let mut entity_sets = BTreeMap::new();
    entity_sets.insert(
        "Products".to_owned(),
        EntitySet {
            name: "Products".to_owned(),
            entity_type_ref: "Product".to_owned(),
            capabilities: Capabilities::default(),
        },
    );
    odata_mcp_domain::catalog::MetadataCatalog {
        service_root: service_root.to_owned(),
        version,
        schema_namespace: "Svc".to_owned(),
        container_name: "SvcContainer".to_owned(),
        entity_types,
        entity_sets,
        function_imports: BTreeMap::new(),
    }
}

#[tokio::test]
async fn fetch_metadata_xml_returns_the_response_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/$metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<edmx:Edmx/>"))
        .mount(&server)
        .await;

    let config = config_for(server.uri());
    let client = ODataClient::new(&config).expect("client builds");

    let xml = client.fetch_metadata_xml().await.expect("metadata fetch succeeds");
    assert_eq!(xml, "<edmx:Edmx/>");
}

#[tokio::test]
async fn fetch_metadata_xml_reports_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/$metadata"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = config_for(server.uri());
    let client = ODataClient::new(&config).expect("client builds");

    let err = client.fetch_metadata_xml().await.unwrap_err();
    assert!(matches!(err, odata_mcp_domain::error::Error::MetadataFetch { .. }));
}

#[tokio::test]
async fn list_round_trips_a_v4_collection_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"Id": 1}, {"Id": 2}],
            "@odata.count": 2,
        })))
        .mount(&server)
        .await;

    let config = config_for(server.uri());
    let client = ODataClient::new(&config).expect("client builds");
    let catalog = catalog_for(&server.uri(), ODataVersion::V4);

    let result = client
        .list(&catalog, "Products", QueryOptions::default())
        .await
        .expect("list succeeds");
    assert_eq!(result["value"].as_array().unwrap().len(), 2);
    assert_eq!(result["count"], 2);
}

#[tokio::test]
async fn create_fetches_and_attaches_a_csrf_token_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("x-csrf-token", "fetch"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", "tok-abc"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Products"))
        .and(header("x-csrf-token", "tok-abc"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"d": {"Id": 7}})))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(server.uri());
    let mut client = ODataClient::new(&config).expect("client builds");
    client.set_sap_flavor(true);
    let catalog = catalog_for(&server.uri(), ODataVersion::V2);

    let created = client
        .create(&catalog, "Products", serde_json::json!({"Id": 7}))
        .await
        .expect("create succeeds");
    assert_eq!(created["value"]["Id"], 7);
}

#[tokio::test]
async fn create_refetches_the_token_exactly_once_after_a_csrf_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("x-csrf-token", "fetch"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", "stale-tok"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("x-csrf-token", "fetch"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", "fresh-tok"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Products"))
        .and(header("x-csrf-token", "stale-tok"))
        .respond_with(ResponseTemplate::new(403).set_body_string("CSRF token validation failed"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Products"))
        .and(header("x-csrf-token", "fresh-tok"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"d": {"Id": 9}})))
        .mount(&server)
        .await;

    let config = config_for(server.uri());
    let mut client = ODataClient::new(&config).expect("client builds");
    client.set_sap_flavor(true);
    let catalog = catalog_for(&server.uri(), ODataVersion::V2);

    let created = client
        .create(&catalog, "Products", serde_json::json!({"Id": 9}))
        .await
        .expect("create succeeds after one CSRF refresh");
    assert_eq!(created["value"]["Id"], 9);
}

#[tokio::test]
async fn get_retries_transient_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Products(1)"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Products(1)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": {"Id": 1}})))
        .mount(&server)
        .await;

    let config = config_for(server.uri());
    let client = ODataClient::new(&config).expect("client builds");
    let catalog = catalog_for(&server.uri(), ODataVersion::V4);

    let mut keys = BTreeMap::new();
    keys.insert("Id".to_owned(), "1".to_owned());
    let result = client.get(&catalog, "Products", &keys).await.expect("retries then succeeds");
    assert_eq!(result["value"]["Id"], 1);
}

#[tokio::test]
async fn get_gives_up_after_exhausting_retry_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Products(1)"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = config_for(server.uri());
    let client = ODataClient::new(&config).expect("client builds");
    let catalog = catalog_for(&server.uri(), ODataVersion::V4);

    let mut keys = BTreeMap::new();
    keys.insert("Id".to_owned(), "1".to_owned());
    let err = client.get(&catalog, "Products", &keys).await.unwrap_err();
    assert!(matches!(err, odata_mcp_domain::error::Error::ODataServer { .. }));
}
