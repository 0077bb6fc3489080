//! Transport-level behavior: GET request construction, header-merge
//! precedence, and the bounded connection pool.

use gqlclient::{GraphqlClient, GraphqlRequest, HttpMethod, RequestOptions};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
async fn get_request_carries_url_encoded_parameters() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphql"))
        .and(query_param(
            "query",
            "query Fetch($sku:String!){product(sku:$sku){text}}",
        ))
        .and(query_param("operationName", "Fetch"))
        .and(query_param("variables", r#"{"sku":"sku1"}"#))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": {"text": "sku1"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphqlClient::builder()
        .endpoint(format!("{}/graphql", server.uri()))
        .allow_insecure(true)
        .build()
        .unwrap();

    let request = GraphqlRequest::new("query Fetch($sku:String!){product(sku:$sku){text}}")
        .with_operation_name("Fetch")
        .with_variables(serde_json::json!({"sku": "sku1"}));
    let options = RequestOptions::new().with_method(HttpMethod::Get);

    let response = client
        .execute::<Value, Value>(&request, options)
        .await
        .unwrap();
    assert_eq!(response.data.unwrap()["text"], "sku1");
}

#[tokio::test]
async fn per_request_header_overrides_static_header() {
    init_logging();
    let server = MockServer::start().await;
    // Only a request carrying the per-request value matches; the static
    // header losing the conflict would leave this mock unmatched.
    Mock::given(method("POST"))
        .and(header("Store", "german"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": {"value": 1}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphqlClient::builder()
        .endpoint(format!("{}/graphql", server.uri()))
        .allow_insecure(true)
        .header("Store", "default")
        .build()
        .unwrap();

    let options = RequestOptions::new().with_header("Store", "german");
    client
        .execute::<Value, Value>(&GraphqlRequest::new("{value}"), options)
        .await
        .unwrap();
}

#[tokio::test]
async fn static_header_applies_when_no_override() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("Store", "default"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": {"value": 1}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphqlClient::builder()
        .endpoint(format!("{}/graphql", server.uri()))
        .allow_insecure(true)
        .header("Store", "default")
        .build()
        .unwrap();

    client
        .execute::<Value, Value>(&GraphqlRequest::new("{value}"), RequestOptions::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn concurrent_calls_are_bounded_by_max_connections() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": {"value": 1}}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(6)
        .mount(&server)
        .await;

    let client = Arc::new(
        GraphqlClient::builder()
            .endpoint(format!("{}/graphql", server.uri()))
            .allow_insecure(true)
            .max_connections(2)
            .build()
            .unwrap(),
    );

    let started = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..6 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client
                .execute::<Value, Value>(&GraphqlRequest::new("{value}"), RequestOptions::new())
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Six 100ms calls two at a time need at least three waves.
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(client.metrics().in_flight(), 0);
}
