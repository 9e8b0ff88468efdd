//! Integration tests for the request pipeline against a mock backend

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relay_client::{ApiClient, ClientConfig, NewSession, RequestOptions};
use relay_core_resilience::CircuitBreakerConfig;

fn health_body() -> serde_json::Value {
    json!({
        "success": true,
        "data": { "status": "healthy", "version": "1.4.2" },
        "timestamp": "2025-01-15T12:00:00Z"
    })
}

async fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(ClientConfig::new(server.uri())).expect("client builds")
}

#[tokio::test]
async fn cacheable_read_hits_transport_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(health_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let first = client.health().await;
    let second = client.health().await;

    assert!(first.success);
    assert!(second.success);
    assert_eq!(first.data, second.data);
    // expect(1) is verified when the server drops
}

#[tokio::test]
async fn expired_cache_entry_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(health_body()))
        .expect(2)
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).with_cache(true, Duration::from_millis(50));
    let client = ApiClient::new(config).expect("client builds");

    let first = client.health().await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    let second = client.health().await;

    assert!(first.success);
    assert!(second.success);
}

#[tokio::test]
async fn mutating_requests_bypass_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "id": "s-1",
                "query": "q",
                "status": "pending",
                "created_at": "2025-01-15T12:00:00Z",
                "updated_at": "2025-01-15T12:00:00Z"
            },
            "timestamp": "2025-01-15T12:00:00Z"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let new = NewSession {
        query: "q".to_string(),
        project_id: None,
    };

    assert!(client.create_session(&new).await.success);
    assert!(client.create_session(&new).await.success);
}

#[tokio::test]
async fn well_formed_error_envelope_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "error": { "code": "SESSION_NOT_FOUND", "message": "no such session" },
            "timestamp": "2025-01-15T12:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let response = client.get_session("missing").await;

    assert!(!response.success);
    let error = response.error.expect("error present");
    // Server-provided code and message survive untouched
    assert_eq!(error.code, "SESSION_NOT_FOUND");
    assert_eq!(error.message, "no such session");
}

#[tokio::test]
async fn undecodable_failure_body_maps_to_http_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream fell over"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let response = client.health().await;

    assert!(!response.success);
    let error = response.error.expect("error present");
    assert_eq!(error.code, "HTTP_503");
    assert_eq!(error.message, "Service Unavailable");
}

#[tokio::test]
async fn interceptors_compose_in_registration_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .and(query_param("first", "1"))
        .and(query_param("second", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(health_body()))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server).await;
    client.add_request_interceptor(Box::new(|options| options.with_query("first", 1)));
    client.add_request_interceptor(Box::new(|options| options.with_query("second", 2)));
    client.add_response_interceptor(Box::new(|mut envelope| {
        envelope.pagination = None;
        envelope
    }));

    let response = client.health().await;
    assert!(response.success);
}

#[tokio::test]
async fn timeout_is_retried_then_surfaced_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(health_body())
                .set_delay(Duration::from_secs(5)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri())
        .with_timeout(Duration::from_millis(100))
        .with_retry(2, Duration::from_millis(10));
    let client = ApiClient::new(config).expect("client builds");

    let response = client.health().await;

    assert!(!response.success);
    let error = response.error.expect("error present");
    assert_eq!(error.code, "NETWORK_ERROR");
    assert_eq!(error.details.unwrap()["attempts"], 2);
}

#[tokio::test]
async fn connection_refused_exhausts_the_retry_budget() {
    // Nothing listens on the discard port; every attempt is refused
    let config = ClientConfig::new("http://127.0.0.1:9")
        .with_retry(3, Duration::from_millis(10));
    let client = ApiClient::new(config).expect("client builds");

    let response: relay_client::ApiResponse<serde_json::Value> =
        client.request(RequestOptions::get("/health")).await;

    assert!(!response.success);
    let error = response.error.expect("error present");
    assert_eq!(error.code, "NETWORK_ERROR");
    assert_eq!(error.details.unwrap()["attempts"], 3);
}

#[tokio::test]
async fn open_circuit_rejects_without_transport_activity() {
    let config = ClientConfig::new("http://127.0.0.1:9")
        .with_retry(1, Duration::from_millis(10))
        .with_cache(false, Duration::from_secs(1));
    let breaker = CircuitBreakerConfig {
        failure_threshold: 2,
        recovery_timeout: Duration::from_secs(60),
    };
    let client = ApiClient::with_breaker(config, breaker).expect("client builds");

    // Two failing cycles trip the breaker
    for _ in 0..2 {
        let response: relay_client::ApiResponse<serde_json::Value> =
            client.request(RequestOptions::get("/health")).await;
        assert_eq!(response.error.unwrap().code, "NETWORK_ERROR");
    }

    // The third call is rejected before any connection attempt
    let response: relay_client::ApiResponse<serde_json::Value> =
        client.request(RequestOptions::get("/health")).await;
    assert_eq!(response.error.unwrap().code, "CIRCUIT_OPEN");

    // Administrative reset re-admits traffic
    client.reset_breaker().await;
    let response: relay_client::ApiResponse<serde_json::Value> =
        client.request(RequestOptions::get("/health")).await;
    assert_eq!(response.error.unwrap().code, "NETWORK_ERROR");
}

#[tokio::test]
async fn list_endpoint_carries_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{
                "id": "s-1",
                "query": "q",
                "status": "completed",
                "created_at": "2025-01-15T12:00:00Z",
                "updated_at": "2025-01-15T12:00:00Z"
            }],
            "timestamp": "2025-01-15T12:00:00Z",
            "pagination": {
                "page": 1, "per_page": 20, "total": 1,
                "total_pages": 1, "has_next": false, "has_prev": false
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let response = client.list_sessions(1, 20).await;

    assert!(response.success);
    assert_eq!(response.data.unwrap().len(), 1);
    assert!(!response.pagination.unwrap().has_next);
}
