//! ApiClient: the request pipeline
//!
//! One request/response cycle composes, in order: cache lookup → request
//! interceptors → timeout-bounded transport call → envelope decode →
//! response interceptors → cache store. The whole transport sequence is
//! retried for network- and timeout-class failures only, and the circuit
//! breaker wraps the retried sequence so an unhealthy backend fails fast.
//!
//! Every failure path folds into a typed [`ApiResponse::error`]; `request`
//! never panics and never swallows a failure.

use std::time::Duration;

use relay_core_resilience::{
    retry_with, BreakerError, CircuitBreaker, CircuitBreakerConfig, ResponseCache, RetryFailure,
    RetryPolicy,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::types::{ApiError, ApiResponse};

/// A pure transformation applied to the outgoing request options.
/// Interceptors compose in registration order; they do not short-circuit.
pub type RequestInterceptor = Box<dyn Fn(RequestOptions) -> RequestOptions + Send + Sync>;

/// A transformation applied to the decoded envelope. Side effects (logging,
/// metrics) are allowed; a valid envelope must always be returned.
pub type ResponseInterceptor =
    Box<dyn Fn(ApiResponse<Value>) -> ApiResponse<Value> + Send + Sync>;

/// Options describing one logical request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Path appended to the configured base URL, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Bypass the cache even for an otherwise cacheable read
    pub skip_cache: bool,
    /// Override the config-level TTL for this request's cache entry
    pub cache_ttl: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            skip_cache: false,
            cache_ttl: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        let mut options = Self::new(Method::POST, path);
        options.body = Some(body);
        options
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        let mut options = Self::new(Method::PATCH, path);
        options.body = Some(body);
        options
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }
}

/// Typed HTTP client for the Relay backend
///
/// The client exclusively owns its response cache; entries have no
/// existence outside this instance.
///
/// # Example
/// ```no_run
/// use relay_client::{ApiClient, ClientConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new(ClientConfig::new("http://localhost:8000"))?;
/// let health = client.health().await;
/// assert!(health.success);
/// # Ok(())
/// # }
/// ```
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    cache: ResponseCache<ApiResponse<Value>>,
    breaker: CircuitBreaker,
    request_interceptors: Vec<RequestInterceptor>,
    response_interceptors: Vec<ResponseInterceptor>,
}

impl ApiClient {
    /// Create a client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().build()?;
        let cache = ResponseCache::new(config.cache_ttl);

        Ok(Self {
            http,
            config,
            cache,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        })
    }

    /// Create a client with a non-default circuit breaker
    pub fn with_breaker(
        config: ClientConfig,
        breaker_config: CircuitBreakerConfig,
    ) -> Result<Self, ClientError> {
        let mut client = Self::new(config)?;
        client.breaker = CircuitBreaker::new(breaker_config);
        Ok(client)
    }

    /// Register a request interceptor, applied in registration order
    pub fn add_request_interceptor(&mut self, interceptor: RequestInterceptor) {
        self.request_interceptors.push(interceptor);
    }

    /// Register a response interceptor, applied in registration order
    pub fn add_response_interceptor(&mut self, interceptor: ResponseInterceptor) {
        self.response_interceptors.push(interceptor);
    }

    /// Empty the response cache
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Reset the circuit breaker to closed (administrative)
    pub async fn reset_breaker(&self) {
        self.breaker.reset().await;
    }

    /// Execute one request/response cycle
    pub async fn request<T: DeserializeOwned>(&self, options: RequestOptions) -> ApiResponse<T> {
        // Only idempotent reads ever touch the cache
        let cacheable =
            options.method == Method::GET && self.config.cache_enabled && !options.skip_cache;
        let cache_key = self.cache_key(&options);

        if cacheable {
            if let Some(hit) = self.cache.get(&cache_key).await {
                debug!(key = %cache_key, "cache hit, skipping transport");
                return Self::typed(hit);
            }
        }

        // Build the retried transport future lazily; an open breaker drops
        // it unpolled, so the operation is never invoked.
        let transport = self.perform_with_retry(&options);
        let outcome = self.breaker.execute(|| transport).await;

        match outcome {
            Ok(envelope) => {
                if cacheable && envelope.success {
                    let ttl = options.cache_ttl.unwrap_or(self.config.cache_ttl);
                    self.cache
                        .set_with_ttl(cache_key, envelope.clone(), ttl)
                        .await;
                }
                Self::typed(envelope)
            }
            Err(BreakerError::Open) => {
                warn!(path = %options.path, "circuit open, rejecting request");
                ApiResponse::err(ApiError::new(
                    "CIRCUIT_OPEN",
                    "service is temporarily unavailable (circuit breaker open)",
                ))
            }
            Err(BreakerError::Inner(failure)) => Self::failure_envelope(failure),
        }
    }

    /// Steps 2-5 of the pipeline under the retry engine. Only
    /// transport-class failures (network, timeout) are retried; a
    /// well-formed error envelope is a successful transport exchange.
    async fn perform_with_retry(
        &self,
        options: &RequestOptions,
    ) -> Result<ApiResponse<Value>, RetryFailure<ClientError>> {
        let policy = RetryPolicy {
            max_attempts: self.config.retry_attempts.max(1),
            base_delay: self.config.retry_base_delay,
            ..RetryPolicy::default()
        };

        let client = self;
        retry_with(
            &policy,
            move || client.perform_once(options),
            |err, _attempt| err.is_transient(),
            |err, attempt| warn!(attempt, error = %err, "transport failure, retrying"),
        )
        .await
    }

    /// One attempt: interceptors → bounded transport call → envelope decode
    /// → response interceptors
    async fn perform_once(
        &self,
        options: &RequestOptions,
    ) -> Result<ApiResponse<Value>, ClientError> {
        let mut opts = options.clone();
        for interceptor in &self.request_interceptors {
            opts = interceptor(opts);
        }

        let url = format!("{}{}", self.config.base_url, opts.path);
        let mut builder = self.http.request(opts.method.clone(), url.as_str());
        if !opts.query.is_empty() {
            builder = builder.query(&opts.query);
        }
        if let Some(body) = &opts.body {
            builder = builder.json(body);
        }

        debug!(method = %opts.method, %url, "issuing request");

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        };

        let (status, bytes) = match tokio::time::timeout(self.config.timeout, exchange).await {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => return Err(ClientError::Network(e)),
            Err(_) => {
                warn!(%url, timeout = ?self.config.timeout, "request deadline exceeded");
                return Err(ClientError::Timeout(self.config.timeout));
            }
        };

        let mut envelope = match serde_json::from_slice::<ApiResponse<Value>>(&bytes) {
            Ok(envelope) => envelope,
            Err(_) => Self::synthesize(status),
        };

        for interceptor in &self.response_interceptors {
            envelope = interceptor(envelope);
        }

        Ok(envelope)
    }

    /// Envelope for a response body that did not decode as the envelope
    /// shape: success mirrors the HTTP status class, failures carry
    /// `HTTP_<status>` with the status text as the message.
    fn synthesize(status: StatusCode) -> ApiResponse<Value> {
        if status.is_success() {
            ApiResponse::empty()
        } else {
            ApiResponse::err(ApiError::new(
                format!("HTTP_{}", status.as_u16()),
                status.canonical_reason().unwrap_or("unknown status"),
            ))
        }
    }

    /// Envelope for a transport failure that survived (or was rejected by)
    /// the retry engine
    fn failure_envelope<T>(failure: RetryFailure<ClientError>) -> ApiResponse<T> {
        match failure {
            RetryFailure::Exhausted { attempts, source } => ApiResponse::err(
                ApiError::new("NETWORK_ERROR", source.to_string())
                    .with_details(serde_json::json!({ "attempts": attempts })),
            ),
            RetryFailure::Rejected(err) => {
                ApiResponse::err(ApiError::new(err.code(), err.to_string()))
            }
        }
    }

    /// Deserialize the raw payload into the caller's expected type. A
    /// payload that fails typed decode is a protocol-class failure and is
    /// surfaced immediately, never retried.
    fn typed<T: DeserializeOwned>(envelope: ApiResponse<Value>) -> ApiResponse<T> {
        let ApiResponse {
            success,
            data,
            error,
            timestamp,
            pagination,
        } = envelope;

        let data = match data {
            None | Some(Value::Null) => None,
            Some(value) => match serde_json::from_value::<T>(value) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    return ApiResponse {
                        success: false,
                        data: None,
                        error: Some(ApiError::new(
                            "DECODE_ERROR",
                            format!("response payload did not match the expected shape: {e}"),
                        )),
                        timestamp,
                        pagination,
                    }
                }
            },
        };

        ApiResponse {
            success,
            data,
            error,
            timestamp,
            pagination,
        }
    }

    /// Deterministic cache key from the request signature: method, target
    /// and serialized body. serde_json maps are ordered, so identical
    /// logical requests always produce the same key.
    fn cache_key(&self, options: &RequestOptions) -> String {
        let mut key = format!("{} {}{}", options.method, self.config.base_url, options.path);

        if !options.query.is_empty() {
            key.push('?');
            let pairs: Vec<String> = options
                .query
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            key.push_str(&pairs.join("&"));
        }

        if let Some(body) = &options.body {
            key.push(' ');
            key.push_str(&body.to_string());
        }

        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_client() -> ApiClient {
        ApiClient::new(ClientConfig::new("http://localhost:8000")).unwrap()
    }

    #[test]
    fn test_cache_key_is_deterministic_across_body_key_order() {
        let client = test_client();

        let a = RequestOptions::post("/sessions", json!({"query": "q", "project_id": "p"}));
        let b = RequestOptions::post("/sessions", json!({"project_id": "p", "query": "q"}));

        assert_eq!(client.cache_key(&a), client.cache_key(&b));
    }

    #[test]
    fn test_cache_key_distinguishes_method_path_and_query() {
        let client = test_client();

        let get = client.cache_key(&RequestOptions::get("/sessions"));
        let delete = client.cache_key(&RequestOptions::delete("/sessions"));
        let paged = client.cache_key(&RequestOptions::get("/sessions").with_query("page", 2));

        assert_ne!(get, delete);
        assert_ne!(get, paged);
    }

    #[test]
    fn test_synthesized_envelope_for_failure_status() {
        let envelope = ApiClient::synthesize(StatusCode::BAD_GATEWAY);

        assert!(!envelope.success);
        let error = envelope.error.unwrap();
        assert_eq!(error.code, "HTTP_502");
        assert_eq!(error.message, "Bad Gateway");
    }

    #[test]
    fn test_synthesized_envelope_for_success_status() {
        let envelope = ApiClient::synthesize(StatusCode::NO_CONTENT);
        assert!(envelope.success);
        assert!(envelope.error.is_none());
    }

    #[test]
    fn test_typed_decode_failure_surfaces_decode_error() {
        let raw = ApiResponse::ok(json!({"unexpected": "shape"}));
        let typed: ApiResponse<crate::types::Session> = ApiClient::typed(raw);

        assert!(!typed.success);
        assert_eq!(typed.error.unwrap().code, "DECODE_ERROR");
    }
}
