//! Client configuration with documented defaults

use std::time::Duration;

/// Configuration for [`ApiClient`](crate::ApiClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is appended to
    pub base_url: String,

    /// Per-request deadline; the in-flight call is cancelled on expiry
    pub timeout: Duration,

    /// Maximum invocations per request for transport-class failures
    pub retry_attempts: u32,

    /// Base delay for the retry backoff schedule
    pub retry_base_delay: Duration,

    /// Whether idempotent reads consult and populate the response cache
    pub cache_enabled: bool,

    /// Default time-to-live for cached responses
    pub cache_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_millis(30_000),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            cache_enabled: true,
            cache_ttl: Duration::from_millis(300_000),
        }
    }
}

impl ClientConfig {
    /// Config pointing at the given base URL, defaults elsewhere.
    /// A trailing slash is stripped so paths can always start with `/`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_base_delay = base_delay;
        self
    }

    pub fn with_cache(mut self, enabled: bool, ttl: Duration) -> Self {
        self.cache_enabled = enabled;
        self.cache_ttl = ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(1000));
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl, Duration::from_millis(300_000));
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let config = ClientConfig::new("http://localhost:8000/");
        assert_eq!(config.base_url, "http://localhost:8000");
    }
}
