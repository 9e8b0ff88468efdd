//! Response Cache: time-bounded key/value store with lazy eviction
//!
//! Entries are readable only while `now - stored_at < ttl`; expired entries
//! are treated as absent and evicted on lookup. The map lives behind a
//! `tokio::sync::Mutex`, so a `set` is visible to every subsequent `get`
//! across concurrent callers.
//!
//! Keys are opaque strings; the owning client derives them deterministically
//! from the request signature so identical logical requests share an entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// A cached value with its storage time and time-to-live
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) >= self.ttl
    }
}

/// Time-bounded response cache keyed by request signature
///
/// # Example
/// ```
/// use relay_core_resilience::ResponseCache;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache: ResponseCache<String> = ResponseCache::new(Duration::from_secs(300));
/// cache.set("GET /health".to_string(), "ok".to_string()).await;
/// assert_eq!(cache.get("GET /health").await, Some("ok".to_string()));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ResponseCache<V> {
    default_ttl: Duration,
    entries: Arc<Mutex<HashMap<String, CacheEntry<V>>>>,
}

impl<V: Clone> ResponseCache<V> {
    /// Default time-to-live for cached responses (5 minutes)
    pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);

    /// Create a cache with the given default TTL
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a cache with the default 5 minute TTL
    pub fn new_default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }

    /// Look up an unexpired entry. Expired entries are evicted here rather
    /// than by a background sweeper.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => Some(entry.value.clone()),
            Some(_) => {
                debug!(key, "evicting expired cache entry");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value with the default TTL
    pub async fn set(&self, key: String, value: V) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    /// Store a value with an explicit TTL
    pub async fn set_with_ttl(&self, key: String, value: V, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove all entries
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of entries currently stored (including not-yet-evicted expired ones)
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop every expired entry eagerly
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| !entry.is_expired(now));
    }
}
