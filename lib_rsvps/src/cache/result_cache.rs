use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::configs::ConfigError;
use crate::meetup::client::PROVIDER_NAMESPACE;
use crate::meetup::model::EventRecord;

/// Identity of a cached record: provider namespace plus the event reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: &'static str,
    group: String,
    event_id: String,
}

impl CacheKey {
    /// Key for a meetup.com event.
    pub fn meetup(group: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self {
            namespace: PROVIDER_NAMESPACE,
            group: group.into(),
            event_id: event_id.into(),
        }
    }

    /// Group url name.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Event id.
    pub fn event_id(&self) -> &str {
        &self.event_id
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.group, self.event_id)
    }
}

#[derive(Debug)]
struct CacheEntry {
    record: Arc<EventRecord>,
    expires_at: Instant,
}

/// Bounded LRU map of event records with a per-entry expiry.
///
/// Expired entries are never returned; they are dropped when looked up or by
/// [`ResultCache::purge_expired`]. When full, inserting evicts the least
/// recently used entry.
pub struct ResultCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl ResultCache {
    /// Creates an empty cache holding at most `capacity` records.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Like [`ResultCache::new`] but rejects a zero capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
        NonZeroUsize::new(capacity)
            .map(Self::new)
            .ok_or(ConfigError::MustBePositive("cache capacity"))
    }

    /// Returns the record for `key` when present and not yet expired.
    /// A hit marks the entry as most recently used.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<EventRecord>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(Arc::clone(&entry.record)),
            Some(_) => {}
            None => return None,
        }

        entries.pop(key);
        trace!(key = %key, "dropped expired cache entry");
        None
    }

    /// Stores `record` under `key` for `ttl`, replacing any previous entry.
    pub async fn put(&self, key: CacheKey, record: Arc<EventRecord>, ttl: Duration) {
        let entry = CacheEntry {
            record,
            expires_at: Instant::now() + ttl,
        };

        let mut entries = self.entries.lock().await;
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                debug!(key = %evicted, "evicted least recently used cache entry");
            }
        }
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Number of stored entries, expired ones included until they are dropped.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// `true` when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Maximum number of entries.
    pub async fn capacity(&self) -> usize {
        self.entries.lock().await.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: &str) -> Arc<EventRecord> {
        Arc::new(EventRecord {
            event_status: status.into(),
            ..Default::default()
        })
    }

    #[test]
    fn key_renders_with_namespace() {
        assert_eq!(CacheKey::meetup("graz-rust", "42").to_string(), "meetupcom:graz-rust:42");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(ResultCache::with_capacity(0).is_err());
        assert!(ResultCache::with_capacity(1).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ResultCache::with_capacity(4).unwrap();
        let key = CacheKey::meetup("g", "1");
        cache.put(key.clone(), record("upcoming"), Duration::from_secs(60)).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get(&key).await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_ignores_unrelated_traffic() {
        let cache = ResultCache::with_capacity(4).unwrap();
        let (k1, k2, k3) = (
            CacheKey::meetup("g", "1"),
            CacheKey::meetup("g", "2"),
            CacheKey::meetup("g", "3"),
        );
        cache.put(k1.clone(), record("upcoming"), Duration::from_secs(60)).await;

        tokio::time::advance(Duration::from_secs(20)).await;
        cache.put(k2.clone(), record("past"), Duration::from_secs(600)).await;
        assert!(cache.get(&k2).await.is_some());

        tokio::time::advance(Duration::from_secs(20)).await;
        cache.put(k3.clone(), record("past"), Duration::from_secs(600)).await;
        assert!(cache.get(&k3).await.is_some());

        tokio::time::advance(Duration::from_secs(19)).await;
        assert!(cache.get(&k1).await.is_some());
        cache.put(k2.clone(), record("past"), Duration::from_secs(600)).await;

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&k1).await.is_none());
        assert!(cache.get(&k2).await.is_some());
        assert!(cache.get(&k3).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn put_replaces_and_resets_expiry() {
        let cache = ResultCache::with_capacity(4).unwrap();
        let key = CacheKey::meetup("g", "1");
        cache.put(key.clone(), record("upcoming"), Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.put(key.clone(), record("past"), Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(8)).await;

        let hit = cache.get(&key).await.unwrap();
        assert_eq!(hit.event_status, "past");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let cache = ResultCache::with_capacity(2).unwrap();
        let ttl = Duration::from_secs(600);
        let (a, b, c) = (
            CacheKey::meetup("g", "a"),
            CacheKey::meetup("g", "b"),
            CacheKey::meetup("g", "c"),
        );

        cache.put(a.clone(), record("upcoming"), ttl).await;
        cache.put(b.clone(), record("upcoming"), ttl).await;
        // touching `a` leaves `b` as the eviction candidate
        assert!(cache.get(&a).await.is_some());
        cache.put(c.clone(), record("upcoming"), ttl).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.capacity().await, 2);
        assert!(cache.get(&a).await.is_some());
        assert!(cache.get(&b).await.is_none());
        assert!(cache.get(&c).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired() {
        let cache = ResultCache::with_capacity(8).unwrap();
        cache.put(CacheKey::meetup("g", "short"), record("upcoming"), Duration::from_secs(5)).await;
        cache.put(CacheKey::meetup("g", "long"), record("past"), Duration::from_secs(500)).await;

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get(&CacheKey::meetup("g", "long")).await.is_some());
    }
}
