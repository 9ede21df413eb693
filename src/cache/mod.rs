//! Two-tier content cache.
//!
//! Writes go to memory and disk. Reads try memory, then disk; a disk hit is
//! promoted back into memory with its original expiry. Each tier evicts
//! oldest-written entries first once over its byte cap; reads never reorder.

mod disk;
mod memory;

pub use disk::{CACHE_PREFIX, DiskTier, file_key};
pub use memory::MemoryTier;

use crate::scraper::MediaType;
use crate::storage::DurableStore;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub(crate) fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

/// 0 means no expiry
pub(crate) fn is_expired(expires_at: u64, now: u64) -> bool {
    expires_at > 0 && now >= expires_at
}

/// What a cached value is; decides the key prefix and default TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    Home,
    Search,
    Links,
    Details,
}

impl CacheCategory {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Search => "search",
            Self::Links => "links",
            Self::Details => "details",
        }
    }
}

/// Category prefix, provider name and call identifiers joined with `:`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    category: CacheCategory,
    key: String,
}

impl CacheKey {
    fn build(category: CacheCategory, provider: &str, parts: &[&str]) -> Self {
        let mut key = format!("{}:{provider}", category.prefix());
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        Self { category, key }
    }

    pub fn home(provider: &str) -> Self {
        Self::build(CacheCategory::Home, provider, &[])
    }

    /// Queries are trimmed and lowercased so trivially different spellings share an entry
    pub fn search(provider: &str, query: &str, page: u32) -> Self {
        let query = query.trim().to_lowercase();
        Self::build(CacheCategory::Search, provider, &[&query, &page.to_string()])
    }

    pub fn links(provider: &str, content_id: &str, season: Option<u32>, episode: Option<u32>) -> Self {
        let id = |v: Option<u32>| v.map_or_else(|| "-".to_string(), |n| n.to_string());
        Self::build(
            CacheCategory::Links,
            provider,
            &[content_id, &id(season), &id(episode)],
        )
    }

    pub fn details(provider: &str, id: &str, media_type: Option<MediaType>) -> Self {
        let media_type = media_type.unwrap_or_default().to_string();
        Self::build(CacheCategory::Details, provider, &[&media_type, id])
    }

    pub fn category(&self) -> CacheCategory {
        self.category
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Byte cap for the memory tier
    pub memory_max_bytes: u64,
    /// Byte cap for the disk tier
    pub disk_max_bytes: u64,
    pub home_ttl: Option<Duration>,
    pub search_ttl: Option<Duration>,
    pub links_ttl: Option<Duration>,
    /// `None`: bounded only by the size caps
    pub details_ttl: Option<Duration>,
}

impl CacheConfig {
    pub fn ttl(&self, category: CacheCategory) -> Option<Duration> {
        match category {
            CacheCategory::Home => self.home_ttl,
            CacheCategory::Search => self.search_ttl,
            CacheCategory::Links => self.links_ttl,
            CacheCategory::Details => self.details_ttl,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_max_bytes: 32 * 1024 * 1024,
            disk_max_bytes: 256 * 1024 * 1024,
            home_ttl: Some(Duration::from_secs(30 * 60)),
            search_ttl: Some(Duration::from_secs(30 * 60)),
            links_ttl: Some(Duration::from_secs(2 * 60 * 60)),
            details_ttl: None,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub memory_bytes: u64,
    pub disk_entries: usize,
    pub disk_bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

pub struct ContentCache {
    memory: MemoryTier,
    disk: DiskTier,
    config: CacheConfig,
    /// Single writer across both tiers
    write_lock: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContentCache {
    pub fn new(store: Arc<dyn DurableStore>, config: CacheConfig) -> Self {
        Self {
            memory: MemoryTier::new(config.memory_max_bytes),
            disk: DiskTier::new(store, config.disk_max_bytes),
            config,
            write_lock: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn expiry_for(ttl: Option<Duration>) -> u64 {
        match ttl {
            Some(ttl) => now_millis().saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)).max(1),
            None => 0,
        }
    }

    /// Raw payload lookup: memory, then disk with promotion.
    ///
    /// The disk read, promotion and lazy removal run under the write lock so a concurrent
    /// write is never overwritten by the older disk copy.
    pub async fn get_bytes(&self, key: &CacheKey) -> Option<Vec<u8>> {
        if let Some(payload) = self.memory.get(key.as_str()) {
            debug!("Cache hit (memory): {key}");
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(payload);
        }

        let _guard = self.write_lock.lock().await;
        if let Some(payload) = self.memory.get(key.as_str()) {
            debug!("Cache hit (memory): {key}");
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(payload);
        }

        if let Some((payload, expires_at)) = self.disk.get(key.as_str()).await {
            debug!("Cache hit (disk): {key}");
            self.memory.put(key.as_str(), payload.clone(), expires_at);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(payload);
        }

        debug!("Cache miss: {key}");
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store with the category's default TTL
    pub async fn set_bytes(&self, key: &CacheKey, payload: Vec<u8>) {
        let ttl = self.config.ttl(key.category());
        self.set_bytes_with_ttl(key, payload, ttl).await;
    }

    pub async fn set_bytes_with_ttl(&self, key: &CacheKey, payload: Vec<u8>, ttl: Option<Duration>) {
        let expires_at = Self::expiry_for(ttl);
        let _guard = self.write_lock.lock().await;
        self.disk.put(key.as_str(), &payload, expires_at).await;
        self.memory.put(key.as_str(), payload, expires_at);
    }

    /// Typed lookup; an entry that no longer deserializes is dropped and reported as a miss
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let bytes = self.get_bytes(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Dropping undecodable cache entry {key}: {e}");
                self.invalidate(key).await;
                None
            }
        }
    }

    /// Typed store. Serialization failures are logged and nothing is cached.
    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set_bytes(key, bytes).await,
            Err(e) => warn!("Failed to serialize cache entry {key}: {e}"),
        }
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        let _guard = self.write_lock.lock().await;
        self.memory.remove(key.as_str());
        self.disk.remove(key.as_str()).await;
    }

    /// Sweep both tiers; returns the number of entries removed
    pub async fn purge_expired(&self) -> usize {
        let _guard = self.write_lock.lock().await;
        let memory = self.memory.purge_expired();
        let disk = self.disk.purge_expired().await;
        debug!("Purged {memory} memory and {disk} disk cache entries");
        memory + disk
    }

    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;
        self.memory.clear();
        self.disk.clear().await;
    }

    pub async fn stats(&self) -> CacheStats {
        let (memory_entries, memory_bytes) = self.memory.usage();
        let (disk_entries, disk_bytes) = self.disk.usage().await;
        CacheStats {
            memory_entries,
            memory_bytes,
            disk_entries,
            disk_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore, StoredEntry};
    use async_trait::async_trait;
    use serde::Deserialize;
    use tokio::sync::Notify;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Page {
        items: Vec<String>,
    }

    fn cache_with(store: Arc<dyn DurableStore>) -> ContentCache {
        ContentCache::new(store, CacheConfig::default())
    }

    #[tokio::test]
    async fn test_round_trip_before_expiry() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        let key = CacheKey::search("VidSrc", "dune", 1);

        cache.set_bytes(&key, b"\x00\x01payload\xff".to_vec()).await;
        assert_eq!(
            cache.get_bytes(&key).await.as_deref(),
            Some(&b"\x00\x01payload\xff"[..])
        );
    }

    #[tokio::test]
    async fn test_entry_absent_after_ttl() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone());
        let key = CacheKey::links("VidSrc", "550", None, None);

        cache
            .set_bytes_with_ttl(&key, b"links".to_vec(), Some(Duration::from_millis(30)))
            .await;
        assert!(cache.get_bytes(&key).await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get_bytes(&key).await, None);
        // Lazily removed from the durable tier as well
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_provider_isolation() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        let page = Page {
            items: vec!["Dune".to_string()],
        };

        cache.set(&CacheKey::search("A", "dune", 1), &page).await;

        assert_eq!(cache.get::<Page>(&CacheKey::search("A", "dune", 1)).await, Some(page));
        assert_eq!(cache.get::<Page>(&CacheKey::search("B", "dune", 1)).await, None);
        assert_eq!(cache.get::<Page>(&CacheKey::search("A", "dune", 2)).await, None);
    }

    #[tokio::test]
    async fn test_disk_hit_is_promoted_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let key = CacheKey::details("VidSrc", "550", Some(MediaType::Movie));

        {
            let cache = cache_with(Arc::new(FileStore::new(dir.path())));
            cache.set(&key, &"Fight Club").await;
        }

        let cache = cache_with(Arc::new(FileStore::new(dir.path())));
        assert_eq!(cache.stats().await.memory_entries, 0);

        assert_eq!(cache.get::<String>(&key).await.as_deref(), Some("Fight Club"));
        let stats = cache.stats().await;
        assert_eq!(stats.memory_entries, 1);
        assert_eq!(stats.disk_entries, 1);
        assert_eq!(stats.hits, 1);
    }

    /// Holds the first read of one storage key until released
    struct GatedStore {
        inner: MemoryStore,
        gated_key: String,
        reached: Notify,
        release: Notify,
        armed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl DurableStore for GatedStore {
        async fn read(&self, key: &str) -> crate::storage::Result<Option<Vec<u8>>> {
            let bytes = self.inner.read(key).await?;
            if key == self.gated_key && self.armed.swap(false, Ordering::SeqCst) {
                self.reached.notify_one();
                self.release.notified().await;
            }
            Ok(bytes)
        }

        async fn write(&self, key: &str, bytes: &[u8]) -> crate::storage::Result<()> {
            self.inner.write(key, bytes).await
        }

        async fn remove(&self, key: &str) -> crate::storage::Result<()> {
            self.inner.remove(key).await
        }

        async fn list(&self, prefix: &str) -> crate::storage::Result<Vec<StoredEntry>> {
            self.inner.list(prefix).await
        }
    }

    #[tokio::test]
    async fn test_write_during_disk_read_is_not_overwritten_by_promotion() {
        let key = CacheKey::details("VidSrc", "550", Some(MediaType::Movie));
        let inner = MemoryStore::new();
        inner
            .write(&disk::file_key(key.as_str()), &disk::encode(b"old", 0))
            .await
            .unwrap();

        let store = Arc::new(GatedStore {
            inner,
            gated_key: disk::file_key(key.as_str()),
            reached: Notify::new(),
            release: Notify::new(),
            armed: std::sync::atomic::AtomicBool::new(true),
        });
        let cache = Arc::new(cache_with(store.clone()));

        let reader = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            async move { cache.get_bytes(&key).await }
        });
        store.reached.notified().await;

        let writer = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            async move { cache.set_bytes(&key, b"new".to_vec()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.release.notify_one();

        assert_eq!(reader.await.unwrap(), Some(b"old".to_vec()));
        writer.await.unwrap();
        assert_eq!(cache.get_bytes(&key).await, Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_cap_evicts_oldest_write() {
        let config = CacheConfig {
            memory_max_bytes: 8,
            ..CacheConfig::default()
        };
        let cache = ContentCache::new(Arc::new(MemoryStore::new()), config);

        cache.set_bytes(&CacheKey::home("a"), vec![1; 4]).await;
        cache.set_bytes(&CacheKey::home("b"), vec![2; 4]).await;
        cache.set_bytes(&CacheKey::home("c"), vec![3; 4]).await;

        let stats = cache.stats().await;
        assert_eq!(stats.memory_entries, 2);
        assert_eq!(stats.memory_bytes, 8);
        // Still served from disk
        assert_eq!(cache.get_bytes(&CacheKey::home("a")).await, Some(vec![1; 4]));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_dropped() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        let key = CacheKey::home("VidSrc");

        cache.set_bytes(&key, b"not json".to_vec()).await;
        assert_eq!(cache.get::<Page>(&key).await, None);
        assert_eq!(cache.get_bytes(&key).await, None);
    }

    #[tokio::test]
    async fn test_purge_and_clear() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        cache
            .set_bytes_with_ttl(&CacheKey::home("x"), vec![1], Some(Duration::from_millis(1)))
            .await;
        cache.set_bytes(&CacheKey::home("y"), vec![2]).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.purge_expired().await, 2);

        cache.clear().await;
        let stats = cache.stats().await;
        assert_eq!(stats.memory_entries, 0);
        assert_eq!(stats.disk_entries, 0);
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(CacheKey::home("VidSrc").as_str(), "home:VidSrc");
        assert_eq!(CacheKey::search("VidSrc", "  Dune ", 2).as_str(), "search:VidSrc:dune:2");
        assert_eq!(
            CacheKey::links("VidLink", "1399", Some(1), Some(3)).as_str(),
            "links:VidLink:1399:1:3"
        );
        assert_eq!(CacheKey::links("VidLink", "550", None, None).as_str(), "links:VidLink:550:-:-");
        assert_eq!(CacheKey::details("X", "1", None).category(), CacheCategory::Details);
    }
}
