use super::{is_expired, now_millis};
use crate::storage::{DurableStore, StoredEntry};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const MAGIC: &[u8; 4] = b"SVC1";
const HEADER_LEN: usize = MAGIC.len() + 8;

/// Directory (key prefix) all cache files live under
pub const CACHE_PREFIX: &str = "cache/";

/// Storage key for a cache key: the SHA-256 hex digest under [`CACHE_PREFIX`]
pub fn file_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{CACHE_PREFIX}{hex}")
}

/// Magic, big-endian expiry millis, payload
pub(crate) fn encode(payload: &[u8], expires_at: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&expires_at.to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// `None` for anything without a valid header
pub(crate) fn decode(bytes: &[u8]) -> Option<(u64, &[u8])> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return None;
    }
    let expiry: [u8; 8] = bytes[MAGIC.len()..HEADER_LEN].try_into().ok()?;
    Some((u64::from_be_bytes(expiry), &bytes[HEADER_LEN..]))
}

/// Durable tier: one file per key, evicted oldest-created first once over the byte cap
pub struct DiskTier {
    store: Arc<dyn DurableStore>,
    max_bytes: u64,
    /// File sizes, seeded from one listing on first use
    usage: Mutex<Option<Usage>>,
}

#[derive(Default)]
struct Usage {
    sizes: HashMap<String, u64>,
    bytes: u64,
}

impl Usage {
    fn from_entries(entries: &[StoredEntry]) -> Self {
        let sizes: HashMap<String, u64> = entries.iter().map(|e| (e.key.clone(), e.size)).collect();
        let bytes = sizes.values().sum();
        Self { sizes, bytes }
    }

    fn record(&mut self, file: &str, size: u64) {
        let old = self.sizes.insert(file.to_string(), size).unwrap_or(0);
        self.bytes = self.bytes.saturating_sub(old) + size;
    }

    fn forget(&mut self, file: &str) {
        if let Some(size) = self.sizes.remove(file) {
            self.bytes = self.bytes.saturating_sub(size);
        }
    }
}

/// Live payload and its expiry
pub type DiskHit = (Vec<u8>, u64);

impl DiskTier {
    pub fn new(store: Arc<dyn DurableStore>, max_bytes: u64) -> Self {
        Self {
            store,
            max_bytes,
            usage: Mutex::new(None),
        }
    }

    pub async fn get(&self, key: &str) -> Option<DiskHit> {
        let file = file_key(key);
        let bytes = match self.store.read(&file).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed for {key}: {e}");
                return None;
            }
        };

        match decode(&bytes) {
            Some((expires_at, _)) if is_expired(expires_at, now_millis()) => {
                debug!("Disk cache entry expired: {key}");
                self.remove_file(&file).await;
                None
            }
            Some((expires_at, payload)) => Some((payload.to_vec(), expires_at)),
            None => {
                warn!("Dropping corrupt cache file for {key}");
                self.remove_file(&file).await;
                None
            }
        }
    }

    /// Write then sweep. Failures are logged; the caller's operation continues.
    pub async fn put(&self, key: &str, payload: &[u8], expires_at: u64) {
        let bytes = encode(payload, expires_at);
        if bytes.len() as u64 > self.max_bytes {
            debug!("Cache payload for {key} exceeds disk cap, not persisted");
            return;
        }

        let file = file_key(key);
        if let Err(e) = self.store.write(&file, &bytes).await {
            warn!("Cache write failed for {key}: {e}");
            return;
        }

        self.seed().await;
        let total = {
            let mut usage = self.usage.lock();
            let usage = usage.get_or_insert_with(Usage::default);
            usage.record(&file, bytes.len() as u64);
            usage.bytes
        };
        if total > self.max_bytes {
            self.evict().await;
        }
    }

    pub async fn remove(&self, key: &str) {
        self.remove_file(&file_key(key)).await;
    }

    async fn remove_file(&self, file: &str) {
        match self.store.remove(file).await {
            Ok(()) => {
                if let Some(usage) = self.usage.lock().as_mut() {
                    usage.forget(file);
                }
            }
            Err(e) => warn!("Cache remove failed for {file}: {e}"),
        }
    }

    async fn entries(&self) -> Vec<StoredEntry> {
        self.store.list(CACHE_PREFIX).await.unwrap_or_else(|e| {
            warn!("Cache listing failed: {e}");
            Vec::new()
        })
    }

    /// Build the size index from one listing unless it already exists
    async fn seed(&self) {
        if self.usage.lock().is_some() {
            return;
        }
        let entries = self.entries().await;
        let mut usage = self.usage.lock();
        if usage.is_none() {
            *usage = Some(Usage::from_entries(&entries));
        }
    }

    /// Drop oldest files until the total fits, then resync the index from the listing
    async fn evict(&self) {
        let mut entries = self.entries().await;
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let mut total: u64 = entries.iter().map(|e| e.size).sum();

        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries {
            if total <= self.max_bytes {
                kept.push(entry);
                continue;
            }
            if let Err(e) = self.store.remove(&entry.key).await {
                warn!("Cache remove failed for {}: {e}", entry.key);
                kept.push(entry);
                continue;
            }
            total = total.saturating_sub(entry.size);
            debug!("Evicted {} ({} bytes)", entry.key, entry.size);
        }

        *self.usage.lock() = Some(Usage::from_entries(&kept));
    }

    /// Remove expired and unreadable files; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = now_millis();
        let mut removed = 0;

        for entry in self.entries().await {
            let stale = match self.store.read(&entry.key).await {
                Ok(Some(bytes)) => decode(&bytes).is_none_or(|(exp, _)| is_expired(exp, now)),
                Ok(None) => false,
                Err(e) => {
                    warn!("Cache read failed for {}: {e}", entry.key);
                    false
                }
            };

            if stale {
                self.remove_file(&entry.key).await;
                removed += 1;
            }
        }
        removed
    }

    pub async fn clear(&self) {
        for entry in self.entries().await {
            self.remove_file(&entry.key).await;
        }
    }

    /// (entries, bytes)
    pub async fn usage(&self) -> (usize, u64) {
        self.seed().await;
        self.usage
            .lock()
            .as_ref()
            .map_or((0, 0), |usage| (usage.sizes.len(), usage.bytes))
    }
}
