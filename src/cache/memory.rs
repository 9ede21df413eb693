use super::{is_expired, now_millis};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct MemoryEntry {
    payload: Arc<Vec<u8>>,
    /// Epoch milliseconds; 0 never expires
    expires_at: u64,
    seq: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, MemoryEntry>,
    /// Write order; the smallest sequence is the oldest entry
    order: BTreeMap<u64, String>,
    total_bytes: u64,
    next_seq: u64,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> Option<MemoryEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        self.total_bytes -= entry.payload.len() as u64;
        Some(entry)
    }
}

/// Process-lifetime tier, bounded by total payload bytes
#[derive(Debug)]
pub struct MemoryTier {
    state: Mutex<MemoryState>,
    max_bytes: u64,
}

impl MemoryTier {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            max_bytes,
        }
    }

    /// Live payload for `key`. An expired entry is dropped on the way out.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        let entry = state.entries.get(key)?.clone();

        if is_expired(entry.expires_at, now_millis()) {
            state.remove(key);
            return None;
        }

        Some(entry.payload.as_ref().clone())
    }

    /// Insert or replace. A replaced entry counts as newly created for eviction order.
    pub fn put(&self, key: &str, payload: Vec<u8>, expires_at: u64) {
        let size = payload.len() as u64;
        if size > self.max_bytes {
            return;
        }

        let mut state = self.state.lock();
        state.remove(key);

        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.insert(seq, key.to_string());
        state.total_bytes += size;
        state.entries.insert(
            key.to_string(),
            MemoryEntry {
                payload: Arc::new(payload),
                expires_at,
                seq,
            },
        );

        // Oldest first until back under the cap
        while state.total_bytes > self.max_bytes {
            let Some((_, oldest)) = state.order.pop_first() else {
                break;
            };
            if let Some(entry) = state.entries.remove(&oldest) {
                state.total_bytes -= entry.payload.len() as u64;
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.state.lock().remove(key);
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = now_millis();
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| is_expired(entry.expires_at, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }
        expired.len()
    }

    pub fn clear(&self) {
        *self.state.lock() = MemoryState::default();
    }

    /// (entries, bytes)
    pub fn usage(&self) -> (usize, u64) {
        let state = self.state.lock();
        (state.entries.len(), state.total_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_lazy_expiry() {
        let tier = MemoryTier::new(1024);
        tier.put("live", b"abc".to_vec(), 0);
        tier.put("stale", b"def".to_vec(), 1);

        assert_eq!(tier.get("live").as_deref(), Some(&b"abc"[..]));
        assert_eq!(tier.get("stale"), None);
        assert_eq!(tier.usage(), (1, 3));
    }

    #[test]
    fn test_fifo_eviction_ignores_reads() {
        let tier = MemoryTier::new(10);
        tier.put("a", vec![0; 4], 0);
        tier.put("b", vec![0; 4], 0);

        // A read does not refresh "a"
        assert!(tier.get("a").is_some());

        tier.put("c", vec![0; 4], 0);
        assert_eq!(tier.get("a"), None);
        assert!(tier.get("b").is_some());
        assert!(tier.get("c").is_some());
        assert_eq!(tier.usage(), (2, 8));
    }

    #[test]
    fn test_rewrite_moves_entry_to_back() {
        let tier = MemoryTier::new(10);
        tier.put("a", vec![0; 4], 0);
        tier.put("b", vec![0; 4], 0);
        tier.put("a", vec![1; 4], 0);
        tier.put("c", vec![0; 4], 0);

        assert_eq!(tier.get("b"), None);
        assert_eq!(tier.get("a"), Some(vec![1; 4]));
    }

    #[test]
    fn test_oversized_payload_is_not_stored() {
        let tier = MemoryTier::new(4);
        tier.put("big", vec![0; 5], 0);
        assert_eq!(tier.usage(), (0, 0));
    }

    #[test]
    fn test_purge_expired() {
        let tier = MemoryTier::new(100);
        tier.put("a", vec![0; 1], 1);
        tier.put("b", vec![0; 1], 2);
        tier.put("c", vec![0; 1], 0);
        assert_eq!(tier.purge_expired(), 2);
        assert_eq!(tier.usage(), (1, 1));
    }
}
