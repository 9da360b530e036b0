//! In-memory response cache with per-entry expiry

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// TTL cache shared by all portal requests.
///
/// Expiry is checked on read; every access also drops any other stale entries.
pub struct ApiCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> ApiCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        entries.get(key).map(|(_, value)| value.clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.into(), (Instant::now(), value));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let cache = ApiCache::new(Duration::from_secs(60));
        cache.insert("flib", 1);
        assert_eq!(cache.get("flib"), Some(1));
        assert_eq!(cache.get("other"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stale_entries_evicted_on_access() {
        let cache = ApiCache::new(Duration::from_millis(20));
        cache.insert("a", "x".to_string());
        cache.insert("b", "y".to_string());
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let cache = ApiCache::new(Duration::ZERO);
        cache.insert("flib", 1);
        assert_eq!(cache.len(), 0);
    }
}
