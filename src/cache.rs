//! Snapshot caching — TTL + capacity-bounded LRU store for rendered HTML.
//!
//! ## LRU eviction
//!
//! When the cache is at `max_entries`, the least-recently-accessed entry
//! is evicted; expired entries go first. Recency never extends a TTL —
//! expiry is measured from insertion only.

use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry {
    html: String,
    /// When the entry was inserted. TTL counts from here.
    cached_at: Instant,
    /// When the entry was last read (for LRU).
    last_accessed: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// In-memory snapshot cache keyed on the raw target URL string.
///
/// Keys are deliberately not normalized: two spellings of the same URL
/// occupy separate entries. There is no single-flight protection either;
/// concurrent misses on one key may render twice and the last write wins.
pub struct RenderCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl RenderCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Get a fresh snapshot, touching it for LRU. Expired entries are
    /// removed on the spot and reported as misses.
    pub fn get(&mut self, key: &str) -> Option<String> {
        match self.entries.get_mut(key) {
            Some(entry) if entry.is_expired(self.ttl) => {
                self.entries.remove(key);
                None
            }
            Some(entry) => {
                entry.touch();
                Some(entry.html.clone())
            }
            None => None,
        }
    }

    /// Store a snapshot, evicting at capacity.
    pub fn put(&mut self, key: &str, html: String) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(key) {
            self.evict_lru();
        }
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                html,
                cached_at: now,
                last_accessed: now,
            },
        );
    }

    /// Evict the least-recently-used entry; expired entries first.
    fn evict_lru(&mut self) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        if !expired.is_empty() {
            for key in expired {
                self.entries.remove(&key);
            }
            return;
        }

        if let Some(lru_key) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())
        {
            tracing::info!("evicting LRU cache entry: {lru_key}");
            self.entries.remove(&lru_key);
        }
    }

    /// Remove all expired entries.
    pub fn cleanup_expired(&mut self) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            self.entries.remove(&key);
        }
    }

    /// Number of cached snapshots (including expired ones not yet swept).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut cache = RenderCache::new(Duration::from_secs(3600), 10);
        cache.put("https://a.com/", "<html>a</html>".into());
        assert_eq!(cache.get("https://a.com/").as_deref(), Some("<html>a</html>"));
    }

    #[test]
    fn zero_ttl_entries_are_immediately_stale() {
        let mut cache = RenderCache::new(Duration::from_secs(0), 10);
        cache.put("https://a.com/", "x".into());
        assert!(cache.get("https://a.com/").is_none());
        // The stale entry was dropped on access, not just hidden.
        assert!(cache.is_empty());
    }

    #[test]
    fn lru_eviction_at_capacity() {
        let mut cache = RenderCache::new(Duration::from_secs(3600), 3);
        cache.put("a", "data-a".into());
        cache.put("b", "data-b".into());
        cache.put("c", "data-c".into());
        assert_eq!(cache.len(), 3);

        // Touch b and c so a becomes LRU.
        let _ = cache.get("b");
        let _ = cache.get("c");

        cache.put("d", "data-d".into());
        assert_eq!(cache.len(), 3);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
    }

    #[test]
    fn eviction_prefers_expired_entries() {
        let mut cache = RenderCache::new(Duration::from_millis(200), 3);
        cache.put("stale", "old".into());
        std::thread::sleep(Duration::from_millis(120));
        cache.put("b", "data-b".into());
        cache.put("c", "data-c".into());
        // Touch the oldest entry so "b" becomes the recency victim.
        assert!(cache.get("stale").is_some());
        std::thread::sleep(Duration::from_millis(120));

        // "stale" is past its TTL while "b" is merely least-recently
        // used; the expiry path must win.
        cache.put("d", "data-d".into());
        assert_eq!(cache.len(), 3);
        assert!(cache.get("stale").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
    }

    #[test]
    fn access_recency_does_not_extend_ttl() {
        let mut cache = RenderCache::new(Duration::from_millis(50), 10);
        cache.put("a", "x".into());
        // Touch within the TTL window, then outlive it.
        assert!(cache.get("a").is_some());
        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn cleanup_expired_sweeps_only_stale_entries() {
        let mut cache = RenderCache::new(Duration::from_millis(50), 10);
        cache.put("a", "data-a".into());
        std::thread::sleep(Duration::from_millis(60));
        cache.put("b", "data-b".into());

        cache.cleanup_expired();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn keys_are_raw_strings_not_normalized_urls() {
        // Equivalent URLs with different spellings cache separately.
        let mut cache = RenderCache::new(Duration::from_secs(3600), 10);
        cache.put("https://a.com/p?x=1&y=2", "one".into());
        cache.put("https://a.com/p?y=2&x=1", "two".into());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("https://a.com/p?x=1&y=2").as_deref(), Some("one"));
        assert_eq!(cache.get("https://a.com/p?y=2&x=1").as_deref(), Some("two"));
    }

    #[test]
    fn capacity_floor_is_one() {
        let mut cache = RenderCache::new(Duration::from_secs(3600), 0);
        cache.put("a", "x".into());
        cache.put("b", "y".into());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("b").is_some());
    }
}
