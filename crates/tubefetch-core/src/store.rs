//! Remembers which strategy worked for which video, and per-strategy
//! success counters.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StrategyStats {
    pub strategy: String,
    pub successes: u64,
    pub failures: u64,
}

/// Keyed store for cascade outcomes.
pub trait StrategyStore: Send + Sync {
    /// Strategy that last succeeded for `key`
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, strategy: &str);

    /// Count one attempt of `strategy`
    fn record(&self, strategy: &str, success: bool);

    /// Counters sorted by strategy name
    fn stats(&self) -> Vec<StrategyStats>;
}

#[derive(Debug, Default)]
struct Inner {
    last_good: HashMap<String, String>,
    counters: HashMap<String, StrategyStats>,
}

/// Process-local store.
#[derive(Debug)]
pub struct MemoryStrategyStore {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl MemoryStrategyStore {
    /// `capacity` bounds the number of remembered keys; when full the map is
    /// cleared rather than tracking recency.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for MemoryStrategyStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl StrategyStore for MemoryStrategyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().last_good.get(key).cloned()
    }

    fn put(&self, key: &str, strategy: &str) {
        let mut inner = self.inner.lock();
        if inner.last_good.len() >= self.capacity && !inner.last_good.contains_key(key) {
            inner.last_good.clear();
        }
        inner.last_good.insert(key.to_string(), strategy.to_string());
    }

    fn record(&self, strategy: &str, success: bool) {
        let mut inner = self.inner.lock();
        let entry = inner
            .counters
            .entry(strategy.to_string())
            .or_insert_with(|| StrategyStats {
                strategy: strategy.to_string(),
                ..Default::default()
            });
        if success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
    }

    fn stats(&self) -> Vec<StrategyStats> {
        let mut stats: Vec<StrategyStats> = self.inner.lock().counters.values().cloned().collect();
        stats.sort_by(|a, b| a.strategy.cmp(&b.strategy));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let store = MemoryStrategyStore::default();
        assert_eq!(store.get("abc"), None);

        store.put("abc", "standard");
        store.put("abc", "ipv4");

        assert_eq!(store.get("abc").as_deref(), Some("ipv4"));
    }

    #[test]
    fn test_capacity_resets_map() {
        let store = MemoryStrategyStore::new(2);
        store.put("a", "standard");
        store.put("b", "standard");
        store.put("b", "resilient");
        assert_eq!(store.get("a").as_deref(), Some("standard"));

        store.put("c", "ipv4");

        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("c").as_deref(), Some("ipv4"));
    }

    #[test]
    fn test_record_counts() {
        let store = MemoryStrategyStore::default();
        store.record("standard", false);
        store.record("resilient", true);
        store.record("standard", true);
        store.record("standard", false);

        let stats = store.stats();

        assert_eq!(
            stats,
            vec![
                StrategyStats { strategy: "resilient".into(), successes: 1, failures: 0 },
                StrategyStats { strategy: "standard".into(), successes: 1, failures: 2 },
            ]
        );
    }
}
