//! Execution result cache with per-entry TTL and LRU eviction

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use sigrun_core::AlgorithmOutput;

use crate::{
    config::ResultCacheConfig, fingerprint::Fingerprint, stats::StatsCollector, CacheError,
    CacheResult, CacheStats,
};

/// Cached execution result
#[derive(Debug, Clone)]
struct CacheEntry {
    output: AlgorithmOutput,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) > self.ttl
    }
}

/// Result cache keyed by [`Fingerprint`]
///
/// Expired entries are dropped lazily on lookup or in bulk through
/// [`ResultCache::cleanup_expired`]. A lookup refreshes the entry's
/// recency, so eviction removes the least recently used entry.
pub struct ResultCache {
    entries: Mutex<LruCache<Fingerprint, CacheEntry>>,
    config: ResultCacheConfig,
    stats: StatsCollector,
}

impl ResultCache {
    /// Create a new result cache
    pub fn new(config: ResultCacheConfig) -> CacheResult<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_entries).ok_or_else(|| {
            CacheError::InvalidConfiguration("max_entries must be greater than 0".to_string())
        })?;

        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            config,
            stats: StatsCollector::new(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &ResultCacheConfig {
        &self.config
    }

    /// Look up a cached result. Entries older than their TTL count as a miss
    /// and are removed.
    pub fn get(&self, key: &Fingerprint) -> Option<AlgorithmOutput> {
        if !self.config.enabled {
            return None;
        }

        let mut entries = self.entries.lock();
        let expired = match entries.peek(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(Instant::now()),
        };

        if expired {
            entries.pop(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            debug!("Result cache entry {} expired", key);
            return None;
        }

        let output = entries.get(key).map(|entry| entry.output.clone());
        self.stats.record_hit();
        output
    }

    /// Store a result. `ttl` falls back to the configured default. When the
    /// cache is full the least recently used entry is evicted first.
    pub fn put(&self, key: Fingerprint, output: AlgorithmOutput, ttl: Option<Duration>) {
        if !self.config.enabled {
            return;
        }
        if !output.is_success() {
            debug!("Not caching unsuccessful result for {}", output.algorithm_id);
            return;
        }

        let entry = CacheEntry {
            output,
            created_at: Instant::now(),
            ttl: ttl.unwrap_or(self.config.default_ttl),
        };

        let mut entries = self.entries.lock();
        if !entries.contains(&key) && entries.len() >= entries.cap().get() {
            if let Some((evicted, _)) = entries.pop_lru() {
                self.stats.record_eviction();
                debug!("Evicted result cache entry {}", evicted);
            }
        }
        entries.put(key, entry);
        self.stats.record_put();
    }

    pub fn remove(&self, key: &Fingerprint) -> Option<AlgorithmOutput> {
        self.entries.lock().pop(key).map(|entry| entry.output)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<Fingerprint> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        if !expired.is_empty() {
            self.stats.record_expirations(expired.len() as u64);
            debug!("Removed {} expired result cache entries", expired.len());
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.get_stats(self.len())
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use serde_json::json;
    use sigrun_core::{AlgorithmInput, ComputeOutput, Diagnosis, ExecutionId, OutputMetadata};

    fn key(n: usize) -> Fingerprint {
        fingerprint("statistics", &AlgorithmInput::series(vec![n as f64], 100.0), &json!({})).unwrap()
    }

    fn metadata() -> OutputMetadata {
        OutputMetadata {
            execution_id: ExecutionId::new(),
            execution_time_ms: 3,
            input_data_points: 1,
            algorithm_version: "1.0.0".to_string(),
            parameters: json!({}),
            cache_hit: false,
            offloaded: false,
        }
    }

    fn output(value: i64) -> AlgorithmOutput {
        AlgorithmOutput::completed(
            "statistics",
            ComputeOutput::new(Diagnosis::normal("ok"), json!({ "value": value })),
            metadata(),
        )
    }

    fn cache(max_entries: usize) -> ResultCache {
        ResultCache::new(ResultCacheConfig::default().with_max_entries(max_entries)).unwrap()
    }

    #[test]
    fn test_put_and_get() {
        let cache = cache(10);
        cache.put(key(1), output(1), None);

        let cached = cache.get(&key(1)).unwrap();
        assert_eq!(cached.results["value"], 1);
        assert!(cache.get(&key(2)).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.puts, 1);
        assert_eq!(stats.entry_count, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = cache(10);
        cache.put(key(1), output(1), Some(Duration::from_millis(20)));
        assert!(cache.get(&key(1)).is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = cache(2);
        cache.put(key(1), output(1), None);
        cache.put(key(2), output(2), None);

        // touch 1 so that 2 becomes the eviction candidate
        assert!(cache.get(&key(1)).is_some());
        cache.put(key(3), output(3), None);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(1)).is_some());
        assert!(cache.get(&key(2)).is_none());
        assert!(cache.get(&key(3)).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = cache(2);
        cache.put(key(1), output(1), None);
        cache.put(key(2), output(2), None);
        cache.put(key(2), output(20), None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.get(&key(2)).unwrap().results["value"], 20);
    }

    #[test]
    fn test_failed_results_are_not_cached() {
        let cache = cache(10);
        cache.put(key(1), AlgorithmOutput::failed("statistics", "boom", metadata()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup_expired() {
        let cache = cache(10);
        cache.put(key(1), output(1), Some(Duration::from_millis(10)));
        cache.put(key(2), output(2), Some(Duration::from_secs(60)));

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(2)).is_some());
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = ResultCache::new(ResultCacheConfig::disabled()).unwrap();
        cache.put(key(1), output(1), None);
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = cache(10);
        cache.put(key(1), output(1), None);
        cache.put(key(2), output(2), None);

        assert!(cache.remove(&key(1)).is_some());
        assert!(cache.remove(&key(1)).is_none());
        cache.clear();
        assert!(cache.is_empty());
    }
}
