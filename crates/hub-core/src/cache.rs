//! Result Cache
//!
//! Memoizes task outputs by `(kind, input)`. Keys are built from canonical
//! JSON (object keys sorted) so logically identical inputs share an entry.
//! Entries are bounded by capacity and expire after a TTL.

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::CacheConfig;
use crate::tasks::{TaskKind, TaskOutput};

/// Cache key: `"<kind>-<canonical json>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(kind: TaskKind, input: &Value) -> Self {
        Self(format!("{}-{}", kind, canonical_json(input)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialize with object keys sorted at every depth
pub fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let ordered: BTreeMap<&String, Value> =
                    map.iter().map(|(k, v)| (k, sorted(v))).collect();
                Value::Object(ordered.into_iter().map(|(k, v)| (k.clone(), v)).collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }

    sorted(value).to_string()
}

/// Hit and miss counts since creation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

impl CacheStats {
    /// `hits / (hits + misses)`, 0 when nothing was looked up
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Bounded cache of task outputs
pub struct ResultCache {
    cache: Cache<CacheKey, Arc<TaskOutput>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, config.ttl())
    }

    pub fn key_for(kind: TaskKind, input: &Value) -> CacheKey {
        CacheKey::new(kind, input)
    }

    /// Look up a key, counting the hit or miss
    pub async fn get(&self, key: &CacheKey) -> Option<TaskOutput> {
        match self.cache.get(key).await {
            Some(output) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(output.as_ref().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Look up without touching the counters
    pub async fn peek(&self, key: &CacheKey) -> Option<TaskOutput> {
        self.cache.get(key).await.map(|o| o.as_ref().clone())
    }

    /// Store an output, overwriting any previous value for the key
    pub async fn set(&self, key: CacheKey, output: TaskOutput) {
        self.cache.insert(key, Arc::new(output)).await;
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Approximate number of live entries
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush pending maintenance so `len` is exact
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache").field("stats", &self.stats()).finish()
    }
}
