use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use super::entry::{CacheEntry, CachedValue, Generation, Layer, Speculation};
use super::key::QueryKey;
use crate::config::CacheConfig;
use crate::error::CrmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    Updated,
    Invalidated,
    Removed,
    Cleared,
}

/// Change notification delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEvent {
    pub key: QueryKey,
    pub kind: CacheEventKind,
}

/// Process-wide query cache, constructed once per application and passed
/// to everything that reads or writes it.
///
/// Clones share state. The inner lock is only held for the duration of a
/// single cache operation, never across a remote call.
#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<QueryKey, CacheEntry>>>,
    events: broadcast::Sender<CacheEvent>,
    stale_time: chrono::Duration,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache").field("stale_time", &self.stale_time).finish_non_exhaustive()
    }
}

impl QueryCache {
    pub fn new(config: &CacheConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            events,
            stale_time: config.stale_time(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn emit(&self, key: QueryKey, kind: CacheEventKind) {
        // No receivers is fine
        let _ = self.events.send(CacheEvent { key, kind });
    }

    // ========================================
    // Reads
    // ========================================

    pub async fn get(&self, key: &QueryKey) -> Option<CachedValue> {
        let entries = self.entries.lock().await;
        let entry = entries.get(key)?;
        let value = entry.observed()?;
        Some(CachedValue {
            value,
            fetched_at: entry.fetched_at,
            stale: entry.is_stale(self.stale_time, Utc::now()),
            pending_mutations: entry.layers.len(),
        })
    }

    pub async fn get_value(&self, key: &QueryKey) -> Option<Value> {
        let entries = self.entries.lock().await;
        entries.get(key).and_then(CacheEntry::observed)
    }

    pub async fn is_stale(&self, key: &QueryKey) -> bool {
        let entries = self.entries.lock().await;
        entries.get(key).map_or(true, |entry| entry.is_stale(self.stale_time, Utc::now()))
    }

    /// Keys under `prefix` that currently hold a value
    pub async fn keys_matching(&self, prefix: &QueryKey) -> Vec<QueryKey> {
        let entries = self.entries.lock().await;
        let mut keys: Vec<QueryKey> = entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.confirmed.is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.values().filter(|e| e.confirmed.is_some()).count()
    }

    // ========================================
    // Writes
    // ========================================

    /// Authoritative write; in-flight fetches for the key are superseded
    pub async fn set_query_data(&self, key: QueryKey, value: Value) {
        {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(key.clone()).or_default();
            entry.bump_generation();
            entry.confirmed = Some(value);
            entry.fetched_at = Some(Utc::now());
            entry.stale = false;
        }
        tracing::debug!("cache set {}", key);
        self.emit(key, CacheEventKind::Updated);
    }

    /// Tag a new read for `key`; any earlier outstanding read becomes stale-generation
    pub async fn begin_fetch(&self, key: &QueryKey) -> Generation {
        let mut entries = self.entries.lock().await;
        entries.entry(key.clone()).or_default().bump_generation()
    }

    /// Store a read result if its generation is still current.
    /// Returns `false` when the response was superseded and dropped.
    pub async fn complete_fetch(&self, key: &QueryKey, generation: Generation, value: Value) -> bool {
        {
            let mut entries = self.entries.lock().await;
            let entry = match entries.get_mut(key) {
                Some(entry) if entry.generation == generation.0 => entry,
                Some(entry) => {
                    tracing::debug!(
                        "dropping superseded response for {} (generation {} < {})",
                        key, generation.0, entry.generation
                    );
                    return false;
                }
                None => {
                    tracing::debug!("dropping response for {}: entry was cleared", key);
                    return false;
                }
            };
            entry.confirmed = Some(value);
            entry.fetched_at = Some(Utc::now());
            entry.stale = false;
        }
        self.emit(key.clone(), CacheEventKind::Updated);
        true
    }

    /// Mark every key under `prefix` stale for lazy refresh; returns how many
    pub async fn invalidate(&self, prefix: &QueryKey) -> usize {
        let invalidated: Vec<QueryKey> = {
            let mut entries = self.entries.lock().await;
            entries
                .iter_mut()
                .filter(|(key, entry)| key.starts_with(prefix) && entry.confirmed.is_some())
                .map(|(key, entry)| {
                    entry.stale = true;
                    key.clone()
                })
                .collect()
        };
        tracing::debug!("invalidated {} keys under {}", invalidated.len(), prefix);
        let count = invalidated.len();
        for key in invalidated {
            self.emit(key, CacheEventKind::Invalidated);
        }
        count
    }

    pub async fn remove(&self, key: &QueryKey) -> Option<Value> {
        let removed = self.entries.lock().await.remove(key)?;
        self.emit(key.clone(), CacheEventKind::Removed);
        removed.observed()
    }

    /// Tear down: drop every entry (full reload)
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
        self.emit(QueryKey::new(), CacheEventKind::Cleared);
    }

    /// Return the cached value while fresh, otherwise run `fetcher` with
    /// generation tagging. A superseded response is not written; the caller
    /// then receives whatever the newer read left in the cache.
    pub async fn fetch_query<F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Value, CrmError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, CrmError>>,
    {
        if let Some(cached) = self.get(key).await {
            if !cached.stale {
                return Ok(cached.value);
            }
        }

        let generation = self.begin_fetch(key).await;
        let value = fetcher().await?;
        self.complete_fetch(key, generation, value.clone()).await;
        Ok(self.get_value(key).await.unwrap_or(value))
    }

    // ========================================
    // Optimistic layers (owned by mutation transactions)
    // ========================================

    /// Push a speculative layer and return the value observed just before it.
    /// Keys without a cached value, or whose value `touches` rejects, are left
    /// alone and yield `None`.
    pub(crate) async fn push_layer<P>(&self, key: &QueryKey, tx_id: Uuid, apply: Speculation, touches: P) -> Option<Value>
    where
        P: Fn(&Value) -> bool,
    {
        let snapshot = {
            let mut entries = self.entries.lock().await;
            let entry = entries.get_mut(key)?;
            let snapshot = entry.observed()?;
            if !touches(&snapshot) || entry.layers.iter().any(|layer| layer.tx_id == tx_id) {
                return None;
            }
            entry.bump_generation();
            entry.layers.push(Layer { tx_id, apply });
            snapshot
        };
        self.emit(key.clone(), CacheEventKind::Updated);
        Some(snapshot)
    }

    /// Fold a transaction's server-confirmed form into the confirmed value
    /// and drop its layer. The latest confirmation to arrive wins.
    pub(crate) async fn confirm_layer(&self, key: &QueryKey, tx_id: Uuid, confirm: Speculation) -> bool {
        let found = {
            let mut entries = self.entries.lock().await;
            match entries.get_mut(key) {
                Some(entry) => {
                    if entry.confirm(tx_id, &confirm) {
                        entry.bump_generation();
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };
        if found {
            self.emit(key.clone(), CacheEventKind::Updated);
        } else {
            tracing::debug!("no open layer for tx {} on {}", tx_id, key);
        }
        found
    }

    /// Remove a transaction's layer; later layers stay applied over what remains
    pub(crate) async fn discard_layer(&self, key: &QueryKey, tx_id: Uuid) -> bool {
        let found = {
            let mut entries = self.entries.lock().await;
            match entries.get_mut(key) {
                Some(entry) => match entry.layers.iter().position(|layer| layer.tx_id == tx_id) {
                    Some(index) => {
                        entry.layers.remove(index);
                        entry.bump_generation();
                        true
                    }
                    None => false,
                },
                None => false,
            }
        };
        if found {
            self.emit(key.clone(), CacheEventKind::Updated);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_key;
    use serde_json::json;

    fn cache() -> QueryCache {
        QueryCache::new(&CacheConfig { stale_time_secs: 300, event_buffer: 16 })
    }

    #[tokio::test]
    async fn superseded_fetch_is_dropped() {
        let cache = cache();
        let key = query_key!["leads", "list", "all"];

        let first = cache.begin_fetch(&key).await;
        let second = cache.begin_fetch(&key).await;

        assert!(cache.complete_fetch(&key, second, json!(["new"])).await);
        assert!(!cache.complete_fetch(&key, first, json!(["old"])).await);
        assert_eq!(cache.get_value(&key).await, Some(json!(["new"])));
    }

    #[tokio::test]
    async fn invalidate_by_prefix_marks_stale() {
        let cache = cache();
        cache.set_query_data(query_key!["leads", "detail", "L1"], json!({ "id": "L1" })).await;
        cache.set_query_data(query_key!["leads", "list", "{}"], json!([])).await;
        cache.set_query_data(query_key!["customers", "list", "{}"], json!([])).await;

        assert_eq!(cache.invalidate(&query_key!["leads"]).await, 2);
        assert!(cache.is_stale(&query_key!["leads", "detail", "L1"]).await);
        assert!(!cache.is_stale(&query_key!["customers", "list", "{}"]).await);
    }

    #[tokio::test]
    async fn fetch_query_serves_fresh_values_without_fetching() {
        let cache = cache();
        let key = query_key!["customers", "detail", "C1"];
        cache.set_query_data(key.clone(), json!({ "id": "C1" })).await;

        let value = cache
            .fetch_query(&key, || async { Err(CrmError::network("should not be called")) })
            .await
            .unwrap();
        assert_eq!(value, json!({ "id": "C1" }));

        cache.invalidate(&key).await;
        let refreshed = cache
            .fetch_query(&key, || async { Ok(json!({ "id": "C1", "full_name": "Noa" })) })
            .await
            .unwrap();
        assert_eq!(refreshed["full_name"], "Noa");
        assert!(!cache.is_stale(&key).await);
    }

    #[tokio::test]
    async fn subscribers_see_updates_and_clear() {
        let cache = cache();
        let mut events = cache.subscribe();
        let key = query_key!["meetings", "list", "{}"];
        cache.set_query_data(key.clone(), json!([])).await;
        cache.clear().await;

        assert_eq!(events.recv().await.unwrap(), CacheEvent { key, kind: CacheEventKind::Updated });
        assert_eq!(events.recv().await.unwrap().kind, CacheEventKind::Cleared);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn layers_skip_uncached_keys() {
        let cache = cache();
        let apply: Speculation = Arc::new(|v: &Value| v.clone());
        assert!(cache
            .push_layer(&query_key!["leads", "detail", "nope"], Uuid::new_v4(), apply, |_| true)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn confirmed_layer_folds_into_base() {
        let cache = cache();
        let key = query_key!["leads", "detail", "L1"];
        cache.set_query_data(key.clone(), json!({ "id": "L1", "n": 0 })).await;

        let tx = Uuid::new_v4();
        let apply: Speculation = Arc::new(|v: &Value| {
            let mut next = v.clone();
            next["n"] = json!(1);
            next
        });
        let before = cache.begin_fetch(&key).await;
        assert_eq!(cache.push_layer(&key, tx, apply, |_| true).await, Some(json!({ "id": "L1", "n": 0 })));
        assert_eq!(cache.get_value(&key).await, Some(json!({ "id": "L1", "n": 1 })));

        // A read issued before the write cannot land on top of it
        assert!(!cache.complete_fetch(&key, before, json!({ "id": "L1", "n": 0 })).await);

        let confirm: Speculation = Arc::new(|_: &Value| json!({ "id": "L1", "n": 2 }));
        assert!(cache.confirm_layer(&key, tx, confirm).await);
        let cached = cache.get(&key).await.unwrap();
        assert_eq!(cached.value, json!({ "id": "L1", "n": 2 }));
        assert_eq!(cached.pending_mutations, 0);
        assert!(!cache.discard_layer(&key, tx).await);
    }
}
