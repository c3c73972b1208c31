//! Keeping cached reads fresh: change events from a push channel when one
//! exists, fixed-interval invalidation otherwise.

use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::{QueryCache, QueryKey};
use crate::config::RefreshConfig;
use crate::query_key;

/// A row change reported by the store's push channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Mark everything cached for the changed table stale
pub async fn apply_change(cache: &QueryCache, event: &ChangeEvent) -> usize {
    let count = cache.invalidate(&query_key![event.table.as_str()]).await;
    tracing::debug!("change on {} ({} ids) invalidated {} keys", event.table, event.ids.len(), count);
    count
}

/// Invalidate on every event until the stream ends or the task is aborted
pub fn spawn_change_listener(cache: QueryCache, mut events: BoxStream<'static, ChangeEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            apply_change(&cache, &event).await;
        }
        tracing::info!("change stream ended");
    })
}

/// Degraded mode: mark `prefixes` stale every `interval`
pub fn spawn_polling(cache: QueryCache, prefixes: Vec<QueryKey>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; nothing is stale yet
        ticker.tick().await;
        loop {
            ticker.tick().await;
            for prefix in &prefixes {
                cache.invalidate(prefix).await;
            }
        }
    })
}

/// Start whichever refresh mode is available. Returns `None` when there is
/// no push channel and polling is disabled.
pub fn start(
    cache: &QueryCache,
    config: &RefreshConfig,
    push: Option<BoxStream<'static, ChangeEvent>>,
    prefixes: Vec<QueryKey>,
) -> Option<JoinHandle<()>> {
    match push {
        Some(events) => Some(spawn_change_listener(cache.clone(), events)),
        None if config.polling_enabled => {
            tracing::warn!("no push channel; polling every {:?}", config.poll_interval());
            Some(spawn_polling(cache.clone(), prefixes, config.poll_interval()))
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use serde_json::json;

    fn cache() -> QueryCache {
        QueryCache::new(&CacheConfig { stale_time_secs: 300, event_buffer: 16 })
    }

    #[tokio::test]
    async fn change_events_invalidate_their_table() {
        let cache = cache();
        cache.set_query_data(query_key!["leads", "list", "{}"], json!([])).await;
        cache.set_query_data(query_key!["customers", "list", "{}"], json!([])).await;

        let events = futures::stream::iter(vec![ChangeEvent { table: "leads".into(), ids: vec!["L1".into()] }]);
        spawn_change_listener(cache.clone(), events.boxed()).await.unwrap();

        assert!(cache.is_stale(&query_key!["leads", "list", "{}"]).await);
        assert!(!cache.is_stale(&query_key!["customers", "list", "{}"]).await);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_marks_prefixes_stale() {
        let cache = cache();
        let key = query_key!["notifications", "list", "{}"];
        cache.set_query_data(key.clone(), json!([])).await;

        let handle = spawn_polling(cache.clone(), vec![query_key!["notifications"]], Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(cache.is_stale(&key).await);
        handle.abort();
    }

    #[test]
    fn disabled_polling_without_push_starts_nothing() {
        let config = RefreshConfig { polling_enabled: false, poll_interval_secs: 30 };
        assert!(start(&cache(), &config, None, vec![]).is_none());
    }
}
