use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::patch::{CacheTarget, MutationIntent};
use crate::cache::{QueryCache, QueryKey};
use crate::error::CrmError;
use crate::remote::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Pending,
    Committed,
    RolledBack,
}

/// One optimistic write cycle against the cache.
///
/// `begin` pushes a layer on every targeted key that currently holds a
/// matching value, recording what the key showed just before. `commit`
/// swaps those layers for the server rows; `abort` removes them
/// last-patched-first. Layers of other transactions are never touched, so a
/// rollback cannot erase a later transaction's write.
#[derive(Debug)]
pub struct MutationTransaction {
    id: Uuid,
    table: String,
    intent: MutationIntent,
    /// (key, is_list) in patch order
    keys: Vec<(QueryKey, bool)>,
    snapshots: Vec<(QueryKey, Value)>,
    state: TransactionState,
    started_at: DateTime<Utc>,
    cache: QueryCache,
}

impl MutationTransaction {
    pub async fn begin(
        cache: &QueryCache,
        table: impl Into<String>,
        intent: MutationIntent,
        targets: &[CacheTarget],
    ) -> Result<Self, CrmError> {
        let ids = intent.ids();
        if ids.is_empty() || ids.iter().any(|id| id.trim().is_empty()) {
            return Err(CrmError::validation("Mutation requires a target id"));
        }

        let mut tx = Self {
            id: Uuid::new_v4(),
            table: table.into(),
            intent,
            keys: Vec::new(),
            snapshots: Vec::new(),
            state: TransactionState::Pending,
            started_at: Utc::now(),
            cache: cache.clone(),
        };

        for target in targets {
            let (keys, list) = match target {
                CacheTarget::Detail(key) => (vec![key.clone()], false),
                CacheTarget::ListPrefix(prefix) => (cache.keys_matching(prefix).await, true),
            };
            for key in keys {
                if tx.keys.iter().any(|(existing, _)| *existing == key) {
                    continue;
                }
                let intent = &tx.intent;
                let pushed = cache
                    .push_layer(&key, tx.id, intent.speculation(list), |value| intent.touches(value, list))
                    .await;
                if let Some(snapshot) = pushed {
                    tx.snapshots.push((key.clone(), snapshot));
                    tx.keys.push((key, list));
                }
            }
        }

        tracing::info!(
            "mutation {} began on {} ({} cached views patched)",
            tx.id, tx.table, tx.keys.len()
        );
        Ok(tx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn intent(&self) -> &MutationIntent {
        &self.intent
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Keys this transaction patched, in patch order
    pub fn affected_keys(&self) -> Vec<QueryKey> {
        self.keys.iter().map(|(key, _)| key.clone()).collect()
    }

    /// What `key` showed immediately before this transaction patched it
    pub fn snapshot(&self, key: &QueryKey) -> Option<&Value> {
        self.snapshots.iter().find(|(k, _)| k == key).map(|(_, value)| value)
    }

    fn ensure_pending(&self) -> Result<(), CrmError> {
        match self.state {
            TransactionState::Pending => Ok(()),
            settled => Err(CrmError::validation(format!(
                "mutation {} is already {:?}",
                self.id, settled
            ))),
        }
    }

    /// Write the server rows over this transaction's layers, then mark
    /// `invalidate` prefixes stale for lazy refresh
    pub async fn commit(&mut self, server_rows: &[Row], invalidate: &[QueryKey]) -> Result<(), CrmError> {
        self.ensure_pending()?;
        for (key, list) in &self.keys {
            let confirm = self.intent.confirmation(*list, server_rows);
            self.cache.confirm_layer(key, self.id, confirm).await;
        }
        for prefix in invalidate {
            self.cache.invalidate(prefix).await;
        }
        self.state = TransactionState::Committed;
        tracing::info!("mutation {} committed on {}", self.id, self.table);
        Ok(())
    }

    /// Remove this transaction's layers, last-patched-first
    pub async fn abort(&mut self) -> Result<(), CrmError> {
        self.ensure_pending()?;
        for (key, _) in self.keys.iter().rev() {
            self.cache.discard_layer(key, self.id).await;
        }
        self.state = TransactionState::RolledBack;
        tracing::warn!("mutation {} rolled back on {}", self.id, self.table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::mutation::Patch;
    use crate::query_key;
    use crate::remote::into_row;
    use serde_json::json;

    fn cache() -> QueryCache {
        QueryCache::new(&CacheConfig { stale_time_secs: 300, event_buffer: 64 })
    }

    fn status_update(id: &str, status: &str) -> MutationIntent {
        MutationIntent::Update { id: id.to_string(), patch: Patch::set("status", status).unwrap() }
    }

    #[tokio::test]
    async fn abort_restores_every_snapshot() {
        let cache = cache();
        let detail = query_key!["leads", "detail", "L1"];
        let list = query_key!["leads", "list", "{}"];
        cache.set_query_data(detail.clone(), json!({ "id": "L1", "status": "חדש" })).await;
        cache.set_query_data(list.clone(), json!([{ "id": "L1", "status": "חדש" }, { "id": "L2" }])).await;

        let mut tx = MutationTransaction::begin(
            &cache,
            "leads",
            status_update("L1", "בטיפול"),
            &[CacheTarget::Detail(detail.clone()), CacheTarget::ListPrefix(query_key!["leads", "list"])],
        )
        .await
        .unwrap();
        assert_eq!(tx.affected_keys(), vec![detail.clone(), list.clone()]);
        assert_eq!(cache.get_value(&list).await.unwrap()[0]["status"], "בטיפול");

        tx.abort().await.unwrap();
        assert_eq!(cache.get_value(&detail).await.as_ref(), tx.snapshot(&detail));
        assert_eq!(cache.get_value(&list).await.as_ref(), tx.snapshot(&list));
        assert!(tx.abort().await.is_err());
    }

    #[tokio::test]
    async fn earlier_rollback_keeps_later_write() {
        let cache = cache();
        let key = query_key!["leads", "detail", "L1"];
        cache.set_query_data(key.clone(), json!({ "id": "L1", "status": "חדש", "notes": "" })).await;
        let targets = [CacheTarget::Detail(key.clone())];

        let mut m1 = MutationTransaction::begin(&cache, "leads", status_update("L1", "בטיפול"), &targets).await.unwrap();
        let notes = MutationIntent::Update { id: "L1".into(), patch: Patch::set("notes", "called").unwrap() };
        let m2 = MutationTransaction::begin(&cache, "leads", notes, &targets).await.unwrap();

        // M2's snapshot already reflects M1's optimistic write
        assert_eq!(m2.snapshot(&key).unwrap()["status"], "בטיפול");

        m1.abort().await.unwrap();
        assert_eq!(
            cache.get_value(&key).await,
            Some(json!({ "id": "L1", "status": "חדש", "notes": "called" }))
        );
        assert_eq!(cache.get(&key).await.unwrap().pending_mutations, 1);
    }

    #[tokio::test]
    async fn commit_writes_server_row_and_marks_dependents_stale() {
        let cache = cache();
        let key = query_key!["leads", "detail", "L1"];
        let stats = query_key!["lead_stats", "list", "{}"];
        cache.set_query_data(key.clone(), json!({ "id": "L1", "status": "חדש" })).await;
        cache.set_query_data(stats.clone(), json!([{ "status": "חדש", "count": 1 }])).await;

        let mut tx = MutationTransaction::begin(
            &cache,
            "leads",
            status_update("L1", "בטיפול"),
            &[CacheTarget::Detail(key.clone())],
        )
        .await
        .unwrap();
        let server = into_row(json!({ "id": "L1", "status": "בטיפול", "updated_at": "2024-01-01T00:00:00Z" })).unwrap();
        tx.commit(&[server.clone()], &[query_key!["lead_stats"]]).await.unwrap();

        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(cache.get_value(&key).await, Some(Value::Object(server)));
        assert!(cache.is_stale(&stats).await);
        assert!(tx.commit(&[], &[]).await.is_err());
    }

    #[tokio::test]
    async fn missing_id_fails_before_touching_cache() {
        let cache = cache();
        let key = query_key!["leads", "detail", ""];
        cache.set_query_data(key.clone(), json!({ "status": "חדש" })).await;
        let err = MutationTransaction::begin(&cache, "leads", status_update(" ", "x"), &[CacheTarget::Detail(key.clone())])
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(cache.get(&key).await.unwrap().pending_mutations, 0);
    }
}
