use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

use super::{into_row, row_id, RemoteDataClient, RemoteOp, Row};
use crate::error::CrmError;
use crate::filter::Filter;

/// Releases an operation held by [`MemoryStore::gate_next`].
/// `release(None)` lets it run; `release(Some(err))` fails it with `err`.
pub struct Gate {
    sender: oneshot::Sender<Option<CrmError>>,
}

impl Gate {
    pub fn release(self, outcome: Option<CrmError>) {
        let _ = self.sender.send(outcome);
    }
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Row>>,
    failures: VecDeque<(RemoteOp, CrmError)>,
    gates: VecDeque<(RemoteOp, oneshot::Receiver<Option<CrmError>>)>,
    calls: HashMap<RemoteOp, usize>,
    clock: Option<DateTime<Utc>>,
    latency: Option<Duration>,
}

/// In-process store with the same contract as the hosted one.
///
/// Fills `id`, `created_at` and `updated_at` the way the server does, and
/// lets callers inject failures, latency or hold an operation open.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) -> Result<(), CrmError> {
        let rows = rows.into_iter().map(into_row).collect::<Result<Vec<_>, _>>()?;
        self.state.lock().await.tables.entry(table.to_string()).or_default().extend(rows);
        Ok(())
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.state.lock().await.tables.get(table).cloned().unwrap_or_default()
    }

    /// Every table, for persisting an offline session
    pub async fn snapshot(&self) -> BTreeMap<String, Vec<Row>> {
        self.state.lock().await.tables.iter().map(|(table, rows)| (table.clone(), rows.clone())).collect()
    }

    /// Fail the next call of `op` with `error`
    pub async fn fail_next(&self, op: RemoteOp, error: CrmError) {
        self.state.lock().await.failures.push_back((op, error));
    }

    /// Hold the next call of `op` until the returned gate is released
    pub async fn gate_next(&self, op: RemoteOp) -> Gate {
        let (sender, receiver) = oneshot::channel();
        self.state.lock().await.gates.push_back((op, receiver));
        Gate { sender }
    }

    /// Fix the server clock used for timestamps
    pub async fn set_clock(&self, now: DateTime<Utc>) {
        self.state.lock().await.clock = Some(now);
    }

    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = Some(latency);
    }

    pub async fn calls(&self, op: RemoteOp) -> usize {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    pub async fn total_calls(&self) -> usize {
        self.state.lock().await.calls.values().sum()
    }

    /// Count the call, then apply latency, gates and injected failures
    async fn enter(&self, op: RemoteOp) -> Result<(), CrmError> {
        let (latency, gate, failure) = {
            let mut state = self.state.lock().await;
            *state.calls.entry(op).or_insert(0) += 1;
            let gate = state
                .gates
                .iter()
                .position(|(gated, _)| *gated == op)
                .and_then(|index| state.gates.remove(index))
                .map(|(_, receiver)| receiver);
            let failure = state
                .failures
                .iter()
                .position(|(failing, _)| *failing == op)
                .and_then(|index| state.failures.remove(index))
                .map(|(_, error)| error);
            (state.latency, gate, failure)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(gate) = gate {
            // A dropped gate releases the call normally
            if let Ok(Some(error)) = gate.await {
                return Err(error);
            }
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn timestamp(state: &MemoryState) -> String {
        state.clock.unwrap_or_else(Utc::now).to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[async_trait]
impl RemoteDataClient for MemoryStore {
    async fn select(&self, filter: &Filter) -> Result<Vec<Row>, CrmError> {
        self.enter(RemoteOp::Select).await?;
        let rows = self.rows(filter.table_name()).await;
        Ok(filter.apply(rows))
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, CrmError> {
        Filter::new(table)?;
        self.enter(RemoteOp::Insert).await?;

        let mut state = self.state.lock().await;
        let now = Self::timestamp(&state);
        let id = row_id(&row).unwrap_or_else(|| Uuid::new_v4().to_string());
        let rows = state.tables.entry(table.to_string()).or_default();
        if rows.iter().any(|existing| row_id(existing).as_deref() == Some(id.as_str())) {
            return Err(CrmError::remote(
                "23505",
                format!("duplicate key value violates unique constraint \"{}_pkey\"", table),
            ));
        }

        row.insert("id".to_string(), Value::String(id));
        row.entry("created_at".to_string()).or_insert_with(|| Value::String(now.clone()));
        row.insert("updated_at".to_string(), Value::String(now));
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row, CrmError> {
        Filter::new(table)?;
        self.enter(RemoteOp::Update).await?;

        let mut state = self.state.lock().await;
        let now = Self::timestamp(&state);
        let row = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row).as_deref() == Some(id)))
            .ok_or_else(|| CrmError::not_found(format!("{} row {}", table, id)))?;

        for (field, value) in patch {
            if field != "id" {
                row.insert(field, value);
            }
        }
        row.insert("updated_at".to_string(), Value::String(now));
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, ids: &[String]) -> Result<Vec<Row>, CrmError> {
        Filter::new(table)?;
        if ids.is_empty() {
            return Err(CrmError::validation("No ids given for delete"));
        }
        self.enter(RemoteOp::Delete).await?;

        let mut state = self.state.lock().await;
        let rows = state.tables.entry(table.to_string()).or_default();
        let (deleted, kept): (Vec<Row>, Vec<Row>) = rows
            .drain(..)
            .partition(|row| row_id(row).map_or(false, |id| ids.contains(&id)));
        *rows = kept;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterData;
    use chrono::TimeZone;
    use serde_json::json;

    #[tokio::test]
    async fn fills_server_fields_and_filters() {
        let store = MemoryStore::new();
        store.set_clock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()).await;
        let row = store
            .insert("leads", into_row(json!({ "full_name": "Dana", "status": "חדש" })).unwrap())
            .await
            .unwrap();
        assert!(row_id(&row).is_some());
        assert_eq!(row["updated_at"], "2024-01-01T00:00:00Z");

        let filter = Filter::from_data("leads", FilterData::where_eq("status", "חדש")).unwrap();
        assert_eq!(store.select(&filter).await.unwrap().len(), 1);
        assert_eq!(store.calls(RemoteOp::Select).await, 1);
    }

    #[tokio::test]
    async fn injected_failure_hits_only_its_operation() {
        let store = MemoryStore::new();
        store.seed("leads", vec![json!({ "id": "L1", "status": "חדש" })]).await.unwrap();
        store.fail_next(RemoteOp::Update, CrmError::network("connection reset")).await;

        assert_eq!(store.select(&Filter::new("leads").unwrap()).await.unwrap().len(), 1);
        let err = store.update("leads", "L1", into_row(json!({ "status": "x" })).unwrap()).await.unwrap_err();
        assert_eq!(err.error_code(), "NETWORK_ERROR");
        assert_eq!(store.rows("leads").await[0]["status"], "חדש");
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found_and_delete_returns_rows() {
        let store = MemoryStore::new();
        store.seed("leads", vec![json!({ "id": "L1" }), json!({ "id": "L2" })]).await.unwrap();
        let err = store.update("leads", "nope", Row::new()).await.unwrap_err();
        assert!(err.is_not_found());

        let deleted = store.delete("leads", &["L2".to_string()]).await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(store.rows("leads").await.len(), 1);
    }

    #[tokio::test]
    async fn gated_call_waits_for_release() {
        let store = MemoryStore::new();
        store.seed("leads", vec![json!({ "id": "L1" })]).await.unwrap();
        let gate = store.gate_next(RemoteOp::Update).await;

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.update("leads", "L1", into_row(json!({ "n": 1 })).unwrap()).await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        gate.release(Some(CrmError::network("timeout")));
        assert!(pending.await.unwrap().is_err());
    }
}
