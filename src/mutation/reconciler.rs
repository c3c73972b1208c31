use std::sync::Arc;

use super::patch::{CacheTarget, MutationIntent, Patch};
use super::transaction::MutationTransaction;
use crate::auth::SessionStore;
use crate::cache::{QueryCache, QueryKey};
use crate::error::CrmError;
use crate::notify::Notifier;
use crate::remote::{RemoteDataClient, Row};

/// Runs writes as begin → remote call → commit/abort.
///
/// Write failures are always returned and notified. Auth failures also end
/// the session when a session store is attached.
#[derive(Clone)]
pub struct Reconciler {
    client: Arc<dyn RemoteDataClient>,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
    sessions: Option<SessionStore>,
}

impl Reconciler {
    pub fn new(client: Arc<dyn RemoteDataClient>, cache: QueryCache, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, cache, notifier, sessions: None }
    }

    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Optimistically patch one row and return the server row
    pub async fn update(
        &self,
        table: &str,
        id: &str,
        patch: Patch,
        targets: &[CacheTarget],
        invalidate: &[QueryKey],
    ) -> Result<Row, CrmError> {
        let intent = MutationIntent::Update { id: id.to_string(), patch: patch.clone() };
        let mut tx = MutationTransaction::begin(&self.cache, table, intent, targets).await?;

        match self.client.update(table, id, patch.into_row()).await {
            Ok(row) => {
                tx.commit(std::slice::from_ref(&row), invalidate).await?;
                Ok(row)
            }
            Err(err) => self.fail(&mut tx, err).await,
        }
    }

    /// Optimistically drop rows from cached views and return the deleted rows
    pub async fn remove(
        &self,
        table: &str,
        ids: &[String],
        targets: &[CacheTarget],
        invalidate: &[QueryKey],
    ) -> Result<Vec<Row>, CrmError> {
        if ids.is_empty() {
            return Err(CrmError::validation("No ids given for delete"));
        }
        let intent = MutationIntent::Remove { ids: ids.to_vec() };
        let mut tx = MutationTransaction::begin(&self.cache, table, intent, targets).await?;

        match self.client.delete(table, ids).await {
            Ok(rows) => {
                tx.commit(&rows, invalidate).await?;
                Ok(rows)
            }
            Err(err) => self.fail(&mut tx, err).await,
        }
    }

    async fn fail<T>(&self, tx: &mut MutationTransaction, err: CrmError) -> Result<T, CrmError> {
        tx.abort().await?;
        tracing::error!("{} write failed ({}): {}", tx.table(), err.error_code(), err);
        if err.is_terminal() {
            if let Some(sessions) = &self.sessions {
                sessions.invalidate().await;
            }
        }
        self.notifier.notify_error(&err);
        Err(err)
    }
}
