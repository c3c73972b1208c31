use std::marker::PhantomData;

use serde_json::Value;

use super::context::HookContext;
use crate::cache::QueryKey;
use crate::error::CrmError;
use crate::filter::{Filter, FilterData};
use crate::models::{parse_rows, Entity};
use crate::mutation::{CacheTarget, Patch};
use crate::query_key;
use crate::remote::Row;

/// Read and write functions for one table.
///
/// Detail reads live under `[table, "detail", id]`, list reads under
/// `[table, "list", filter]`. Writes go through the reconciler so cached
/// views change before the store answers.
pub struct EntityHooks<T: Entity> {
    ctx: HookContext,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for EntityHooks<T> {
    fn clone(&self) -> Self {
        Self::new(self.ctx.clone())
    }
}

impl<T: Entity> EntityHooks<T> {
    pub fn new(ctx: HookContext) -> Self {
        Self { ctx, _entity: PhantomData }
    }

    pub fn context(&self) -> &HookContext {
        &self.ctx
    }

    pub fn table_key() -> QueryKey {
        query_key![T::TABLE]
    }

    pub fn detail_key(id: &str) -> QueryKey {
        query_key![T::TABLE, "detail", id]
    }

    pub fn list_prefix() -> QueryKey {
        query_key![T::TABLE, "list"]
    }

    pub fn list_key(data: &FilterData) -> QueryKey {
        query_key![T::TABLE, "list", data.cache_fingerprint()]
    }

    fn require_id(id: &str) -> Result<(), CrmError> {
        if id.trim().is_empty() {
            return Err(CrmError::field_validation("id", "is required"));
        }
        Ok(())
    }

    /// One row by id. A missing row is `None`, not an error.
    pub async fn fetch_one(&self, id: &str) -> Result<Option<T>, CrmError> {
        Self::require_id(id)?;
        let key = Self::detail_key(id);
        let filter = Filter::by_id(T::TABLE, id)?;
        let client = self.ctx.client.clone();

        let fetched = self
            .ctx
            .cache
            .fetch_query(&key, || async move {
                let rows = client.select(&filter).await?;
                Ok::<_, CrmError>(rows.into_iter().next().map(Value::Object).unwrap_or(Value::Null))
            })
            .await;

        let value = match fetched {
            Ok(value) => value,
            Err(err) if err.is_not_found() => Value::Null,
            Err(err) => self.read_failed(&key, err).await?.unwrap_or(Value::Null),
        };
        match value {
            Value::Null => Ok(None),
            Value::Object(row) => Ok(Some(T::from_row(row)?)),
            other => Err(CrmError::Decode(format!("{} detail is not an object: {}", T::TABLE, other))),
        }
    }

    /// Rows matching `data`. Store failures fall back to the cached list (or
    /// an empty one) after notifying; auth failures are returned.
    pub async fn fetch_list(&self, data: FilterData) -> Result<Vec<T>, CrmError> {
        let filter = Filter::from_data(T::TABLE, data.clone())?;
        let key = Self::list_key(&data);
        let client = self.ctx.client.clone();

        let fetched = self
            .ctx
            .cache
            .fetch_query(&key, || async move {
                let rows = client.select(&filter).await?;
                Ok::<_, CrmError>(Value::Array(rows.into_iter().map(Value::Object).collect()))
            })
            .await;

        let value = match fetched {
            Ok(value) => value,
            Err(err) => self.read_failed(&key, err).await?.unwrap_or(Value::Array(Vec::new())),
        };
        parse_rows(value)
    }

    /// Rows where `column` equals `value`
    pub async fn fetch_by(&self, column: &str, value: impl Into<Value>) -> Result<Vec<T>, CrmError> {
        self.fetch_list(FilterData::where_eq(column, value)).await
    }

    async fn read_failed(&self, key: &QueryKey, err: CrmError) -> Result<Option<Value>, CrmError> {
        self.ctx.surface(&err).await;
        if err.is_terminal() || err.is_validation() {
            return Err(err);
        }
        tracing::warn!("read of {} failed ({}); serving cached data", key, err.error_code());
        Ok(self.ctx.cache.get_value(key).await)
    }

    /// Insert a row, seed its detail key and mark the table's lists stale
    pub async fn create(&self, row: Row) -> Result<T, CrmError> {
        if row.is_empty() {
            return Err(CrmError::validation("Cannot create an empty row"));
        }
        let inserted = match self.ctx.client.insert(T::TABLE, row).await {
            Ok(inserted) => inserted,
            Err(err) => {
                tracing::error!("insert into {} failed ({}): {}", T::TABLE, err.error_code(), err);
                self.ctx.surface(&err).await;
                return Err(err);
            }
        };

        let entity = T::from_row(inserted.clone())?;
        self.ctx
            .cache
            .set_query_data(Self::detail_key(entity.id()), Value::Object(inserted))
            .await;
        self.ctx.cache.invalidate(&Self::list_prefix()).await;
        tracing::info!("created {} {}", T::TABLE, entity.id());
        Ok(entity)
    }

    /// Optimistic update of one row
    pub async fn update(&self, id: &str, patch: Patch) -> Result<T, CrmError> {
        Self::require_id(id)?;
        let targets = [
            CacheTarget::Detail(Self::detail_key(id)),
            CacheTarget::ListPrefix(Self::list_prefix()),
        ];
        // Lists may gain or lose the row once filters re-run
        let row = self
            .ctx
            .reconciler()
            .update(T::TABLE, id, patch, &targets, &[Self::list_prefix()])
            .await?;
        T::from_row(row)
    }

    /// Optimistic delete; returns how many rows the store removed
    pub async fn bulk_delete(&self, ids: &[String]) -> Result<usize, CrmError> {
        if ids.is_empty() {
            return Err(CrmError::validation("No ids given for delete"));
        }
        for id in ids {
            Self::require_id(id)?;
        }

        let mut targets: Vec<CacheTarget> = ids.iter().map(|id| CacheTarget::Detail(Self::detail_key(id))).collect();
        targets.push(CacheTarget::ListPrefix(Self::list_prefix()));

        let deleted = self
            .ctx
            .reconciler()
            .remove(T::TABLE, ids, &targets, &[Self::list_prefix()])
            .await?;
        for id in ids {
            self.ctx.cache.remove(&Self::detail_key(id)).await;
        }
        tracing::info!("deleted {} of {} requested {} rows", deleted.len(), ids.len(), T::TABLE);
        Ok(deleted.len())
    }

    /// Mark everything cached for this table stale
    pub async fn invalidate(&self) -> usize {
        self.ctx.cache.invalidate(&Self::table_key()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::Customer;
    use crate::notify::NoticeLog;
    use crate::remote::{MemoryStore, RemoteOp};
    use serde_json::json;
    use std::sync::Arc;

    async fn hooks() -> (EntityHooks<Customer>, MemoryStore, Arc<NoticeLog>) {
        let store = MemoryStore::new();
        store
            .seed("customers", vec![
                json!({ "id": "C1", "full_name": "Noa Levi", "plan_type": "online" }),
                json!({ "id": "C2", "full_name": "Avi Mor", "plan_type": "studio" }),
            ])
            .await
            .unwrap();
        let mut config = AppConfig::development();
        config.cache.stale_time_secs = 300;
        let notices = Arc::new(NoticeLog::new());
        let ctx = HookContext::new(config, Arc::new(store.clone()), notices.clone());
        (EntityHooks::new(ctx), store, notices)
    }

    #[tokio::test]
    async fn fresh_reads_are_served_from_cache() {
        let (hooks, store, _) = hooks().await;
        assert_eq!(hooks.fetch_one("C1").await.unwrap().unwrap().full_name.as_deref(), Some("Noa Levi"));
        hooks.fetch_one("C1").await.unwrap();
        assert_eq!(store.calls(RemoteOp::Select).await, 1);

        assert!(hooks.fetch_one("missing").await.unwrap().is_none());
        assert!(hooks.fetch_one("").await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn failed_list_read_serves_cached_rows_and_notifies() {
        let (hooks, store, notices) = hooks().await;
        let all = FilterData::default();
        assert_eq!(hooks.fetch_list(all.clone()).await.unwrap().len(), 2);

        hooks.invalidate().await;
        store.fail_next(RemoteOp::Select, CrmError::network("offline")).await;
        assert_eq!(hooks.fetch_list(all).await.unwrap().len(), 2);
        assert_eq!(notices.errors().len(), 1);

        store.fail_next(RemoteOp::Select, CrmError::network("offline")).await;
        assert!(hooks.fetch_by("plan_type", "nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_auth_failure_is_returned() {
        let (hooks, store, _) = hooks().await;
        store.fail_next(RemoteOp::Select, CrmError::auth("PGRST301", "JWT expired")).await;
        assert!(hooks.fetch_list(FilterData::default()).await.unwrap_err().is_terminal());
    }

    #[tokio::test]
    async fn create_seeds_detail_and_marks_lists_stale() {
        let (hooks, store, _) = hooks().await;
        let list_key = EntityHooks::<Customer>::list_key(&FilterData::default());
        hooks.fetch_list(FilterData::default()).await.unwrap();

        let created = hooks.create(crate::remote::into_row(json!({ "full_name": "Dana" })).unwrap()).await.unwrap();
        assert!(hooks.context().cache.is_stale(&list_key).await);
        assert_eq!(hooks.fetch_one(created.id()).await.unwrap().unwrap().full_name.as_deref(), Some("Dana"));
        assert_eq!(store.calls(RemoteOp::Select).await, 1);
    }

    #[tokio::test]
    async fn bulk_delete_drops_rows_from_cached_lists() {
        let (hooks, store, _) = hooks().await;
        let data = FilterData::default();
        hooks.fetch_list(data.clone()).await.unwrap();

        assert_eq!(hooks.bulk_delete(&["C1".to_string()]).await.unwrap(), 1);
        let cached = hooks.context().cache.get_value(&EntityHooks::<Customer>::list_key(&data)).await.unwrap();
        assert_eq!(cached, json!([{ "id": "C2", "full_name": "Avi Mor", "plan_type": "studio" }]));
        assert_eq!(store.rows("customers").await.len(), 1);
        assert!(hooks.bulk_delete(&[]).await.unwrap_err().is_validation());
    }
}
