use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

use super::context::HookContext;
use super::entity::EntityHooks;
use crate::error::CrmError;
use crate::filter::FilterData;
use crate::models::Meeting;

#[derive(Clone)]
pub struct MeetingHooks {
    pub entity: EntityHooks<Meeting>,
}

impl MeetingHooks {
    pub fn new(ctx: HookContext) -> Self {
        Self { entity: EntityHooks::new(ctx) }
    }

    /// Meetings starting in `[from, to)`, earliest first
    pub async fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Meeting>, CrmError> {
        if to <= from {
            return Err(CrmError::validation("Range end must be after its start"));
        }
        let stamp = |at: DateTime<Utc>| at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let data = FilterData {
            where_clause: Some(json!({
                "start_time": { "$gte": stamp(from), "$lt": stamp(to) }
            })),
            order: Some(json!("start_time asc")),
            ..Default::default()
        };
        self.entity.fetch_list(data).await
    }

    pub async fn for_customer(&self, customer_id: &str) -> Result<Vec<Meeting>, CrmError> {
        let data = FilterData {
            where_clause: Some(json!({ "customer_id": customer_id })),
            order: Some(json!("start_time desc")),
            ..Default::default()
        };
        self.entity.fetch_list(data).await
    }
}
