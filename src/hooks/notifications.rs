use serde_json::json;

use super::context::HookContext;
use super::entity::EntityHooks;
use crate::error::CrmError;
use crate::filter::FilterData;
use crate::models::Notification;
use crate::mutation::Patch;

#[derive(Clone)]
pub struct NotificationHooks {
    pub entity: EntityHooks<Notification>,
}

impl NotificationHooks {
    pub fn new(ctx: HookContext) -> Self {
        Self { entity: EntityHooks::new(ctx) }
    }

    fn unread_filter(user_id: &str) -> FilterData {
        FilterData {
            where_clause: Some(json!({ "user_id": user_id, "is_read": false })),
            order: Some(json!("created_at desc")),
            ..Default::default()
        }
    }

    pub async fn unread(&self, user_id: &str) -> Result<Vec<Notification>, CrmError> {
        self.entity.fetch_list(Self::unread_filter(user_id)).await
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<usize, CrmError> {
        Ok(self.unread(user_id).await?.len())
    }

    pub async fn mark_read(&self, id: &str) -> Result<Notification, CrmError> {
        self.entity.update(id, Patch::set("is_read", true)?).await
    }

    /// Mark every unread notification of the user; returns how many changed
    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize, CrmError> {
        let unread = self.unread(user_id).await?;
        for notification in &unread {
            self.mark_read(&notification.id).await?;
        }
        Ok(unread.len())
    }
}
