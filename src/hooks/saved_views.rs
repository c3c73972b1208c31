use serde_json::{json, Value};

use super::context::HookContext;
use super::entity::EntityHooks;
use crate::error::CrmError;
use crate::filter::{Filter, FilterData};
use crate::models::SavedView;
use crate::mutation::Patch;
use crate::remote::into_row;

#[derive(Clone)]
pub struct SavedViewHooks {
    pub entity: EntityHooks<SavedView>,
}

impl SavedViewHooks {
    pub fn new(ctx: HookContext) -> Self {
        Self { entity: EntityHooks::new(ctx) }
    }

    /// Views for one table, by name
    pub async fn views_for(&self, resource: &str) -> Result<Vec<SavedView>, CrmError> {
        let mut data = FilterData::where_eq("resource", resource);
        data.order = Some(json!("name asc"));
        self.entity.fetch_list(data).await
    }

    /// Create the view, or overwrite the one with the same name on `resource`
    pub async fn save_view(
        &self,
        resource: &str,
        name: &str,
        filter: FilterData,
        columns: Vec<String>,
    ) -> Result<SavedView, CrmError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CrmError::field_validation("name", "is required"));
        }
        // Reject filters the table could never run
        Filter::from_data(resource, filter.clone())?;

        let filter_value = serde_json::to_value(&filter)?;
        let existing = self.views_for(resource).await?.into_iter().find(|view| view.name == name);
        match existing {
            Some(view) => {
                let patch = Patch::from_value(json!({ "filter": filter_value, "columns": columns }))?;
                self.entity.update(&view.id, patch).await
            }
            None => {
                let row = into_row(json!({
                    "resource": resource,
                    "name": name,
                    "filter": filter_value,
                    "columns": columns,
                    "is_default": false,
                    "user_id": self.current_user().await,
                }))?;
                self.entity.create(row).await
            }
        }
    }

    pub async fn delete_view(&self, id: &str) -> Result<(), CrmError> {
        self.entity.bulk_delete(&[id.to_string()]).await?;
        Ok(())
    }

    async fn current_user(&self) -> Value {
        match &self.entity.context().sessions {
            Some(sessions) => sessions.current().await.map(|s| Value::String(s.user_id)).unwrap_or(Value::Null),
            None => Value::Null,
        }
    }
}
