use serde_json::json;

use super::context::HookContext;
use super::entity::EntityHooks;
use crate::error::CrmError;
use crate::filter::FilterData;
use crate::models::{FormSubmission, Lead, LeadStatus};
use crate::mutation::Patch;

#[derive(Clone)]
pub struct LeadHooks {
    pub entity: EntityHooks<Lead>,
}

impl LeadHooks {
    pub fn new(ctx: HookContext) -> Self {
        Self { entity: EntityHooks::new(ctx) }
    }

    /// Move a lead along the workflow. Unknown labels are allowed but logged.
    pub async fn update_status(&self, id: &str, status: &str) -> Result<Lead, CrmError> {
        let status = status.trim();
        if status.is_empty() {
            return Err(CrmError::field_validation("status", "is required"));
        }
        if !LeadStatus::is_known(status) {
            tracing::warn!("lead {} moved to unrecognised status '{}'", id, status);
        }
        self.entity.update(id, Patch::set("status", status)?).await
    }

    /// Newest first
    pub async fn by_status(&self, status: &str) -> Result<Vec<Lead>, CrmError> {
        let mut data = FilterData::where_eq("status", status);
        data.order = Some(json!("created_at desc"));
        self.entity.fetch_list(data).await
    }

    /// Create a lead from a webhook form submission
    pub async fn ingest(&self, submission: &FormSubmission) -> Result<Lead, CrmError> {
        submission.validate()?;
        self.entity.create(submission.to_lead_row()?).await
    }
}
