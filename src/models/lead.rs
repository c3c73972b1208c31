use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;

/// Workflow labels as stored in `leads.status`
pub struct LeadStatus;

impl LeadStatus {
    pub const NEW: &'static str = "חדש";
    pub const IN_PROGRESS: &'static str = "בטיפול";
    pub const MEETING_SET: &'static str = "נקבעה פגישה";
    pub const CONVERTED: &'static str = "הפך ללקוח";
    pub const NOT_RELEVANT: &'static str = "לא רלוונטי";

    pub const ALL: [&'static str; 5] = [
        Self::NEW,
        Self::IN_PROGRESS,
        Self::MEETING_SET,
        Self::CONVERTED,
        Self::NOT_RELEVANT,
    ];

    pub fn is_known(status: &str) -> bool {
        Self::ALL.contains(&status)
    }
}

fn default_status() -> String {
    LeadStatus::NEW.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Lead {
    const TABLE: &'static str = "leads";

    fn id(&self) -> &str {
        &self.id
    }
}
