use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;

/// In-app notification row (not to be confused with toasts in `notify`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entity for Notification {
    const TABLE: &'static str = "notifications";

    fn id(&self) -> &str {
        &self.id
    }
}
