use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;
use crate::filter::FilterData;

/// A named table configuration: filter plus visible columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedView {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Table the view applies to, e.g. `leads`
    pub resource: String,
    pub name: String,
    #[serde(default)]
    pub filter: FilterData,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for SavedView {
    const TABLE: &'static str = "saved_views";

    fn id(&self) -> &str {
        &self.id
    }
}
