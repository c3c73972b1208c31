use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub lead_id: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Meeting {
    /// Whether the meeting overlaps `[from, to)`; open-ended meetings count as instants
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        let end = self.end_time.unwrap_or(self.start_time);
        self.start_time < to && end >= from
    }
}

impl Entity for Meeting {
    const TABLE: &'static str = "meetings";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn overlap_window() {
        let at = |h| Utc.with_ymd_and_hms(2024, 3, 4, h, 0, 0).unwrap();
        let meeting = Meeting {
            id: "M1".into(),
            title: None,
            customer_id: None,
            lead_id: None,
            start_time: at(9),
            end_time: Some(at(10)),
            location: None,
            notes: None,
            status: None,
            created_at: None,
            updated_at: None,
        };
        assert!(meeting.overlaps(at(8), at(10)));
        assert!(!meeting.overlaps(at(11), at(12)));
        assert!(!meeting.overlaps(at(7), at(9)));
    }
}
