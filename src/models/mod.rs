//! Typed rows for each table the client reads and writes. Rows from the
//! store are parsed into these before hooks hand them out.

pub mod customer;
pub mod form_submission;
pub mod lead;
pub mod meeting;
pub mod notification;
pub mod plan;
pub mod saved_view;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CrmError;
use crate::remote::{into_row, Row};

pub use customer::Customer;
pub use form_submission::{FormSubmission, UrlParameter};
pub use lead::{Lead, LeadStatus};
pub use meeting::Meeting;
pub use notification::Notification;
pub use plan::{NutritionPlan, SupplementPlan, WorkoutPlan};
pub use saved_view::SavedView;

/// A row type stored in one table
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> &str;

    fn from_row(row: Row) -> Result<Self, CrmError> {
        serde_json::from_value(Value::Object(row))
            .map_err(|e| CrmError::Decode(format!("{} row: {}", Self::TABLE, e)))
    }

    fn to_row(&self) -> Result<Row, CrmError> {
        into_row(serde_json::to_value(self)?)
    }
}

/// Parse a cached or fetched JSON value (object or array) into entities
pub fn parse_rows<T: Entity>(value: Value) -> Result<Vec<T>, CrmError> {
    match value {
        Value::Array(items) => items.into_iter().map(|item| T::from_row(into_row(item)?)).collect(),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![T::from_row(into_row(other)?)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_rows_accepts_lists_and_single_rows() {
        let leads: Vec<Lead> = parse_rows(json!([{ "id": "L1", "status": "חדש" }, { "id": "L2" }])).unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[1].status, LeadStatus::NEW);

        let one: Vec<Customer> = parse_rows(json!({ "id": "C1", "full_name": "Noa Levi" })).unwrap();
        assert_eq!(one[0].id(), "C1");
        assert!(parse_rows::<Customer>(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn malformed_row_is_a_decode_error() {
        let err = parse_rows::<Meeting>(json!([{ "id": 7 }])).unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
        assert!(err.to_string().contains("meetings"));
    }
}
