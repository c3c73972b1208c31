use std::sync::Arc;

use serde_json::Value;

use crate::cache::{QueryKey, Speculation};
use crate::error::CrmError;
use crate::remote::{row_id, Row};

/// Field updates for one row. Never empty and never touches `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch(Row);

impl Patch {
    pub fn new(fields: Row) -> Result<Self, CrmError> {
        if fields.is_empty() {
            return Err(CrmError::validation("Update payload has no changed fields"));
        }
        if fields.contains_key("id") {
            return Err(CrmError::field_validation("id", "cannot be changed by an update"));
        }
        Ok(Self(fields))
    }

    pub fn from_value(value: Value) -> Result<Self, CrmError> {
        match value {
            Value::Object(fields) => Self::new(fields),
            _ => Err(CrmError::validation("Update payload must be an object")),
        }
    }

    /// Single-field patch
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Result<Self, CrmError> {
        let mut fields = Row::new();
        fields.insert(field.into(), value.into());
        Self::new(fields)
    }

    pub fn fields(&self) -> &Row {
        &self.0
    }

    pub fn into_row(self) -> Row {
        self.0
    }

    /// Merge into an object value; anything else passes through unchanged
    pub fn apply_to(&self, value: &Value) -> Value {
        match value {
            Value::Object(row) => {
                let mut next = row.clone();
                for (field, new_value) in &self.0 {
                    next.insert(field.clone(), new_value.clone());
                }
                Value::Object(next)
            }
            other => other.clone(),
        }
    }
}

/// Which cached views a mutation speculatively rewrites
#[derive(Debug, Clone, PartialEq)]
pub enum CacheTarget {
    /// A key whose value is the entity itself
    Detail(QueryKey),
    /// Every cached list under the prefix; only elements with a matching id change
    ListPrefix(QueryKey),
}

impl CacheTarget {
    pub fn key(&self) -> &QueryKey {
        match self {
            CacheTarget::Detail(key) | CacheTarget::ListPrefix(key) => key,
        }
    }
}

/// What a transaction does to the rows it targets
#[derive(Debug, Clone, PartialEq)]
pub enum MutationIntent {
    Update { id: String, patch: Patch },
    Remove { ids: Vec<String> },
}

impl MutationIntent {
    pub fn ids(&self) -> Vec<String> {
        match self {
            MutationIntent::Update { id, .. } => vec![id.clone()],
            MutationIntent::Remove { ids } => ids.clone(),
        }
    }

    /// The optimistic rewrite for a detail or list value
    pub(crate) fn speculation(&self, list: bool) -> Speculation {
        match self.clone() {
            MutationIntent::Update { id, patch } if list => {
                Arc::new(move |value: &Value| map_matching(value, &[id.clone()], |row| patch.apply_to(row)))
            }
            MutationIntent::Update { patch, .. } => Arc::new(move |value: &Value| patch.apply_to(value)),
            MutationIntent::Remove { ids } if list => Arc::new(move |value: &Value| drop_matching(value, &ids)),
            MutationIntent::Remove { .. } => Arc::new(|_: &Value| Value::Null),
        }
    }

    /// The server-confirmed rewrite; `server_rows` are what the store returned
    pub(crate) fn confirmation(&self, list: bool, server_rows: &[Row]) -> Speculation {
        match self {
            MutationIntent::Update { id, .. } => {
                let server = server_rows
                    .iter()
                    .find(|row| row_id(row).as_deref() == Some(id.as_str()))
                    .or_else(|| server_rows.first())
                    .cloned()
                    .map(Value::Object);
                match server {
                    Some(server) if list => {
                        let id = id.clone();
                        Arc::new(move |value: &Value| map_matching(value, &[id.clone()], |_| server.clone()))
                    }
                    Some(server) => Arc::new(move |_: &Value| server.clone()),
                    // Nothing came back; keep the speculative form
                    None => self.speculation(list),
                }
            }
            MutationIntent::Remove { .. } => self.speculation(list),
        }
    }

    /// Whether a cached value holds any row this intent targets
    pub(crate) fn touches(&self, value: &Value, list: bool) -> bool {
        let ids = self.ids();
        if list {
            value.as_array().map_or(false, |items| items.iter().any(|item| matches_any(item, &ids)))
        } else {
            value.is_object() && (value.get("id").is_none() || matches_any(value, &ids))
        }
    }
}

fn matches_any(value: &Value, ids: &[String]) -> bool {
    value.as_object().and_then(row_id).map_or(false, |id| ids.contains(&id))
}

fn map_matching(value: &Value, ids: &[String], rewrite: impl Fn(&Value) -> Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| if matches_any(item, ids) { rewrite(item) } else { item.clone() })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn drop_matching(value: &Value, ids: &[String]) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().filter(|item| !matches_any(item, ids)).cloned().collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::into_row;
    use serde_json::json;

    #[test]
    fn empty_patch_and_id_patch_are_rejected() {
        assert!(Patch::new(Row::new()).unwrap_err().is_validation());
        assert!(Patch::from_value(json!({ "id": "L2" })).unwrap_err().is_validation());
        assert!(Patch::from_value(json!("status")).is_err());
        assert_eq!(Patch::set("status", "בטיפול").unwrap().fields().len(), 1);
    }

    #[test]
    fn list_speculation_only_touches_matching_rows() {
        let intent = MutationIntent::Update { id: "L1".into(), patch: Patch::set("status", "בטיפול").unwrap() };
        let list = json!([{ "id": "L1", "status": "חדש" }, { "id": "L2", "status": "חדש" }]);

        assert!(intent.touches(&list, true));
        assert!(!intent.touches(&json!([{ "id": "L3" }]), true));
        let next = (intent.speculation(true))(&list);
        assert_eq!(next, json!([{ "id": "L1", "status": "בטיפול" }, { "id": "L2", "status": "חדש" }]));
    }

    #[test]
    fn confirmation_uses_server_row() {
        let intent = MutationIntent::Update { id: "L1".into(), patch: Patch::set("status", "בטיפול").unwrap() };
        let server = into_row(json!({ "id": "L1", "status": "בטיפול", "updated_at": "2024-01-01T00:00:00Z" })).unwrap();
        let confirmed = (intent.confirmation(false, &[server.clone()]))(&json!({ "id": "L1", "status": "חדש" }));
        assert_eq!(confirmed, Value::Object(server));
    }

    #[test]
    fn removal_drops_list_rows_and_blanks_details() {
        let intent = MutationIntent::Remove { ids: vec!["C1".into()] };
        let list = json!([{ "id": "C1" }, { "id": "C2" }]);
        assert_eq!((intent.speculation(true))(&list), json!([{ "id": "C2" }]));
        assert_eq!((intent.speculation(false))(&json!({ "id": "C1" })), Value::Null);
        assert!(!intent.touches(&json!({ "id": "C9" }), false));
    }
}
