//! Remote Data Client boundary: authenticated select/insert/update/delete
//! against the hosted relational store.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CrmError;
use crate::filter::Filter;

pub use memory::{Gate, MemoryStore};
pub use rest::RestClient;

/// A row as the store returns it
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteOp {
    Select,
    Insert,
    Update,
    Delete,
}

/// Request/response client for the store. Every call either returns rows or
/// a structured error with a machine-readable code.
#[async_trait]
pub trait RemoteDataClient: Send + Sync {
    /// Rows of `filter.table_name()` matching the filter, ordered and ranged
    async fn select(&self, filter: &Filter) -> Result<Vec<Row>, CrmError>;

    /// Insert one row; the returned row carries server-filled fields
    async fn insert(&self, table: &str, row: Row) -> Result<Row, CrmError>;

    /// Patch one row by id; `NotFound` when no row matched
    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row, CrmError>;

    /// Delete rows by id and return what was deleted
    async fn delete(&self, table: &str, ids: &[String]) -> Result<Vec<Row>, CrmError>;
}

/// Pull the `id` of a row as a string, whatever its JSON type
pub fn row_id(row: &Row) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Convert a JSON value that must be an object into a row
pub fn into_row(value: Value) -> Result<Row, CrmError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CrmError::Decode(format!("expected a row object, got {}", other))),
    }
}
