use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::CrmError;
use crate::filter::FilterData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Filter selections for one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableFilter {
    /// Field -> accepted values
    pub selections: BTreeMap<String, Vec<String>>,
    pub search: Option<String>,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterAction {
    SetSelection { table: String, field: String, values: Vec<String> },
    ToggleValue { table: String, field: String, value: String },
    SetSearch { table: String, search: String },
    SetDateRange { table: String, range: Option<DateRange> },
    ClearTable { table: String },
    ClearAll,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSlice {
    pub tables: BTreeMap<String, TableFilter>,
}

impl FilterSlice {
    pub fn table(&self, table: &str) -> Option<&TableFilter> {
        self.tables.get(table)
    }

    pub fn reduce(&mut self, action: FilterAction) -> Result<(), CrmError> {
        match action {
            FilterAction::SetSelection { table, field, values } => {
                let selections = &mut self.tables.entry(table).or_default().selections;
                if values.is_empty() {
                    selections.remove(&field);
                } else {
                    selections.insert(field, values);
                }
            }
            FilterAction::ToggleValue { table, field, value } => {
                let selections = &mut self.tables.entry(table).or_default().selections;
                let values = selections.entry(field.clone()).or_default();
                match values.iter().position(|v| *v == value) {
                    Some(index) => {
                        values.remove(index);
                    }
                    None => values.push(value),
                }
                if values.is_empty() {
                    selections.remove(&field);
                }
            }
            FilterAction::SetSearch { table, search } => {
                let search = search.trim().to_string();
                self.tables.entry(table).or_default().search = (!search.is_empty()).then_some(search);
            }
            FilterAction::SetDateRange { table, range } => {
                if let Some(range) = range {
                    if range.to < range.from {
                        return Err(CrmError::field_validation("date_range", "end is before start"));
                    }
                }
                self.tables.entry(table).or_default().date_range = range;
            }
            FilterAction::ClearTable { table } => {
                self.tables.remove(&table);
            }
            FilterAction::ClearAll => self.tables.clear(),
        }
        Ok(())
    }

    /// Query for `table` built from its selections. Search matches any of
    /// `search_columns`; the date range applies to `date_column`.
    pub fn to_filter_data(&self, table: &str, search_columns: &[&str], date_column: Option<&str>) -> FilterData {
        let Some(state) = self.tables.get(table) else {
            return FilterData::default();
        };

        let mut clause = Map::new();
        for (field, values) in &state.selections {
            clause.insert(field.clone(), json!({ "$in": values }));
        }
        if let (Some(range), Some(column)) = (state.date_range, date_column) {
            clause.insert(
                column.to_string(),
                json!({ "$between": [range.from.to_string(), format!("{}T23:59:59Z", range.to)] }),
            );
        }
        if let Some(search) = &state.search {
            if !search_columns.is_empty() {
                let pattern = format!("%{}%", search);
                let any: Vec<Value> = search_columns
                    .iter()
                    .map(|column| {
                        let mut condition = Map::new();
                        condition.insert(column.to_string(), json!({ "$ilike": pattern }));
                        Value::Object(condition)
                    })
                    .collect();
                clause.insert("$or".to_string(), Value::Array(any));
            }
        }

        FilterData {
            where_clause: (!clause.is_empty()).then_some(Value::Object(clause)),
            ..Default::default()
        }
    }
}
