use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CrmError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableColumns {
    pub hidden: BTreeSet<String>,
    /// Preferred order; columns not listed keep their default position after these
    pub order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnAction {
    Toggle { table: String, column: String },
    SetHidden { table: String, column: String, hidden: bool },
    Reorder { table: String, order: Vec<String> },
    Reset { table: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnVisibilitySlice {
    pub tables: BTreeMap<String, TableColumns>,
}

impl ColumnVisibilitySlice {
    pub fn reduce(&mut self, action: ColumnAction) -> Result<(), CrmError> {
        match action {
            ColumnAction::Toggle { table, column } => {
                let hidden = &mut self.tables.entry(table).or_default().hidden;
                if !hidden.remove(&column) {
                    hidden.insert(column);
                }
            }
            ColumnAction::SetHidden { table, column, hidden } => {
                let state = self.tables.entry(table).or_default();
                if hidden {
                    state.hidden.insert(column);
                } else {
                    state.hidden.remove(&column);
                }
            }
            ColumnAction::Reorder { table, order } => {
                let unique: BTreeSet<&String> = order.iter().collect();
                if unique.len() != order.len() {
                    return Err(CrmError::field_validation("order", "contains duplicate columns"));
                }
                self.tables.entry(table).or_default().order = order;
            }
            ColumnAction::Reset { table } => {
                self.tables.remove(&table);
            }
        }
        Ok(())
    }

    /// Columns to render for `table`, given its default column list
    pub fn visible_columns(&self, table: &str, defaults: &[&str]) -> Vec<String> {
        let Some(state) = self.tables.get(table) else {
            return defaults.iter().map(|c| c.to_string()).collect();
        };
        let ordered = state
            .order
            .iter()
            .filter(|c| defaults.contains(&c.as_str()))
            .cloned()
            .chain(defaults.iter().map(|c| c.to_string()).filter(|c| !state.order.contains(c)));
        ordered.filter(|c| !state.hidden.contains(c)).collect()
    }
}
