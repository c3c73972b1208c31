//! UI state slices: pure reducers with no I/O. The whole tree serializes to
//! JSON so a front end can persist preferences between runs.

pub mod calendar;
pub mod columns;
pub mod filters;
pub mod impersonation;
pub mod sidebar;

use serde::{Deserialize, Serialize};

use crate::error::CrmError;

pub use calendar::{CalendarAction, CalendarSlice, CalendarView};
pub use columns::{ColumnAction, ColumnVisibilitySlice, TableColumns};
pub use filters::{DateRange, FilterAction, FilterSlice, TableFilter};
pub use impersonation::{Impersonation, ImpersonationAction, ImpersonationSlice, UserRole};
pub use sidebar::{SidebarAction, SidebarSlice};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "slice", content = "action", rename_all = "snake_case")]
pub enum UiAction {
    Filter(FilterAction),
    Sidebar(SidebarAction),
    Impersonation(ImpersonationAction),
    Calendar(CalendarAction),
    Columns(ColumnAction),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiState {
    pub filters: FilterSlice,
    pub sidebar: SidebarSlice,
    pub impersonation: ImpersonationSlice,
    pub calendar: CalendarSlice,
    pub columns: ColumnVisibilitySlice,
}

impl UiState {
    /// Route an action to its slice. A rejected action leaves state unchanged.
    pub fn dispatch(&mut self, action: UiAction) -> Result<(), CrmError> {
        let result = match action {
            UiAction::Filter(action) => self.filters.reduce(action),
            UiAction::Sidebar(action) => self.sidebar.reduce(action),
            UiAction::Impersonation(action) => self.impersonation.reduce(action),
            UiAction::Calendar(action) => self.calendar.reduce(action),
            UiAction::Columns(action) => self.columns.reduce(action),
        };
        if let Err(err) = &result {
            tracing::debug!("ui action rejected: {}", err);
        }
        result
    }

    pub fn to_json(&self) -> Result<String, CrmError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, CrmError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dispatch_routes_and_persists() {
        let mut state = UiState::default();
        state.dispatch(UiAction::Sidebar(SidebarAction::Toggle)).unwrap();
        state
            .dispatch(UiAction::Columns(ColumnAction::Toggle { table: "customers".into(), column: "phone".into() }))
            .unwrap();

        let restored = UiState::from_json(&state.to_json().unwrap()).unwrap();
        assert_eq!(restored, state);
        assert!(!restored.sidebar.open);
    }

    #[test]
    fn actions_decode_from_tagged_json() {
        let action: UiAction = serde_json::from_value(json!({
            "slice": "sidebar",
            "action": { "type": "pin", "section": "leads" }
        }))
        .unwrap();
        let mut state = UiState::default();
        state.dispatch(action).unwrap();
        assert_eq!(state.sidebar.pinned, vec!["leads"]);

        // Missing slices fall back to defaults
        let partial = UiState::from_json(r#"{ "sidebar": { "open": false } }"#).unwrap();
        assert!(partial.filters.tables.is_empty());
    }
}
