use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CrmError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidebarAction {
    Toggle,
    SetOpen { open: bool },
    ToggleSection { section: String },
    Pin { section: String },
    Unpin { section: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidebarSlice {
    pub open: bool,
    pub collapsed_sections: BTreeSet<String>,
    /// Pinned sections in display order
    pub pinned: Vec<String>,
}

impl Default for SidebarSlice {
    fn default() -> Self {
        Self { open: true, collapsed_sections: BTreeSet::new(), pinned: Vec::new() }
    }
}

impl SidebarSlice {
    pub fn reduce(&mut self, action: SidebarAction) -> Result<(), CrmError> {
        match action {
            SidebarAction::Toggle => self.open = !self.open,
            SidebarAction::SetOpen { open } => self.open = open,
            SidebarAction::ToggleSection { section } => {
                if !self.collapsed_sections.remove(&section) {
                    self.collapsed_sections.insert(section);
                }
            }
            SidebarAction::Pin { section } => {
                if section.trim().is_empty() {
                    return Err(CrmError::field_validation("section", "is required"));
                }
                if !self.pinned.contains(&section) {
                    self.pinned.push(section);
                }
            }
            SidebarAction::Unpin { section } => self.pinned.retain(|s| *s != section),
        }
        Ok(())
    }

    pub fn is_collapsed(&self, section: &str) -> bool {
        self.collapsed_sections.contains(section)
    }
}
