use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CrmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Trainer,
    Customer,
}

impl UserRole {
    pub fn can_impersonate(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Trainer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Impersonation {
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImpersonationAction {
    Start {
        actor: UserRole,
        customer_id: String,
        customer_name: Option<String>,
        at: DateTime<Utc>,
    },
    Stop,
}

/// Staff viewing the customer portal as a given customer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpersonationSlice {
    pub active: Option<Impersonation>,
}

impl ImpersonationSlice {
    pub fn reduce(&mut self, action: ImpersonationAction) -> Result<(), CrmError> {
        match action {
            ImpersonationAction::Start { actor, customer_id, customer_name, at } => {
                if !actor.can_impersonate() {
                    return Err(CrmError::field_validation("actor", "only staff can view as a customer"));
                }
                if customer_id.trim().is_empty() {
                    return Err(CrmError::field_validation("customer_id", "is required"));
                }
                self.active = Some(Impersonation { customer_id, customer_name, started_at: at });
            }
            ImpersonationAction::Stop => self.active = None,
        }
        Ok(())
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.active.as_ref().map(|i| i.customer_id.as_str())
    }
}
