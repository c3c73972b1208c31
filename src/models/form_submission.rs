use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::lead::LeadStatus;
use crate::error::CrmError;
use crate::remote::{into_row, Row};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlParameter {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Form-submission payload accepted by the lead-intake webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub form_id: String,
    pub submission_id: String,
    pub submission_time: DateTime<Utc>,
    #[serde(default)]
    pub url_parameters: Vec<UrlParameter>,
    #[serde(default)]
    pub questions: Vec<Value>,
}

impl FormSubmission {
    pub fn from_json(body: &str) -> Result<Self, CrmError> {
        let submission: Self = serde_json::from_str(body)?;
        submission.validate()?;
        Ok(submission)
    }

    pub fn validate(&self) -> Result<(), CrmError> {
        if self.form_id.trim().is_empty() {
            return Err(CrmError::field_validation("formId", "is required"));
        }
        if self.submission_id.trim().is_empty() {
            return Err(CrmError::field_validation("submissionId", "is required"));
        }
        if let Some(param) = self.url_parameters.iter().find(|p| p.name.trim().is_empty()) {
            return Err(CrmError::field_validation(
                "urlParameters",
                format!("parameter with value '{}' has no name", param.value),
            ));
        }
        Ok(())
    }

    /// First non-empty value of a URL parameter, matched case-insensitively
    pub fn param(&self, name: &str) -> Option<&str> {
        self.url_parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name) && !p.value.trim().is_empty())
            .map(|p| p.value.as_str())
    }

    /// Row for the `leads` table built from the submission's parameters
    pub fn to_lead_row(&self) -> Result<Row, CrmError> {
        let source = self.param("utm_source").unwrap_or(self.form_id.as_str());
        into_row(json!({
            "full_name": self.param("name").or_else(|| self.param("full_name")),
            "phone": self.param("phone"),
            "email": self.param("email"),
            "status": LeadStatus::NEW,
            "source": source,
            "notes": format!("submission {}", self.submission_id),
        }))
    }
}
