// Client-side error taxonomy
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Every failure a data hook, the cache or the remote client can report.
///
/// Validation errors never reach the network; auth errors end the current
/// session; not-found is only an error where the caller asked for a row by id.
#[derive(Debug, Clone, Error)]
pub enum CrmError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    #[error("{message}")]
    Remote { code: String, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Auth { code: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CrmError {
    pub fn validation(message: impl Into<String>) -> Self {
        CrmError::Validation { message: message.into(), field_errors: None }
    }

    pub fn field_validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), reason.into());
        CrmError::Validation {
            message: "Invalid field value".to_string(),
            field_errors: Some(field_errors),
        }
    }

    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        CrmError::Remote { code: code.into(), message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        CrmError::Network(message.into())
    }

    pub fn auth(code: impl Into<String>, message: impl Into<String>) -> Self {
        CrmError::Auth { code: code.into(), message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CrmError::NotFound(message.into())
    }

    /// Machine-readable code for client handling
    pub fn error_code(&self) -> &str {
        match self {
            CrmError::Validation { .. } => "VALIDATION_ERROR",
            CrmError::Remote { code, .. } => code,
            CrmError::Network(_) => "NETWORK_ERROR",
            CrmError::Auth { code, .. } => code,
            CrmError::NotFound(_) => "NOT_FOUND",
            CrmError::Decode(_) => "DECODE_ERROR",
            CrmError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Auth failures end the session; they are never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CrmError::Auth { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CrmError::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CrmError::NotFound(_))
    }

    /// Short title used for user-visible notifications
    pub fn title(&self) -> &'static str {
        match self {
            CrmError::Validation { .. } => "Invalid request",
            CrmError::Remote { .. } => "Save failed",
            CrmError::Network(_) => "Connection problem",
            CrmError::Auth { .. } => "Session ended",
            CrmError::NotFound(_) => "Not found",
            CrmError::Decode(_) => "Unexpected data",
            CrmError::Config(_) => "Configuration error",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CrmError::Validation { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => json!({
                "error": true,
                "message": self.to_string(),
                "code": self.error_code()
            }),
        }
    }
}

impl From<crate::filter::error::FilterError> for CrmError {
    fn from(err: crate::filter::error::FilterError) -> Self {
        CrmError::validation(err.to_string())
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(err: serde_json::Error) -> Self {
        CrmError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for CrmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return CrmError::Decode(err.to_string());
        }
        if err.is_timeout() {
            return CrmError::network(format!("request timed out: {}", err));
        }
        CrmError::network(err.to_string())
    }
}

impl From<url::ParseError> for CrmError {
    fn from(err: url::ParseError) -> Self {
        CrmError::Config(format!("invalid URL: {}", err))
    }
}
