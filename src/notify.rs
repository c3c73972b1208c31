use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CrmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-visible notification (toast)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            code: None,
            created_at: Utc::now(),
        }
    }

    pub fn from_error(err: &CrmError) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: err.title().to_string(),
            message: err.to_string(),
            code: Some(err.error_code().to_string()),
            created_at: Utc::now(),
        }
    }
}

/// Sink for notifications surfaced by data hooks
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    fn notify_error(&self, err: &CrmError) {
        self.notify(Notice::from_error(err));
    }
}

/// Keeps every notice in memory; what a view layer drains to render toasts
#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic elsewhere must not cost us notices already collected
    fn lock(&self) -> MutexGuard<'_, Vec<Notice>> {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.lock().clone()
    }

    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.lock())
    }

    pub fn errors(&self) -> Vec<Notice> {
        self.notices().into_iter().filter(|n| n.level == NoticeLevel::Error).collect()
    }
}

impl Notifier for NoticeLog {
    fn notify(&self, notice: Notice) {
        self.lock().push(notice);
    }
}

/// Writes notices to the log; used by the command-line front end
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::error!("{}: {}", notice.title, notice.message),
            NoticeLevel::Warning => tracing::warn!("{}: {}", notice.title, notice.message),
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!("{}: {}", notice.title, notice.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_collects_and_drains() {
        let log = NoticeLog::new();
        log.notify(Notice::new(NoticeLevel::Success, "Saved", "Lead updated"));
        log.notify_error(&CrmError::network("connection reset"));

        assert_eq!(log.errors().len(), 1);
        assert_eq!(log.errors()[0].code.as_deref(), Some("NETWORK_ERROR"));
        assert_eq!(log.drain().len(), 2);
        assert!(log.notices().is_empty());
    }

    #[test]
    fn poisoned_log_still_records() {
        let log = std::sync::Arc::new(NoticeLog::new());
        let poisoner = log.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.notices.lock().unwrap();
            panic!("renderer crashed");
        })
        .join();
        assert!(log.notices.is_poisoned());

        log.notify_error(&CrmError::remote("23505", "duplicate key"));
        assert_eq!(log.errors()[0].code.as_deref(), Some("23505"));
    }
}
