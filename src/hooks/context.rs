use std::sync::Arc;

use crate::auth::SessionStore;
use crate::cache::QueryCache;
use crate::config::AppConfig;
use crate::error::CrmError;
use crate::mutation::Reconciler;
use crate::notify::Notifier;
use crate::remote::RemoteDataClient;

/// Everything a data hook needs, passed in explicitly.
/// Clones share the same cache, client and session.
#[derive(Clone)]
pub struct HookContext {
    pub client: Arc<dyn RemoteDataClient>,
    pub cache: QueryCache,
    pub notifier: Arc<dyn Notifier>,
    pub sessions: Option<SessionStore>,
    pub config: Arc<AppConfig>,
}

impl HookContext {
    /// Fresh context with its own cache sized from `config`
    pub fn new(config: AppConfig, client: Arc<dyn RemoteDataClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            cache: QueryCache::new(&config.cache),
            client,
            notifier,
            sessions: None,
            config: Arc::new(config),
        }
    }

    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn reconciler(&self) -> Reconciler {
        let reconciler = Reconciler::new(self.client.clone(), self.cache.clone(), self.notifier.clone());
        match &self.sessions {
            Some(sessions) => reconciler.with_sessions(sessions.clone()),
            None => reconciler,
        }
    }

    /// Report a failed call to the user; auth failures also end the session
    pub async fn surface(&self, err: &CrmError) {
        if err.is_terminal() {
            if let Some(sessions) = &self.sessions {
                sessions.invalidate().await;
            }
        }
        self.notifier.notify_error(err);
    }
}
