use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::error::CrmError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub refresh: RefreshConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project URL of the hosted store, without the `/rest/v1` suffix
    pub base_url: String,
    /// Public (anon) API key sent as the `apikey` header
    pub api_key: String,
    pub request_timeout_secs: u64,
    pub max_page_size: Option<u32>,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Age after which a cached entry counts as stale even if never invalidated
    pub stale_time_secs: u64,
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Sessions expiring within this window are treated as already expired
    pub expiry_skew_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub polling_enabled: bool,
    pub poll_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    /// Load from `CRM_CONFIG` (YAML) when set, otherwise from the environment.
    /// Env overrides always win over the file.
    pub fn load() -> Result<Self, CrmError> {
        match env::var("CRM_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Ok(Self::from_yaml_file(path)?.with_env_overrides()),
            _ => Ok(Self::from_env()),
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CrmError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CrmError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, CrmError> {
        serde_yaml::from_str(content).map_err(|e| CrmError::Config(format!("invalid config file: {}", e)))
    }

    fn with_env_overrides(mut self) -> Self {
        // Remote overrides
        if let Ok(v) = env::var("CRM_REMOTE_URL") {
            self.remote.base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("CRM_REMOTE_API_KEY") {
            self.remote.api_key = v;
        }
        if let Ok(v) = env::var("CRM_REMOTE_TIMEOUT_SECS") {
            self.remote.request_timeout_secs = v.parse().unwrap_or(self.remote.request_timeout_secs);
        }
        if let Ok(v) = env::var("CRM_REMOTE_MAX_PAGE_SIZE") {
            self.remote.max_page_size = v.parse().ok();
        }
        if let Ok(v) = env::var("CRM_REMOTE_DEBUG_LOGGING") {
            self.remote.debug_logging = v.parse().unwrap_or(self.remote.debug_logging);
        }

        // Cache overrides
        if let Ok(v) = env::var("CRM_CACHE_STALE_TIME_SECS") {
            self.cache.stale_time_secs = v.parse().unwrap_or(self.cache.stale_time_secs);
        }
        if let Ok(v) = env::var("CRM_CACHE_EVENT_BUFFER") {
            self.cache.event_buffer = v.parse().unwrap_or(self.cache.event_buffer);
        }

        // Auth overrides
        if let Ok(v) = env::var("CRM_AUTH_EXPIRY_SKEW_SECS") {
            self.auth.expiry_skew_secs = v.parse().unwrap_or(self.auth.expiry_skew_secs);
        }

        // Refresh overrides
        if let Ok(v) = env::var("CRM_REFRESH_POLLING_ENABLED") {
            self.refresh.polling_enabled = v.parse().unwrap_or(self.refresh.polling_enabled);
        }
        if let Ok(v) = env::var("CRM_REFRESH_POLL_INTERVAL_SECS") {
            self.refresh.poll_interval_secs = v.parse().unwrap_or(self.refresh.poll_interval_secs);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            remote: RemoteConfig {
                base_url: "http://localhost:54321".to_string(),
                api_key: String::new(),
                request_timeout_secs: 30,
                max_page_size: Some(1000),
                debug_logging: true,
            },
            cache: CacheConfig {
                stale_time_secs: 0,
                event_buffer: 256,
            },
            auth: AuthConfig { expiry_skew_secs: 0 },
            refresh: RefreshConfig {
                polling_enabled: true,
                poll_interval_secs: 30,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            remote: RemoteConfig {
                base_url: String::new(),
                api_key: String::new(),
                request_timeout_secs: 15,
                max_page_size: Some(500),
                debug_logging: false,
            },
            cache: CacheConfig {
                stale_time_secs: 30,
                event_buffer: 256,
            },
            auth: AuthConfig { expiry_skew_secs: 30 },
            refresh: RefreshConfig {
                polling_enabled: true,
                poll_interval_secs: 60,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            remote: RemoteConfig {
                base_url: String::new(),
                api_key: String::new(),
                request_timeout_secs: 10,
                max_page_size: Some(200),
                debug_logging: false,
            },
            cache: CacheConfig {
                stale_time_secs: 60,
                event_buffer: 1024,
            },
            auth: AuthConfig { expiry_skew_secs: 60 },
            refresh: RefreshConfig {
                polling_enabled: false,
                poll_interval_secs: 120,
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CacheConfig {
    pub fn stale_time(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_time_secs as i64)
    }
}

impl RefreshConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

// Process-wide config for the binary; library types take an `AppConfig` explicitly
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| AppConfig::load().unwrap_or_else(|_| AppConfig::from_env()));

pub fn config() -> &'static AppConfig {
    &CONFIG
}
