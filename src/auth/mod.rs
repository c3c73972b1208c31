use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::config::{AuthConfig, RemoteConfig};
use crate::error::CrmError;

/// Claims read from the identity service's access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
}

/// An authenticated session against the hosted store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Read identity and expiry from a JWT access token.
    /// The signature is not checked here; the store verifies every request.
    pub fn from_access_token(access_token: impl Into<String>, refresh_token: Option<String>) -> Result<Self, CrmError> {
        let access_token = access_token.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = decode::<AccessClaims>(&access_token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| CrmError::auth("invalid_token", format!("Malformed access token: {}", e)))?;
        let claims = data.claims;

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| CrmError::auth("invalid_token", "Access token has an invalid expiry"))?;

        Ok(Self {
            access_token,
            refresh_token,
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
            expires_at,
        })
    }

    pub fn is_expired(&self, skew: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - skew <= now
    }
}

/// Holds the current session for every remote call.
///
/// Explicitly constructed and shared by clone. Auth failures are terminal:
/// the session is dropped and the caller must sign in again.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
    skew: chrono::Duration,
}

impl SessionStore {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            skew: chrono::Duration::seconds(config.expiry_skew_secs),
        }
    }

    pub fn with_session(config: &AuthConfig, session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(session))),
            skew: chrono::Duration::seconds(config.expiry_skew_secs),
        }
    }

    pub async fn set(&self, session: Session) {
        tracing::info!("Session established for user {}", session.user_id);
        *self.inner.write().await = Some(session);
    }

    /// The live session, or an auth error when missing or expired
    pub async fn current(&self) -> Result<Session, CrmError> {
        let guard = self.inner.read().await;
        match guard.as_ref() {
            None => Err(CrmError::auth("session_missing", "Not signed in")),
            Some(session) if session.is_expired(self.skew, Utc::now()) => {
                Err(CrmError::auth("session_expired", "Session expired, please sign in again"))
            }
            Some(session) => Ok(session.clone()),
        }
    }

    pub async fn access_token(&self) -> Result<String, CrmError> {
        Ok(self.current().await?.access_token)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current().await.is_ok()
    }

    pub async fn invalidate(&self) {
        if self.inner.write().await.take().is_some() {
            tracing::warn!("Session invalidated; sign-in required");
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Client for the identity service (`/auth/v1`)
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, CrmError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CrmError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, CrmError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(CrmError::validation("Email and password are required"));
        }
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        self.token_request(&url, json!({ "email": email, "password": password })).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, CrmError> {
        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.base_url);
        self.token_request(&url, json!({ "refresh_token": refresh_token })).await
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), CrmError> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        if response.status().is_success() || response.status().as_u16() == 401 {
            Ok(())
        } else {
            Err(Self::auth_error(response.status().as_u16(), response.json::<Value>().await.unwrap_or_default()))
        }
    }

    async fn token_request(&self, url: &str, body: Value) -> Result<Session, CrmError> {
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or_default();
            return Err(Self::auth_error(status.as_u16(), body));
        }

        let token: TokenResponse = response.json().await?;
        Session::from_access_token(token.access_token, token.refresh_token)
    }

    fn auth_error(status: u16, body: Value) -> CrmError {
        let code = body
            .get("error_code")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .unwrap_or(if status == 400 { "invalid_credentials" } else { "auth_error" })
            .to_string();
        let message = body
            .get("error_description")
            .or_else(|| body.get("msg"))
            .or_else(|| body.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Authentication failed")
            .to_string();
        CrmError::auth(code, message)
    }
}
