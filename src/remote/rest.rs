use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use url::Url;

use super::{into_row, RemoteDataClient, Row};
use crate::auth::SessionStore;
use crate::config::RemoteConfig;
use crate::error::CrmError;
use crate::filter::{Filter, FilterData};

/// PostgREST error codes that mean the JWT was rejected
const JWT_ERROR_CODES: &[&str] = &["PGRST301", "PGRST302", "PGRST303"];

/// Remote client for the hosted store's REST endpoint (`/rest/v1`)
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    rest_url: Url,
    api_key: String,
    sessions: SessionStore,
    max_page_size: Option<u32>,
    debug_logging: bool,
}

impl RestClient {
    pub fn new(config: &RemoteConfig, sessions: SessionStore) -> Result<Self, CrmError> {
        if config.base_url.trim().is_empty() {
            return Err(CrmError::Config("remote base URL is not configured".to_string()));
        }
        let rest_url = Url::parse(&format!("{}/rest/v1/", config.base_url.trim_end_matches('/')))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CrmError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            rest_url,
            api_key: config.api_key.clone(),
            sessions,
            max_page_size: config.max_page_size,
            debug_logging: config.debug_logging,
        })
    }

    fn table_url(&self, table: &str, params: &[(String, String)]) -> Result<Url, CrmError> {
        // Reuse filter validation for table names
        Filter::new(table)?;
        let mut url = self.rest_url.join(table)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Attach credentials; a missing or expired session fails before any I/O
    async fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, CrmError> {
        let token = self.sessions.access_token().await?;
        if self.debug_logging {
            tracing::debug!("{} {}", method, url);
        }
        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, CrmError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Array(vec![]));
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let body: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "message": text }));
        Err(Self::map_error(status, &body))
    }

    fn map_error(status: StatusCode, body: &Value) -> CrmError {
        let code = body.get("code").and_then(Value::as_str).map(str::to_string);
        let mut message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
            .to_string();
        if let Some(details) = body.get("details").and_then(Value::as_str) {
            message = format!("{} ({})", message, details);
        }

        let jwt_rejected = code.as_deref().map_or(false, |c| JWT_ERROR_CODES.contains(&c));
        if status == StatusCode::UNAUTHORIZED || jwt_rejected {
            return CrmError::auth(code.unwrap_or_else(|| "unauthorized".to_string()), message);
        }
        if status == StatusCode::FORBIDDEN {
            return CrmError::auth(code.unwrap_or_else(|| "forbidden".to_string()), message);
        }

        tracing::error!("Remote error {}: {}", status, message);
        CrmError::remote(code.unwrap_or_else(|| format!("HTTP_{}", status.as_u16())), message)
    }

    fn id_params(ids: &[String]) -> Result<Vec<(String, String)>, CrmError> {
        let data = FilterData {
            where_clause: Some(json!({ "id": { "$in": ids } })),
            ..Default::default()
        };
        // Table name is irrelevant for predicate generation
        Ok(Filter::from_data("ids", data)?.to_where_params())
    }

    fn rows(value: Value) -> Result<Vec<Row>, CrmError> {
        match value {
            Value::Array(items) => items.into_iter().map(into_row).collect(),
            Value::Object(map) => Ok(vec![map]),
            other => Err(CrmError::Decode(format!("expected rows, got {}", other))),
        }
    }
}

#[async_trait]
impl RemoteDataClient for RestClient {
    async fn select(&self, filter: &Filter) -> Result<Vec<Row>, CrmError> {
        let mut filter = filter.clone();
        filter.cap_limit(self.max_page_size);
        let url = self.table_url(filter.table_name(), &filter.to_rest_query().params)?;
        let request = self.authorized(Method::GET, url).await?;
        Self::rows(self.send(request).await?)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, CrmError> {
        let url = self.table_url(table, &[])?;
        let request = self
            .authorized(Method::POST, url)
            .await?
            .header("Prefer", "return=representation")
            .json(&row);
        Self::rows(self.send(request).await?)?
            .into_iter()
            .next()
            .ok_or_else(|| CrmError::Decode("insert returned no row".to_string()))
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row, CrmError> {
        let url = self.table_url(table, &Filter::by_id(table, id)?.to_where_params())?;
        let request = self
            .authorized(Method::PATCH, url)
            .await?
            .header("Prefer", "return=representation")
            .json(&patch);
        Self::rows(self.send(request).await?)?
            .into_iter()
            .next()
            .ok_or_else(|| CrmError::not_found(format!("{} row {}", table, id)))
    }

    async fn delete(&self, table: &str, ids: &[String]) -> Result<Vec<Row>, CrmError> {
        if ids.is_empty() {
            return Err(CrmError::validation("No ids given for delete"));
        }
        let url = self.table_url(table, &Self::id_params(ids)?)?;
        let request = self
            .authorized(Method::DELETE, url)
            .await?
            .header("Prefer", "return=representation");
        Self::rows(self.send(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, AuthConfig};

    #[test]
    fn maps_jwt_errors_to_auth() {
        let err = RestClient::map_error(
            StatusCode::UNAUTHORIZED,
            &json!({ "code": "PGRST301", "message": "JWT expired" }),
        );
        assert!(err.is_terminal());
        assert_eq!(err.error_code(), "PGRST301");
    }

    #[test]
    fn maps_store_errors_to_remote() {
        let err = RestClient::map_error(
            StatusCode::CONFLICT,
            &json!({ "code": "23505", "message": "duplicate key", "details": "Key (email) already exists." }),
        );
        assert_eq!(err.error_code(), "23505");
        assert!(err.to_string().contains("Key (email) already exists."));
    }

    #[test]
    fn builds_table_urls_with_encoded_params() {
        let mut config = AppConfig::development().remote;
        config.base_url = "https://project.example.co/".to_string();
        let client = RestClient::new(&config, SessionStore::new(&AuthConfig { expiry_skew_secs: 0 })).unwrap();
        let url = client.table_url("leads", &RestClient::id_params(&["a b".to_string()]).unwrap()).unwrap();
        assert_eq!(url.path(), "/rest/v1/leads");
        assert_eq!(url.query_pairs().next().unwrap().1, "in.(\"a b\")");
        assert!(client.table_url("leads;drop", &[]).is_err());
    }

    #[tokio::test]
    async fn requests_without_session_fail_before_io() {
        let mut config = AppConfig::development().remote;
        // Unroutable; the call must never get that far
        config.base_url = "http://127.0.0.1:9".to_string();
        let client = RestClient::new(&config, SessionStore::new(&AuthConfig { expiry_skew_secs: 0 })).unwrap();
        let err = client.select(&Filter::new("leads").unwrap()).await.unwrap_err();
        assert_eq!(err.error_code(), "session_missing");
    }
}
