#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, post};
use axum::{Json, Router};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use coach_crm::auth::{Session, SessionStore};
use coach_crm::config::{AppConfig, CacheConfig, RemoteConfig};
use coach_crm::hooks::HookContext;
use coach_crm::notify::NoticeLog;
use coach_crm::remote::{MemoryStore, RestClient};

pub const API_KEY: &str = "anon-test-key";
pub const PASSWORD: &str = "correct horse";

/// A request as the mock store saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub table: String,
    pub params: Vec<(String, String)>,
    pub apikey: Option<String>,
    pub bearer: Option<String>,
    pub prefer: Option<String>,
    pub body: Option<Value>,
}

impl Recorded {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }
}

#[derive(Default)]
struct MockState {
    tables: HashMap<String, Vec<Value>>,
    requests: Vec<Recorded>,
    failure: Option<(StatusCode, Value)>,
}

/// Minimal PostgREST look-alike: `/rest/v1/:table` and `/auth/v1/token`
#[derive(Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<MockState>>,
}

impl MockStore {
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.state.lock().unwrap().tables.entry(table.to_string()).or_default().extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state.lock().unwrap().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Answer the next REST request with this status and body
    pub fn fail_next(&self, status: StatusCode, body: Value) {
        self.state.lock().unwrap().failure = Some((status, body));
    }
}

pub struct TestServer {
    pub base_url: String,
    pub store: MockStore,
}

impl TestServer {
    pub fn remote_config(&self) -> RemoteConfig {
        let mut remote = AppConfig::development().remote;
        remote.base_url = self.base_url.clone();
        remote.api_key = API_KEY.to_string();
        remote
    }

    pub fn rest_client(&self, sessions: SessionStore) -> RestClient {
        RestClient::new(&self.remote_config(), sessions).expect("rest client")
    }
}

/// Start a mock store on a free port inside the current runtime
pub async fn spawn_server() -> Result<TestServer> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let store = MockStore::default();

    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/rest/v1/:table", any(rest))
        .with_state(store.clone());

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer { base_url: format!("http://127.0.0.1:{}", port), store })
}

/// Unsigned-checked access token the client can decode
pub fn access_token(user_id: &str, expires_in_secs: i64) -> String {
    let claims = json!({
        "sub": user_id,
        "email": format!("{}@studio.test", user_id),
        "role": "authenticated",
        "exp": Utc::now().timestamp() + expires_in_secs,
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret")).expect("encode jwt")
}

pub fn signed_in(user_id: &str) -> SessionStore {
    let session = Session::from_access_token(access_token(user_id, 3600), Some("refresh-1".to_string()))
        .expect("session from token");
    SessionStore::with_session(&AppConfig::development().auth, session)
}

/// Hooks over an in-memory store, with notices collected for assertions
pub fn memory_hooks(store: &MemoryStore) -> (HookContext, Arc<NoticeLog>) {
    let mut config = AppConfig::development();
    config.cache = CacheConfig { stale_time_secs: 300, event_buffer: 64 };
    let notices = Arc::new(NoticeLog::new());
    let hooks = HookContext::new(config, Arc::new(store.clone()), notices.clone());
    (hooks, notices)
}

async fn token(State(store): State<MockStore>, RawQuery(query): RawQuery, Json(body): Json<Value>) -> Response {
    let grant = query.unwrap_or_default();
    let ok = if grant.contains("grant_type=password") {
        body["password"] == PASSWORD
    } else {
        body["refresh_token"].is_string()
    };
    store.state.lock().unwrap().requests.push(Recorded {
        method: Method::POST,
        table: "auth".to_string(),
        params: vec![],
        apikey: None,
        bearer: None,
        prefer: None,
        body: Some(body),
    });

    if ok {
        Json(json!({ "access_token": access_token("coach-1", 3600), "refresh_token": "refresh-2" })).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" })),
        )
            .into_response()
    }
}

async fn rest(
    State(store): State<MockStore>,
    Path(table): Path<String>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let params: Vec<(String, String)> = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .into_owned()
        .collect();
    let body: Option<Value> = serde_json::from_slice(&body).ok();

    let recorded = Recorded {
        method: method.clone(),
        table: table.clone(),
        params: params.clone(),
        apikey: header("apikey"),
        bearer: header("authorization").and_then(|v| v.strip_prefix("Bearer ").map(str::to_string)),
        prefer: header("prefer"),
        body: body.clone(),
    };

    let mut state = store.state.lock().unwrap();
    state.requests.push(recorded.clone());

    if let Some((status, body)) = state.failure.take() {
        return (status, Json(body)).into_response();
    }
    if recorded.bearer.is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "code": "PGRST301", "message": "JWT missing" })),
        )
            .into_response();
    }

    let predicates: Vec<(String, String)> = params
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "select" | "order" | "limit" | "offset"))
        .cloned()
        .collect();
    let rows = state.tables.entry(table).or_default();

    match method {
        Method::GET => {
            let mut matched: Vec<Value> = rows.iter().filter(|row| matches(row, &predicates)).cloned().collect();
            if let Some(limit) = recorded.param("limit").and_then(|l| l.parse::<usize>().ok()) {
                matched.truncate(limit);
            }
            Json(Value::Array(matched)).into_response()
        }
        Method::POST => {
            let mut row = body.unwrap_or_else(|| json!({}));
            if row.get("id").is_none() {
                row["id"] = json!(format!("row-{}", rows.len() + 1));
            }
            row["updated_at"] = json!("2024-01-01T00:00:00Z");
            rows.push(row.clone());
            (StatusCode::CREATED, Json(json!([row]))).into_response()
        }
        Method::PATCH => {
            let patch = body.unwrap_or_else(|| json!({}));
            let mut updated = vec![];
            for row in rows.iter_mut().filter(|row| matches(row, &predicates)) {
                if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                    for (field, value) in fields {
                        target.insert(field.clone(), value.clone());
                    }
                    target.insert("updated_at".to_string(), json!("2024-01-01T00:00:00Z"));
                }
                updated.push(row.clone());
            }
            Json(Value::Array(updated)).into_response()
        }
        Method::DELETE => {
            let (deleted, kept): (Vec<Value>, Vec<Value>) =
                rows.drain(..).partition(|row| matches(row, &predicates));
            *rows = kept;
            Json(Value::Array(deleted)).into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

/// `col=eq.v` and `col=in.("a","b")` are all the tests need
fn matches(row: &Value, predicates: &[(String, String)]) -> bool {
    predicates.iter().all(|(column, expr)| {
        let actual = match row.get(column) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => return false,
            Some(other) => other.to_string(),
        };
        if let Some(expected) = expr.strip_prefix("eq.") {
            actual == expected
        } else if let Some(list) = expr.strip_prefix("in.(").and_then(|l| l.strip_suffix(')')) {
            list.split(',').map(|v| v.trim().trim_matches('"')).any(|v| v == actual)
        } else {
            true
        }
    })
}

/// Let spawned tasks on the current-thread runtime run until they block
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
