//! In-process mock backend for integration tests.
//!
//! Every request is recorded; the response comes from a closure supplied by the test.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::Value;
use vaultx_client::config::ClientConfig;
use vaultx_client::models::{Session, UserId, UserProfile};
use vaultx_client::storage::Storage;
use vaultx_client::ClientContext;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    /// Path below the `/api` prefix.
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

impl Recorded {
    pub fn is(&self, method: Method, path: &str) -> bool {
        self.method == method && self.path == path
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .unwrap_or_default()
            .split('&')
            .filter(|kv| !kv.is_empty())
            .map(|kv| match kv.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (kv.to_string(), String::new()),
            })
            .collect()
    }

    pub fn query_value(&self, key: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

type Responder = Arc<dyn Fn(&Recorded) -> (StatusCode, Value) + Send + Sync>;

#[derive(Clone)]
struct MockState {
    log: Arc<Mutex<Vec<Recorded>>>,
    responder: Responder,
}

pub struct MockBackend {
    pub base_url: String,
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBackend {
    pub async fn spawn(
        responder: impl Fn(&Recorded) -> (StatusCode, Value) + Send + Sync + 'static,
    ) -> Self {
        let log = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            log: Arc::clone(&log),
            responder: Arc::new(responder),
        };
        let app = Router::new().fallback(handle).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/api"),
            log,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|r| r.is(method.clone(), path))
            .count()
    }
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let path = uri.path();
    let recorded = Recorded {
        method,
        path: path.strip_prefix("/api").unwrap_or(path).to_string(),
        query: uri.query().map(str::to_string),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).ok(),
    };
    state.log.lock().push(recorded.clone());
    let (status, value) = (state.responder)(&recorded);
    (status, Json(value))
}

pub fn config(base_url: &str) -> ClientConfig {
    ClientConfig {
        api_base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    }
}

pub fn signed_out_context(base_url: &str) -> ClientContext {
    let storage = Storage::temporary().unwrap();
    ClientContext::with_storage(&config(base_url), storage).unwrap()
}

/// Context whose storage already holds a session with token `tok-1` for user 7.
pub fn signed_in_context(base_url: &str) -> ClientContext {
    let storage = Storage::temporary().unwrap();
    storage
        .write_session(&Session {
            token: "tok-1".into(),
            user_id: Some(UserId::Number(7)),
            profile: UserProfile {
                user_id: Some(UserId::Number(7)),
                email: Some("ann@bank.test".into()),
                ..UserProfile::default()
            },
        })
        .unwrap();
    ClientContext::with_storage(&config(base_url), storage).unwrap()
}
