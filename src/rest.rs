//! REST layer: the one HTTP client every call goes through.
//!
//! - Joins endpoint paths onto the configured base URL.
//! - Attaches `Authorization: Bearer <token>` when a token is supplied.
//! - Classifies responses: 401/403 become `ApiError::Unauthorized`, any other
//!   non-2xx becomes `ApiError::Status` carrying the backend's `message` if it sent one.
//! - Decodes bodies as JSON, treating an empty body as `None`.

use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::ClientError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unauthorized ({status})")]
    Unauthorized {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            Self::Decode(_) => None,
        }
    }

    /// Message the backend put in its error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } if !message.is_empty() => Some(message),
            Self::Unauthorized {
                message: Some(message),
                ..
            } if !message.is_empty() => Some(message),
            _ => None,
        }
    }

    /// Converts into a client error for the named action. Auth failures map to
    /// `SessionExpired`; everything else is a network/server failure.
    pub fn into_client_error(self, action: &str) -> ClientError {
        match self {
            Self::Unauthorized { .. } => ClientError::SessionExpired,
            other => {
                let message = other
                    .server_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_string());
                ClientError::network(action, message)
            }
        }
    }
}

/// A single outgoing request. Built by the resource and auth layers, sent by `ApiClient`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Sends the request and returns the decoded body (`None` for an empty body).
    pub async fn send(
        &self,
        request: ApiRequest,
        token: Option<&str>,
    ) -> Result<Option<Value>, ApiError> {
        let url = self.url(&request.path);
        debug!(
            method = %request.method,
            path = %request.path,
            authenticated = token.is_some(),
            "sending request"
        );

        let mut builder = self.http.request(request.method, &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let res = builder.send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        let body = decode_body(&bytes);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized {
                status,
                message: body_message(body.as_ref()),
            });
        }
        if !status.is_success() {
            let message = body_message(body.as_ref()).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(ApiError::Status { status, message });
        }
        Ok(body)
    }
}

fn body_message(body: Option<&Value>) -> Option<String> {
    body.and_then(|b| b.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Empty or non-JSON bodies decode to `None`; a 2xx with an HTML error page is
/// treated the same as an empty body.
fn decode_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}
