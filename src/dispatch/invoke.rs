use std::collections::HashMap;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::broker::ScopedCredential;
use crate::identity::Subject;

/// Everything a handler gets for one invocation
#[derive(Debug, Clone)]
pub struct HandlerPayload {
    pub method: Method,
    pub path: String,
    /// Sub-path beneath a proxy route; empty for exact routes
    pub proxy_path: Vec<String>,
    pub query: HashMap<String, String>,
    pub body: Bytes,
    pub subject: Option<Subject>,
    pub credential: ScopedCredential,
}

impl HandlerPayload {
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Response produced by a handler, passed back to the caller unmodified
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub content_type: Option<&'static str>,
    pub body: Bytes,
}

impl HandlerResponse {
    pub fn json<T: Serialize>(status: StatusCode, data: &T) -> Result<Self, HandlerError> {
        let body = serde_json::to_vec(data).map_err(|e| HandlerError::Failed(format!("unserializable response: {}", e)))?;
        Ok(Self {
            status,
            content_type: Some("application/json"),
            body: Bytes::from(body),
        })
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            content_type: None,
            body: Bytes::new(),
        }
    }

    /// `{"message": ...}` body, the shape handlers use for their own errors
    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("application/json"),
            body: Bytes::from(json!({ "message": message.into() }).to_string()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),
}

/// Compute boundary behind a route. Anything that can turn a payload into a
/// response (in-process function, RPC client, queue worker) can sit here.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn invoke(&self, payload: HandlerPayload) -> Result<HandlerResponse, HandlerError>;
}
