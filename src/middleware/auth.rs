use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use thiserror::Error;

use crate::identity::{IdentityDirectory, IdentityError, Subject};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingToken,

    #[error("{0}")]
    MalformedHeader(String),

    #[error("Invalid token: {0}")]
    Rejected(String),

    #[error("Identity directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Identity verification timed out after {0:?}")]
    Timeout(Duration),
}

/// Resolves the caller's identity for protected routes by delegating to the
/// identity directory
pub struct Authorizer {
    directory: Arc<dyn IdentityDirectory>,
    timeout: Duration,
}

impl Authorizer {
    pub fn new(directory: Arc<dyn IdentityDirectory>, timeout: Duration) -> Self {
        Self { directory, timeout }
    }

    /// Verify the raw `Authorization` value. Any doubt is a rejection.
    pub async fn authorize(&self, raw_token: Option<&str>) -> Result<Subject, AuthError> {
        let raw = raw_token.ok_or(AuthError::MissingToken)?;
        let token = bearer_token(raw)?;

        match tokio::time::timeout(self.timeout, self.directory.verify(token)).await {
            Err(_) => {
                tracing::error!("Identity directory '{}' did not answer within {:?}", self.directory.name(), self.timeout);
                Err(AuthError::Timeout(self.timeout))
            }
            Ok(Err(IdentityError::Rejected(reason))) => {
                tracing::warn!("Token rejected by '{}': {}", self.directory.name(), reason);
                Err(AuthError::Rejected(reason))
            }
            Ok(Err(IdentityError::Unavailable(reason))) => {
                tracing::error!("Identity directory '{}' unavailable: {}", self.directory.name(), reason);
                Err(AuthError::DirectoryUnavailable(reason))
            }
            Ok(Ok(subject)) => {
                tracing::debug!("Authorized subject '{}' ({})", subject.username, subject.id);
                Ok(subject)
            }
        }
    }
}

/// Raw `Authorization` header value, if present and readable
pub fn authorization_header(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| AuthError::MalformedHeader("Invalid Authorization header format".to_string()))
        })
        .transpose()
}

/// Token carried by an `Authorization` value. Both `Bearer <token>` and a
/// bare token are accepted.
pub fn bearer_token(raw: &str) -> Result<&str, AuthError> {
    let raw = raw.trim();
    let token = match raw.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        Some(_) => {
            return Err(AuthError::MalformedHeader(
                "Authorization header must use Bearer token format".to_string(),
            ))
        }
        None => raw,
    };

    if token.is_empty() || token.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader("Empty bearer token".to_string()));
    }
    Ok(token)
}
