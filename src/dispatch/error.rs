use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::broker::GrantError;
use crate::middleware::auth::AuthError;
use crate::middleware::validate_request::ValidationError;
use crate::schema::FieldType;

/// External dependency a request waited on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    IdentityDirectory,
    CredentialExchange,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::IdentityDirectory => f.write_str("identity directory"),
            Upstream::CredentialExchange => f.write_str("credential exchange"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantFailure {
    /// The trust relationship refused the exchange
    Rejected,
    /// The trust authority could not be reached
    Unavailable,
}

/// Why a dispatch ended in `FAILED`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("No route for {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Schema violation on field '{field}': expected {expected}, got {actual}")]
    SchemaViolation {
        field: String,
        expected: FieldType,
        actual: String,
    },

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Credential grant failed: {reason}")]
    CredentialGrant { failure: GrantFailure, reason: String },

    #[error("{upstream} timed out after {after:?}")]
    UpstreamTimeout { upstream: Upstream, after: Duration },

    #[error("Handler failure: {0}")]
    HandlerFailure(String),
}

impl GatewayError {
    /// Failures the caller may retry on a fresh request. Nothing before
    /// invocation has side effects, so these are safe to repeat.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::UpstreamTimeout { .. } | GatewayError::CredentialGrant { .. }
        )
    }
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Timeout(after) => GatewayError::UpstreamTimeout {
                upstream: Upstream::IdentityDirectory,
                after,
            },
            // An unreachable directory is a rejection, never an implicit allow
            other => GatewayError::Unauthorized(other.to_string()),
        }
    }
}

impl From<ValidationError> for GatewayError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::MissingParameter(name) => GatewayError::MissingParameter(name),
            ValidationError::SchemaViolation { field, expected, actual } => {
                GatewayError::SchemaViolation { field, expected, actual }
            }
            ValidationError::MalformedBody(msg) => GatewayError::MalformedBody(msg),
        }
    }
}

impl From<GrantError> for GatewayError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::Timeout(after) => GatewayError::UpstreamTimeout {
                upstream: Upstream::CredentialExchange,
                after,
            },
            GrantError::Rejected { .. } => GatewayError::CredentialGrant {
                failure: GrantFailure::Rejected,
                reason: err.to_string(),
            },
            GrantError::Unavailable(_) => GatewayError::CredentialGrant {
                failure: GrantFailure::Unavailable,
                reason: err.to_string(),
            },
        }
    }
}
