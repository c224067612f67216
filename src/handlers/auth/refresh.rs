// handlers/auth/refresh.rs - POST /auth/refresh_tokens handler

use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;

use super::{pool_failure, RequestBody};
use crate::dispatch::{HandlerError, HandlerResponse};
use crate::identity::pool::PoolAdmin;
use crate::identity::{AuthenticationResult, PoolError};

#[derive(Serialize)]
struct RefreshResult {
    #[serde(flatten)]
    tokens: AuthenticationResult,
    /// Unix time after which clients should refresh again (90% of the lifetime)
    refresh_after: i64,
}

/// Body: `{username, refresh_token}`. The refresh token comes back unchanged.
pub(crate) async fn handle(admin: &PoolAdmin<'_>, body: &RequestBody) -> Result<HandlerResponse, HandlerError> {
    let (username, refresh_token) = match (body.field("username"), body.field("refresh_token")) {
        (Ok(username), Ok(token)) => (username, token),
        (Err(response), _) | (_, Err(response)) => return Ok(response),
    };

    match admin.refresh(username, refresh_token).await {
        Ok(tokens) => {
            let refresh_after = Utc::now().timestamp() + tokens.expires_in * 9 / 10;
            HandlerResponse::json(StatusCode::OK, &RefreshResult { tokens, refresh_after })
        }
        Err(PoolError::NotAuthorized) => {
            tracing::warn!("Rejected refresh token for '{}'", username);
            Ok(HandlerResponse::message(StatusCode::UNAUTHORIZED, "Invalid Token"))
        }
        Err(e) => Ok(pool_failure(e)),
    }
}
