// handlers/auth/login.rs - POST /auth/login handler

use axum::http::StatusCode;

use super::{pool_failure, RequestBody};
use crate::dispatch::{HandlerError, HandlerResponse};
use crate::identity::pool::PoolAdmin;
use crate::identity::PoolError;

/// Body: `{username, password}`. Answers with the token set.
pub(crate) async fn handle(admin: &PoolAdmin<'_>, body: &RequestBody) -> Result<HandlerResponse, HandlerError> {
    let (username, password) = match (body.field("username"), body.field("password")) {
        (Ok(username), Ok(password)) => (username, password),
        (Err(response), _) | (_, Err(response)) => return Ok(response),
    };

    match admin.login(username, password).await {
        Ok(result) => HandlerResponse::json(StatusCode::OK, &result),
        Err(PoolError::NotAuthorized) => {
            tracing::warn!("Failed login for '{}'", username);
            Ok(HandlerResponse::message(StatusCode::UNAUTHORIZED, "The username or password is incorrect"))
        }
        Err(PoolError::NotConfirmed) => Ok(HandlerResponse::message(StatusCode::FORBIDDEN, "User is not confirmed")),
        Err(PoolError::UserNotFound) => Ok(HandlerResponse::message(StatusCode::NOT_FOUND, "User does not exist")),
        Err(e) => Ok(pool_failure(e)),
    }
}
