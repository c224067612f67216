// handlers/auth/forgot_password.rs - POST /auth/forgot_password handler

use axum::http::StatusCode;

use super::{pool_failure, RequestBody};
use crate::dispatch::{HandlerError, HandlerResponse};
use crate::identity::pool::PoolAdmin;
use crate::identity::PoolError;

/// Body: `{username}`. Sends a reset code and answers 204.
pub(crate) async fn handle(admin: &PoolAdmin<'_>, body: &RequestBody) -> Result<HandlerResponse, HandlerError> {
    let username = match body.field("username") {
        Ok(username) => username,
        Err(response) => return Ok(response),
    };

    let response = match admin.forgot_password(username).await {
        Ok(()) => HandlerResponse::no_content(),
        Err(PoolError::UserNotFound) => HandlerResponse::message(StatusCode::NOT_FOUND, "User doesn't exist"),
        Err(PoolError::NotConfirmed) => HandlerResponse::message(
            StatusCode::BAD_REQUEST,
            format!("User <{}> is not confirmed yet", username),
        ),
        Err(e) => pool_failure(e),
    };
    Ok(response)
}
