// handlers/auth/verify_user.rs - POST /auth/verify_user handler

use axum::http::StatusCode;

use super::{pool_failure, RequestBody};
use crate::dispatch::{HandlerError, HandlerResponse};
use crate::identity::pool::PoolAdmin;
use crate::identity::PoolError;

/// Body: `{username, confirmation_code}`. Answers 204 once the user is confirmed.
pub(crate) async fn handle(admin: &PoolAdmin<'_>, body: &RequestBody) -> Result<HandlerResponse, HandlerError> {
    let (username, code) = match (body.field("username"), body.field("confirmation_code")) {
        (Ok(username), Ok(code)) => (username, code),
        (Err(response), _) | (_, Err(response)) => return Ok(response),
    };

    let response = match admin.confirm_sign_up(username, code).await {
        Ok(()) => HandlerResponse::no_content(),
        Err(PoolError::UserNotFound) => HandlerResponse::message(StatusCode::NOT_FOUND, "User not found"),
        Err(PoolError::CodeMismatch) => {
            tracing::warn!("Wrong confirmation code for '{}'", username);
            HandlerResponse::message(StatusCode::BAD_REQUEST, "Invalid verification code")
        }
        Err(PoolError::AlreadyConfirmed) => {
            HandlerResponse::message(StatusCode::BAD_REQUEST, "User is already confirmed")
        }
        Err(e) => pool_failure(e),
    };
    Ok(response)
}
