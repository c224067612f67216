// handlers/auth/resend_verification_code.rs - POST /auth/resend_verification_code handler

use axum::http::StatusCode;

use super::{pool_failure, RequestBody};
use crate::dispatch::{HandlerError, HandlerResponse};
use crate::identity::pool::PoolAdmin;
use crate::identity::PoolError;

/// Body: `{username}`. Answers 204 after a fresh code went out.
pub(crate) async fn handle(admin: &PoolAdmin<'_>, body: &RequestBody) -> Result<HandlerResponse, HandlerError> {
    let username = match body.field("username") {
        Ok(username) => username,
        Err(response) => return Ok(response),
    };

    let response = match admin.resend_confirmation_code(username).await {
        Ok(()) => HandlerResponse::no_content(),
        Err(PoolError::AlreadyConfirmed) => {
            HandlerResponse::message(StatusCode::BAD_REQUEST, "User is already confirmed")
        }
        Err(PoolError::UserNotFound) => HandlerResponse::message(StatusCode::NOT_FOUND, "User does not exist"),
        Err(e) => pool_failure(e),
    };
    Ok(response)
}
