// handlers/auth/confirm_forgot_password.rs - POST /auth/confirm_forgot_password handler

use axum::http::StatusCode;

use super::{invalid_password, pool_failure, RequestBody};
use crate::dispatch::{HandlerError, HandlerResponse};
use crate::identity::pool::PoolAdmin;
use crate::identity::PoolError;

/// Body: `{username, confirmation_code, password}`. Answers 204 once the new password is set.
pub(crate) async fn handle(admin: &PoolAdmin<'_>, body: &RequestBody) -> Result<HandlerResponse, HandlerError> {
    let fields = (
        body.field("username"),
        body.field("confirmation_code"),
        body.field("password"),
    );
    let (username, code, password) = match fields {
        (Ok(username), Ok(code), Ok(password)) => (username, code, password),
        (Err(response), _, _) | (_, Err(response), _) | (_, _, Err(response)) => return Ok(response),
    };

    let response = match admin.confirm_forgot_password(username, code, password).await {
        Ok(()) => HandlerResponse::no_content(),
        Err(PoolError::UserNotFound) => HandlerResponse::message(StatusCode::NOT_FOUND, "User does not exist"),
        Err(PoolError::NotConfirmed) => HandlerResponse::message(StatusCode::FORBIDDEN, "User is not confirmed"),
        Err(PoolError::CodeMismatch) => {
            tracing::warn!("Wrong password reset code for '{}'", username);
            HandlerResponse::message(StatusCode::BAD_REQUEST, "Invalid verification code")
        }
        Err(PoolError::InvalidPassword(min)) => invalid_password(min),
        Err(e) => pool_failure(e),
    };
    Ok(response)
}
