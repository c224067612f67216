// handlers/auth/create_user.rs - POST /auth/create_user handler

use axum::http::StatusCode;

use super::{invalid_password, pool_failure, RequestBody};
use crate::dispatch::{HandlerError, HandlerResponse};
use crate::identity::pool::PoolAdmin;
use crate::identity::PoolError;

/// Body: `{username, password, email}`. Answers 204 on success.
pub(crate) async fn handle(admin: &PoolAdmin<'_>, body: &RequestBody) -> Result<HandlerResponse, HandlerError> {
    let fields = (body.field("username"), body.field("password"), body.field("email"));
    let (username, password, email) = match fields {
        (Ok(username), Ok(password), Ok(email)) => (username, password, email),
        (Err(response), _, _) | (_, Err(response), _) | (_, _, Err(response)) => return Ok(response),
    };

    let response = match admin.create_user(username, password, Some(email.to_string())).await {
        Ok(_) => HandlerResponse::no_content(),
        Err(PoolError::UsernameExists) => {
            tracing::warn!("Sign-up for existing username '{}'", username);
            HandlerResponse::message(StatusCode::BAD_REQUEST, "An account with this username already exists")
        }
        Err(PoolError::InvalidPassword(min)) => invalid_password(min),
        Err(e) => pool_failure(e),
    };
    Ok(response)
}
