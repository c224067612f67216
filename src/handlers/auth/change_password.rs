// handlers/auth/change_password.rs - POST /auth/change_password handler

use axum::http::StatusCode;

use super::{invalid_password, pool_failure, RequestBody};
use crate::dispatch::{HandlerError, HandlerResponse};
use crate::identity::pool::PoolAdmin;
use crate::identity::PoolError;

/// Body: `{access_token, previous_password, proposed_password}`. Answers 204.
pub(crate) async fn handle(admin: &PoolAdmin<'_>, body: &RequestBody) -> Result<HandlerResponse, HandlerError> {
    let fields = (
        body.field("access_token"),
        body.field("previous_password"),
        body.field("proposed_password"),
    );
    let (access_token, previous, proposed) = match fields {
        (Ok(token), Ok(previous), Ok(proposed)) => (token, previous, proposed),
        (Err(response), _, _) | (_, Err(response), _) | (_, _, Err(response)) => return Ok(response),
    };

    let response = match admin.change_password(access_token, previous, proposed).await {
        Ok(()) => HandlerResponse::no_content(),
        Err(PoolError::NotAuthorized) => {
            HandlerResponse::message(StatusCode::UNAUTHORIZED, "The username or password is incorrect")
        }
        Err(PoolError::InvalidPassword(min)) => invalid_password(min),
        Err(e) => pool_failure(e),
    };
    Ok(response)
}
