// handlers/auth/mod.rs - Identity exchange proxy behind /auth/*
//
// Public endpoints that trade credentials for tokens. The gateway does not
// authorize these requests; the user pool checks them itself.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::{Map, Value};

use crate::dispatch::{Handler, HandlerError, HandlerPayload, HandlerResponse};
use crate::identity::UserPool;

pub mod change_password;          // POST /auth/change_password - replace a password given an access token
pub mod confirm_forgot_password;  // POST /auth/confirm_forgot_password - set a new password with a reset code
pub mod create_user;              // POST /auth/create_user - register an unconfirmed user
pub mod forgot_password;          // POST /auth/forgot_password - send a password reset code
pub mod login;                    // POST /auth/login - exchange username/password for tokens
pub mod refresh;                  // POST /auth/refresh_tokens - mint new tokens from a refresh token
pub mod resend_verification_code; // POST /auth/resend_verification_code - send a fresh sign-up code
pub mod verify_user;              // POST /auth/verify_user - confirm a sign-up with its code

const OPERATIONS: &[&str] = &[
    "change_password",
    "confirm_forgot_password",
    "create_user",
    "forgot_password",
    "login",
    "refresh_tokens",
    "resend_verification_code",
    "verify_user",
];

/// Routes `/auth/<operation>` to the user pool
pub struct IdentityProxy {
    pool: Arc<UserPool>,
}

impl IdentityProxy {
    pub fn new(pool: Arc<UserPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Handler for IdentityProxy {
    async fn invoke(&self, payload: HandlerPayload) -> Result<HandlerResponse, HandlerError> {
        let operation = match payload.proxy_path.as_slice() {
            [operation] if OPERATIONS.contains(&operation.as_str()) => operation.as_str(),
            _ => return Ok(HandlerResponse::message(StatusCode::NOT_FOUND, "Not Found")),
        };
        if payload.method != Method::POST {
            return Ok(HandlerResponse::message(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"));
        }

        let admin = match self.pool.admin(&payload.credential) {
            Ok(admin) => admin,
            Err(e) => {
                tracing::error!("User pool refused proxy credential: {}", e);
                return Ok(HandlerResponse::message(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server Error. Please try again later",
                ));
            }
        };

        let body = match RequestBody::parse(&payload.body) {
            Ok(body) => body,
            Err(response) => return Ok(response),
        };

        match operation {
            "change_password" => change_password::handle(&admin, &body).await,
            "confirm_forgot_password" => confirm_forgot_password::handle(&admin, &body).await,
            "create_user" => create_user::handle(&admin, &body).await,
            "forgot_password" => forgot_password::handle(&admin, &body).await,
            "login" => login::handle(&admin, &body).await,
            "refresh_tokens" => refresh::handle(&admin, &body).await,
            "resend_verification_code" => resend_verification_code::handle(&admin, &body).await,
            "verify_user" => verify_user::handle(&admin, &body).await,
            _ => Ok(HandlerResponse::message(StatusCode::NOT_FOUND, "Not Found")),
        }
    }
}

/// JSON object body of an identity request
pub(crate) struct RequestBody(Map<String, Value>);

impl RequestBody {
    fn parse(bytes: &[u8]) -> Result<Self, HandlerResponse> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            _ => Err(HandlerResponse::message(
                StatusCode::BAD_REQUEST,
                "Invalid Request Body: expected a JSON object",
            )),
        }
    }

    /// A required string field; absence is a 400 naming the field
    pub(crate) fn field(&self, name: &str) -> Result<&str, HandlerResponse> {
        self.0.get(name).and_then(Value::as_str).ok_or_else(|| {
            HandlerResponse::message(StatusCode::BAD_REQUEST, format!("Invalid Request Body: '{}'", name))
        })
    }
}

pub(crate) fn invalid_password(min: usize) -> HandlerResponse {
    HandlerResponse::message(
        StatusCode::BAD_REQUEST,
        format!("Invalid password. Password should have at least {} characters", min),
    )
}

/// Unexpected pool failures are logged and hidden from the caller
pub(crate) fn pool_failure(err: impl std::fmt::Display) -> HandlerResponse {
    tracing::error!("User pool error: {}", err);
    HandlerResponse::message(StatusCode::INTERNAL_SERVER_ERROR, "Server Error. Please try again later")
}
