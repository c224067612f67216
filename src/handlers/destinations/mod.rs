// handlers/destinations/mod.rs - Destination handlers
//
// Destinations are stored per user: partition key is the username, sort key
// is `DESTINATION#<place_id>`.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::dispatch::{HandlerError, HandlerPayload, HandlerResponse};

pub mod delete; // DELETE /destinations?place_id=
pub mod get;    // GET /destinations?user=
pub mod post;   // POST /destinations

pub use delete::DeleteDestination;
pub use get::ListDestinations;
pub use post::CreateDestination;

/// A place a user has been to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub place_id: String,
    pub name: String,
    pub country: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Store failures surface to the caller as a bare 500
fn server_error(action: &str, err: impl std::fmt::Display) -> HandlerResponse {
    tracing::error!("Failed to {}: {}", action, err);
    HandlerResponse::message(StatusCode::INTERNAL_SERVER_ERROR, "Server Error")
}

/// Username of the authorized caller; these routes are never bound without identity
fn owner(payload: &HandlerPayload) -> Result<&str, HandlerError> {
    payload
        .subject
        .as_ref()
        .map(|s| s.username.as_str())
        .ok_or_else(|| HandlerError::Failed("no authorized subject on a protected route".to_string()))
}
