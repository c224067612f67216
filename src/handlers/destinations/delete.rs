// handlers/destinations/delete.rs - DELETE /destinations handler

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;

use super::{owner, server_error};
use crate::dispatch::{Handler, HandlerError, HandlerPayload, HandlerResponse};
use crate::store::{destination_sort_key, Table};

/// Removes one of the caller's destinations. Deleting something that is not
/// there still answers 204.
pub struct DeleteDestination {
    table: Arc<Table>,
}

impl DeleteDestination {
    pub fn new(table: Arc<Table>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Handler for DeleteDestination {
    async fn invoke(&self, payload: HandlerPayload) -> Result<HandlerResponse, HandlerError> {
        let username = owner(&payload)?;
        let Some(place_id) = payload.query_param("place_id") else {
            return Ok(HandlerResponse::message(StatusCode::BAD_REQUEST, "Missing required parameter: place_id"));
        };

        let writer = match self.table.writer(&payload.credential) {
            Ok(writer) => writer,
            Err(e) => return Ok(server_error("delete destination", e)),
        };

        let existed = writer.delete(username, &destination_sort_key(place_id)).await;
        tracing::info!("Deleted destination {} for '{}' (existed: {})", place_id, username, existed);
        Ok(HandlerResponse::no_content())
    }
}
