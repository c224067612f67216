// handlers/destinations/get.rs - GET /destinations handler

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;

use super::server_error;
use crate::dispatch::{Handler, HandlerError, HandlerPayload, HandlerResponse};
use crate::store::Table;

/// Lists every destination stored under the `user` partition
pub struct ListDestinations {
    table: Arc<Table>,
}

impl ListDestinations {
    pub fn new(table: Arc<Table>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Handler for ListDestinations {
    async fn invoke(&self, payload: HandlerPayload) -> Result<HandlerResponse, HandlerError> {
        let Some(user) = payload.query_param("user") else {
            return Ok(HandlerResponse::message(StatusCode::BAD_REQUEST, "Missing required parameter: user"));
        };

        let reader = match self.table.reader(&payload.credential) {
            Ok(reader) => reader,
            Err(e) => return Ok(server_error("read destinations", e)),
        };

        let entities: Vec<Value> = reader.query(user).await.into_iter().map(|item| item.entity).collect();
        tracing::info!("Found {} destinations for '{}'", entities.len(), user);
        HandlerResponse::json(StatusCode::OK, &entities)
    }
}
