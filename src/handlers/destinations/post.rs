// handlers/destinations/post.rs - POST /destinations handler

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;

use super::{owner, server_error, Destination};
use crate::dispatch::{Handler, HandlerError, HandlerPayload, HandlerResponse};
use crate::store::{destination_sort_key, Item, Table};

/// Stores a destination under the caller's partition, replacing any
/// previous entry for the same place
pub struct CreateDestination {
    table: Arc<Table>,
}

impl CreateDestination {
    pub fn new(table: Arc<Table>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Handler for CreateDestination {
    async fn invoke(&self, payload: HandlerPayload) -> Result<HandlerResponse, HandlerError> {
        let username = owner(&payload)?;

        let destination: Destination = match serde_json::from_slice(&payload.body) {
            Ok(destination) => destination,
            Err(e) => {
                tracing::warn!("Rejected destination body: {}", e);
                return Ok(HandlerResponse::message(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid destination: {}", e),
                ));
            }
        };

        let writer = match self.table.writer(&payload.credential) {
            Ok(writer) => writer,
            Err(e) => return Ok(server_error("store destination", e)),
        };

        let entity = serde_json::to_value(&destination)
            .map_err(|e| HandlerError::Failed(format!("unserializable destination: {}", e)))?;
        let item = Item {
            pk: username.to_string(),
            sk: destination_sort_key(&destination.place_id),
            entity,
        };
        tracing::info!("Storing destination {} for '{}'", item.sk, item.pk);
        writer.put(item).await;

        Ok(HandlerResponse::no_content())
    }
}
