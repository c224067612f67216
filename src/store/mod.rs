use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::broker::{Permission, ScopedCredential};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("credential {key_id} does not grant {required} access to table '{table}'")]
    AccessDenied {
        key_id: String,
        table: String,
        required: Permission,
    },
}

/// One stored entity under a partition/sort key pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
    #[serde(rename = "Entity")]
    pub entity: Value,
}

/// Sort key of a destination item, `DESTINATION#<place_id>`
pub fn destination_sort_key(place_id: &str) -> String {
    format!("DESTINATION#{}", place_id)
}

/// Single-table store. Reads and writes go through handles that are only
/// handed out for a live credential scoped to this table.
pub struct Table {
    name: String,
    items: RwLock<BTreeMap<(String, String), Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, credential: &ScopedCredential, required: Permission) -> Result<(), StoreError> {
        if credential.permits(required, &self.name, Utc::now()) {
            Ok(())
        } else {
            Err(StoreError::AccessDenied {
                key_id: credential.access_key_id.clone(),
                table: self.name.clone(),
                required,
            })
        }
    }

    pub fn reader(&self, credential: &ScopedCredential) -> Result<TableReader<'_>, StoreError> {
        self.check(credential, Permission::Read)?;
        Ok(TableReader { table: self })
    }

    pub fn writer(&self, credential: &ScopedCredential) -> Result<TableWriter<'_>, StoreError> {
        self.check(credential, Permission::Write)?;
        Ok(TableWriter { table: self })
    }
}

pub struct TableReader<'a> {
    table: &'a Table,
}

impl TableReader<'_> {
    /// All items in a partition, ordered by sort key
    pub async fn query(&self, pk: &str) -> Vec<Item> {
        let items = self.table.items.read().await;
        items
            .range((pk.to_string(), String::new())..)
            .take_while(|((item_pk, _), _)| item_pk == pk)
            .map(|((pk, sk), entity)| Item {
                pk: pk.clone(),
                sk: sk.clone(),
                entity: entity.clone(),
            })
            .collect()
    }
}

pub struct TableWriter<'a> {
    table: &'a Table,
}

impl TableWriter<'_> {
    /// Insert or replace an item
    pub async fn put(&self, item: Item) {
        let mut items = self.table.items.write().await;
        items.insert((item.pk, item.sk), item.entity);
    }

    /// Remove an item; returns whether it existed
    pub async fn delete(&self, pk: &str, sk: &str) -> bool {
        let mut items = self.table.items.write().await;
        items.remove(&(pk.to_string(), sk.to_string())).is_some()
    }
}
