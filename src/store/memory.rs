use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::types::{ItemList, RunKey};
use crate::store::ItemStore;

/// In-process item store.
#[derive(Default)]
pub struct MemoryStore {
    lists: RwLock<HashMap<RunKey, ItemList>>,
    outage: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, key: RunKey, values: Vec<Value>) {
        self.lists
            .write()
            .await
            .insert(key, ItemList::from_values(values));
    }

    /// Make every subsequent `get` fail as unavailable until cleared with `None`.
    pub async fn fail_with(&self, reason: Option<String>) {
        *self.outage.write().await = reason;
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn get(&self, key: &RunKey) -> std::result::Result<ItemList, StoreError> {
        if let Some(reason) = self.outage.read().await.as_ref() {
            return Err(StoreError::Unavailable(reason.clone()));
        }

        self.lists
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }
}
