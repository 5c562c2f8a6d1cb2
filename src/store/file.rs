use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::types::{ItemList, RunKey};
use crate::store::ItemStore;

/// Item store backed by a JSON table file.
///
/// The file holds an array of rows. Each row is an object carrying the
/// partition key attribute and a list attribute with the items:
///
/// ```json
/// [{ "mapstatelist": "batch-1", "values": [1, 2, 3] }]
/// ```
pub struct FileStore {
    path: PathBuf,
    partition_key_name: String,
    values_attribute: String,
}

impl FileStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            path: config.path.clone(),
            partition_key_name: config.partition_key_name.clone(),
            values_attribute: config.values_attribute.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the row for `key`.
    ///
    /// Writes go through a sibling temp file and a rename, so a concurrent
    /// `get` sees either the previous table or the new one.
    pub async fn put(
        &self,
        key: &RunKey,
        values: Vec<Value>,
    ) -> std::result::Result<(), StoreError> {
        let mut rows = match self.read_rows().await {
            Ok(rows) => rows,
            Err(StoreError::Unavailable(_)) if !self.path.exists() => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut row = serde_json::Map::new();
        row.insert(
            self.partition_key_name.clone(),
            Value::String(key.as_str().to_string()),
        );
        row.insert(self.values_attribute.clone(), Value::Array(values));
        let row = Value::Object(row);

        match rows.iter().position(|r| self.row_matches(r, key)) {
            Some(pos) => rows[pos] = row,
            None => rows.push(row),
        }

        let body = serde_json::to_vec_pretty(&rows)
            .map_err(|e| StoreError::Malformed(format!("Failed to encode table: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to replace {}: {e}", self.path.display()))
        })?;

        tracing::info!(
            path = %self.path.display(),
            key = %key,
            "Stored item list"
        );
        Ok(())
    }

    async fn read_rows(&self) -> std::result::Result<Vec<Value>, StoreError> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::NotFound => "table file missing".to_string(),
                _ => e.to_string(),
            };
            StoreError::Unavailable(format!("{}: {reason}", self.path.display()))
        })?;

        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Array(rows)) => Ok(rows),
            Ok(_) => Err(StoreError::Malformed(format!(
                "{} is not a JSON array of rows",
                self.path.display()
            ))),
            Err(e) => Err(StoreError::Malformed(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    fn row_matches(&self, row: &Value, key: &RunKey) -> bool {
        row.get(&self.partition_key_name).and_then(Value::as_str) == Some(key.as_str())
    }
}

#[async_trait]
impl ItemStore for FileStore {
    async fn get(&self, key: &RunKey) -> std::result::Result<ItemList, StoreError> {
        let rows = self.read_rows().await?;

        let row = rows
            .into_iter()
            .find(|r| self.row_matches(r, key))
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;

        match row.get(&self.values_attribute) {
            Some(Value::Array(values)) => {
                tracing::debug!(key = %key, count = values.len(), "Fetched item list");
                Ok(ItemList::from_values(values.clone()))
            }
            Some(_) => Err(StoreError::Malformed(format!(
                "attribute {:?} of {key} is not a list",
                self.values_attribute
            ))),
            None => Err(StoreError::Malformed(format!(
                "row {key} has no {:?} attribute",
                self.values_attribute
            ))),
        }
    }
}
