use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Identifier of a stored item list. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunKey(String);

impl RunKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(AppError::InvalidInput("run key must not be empty".into()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RunKey {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        RunKey::new(value)
    }
}

impl From<RunKey> for String {
    fn from(key: RunKey) -> Self {
        key.0
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of work: an opaque payload and its position in the fetched list.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub index: usize,
    pub value: serde_json::Value,
}

/// The ordered, immutable list fetched for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemList {
    items: Arc<[WorkItem]>,
}

impl Default for ItemList {
    fn default() -> Self {
        Self::from_values(Vec::new())
    }
}

impl ItemList {
    pub fn from_values(values: Vec<serde_json::Value>) -> Self {
        let items: Vec<WorkItem> = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| WorkItem { index, value })
            .collect();
        Self {
            items: items.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WorkItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.iter()
    }
}
