use async_trait::async_trait;
use serde_json::Value;

use crate::error::ItemError;
use crate::pipeline::{Stage, StageResult};
use crate::store::types::WorkItem;

/// Identity stage. Optionally narrows the value to the sub-document at a
/// JSON pointer; the value itself is never modified.
#[derive(Debug, Clone, Default)]
pub struct PassStage {
    input_pointer: Option<String>,
}

impl PassStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input_pointer(pointer: impl Into<String>) -> Self {
        Self {
            input_pointer: Some(pointer.into()),
        }
    }
}

#[async_trait]
impl Stage for PassStage {
    fn name(&self) -> &str {
        "pass"
    }

    async fn run(&self, _item: &WorkItem, input: Value) -> StageResult {
        let Some(pointer) = self.input_pointer.as_deref() else {
            return Ok(input);
        };

        input
            .pointer(pointer)
            .cloned()
            .ok_or_else(|| ItemError::Shape {
                pointer: pointer.to_string(),
            })
    }
}
