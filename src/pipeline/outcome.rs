use serde::Serialize;
use serde_json::Value;

use crate::error::ItemError;

/// Output of one stage for one item: the value handed to the next stage, or
/// the failure that ends the item's pipeline.
pub type StageResult = std::result::Result<Value, ItemError>;

/// Final result for one item, attributable to its list position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub index: usize,
    #[serde(flatten)]
    pub result: ItemResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemResult {
    Succeeded { output: Value },
    Failed { error: ItemError },
}

impl ItemOutcome {
    pub fn from_stage_result(index: usize, result: StageResult) -> Self {
        let result = match result {
            Ok(output) => ItemResult::Succeeded { output },
            Err(error) => ItemResult::Failed { error },
        };
        Self { index, result }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, ItemResult::Succeeded { .. })
    }

    pub fn error(&self) -> Option<&ItemError> {
        match &self.result {
            ItemResult::Failed { error } => Some(error),
            ItemResult::Succeeded { .. } => None,
        }
    }
}

/// How one item's pipeline ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineRun {
    Finished(ItemOutcome),
    /// Cancelled while a stage was in flight. No outcome exists.
    Abandoned,
}
