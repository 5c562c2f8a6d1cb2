pub mod delay;
pub mod invoke;
pub mod outcome;
pub mod pass;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ItemError;
use crate::store::types::WorkItem;

pub use delay::{DelayStage, WaitPolicy};
pub use invoke::{InvokeStage, InvokeTarget};
pub use outcome::{ItemOutcome, ItemResult, PipelineRun, StageResult};
pub use pass::PassStage;

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Transform `input` for `item`. Cancellation is handled by the
    /// pipeline, which drops the returned future at its next await point.
    async fn run(&self, item: &WorkItem, input: Value) -> StageResult;
}

struct StageSlot {
    stage: Box<dyn Stage>,
    timeout: Option<Duration>,
}

/// Ordered stages applied to one item, stopping at the first failure.
#[derive(Default)]
pub struct StagePipeline {
    stages: Vec<StageSlot>,
}

impl StagePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass, then delay, then invoke.
    pub fn standard(
        pass: PassStage,
        delay: DelayStage,
        invoke: InvokeStage,
        invoke_timeout: Option<Duration>,
    ) -> Self {
        Self::new()
            .then(pass)
            .then(delay)
            .then_with_timeout(invoke, invoke_timeout)
    }

    pub fn then(self, stage: impl Stage + 'static) -> Self {
        self.then_with_timeout(stage, None)
    }

    /// Append a stage that fails with `StageTimeout` if it runs longer than `timeout`.
    pub fn then_with_timeout(
        mut self,
        stage: impl Stage + 'static,
        timeout: Option<Duration>,
    ) -> Self {
        self.stages.push(StageSlot {
            stage: Box::new(stage),
            timeout,
        });
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.stage.name()).collect()
    }

    /// Run every stage over `item`.
    ///
    /// Returns `Abandoned` as soon as `cancel` fires, whichever stage is in
    /// flight; nothing after that point runs.
    pub async fn run(&self, item: &WorkItem, cancel: &CancellationToken) -> PipelineRun {
        let mut value = item.value.clone();

        for slot in &self.stages {
            let name = slot.stage.name();
            let step = run_slot(slot, item, value);

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(index = item.index, stage = name, "Item abandoned");
                    return PipelineRun::Abandoned;
                }
                result = step => result,
            };

            match result {
                Ok(next) => value = next,
                Err(error) => {
                    tracing::debug!(
                        index = item.index,
                        stage = name,
                        error = %error,
                        "Stage failed"
                    );
                    return PipelineRun::Finished(ItemOutcome::from_stage_result(
                        item.index,
                        Err(error),
                    ));
                }
            }
        }

        PipelineRun::Finished(ItemOutcome::from_stage_result(item.index, Ok(value)))
    }
}

async fn run_slot(slot: &StageSlot, item: &WorkItem, input: Value) -> StageResult {
    match slot.timeout {
        None => slot.stage.run(item, input).await,
        Some(limit) => match tokio::time::timeout(limit, slot.stage.run(item, input)).await {
            Ok(result) => result,
            Err(_) => Err(ItemError::StageTimeout {
                stage: slot.stage.name().to_string(),
                after_ms: limit.as_millis() as u64,
            }),
        },
    }
}
