pub mod concurrency;

use std::sync::Arc;

use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::ItemError;
use crate::pipeline::{ItemOutcome, PipelineRun, StagePipeline};
use crate::store::types::ItemList;

pub use concurrency::Concurrency;

/// What happened to every item of one fan-out.
///
/// Each list position appears in exactly one of `outcomes`, `abandoned` or
/// `not_started`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOutReport {
    /// Finished items, in list order.
    pub outcomes: Vec<ItemOutcome>,
    /// Started items that were cancelled before finishing.
    pub abandoned: Vec<usize>,
    /// Items never started because cancellation came first.
    pub not_started: Vec<usize>,
}

impl FanOutReport {
    pub fn started(&self) -> usize {
        self.outcomes.len() + self.abandoned.len()
    }

    /// True when every item produced an outcome.
    pub fn is_complete(&self) -> bool {
        self.abandoned.is_empty() && self.not_started.is_empty()
    }
}

/// Runs a pipeline over every item with a ceiling on how many are active.
pub struct FanOutScheduler {
    pipeline: Arc<StagePipeline>,
}

impl FanOutScheduler {
    pub fn new(pipeline: StagePipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Start items in list order, each as soon as a slot frees up.
    ///
    /// A failed item does not stop the others. Once `cancel` fires no new
    /// item starts and in-flight items stop at their next await point.
    pub async fn run_all(
        &self,
        items: &ItemList,
        concurrency: Concurrency,
        cancel: &CancellationToken,
    ) -> FanOutReport {
        let permits = concurrency.limit().map(|k| Arc::new(Semaphore::new(k)));
        let mut tasks = JoinSet::new();
        let mut slots = Vec::with_capacity(items.len());
        let mut not_started = Vec::new();

        tracing::info!(
            items = items.len(),
            concurrency = %concurrency,
            "Fan-out started"
        );

        for item in items.iter() {
            if cancel.is_cancelled() {
                not_started.push(item.index);
                continue;
            }

            let permit = match &permits {
                None => None,
                Some(semaphore) => {
                    let acquired = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        permit = Arc::clone(semaphore).acquire_owned() => permit.ok(),
                    };
                    match acquired {
                        Some(permit) => Some(permit),
                        None => {
                            not_started.push(item.index);
                            continue;
                        }
                    }
                }
            };

            // Each task owns the sending half of its own outcome slot.
            let (tx, rx) = oneshot::channel();
            slots.push((item.index, rx));

            let pipeline = Arc::clone(&self.pipeline);
            let item = item.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                tracing::debug!(index = item.index, "Item started");
                let run = pipeline.run(&item, &cancel).await;
                let _ = tx.send(run);
            });
        }

        let mut outcomes = Vec::with_capacity(slots.len());
        let mut abandoned = Vec::new();

        for (index, rx) in slots {
            match rx.await {
                Ok(PipelineRun::Finished(outcome)) => outcomes.push(outcome),
                Ok(PipelineRun::Abandoned) => abandoned.push(index),
                Err(_) => {
                    tracing::error!(index, "Pipeline task ended without reporting");
                    outcomes.push(ItemOutcome::from_stage_result(
                        index,
                        Err(ItemError::Panicked),
                    ));
                }
            }
        }

        tasks.shutdown().await;

        let report = FanOutReport {
            outcomes,
            abandoned,
            not_started,
        };

        tracing::info!(
            finished = report.outcomes.len(),
            failed = report.outcomes.iter().filter(|o| !o.is_success()).count(),
            abandoned = report.abandoned.len(),
            not_started = report.not_started.len(),
            "Fan-out finished"
        );

        report
    }
}
