use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::pipeline::{Stage, StageResult};
use crate::store::types::WorkItem;

/// How long the delay stage holds each item.
#[derive(Clone)]
pub enum WaitPolicy {
    Fixed(Duration),
    PerItem(Arc<dyn Fn(&WorkItem) -> Duration + Send + Sync>),
}

impl WaitPolicy {
    pub fn per_item<F>(f: F) -> Self
    where
        F: Fn(&WorkItem) -> Duration + Send + Sync + 'static,
    {
        WaitPolicy::PerItem(Arc::new(f))
    }

    pub fn wait_for(&self, item: &WorkItem) -> Duration {
        match self {
            WaitPolicy::Fixed(d) => *d,
            WaitPolicy::PerItem(f) => f(item),
        }
    }
}

impl std::fmt::Debug for WaitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitPolicy::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            WaitPolicy::PerItem(_) => f.write_str("PerItem(..)"),
        }
    }
}

/// Suspends the issuing item only. Other items keep running.
#[derive(Debug, Clone)]
pub struct DelayStage {
    policy: WaitPolicy,
}

impl DelayStage {
    pub fn new(policy: WaitPolicy) -> Self {
        Self { policy }
    }

    pub fn fixed(wait: Duration) -> Self {
        Self::new(WaitPolicy::Fixed(wait))
    }
}

#[async_trait]
impl Stage for DelayStage {
    fn name(&self) -> &str {
        "delay"
    }

    async fn run(&self, item: &WorkItem, input: Value) -> StageResult {
        let wait = self.policy.wait_for(item);
        if !wait.is_zero() {
            tracing::debug!(index = item.index, wait_ms = wait.as_millis() as u64, "Delaying item");
            tokio::time::sleep(wait).await;
        }
        Ok(input)
    }
}
