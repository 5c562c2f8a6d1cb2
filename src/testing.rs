//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::InvokeError;
use crate::invoke::Invoker;
use crate::pipeline::{Stage, StageResult};
use crate::store::types::WorkItem;

type FailWhen = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// Echoes payloads back as `{"echo": payload}`, failing where told to.
pub struct ScriptedInvoker {
    fail_when: FailWhen,
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedInvoker {
    pub fn echo() -> Self {
        Self::failing_on(|_| false)
    }

    pub fn failing_on<F>(fail_when: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            fail_when: Box::new(fail_when),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Invoker for ScriptedInvoker {
    async fn invoke(&self, payload: &Value) -> Result<Value, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if (self.fail_when)(payload) {
            return Err(InvokeError::Application {
                error_type: "Unhandled".into(),
                body: format!("rejected {payload}"),
            });
        }
        Ok(json!({ "echo": payload }))
    }
}

/// Records how many items are inside it at once.
#[derive(Clone, Default)]
pub struct GaugeStage {
    hold: Duration,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl GaugeStage {
    pub fn holding(hold: Duration) -> Self {
        Self {
            hold,
            ..Self::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for GaugeStage {
    fn name(&self) -> &str {
        "gauge"
    }

    async fn run(&self, _item: &WorkItem, input: Value) -> StageResult {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(input)
    }
}
