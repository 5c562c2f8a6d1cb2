use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ItemError;
use crate::invoke::Invoker;
use crate::pipeline::{Stage, StageResult};
use crate::store::types::WorkItem;

/// Which remote function an item is sent to.
#[derive(Clone)]
pub enum InvokeTarget {
    Fixed(Arc<dyn Invoker>),
    PerItem(Arc<dyn Fn(&WorkItem) -> Arc<dyn Invoker> + Send + Sync>),
}

impl InvokeTarget {
    pub fn per_item<F>(f: F) -> Self
    where
        F: Fn(&WorkItem) -> Arc<dyn Invoker> + Send + Sync + 'static,
    {
        InvokeTarget::PerItem(Arc::new(f))
    }

    pub fn resolve(&self, item: &WorkItem) -> Arc<dyn Invoker> {
        match self {
            InvokeTarget::Fixed(invoker) => Arc::clone(invoker),
            InvokeTarget::PerItem(route) => route(item),
        }
    }
}

impl From<Arc<dyn Invoker>> for InvokeTarget {
    fn from(invoker: Arc<dyn Invoker>) -> Self {
        InvokeTarget::Fixed(invoker)
    }
}

/// Calls the remote function once with the item's current value.
pub struct InvokeStage {
    target: InvokeTarget,
}

impl InvokeStage {
    pub fn new(target: impl Into<InvokeTarget>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl Stage for InvokeStage {
    fn name(&self) -> &str {
        "invoke"
    }

    async fn run(&self, item: &WorkItem, input: Value) -> StageResult {
        let invoker = self.target.resolve(item);
        match invoker.invoke(&input).await {
            Ok(output) => Ok(output),
            Err(e) => {
                tracing::warn!(index = item.index, error = %e, "Invocation failed");
                Err(ItemError::Invoke(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvokeError;
    use crate::testing::ScriptedInvoker;
    use serde_json::json;

    #[tokio::test]
    async fn test_result_becomes_stage_output() {
        let invoker = Arc::new(ScriptedInvoker::echo());
        let stage = InvokeStage::new(invoker.clone() as Arc<dyn Invoker>);
        let item = WorkItem {
            index: 0,
            value: json!("raw"),
        };

        let out = stage.run(&item, json!("shaped")).await.unwrap();
        assert_eq!(out, json!({"echo": "shaped"}));
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_maps_to_invoke_error() {
        let invoker: Arc<dyn Invoker> = Arc::new(ScriptedInvoker::failing_on(|v| v == &json!(2)));
        let stage = InvokeStage::new(invoker);
        let item = WorkItem {
            index: 1,
            value: json!(2),
        };

        let err = stage.run(&item, json!(2)).await.unwrap_err();
        assert!(matches!(err, ItemError::Invoke(InvokeError::Application { .. })));
    }

    #[tokio::test]
    async fn test_per_item_target() {
        let even = Arc::new(ScriptedInvoker::echo());
        let odd = Arc::new(ScriptedInvoker::echo());
        let (e, o) = (even.clone(), odd.clone());
        let stage = InvokeStage::new(InvokeTarget::per_item(move |item| {
            if item.index % 2 == 0 {
                e.clone() as Arc<dyn Invoker>
            } else {
                o.clone() as Arc<dyn Invoker>
            }
        }));

        for index in 0..3 {
            let item = WorkItem {
                index,
                value: json!(index),
            };
            stage.run(&item, item.value.clone()).await.unwrap();
        }
        assert_eq!(even.calls(), 2);
        assert_eq!(odd.calls(), 1);
    }
}
