pub mod result;
pub mod settings;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::Result;
use crate::fanout::{FanOutReport, FanOutScheduler};
use crate::invoke::{HttpInvoker, Invoker};
use crate::pipeline::{DelayStage, InvokeStage, InvokeTarget, PassStage, StagePipeline, WaitPolicy};
use crate::run::settings::duration_from_secs;
use crate::store::types::RunKey;
use crate::store::{FileStore, ItemStore};

pub use result::{RunErrorKind, RunFailure, RunPhase, RunResult, RunStatus};
pub use settings::RunSettings;

/// Drives runs end to end: fetch the list, fan out, enforce the deadline.
pub struct RunController {
    store: Arc<dyn ItemStore>,
    target: InvokeTarget,
    pass: PassStage,
    wait_policy: Option<WaitPolicy>,
    invoke_timeout: Option<Duration>,
}

impl RunController {
    pub fn new(store: Arc<dyn ItemStore>, target: impl Into<InvokeTarget>) -> Self {
        Self {
            store,
            target: target.into(),
            pass: PassStage::new(),
            wait_policy: None,
            invoke_timeout: None,
        }
    }

    /// Table-file store and HTTP invoker as described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let request_timeout = config
            .invoke
            .request_timeout_secs
            .map(|s| duration_from_secs("invoke.request_timeout_secs", s))
            .transpose()?;
        let invoker: Arc<dyn Invoker> =
            Arc::new(HttpInvoker::new(config.invoke_url()?, request_timeout)?);
        let store: Arc<dyn ItemStore> = Arc::new(FileStore::new(&config.store));

        let pass = match &config.pipeline.input_pointer {
            Some(pointer) => PassStage::with_input_pointer(pointer.clone()),
            None => PassStage::new(),
        };
        let invoke_timeout = config
            .pipeline
            .invoke_timeout_secs
            .map(|s| duration_from_secs("pipeline.invoke_timeout_secs", s))
            .transpose()?;

        Ok(Self::new(store, invoker)
            .with_pass_stage(pass)
            .with_invoke_timeout(invoke_timeout))
    }

    pub fn with_pass_stage(mut self, pass: PassStage) -> Self {
        self.pass = pass;
        self
    }

    /// Per-item waits. Replaces the fixed wait from `RunSettings`.
    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = Some(policy);
        self
    }

    pub fn with_invoke_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    fn pipeline(&self, settings: &RunSettings) -> StagePipeline {
        let wait = self
            .wait_policy
            .clone()
            .unwrap_or(WaitPolicy::Fixed(settings.wait));
        StagePipeline::standard(
            self.pass.clone(),
            DelayStage::new(wait),
            InvokeStage::new(self.target.clone()),
            self.invoke_timeout,
        )
    }

    /// Execute one run. Always yields a definitive result.
    ///
    /// The deadline covers the fetch as well as the fan-out. When it fires,
    /// in-flight items are abandoned and finished outcomes are kept.
    pub async fn execute(&self, run_key: RunKey, settings: &RunSettings) -> RunResult {
        let mut run = RunTracker::start(run_key);
        let cancel = CancellationToken::new();

        tracing::info!(
            run_id = %run.id,
            run_key = %run.key,
            concurrency = %settings.concurrency,
            wait_ms = settings.wait.as_millis() as u64,
            timeout_ms = settings.total_timeout.as_millis() as u64,
            "Run started"
        );

        let deadline = {
            let cancel = cancel.clone();
            let timeout = settings.total_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            fetched = self.store.get(&run.key) => Some(fetched),
        };

        let result = match fetched {
            None => run.finish_timed_out(settings, 0, FanOutReport::default()),
            Some(Err(e)) => {
                tracing::error!(
                    run_id = %run.id,
                    run_key = %run.key,
                    error = %e,
                    "Failed to fetch item list"
                );
                run.finish_failed(e.to_string())
            }
            Some(Ok(items)) => {
                run.advance(RunPhase::Running);
                let scheduler = FanOutScheduler::new(self.pipeline(settings));
                let report = scheduler
                    .run_all(&items, settings.concurrency, &cancel)
                    .await;

                if report.is_complete() {
                    run.finish_completed(items.len(), report)
                } else {
                    run.finish_timed_out(settings, items.len(), report)
                }
            }
        };

        deadline.abort();

        tracing::info!(
            run_id = %result.run_id,
            run_key = %result.run_key,
            status = ?result.status,
            succeeded = result.succeeded(),
            failed = result.failed(),
            abandoned = result.abandoned.len(),
            not_started = result.not_started.len(),
            "Run finished"
        );

        result
    }
}

/// Identity, start time and phase of the run in progress.
struct RunTracker {
    id: Uuid,
    key: RunKey,
    phase: RunPhase,
    started_at: chrono::DateTime<Utc>,
}

impl RunTracker {
    fn start(key: RunKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            phase: RunPhase::Fetching,
            started_at: Utc::now(),
        }
    }

    fn advance(&mut self, next: RunPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal run transition {:?} -> {next:?}",
            self.phase
        );
        tracing::debug!(run_id = %self.id, from = ?self.phase, to = ?next, "Run phase");
        self.phase = next;
    }

    fn finish(
        mut self,
        status: RunStatus,
        error: Option<RunFailure>,
        item_count: usize,
        report: FanOutReport,
    ) -> RunResult {
        self.advance(RunPhase::Done(status));
        RunResult {
            run_id: self.id,
            run_key: self.key,
            status,
            error,
            item_count,
            outcomes: report.outcomes,
            abandoned: report.abandoned,
            not_started: report.not_started,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }

    fn finish_completed(self, item_count: usize, report: FanOutReport) -> RunResult {
        self.finish(RunStatus::Completed, None, item_count, report)
    }

    fn finish_failed(self, message: String) -> RunResult {
        let failure = RunFailure {
            kind: RunErrorKind::StoreError,
            message,
        };
        self.finish(RunStatus::Failed, Some(failure), 0, FanOutReport::default())
    }

    fn finish_timed_out(
        self,
        settings: &RunSettings,
        item_count: usize,
        report: FanOutReport,
    ) -> RunResult {
        let failure = RunFailure {
            kind: RunErrorKind::RunTimeout,
            message: format!(
                "deadline of {}ms exceeded",
                settings.total_timeout.as_millis()
            ),
        };
        self.finish(RunStatus::TimedOut, Some(failure), item_count, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ItemError, StoreError};
    use crate::store::types::ItemList;
    use crate::store::MemoryStore;
    use crate::testing::ScriptedInvoker;
    use async_trait::async_trait;
    use serde_json::json;

    fn key(s: &str) -> RunKey {
        RunKey::new(s).unwrap()
    }

    async fn store_with(k: &str, n: usize) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .put(key(k), (0..n).map(|i| json!({"id": i})).collect())
            .await;
        store
    }

    fn controller(store: Arc<MemoryStore>, invoker: Arc<ScriptedInvoker>) -> RunController {
        RunController::new(store as Arc<dyn ItemStore>, invoker as Arc<dyn Invoker>)
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_items_complete_in_order() {
        let store = store_with("batch", 6).await;
        let invoker = Arc::new(ScriptedInvoker::echo());
        let ctl = controller(store, invoker);

        let settings = RunSettings::new(0, Duration::from_secs(1), Duration::from_secs(60));
        let result = ctl.execute(key("batch"), &settings).await;

        assert_eq!(result.status, RunStatus::Completed);
        assert!(result.error.is_none());
        assert_eq!(result.item_count, 6);
        let indices: Vec<usize> = result.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, (0..6).collect::<Vec<_>>());
        assert_eq!(result.succeeded(), 6);
    }

    #[tokio::test]
    async fn test_empty_list_completes_with_no_outcomes() {
        let store = store_with("empty", 0).await;
        let invoker = Arc::new(ScriptedInvoker::echo());
        let ctl = controller(store, invoker.clone());

        let settings = RunSettings::new(2, Duration::from_secs(1), Duration::from_secs(10));
        let result = ctl.execute(key("empty"), &settings).await;

        assert_eq!(result.status, RunStatus::Completed);
        assert!(result.outcomes.is_empty());
        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_fails_with_store_error() {
        let store = store_with("batch", 3).await;
        let invoker = Arc::new(ScriptedInvoker::echo());
        let ctl = controller(store, invoker.clone());

        let settings = RunSettings::new(2, Duration::ZERO, Duration::from_secs(10));
        let result = ctl.execute(key("absent"), &settings).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.outcomes.is_empty());
        let error = result.error.unwrap();
        assert_eq!(error.kind, RunErrorKind::StoreError);
        assert!(error.message.contains("absent"));
        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_run() {
        let store = store_with("batch", 3).await;
        store.fail_with(Some("connection reset".into())).await;
        let ctl = controller(store, Arc::new(ScriptedInvoker::echo()));

        let settings = RunSettings::new(2, Duration::ZERO, Duration::from_secs(10));
        let result = ctl.execute(key("batch"), &settings).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(
            result.error.map(|e| e.message),
            Some(StoreError::Unavailable("connection reset".into()).to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failing_item_still_completes() {
        let store = store_with("batch", 5).await;
        let invoker = Arc::new(ScriptedInvoker::failing_on(|v| v == &json!({"id": 3})));
        let ctl = controller(store, invoker.clone());

        let settings = RunSettings::new(2, Duration::from_secs(1), Duration::from_secs(60));
        let result = ctl.execute(key("batch"), &settings).await;

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.outcomes.len(), 5);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.succeeded(), 4);
        assert_eq!(
            result.outcomes[3].error().map(ItemError::kind),
            Some("InvokeError")
        );
        assert_eq!(invoker.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_shorter_than_wait_records_nothing() {
        let store = store_with("batch", 3).await;
        let invoker = Arc::new(ScriptedInvoker::echo());
        let ctl = controller(store, invoker.clone());

        let settings = RunSettings::new(0, Duration::from_secs(5), Duration::from_secs(1));
        let result = ctl.execute(key("batch"), &settings).await;

        assert_eq!(result.status, RunStatus::TimedOut);
        assert!(result.outcomes.is_empty());
        assert_eq!(result.abandoned, vec![0, 1, 2]);
        assert_eq!(result.item_count, 3);
        assert_eq!(
            result.error.map(|e| e.kind),
            Some(RunErrorKind::RunTimeout)
        );
        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_mid_run_keeps_finished_outcomes() {
        // 6 items, 2 at a time, 1s wait + 0.5s invoke: waves finish at 1.5s, 3s, 4.5s.
        let store = store_with("batch", 6).await;
        let invoker = Arc::new(ScriptedInvoker::echo().with_latency(Duration::from_millis(500)));
        let ctl = controller(store, invoker);

        let settings = RunSettings::new(2, Duration::from_secs(1), Duration::from_secs(2));
        let result = ctl.execute(key("batch"), &settings).await;

        assert_eq!(result.status, RunStatus::TimedOut);
        let finished: Vec<usize> = result.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(finished, vec![0, 1]);
        assert_eq!(result.abandoned, vec![2, 3]);
        assert_eq!(result.not_started, vec![4, 5]);
        assert!(result.outcomes.len() < result.item_count);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_policy_override() {
        let store = store_with("batch", 2).await;
        let ctl = controller(store, Arc::new(ScriptedInvoker::echo()))
            .with_wait_policy(WaitPolicy::per_item(|item| {
                Duration::from_secs(if item.index == 0 { 1 } else { 30 })
            }));

        let settings = RunSettings::new(0, Duration::ZERO, Duration::from_secs(10));
        let result = ctl.execute(key("batch"), &settings).await;

        assert_eq!(result.status, RunStatus::TimedOut);
        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(result.abandoned, vec![1]);
    }

    struct StalledStore;

    #[async_trait]
    impl ItemStore for StalledStore {
        async fn get(&self, _key: &RunKey) -> std::result::Result<ItemList, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ItemList::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_covers_fetch() {
        let ctl = RunController::new(
            Arc::new(StalledStore),
            Arc::new(ScriptedInvoker::echo()) as Arc<dyn Invoker>,
        );

        let settings = RunSettings::new(2, Duration::ZERO, Duration::from_secs(5));
        let result = ctl.execute(key("batch"), &settings).await;

        assert_eq!(result.status, RunStatus::TimedOut);
        assert_eq!(result.item_count, 0);
        assert!(result.outcomes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_serializes_status_and_outcomes() {
        let store = store_with("batch", 1).await;
        let ctl = controller(store, Arc::new(ScriptedInvoker::echo()));

        let settings = RunSettings::new(1, Duration::ZERO, Duration::from_secs(5));
        let result = ctl.execute(key("batch"), &settings).await;
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["status"], "Completed");
        assert_eq!(json["run_key"], "batch");
        assert!(json.get("error").is_none());
        assert_eq!(json["outcomes"][0]["status"], "succeeded");
        assert_eq!(json["outcomes"][0]["output"], json!({"echo": {"id": 0}}));
    }
}
