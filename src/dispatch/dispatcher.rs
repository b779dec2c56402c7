use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::Instrument;
use crate::config::DispatchConfig;
use crate::error::Error;
use crate::interfaces::function_executor::FunctionExecutor;
use crate::observability::metrics::{DISPATCH_OUTCOMES, TRIGGERS_FIRED};
use crate::observability::tracing::trace_dispatch;
use crate::triggers::{Parameters, Trigger};
use crate::types::ids::{FunctionId, TriggerId};

#[derive(Debug)]
struct DispatchJob {
    trigger_id: TriggerId,
    function_id: FunctionId,
    parameters: Parameters,
}

/// Detached action execution. `dispatch` only enqueues; a worker loop runs
/// each job on its own task, at most `worker_count` at a time. Outcomes are
/// observable through logs and metrics only.
#[derive(Clone)]
pub struct ActionDispatcher {
    queue: mpsc::Sender<DispatchJob>,
}

impl ActionDispatcher {
    /// Must be called from within a tokio runtime.
    pub fn spawn(executor: Arc<dyn FunctionExecutor>, config: &DispatchConfig) -> Self {
        let (queue, rx) = mpsc::channel(config.queue_capacity);
        let workers = Arc::new(Semaphore::new(config.worker_count));

        tokio::spawn(run_workers(rx, executor, workers, config.execution_timeout()));

        ActionDispatcher { queue }
    }

    /// Enqueues the trigger's function without waiting. Returns `false` when
    /// the job could not be queued; the drop is logged and counted.
    pub fn dispatch(&self, trigger: &Trigger) -> bool {
        let job = DispatchJob {
            trigger_id: trigger.id.clone(),
            function_id: trigger.function_id.clone(),
            parameters: trigger.parameters.clone(),
        };

        match self.queue.try_send(job) {
            Ok(()) => {
                TRIGGERS_FIRED.with_label_values(&[trigger.kind.label()]).inc();
                true
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::error!("{} for trigger {}, action dropped", Error::DispatchQueueFull, job.trigger_id);
                DISPATCH_OUTCOMES.with_label_values(&["dropped"]).inc();
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::error!("Dispatcher stopped, action for trigger {} dropped", job.trigger_id);
                DISPATCH_OUTCOMES.with_label_values(&["dropped"]).inc();
                false
            }
        }
    }
}

async fn run_workers(
    mut rx: mpsc::Receiver<DispatchJob>,
    executor: Arc<dyn FunctionExecutor>,
    workers: Arc<Semaphore>,
    execution_timeout: Duration,
) {
    while let Some(job) = rx.recv().await {
        let Ok(permit) = workers.clone().acquire_owned().await else {
            break;
        };
        let executor = executor.clone();
        let span = trace_dispatch(&job.trigger_id, &job.function_id);

        tokio::spawn(
            async move {
                let _permit = permit;
                execute_job(executor.as_ref(), &job, execution_timeout).await;
            }
            .instrument(span),
        );
    }

    tracing::debug!("Dispatch queue closed");
}

/// Executes once. Failures are logged and never retried here.
async fn execute_job(executor: &dyn FunctionExecutor, job: &DispatchJob, execution_timeout: Duration) {
    let result = tokio::time::timeout(
        execution_timeout,
        executor.execute(&job.function_id, &job.parameters),
    ).await;

    match result {
        Ok(Ok(output)) => {
            tracing::info!("Function {} for trigger {} succeeded", job.function_id, job.trigger_id);
            tracing::debug!("Execution output: {}", output);
            DISPATCH_OUTCOMES.with_label_values(&["success"]).inc();
        }
        Ok(Err(e)) => {
            tracing::error!("Function {} for trigger {} failed: {}", job.function_id, job.trigger_id, e);
            DISPATCH_OUTCOMES.with_label_values(&["failure"]).inc();
        }
        Err(_) => {
            let e = Error::ExecutionTimeout { timeout_ms: execution_timeout.as_millis() as u64 };
            tracing::error!("Function {} for trigger {}: {}", job.function_id, job.trigger_id, e);
            DISPATCH_OUTCOMES.with_label_values(&["timeout"]).inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::function_executor::MockFunctionExecutor;
    use crate::triggers::TriggerRequest;
    use serde_json::json;
    use tokio::sync::Notify;

    fn trigger() -> Trigger {
        let mut params = Parameters::new();
        params.insert("amount".to_string(), json!(7));
        Trigger::try_from(
            TriggerRequest::schedule("t1", "alice", "* * * * *", "fn-1").with_parameters(params),
        ).unwrap()
    }

    #[tokio::test]
    async fn executes_function_with_trigger_parameters() {
        let done = Arc::new(Notify::new());
        let signal = done.clone();

        let mut executor = MockFunctionExecutor::new();
        executor.expect_execute()
            .withf(|f, p| f.as_str() == "fn-1" && p["amount"] == 7)
            .times(1)
            .returning(move |_, _| {
                signal.notify_one();
                Ok(json!({"ok": true}))
            });

        let dispatcher = ActionDispatcher::spawn(Arc::new(executor), &DispatchConfig::default());
        assert!(dispatcher.dispatch(&trigger()));

        tokio::time::timeout(Duration::from_secs(5), done.notified()).await.unwrap();
    }

    #[tokio::test]
    async fn failures_are_absorbed_and_not_retried() {
        let done = Arc::new(Notify::new());
        let signal = done.clone();

        let mut executor = MockFunctionExecutor::new();
        executor.expect_execute()
            .times(2)
            .returning(move |_, _| {
                signal.notify_one();
                Err(Error::ExecutionFailed("boom".to_string()))
            });

        let dispatcher = ActionDispatcher::spawn(Arc::new(executor), &DispatchConfig::default());
        assert!(dispatcher.dispatch(&trigger()));
        tokio::time::timeout(Duration::from_secs(5), done.notified()).await.unwrap();

        // Dispatcher is still usable after a failure
        assert!(dispatcher.dispatch(&trigger()));
        tokio::time::timeout(Duration::from_secs(5), done.notified()).await.unwrap();
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let config = DispatchConfig {
            queue_capacity: 1,
            worker_count: 1,
            execution_timeout_secs: 60,
        };
        let gate = Arc::new(Notify::new());
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();

        struct Blocking {
            gate: Arc<Notify>,
            started: mpsc::UnboundedSender<()>,
        }

        #[async_trait::async_trait]
        impl FunctionExecutor for Blocking {
            async fn execute(&self, _: &FunctionId, _: &Parameters) -> crate::error::Result<serde_json::Value> {
                let _ = self.started.send(());
                self.gate.notified().await;
                Ok(json!(null))
            }
        }

        let dispatcher = ActionDispatcher::spawn(
            Arc::new(Blocking { gate: gate.clone(), started: started_tx }),
            &config,
        );

        // First job occupies the only worker
        assert!(dispatcher.dispatch(&trigger()));
        started_rx.recv().await.unwrap();

        // Second job is pulled off the queue and waits for a permit, third fills the queue
        assert!(dispatcher.dispatch(&trigger()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(dispatcher.dispatch(&trigger()));

        // Fourth has nowhere to go
        assert!(!dispatcher.dispatch(&trigger()));

        gate.notify_waiters();
    }
}
