use tokio::task::JoinHandle;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, error, warn};

/// Tracks the engine's long-running background tasks (aggregation cadences,
/// the price monitor) so they can be health-checked and joined on shutdown.
pub struct TaskSupervisor {
    tasks: HashMap<String, JoinHandle<()>>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        TaskSupervisor {
            tasks: HashMap::new(),
        }
    }

    /// Register an already spawned task. A previous task under the same name
    /// is aborted.
    pub fn register(&mut self, name: impl Into<String>, handle: JoinHandle<()>) -> &mut Self {
        let name = name.into();
        info!("Supervising background task: {}", name);
        if let Some(previous) = self.tasks.insert(name.clone(), handle) {
            warn!("Replacing supervised task {}", name);
            previous.abort();
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.get(name).is_some_and(|h| !h.is_finished())
    }

    /// Names of tasks that terminated on their own. They are dropped from
    /// tracking.
    pub fn reap_finished(&mut self) -> Vec<String> {
        let finished: Vec<String> = self.tasks.iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();

        for name in &finished {
            self.tasks.remove(name);
            warn!("Background task {} terminated", name);
        }

        finished
    }

    pub fn active_task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every task to finish after shutdown has been signalled.
    /// Tasks still running after `grace` are aborted.
    pub async fn join_all(&mut self, grace: Duration) {
        info!("Waiting for {} background tasks", self.tasks.len());

        let deadline = tokio::time::Instant::now() + grace;
        for (name, mut handle) in self.tasks.drain() {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => info!("Task {} completed", name),
                Ok(Err(e)) => error!("Task {} failed: {}", name, e),
                Err(_) => {
                    handle.abort();
                    warn!("Aborted task {} after grace period", name);
                }
            }
        }
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reaps_tasks_that_exit() {
        let mut supervisor = TaskSupervisor::new();
        supervisor.register("quick", tokio::spawn(async {}));
        supervisor.register("slow", tokio::spawn(tokio::time::sleep(Duration::from_secs(60))));

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(supervisor.reap_finished(), vec!["quick".to_string()]);
        assert!(supervisor.contains("slow"));
        assert_eq!(supervisor.active_task_count(), 1);

        supervisor.join_all(Duration::from_millis(10)).await;
        assert_eq!(supervisor.active_task_count(), 0);
    }
}
