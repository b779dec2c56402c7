use std::collections::HashMap;
use std::time::Duration;
use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use crate::dispatch::ActionDispatcher;
use crate::scheduler::expression::parse_schedule;
use crate::triggers::{Trigger, TriggerRegistry};
use crate::types::ids::TriggerId;

struct ScheduledEntry {
    schedule: Schedule,
    expression: String,
    created_at: DateTime<Utc>,
    next: Option<DateTime<Utc>>,
}

/// Tracks the next due instant of every schedule trigger. A trigger seen for
/// the first time is armed for its next instant after `now`; missed
/// intervals are never replayed.
#[derive(Default)]
pub struct CronEvaluator {
    entries: HashMap<TriggerId, ScheduledEntry>,
}

impl CronEvaluator {
    pub fn new() -> Self {
        CronEvaluator::default()
    }

    /// Returns the triggers due at `now` and re-arms them.
    pub fn evaluate(&mut self, triggers: &[Trigger], now: DateTime<Utc>) -> Vec<Trigger> {
        // Forget triggers deleted since the last pass
        self.entries.retain(|id, _| triggers.iter().any(|t| &t.id == id));

        let mut due = Vec::new();

        for trigger in triggers {
            let Some(expression) = trigger.schedule_expression() else {
                continue;
            };

            // A delete-then-recreate under the same id carries a new creation time
            let known = self.entries.get(&trigger.id)
                .is_some_and(|e| e.created_at == trigger.created_at && e.expression == expression);

            if !known {
                match parse_schedule(expression) {
                    Ok(schedule) => {
                        let next = schedule.after(&now).next();
                        self.entries.insert(trigger.id.clone(), ScheduledEntry {
                            schedule,
                            expression: expression.to_string(),
                            created_at: trigger.created_at,
                            next,
                        });
                    }
                    Err(e) => {
                        tracing::error!("Skipping trigger {}: {}", trigger.id, e);
                    }
                }
                continue;
            }

            let Some(entry) = self.entries.get_mut(&trigger.id) else {
                continue;
            };

            if entry.next.is_some_and(|next| next <= now) {
                due.push(trigger.clone());
                entry.next = entry.schedule.after(&now).next();
            }
        }

        due
    }

    pub fn next_fire(&self, id: &TriggerId) -> Option<DateTime<Utc>> {
        self.entries.get(id).and_then(|e| e.next)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum RunnerState {
    Stopped,
    Running {
        shutdown: watch::Sender<bool>,
        handle: JoinHandle<()>,
    },
}

/// Stopped -> Running -> Stopped. While running, a timer task evaluates all
/// schedule triggers every tick and hands due ones to the dispatcher.
pub struct ScheduleRunner {
    registry: TriggerRegistry,
    dispatcher: ActionDispatcher,
    tick: Duration,
    state: Mutex<RunnerState>,
}

impl ScheduleRunner {
    pub fn new(registry: TriggerRegistry, dispatcher: ActionDispatcher, tick: Duration) -> Self {
        ScheduleRunner {
            registry,
            dispatcher,
            tick,
            state: Mutex::new(RunnerState::Stopped),
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, RunnerState::Running { .. })
    }

    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, RunnerState::Running { .. }) {
            tracing::warn!("Schedule runner already running");
            return;
        }

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(run_timer(
            self.registry.clone(),
            self.dispatcher.clone(),
            self.tick,
            rx,
        ));

        *state = RunnerState::Running { shutdown, handle };
        tracing::info!("Schedule runner started (tick {:?})", self.tick);
    }

    /// Stops accepting new matches and waits until every match already found
    /// has been handed to the dispatcher. In-flight actions are not awaited.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let RunnerState::Running { shutdown, handle } =
            std::mem::replace(&mut *state, RunnerState::Stopped)
        else {
            return;
        };

        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            tracing::error!("Schedule runner task failed: {}", e);
        }
        tracing::info!("Schedule runner stopped");
    }
}

async fn run_timer(
    registry: TriggerRegistry,
    dispatcher: ActionDispatcher,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut evaluator = CronEvaluator::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        let triggers = registry.schedule_triggers().await;
        let due = evaluator.evaluate(&triggers, Utc::now());

        for trigger in &due {
            tracing::info!("Schedule trigger {} due", trigger.id);
            dispatcher.dispatch(trigger);
        }
    }
}
