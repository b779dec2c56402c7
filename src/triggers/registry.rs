use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::error::{Error, Result};
use crate::observability::metrics::REGISTERED_TRIGGERS;
use crate::price_infra::{normalize_symbol, AggregatedPrice};
use crate::triggers::condition::PriceAlertCondition;
use crate::triggers::{Trigger, TriggerKind, TriggerRequest};
use crate::types::ids::{OwnerId, TriggerId};

/// Entry in the per-symbol, per-owner alert index.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceAlert {
    pub trigger_id: TriggerId,
    pub condition: PriceAlertCondition,
}

#[derive(Default)]
struct RegistryState {
    triggers: HashMap<TriggerId, Trigger>,
    // symbol -> owner -> alerts
    alerts: HashMap<String, HashMap<OwnerId, Vec<PriceAlert>>>,
}

impl RegistryState {
    fn index_alert(&mut self, trigger: &Trigger, condition: &PriceAlertCondition) {
        self.alerts
            .entry(condition.symbol.clone())
            .or_default()
            .entry(trigger.owner_id.clone())
            .or_default()
            .push(PriceAlert {
                trigger_id: trigger.id.clone(),
                condition: condition.clone(),
            });
    }

    fn unindex_alert(&mut self, trigger: &Trigger, condition: &PriceAlertCondition) {
        let Some(owners) = self.alerts.get_mut(&condition.symbol) else {
            return;
        };

        if let Some(list) = owners.get_mut(&trigger.owner_id) {
            list.retain(|a| a.trigger_id != trigger.id);
            if list.is_empty() {
                owners.remove(&trigger.owner_id);
            }
        }

        if owners.is_empty() {
            self.alerts.remove(&condition.symbol);
        }
    }
}

/// Trigger store with its price-alert index. Both live under one lock so a
/// reader never sees a trigger without its index entry or the reverse.
#[derive(Clone, Default)]
pub struct TriggerRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        TriggerRegistry::default()
    }

    /// Validates and registers a trigger. Nothing is mutated on error.
    pub async fn create(&self, request: TriggerRequest) -> Result<Trigger> {
        // Validate before taking the write lock
        let trigger = Trigger::try_from(request)?;

        let mut state = self.state.write().await;
        if state.triggers.contains_key(&trigger.id) {
            return Err(Error::DuplicateId(trigger.id));
        }

        if let TriggerKind::PriceAlert { condition } = &trigger.kind {
            state.index_alert(&trigger, condition);
        }
        state.triggers.insert(trigger.id.clone(), trigger.clone());
        REGISTERED_TRIGGERS.set(state.triggers.len() as i64);

        tracing::info!(
            "Registered {} trigger {} for owner {}",
            trigger.kind.label(), trigger.id, trigger.owner_id
        );
        Ok(trigger)
    }

    pub async fn delete(&self, id: &TriggerId) -> Result<Trigger> {
        let mut state = self.state.write().await;

        let trigger = state.triggers.remove(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;

        match &trigger.kind {
            TriggerKind::PriceAlert { condition } => state.unindex_alert(&trigger, condition),
            TriggerKind::Schedule { .. } => {}
        }
        REGISTERED_TRIGGERS.set(state.triggers.len() as i64);

        tracing::info!("Deleted trigger {}", id);
        Ok(trigger)
    }

    pub async fn get(&self, id: &TriggerId) -> Result<Trigger> {
        self.state.read().await
            .triggers
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    pub async fn list(&self) -> Vec<Trigger> {
        let state = self.state.read().await;
        let mut triggers: Vec<Trigger> = state.triggers.values().cloned().collect();
        triggers.sort_by(|a, b| a.id.cmp(&b.id));
        triggers
    }

    pub async fn list_by_owner(&self, owner_id: &OwnerId) -> Vec<Trigger> {
        let state = self.state.read().await;
        let mut triggers: Vec<Trigger> = state.triggers.values()
            .filter(|t| &t.owner_id == owner_id)
            .cloned()
            .collect();
        triggers.sort_by(|a, b| a.id.cmp(&b.id));
        triggers
    }

    pub async fn schedule_triggers(&self) -> Vec<Trigger> {
        let state = self.state.read().await;
        state.triggers.values()
            .filter(|t| matches!(t.kind, TriggerKind::Schedule { .. }))
            .cloned()
            .collect()
    }

    /// Current index bucket for a symbol, keyed by owner.
    pub async fn alerts_for_symbol(&self, symbol: &str) -> HashMap<OwnerId, Vec<PriceAlert>> {
        self.state.read().await
            .alerts
            .get(&normalize_symbol(symbol))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.triggers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Evaluates every indexed alert against `prices` and hands each match
    /// whose trigger is still registered to `on_match`. The read lock is held
    /// for the whole scan, so a `delete` that has returned is never fired.
    pub async fn scan_alerts<F>(&self, prices: &HashMap<String, AggregatedPrice>, mut on_match: F) -> usize
    where
        F: FnMut(&Trigger),
    {
        let state = self.state.read().await;
        let mut fired = 0;

        for (symbol, price) in prices {
            let Some(owners) = state.alerts.get(symbol) else {
                continue;
            };

            for alerts in owners.values() {
                for alert in alerts {
                    if !alert.condition.is_met(price.value) {
                        continue;
                    }
                    match state.triggers.get(&alert.trigger_id) {
                        Some(trigger) => {
                            on_match(trigger);
                            fired += 1;
                        }
                        None => {
                            tracing::warn!("Alert index references missing trigger {}", alert.trigger_id);
                        }
                    }
                }
            }
        }

        fired
    }
}
