pub mod condition;
pub mod registry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::error::{Error, Result};
use crate::scheduler::expression::parse_schedule;
use crate::types::ids::{FunctionId, OwnerId, TriggerId};
use self::condition::PriceAlertCondition;

pub use registry::TriggerRegistry;

/// Arguments forwarded verbatim to the function executor.
pub type Parameters = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Schedule,
    PriceAlert,
}

/// Trigger definition as submitted through the management API.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriggerRequest {
    /// Generated when omitted.
    #[serde(default = "TriggerId::generate")]
    pub id: TriggerId,
    pub owner_id: OwnerId,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    pub function_id: FunctionId,
    #[serde(default)]
    pub parameters: Parameters,
}

impl TriggerRequest {
    pub fn schedule(
        id: impl Into<TriggerId>,
        owner_id: impl Into<OwnerId>,
        expression: &str,
        function_id: impl Into<FunctionId>,
    ) -> Self {
        TriggerRequest {
            id: id.into(),
            owner_id: owner_id.into(),
            trigger_type: TriggerType::Schedule,
            schedule: Some(expression.to_string()),
            condition: None,
            function_id: function_id.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn price_alert(
        id: impl Into<TriggerId>,
        owner_id: impl Into<OwnerId>,
        condition: &str,
        function_id: impl Into<FunctionId>,
    ) -> Self {
        TriggerRequest {
            id: id.into(),
            owner_id: owner_id.into(),
            trigger_type: TriggerType::PriceAlert,
            schedule: None,
            condition: Some(condition.to_string()),
            function_id: function_id.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerKind {
    Schedule { expression: String },
    PriceAlert { condition: PriceAlertCondition },
}

impl TriggerKind {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            TriggerKind::Schedule { .. } => TriggerType::Schedule,
            TriggerKind::PriceAlert { .. } => TriggerType::PriceAlert,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TriggerKind::Schedule { .. } => "schedule",
            TriggerKind::PriceAlert { .. } => "price_alert",
        }
    }
}

/// A validated trigger. Immutable once registered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub owner_id: OwnerId,
    pub kind: TriggerKind,
    pub function_id: FunctionId,
    pub parameters: Parameters,
    pub created_at: DateTime<Utc>,
}

impl Trigger {
    pub fn condition(&self) -> Option<&PriceAlertCondition> {
        match &self.kind {
            TriggerKind::PriceAlert { condition } => Some(condition),
            TriggerKind::Schedule { .. } => None,
        }
    }

    pub fn schedule_expression(&self) -> Option<&str> {
        match &self.kind {
            TriggerKind::Schedule { expression } => Some(expression),
            TriggerKind::PriceAlert { .. } => None,
        }
    }
}

impl TryFrom<TriggerRequest> for Trigger {
    type Error = Error;

    fn try_from(req: TriggerRequest) -> Result<Self> {
        let kind = match req.trigger_type {
            TriggerType::Schedule => {
                let expression = req.schedule.ok_or_else(|| Error::InvalidSchedule {
                    expression: String::new(),
                    reason: "schedule trigger requires an expression".to_string(),
                })?;
                parse_schedule(&expression)?;
                TriggerKind::Schedule { expression }
            }
            TriggerType::PriceAlert => {
                let raw = req.condition.ok_or_else(|| Error::InvalidCondition {
                    condition: String::new(),
                    reason: "price alert requires a condition".to_string(),
                })?;
                TriggerKind::PriceAlert { condition: raw.parse()? }
            }
        };

        Ok(Trigger {
            id: req.id,
            owner_id: req.owner_id,
            kind,
            function_id: req.function_id,
            parameters: req.parameters,
            created_at: Utc::now(),
        })
    }
}
