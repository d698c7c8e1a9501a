//! Status condition
//!
//! Kubernetes-style condition used by the ClusterRegistration status.
//! The registration status only ever carries a single `Ready` condition,
//! replaced on every judgment.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type reported by the controller
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Reason used when the cluster is usable
pub const REASON_AVAILABLE: &str = "Available";

/// Reason used when the cluster is not usable
pub const REASON_UNAVAILABLE: &str = "Unavailable";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: String,

    /// Condition status
    pub status: ConditionStatus,

    /// Machine-readable reason
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Last time the condition transitioned
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    /// Condition holds
    True,
    /// Condition does not hold
    False,
    /// Condition cannot be determined
    #[default]
    Unknown,
}

impl Condition {
    /// Ready=True / Available with the given message.
    pub fn available(message: impl Into<String>) -> Self {
        Self {
            type_: CONDITION_TYPE_READY.to_string(),
            status: ConditionStatus::True,
            reason: REASON_AVAILABLE.to_string(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// Ready=False / Unavailable with the given message.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            type_: CONDITION_TYPE_READY.to_string(),
            status: ConditionStatus::False,
            reason: REASON_UNAVAILABLE.to_string(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// Keeps `previous`'s transition time if the status did not change.
    #[must_use]
    pub fn carry_transition_time(mut self, previous: Option<&Condition>) -> Self {
        if let Some(prev) = previous {
            if prev.type_ == self.type_ && prev.status == self.status {
                self.last_transition_time = prev.last_transition_time;
            }
        }
        self
    }
}
