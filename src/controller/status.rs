//! Status management utilities.
//!
//! Provides helpers for building and updating FenceAgentsRemediation status
//! conditions.

use crate::crd::{Condition, ConditionType, FenceAgentsRemediationStatus};

/// Builder for managing conditions list
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
}

impl ConditionBuilder {
    /// Create a new condition builder
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Start from the conditions already on the object.
    pub fn from_existing(conditions: &[Condition]) -> Self {
        Self {
            conditions: conditions.to_vec(),
        }
    }

    /// Add or update a condition.
    ///
    /// The transition time is kept when the status does not change.
    pub fn set(&mut self, mut condition: Condition) -> &mut Self {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = condition;
        } else {
            self.conditions.push(condition);
        }
        self
    }

    /// Set Processing condition
    pub fn processing(
        &mut self,
        processing: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::processing(processing, reason, message, generation))
    }

    /// Set FenceAgentActionSucceeded condition
    pub fn fence_agent_action_succeeded(
        &mut self,
        succeeded: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::fence_agent_action_succeeded(
            succeeded, reason, message, generation,
        ))
    }

    /// Set Succeeded condition
    pub fn succeeded(
        &mut self,
        succeeded: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::succeeded(succeeded, reason, message, generation))
    }

    /// Build the conditions list
    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }

    /// Build a full status stamped with the current time.
    pub fn build_status(self) -> FenceAgentsRemediationStatus {
        FenceAgentsRemediationStatus {
            conditions: self.conditions,
            last_update_time: Some(jiff::Timestamp::now().to_string()),
        }
    }
}

impl Default for ConditionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if a condition type is true
pub fn is_condition_true(conditions: &[Condition], condition_type: ConditionType) -> bool {
    let condition_type = condition_type.to_string();
    conditions
        .iter()
        .find(|c| c.r#type == condition_type)
        .is_some_and(|c| c.status == "True")
}

/// Get the reason for a condition
pub fn get_condition_reason(
    conditions: &[Condition],
    condition_type: ConditionType,
) -> Option<&str> {
    let condition_type = condition_type.to_string();
    conditions
        .iter()
        .find(|c| c.r#type == condition_type)
        .map(|c| c.reason.as_str())
}
