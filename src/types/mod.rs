// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resource definitions served by the operator.

pub mod claim;
pub mod cluster;

pub use claim::{BucketClaim, BucketClaimSpec, BucketClaimStatus, ClaimPhase, DeletionPolicy};
pub use cluster::{StorageCluster, StorageClusterSpec, StorageClusterStatus};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(condition_type: &str, status: bool, reason: &str, message: &str) -> Self {
        Condition {
            condition_type: condition_type.to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            last_transition_time: Some(now_rfc3339()),
        }
    }

    pub fn is_true(&self, condition_type: &str) -> bool {
        self.condition_type == condition_type && self.status == "True"
    }

    /// Same type, status, reason and message; transition time is ignored
    pub fn same_state(&self, other: &Condition) -> bool {
        self.condition_type == other.condition_type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Replace or append a condition, keeping the previous transition time if the status didn't flip
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions
        .iter_mut()
        .find(|c| c.condition_type == condition.condition_type)
    {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = condition;
        }
        None => conditions.push(condition),
    }
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_condition_appends_new_type() {
        let mut conditions = vec![];
        set_condition(&mut conditions, Condition::new("Ready", true, "Ok", "done"));
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_set_condition_keeps_transition_time_when_status_unchanged() {
        let mut first = Condition::new("Ready", true, "Ok", "done");
        first.last_transition_time = Some("2026-01-01T00:00:00Z".to_string());
        let mut conditions = vec![first];

        set_condition(&mut conditions, Condition::new("Ready", true, "Ok", "still done"));

        assert_eq!(conditions.len(), 1);
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
        assert_eq!(conditions[0].message.as_deref(), Some("still done"));
    }

    #[test]
    fn test_set_condition_updates_transition_time_on_flip() {
        let mut first = Condition::new("Ready", true, "Ok", "done");
        first.last_transition_time = Some("2026-01-01T00:00:00Z".to_string());
        let mut conditions = vec![first];

        set_condition(&mut conditions, Condition::new("Ready", false, "Broken", "oops"));

        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
        assert_eq!(conditions[0].status, "False");
    }
}
