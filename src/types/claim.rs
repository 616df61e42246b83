// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::CLAIM_FINALIZER;
use crate::types::Condition;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A request for a bucket (and credentials to it) on a storage cluster
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "stowage.io", version = "v1alpha1", kind = "BucketClaim")]
#[kube(namespaced)]
#[kube(status = "BucketClaimStatus")]
#[kube(shortname = "bc")]
#[kube(
    printcolumn = r#"{"name":"Bucket","type":"string","jsonPath":".spec.bucketName"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BucketClaimSpec {
    /// Bucket to provision; the claim name is used when empty
    #[serde(default)]
    pub bucket_name: String,
    pub cluster_ref: ClusterRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<Quota>,
    #[serde(default)]
    pub versioning_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_lock: Option<ObjectLock>,
    #[serde(default)]
    pub secret: SecretConfig,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRef {
    pub name: String,
    /// Defaults to the claim's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quota {
    pub size: u64,
    pub unit: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLock {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ObjectLockMode>,
    /// Default retention, e.g. `30d` or `1y`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectLockMode {
    Governance,
    Compliance,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Defaults to `<claim>-credentials`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Default for SecretConfig {
    fn default() -> Self {
        SecretConfig {
            enabled: true,
            name: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
pub enum DeletionPolicy {
    /// Remove the bucket and its contents when the claim is deleted
    Delete,
    /// Leave the bucket intact
    #[default]
    Retain,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketClaimStatus {
    #[serde(default)]
    pub phase: ClaimPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_info: Option<BucketInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_info: Option<SecretInfo>,
}

impl BucketClaimStatus {
    /// Compare everything but timestamps, so re-verification doesn't rewrite an unchanged status
    pub fn same_state(&self, other: &BucketClaimStatus) -> bool {
        self.phase == other.phase
            && self.message == other.message
            && self.bucket_info == other.bucket_info
            && self.secret_info == other.secret_info
            && self.conditions.len() == other.conditions.len()
            && self
                .conditions
                .iter()
                .zip(other.conditions.iter())
                .all(|(a, b)| a.same_state(b))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
pub enum ClaimPhase {
    #[default]
    Pending,
    Creating,
    Ready,
    Failed,
}

impl fmt::Display for ClaimPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClaimPhase::Pending => "Pending",
            ClaimPhase::Creating => "Creating",
            ClaimPhase::Ready => "Ready",
            ClaimPhase::Failed => "Failed",
        };
        f.write_str(s)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    pub name: String,
    pub endpoint: String,
    pub region: String,
    pub versioning: bool,
    pub object_lock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretInfo {
    pub name: String,
    pub access_key_id: String,
    pub identity: String,
}

/// Whether a claim is live or waiting on cleanup before deletion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Terminating,
}

impl BucketClaim {
    pub fn bucket_name(&self) -> String {
        if self.spec.bucket_name.is_empty() {
            self.name_any()
        } else {
            self.spec.bucket_name.clone()
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.metadata.deletion_timestamp.is_some() {
            Lifecycle::Terminating
        } else {
            Lifecycle::Active
        }
    }

    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == CLAIM_FINALIZER)
    }

    pub fn phase(&self) -> ClaimPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// Namespace of the referenced storage cluster
    pub fn cluster_namespace(&self) -> String {
        self.spec
            .cluster_ref
            .namespace
            .clone()
            .or_else(|| self.namespace())
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn secret_name(&self) -> String {
        self.spec
            .secret
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{}-credentials", self.name_any()))
    }

    /// Deterministic downstream identity provisioned for this claim.
    /// Namespaces cannot contain dots, so `<namespace>.<bucket>` is unambiguous.
    pub fn identity_name(&self) -> String {
        format!(
            "{}.{}",
            self.namespace().unwrap_or_else(|| "default".to_string()),
            self.bucket_name()
        )
    }
}
