// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Downstream administrative API: wire types and the client seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("admin API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid admin endpoint: {0}")]
    InvalidEndpoint(String),
}

impl AdminError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AdminError::NotFound(_))
    }
}

/// Address and root credentials of a cluster's administrative endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct AdminEndpoint {
    pub url: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl AdminEndpoint {
    /// Identity of the endpoint in the connection cache. Rotated credentials get a fresh handle.
    pub fn cache_key(&self) -> String {
        format!("{}#{}", self.url, self.access_key)
    }
}

impl fmt::Debug for AdminEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminEndpoint")
            .field("url", &self.url)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Entry of the bucket listing
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
}

/// Canonical bucket metadata as reported by the downstream system
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BucketDetails {
    pub name: String,
    #[serde(default)]
    pub versioning: bool,
    #[serde(default)]
    pub object_lock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateBucketRequest {
    pub name: String,
    pub versioning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_lock: Option<ObjectLockConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLockConfig {
    /// `GOVERNANCE` or `COMPLIANCE`
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<Retention>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Retention {
    Days(u32),
    Years(u32),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketAction {
    Read,
    Write,
    List,
    Tagging,
    Admin,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatement {
    pub actions: Vec<BucketAction>,
    pub bucket: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPolicy {
    pub statements: Vec<PolicyStatement>,
}

impl IdentityPolicy {
    /// Full access to a single bucket and nothing else
    pub fn bucket_scoped(bucket: &str) -> Self {
        IdentityPolicy {
            statements: vec![PolicyStatement {
                actions: vec![
                    BucketAction::Read,
                    BucketAction::Write,
                    BucketAction::List,
                    BucketAction::Tagging,
                    BucketAction::Admin,
                ],
                bucket: bucket.to_string(),
            }],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub name: String,
    #[serde(default)]
    pub access_keys: Vec<String>,
    #[serde(default)]
    pub policy: IdentityPolicy,
}

#[derive(Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessKey {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Bucket and identity management on a storage cluster
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<Bucket>, AdminError>;

    async fn create_bucket(&self, request: &CreateBucketRequest) -> Result<(), AdminError>;

    async fn bucket_info(&self, name: &str) -> Result<BucketDetails, AdminError>;

    /// Removes the bucket and everything in it
    async fn delete_bucket(&self, name: &str) -> Result<(), AdminError>;

    /// `Ok(None)` when no identity exists under that name
    async fn get_identity(&self, name: &str) -> Result<Option<Identity>, AdminError>;

    /// Creates the identity and returns its first access key
    async fn create_identity(
        &self,
        name: &str,
        policy: &IdentityPolicy,
    ) -> Result<AccessKey, AdminError>;

    async fn update_identity(&self, name: &str, policy: &IdentityPolicy) -> Result<(), AdminError>;

    /// Removes the identity together with all of its access keys
    async fn delete_identity(&self, name: &str) -> Result<(), AdminError>;

    async fn create_access_key(&self, identity: &str) -> Result<AccessKey, AdminError>;
}

/// Builds admin handles for an endpoint; invoked by the connection cache on a miss
pub trait AdminConnector: Send + Sync {
    fn connect(&self, endpoint: &AdminEndpoint) -> Result<Arc<dyn AdminApi>, AdminError>;
}
