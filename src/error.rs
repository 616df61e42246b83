// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::admin::AdminError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StowageError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("{op} failed: {source}")]
    AdminError {
        op: String,
        #[source]
        source: AdminError,
    },

    #[error("Storage cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Cluster not ready: {0}")]
    ClusterNotReady(String),

    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Merge failed: {0}")]
    MergeError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl StowageError {
    /// True for Kubernetes API errors carrying the given HTTP status code
    pub fn is_api_code(&self, code: u16) -> bool {
        matches!(self, StowageError::KubeError(kube::Error::Api(err)) if err.code == code)
    }
}

pub type Result<T> = std::result::Result<T, StowageError>;

/// Attach operation context to downstream admin failures
pub trait AdminContext<T> {
    fn during(self, op: impl Into<String>) -> Result<T>;
}

impl<T> AdminContext<T> for std::result::Result<T, AdminError> {
    fn during(self, op: impl Into<String>) -> Result<T> {
        self.map_err(|source| StowageError::AdminError {
            op: op.into(),
            source,
        })
    }
}
