// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::defaults;
use crate::types::Condition;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

/// A distributed object storage cluster managed by the operator
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "stowage.io", version = "v1alpha1", kind = "StorageCluster")]
#[kube(namespaced)]
#[kube(status = "StorageClusterStatus")]
#[kube(shortname = "sc")]
#[kube(
    printcolumn = r#"{"name":"Ready","type":"integer","jsonPath":".status.readyReplicas"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.adminEndpoint"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StorageClusterSpec {
    pub image: String,
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    #[serde(default = "default_storage_size")]
    pub storage_size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_port: Option<i32>,
    /// Secret holding the root `accesskey`/`secretkey` of the cluster
    pub credentials_secret: String,
}

fn default_replicas() -> i32 {
    4
}

fn default_storage_size() -> String {
    "10Gi".to_string()
}

impl StorageCluster {
    /// Check if this cluster is ready based on its status conditions
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.conditions.iter().any(|c| c.is_true("Ready")))
    }

    pub fn region(&self) -> String {
        self.spec
            .region
            .clone()
            .unwrap_or_else(|| defaults::REGION.to_string())
    }

    pub fn s3_port(&self) -> i32 {
        self.spec.s3_port.unwrap_or(defaults::S3_PORT)
    }

    pub fn admin_port(&self) -> i32 {
        self.spec.admin_port.unwrap_or(defaults::ADMIN_PORT)
    }

    /// Name of the client-facing S3 service
    pub fn s3_service_name(&self) -> String {
        self.name_any()
    }

    pub fn admin_service_name(&self) -> String {
        format!("{}-admin", self.name_any())
    }

    pub fn headless_service_name(&self) -> String {
        format!("{}-hl", self.name_any())
    }

    /// Admin endpoint reported in status, falling back to the in-cluster service address
    pub fn admin_endpoint(&self) -> String {
        self.status
            .as_ref()
            .and_then(|s| s.admin_endpoint.clone())
            .unwrap_or_else(|| self.service_url(&self.admin_service_name(), self.admin_port()))
    }

    /// S3 endpoint reported in status, falling back to the in-cluster service address
    pub fn s3_endpoint(&self) -> String {
        self.status
            .as_ref()
            .and_then(|s| s.s3_endpoint.clone())
            .unwrap_or_else(|| self.service_url(&self.s3_service_name(), self.s3_port()))
    }

    pub(crate) fn service_url(&self, service: &str, port: i32) -> String {
        format!(
            "http://{}.{}.svc.cluster.local:{}",
            service,
            self.namespace().unwrap_or_else(|| "default".to_string()),
            port
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageClusterStatus {
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_endpoint: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
