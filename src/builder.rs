// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired objects of a storage cluster.
//!
//! Controllers depend on the [`DesiredObjects`] trait only; [`DefaultBuilder`]
//! is the minimal object set needed to run a cluster and reach its endpoints.

use crate::constants::{cluster_credentials, labels, OPERATOR_NAME};
use crate::error::{Result, StowageError};
use crate::types::StorageCluster;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;

/// Objects that make up a running storage cluster
#[derive(Clone, Debug)]
pub struct ClusterObjects {
    pub services: Vec<Service>,
    pub stateful_set: StatefulSet,
}

/// Pure mapping from a cluster spec to its desired objects
pub trait DesiredObjects: Send + Sync {
    fn build(&self, cluster: &StorageCluster) -> Result<ClusterObjects>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultBuilder;

impl DesiredObjects for DefaultBuilder {
    fn build(&self, cluster: &StorageCluster) -> Result<ClusterObjects> {
        if cluster.spec.image.is_empty() {
            return Err(StowageError::InvalidSpec(format!(
                "cluster {} has no image",
                cluster.name_any()
            )));
        }

        Ok(ClusterObjects {
            services: vec![
                service(cluster, &cluster.headless_service_name(), true),
                service(cluster, &cluster.s3_service_name(), false),
                admin_service(cluster),
            ],
            stateful_set: stateful_set(cluster)?,
        })
    }
}

pub fn selector_labels(cluster: &StorageCluster) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::NAME.to_string(), OPERATOR_NAME.to_string()),
        (labels::INSTANCE.to_string(), cluster.name_any()),
    ])
}

fn metadata(cluster: &StorageCluster, name: &str) -> ObjectMeta {
    let mut object_labels = selector_labels(cluster);
    object_labels.insert(labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string());

    ObjectMeta {
        name: Some(name.to_string()),
        namespace: cluster.namespace(),
        labels: Some(object_labels),
        owner_references: cluster.controller_owner_ref(&()).map(|r| vec![r]),
        ..Default::default()
    }
}

fn port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        ..Default::default()
    }
}

fn service(cluster: &StorageCluster, name: &str, headless: bool) -> Service {
    Service {
        metadata: metadata(cluster, name),
        spec: Some(ServiceSpec {
            cluster_ip: headless.then(|| "None".to_string()),
            publish_not_ready_addresses: headless.then_some(true),
            selector: Some(selector_labels(cluster)),
            ports: Some(vec![port("s3", cluster.s3_port())]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn admin_service(cluster: &StorageCluster) -> Service {
    Service {
        metadata: metadata(cluster, &cluster.admin_service_name()),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(cluster)),
            ports: Some(vec![port("admin", cluster.admin_port())]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn stateful_set(cluster: &StorageCluster) -> Result<StatefulSet> {
    let secret = &cluster.spec.credentials_secret;
    let selector = selector_labels(cluster);

    let manifest = json!({
        "apiVersion": "apps/v1",
        "kind": "StatefulSet",
        "metadata": metadata(cluster, &cluster.name_any()),
        "spec": {
            "replicas": cluster.spec.replicas,
            "serviceName": cluster.headless_service_name(),
            "podManagementPolicy": "Parallel",
            "selector": { "matchLabels": selector },
            "template": {
                "metadata": { "labels": selector },
                "spec": {
                    "containers": [{
                        "name": "server",
                        "image": cluster.spec.image,
                        "ports": [
                            { "name": "s3", "containerPort": cluster.s3_port() },
                            { "name": "admin", "containerPort": cluster.admin_port() }
                        ],
                        "env": [
                            {
                                "name": "ROOT_ACCESS_KEY",
                                "valueFrom": { "secretKeyRef": { "name": secret, "key": cluster_credentials::ACCESS_KEY } }
                            },
                            {
                                "name": "ROOT_SECRET_KEY",
                                "valueFrom": { "secretKeyRef": { "name": secret, "key": cluster_credentials::SECRET_KEY } }
                            },
                            { "name": "REGION", "value": cluster.region() }
                        ],
                        "volumeMounts": [{ "name": "data", "mountPath": "/data" }]
                    }]
                }
            },
            "volumeClaimTemplates": [{
                "metadata": { "name": "data" },
                "spec": {
                    "accessModes": ["ReadWriteOnce"],
                    "resources": { "requests": { "storage": cluster.spec.storage_size } }
                }
            }]
        }
    });

    Ok(serde_json::from_value(manifest)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StorageClusterSpec;

    fn make_cluster() -> StorageCluster {
        let mut cluster = StorageCluster::new(
            "main",
            StorageClusterSpec {
                image: "stowage/server:1.0".to_string(),
                replicas: 4,
                storage_size: "20Gi".to_string(),
                region: None,
                s3_port: None,
                admin_port: None,
                credentials_secret: "root-creds".to_string(),
            },
        );
        cluster.metadata.namespace = Some("storage".to_string());
        cluster.metadata.uid = Some("cluster-uid".to_string());
        cluster
    }

    #[test]
    fn test_build_names_and_owner_refs() {
        let objects = DefaultBuilder.build(&make_cluster()).unwrap();

        let names: Vec<_> = objects.services.iter().map(|s| s.name_any()).collect();
        assert_eq!(names, vec!["main-hl", "main", "main-admin"]);

        let owner = &objects.stateful_set.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.kind, "StorageCluster");
        assert_eq!(owner.uid, "cluster-uid");
    }

    #[test]
    fn test_headless_service_has_no_cluster_ip() {
        let objects = DefaultBuilder.build(&make_cluster()).unwrap();

        let headless = objects.services[0].spec.as_ref().unwrap();
        assert_eq!(headless.cluster_ip.as_deref(), Some("None"));
        assert!(objects.services[1].spec.as_ref().unwrap().cluster_ip.is_none());
    }

    #[test]
    fn test_stateful_set_uses_headless_service_and_storage_size() {
        let objects = DefaultBuilder.build(&make_cluster()).unwrap();
        let sts = serde_json::to_value(&objects.stateful_set).unwrap();

        assert_eq!(sts["spec"]["serviceName"], "main-hl");
        assert_eq!(sts["spec"]["replicas"], 4);
        assert_eq!(
            sts["spec"]["volumeClaimTemplates"][0]["spec"]["resources"]["requests"]["storage"],
            "20Gi"
        );
        assert_eq!(sts["metadata"]["ownerReferences"][0]["uid"], "cluster-uid");
    }

    #[test]
    fn test_build_rejects_missing_image() {
        let mut cluster = make_cluster();
        cluster.spec.image.clear();

        assert!(matches!(
            DefaultBuilder.build(&cluster),
            Err(StowageError::InvalidSpec(_))
        ));
    }
}
