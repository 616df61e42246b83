// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! StorageCluster reconciler - converges the cluster's services and
//! StatefulSet and publishes its endpoints and readiness.

use crate::builder::DesiredObjects;
use crate::constants::{labels, requeue, OPERATOR_NAME};
use crate::error::Result;
use crate::merge::create_or_update;
use crate::types::{set_condition, Condition, StorageCluster, StorageClusterStatus};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Patch, PatchParams},
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct ClusterReconciler {
    client: Client,
    builder: Arc<dyn DesiredObjects>,
    namespace: Option<String>,
}

impl ClusterReconciler {
    pub fn new(client: Client, builder: Arc<dyn DesiredObjects>, namespace: Option<String>) -> Self {
        Self {
            client,
            builder,
            namespace,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let (clusters, sets, services): (Api<StorageCluster>, Api<StatefulSet>, Api<Service>) =
            match &self.namespace {
                Some(ns) => (
                    Api::namespaced(self.client.clone(), ns),
                    Api::namespaced(self.client.clone(), ns),
                    Api::namespaced(self.client.clone(), ns),
                ),
                None => (
                    Api::all(self.client.clone()),
                    Api::all(self.client.clone()),
                    Api::all(self.client.clone()),
                ),
            };
        let managed = format!("{}={}", labels::MANAGED_BY, OPERATOR_NAME);
        let context = Arc::new(self);

        info!("Starting StorageCluster controller");
        Controller::new(clusters, watcher::Config::default())
            .owns(sets, watcher::Config::default().labels(&managed))
            .owns(services, watcher::Config::default().labels(&managed))
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled cluster: {:?}", o),
                    Err(e) => warn!("Cluster reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

/// Status derived from the live StatefulSet
pub fn cluster_status(cluster: &StorageCluster, stateful_set: &StatefulSet) -> StorageClusterStatus {
    let ready_replicas = stateful_set
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    let wanted = cluster.spec.replicas;
    let ready = wanted > 0 && ready_replicas >= wanted;

    let mut status = cluster.status.clone().unwrap_or_default();
    status.ready_replicas = ready_replicas;
    status.admin_endpoint = Some(cluster.service_url(&cluster.admin_service_name(), cluster.admin_port()));
    status.s3_endpoint = Some(cluster.service_url(&cluster.s3_service_name(), cluster.s3_port()));

    let condition = if ready {
        Condition::new("Ready", true, "Available", "All replicas are ready")
    } else {
        Condition::new(
            "Ready",
            false,
            "Progressing",
            &format!("{}/{} replicas ready", ready_replicas, wanted),
        )
    };
    set_condition(&mut status.conditions, condition);
    status
}

#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
async fn reconcile(cluster: Arc<StorageCluster>, ctx: Arc<ClusterReconciler>) -> Result<Action> {
    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
    debug!("Reconciling storage cluster {}/{}", namespace, name);

    let objects = ctx.builder.build(&cluster)?;

    let services: Api<Service> = Api::namespaced(ctx.client.clone(), &namespace);
    for service in &objects.services {
        create_or_update(&services, service).await?;
    }

    let sets: Api<StatefulSet> = Api::namespaced(ctx.client.clone(), &namespace);
    let live = create_or_update(&sets, &objects.stateful_set)
        .await?
        .into_inner();

    let status = cluster_status(&cluster, &live);
    let ready = status.conditions.iter().any(|c| c.is_true("Ready"));

    if cluster.status.as_ref() != Some(&status) {
        let clusters: Api<StorageCluster> = Api::namespaced(ctx.client.clone(), &namespace);
        let patch = json!({ "status": status });
        clusters
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        info!(
            "Storage cluster {} has {}/{} replicas ready",
            name, status.ready_replicas, cluster.spec.replicas
        );
    }

    let delay = if ready {
        requeue::CLUSTER_READY_SECS
    } else {
        requeue::CLUSTER_PROGRESSING_SECS
    };
    Ok(Action::requeue(Duration::from_secs(delay)))
}

fn error_policy(
    cluster: Arc<StorageCluster>,
    error: &crate::error::StowageError,
    _ctx: Arc<ClusterReconciler>,
) -> Action {
    error!("Reconciliation of cluster {} failed: {}", cluster.name_any(), error);
    Action::requeue(Duration::from_secs(requeue::ERROR_SECS))
}
