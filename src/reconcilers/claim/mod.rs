// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! BucketClaim reconciler - provisions a bucket plus scoped credentials and
//! tears them down behind a finalizer when the claim is deleted.

pub mod cleanup;
pub mod provision;
pub mod secret;
pub mod status;

use crate::admin::ConnectionCache;
use crate::constants::{labels, requeue, CLAIM_FINALIZER, OPERATOR_NAME};
use crate::error::{Result, StowageError};
use crate::kubernetes::{add_finalizer, remove_finalizer};
use crate::types::claim::Lifecycle;
use crate::types::{BucketClaim, ClaimPhase};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct ClaimReconciler {
    client: Client,
    cache: Arc<ConnectionCache>,
    namespace: Option<String>,
}

impl ClaimReconciler {
    pub fn new(client: Client, cache: Arc<ConnectionCache>, namespace: Option<String>) -> Self {
        Self {
            client,
            cache,
            namespace,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let (claims, secrets): (Api<BucketClaim>, Api<Secret>) = match &self.namespace {
            Some(ns) => (
                Api::namespaced(self.client.clone(), ns),
                Api::namespaced(self.client.clone(), ns),
            ),
            None => (Api::all(self.client.clone()), Api::all(self.client.clone())),
        };
        let managed = format!("{}={}", labels::MANAGED_BY, OPERATOR_NAME);
        let context = Arc::new(self);

        info!("Starting BucketClaim controller");
        Controller::new(claims, watcher::Config::default())
            .owns(secrets, watcher::Config::default().labels(&managed))
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled claim: {:?}", o),
                    Err(e) => warn!("Claim reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

/// Delay before a claim in `phase` is looked at again, with up to 10% positive jitter
pub fn requeue_after(phase: ClaimPhase) -> Duration {
    let base = Duration::from_secs(match phase {
        ClaimPhase::Pending => requeue::PENDING_SECS,
        ClaimPhase::Creating => requeue::CREATING_SECS,
        ClaimPhase::Ready => requeue::READY_SECS,
        ClaimPhase::Failed => requeue::FAILED_SECS,
    });
    let max_jitter = (base.as_millis() as f64 * requeue::JITTER_FRACTION) as u64;
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
}

#[instrument(skip(claim, ctx), fields(claim = %claim.name_any(), namespace = ?claim.namespace()))]
pub async fn reconcile(claim: Arc<BucketClaim>, ctx: Arc<ClaimReconciler>) -> Result<Action> {
    let claims: Api<BucketClaim> = Api::namespaced(
        ctx.client.clone(),
        &claim.namespace().unwrap_or_else(|| "default".to_string()),
    );

    match claim.lifecycle() {
        Lifecycle::Terminating => finalize(&ctx, &claims, &claim).await,
        Lifecycle::Active => apply(&ctx, &claims, &claim).await,
    }
}

async fn finalize(
    ctx: &ClaimReconciler,
    claims: &Api<BucketClaim>,
    claim: &BucketClaim,
) -> Result<Action> {
    if !claim.has_finalizer() {
        debug!("{} has no finalizer, nothing to clean up", claim.name_any());
        return Ok(Action::await_change());
    }

    info!("Cleaning up claim {}", claim.name_any());
    if let Err(e) = cleanup::cleanup(ctx, claim).await {
        let failed = status::cleanup_failed(claim.status.as_ref(), &e.to_string());
        if let Err(write_err) =
            status::write_status(claims, claim, claim.status.as_ref(), failed).await
        {
            warn!("Failed to record cleanup failure: {}", write_err);
        }
        return Err(e);
    }

    remove_finalizer(claims, claim, CLAIM_FINALIZER).await?;
    Ok(Action::await_change())
}

async fn apply(
    ctx: &ClaimReconciler,
    claims: &Api<BucketClaim>,
    claim: &BucketClaim,
) -> Result<Action> {
    let claim = if claim.has_finalizer() {
        claim.clone()
    } else {
        add_finalizer(claims, claim, CLAIM_FINALIZER).await?
    };

    let mut current = claim.status.clone();

    match provision::provision(ctx, claims, &claim, &mut current).await {
        Ok(provisioned) => {
            let ready = status::ready(current.as_ref(), provisioned.bucket, provisioned.secret);
            status::write_status(claims, &claim, current.as_ref(), ready).await?;
            Ok(Action::requeue(requeue_after(ClaimPhase::Ready)))
        }
        Err(StowageError::ClusterNotReady(cluster)) => {
            let message = format!("Waiting for storage cluster {} to become ready", cluster);
            info!("{}", message);
            let pending = status::pending(current.as_ref(), &message);
            status::write_status(claims, &claim, current.as_ref(), pending).await?;
            Ok(Action::requeue(requeue_after(ClaimPhase::Pending)))
        }
        Err(e) => {
            let failed = status::failed(current.as_ref(), &e.to_string());
            if let Err(write_err) =
                status::write_status(claims, &claim, current.as_ref(), failed).await
            {
                warn!("Failed to record provisioning failure: {}", write_err);
            }
            Err(e)
        }
    }
}

fn error_policy(claim: Arc<BucketClaim>, error: &StowageError, _ctx: Arc<ClaimReconciler>) -> Action {
    error!("Reconciliation of claim {} failed: {}", claim.name_any(), error);
    Action::requeue(requeue_after(ClaimPhase::Failed))
}
