// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Teardown of a terminating claim's downstream state

use super::provision::resolve_endpoint;
use super::{secret, ClaimReconciler};
use crate::error::{AdminContext, Result, StowageError};
use crate::types::{BucketClaim, DeletionPolicy};
use k8s_openapi::api::core::v1::Secret;
use kube::api::DeleteParams;
use kube::{Api, ResourceExt};
use tracing::{debug, info, instrument, warn};

/// Remove the bucket (per deletion policy), the identity and the credential secret.
///
/// Every step tolerates the resource being gone already, so a retried pass only
/// redoes what is left. Bucket deletion is best-effort; identity and secret
/// failures are returned and keep the finalizer in place.
#[instrument(skip_all, fields(claim = %claim.name_any(), bucket = %claim.bucket_name()))]
pub async fn cleanup(ctx: &ClaimReconciler, claim: &BucketClaim) -> Result<()> {
    match resolve_endpoint(&ctx.client, claim).await {
        Ok((_, endpoint)) => {
            let admin = ctx
                .cache
                .get(&endpoint)
                .await
                .during(format!("connect to {}", endpoint.url))?;
            let bucket = claim.bucket_name();

            if claim.spec.deletion_policy == DeletionPolicy::Delete {
                match admin.delete_bucket(&bucket).await {
                    Ok(()) => info!("Deleted bucket {}", bucket),
                    Err(e) if e.is_not_found() => debug!("Bucket {} already gone", bucket),
                    Err(e) => warn!("Failed to delete bucket {}, leaving it behind: {}", bucket, e),
                }
            } else {
                info!("Retaining bucket {}", bucket);
            }

            let identity = claim.identity_name();
            match admin.delete_identity(&identity).await {
                Ok(()) => info!("Deleted identity {}", identity),
                Err(e) if e.is_not_found() => debug!("Identity {} already gone", identity),
                Err(e) => return Err(e).during(format!("delete identity {}", identity)),
            }
        }
        // Cluster or its root credentials already removed, e.g. by namespace deletion
        Err(e @ (StowageError::ClusterNotFound(_) | StowageError::MissingCredentials(_))) => {
            warn!("{}, skipping bucket and identity cleanup", e);
        }
        Err(e) => return Err(e),
    }

    delete_secret(ctx, claim).await
}

async fn delete_secret(ctx: &ClaimReconciler, claim: &BucketClaim) -> Result<()> {
    let secrets: Api<Secret> = Api::namespaced(
        ctx.client.clone(),
        &claim.namespace().unwrap_or_else(|| "default".to_string()),
    );
    let name = claim.secret_name();

    let Some(existing) = secrets.get_opt(&name).await? else {
        debug!("Secret {} already gone", name);
        return Ok(());
    };
    if !secret::is_issued_for(&existing, claim) {
        warn!("Secret {} was not issued for this claim, leaving it", name);
        return Ok(());
    }

    match secrets.delete(&name, &DeleteParams::default()).await {
        Ok(_) => {
            info!("Deleted secret {}", name);
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}
