// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Claim status transitions and status subresource writes

use crate::error::Result;
use crate::types::claim::{BucketInfo, SecretInfo};
use crate::types::{now_rfc3339, set_condition, BucketClaim, BucketClaimStatus, ClaimPhase, Condition};
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use serde_json::json;
use tracing::{debug, instrument};

const READY: &str = "Ready";

fn next(
    current: Option<&BucketClaimStatus>,
    phase: ClaimPhase,
    message: String,
    condition: Condition,
) -> BucketClaimStatus {
    let mut status = current.cloned().unwrap_or_default();
    status.phase = phase;
    status.message = Some(message);
    set_condition(&mut status.conditions, condition);
    status
}

pub fn pending(current: Option<&BucketClaimStatus>, message: &str) -> BucketClaimStatus {
    next(
        current,
        ClaimPhase::Pending,
        message.to_string(),
        Condition::new(READY, false, "WaitingForCluster", message),
    )
}

pub fn creating(current: Option<&BucketClaimStatus>) -> BucketClaimStatus {
    let message = "Provisioning bucket and credentials";
    next(
        current,
        ClaimPhase::Creating,
        message.to_string(),
        Condition::new(READY, false, "Provisioning", message),
    )
}

pub fn ready(
    current: Option<&BucketClaimStatus>,
    bucket: BucketInfo,
    secret: Option<SecretInfo>,
) -> BucketClaimStatus {
    let message = format!("Bucket {} is ready", bucket.name);
    let mut status = next(
        current,
        ClaimPhase::Ready,
        message.clone(),
        Condition::new(READY, true, "Provisioned", &message),
    );
    status.bucket_info = Some(bucket);
    status.secret_info = secret;
    status
}

pub fn failed(current: Option<&BucketClaimStatus>, error: &str) -> BucketClaimStatus {
    next(
        current,
        ClaimPhase::Failed,
        error.to_string(),
        Condition::new(READY, false, "ProvisioningFailed", error),
    )
}

pub fn cleanup_failed(current: Option<&BucketClaimStatus>, error: &str) -> BucketClaimStatus {
    let message = format!("cleanup failed: {}", error);
    next(
        current,
        ClaimPhase::Failed,
        message.clone(),
        Condition::new(READY, false, "CleanupFailed", &message),
    )
}

/// Merge-patch the status subresource unless nothing but timestamps changed.
/// Returns the status now in effect.
#[instrument(skip_all, fields(claim = %claim.name_any(), phase = %next.phase))]
pub async fn write_status(
    api: &Api<BucketClaim>,
    claim: &BucketClaim,
    current: Option<&BucketClaimStatus>,
    mut next: BucketClaimStatus,
) -> Result<BucketClaimStatus> {
    if let Some(current) = current {
        if current.same_state(&next) {
            debug!("Status of {} unchanged", claim.name_any());
            return Ok(current.clone());
        }
    }

    next.last_update_time = Some(now_rfc3339());

    // Explicit nulls clear fields that were set before
    let patch = json!({
        "status": {
            "phase": next.phase,
            "message": next.message,
            "conditions": next.conditions,
            "lastUpdateTime": next.last_update_time,
            "bucketInfo": next.bucket_info,
            "secretInfo": next.secret_info,
        }
    });
    api.patch_status(&claim.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    debug!("Status of {} set to {}", claim.name_any(), next.phase);
    Ok(next)
}
