// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::constants::API_GROUP;
use crate::error::Result;
use crate::types::{BucketClaim, StorageCluster};
use kube::{discovery::Discovery, Client, CustomResourceExt, Resource};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait for the Stowage CRDs to be served by the API server.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_crds(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match check_crds_exist(client).await {
            Ok(true) => {
                info!("CRDs ({}/{}) are available", API_GROUP, StorageCluster::version(&()));
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "CRDs ({}) not yet available, waiting {} seconds...",
                    API_GROUP, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for CRDs: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// Check that both StorageCluster and BucketClaim are discoverable
async fn check_crds_exist(client: &Client) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[API_GROUP])
        .run()
        .await?;

    let wanted = [
        (StorageCluster::kind(&()), StorageCluster::version(&())),
        (BucketClaim::kind(&()), BucketClaim::version(&())),
    ];

    let Some(group) = discovery.groups().find(|g| g.name() == API_GROUP) else {
        return Ok(false);
    };
    let served: Vec<_> = group
        .recommended_resources()
        .into_iter()
        .map(|(ar, _)| (ar.kind, ar.version))
        .collect();

    Ok(wanted
        .iter()
        .all(|(kind, version)| served.iter().any(|(k, v)| k == kind && v == version)))
}

/// Render both CRDs as a multi-document YAML stream
pub fn crd_manifests() -> std::result::Result<String, serde_yaml::Error> {
    let mut out = String::new();
    for crd in [StorageCluster::crd(), BucketClaim::crd()] {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&crd)?);
    }
    Ok(out)
}
