// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stowage::admin::{ConnectionCache, HttpConnector};
use stowage::builder::DefaultBuilder;
use stowage::config::Config;
use stowage::kubernetes::{crd_manifests, wait_for_crds};
use stowage::reconcilers::{ClaimReconciler, ClusterReconciler};

#[tokio::main]
async fn main() -> Result<()> {
    // `stowage crds` prints the CRD manifests for installation
    if std::env::args().nth(1).as_deref() == Some("crds") {
        print!("{}", crd_manifests()?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Stowage operator");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: watch_namespace={}, cache_idle_ttl={:?}",
        config.watch_namespace.as_deref().unwrap_or("<all>"),
        config.cache_idle_ttl
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    if config.wait_for_crds {
        info!("Waiting for Stowage CRDs to become available...");
        wait_for_crds(&client).await?;
    }

    let cache = Arc::new(ConnectionCache::new(
        Arc::new(HttpConnector::new(config.admin_request_timeout)),
        config.cache_idle_ttl,
    ));
    let sweeper = cache.spawn_sweeper(config.cache_sweep_interval, CancellationToken::new());

    let cluster_reconciler = ClusterReconciler::new(
        client.clone(),
        Arc::new(DefaultBuilder),
        config.watch_namespace.clone(),
    );
    let claim_reconciler =
        ClaimReconciler::new(client.clone(), cache.clone(), config.watch_namespace.clone());

    info!("Starting reconcilers...");

    // Controllers drain on SIGTERM/SIGINT by themselves; ctrl_c also ends the wait
    let result = tokio::select! {
        res = async { tokio::try_join!(cluster_reconciler.run(), claim_reconciler.run()) } => res.map(|_| ()),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    sweeper.shutdown().await;
    if let Err(e) = &result {
        warn!("Reconcilers stopped with error: {}", e);
    }
    info!("Stowage operator stopped");
    result
}
