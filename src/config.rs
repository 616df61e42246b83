// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::cache;
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Restrict watches to a single namespace; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Idle time after which a cached admin connection is evicted
    pub cache_idle_ttl: Duration,
    /// Interval between cache eviction sweeps
    pub cache_sweep_interval: Duration,
    /// Per-request timeout for downstream admin calls
    pub admin_request_timeout: Duration,
    /// Wait for the CRDs to be served before starting the controllers
    pub wait_for_crds: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            watch_namespace: None,
            cache_idle_ttl: Duration::from_secs(cache::IDLE_TTL_SECS),
            cache_sweep_interval: Duration::from_secs(cache::SWEEP_INTERVAL_SECS),
            admin_request_timeout: Duration::from_secs(30),
            wait_for_crds: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let watch_namespace = env::var("WATCH_NAMESPACE").ok().filter(|ns| !ns.is_empty());
        let cache_idle_ttl = secs_var("CACHE_IDLE_TTL_SECS")?.unwrap_or(defaults.cache_idle_ttl);
        let cache_sweep_interval =
            secs_var("CACHE_SWEEP_INTERVAL_SECS")?.unwrap_or(defaults.cache_sweep_interval);
        let admin_request_timeout =
            secs_var("ADMIN_REQUEST_TIMEOUT_SECS")?.unwrap_or(defaults.admin_request_timeout);
        let wait_for_crds: bool = env::var("CRD_WAIT")
            .unwrap_or("true".to_string())
            .parse()
            .unwrap_or(true);

        Ok(Config {
            watch_namespace,
            cache_idle_ttl,
            cache_sweep_interval,
            admin_request_timeout,
            wait_for_crds,
        })
    }
}

fn secs_var(name: &str) -> Result<Option<Duration>> {
    match env::var(name) {
        Ok(value) => {
            let secs: u64 = value
                .parse()
                .with_context(|| format!("{} must be a number of seconds, got '{}'", name, value))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}
