// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cache of admin handles keyed by endpoint, with idle eviction.
//!
//! A single mutex guards the map. Reconciliations are infrequent, so contention
//! is not a concern. Eviction only drops the cache slot: callers that already
//! hold a handle keep using it until they let go of their `Arc`.

use crate::admin::api::{AdminApi, AdminConnector, AdminEndpoint, AdminError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct CacheEntry {
    handle: Arc<dyn AdminApi>,
    last_access: Instant,
}

pub struct ConnectionCache {
    connector: Arc<dyn AdminConnector>,
    entries: Mutex<HashMap<String, CacheEntry>>,
    idle_ttl: Duration,
}

impl ConnectionCache {
    pub fn new(connector: Arc<dyn AdminConnector>, idle_ttl: Duration) -> Self {
        ConnectionCache {
            connector,
            entries: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Return the cached handle for the endpoint, connecting on a miss
    pub async fn get(&self, endpoint: &AdminEndpoint) -> Result<Arc<dyn AdminApi>, AdminError> {
        self.get_at(endpoint, Instant::now()).await
    }

    async fn get_at(
        &self,
        endpoint: &AdminEndpoint,
        now: Instant,
    ) -> Result<Arc<dyn AdminApi>, AdminError> {
        let key = endpoint.cache_key();
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(&key) {
            entry.last_access = now;
            return Ok(entry.handle.clone());
        }

        debug!("Opening admin connection to {}", endpoint.url);
        let handle = self.connector.connect(endpoint)?;
        entries.insert(
            key,
            CacheEntry {
                handle: handle.clone(),
                last_access: now,
            },
        );
        Ok(handle)
    }

    /// Drop a single entry; returns whether it was present
    pub async fn evict(&self, key: &str) -> bool {
        self.entries.lock().await.remove(key).is_some()
    }

    /// Remove every entry idle for at least the TTL; returns how many were removed
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    async fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.last_access) < self.idle_ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Start the periodic eviction sweep. It runs until the token is cancelled.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> CacheSweeper {
        let cache = Arc::clone(self);
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = cache.sweep().await;
                        if evicted > 0 {
                            debug!("Evicted {} idle admin connection(s)", evicted);
                        }
                    }
                }
            }

            info!("Connection cache sweeper stopped");
        });

        CacheSweeper { cancel, handle }
    }
}

/// Handle to the background sweep task
pub struct CacheSweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl CacheSweeper {
    /// Cancel the sweep and wait for the task to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!("Connection cache sweeper ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeConnector;

    fn endpoint(url: &str) -> AdminEndpoint {
        AdminEndpoint {
            url: url.to_string(),
            region: "us-east-1".to_string(),
            access_key: "root".to_string(),
            secret_key: "secret".to_string(),
        }
    }

    fn make_cache(ttl: Duration) -> (Arc<ConnectionCache>, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::default());
        let cache = Arc::new(ConnectionCache::new(connector.clone(), ttl));
        (cache, connector)
    }

    #[tokio::test]
    async fn test_get_reuses_cached_handle() {
        let (cache, connector) = make_cache(Duration::from_secs(300));
        let ep = endpoint("http://a:9001");

        let first = cache.get(&ep).await.unwrap();
        let second = cache.get(&ep).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connects(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_endpoints_get_distinct_entries() {
        let (cache, connector) = make_cache(Duration::from_secs(300));

        cache.get(&endpoint("http://a:9001")).await.unwrap();
        cache.get(&endpoint("http://b:9001")).await.unwrap();

        assert_eq!(connector.connects(), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_connect_failure_is_not_cached() {
        let (cache, connector) = make_cache(Duration::from_secs(300));
        connector.fail_next();

        assert!(cache.get(&endpoint("http://a:9001")).await.is_err());
        assert!(cache.is_empty().await);

        cache.get(&endpoint("http://a:9001")).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_idle_and_keeps_recent() {
        let ttl = Duration::from_secs(300);
        let (cache, _) = make_cache(ttl);
        let start = Instant::now();

        cache.get_at(&endpoint("http://idle:9001"), start).await.unwrap();
        cache.get_at(&endpoint("http://busy:9001"), start).await.unwrap();

        // Touched just before the sweep
        let sweep_time = start + ttl + Duration::from_secs(1);
        cache
            .get_at(&endpoint("http://busy:9001"), sweep_time - Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(cache.sweep_at(sweep_time).await, 1);
        assert_eq!(cache.len().await, 1);
        assert!(!cache.evict(&endpoint("http://idle:9001").cache_key()).await);
        assert!(cache.evict(&endpoint("http://busy:9001").cache_key()).await);
    }

    #[tokio::test]
    async fn test_evicted_handle_stays_usable() {
        let (cache, connector) = make_cache(Duration::from_secs(300));
        let ep = endpoint("http://a:9001");

        let handle = cache.get(&ep).await.unwrap();
        assert!(cache.evict(&ep.cache_key()).await);

        assert!(handle.list_buckets().await.unwrap().is_empty());

        cache.get(&ep).await.unwrap();
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_sweeper_evicts_and_stops_on_shutdown() {
        let (cache, _) = make_cache(Duration::ZERO);
        cache.get(&endpoint("http://a:9001")).await.unwrap();

        let sweeper = cache.spawn_sweeper(Duration::from_millis(10), CancellationToken::new());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.is_empty().await);

        tokio::time::timeout(Duration::from_secs(1), sweeper.shutdown())
            .await
            .expect("sweeper should stop promptly");
    }
}
