//! Maintenance surface.
//!
//! Read-only introspection plus the manual clear used by operator tooling:
//! entry stats, bulk key listing, namespace clears and a store health probe.
//! Consumed by the `strato` binary and by deployment health gates; apart
//! from `clear`, nothing here mutates.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::store::{StoreAdapter, StoreError};

use super::keys;
use super::registry::{UnknownNamespace, VersionRegistry};
use super::sweep::{SweepOptions, sweep_pattern};

const HEALTH_SENTINEL_KEY: &str = "strato:health:ping";
const HEALTH_SENTINEL_TTL: Duration = Duration::from_secs(30);

/// Introspection result for one entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryStats {
    pub exists: bool,
    /// Schema version the lookup was performed under.
    pub version: u32,
    /// Seconds since the entry was written, when the payload carries its
    /// write timestamp.
    pub age_seconds: Option<i64>,
    pub ttl_remaining: Option<Duration>,
}

impl EntryStats {
    fn absent(version: u32) -> Self {
        Self {
            exists: false,
            version,
            age_seconds: None,
            ttl_remaining: None,
        }
    }
}

/// Result of clearing one namespace.
#[derive(Debug, Clone)]
pub struct ClearOutcome {
    pub namespace: String,
    pub deleted: u64,
    pub complete: bool,
}

/// Store health probe result.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub latency: Duration,
}

// Just enough of the stored envelope to recover the write timestamp.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeMeta {
    cached_at: i64,
}

/// Shared with `VersionedCache::stats`; store failures degrade to "absent".
pub(crate) async fn read_stats(
    store: &dyn StoreAdapter,
    namespace: &str,
    version: u32,
    user_key: &str,
) -> EntryStats {
    let storage_key = keys::entry_key(namespace, version, user_key);

    let bytes = match store.get(&storage_key).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return EntryStats::absent(version),
        Err(err) => {
            debug!(key = storage_key, error = %err, "Stats read failed; reporting absent");
            return EntryStats::absent(version);
        }
    };

    let age_seconds = serde_json::from_slice::<EnvelopeMeta>(&bytes)
        .ok()
        .map(|meta| (OffsetDateTime::now_utc().unix_timestamp() - meta.cached_at).max(0));
    let ttl_remaining = store.ttl(&storage_key).await.ok().flatten();

    EntryStats {
        exists: true,
        version,
        age_seconds,
        ttl_remaining,
    }
}

/// Operator-facing maintenance operations over the shared store.
pub struct Maintenance {
    store: Arc<dyn StoreAdapter>,
    registry: Arc<VersionRegistry>,
    sweep: SweepOptions,
}

impl Maintenance {
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        registry: Arc<VersionRegistry>,
        sweep: SweepOptions,
    ) -> Self {
        Self {
            store,
            registry,
            sweep,
        }
    }

    /// Introspect one entry under the namespace's current version.
    pub async fn stats(&self, namespace: &str, key: &str) -> Result<EntryStats, UnknownNamespace> {
        let version = self
            .registry
            .version_of(namespace)
            .ok_or_else(|| UnknownNamespace(namespace.to_string()))?;
        Ok(read_stats(self.store.as_ref(), namespace, version, key).await)
    }

    /// List keys matching `pattern` by walking the scan cursor to the end.
    pub async fn list_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut collected = Vec::new();
        let mut cursor = None;

        loop {
            let page = self
                .store
                .scan(pattern, cursor, self.sweep.batch_size)
                .await?;
            collected.extend(page.keys);
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(collected)
    }

    /// Clear a namespace (or all registered namespaces) across every
    /// version segment. Store failures degrade to partial outcomes, same as
    /// the invalidation consumer.
    pub async fn clear(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ClearOutcome>, UnknownNamespace> {
        let targets: Vec<String> = match namespace {
            Some(requested) => {
                if !self.registry.contains(requested) {
                    return Err(UnknownNamespace(requested.to_string()));
                }
                vec![requested.to_string()]
            }
            None => self.registry.namespaces().map(str::to_string).collect(),
        };

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let pattern = keys::namespace_pattern(&target);
            let outcome = sweep_pattern(self.store.as_ref(), &pattern, &self.sweep).await;
            info!(
                namespace = target.as_str(),
                deleted = outcome.deleted,
                complete = outcome.complete,
                "Manual namespace clear finished"
            );
            outcomes.push(ClearOutcome {
                namespace: target,
                deleted: outcome.deleted,
                complete: outcome.complete,
            });
        }

        Ok(outcomes)
    }

    /// Lightweight store probe: SET then GET on a sentinel key, reporting
    /// the round-trip latency. A stale read-back counts as a failure.
    pub async fn health(&self) -> Result<HealthReport, StoreError> {
        let stamp = OffsetDateTime::now_utc()
            .unix_timestamp_nanos()
            .to_string();
        let started = Instant::now();

        self.store
            .set(HEALTH_SENTINEL_KEY, stamp.as_bytes(), HEALTH_SENTINEL_TTL)
            .await?;
        let read = self.store.get(HEALTH_SENTINEL_KEY).await?;

        if read.as_deref() != Some(stamp.as_bytes()) {
            return Err(StoreError::unavailable(
                "health sentinel read back a stale value",
            ));
        }

        Ok(HealthReport {
            latency: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::store::MemoryStore;

    fn maintenance(store: Arc<MemoryStore>) -> Maintenance {
        let mut versions = BTreeMap::new();
        versions.insert("activity".to_string(), 2);
        versions.insert("analytics".to_string(), 1);
        Maintenance::new(
            store,
            Arc::new(VersionRegistry::new(versions)),
            SweepOptions::default(),
        )
    }

    #[tokio::test]
    async fn stats_reports_age_and_ttl() {
        let store = Arc::new(MemoryStore::new());
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let payload = format!(r#"{{"cachedAt": {}, "data": []}}"#, now - 40);
        store
            .set(
                "activity:v2:feed:all",
                payload.as_bytes(),
                Duration::from_secs(300),
            )
            .await
            .unwrap();

        let stats = maintenance(store)
            .stats("activity", "feed:all")
            .await
            .unwrap();

        assert!(stats.exists);
        assert_eq!(stats.version, 2);
        let age = stats.age_seconds.unwrap();
        assert!((40..=42).contains(&age), "age was {age}");
        assert!(stats.ttl_remaining.unwrap() <= Duration::from_secs(300));
    }

    #[tokio::test]
    async fn stats_for_missing_entry() {
        let store = Arc::new(MemoryStore::new());
        let stats = maintenance(store)
            .stats("activity", "feed:all")
            .await
            .unwrap();

        assert!(!stats.exists);
        assert_eq!(stats.age_seconds, None);
        assert_eq!(stats.ttl_remaining, None);
    }

    #[tokio::test]
    async fn stats_rejects_unknown_namespace() {
        let store = Arc::new(MemoryStore::new());
        assert!(maintenance(store).stats("ghost", "k").await.is_err());
    }

    #[tokio::test]
    async fn clear_single_namespace_spans_versions() {
        let store = Arc::new(MemoryStore::new());
        for key in ["activity:v1:a", "activity:v2:b", "analytics:v1:c"] {
            store.set(key, b"x", Duration::from_secs(300)).await.unwrap();
        }

        let outcomes = maintenance(store.clone())
            .clear(Some("activity"))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].deleted, 2);
        assert!(store.get("analytics:v1:c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn clear_without_namespace_covers_all_registered() {
        let store = Arc::new(MemoryStore::new());
        for key in ["activity:v2:a", "analytics:v1:b"] {
            store.set(key, b"x", Duration::from_secs(300)).await.unwrap();
        }

        let outcomes = maintenance(store.clone()).clear(None).await.unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn list_keys_walks_the_full_cursor() {
        let store = Arc::new(MemoryStore::new());
        for idx in 0..7 {
            store
                .set(&format!("activity:v2:item:{idx}"), b"x", Duration::from_secs(300))
                .await
                .unwrap();
        }

        let maint = Maintenance::new(
            store,
            Arc::new(VersionRegistry::default()),
            SweepOptions {
                batch_size: 2,
                ..Default::default()
            },
        );

        let keys = maint.list_keys("activity:v*:*").await.unwrap();
        assert_eq!(keys.len(), 7);
    }

    #[tokio::test]
    async fn health_round_trip_reports_latency() {
        let store = Arc::new(MemoryStore::new());
        let report = maintenance(store).health().await.unwrap();
        assert!(report.latency < Duration::from_secs(1));
    }
}
