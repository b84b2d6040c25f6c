//! Versioned cache core.
//!
//! [`VersionedCache`] composes a store adapter, the version registry and a
//! per-instance validator into the read/write surface application code uses.
//! Reads are self-healing (a payload the validator rejects is purged, not
//! served) and every failure mode degrades to a miss or a discardable write
//! error; the cache is never allowed to become a point of failure for the
//! request path.
//!
//! Version mismatch has no runtime representation here: the schema version
//! is part of the storage key, so entries written under an older version are
//! simply never looked up once the registry advances.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use crate::store::{StoreAdapter, StoreError};

use super::keys;
use super::maintenance::{self, EntryStats};
use super::registry::{UnknownNamespace, VersionRegistry};
use super::validator::Validator;

pub(crate) const METRIC_HIT_TOTAL: &str = "strato_cache_hit_total";
pub(crate) const METRIC_MISS_TOTAL: &str = "strato_cache_miss_total";
pub(crate) const METRIC_SELF_HEAL_TOTAL: &str = "strato_cache_self_heal_total";
pub(crate) const METRIC_STORE_ERROR_TOTAL: &str = "strato_store_error_total";

/// Stored payload shape: the application value wrapped with its write
/// timestamp, so `stats` can report entry age without this layer keeping
/// timers. The schema version is never part of the payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope<T> {
    pub cached_at: i64,
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a, T> {
    cached_at: i64,
    data: &'a T,
}

/// Generic versioned cache over one namespace.
pub struct VersionedCache<T> {
    namespace: String,
    version: u32,
    store: Arc<dyn StoreAdapter>,
    validator: Validator<T>,
    default_ttl: Duration,
    _payload: PhantomData<fn() -> T>,
}

impl<T> VersionedCache<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Build a cache over `namespace`.
    ///
    /// The namespace must be registered; the registry is immutable for the
    /// process lifetime, so the version is resolved once here.
    pub fn new(
        namespace: impl Into<String>,
        store: Arc<dyn StoreAdapter>,
        registry: &VersionRegistry,
        validator: Validator<T>,
        default_ttl: Duration,
    ) -> Result<Self, UnknownNamespace> {
        let namespace = namespace.into();
        let version = registry
            .version_of(&namespace)
            .ok_or_else(|| UnknownNamespace(namespace.clone()))?;

        Ok(Self {
            namespace,
            version,
            store,
            validator,
            default_ttl,
            _payload: PhantomData,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Serialize `value` and write it under the current version's key.
    ///
    /// Write-side validation is deliberately absent: validation exists to
    /// catch drift from *other* writers, and runs on read only. The returned
    /// error is discardable by contract: callers may log it but must not
    /// fail their request over it.
    #[instrument(skip(self, value), fields(namespace = %self.namespace))]
    pub async fn set(
        &self,
        key: &str,
        value: &T,
        ttl_override: Option<Duration>,
    ) -> Result<(), StoreError> {
        let storage_key = keys::entry_key(&self.namespace, self.version, key);
        let envelope = EnvelopeRef {
            cached_at: OffsetDateTime::now_utc().unix_timestamp(),
            data: value,
        };
        let payload = serde_json::to_vec(&envelope)
            .map_err(|err| StoreError::encode(err.to_string()))?;

        let ttl = ttl_override.unwrap_or(self.default_ttl);
        self.store
            .set(&storage_key, &payload, ttl)
            .await
            .inspect_err(|err| {
                counter!(METRIC_STORE_ERROR_TOTAL, "op" => "set").increment(1);
                warn!(key = storage_key, error = %err, "Cache write failed");
            })
    }

    /// Read the entry under the current version's key.
    ///
    /// Returns `None` on miss, expiry, store failure, or a payload the
    /// validator rejects. The last case also deletes the entry, so a
    /// corrupted or drifted payload is purged rather than served again.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn get(&self, key: &str) -> Option<T> {
        let storage_key = keys::entry_key(&self.namespace, self.version, key);

        let bytes = match self.store.get(&storage_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                counter!(METRIC_MISS_TOTAL, "namespace" => self.namespace.clone()).increment(1);
                return None;
            }
            Err(err) => {
                counter!(METRIC_STORE_ERROR_TOTAL, "op" => "get").increment(1);
                counter!(METRIC_MISS_TOTAL, "namespace" => self.namespace.clone()).increment(1);
                warn!(key = storage_key, error = %err, "Cache read failed; treating as miss");
                return None;
            }
        };

        let envelope: Envelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(key = storage_key, error = %err, "Cached payload failed to decode");
                self.self_heal(&storage_key, "decode").await;
                return None;
            }
        };

        if !(self.validator)(&envelope.data) {
            self.self_heal(&storage_key, "validation").await;
            return None;
        }

        counter!(METRIC_HIT_TOTAL, "namespace" => self.namespace.clone()).increment(1);
        Some(envelope.data)
    }

    /// Remove the entry under the current version's key. Store failures are
    /// swallowed: the entry will fall out by TTL regardless.
    pub async fn delete(&self, key: &str) {
        let storage_key = keys::entry_key(&self.namespace, self.version, key);
        if let Err(err) = self.store.delete(&storage_key).await {
            counter!(METRIC_STORE_ERROR_TOTAL, "op" => "delete").increment(1);
            warn!(key = storage_key, error = %err, "Cache delete failed; entry left for TTL expiry");
        }
    }

    /// Remove `key` across every version segment of this namespace,
    /// regardless of which deployed version wrote it. Returns the number of
    /// keys removed; failures degrade to the partial count.
    pub async fn delete_all_versions(&self, key: &str) -> u64 {
        let pattern = keys::all_versions_pattern(&self.namespace, key);
        let mut removed = 0;
        let mut cursor = None;

        loop {
            let page = match self.store.scan(&pattern, cursor, SCAN_PAGE_SIZE).await {
                Ok(page) => page,
                Err(err) => {
                    counter!(METRIC_STORE_ERROR_TOTAL, "op" => "scan").increment(1);
                    warn!(pattern, error = %err, "Multi-version delete scan failed");
                    return removed;
                }
            };
            match self.store.delete_many(&page.keys).await {
                Ok(count) => removed += count,
                Err(err) => {
                    counter!(METRIC_STORE_ERROR_TOTAL, "op" => "delete_many").increment(1);
                    warn!(pattern, error = %err, "Multi-version delete failed");
                    return removed;
                }
            }
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        removed
    }

    /// Read-only introspection for one entry: existence, schema version,
    /// age and remaining TTL. Never mutates.
    pub async fn stats(&self, key: &str) -> EntryStats {
        maintenance::read_stats(self.store.as_ref(), &self.namespace, self.version, key).await
    }

    async fn self_heal(&self, storage_key: &str, cause: &'static str) {
        counter!(
            METRIC_SELF_HEAL_TOTAL,
            "namespace" => self.namespace.clone(),
            "cause" => cause
        )
        .increment(1);
        counter!(METRIC_MISS_TOTAL, "namespace" => self.namespace.clone()).increment(1);
        warn!(
            key = storage_key,
            cause, "Purging cache entry that failed read-side validation"
        );

        if let Err(err) = self.store.delete(storage_key).await {
            debug!(key = storage_key, error = %err, "Self-heal delete failed; entry left for TTL expiry");
        }
    }
}

const SCAN_PAGE_SIZE: usize = 100;

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::cache::validator;
    use crate::store::MemoryStore;

    fn registry(namespace: &str, version: u32) -> VersionRegistry {
        VersionRegistry::new([(namespace.to_string(), version)].into())
    }

    fn cache(
        store: Arc<dyn StoreAdapter>,
        version: u32,
        validator: Validator<Value>,
    ) -> VersionedCache<Value> {
        VersionedCache::new(
            "activity",
            store,
            &registry("activity", version),
            validator,
            Duration::from_secs(300),
        )
        .expect("activity namespace is registered")
    }

    #[tokio::test]
    async fn unknown_namespace_rejected_at_construction() {
        let store: Arc<dyn StoreAdapter> = Arc::new(MemoryStore::new());
        let result: Result<VersionedCache<Value>, _> = VersionedCache::new(
            "unregistered",
            store,
            &registry("activity", 1),
            validator::accept_all(),
            Duration::from_secs(300),
        );

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn set_writes_under_versioned_key() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store.clone(), 2, validator::accept_all());

        cache
            .set("feed:all", &json!([{"id": "a"}]), None)
            .await
            .unwrap();

        let raw = store.get("activity:v2:feed:all").await.unwrap();
        assert!(raw.is_some(), "entry must live under the v2 prefix");
    }

    #[tokio::test]
    async fn get_rejects_and_purges_invalid_payload() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store.clone(), 1, validator::array_with_fields(&["id"]));

        // Entry written by a drifted writer: valid JSON, wrong shape.
        let envelope = br#"{"cachedAt": 0, "data": {"not": "a list"}}"#;
        store
            .set("activity:v1:feed:all", envelope, Duration::from_secs(300))
            .await
            .unwrap();

        assert!(cache.get("feed:all").await.is_none());
        assert_eq!(store.get("activity:v1:feed:all").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_all_versions_spans_version_prefixes() {
        let store = Arc::new(MemoryStore::new());
        let old = cache(store.clone(), 1, validator::accept_all());
        let new = cache(store.clone(), 2, validator::accept_all());

        old.set("feed:all", &json!([]), None).await.unwrap();
        new.set("feed:all", &json!([]), None).await.unwrap();

        assert_eq!(new.delete_all_versions("feed:all").await, 2);
        assert_eq!(store.get("activity:v1:feed:all").await.unwrap(), None);
        assert_eq!(store.get("activity:v2:feed:all").await.unwrap(), None);
    }
}
