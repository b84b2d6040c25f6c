//! Deadline enforcement for store adapters.
//!
//! A slow or hung store must never block the request path indefinitely, so
//! every adapter call is raced against a per-operation deadline. Single-key
//! operations get a tight bound; cursor scans get a looser one since one
//! scan step touches many keys.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ScanPage, StoreAdapter, StoreError};

const DEFAULT_SINGLE_OP_TIMEOUT_MS: u64 = 250;
const DEFAULT_BULK_OP_TIMEOUT_MS: u64 = 2_000;

/// Per-operation deadlines applied by [`TimedStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreTimeouts {
    /// Bound for single-key operations (get/set/delete/ttl).
    pub single_op: Duration,
    /// Bound for one scan step or one batched delete.
    pub bulk_op: Duration,
}

impl Default for StoreTimeouts {
    fn default() -> Self {
        Self {
            single_op: Duration::from_millis(DEFAULT_SINGLE_OP_TIMEOUT_MS),
            bulk_op: Duration::from_millis(DEFAULT_BULK_OP_TIMEOUT_MS),
        }
    }
}

/// Wraps any [`StoreAdapter`] with bounded per-operation deadlines.
///
/// On deadline expiry the operation resolves to [`StoreError::Timeout`],
/// which callers treat exactly like an unavailable store.
pub struct TimedStore<S> {
    inner: S,
    timeouts: StoreTimeouts,
}

impl<S: StoreAdapter> TimedStore<S> {
    pub fn new(inner: S, timeouts: StoreTimeouts) -> Self {
        Self { inner, timeouts }
    }
}

async fn bounded<T>(
    op: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            debug!(op, timeout_ms = limit.as_millis() as u64, "Store operation deadline expired");
            Err(StoreError::timeout(op, limit))
        }
    }
}

#[async_trait]
impl<S: StoreAdapter> StoreAdapter for TimedStore<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        bounded("get", self.timeouts.single_op, self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        bounded("set", self.timeouts.single_op, self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        bounded("delete", self.timeouts.single_op, self.inner.delete(key)).await
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        bounded("delete_many", self.timeouts.bulk_op, self.inner.delete_many(keys)).await
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: Option<String>,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        bounded(
            "scan",
            self.timeouts.bulk_op,
            self.inner.scan(pattern, cursor, count),
        )
        .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        bounded("ttl", self.timeouts.single_op, self.inner.ttl(key)).await
    }
}
