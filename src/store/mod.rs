//! Backing-store adapters.
//!
//! The cache layer talks to its remote key-value store through the
//! [`StoreAdapter`] trait. Two implementations ship with the crate:
//!
//! - [`RedisStore`]: production adapter over a Redis connection manager
//! - [`MemoryStore`]: in-process adapter for tests and single-node development
//!
//! Adapters carry no business logic. Every remote call is expected to be
//! bounded in time; [`TimedStore`] wraps any adapter with per-operation
//! deadlines so a hung store resolves as [`StoreError::Timeout`] instead of
//! blocking the caller.

mod memory;
mod redis;
mod timed;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use timed::{StoreTimeouts, TimedStore};

/// Error taxonomy for store operations.
///
/// Callers above the adapter treat every variant the same way: a read
/// degrades to a miss, a write surfaces a discardable failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
    #[error("store operation `{op}` timed out after {}ms", timeout.as_millis())]
    Timeout { op: &'static str, timeout: Duration },
    #[error("payload encoding failed: {message}")]
    Encode { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn timeout(op: &'static str, timeout: Duration) -> Self {
        Self::Timeout { op, timeout }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }
}

/// One page of a cursor scan.
///
/// `cursor` is `None` once the scan is exhausted. The cursor value is opaque
/// to callers; each adapter defines its own encoding.
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub keys: Vec<String>,
    pub cursor: Option<String>,
}

/// Thin asynchronous interface over a remote key-value store.
///
/// Implementations must be safe for concurrent use by multiple cache
/// instances and the invalidation consumer at the same time.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Fetch the raw payload for `key`, or `None` on miss/expiry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write `value` under `key` with a store-native expiry.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError>;

    /// Remove a single key. Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove a batch of keys. Returns the number actually removed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// Incrementally list keys matching a glob `pattern`.
    ///
    /// Pass `None` to start a scan and the returned cursor to continue it.
    /// `count` is a per-page size hint, not a hard limit.
    async fn scan(
        &self,
        pattern: &str,
        cursor: Option<String>,
        count: usize,
    ) -> Result<ScanPage, StoreError>;

    /// Remaining expiry for `key`, or `None` when the key is absent or has
    /// no expiry set.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}
