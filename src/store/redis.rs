//! Redis store adapter.
//!
//! A thin wrapper over [`redis::aio::ConnectionManager`]: get, set-with-TTL,
//! delete, batched delete and incremental SCAN. The manager multiplexes one
//! connection and reconnects on failure, so clones are cheap and safe to use
//! concurrently from every cache instance and the invalidation consumer.
//!
//! This adapter performs no deadline enforcement of its own; compose it with
//! [`TimedStore`](super::TimedStore) for production use.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use super::{ScanPage, StoreAdapter, StoreError};

/// [`StoreAdapter`] backed by a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the store at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|err| StoreError::unavailable(format!("invalid store url: {err}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|err| StoreError::unavailable(format!("connect: {err}")))?;

        info!(url, "Connected to backing store");
        Ok(Self { conn })
    }
}

fn store_err(op: &'static str) -> impl FnOnce(redis::RedisError) -> StoreError {
    move |err| StoreError::unavailable(format!("{op}: {err}"))
}

#[async_trait]
impl StoreAdapter for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(store_err("get"))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        // SETEX rejects a zero expiry; clamp to the smallest the store accepts.
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, seconds)
            .await
            .map_err(store_err("set"))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await.map_err(store_err("delete"))?;
        Ok(removed > 0)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(keys).await.map_err(store_err("delete_many"))?;
        Ok(removed.max(0) as u64)
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: Option<String>,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        let cursor: u64 = match cursor.as_deref() {
            Some(raw) => raw
                .parse()
                .map_err(|_| StoreError::unavailable(format!("scan: invalid cursor `{raw}`")))?,
            None => 0,
        };

        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1));
        let (next, keys): (u64, Vec<String>) = cmd
            .query_async(&mut conn)
            .await
            .map_err(store_err("scan"))?;

        Ok(ScanPage {
            keys,
            cursor: (next != 0).then(|| next.to_string()),
        })
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn.clone();
        // TTL returns -2 for a missing key and -1 for a key without expiry.
        let seconds: i64 = conn.ttl(key).await.map_err(store_err("ttl"))?;
        if seconds > 0 {
            Ok(Some(Duration::from_secs(seconds as u64)))
        } else {
            Ok(None)
        }
    }
}
