//! In-memory store adapter.
//!
//! Backs the test suites and single-node development. Expiry is checked on
//! access against a stored deadline; there is no sweeper task, matching the
//! store-native TTL contract of the remote adapters.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{ScanPage, StoreAdapter, StoreError};

struct MemEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// HashMap-backed [`StoreAdapter`] with on-access expiry.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries. Test helper.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|entry| !entry.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let entry = MemEntry {
            data: value.to_vec(),
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let mut removed = 0;
        for key in keys {
            if entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: Option<String>,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<&String> = entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired() && pattern_matches(pattern, key))
            .map(|(key, _)| key)
            .collect();
        matching.sort();

        // The cursor is the last key of the previous page; sorted seek keeps
        // the scan correct while pages are being deleted underneath it.
        let start = match cursor.as_deref() {
            Some(last) => matching.partition_point(|key| key.as_str() <= last),
            None => 0,
        };
        let keys: Vec<String> = matching[start..]
            .iter()
            .take(count.max(1))
            .map(|key| (*key).clone())
            .collect();
        let cursor = if start + keys.len() < matching.len() {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ScanPage { keys, cursor })
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let entries = self.entries.read().await;
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        if entry.is_expired() {
            return Ok(None);
        }
        Ok(entry
            .expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now())))
    }
}

/// Glob matching with `*` wildcards, enough for the key patterns this crate
/// produces (`ns:v*:*`, `ns:v*:user:key`).
fn pattern_matches(pattern: &str, key: &str) -> bool {
    let mut segments = pattern.split('*');
    let Some(first) = segments.next() else {
        return pattern == key;
    };
    if !key.starts_with(first) {
        return false;
    }
    let mut rest = &key[first.len()..];

    let mut middles: Vec<&str> = segments.collect();
    let Some(last) = middles.pop() else {
        // No `*` in the pattern: exact match only.
        return rest.is_empty();
    };

    if !rest.ends_with(last) {
        return false;
    }
    rest = &rest[..rest.len() - last.len()];

    for part in middles {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}
