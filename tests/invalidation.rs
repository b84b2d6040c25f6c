//! Invalidation flow: a deployment signal through the consumer task wipes
//! the targeted namespaces, and partial store failures are reported without
//! ever failing the signal.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use strato::cache::{
    InvalidateSignal, InvalidationConsumer, SignalEnvelope, SweepOptions, VersionRegistry,
};
use strato::store::{MemoryStore, ScanPage, StoreAdapter, StoreError};

fn registry() -> Arc<VersionRegistry> {
    let mut versions = BTreeMap::new();
    versions.insert("activity".to_string(), 3);
    versions.insert("analytics".to_string(), 1);
    Arc::new(VersionRegistry::new(versions))
}

async fn seed(store: &dyn StoreAdapter, keys: &[&str]) {
    for key in keys {
        store
            .set(key, b"payload", Duration::from_secs(300))
            .await
            .unwrap();
    }
}

fn deploy_signal(namespaces: Option<Vec<&str>>) -> InvalidateSignal {
    InvalidateSignal {
        reason: "deploy".to_string(),
        namespaces: namespaces.map(|list| list.into_iter().map(str::to_string).collect()),
        correlation_id: "deploy-2041".to_string(),
        timestamp: 1_738_000_000_000,
    }
}

#[tokio::test]
async fn wire_signal_through_consumer_task_empties_namespace() {
    let store = Arc::new(MemoryStore::new());
    seed(
        store.as_ref(),
        &[
            "activity:v3:feed:all",
            "activity:v3:feed:top",
            "activity:v2:feed:all",
            "analytics:v1:daily",
        ],
    )
    .await;

    let consumer = Arc::new(InvalidationConsumer::new(
        store.clone(),
        registry(),
        SweepOptions::default(),
    ));
    let (tx, rx) = mpsc::channel(4);
    let handle = InvalidationConsumer::spawn(consumer, rx);

    // The exact JSON shape deployment tooling emits.
    let raw = r#"{
        "name": "cache.invalidate",
        "data": {
            "reason": "deploy",
            "namespaces": ["activity"],
            "correlationId": "deploy-2041",
            "timestamp": 1738000000000
        }
    }"#;
    tx.send(SignalEnvelope::parse(raw).unwrap()).await.unwrap();
    drop(tx);
    handle.await.unwrap();

    // Every activity key is gone, regardless of version segment.
    assert_eq!(store.get("activity:v3:feed:all").await.unwrap(), None);
    assert_eq!(store.get("activity:v3:feed:top").await.unwrap(), None);
    assert_eq!(store.get("activity:v2:feed:all").await.unwrap(), None);
    // Untargeted namespaces are untouched.
    assert!(store.get("analytics:v1:daily").await.unwrap().is_some());
}

#[tokio::test]
async fn omitted_namespaces_field_targets_all_configured() {
    let store = Arc::new(MemoryStore::new());
    seed(
        store.as_ref(),
        &["activity:v3:feed:all", "analytics:v1:daily"],
    )
    .await;

    let consumer = InvalidationConsumer::new(store.clone(), registry(), SweepOptions::default());
    let report = consumer.handle(deploy_signal(None)).await;

    assert_eq!(report.namespaces.len(), 2);
    assert_eq!(report.total_deleted(), 2);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn sweep_uses_many_small_batches() {
    let store = Arc::new(MemoryStore::new());
    for idx in 0..57 {
        store
            .set(
                &format!("activity:v3:item:{idx:03}"),
                b"x",
                Duration::from_secs(300),
            )
            .await
            .unwrap();
    }

    let consumer = InvalidationConsumer::new(
        store.clone(),
        registry(),
        SweepOptions {
            batch_size: 10,
            ..Default::default()
        },
    );
    let report = consumer.handle(deploy_signal(Some(vec!["activity"]))).await;

    assert!(!report.partial);
    assert_eq!(report.total_deleted(), 57);
    assert!(store.is_empty().await);
}

/// Store whose batched deletes always fail; scans and writes work.
struct DeleteBrokenStore {
    inner: MemoryStore,
}

#[async_trait]
impl StoreAdapter for DeleteBrokenStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn delete_many(&self, _keys: &[String]) -> Result<u64, StoreError> {
        Err(StoreError::unavailable("DEL refused"))
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: Option<String>,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        self.inner.scan(pattern, cursor, count).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.inner.ttl(key).await
    }
}

#[tokio::test(start_paused = true)]
async fn partial_failure_is_reported_not_fatal() {
    let store = Arc::new(DeleteBrokenStore {
        inner: MemoryStore::new(),
    });
    seed(store.as_ref(), &["activity:v3:feed:all"]).await;

    let consumer = InvalidationConsumer::new(store.clone(), registry(), SweepOptions::default());
    let report = consumer.handle(deploy_signal(Some(vec!["activity"]))).await;

    assert!(report.partial);
    assert_eq!(report.total_deleted(), 0);
    assert!(report.namespaces[0].failed_batches >= 1);
    // The consumer is back to Idle and the signal was fully processed; the
    // surviving key is already unreachable once the registry advances.
    assert!(!consumer.is_invalidating());
    assert!(store.get("activity:v3:feed:all").await.unwrap().is_some());
}

#[tokio::test]
async fn report_carries_signal_identity() {
    let store = Arc::new(MemoryStore::new());
    let consumer = InvalidationConsumer::new(store, registry(), SweepOptions::default());

    let report = consumer.handle(deploy_signal(Some(vec!["activity"]))).await;

    assert_eq!(report.reason, "deploy");
    assert_eq!(report.correlation_id, "deploy-2041");
}
