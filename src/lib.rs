//! strato: a versioned cache and invalidation layer for Redis-backed
//! services.
//!
//! Cached values live under `{namespace}:v{version}:{userKey}` keys; the
//! schema version comes from an immutable per-process registry, so a version
//! bump at deploy time strands old entries behind an unreachable prefix
//! instead of requiring migration. Reads validate and self-heal, every store
//! fault degrades to a miss, and deployment tooling triggers batched bulk
//! invalidation through a fire-and-forget signal.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use strato::cache::{VersionedCache, VersionRegistry, validator};
//! use strato::store::{RedisStore, StoreAdapter, StoreTimeouts, TimedStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn StoreAdapter> = Arc::new(TimedStore::new(
//!     RedisStore::connect("redis://127.0.0.1:6379").await?,
//!     StoreTimeouts::default(),
//! ));
//! let registry = VersionRegistry::new([("activity".to_string(), 2)].into());
//!
//! let feed: VersionedCache<serde_json::Value> = VersionedCache::new(
//!     "activity",
//!     store,
//!     &registry,
//!     validator::array_with_fields(&["id"]),
//!     Duration::from_secs(300),
//! )?;
//!
//! feed.set("feed:all", &serde_json::json!([{"id": "a"}]), None).await.ok();
//! let cached = feed.get("feed:all").await;
//! # let _ = cached;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod store;
pub mod telemetry;
