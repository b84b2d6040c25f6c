//! Versioned cache and invalidation layer.
//!
//! Application code caches typed values per **namespace**; each namespace
//! carries a schema version that is embedded directly in every storage key
//! (`{namespace}:v{version}:{userKey}`). Bumping a version in configuration
//! strands the old entries behind an unreachable prefix: no migration, no
//! runtime version check.
//!
//! ## Configuration
//!
//! The registry ships with the code in `strato.toml`:
//!
//! ```toml
//! [namespaces]
//! activity = 2
//! analytics = 1
//!
//! [cache]
//! default_ttl_seconds = 300
//! ```
//!
//! ## Failure policy
//!
//! Every store fault degrades: reads miss, writes return a discardable
//! error, sweeps report partial completion. Nothing in this module
//! propagates a store failure into request handling.

mod consumer;
pub mod keys;
mod maintenance;
mod registry;
mod signal;
mod sweep;
pub mod validator;
mod versioned;

pub use consumer::{InvalidationConsumer, NamespaceSweep, SweepReport};
pub use maintenance::{ClearOutcome, EntryStats, HealthReport, Maintenance};
pub use registry::{UnknownNamespace, VersionRegistry};
pub use signal::{InvalidateSignal, SIGNAL_NAME, SignalEnvelope, SignalError};
pub use sweep::{SweepOptions, SweepOutcome};
pub use validator::Validator;
pub use versioned::VersionedCache;

pub(crate) use consumer::METRIC_INVALIDATION_MS;
pub(crate) use sweep::{METRIC_SWEEP_DELETED_TOTAL, METRIC_SWEEP_FAILED_BATCH_TOTAL};
pub(crate) use versioned::{
    METRIC_HIT_TOTAL, METRIC_MISS_TOTAL, METRIC_SELF_HEAL_TOTAL, METRIC_STORE_ERROR_TOTAL,
};
