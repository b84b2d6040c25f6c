//! Invalidation consumer.
//!
//! Two states: **Idle** and **Invalidating**. A signal moves the consumer to
//! Invalidating for exactly one bounded sweep over the target namespaces,
//! then back to Idle, success or partial. There is no persistent polling
//! loop; signals arrive over an mpsc channel and the task exits when the
//! producer side is dropped, which also makes shutdown cancellation safe
//! (a half-finished sweep only leaves unreachable keys behind).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use metrics::histogram;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::store::StoreAdapter;

use super::keys;
use super::registry::VersionRegistry;
use super::signal::InvalidateSignal;
use super::sweep::{SweepOptions, sweep_pattern};

pub(crate) const METRIC_INVALIDATION_MS: &str = "strato_invalidation_sweep_ms";

/// Per-namespace slice of a sweep report.
#[derive(Debug, Clone)]
pub struct NamespaceSweep {
    pub namespace: String,
    pub deleted: u64,
    pub failed_batches: u32,
    pub complete: bool,
}

/// Outcome of processing one invalidation signal.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub reason: String,
    pub correlation_id: String,
    pub namespaces: Vec<NamespaceSweep>,
    /// True when any namespace sweep was incomplete or dropped batches.
    pub partial: bool,
}

impl SweepReport {
    pub fn total_deleted(&self) -> u64 {
        self.namespaces.iter().map(|ns| ns.deleted).sum()
    }
}

/// Handles `cache.invalidate` signals with a batched prefix sweep.
pub struct InvalidationConsumer {
    store: Arc<dyn StoreAdapter>,
    registry: Arc<VersionRegistry>,
    options: SweepOptions,
    invalidating: AtomicBool,
}

impl InvalidationConsumer {
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        registry: Arc<VersionRegistry>,
        options: SweepOptions,
    ) -> Self {
        Self {
            store,
            registry,
            options,
            invalidating: AtomicBool::new(false),
        }
    }

    /// Whether a sweep is currently running.
    pub fn is_invalidating(&self) -> bool {
        self.invalidating.load(Ordering::SeqCst)
    }

    /// Process one signal: sweep each target namespace and report.
    ///
    /// Partial failure is not an error: stale-version keys that survive a
    /// sweep are unreachable under the current registry version, so the
    /// report is for operators and metrics, not control flow.
    #[instrument(skip(self, signal), fields(correlation_id = %signal.correlation_id))]
    pub async fn handle(&self, signal: InvalidateSignal) -> SweepReport {
        let targets = self.resolve_targets(&signal);
        let sweep_id = Uuid::new_v4();

        self.invalidating.store(true, Ordering::SeqCst);
        let started = Instant::now();
        info!(
            sweep_id = %sweep_id,
            reason = signal.reason.as_str(),
            namespace_count = targets.len(),
            "Invalidation sweep starting"
        );

        let mut namespaces = Vec::with_capacity(targets.len());
        for namespace in &targets {
            let pattern = keys::namespace_pattern(namespace);
            let outcome = sweep_pattern(self.store.as_ref(), &pattern, &self.options).await;
            debug!(
                namespace,
                deleted = outcome.deleted,
                failed_batches = outcome.failed_batches,
                "Namespace sweep finished"
            );
            namespaces.push(NamespaceSweep {
                namespace: namespace.clone(),
                deleted: outcome.deleted,
                failed_batches: outcome.failed_batches,
                complete: outcome.complete,
            });
        }

        let partial = namespaces
            .iter()
            .any(|ns| !ns.complete || ns.failed_batches > 0);
        let report = SweepReport {
            sweep_id,
            reason: signal.reason,
            correlation_id: signal.correlation_id,
            namespaces,
            partial,
        };

        histogram!(METRIC_INVALIDATION_MS)
            .record(started.elapsed().as_secs_f64() * 1000.0);
        if partial {
            warn!(
                sweep_id = %sweep_id,
                deleted = report.total_deleted(),
                "Invalidation sweep finished with partial failures"
            );
        } else {
            info!(
                sweep_id = %sweep_id,
                deleted = report.total_deleted(),
                "Invalidation sweep complete"
            );
        }

        self.invalidating.store(false, Ordering::SeqCst);
        report
    }

    /// Spawn the consuming task. One signal at a time, in arrival order;
    /// the task stops when every sender is dropped.
    pub fn spawn(
        consumer: Arc<Self>,
        mut signals: mpsc::Receiver<InvalidateSignal>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                consumer.handle(signal).await;
            }
            debug!("Invalidation consumer stopped: signal channel closed");
        })
    }

    fn resolve_targets(&self, signal: &InvalidateSignal) -> Vec<String> {
        match &signal.namespaces {
            Some(requested) => requested
                .iter()
                .filter(|namespace| {
                    let known = self.registry.contains(namespace);
                    if !known {
                        warn!(
                            namespace = namespace.as_str(),
                            correlation_id = signal.correlation_id.as_str(),
                            "Skipping unregistered namespace in invalidation signal"
                        );
                    }
                    known
                })
                .cloned()
                .collect(),
            None => self.registry.namespaces().map(str::to_string).collect(),
        }
    }
}
