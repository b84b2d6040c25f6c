//! Batched scan-and-delete.
//!
//! Shared by the invalidation consumer and the maintenance `clear` surface.
//! The loop scans the store in small pages and deletes each page before
//! moving the cursor, so a bulk invalidation never holds the shared store
//! for long stretches. Transient store errors are retried with exponential
//! backoff at the batch level; a batch that keeps failing is recorded and
//! the sweep moves on. Leftover stale-version keys are unreachable anyway,
//! so incompleteness costs memory, not correctness.

use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use crate::store::{StoreAdapter, StoreError};

pub(crate) const METRIC_SWEEP_DELETED_TOTAL: &str = "strato_sweep_deleted_total";
pub(crate) const METRIC_SWEEP_FAILED_BATCH_TOTAL: &str = "strato_sweep_failed_batch_total";

const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_BACKOFF_INITIAL_MS: u64 = 50;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

// Consecutive delete failures before the sweep gives up on the pattern
// entirely; keeps a persistently failing store from spinning the loop.
const CONSECUTIVE_FAILURE_LIMIT: u32 = 8;

/// Tuning for one sweep: page size and per-batch retry policy.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Keys per scan page and per delete batch.
    pub batch_size: usize,
    /// First backoff delay; doubles on every further attempt.
    pub backoff_initial: Duration,
    /// Attempts per batch before it is recorded as failed.
    pub max_attempts: u32,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            backoff_initial: Duration::from_millis(DEFAULT_BACKOFF_INITIAL_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Result of sweeping one pattern.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub deleted: u64,
    pub failed_batches: u32,
    /// False when the scan aborted before cursor exhaustion.
    pub complete: bool,
}

/// Delete every key matching `pattern`, in pages of `opts.batch_size`.
pub(crate) async fn sweep_pattern(
    store: &dyn StoreAdapter,
    pattern: &str,
    opts: &SweepOptions,
) -> SweepOutcome {
    let mut outcome = SweepOutcome {
        deleted: 0,
        failed_batches: 0,
        complete: true,
    };
    let mut cursor: Option<String> = None;
    let mut consecutive_failures = 0u32;

    loop {
        let page = match retry(opts, "scan", || {
            store.scan(pattern, cursor.clone(), opts.batch_size)
        })
        .await
        {
            Ok(page) => page,
            Err(err) => {
                warn!(pattern, error = %err, "Sweep scan failed after retries; aborting pattern");
                outcome.complete = false;
                break;
            }
        };

        if !page.keys.is_empty() {
            match retry(opts, "delete_many", || store.delete_many(&page.keys)).await {
                Ok(count) => {
                    outcome.deleted += count;
                    consecutive_failures = 0;
                    counter!(METRIC_SWEEP_DELETED_TOTAL).increment(count);
                }
                Err(err) => {
                    outcome.failed_batches += 1;
                    consecutive_failures += 1;
                    counter!(METRIC_SWEEP_FAILED_BATCH_TOTAL).increment(1);
                    warn!(
                        pattern,
                        batch_len = page.keys.len(),
                        error = %err,
                        "Sweep batch delete failed after retries; continuing"
                    );
                    if consecutive_failures >= CONSECUTIVE_FAILURE_LIMIT {
                        warn!(pattern, "Too many consecutive batch failures; aborting pattern");
                        outcome.complete = false;
                        break;
                    }
                }
            }
        }

        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    outcome
}

async fn retry<T, F, Fut>(opts: &SweepOptions, op: &'static str, mut call: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = opts.max_attempts.max(1);
    let mut backoff = opts.backoff_initial;
    let mut attempt = 1u32;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts => {
                debug!(
                    op,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Sweep store call failed; backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
