use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use thiserror::Error;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_HIT_TOTAL, METRIC_INVALIDATION_MS, METRIC_MISS_TOTAL, METRIC_SELF_HEAL_TOTAL,
    METRIC_STORE_ERROR_TOTAL, METRIC_SWEEP_DELETED_TOTAL, METRIC_SWEEP_FAILED_BATCH_TOTAL,
};
use crate::config::{LogFormat, LoggingSettings};

static METRIC_DESCRIPTIONS: Once = Once::new();

#[derive(Debug, Error)]
#[error("telemetry initialization failed: {0}")]
pub struct TelemetryError(String);

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), TelemetryError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| TelemetryError(format!("failed to install tracing subscriber: {err}")))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_HIT_TOTAL,
            Unit::Count,
            "Total number of cache hits, per namespace."
        );
        describe_counter!(
            METRIC_MISS_TOTAL,
            Unit::Count,
            "Total number of cache misses, per namespace."
        );
        describe_counter!(
            METRIC_SELF_HEAL_TOTAL,
            Unit::Count,
            "Total number of entries purged after failing read-side validation."
        );
        describe_counter!(
            METRIC_STORE_ERROR_TOTAL,
            Unit::Count,
            "Total number of store operation failures absorbed by the cache layer."
        );
        describe_counter!(
            METRIC_SWEEP_DELETED_TOTAL,
            Unit::Count,
            "Total number of keys removed by invalidation sweeps."
        );
        describe_counter!(
            METRIC_SWEEP_FAILED_BATCH_TOTAL,
            Unit::Count,
            "Total number of sweep batches dropped after exhausting retries."
        );
        describe_histogram!(
            METRIC_INVALIDATION_MS,
            Unit::Milliseconds,
            "Invalidation sweep latency in milliseconds."
        );
    });
}
