//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::BTreeMap,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{SweepOptions, VersionRegistry};
use crate::store::StoreTimeouts;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "strato";
const DEFAULT_STORE_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_SINGLE_OP_TIMEOUT_MS: u64 = 250;
const DEFAULT_BULK_OP_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_SWEEP_BATCH_SIZE: usize = 100;
const DEFAULT_SWEEP_BACKOFF_INITIAL_MS: u64 = 50;
const DEFAULT_SWEEP_MAX_ATTEMPTS: u32 = 5;

/// Command-line arguments for the `strato` maintenance binary.
#[derive(Debug, Parser)]
#[command(name = "strato", version, about = "Versioned cache maintenance CLI")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "STRATO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Delete a namespace's entries across every version segment.
    Clear {
        /// Namespace to clear; omit to clear every configured namespace.
        #[arg(value_name = "NAMESPACE")]
        namespace: Option<String>,
    },
    /// List stored keys matching a glob pattern.
    Keys {
        /// Key pattern; defaults to `*`.
        #[arg(value_name = "PATTERN")]
        pattern: Option<String>,
    },
    /// Probe the backing store and report round-trip latency.
    Health,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the backing store connection URL.
    #[arg(long = "store-url", env = "STRATO_STORE_URL", value_name = "URL")]
    pub store_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub invalidation: InvalidationSettings,
    pub logging: LoggingSettings,
    /// Namespace → schema version table; ships with code in `strato.toml`,
    /// never via environment, since it changes with deployments of code.
    pub namespaces: BTreeMap<String, u32>,
}

impl Settings {
    /// Build the immutable registry from the configured table.
    pub fn registry(&self) -> VersionRegistry {
        VersionRegistry::new(self.namespaces.clone())
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub url: String,
    pub timeouts: StoreTimeouts,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub default_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct InvalidationSettings {
    pub batch_size: NonZeroUsize,
    pub backoff_initial: Duration,
    pub max_attempts: u32,
}

impl InvalidationSettings {
    pub fn sweep_options(&self) -> SweepOptions {
        SweepOptions {
            batch_size: self.batch_size.get(),
            backoff_initial: self.backoff_initial,
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("STRATO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    store: RawStoreSettings,
    cache: RawCacheSettings,
    invalidation: RawInvalidationSettings,
    logging: RawLoggingSettings,
    namespaces: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    url: Option<String>,
    single_op_timeout_ms: Option<u64>,
    bulk_op_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    default_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawInvalidationSettings {
    batch_size: Option<usize>,
    backoff_initial_ms: Option<u64>,
    backoff_max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(url) = overrides.store_url.as_ref() {
            self.store.url = Some(url.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            store,
            cache,
            invalidation,
            logging,
            namespaces,
        } = raw;

        let store = build_store_settings(store)?;
        let cache = build_cache_settings(cache)?;
        let invalidation = build_invalidation_settings(invalidation)?;
        let logging = build_logging_settings(logging)?;
        validate_namespaces(&namespaces)?;

        Ok(Self {
            store,
            cache,
            invalidation,
            logging,
            namespaces,
        })
    }
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let url = store
        .url
        .and_then(|value| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| DEFAULT_STORE_URL.to_string());

    let single_ms = store
        .single_op_timeout_ms
        .unwrap_or(DEFAULT_SINGLE_OP_TIMEOUT_MS);
    if single_ms == 0 {
        return Err(LoadError::invalid(
            "store.single_op_timeout_ms",
            "must be greater than zero",
        ));
    }

    let bulk_ms = store.bulk_op_timeout_ms.unwrap_or(DEFAULT_BULK_OP_TIMEOUT_MS);
    if bulk_ms == 0 {
        return Err(LoadError::invalid(
            "store.bulk_op_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(StoreSettings {
        url,
        timeouts: StoreTimeouts {
            single_op: Duration::from_millis(single_ms),
            bulk_op: Duration::from_millis(bulk_ms),
        },
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_seconds = cache.default_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.default_ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        default_ttl: Duration::from_secs(ttl_seconds),
    })
}

fn build_invalidation_settings(
    invalidation: RawInvalidationSettings,
) -> Result<InvalidationSettings, LoadError> {
    let batch_value = invalidation.batch_size.unwrap_or(DEFAULT_SWEEP_BATCH_SIZE);
    let batch_size = NonZeroUsize::new(batch_value).ok_or_else(|| {
        LoadError::invalid("invalidation.batch_size", "must be greater than zero")
    })?;

    let backoff_ms = invalidation
        .backoff_initial_ms
        .unwrap_or(DEFAULT_SWEEP_BACKOFF_INITIAL_MS);
    if backoff_ms == 0 {
        return Err(LoadError::invalid(
            "invalidation.backoff_initial_ms",
            "must be greater than zero",
        ));
    }

    let max_attempts = invalidation
        .backoff_max_attempts
        .unwrap_or(DEFAULT_SWEEP_MAX_ATTEMPTS);
    if max_attempts == 0 {
        return Err(LoadError::invalid(
            "invalidation.backoff_max_attempts",
            "must be greater than zero",
        ));
    }

    Ok(InvalidationSettings {
        batch_size,
        backoff_initial: Duration::from_millis(backoff_ms),
        max_attempts,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn validate_namespaces(namespaces: &BTreeMap<String, u32>) -> Result<(), LoadError> {
    for (namespace, version) in namespaces {
        if namespace.is_empty() {
            return Err(LoadError::invalid(
                "namespaces",
                "namespace names must not be empty",
            ));
        }
        if namespace.contains('*') {
            return Err(LoadError::invalid(
                "namespaces",
                format!("namespace `{namespace}` must not contain `*`"),
            ));
        }
        if *version == 0 {
            return Err(LoadError::invalid(
                "namespaces",
                format!("namespace `{namespace}` version must be a positive integer"),
            ));
        }
    }
    Ok(())
}
