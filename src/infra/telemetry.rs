use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_CACHE_COALESCED, METRIC_CACHE_DISCARDED, METRIC_CACHE_ENTRIES, METRIC_CACHE_EXPIRED,
    METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATED, METRIC_CACHE_MISS, METRIC_CACHE_PRODUCER_ERROR,
    METRIC_CACHE_PRODUCER_MS, METRIC_CACHE_SWEPT,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
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
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of cached reads served from a live entry."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of cached reads that ran their producer."
        );
        describe_counter!(
            METRIC_CACHE_EXPIRED,
            Unit::Count,
            "Total number of entries found expired and removed on read."
        );
        describe_counter!(
            METRIC_CACHE_COALESCED,
            Unit::Count,
            "Total number of reads served by another caller's recomputation."
        );
        describe_counter!(
            METRIC_CACHE_PRODUCER_ERROR,
            Unit::Count,
            "Total number of producer failures and timeouts (never cached)."
        );
        describe_counter!(
            METRIC_CACHE_DISCARDED,
            Unit::Count,
            "Total number of fresh results dropped because their tags were invalidated mid-flight."
        );
        describe_counter!(
            METRIC_CACHE_INVALIDATED,
            Unit::Count,
            "Total number of tag invalidations, labelled by tag."
        );
        describe_counter!(
            METRIC_CACHE_SWEPT,
            Unit::Count,
            "Total number of expired entries reclaimed by the sweeper."
        );
        describe_gauge!(
            METRIC_CACHE_ENTRIES,
            Unit::Count,
            "Current number of stored cache entries."
        );
        describe_histogram!(
            METRIC_CACHE_PRODUCER_MS,
            Unit::Milliseconds,
            "Producer latency on cache misses in milliseconds."
        );
    });
}
