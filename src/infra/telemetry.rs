use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
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
            "contentgate_cache_hit_total",
            Unit::Count,
            "Total number of content cache hits."
        );
        describe_counter!(
            "contentgate_cache_miss_total",
            Unit::Count,
            "Total number of content cache misses."
        );
        describe_counter!(
            "contentgate_cache_expired_total",
            Unit::Count,
            "Total number of content cache entries dropped after their TTL."
        );
        describe_counter!(
            "contentgate_cache_evict_total",
            Unit::Count,
            "Total number of content cache evictions due to capacity."
        );
        describe_counter!(
            "contentgate_cache_invalidated_total",
            Unit::Count,
            "Total number of content cache entries removed by tag invalidation."
        );
        describe_counter!(
            "contentgate_backend_error_total",
            Unit::Count,
            "Total number of failed content backend calls by error kind."
        );
        describe_counter!(
            "contentgate_revalidation_total",
            Unit::Count,
            "Total number of revalidation runs by trigger and outcome."
        );
    });
}
