use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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

    // stdout carries command output.
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
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
        describe_histogram!(
            "notion_feed_fetch_ms",
            Unit::Milliseconds,
            "Latency of a full posts fetch in milliseconds."
        );
        describe_counter!(
            "notion_feed_posts_discarded_total",
            Unit::Count,
            "Total number of database rows skipped for lacking properties."
        );
        describe_counter!(
            "notion_feed_cache_hit_total",
            Unit::Count,
            "Total number of posts cache hits."
        );
        describe_counter!(
            "notion_feed_cache_miss_total",
            Unit::Count,
            "Total number of posts cache misses, including expired entries."
        );
        describe_counter!(
            "notion_feed_cache_evict_total",
            Unit::Count,
            "Total number of posts cache evictions due to capacity."
        );
        describe_counter!(
            "notion_feed_notion_requests_total",
            Unit::Count,
            "Total number of requests sent to the Notion API."
        );
    });
}
