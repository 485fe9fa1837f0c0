//! Process-wide tracing subscriber and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing::{Subscriber, level_filters::LevelFilter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::application::stock_sync::{
    METRIC_CACHE_PRIME_MS, METRIC_CACHE_SYNC_MS, METRIC_CACHE_WRITE_FAILURES, METRIC_CACHE_WRITES,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricKind {
    Counter,
    Histogram,
}

struct MetricDescription {
    name: &'static str,
    kind: MetricKind,
    unit: Unit,
    help: &'static str,
}

const METRICS: [MetricDescription; 4] = [
    MetricDescription {
        name: METRIC_CACHE_WRITES,
        kind: MetricKind::Counter,
        unit: Unit::Count,
        help: "Stock cache meta writes that succeeded.",
    },
    MetricDescription {
        name: METRIC_CACHE_WRITE_FAILURES,
        kind: MetricKind::Counter,
        unit: Unit::Count,
        help: "Stock cache meta writes that failed.",
    },
    MetricDescription {
        name: METRIC_CACHE_SYNC_MS,
        kind: MetricKind::Histogram,
        unit: Unit::Milliseconds,
        help: "Time to write every cache key of one variation.",
    },
    MetricDescription {
        name: METRIC_CACHE_PRIME_MS,
        kind: MetricKind::Histogram,
        unit: Unit::Milliseconds,
        help: "Time to rebuild the cache for the whole catalog.",
    },
];

/// Install the global subscriber. `RUST_LOG` directives refine the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::registry()
        .with(level_filter(logging.level, directives.as_deref()))
        .with(ErrorLayer::default())
        .with(output_layer(logging.format))
        .try_init()
        .map_err(InfraError::Subscriber)
}

fn level_filter(level: LevelFilter, directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(directives.unwrap_or_default())
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    }
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        for metric in &METRICS {
            match metric.kind {
                MetricKind::Counter => describe_counter!(metric.name, metric.unit, metric.help),
                MetricKind::Histogram => {
                    describe_histogram!(metric.name, metric.unit, metric.help)
                }
            }
        }
    });
}
