//! Metrics definitions for the notifier.

use shared::metrics_defs::{MetricDef, MetricType};

pub const PIPELINE_DURATION: MetricDef = MetricDef {
    name: "pipeline.duration",
    metric_type: MetricType::Histogram,
    description: "Time to build (and optionally dispatch) a notification in seconds. \
                  Tagged with endpoint, status.",
};

pub const IDENTITY_CACHE_HIT: MetricDef = MetricDef {
    name: "identity.cache.hit",
    metric_type: MetricType::Counter,
    description: "Authors resolved directly from the identity cache",
};

pub const IDENTITY_CACHE_MISS: MetricDef = MetricDef {
    name: "identity.cache.miss",
    metric_type: MetricType::Counter,
    description: "Authors whose email was not in the identity cache",
};

pub const IDENTITY_DIRECTORY_LOADS: MetricDef = MetricDef {
    name: "identity.directory.loads",
    metric_type: MetricType::Counter,
    description: "Chat directory loads. Tagged with status.",
};

pub const IDENTITY_DIRECTORY_SIZE: MetricDef = MetricDef {
    name: "identity.directory.size",
    metric_type: MetricType::Gauge,
    description: "Number of entries in the identity cache",
};

pub const IDENTITY_FALLBACK: MetricDef = MetricDef {
    name: "identity.fallback",
    metric_type: MetricType::Counter,
    description: "Fallback lookups through the CI user profile. Tagged with outcome.",
};

pub const NOTIFICATIONS_SENT: MetricDef = MetricDef {
    name: "notifications.sent",
    metric_type: MetricType::Counter,
    description: "Messages dispatched to the chat system. Tagged with status.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    PIPELINE_DURATION,
    IDENTITY_CACHE_HIT,
    IDENTITY_CACHE_MISS,
    IDENTITY_DIRECTORY_LOADS,
    IDENTITY_DIRECTORY_SIZE,
    IDENTITY_FALLBACK,
    NOTIFICATIONS_SENT,
];
