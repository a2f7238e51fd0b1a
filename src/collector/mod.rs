//! Metrics collection: store, samplers, and the periodic collector loop

pub mod monitor;
pub mod sampler;
pub mod store;

pub use monitor::{
    BreachLevel, CollectorEvent, ExportSink, JsonFileSink, MetricsCollector, MetricsDump,
    MetricsReport, MetricsSummary, ThresholdBreach,
};
pub use sampler::{ApplicationProbe, SystemSampler};
pub use store::{MetricStore, StoreCounts};
