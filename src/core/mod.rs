//! Shared types and error taxonomy

pub mod errors;
pub mod types;

pub use errors::{MonitorError, MonitorResult};
pub use types::{ApplicationSnapshot, MetricSample, Severity, SystemSnapshot};
