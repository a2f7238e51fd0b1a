//! Vigil - Observability core for a trading platform
//!
//! Vigil collects system and application metrics, diagnoses problems from
//! their histories, and raises alerts through configurable notification
//! channels.
//!
//! ## Architecture
//! - **MetricStore**: bounded, time-windowed retention per metric family
//! - **MetricsCollector**: periodic snapshots + threshold breach events
//! - **DiagnosticEngine**: baselines, anomaly scoring, issue detectors,
//!   cross-issue correlation
//! - **AlertManager**: rule evaluation with a duration gate, deterministic
//!   alert identity, severity-filtered channels, rate-limited dispatch
//!
//! Data flows Collector -> MetricStore -> {DiagnosticEngine, AlertManager};
//! downstream consumers read issues and alerts through read-only queries.
//!
//! ## Core Modules
//! - `core`: shared types (severity, snapshots, samples) and errors
//! - `config`: layered configuration (file + `VIGIL_` env overrides)
//! - `collector`: store, samplers, and the collection loop
//! - `diagnostics`: baselines, anomalies, detectors, engine
//! - `alerting`: rules, alerts, channels, dispatch, persistence

pub mod alerting;
pub mod collector;
pub mod config;
pub mod core;
pub mod diagnostics;
pub mod logging;

pub use alerting::{Alert, AlertManager, AlertRule, NotificationChannel};
pub use collector::{MetricStore, MetricsCollector};
pub use config::Config;
pub use core::{
    ApplicationSnapshot, MetricSample, MonitorError, MonitorResult, Severity, SystemSnapshot,
};
pub use diagnostics::{DiagnosticEngine, Issue};
pub use logging::init_logging;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::alerting::{
        Alert, AlertManager, AlertRule, AlertStatus, ChannelKind, Condition, NotificationChannel,
    };
    pub use crate::collector::{ApplicationProbe, MetricStore, MetricsCollector};
    pub use crate::config::Config;
    pub use crate::core::{
        ApplicationSnapshot, MetricSample, MonitorError, MonitorResult, Severity, SystemSnapshot,
    };
    pub use crate::diagnostics::{DiagnosticEngine, Issue, IssueDetector};
}
