use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metrics collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Sampling interval (seconds)
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    /// How long retained points stay queryable (hours)
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    /// Hard capacity bound per metric ring
    #[serde(default = "default_max_points")]
    pub max_points_per_metric: usize,

    /// Sample host metrics via sysinfo
    #[serde(default = "default_true")]
    pub enable_system_metrics: bool,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            collection_interval_secs: default_collection_interval(),
            retention_hours: default_retention_hours(),
            max_points_per_metric: default_max_points(),
            enable_system_metrics: true,
            export: ExportConfig::default(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

/// Periodic snapshot export to a JSON sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_export_path")]
    pub file_path: PathBuf,

    #[serde(default = "default_export_interval")]
    pub export_interval_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file_path: default_export_path(),
            export_interval_secs: default_export_interval(),
        }
    }
}

/// Warning/critical bounds checked against every snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_cpu_warning")]
    pub cpu_warning: f64,
    #[serde(default = "default_cpu_critical")]
    pub cpu_critical: f64,
    #[serde(default = "default_memory_warning")]
    pub memory_warning: f64,
    #[serde(default = "default_memory_critical")]
    pub memory_critical: f64,
    #[serde(default = "default_disk_warning")]
    pub disk_warning: f64,
    #[serde(default = "default_disk_critical")]
    pub disk_critical: f64,
    #[serde(default = "default_response_time_warning")]
    pub response_time_warning: f64,
    #[serde(default = "default_response_time_critical")]
    pub response_time_critical: f64,
    #[serde(default = "default_error_rate_warning")]
    pub error_rate_warning: f64,
    #[serde(default = "default_error_rate_critical")]
    pub error_rate_critical: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu_warning: default_cpu_warning(),
            cpu_critical: default_cpu_critical(),
            memory_warning: default_memory_warning(),
            memory_critical: default_memory_critical(),
            disk_warning: default_disk_warning(),
            disk_critical: default_disk_critical(),
            response_time_warning: default_response_time_warning(),
            response_time_critical: default_response_time_critical(),
            error_rate_warning: default_error_rate_warning(),
            error_rate_critical: default_error_rate_critical(),
        }
    }
}

/// Diagnostic engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticConfig {
    /// Periodic analysis interval (seconds)
    #[serde(default = "default_analysis_interval")]
    pub analysis_interval_secs: u64,

    /// Snapshots per baseline window
    #[serde(default = "default_baseline_window")]
    pub baseline_window: usize,

    /// Outlier gate in standard deviations
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,

    /// Points per trend regression
    #[serde(default = "default_trend_points")]
    pub trend_analysis_points: usize,

    /// Issues closer than this merge when categories relate (seconds)
    #[serde(default = "default_correlation_window")]
    pub correlation_window_secs: i64,

    #[serde(default = "default_true")]
    pub enable_correlation: bool,

    /// Issues below this confidence are dropped
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Result length cap per analysis pass
    #[serde(default = "default_max_issues")]
    pub max_issues_per_analysis: usize,

    #[serde(default)]
    pub baselines: PerformanceBaselines,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            analysis_interval_secs: default_analysis_interval(),
            baseline_window: default_baseline_window(),
            anomaly_threshold: default_anomaly_threshold(),
            trend_analysis_points: default_trend_points(),
            correlation_window_secs: default_correlation_window(),
            enable_correlation: true,
            confidence_threshold: default_confidence_threshold(),
            max_issues_per_analysis: default_max_issues(),
            baselines: PerformanceBaselines::default(),
        }
    }
}

/// Reference levels for "normal" operation, used by the issue detectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceBaselines {
    #[serde(default = "default_cpu_normal")]
    pub cpu_normal: f64,
    #[serde(default = "default_memory_normal")]
    pub memory_normal: f64,
    #[serde(default = "default_response_time_normal")]
    pub response_time_normal: f64,
    #[serde(default = "default_error_rate_normal")]
    pub error_rate_normal: f64,
    /// Database pool size assumed by the saturation detector
    #[serde(default = "default_max_db_connections")]
    pub max_db_connections: u32,
}

impl Default for PerformanceBaselines {
    fn default() -> Self {
        Self {
            cpu_normal: default_cpu_normal(),
            memory_normal: default_memory_normal(),
            response_time_normal: default_response_time_normal(),
            error_rate_normal: default_error_rate_normal(),
            max_db_connections: default_max_db_connections(),
        }
    }
}

/// Alert manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Maintenance loop interval (cleanup, grouping, persistence save)
    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval_secs: u64,

    /// Resolved alerts and history entries older than this are purged (hours)
    #[serde(default = "default_alert_retention_hours")]
    pub retention_hours: u64,

    /// History ring capacity
    #[serde(default = "default_history_capacity")]
    pub max_history: usize,

    #[serde(default = "default_true")]
    pub enable_grouping: bool,

    /// Same-severity alerts within this window associate into a group
    #[serde(default = "default_grouping_window")]
    pub grouping_window_minutes: i64,

    /// Channels every alert is offered to, before label-selected extras
    #[serde(default)]
    pub default_channels: Vec<String>,

    /// Per-channel notification cap per rolling 60s window
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,

    /// Notification worker pool size
    #[serde(default = "default_workers")]
    pub notification_workers: usize,

    /// Bounded queue feeding the worker pool
    #[serde(default = "default_queue_capacity")]
    pub notification_queue_capacity: usize,

    /// Alert store path; None disables persistence
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            maintenance_interval_secs: default_maintenance_interval(),
            retention_hours: default_alert_retention_hours(),
            max_history: default_history_capacity(),
            enable_grouping: true,
            grouping_window_minutes: default_grouping_window(),
            default_channels: Vec::new(),
            rate_limit_per_minute: default_rate_limit(),
            notification_workers: default_workers(),
            notification_queue_capacity: default_queue_capacity(),
            storage_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_collection_interval() -> u64 {
    5
}
fn default_retention_hours() -> u64 {
    24
}
fn default_max_points() -> usize {
    10_000
}
fn default_export_path() -> PathBuf {
    PathBuf::from("./data/metrics_export.json")
}
fn default_export_interval() -> u64 {
    300
}
fn default_cpu_warning() -> f64 {
    70.0
}
fn default_cpu_critical() -> f64 {
    90.0
}
fn default_memory_warning() -> f64 {
    80.0
}
fn default_memory_critical() -> f64 {
    95.0
}
fn default_disk_warning() -> f64 {
    85.0
}
fn default_disk_critical() -> f64 {
    95.0
}
fn default_response_time_warning() -> f64 {
    1.0
}
fn default_response_time_critical() -> f64 {
    3.0
}
fn default_error_rate_warning() -> f64 {
    0.05
}
fn default_error_rate_critical() -> f64 {
    0.1
}
fn default_analysis_interval() -> u64 {
    60
}
fn default_baseline_window() -> usize {
    50
}
fn default_anomaly_threshold() -> f64 {
    2.0
}
fn default_trend_points() -> usize {
    20
}
fn default_correlation_window() -> i64 {
    300
}
fn default_confidence_threshold() -> f64 {
    0.6
}
fn default_max_issues() -> usize {
    50
}
fn default_cpu_normal() -> f64 {
    30.0
}
fn default_memory_normal() -> f64 {
    50.0
}
fn default_response_time_normal() -> f64 {
    0.2
}
fn default_error_rate_normal() -> f64 {
    0.01
}
fn default_max_db_connections() -> u32 {
    100
}
fn default_maintenance_interval() -> u64 {
    60
}
fn default_alert_retention_hours() -> u64 {
    168
}
fn default_history_capacity() -> usize {
    10_000
}
fn default_grouping_window() -> i64 {
    5
}
fn default_rate_limit() -> usize {
    10
}
fn default_workers() -> usize {
    4
}
fn default_queue_capacity() -> usize {
    256
}
fn default_log_level() -> String {
    "info".to_string()
}
