//! Outlier and trend anomaly detection
//!
//! An outlier fires iff `|latest - mean| > k * stddev` against the baseline
//! computed from the preceding window. A trend anomaly fires when the
//! least-squares slope of a monotonic-risk field exceeds its per-metric rate
//! threshold; trend severity is capped to avoid runaway scores.

use super::baseline::{last_n, trend_slope, Baseline, BaselineSet};
use crate::config::DiagnosticConfig;
use crate::core::{ApplicationSnapshot, SystemSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

/// Memory growth steeper than this (percent per sample) is a trend anomaly
pub const MEMORY_TREND_THRESHOLD: f64 = 0.5;
/// Response-time growth steeper than this (seconds per sample)
pub const RESPONSE_TIME_TREND_THRESHOLD: f64 = 0.01;
/// Trend severity cap
pub const TREND_SEVERITY_CAP: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    Outlier,
    Trend,
}

/// A single detected deviation; consumed by the issue detectors, not persisted
#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub metric_name: String,
    pub kind: AnomalyKind,
    pub severity: f64,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub baseline: f64,
    pub deviation: f64,
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// Run outlier and trend detection for one diagnosis pass
pub fn detect_anomalies(
    config: &DiagnosticConfig,
    baselines: &BaselineSet,
    system: &[SystemSnapshot],
    application: &[ApplicationSnapshot],
) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    let k = config.anomaly_threshold;

    if let (Some(latest), Some(b)) = (system.last(), baselines.system.as_ref()) {
        push_outlier(&mut anomalies, "cpu_percent", latest.cpu_percent, &b.cpu, k, latest.timestamp);
        push_outlier(
            &mut anomalies,
            "memory_percent",
            latest.memory_percent,
            &b.memory,
            k,
            latest.timestamp,
        );
    }

    if let (Some(latest), Some(b)) = (application.last(), baselines.application.as_ref()) {
        push_outlier(
            &mut anomalies,
            "response_time_avg",
            latest.response_time_avg,
            &b.response_time,
            k,
            latest.timestamp,
        );
        push_outlier(
            &mut anomalies,
            "error_rate",
            latest.error_rate,
            &b.error_rate,
            k,
            latest.timestamp,
        );
    }

    anomalies.extend(detect_trend_anomalies(config, system, application));
    anomalies
}

fn push_outlier(
    anomalies: &mut Vec<Anomaly>,
    metric_name: &str,
    value: f64,
    baseline: &Baseline,
    k: f64,
    timestamp: DateTime<Utc>,
) {
    let deviation = (value - baseline.mean).abs();
    if baseline.stddev > 0.0 && deviation > k * baseline.stddev {
        let mut context = serde_json::Map::new();
        context.insert("threshold".into(), json!(k));
        context.insert("std".into(), json!(baseline.stddev));
        anomalies.push(Anomaly {
            metric_name: metric_name.to_string(),
            kind: AnomalyKind::Outlier,
            severity: deviation / (k * baseline.stddev),
            timestamp,
            value,
            baseline: baseline.mean,
            deviation,
            context,
        });
    }
}

fn detect_trend_anomalies(
    config: &DiagnosticConfig,
    system: &[SystemSnapshot],
    application: &[ApplicationSnapshot],
) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    let points = config.trend_analysis_points;

    if system.len() >= points {
        let values: Vec<f64> = last_n(system, points).iter().map(|s| s.memory_percent).collect();
        let slope = trend_slope(&values);
        if slope > MEMORY_TREND_THRESHOLD {
            let latest = &system[system.len() - 1];
            let headroom = 100.0 - latest.memory_percent;
            let mut context = serde_json::Map::new();
            context.insert("trend_slope".into(), json!(slope));
            context.insert("trend_type".into(), json!("increasing"));
            context.insert("samples_to_exhaustion".into(), json!(headroom / slope));
            anomalies.push(Anomaly {
                metric_name: "memory_percent".to_string(),
                kind: AnomalyKind::Trend,
                severity: (slope / MEMORY_TREND_THRESHOLD).min(TREND_SEVERITY_CAP),
                timestamp: latest.timestamp,
                value: latest.memory_percent,
                baseline: values[0],
                deviation: values[values.len() - 1] - values[0],
                context,
            });
        }
    }

    if application.len() >= points {
        let values: Vec<f64> = last_n(application, points)
            .iter()
            .map(|a| a.response_time_avg)
            .collect();
        let slope = trend_slope(&values);
        if slope > RESPONSE_TIME_TREND_THRESHOLD {
            let latest = &application[application.len() - 1];
            let mut context = serde_json::Map::new();
            context.insert("trend_slope".into(), json!(slope));
            context.insert("trend_type".into(), json!("increasing"));
            anomalies.push(Anomaly {
                metric_name: "response_time_avg".to_string(),
                kind: AnomalyKind::Trend,
                severity: (slope / RESPONSE_TIME_TREND_THRESHOLD).min(TREND_SEVERITY_CAP),
                timestamp: latest.timestamp,
                value: latest.response_time_avg,
                baseline: values[0],
                deviation: values[values.len() - 1] - values[0],
                context,
            });
        }
    }

    anomalies
}
