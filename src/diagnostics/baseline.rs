//! Rolling statistical baselines
//!
//! A baseline is the {mean, stddev} of a metric family over the most recent
//! window of snapshots. Lifetime is one collection cycle: the engine
//! recomputes lazily before each diagnosis pass.

use crate::core::{ApplicationSnapshot, SystemSnapshot};

/// Per-metric-family reference statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub mean: f64,
    pub stddev: f64,
}

impl Baseline {
    /// Mean and sample standard deviation. A single point has stddev 0.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let stddev = if values.len() > 1 {
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        } else {
            0.0
        };
        Some(Self { mean, stddev })
    }
}

/// Baselines over the system snapshot fields the detectors score against
#[derive(Debug, Clone, Copy)]
pub struct SystemBaselines {
    pub cpu: Baseline,
    pub memory: Baseline,
    pub disk: Baseline,
}

/// Baselines over the application snapshot fields
#[derive(Debug, Clone, Copy)]
pub struct ApplicationBaselines {
    pub response_time: Baseline,
    pub error_rate: Baseline,
}

/// All baselines for one diagnosis pass
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineSet {
    pub system: Option<SystemBaselines>,
    pub application: Option<ApplicationBaselines>,
}

impl BaselineSet {
    /// Recompute over the last `window` snapshots of each history
    pub fn compute(
        system: &[SystemSnapshot],
        application: &[ApplicationSnapshot],
        window: usize,
    ) -> Self {
        let system_baselines = {
            let tail = last_n(system, window);
            match (
                Baseline::from_values(&collect(tail, |s| s.cpu_percent)),
                Baseline::from_values(&collect(tail, |s| s.memory_percent)),
                Baseline::from_values(&collect(tail, |s| s.disk_percent)),
            ) {
                (Some(cpu), Some(memory), Some(disk)) => Some(SystemBaselines { cpu, memory, disk }),
                _ => None,
            }
        };

        let application_baselines = {
            let tail = last_n(application, window);
            match (
                Baseline::from_values(&collect(tail, |a| a.response_time_avg)),
                Baseline::from_values(&collect(tail, |a| a.error_rate)),
            ) {
                (Some(response_time), Some(error_rate)) => Some(ApplicationBaselines {
                    response_time,
                    error_rate,
                }),
                _ => None,
            }
        };

        Self {
            system: system_baselines,
            application: application_baselines,
        }
    }
}

/// Least-squares slope over equally spaced points (per-sample units)
pub fn trend_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

pub(crate) fn last_n<T>(slice: &[T], n: usize) -> &[T] {
    if slice.len() > n {
        &slice[slice.len() - n..]
    } else {
        slice
    }
}

fn collect<T, F: Fn(&T) -> f64>(slice: &[T], f: F) -> Vec<f64> {
    slice.iter().map(f).collect()
}
