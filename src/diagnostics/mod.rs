//! Automated diagnostics: baselines, anomaly scoring, issue detection,
//! and cross-issue correlation

pub mod anomaly;
pub mod baseline;
pub mod detectors;
pub mod engine;

pub use anomaly::{Anomaly, AnomalyKind};
pub use baseline::{Baseline, BaselineSet};
pub use detectors::{default_detectors, DetectorContext, Issue, IssueCategory, IssueDetector};
pub use engine::{DiagnosticEngine, DiagnosticSummary};
