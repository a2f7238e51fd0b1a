//! Diagnostic engine: baseline computation, anomaly detection, issue
//! detection, and cross-issue correlation, run on a periodic loop
//!
//! Each pass recomputes baselines from the store, scores anomalies, runs
//! every registered detector in isolation, optionally merges related issues
//! into composites, then filters by confidence and sorts by severity. A
//! detector failure is logged and skipped, never fatal to the pass.

use super::anomaly::{detect_anomalies, Anomaly};
use super::baseline::BaselineSet;
use super::detectors::{default_detectors, DetectorContext, Issue, IssueCategory, IssueDetector};
use crate::collector::MetricStore;
use crate::config::DiagnosticConfig;
use crate::core::{ApplicationSnapshot, MonitorError, MonitorResult, Severity, SystemSnapshot};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Anomalies kept for reports
const ANOMALY_HISTORY_CAP: usize = 1000;

/// Detector pairs that tend to share one root cause
const RELATED_DETECTORS: &[(&str, &str)] = &[
    ("high_cpu_usage", "response_time_degradation"),
    ("memory_leak", "high_cpu_usage"),
    ("connection_pool_exhaustion", "database_slowdown"),
    ("disk_space_exhaustion", "error_rate_spike"),
];

struct EngineShared {
    config: DiagnosticConfig,
    detectors: Vec<Box<dyn IssueDetector>>,
    anomaly_history: RwLock<VecDeque<Anomaly>>,
    last_issues: RwLock<Vec<Issue>>,
    last_analysis_at: RwLock<Option<DateTime<Utc>>>,
}

pub struct DiagnosticEngine {
    shared: Arc<EngineShared>,
    shutdown_tx: RwLock<Option<watch::Sender<bool>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DiagnosticEngine {
    /// Empty registry; add detectors before starting the loop
    pub fn new(config: DiagnosticConfig) -> Self {
        Self::with_detectors(config, Vec::new())
    }

    /// Registry pre-loaded with the platform's stock detectors
    pub fn with_default_detectors(config: DiagnosticConfig) -> Self {
        Self::with_detectors(config, default_detectors())
    }

    fn with_detectors(config: DiagnosticConfig, detectors: Vec<Box<dyn IssueDetector>>) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                config,
                detectors,
                anomaly_history: RwLock::new(VecDeque::new()),
                last_issues: RwLock::new(Vec::new()),
                last_analysis_at: RwLock::new(None),
            }),
            shutdown_tx: RwLock::new(None),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Register one detector. Must be called before `start`; names are unique.
    pub fn add_detector(mut self, detector: Box<dyn IssueDetector>) -> MonitorResult<Self> {
        let shared = Arc::get_mut(&mut self.shared).ok_or_else(|| {
            MonitorError::configuration("detectors cannot be registered while the engine runs")
        })?;
        if shared.detectors.iter().any(|d| d.name() == detector.name()) {
            return Err(MonitorError::configuration(format!(
                "duplicate detector name: {}",
                detector.name()
            )));
        }
        shared.detectors.push(detector);
        Ok(self)
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.shared.detectors.iter().map(|d| d.name()).collect()
    }

    /// One full diagnosis pass over the given histories
    pub fn analyze(
        &self,
        system: &[SystemSnapshot],
        application: &[ApplicationSnapshot],
    ) -> Vec<Issue> {
        self.shared.analyze(system, application)
    }

    pub fn last_issues(&self) -> Vec<Issue> {
        self.shared.last_issues.read().clone()
    }

    pub fn recent_anomalies(&self, limit: usize) -> Vec<Anomaly> {
        let history = self.shared.anomaly_history.read();
        history.iter().rev().take(limit).cloned().collect()
    }

    /// Start the periodic analysis loop against the given store
    pub async fn start(&self, store: Arc<MetricStore>) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!("diagnostic engine already running");
            return;
        }

        let (tx, rx) = watch::channel(false);
        *self.shutdown_tx.write() = Some(tx);

        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(analysis_loop(shared, store, rx)));

        info!(
            interval_secs = self.shared.config.analysis_interval_secs,
            detectors = self.shared.detectors.len(),
            "diagnostic engine started"
        );
    }

    pub async fn stop(&self) {
        let handle = {
            let mut task = self.task.lock().await;
            task.take()
        };
        let Some(handle) = handle else {
            warn!("diagnostic engine not running");
            return;
        };

        if let Some(tx) = self.shutdown_tx.write().take() {
            let _ = tx.send(true);
        }
        if let Err(e) = handle.await {
            error!("analysis loop join failed: {e}");
        }
        info!("diagnostic engine stopped");
    }

    pub fn diagnostic_summary(&self) -> DiagnosticSummary {
        let issues = self.shared.last_issues.read();
        let mut by_severity: HashMap<String, usize> = HashMap::new();
        for issue in issues.iter() {
            *by_severity.entry(issue.severity.to_string()).or_default() += 1;
        }
        DiagnosticSummary {
            running: self.shutdown_tx.read().is_some(),
            analysis_interval_secs: self.shared.config.analysis_interval_secs,
            detector_count: self.shared.detectors.len(),
            issue_count: issues.len(),
            issues_by_severity: by_severity,
            anomaly_count: self.shared.anomaly_history.read().len(),
            last_analysis_at: *self.shared.last_analysis_at.read(),
        }
    }

    /// Dump the latest pass plus recent anomalies as pretty JSON
    pub fn export_report<P: AsRef<Path>>(&self, path: P) -> MonitorResult<()> {
        let path = path.as_ref();
        let report = json!({
            "generated_at": Utc::now(),
            "summary": self.diagnostic_summary(),
            "issues": *self.shared.last_issues.read(),
            "recent_anomalies": self.recent_anomalies(100),
        });

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MonitorError::persistence(format!("create {}: {e}", parent.display())))?;
        }
        let body = serde_json::to_string_pretty(&report)
            .map_err(|e| MonitorError::persistence(format!("serialize report: {e}")))?;
        std::fs::write(path, body)
            .map_err(|e| MonitorError::persistence(format!("write {}: {e}", path.display())))?;

        info!(path = %path.display(), "diagnostic report exported");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticSummary {
    pub running: bool,
    pub analysis_interval_secs: u64,
    pub detector_count: usize,
    pub issue_count: usize,
    pub issues_by_severity: HashMap<String, usize>,
    pub anomaly_count: usize,
    pub last_analysis_at: Option<DateTime<Utc>>,
}

impl EngineShared {
    fn analyze(&self, system: &[SystemSnapshot], application: &[ApplicationSnapshot]) -> Vec<Issue> {
        let baselines = BaselineSet::compute(system, application, self.config.baseline_window);
        let anomalies = detect_anomalies(&self.config, &baselines, system, application);

        if !anomalies.is_empty() {
            let mut history = self.anomaly_history.write();
            for anomaly in &anomalies {
                if history.len() == ANOMALY_HISTORY_CAP {
                    history.pop_front();
                }
                history.push_back(anomaly.clone());
            }
        }

        let ctx = DetectorContext {
            config: &self.config,
            system,
            application,
            anomalies: &anomalies,
        };

        let mut issues = Vec::new();
        for detector in &self.detectors {
            match detector.detect(&ctx) {
                Ok(found) => issues.extend(found),
                Err(e) => warn!(detector = detector.name(), "detector failed: {e}"),
            }
        }

        if self.config.enable_correlation {
            issues = correlate(&self.config, issues);
        }

        issues.retain(|i| i.confidence >= self.config.confidence_threshold);
        issues.sort_by(|a, b| {
            b.severity.cmp(&a.severity).then(
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });
        issues.truncate(self.config.max_issues_per_analysis);

        debug!(
            issues = issues.len(),
            anomalies = anomalies.len(),
            "diagnosis pass complete"
        );

        *self.last_issues.write() = issues.clone();
        *self.last_analysis_at.write() = Some(Utc::now());
        issues
    }
}

fn related_detectors(a: &str, b: &str) -> bool {
    RELATED_DETECTORS
        .iter()
        .any(|&(x, y)| (a == x && b == y) || (a == y && b == x))
}

fn related(config: &DiagnosticConfig, a: &Issue, b: &Issue) -> bool {
    let close_in_time =
        (a.detected_at - b.detected_at).num_seconds().abs() <= config.correlation_window_secs;
    close_in_time && (a.category == b.category || related_detectors(&a.detector, &b.detector))
}

/// Merge issues that are close in time and share a category or a known
/// detector relationship into a single composite issue
pub(crate) fn correlate(config: &DiagnosticConfig, issues: Vec<Issue>) -> Vec<Issue> {
    let mut groups: Vec<Vec<Issue>> = Vec::new();
    for issue in issues {
        let slot = groups
            .iter()
            .position(|g| g.iter().any(|member| related(config, member, &issue)));
        match slot {
            Some(i) => groups[i].push(issue),
            None => groups.push(vec![issue]),
        }
    }

    groups
        .into_iter()
        .map(|mut group| {
            if group.len() == 1 {
                group.remove(0)
            } else {
                merge_group(group)
            }
        })
        .collect()
}

fn merge_group(group: Vec<Issue>) -> Issue {
    let severity = group
        .iter()
        .map(|i| i.severity)
        .max()
        .unwrap_or(Severity::Low);
    let confidence = group.iter().map(|i| i.confidence).sum::<f64>() / group.len() as f64;
    let detected_at = group
        .iter()
        .map(|i| i.detected_at)
        .min()
        .unwrap_or_else(Utc::now);

    let mut root_causes = Vec::new();
    let mut recommendations = Vec::new();
    for issue in &group {
        for cause in &issue.root_causes {
            if !root_causes.contains(cause) {
                root_causes.push(cause.clone());
            }
        }
        for rec in &issue.recommendations {
            if !recommendations.contains(rec) {
                recommendations.push(rec.clone());
            }
        }
    }

    let titles: Vec<&str> = group.iter().map(|i| i.title.as_str()).collect();
    let related_ids: Vec<&str> = group.iter().map(|i| i.issue_id.as_str()).collect();

    let mut evidence = serde_json::Map::new();
    for issue in &group {
        for (key, value) in &issue.evidence {
            evidence
                .entry(format!("{}.{}", issue.detector, key))
                .or_insert_with(|| value.clone());
        }
    }
    evidence.insert("related_issues".into(), json!(related_ids));
    evidence.insert("issue_count".into(), json!(group.len()));

    Issue {
        issue_id: format!("composite_{}", detected_at.timestamp()),
        detector: "composite".to_string(),
        severity,
        category: IssueCategory::Composite,
        title: format!("Correlated issues: {}", titles.join(" + ")),
        description: format!(
            "{} related issues detected within the correlation window",
            group.len()
        ),
        impact: "Multiple symptoms point at a shared underlying cause".to_string(),
        root_causes,
        recommendations,
        confidence,
        detected_at,
        evidence,
    }
}

async fn analysis_loop(
    shared: Arc<EngineShared>,
    store: Arc<MetricStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = Duration::from_secs(shared.config.analysis_interval_secs);
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so a pass never runs on an
    // empty store right at startup.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let system = store.system_history();
                let application = store.application_history();
                let issues = shared.analyze(&system, &application);
                if !issues.is_empty() {
                    info!(issues = issues.len(), "diagnosis pass found issues");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("analysis loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::detectors::test_support::{app_snapshot, system_snapshot};

    fn issue(detector: &str, category: IssueCategory, severity: Severity, confidence: f64) -> Issue {
        Issue {
            issue_id: format!("{detector}_1700000000"),
            detector: detector.to_string(),
            severity,
            category,
            title: detector.replace('_', " "),
            description: String::new(),
            impact: String::new(),
            root_causes: vec![format!("{detector} cause")],
            recommendations: vec![format!("{detector} fix"), "shared fix".to_string()],
            confidence,
            detected_at: Utc::now(),
            evidence: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_duplicate_detector_rejected() {
        let engine = DiagnosticEngine::with_default_detectors(DiagnosticConfig::default());
        let result = engine.add_detector(Box::new(super::super::detectors::HighCpuUsage));
        assert!(result.is_err());
    }

    #[test]
    fn test_analyze_finds_sustained_cpu_issue() {
        let engine = DiagnosticEngine::with_default_detectors(DiagnosticConfig::default());

        let system: Vec<_> = (0..10).map(|_| system_snapshot(92.0, 40.0, 50.0)).collect();
        let application = vec![app_snapshot(0.1, 0.005, 10, 0.9)];

        let issues = engine.analyze(&system, &application);
        assert!(issues.iter().any(|i| i.detector == "high_cpu_usage"));
        assert_eq!(engine.last_issues().len(), issues.len());
        assert!(engine.diagnostic_summary().last_analysis_at.is_some());
    }

    #[test]
    fn test_confidence_filter_drops_weak_issues() {
        // database_slowdown scores 0.6 and survives the default 0.6 floor;
        // network_latency scores 0.5 and must be dropped.
        let system = vec![
            system_snapshot(30.0, 40.0, 50.0),
            {
                let mut s = system_snapshot(30.0, 40.0, 50.0);
                s.network_bytes_sent = 5_000_000;
                s
            },
        ];
        let application = vec![app_snapshot(1.5, 0.005, 30, 0.9)];

        let mut config = DiagnosticConfig::default();
        config.enable_correlation = false;
        let engine = DiagnosticEngine::with_default_detectors(config);
        let issues = engine.analyze(&system, &application);
        assert!(issues.iter().any(|i| i.detector == "database_slowdown"));
        assert!(!issues.iter().any(|i| i.detector == "network_latency"));
    }

    #[test]
    fn test_correlate_merges_related_detectors() {
        let config = DiagnosticConfig::default();
        let issues = vec![
            issue("high_cpu_usage", IssueCategory::Performance, Severity::High, 0.8),
            issue(
                "response_time_degradation",
                IssueCategory::Performance,
                Severity::Medium,
                0.7,
            ),
            issue("disk_space_exhaustion", IssueCategory::Resource, Severity::Critical, 0.9),
        ];

        let merged = correlate(&config, issues);
        assert_eq!(merged.len(), 2);

        let composite = merged
            .iter()
            .find(|i| i.category == IssueCategory::Composite)
            .unwrap();
        assert_eq!(composite.severity, Severity::High);
        assert!((composite.confidence - 0.75).abs() < 1e-9);
        assert_eq!(composite.evidence["issue_count"], json!(2));
        // Shared recommendation appears exactly once
        assert_eq!(
            composite
                .recommendations
                .iter()
                .filter(|r| r.as_str() == "shared fix")
                .count(),
            1
        );

        // The disk issue stays standalone
        assert!(merged.iter().any(|i| i.detector == "disk_space_exhaustion"));
    }

    #[test]
    fn test_correlate_respects_time_window() {
        let config = DiagnosticConfig::default();
        let mut early = issue("high_cpu_usage", IssueCategory::Performance, Severity::High, 0.8);
        early.detected_at = Utc::now() - chrono::Duration::seconds(600);
        let late = issue(
            "response_time_degradation",
            IssueCategory::Performance,
            Severity::Medium,
            0.7,
        );

        // 600s apart with a 300s window: no merge
        let merged = correlate(&config, vec![early, late]);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|i| i.category != IssueCategory::Composite));
    }

    #[test]
    fn test_issue_ordering_and_cap() {
        let mut config = DiagnosticConfig::default();
        config.max_issues_per_analysis = 2;
        config.enable_correlation = false;
        let engine = DiagnosticEngine::with_default_detectors(config);

        // High cpu + contention + degraded cache + pool saturation all at once
        let system: Vec<_> = (0..10).map(|_| system_snapshot(96.0, 85.0, 50.0)).collect();
        let application = vec![app_snapshot(1.5, 0.005, 96, 0.4)];

        let issues = engine.analyze(&system, &application);
        assert_eq!(issues.len(), 2);
        // Criticals sort ahead of lower severities
        assert!(issues[0].severity >= issues[1].severity);
        assert_eq!(issues[0].severity, Severity::Critical);
    }

    #[test]
    fn test_export_report() {
        let engine = DiagnosticEngine::with_default_detectors(DiagnosticConfig::default());
        let system: Vec<_> = (0..10).map(|_| system_snapshot(92.0, 40.0, 50.0)).collect();
        engine.analyze(&system, &[app_snapshot(0.1, 0.005, 10, 0.9)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/diagnostics.json");
        engine.export_report(&path).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let report: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(report["summary"]["issue_count"].as_u64().unwrap() >= 1);
        assert!(report["issues"].is_array());
    }
}
