//! Issue detectors
//!
//! Each detector independently tests one failure hypothesis against the
//! metric histories and the anomalies of the current pass, returning zero or
//! more issues with severity, canned root causes/recommendations, a
//! confidence score, and supporting evidence. Detectors return explicit
//! results; the engine inspects them, so a failing detector can never be
//! mistaken for "no issues found".

use super::anomaly::Anomaly;
use super::baseline::{last_n, trend_slope};
use crate::config::DiagnosticConfig;
use crate::core::{ApplicationSnapshot, MonitorError, Severity, SystemSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub type Evidence = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Performance,
    Resource,
    Stability,
    Security,
    Composite,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Resource => "resource",
            Self::Stability => "stability",
            Self::Security => "security",
            Self::Composite => "composite",
        }
    }
}

/// A diagnosed problem, owned by the engine's result list until the next pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub issue_id: String,
    pub detector: String,
    pub severity: Severity,
    pub category: IssueCategory,
    pub title: String,
    pub description: String,
    pub impact: String,
    pub root_causes: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
    pub evidence: Evidence,
}

impl Issue {
    fn new(detector: &str, severity: Severity, category: IssueCategory) -> Self {
        let detected_at = Utc::now();
        Self {
            issue_id: format!("{}_{}", detector, detected_at.timestamp()),
            detector: detector.to_string(),
            severity,
            category,
            title: String::new(),
            description: String::new(),
            impact: String::new(),
            root_causes: Vec::new(),
            recommendations: Vec::new(),
            confidence: 0.0,
            detected_at,
            evidence: Evidence::new(),
        }
    }
}

/// Everything a detector may look at during one pass
pub struct DetectorContext<'a> {
    pub config: &'a DiagnosticConfig,
    pub system: &'a [SystemSnapshot],
    pub application: &'a [ApplicationSnapshot],
    pub anomalies: &'a [Anomaly],
}

/// A single named failure-hypothesis test
pub trait IssueDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, ctx: &DetectorContext<'_>) -> Result<Vec<Issue>, MonitorError>;
}

/// The stock registry, mirroring the platform's known failure modes
pub fn default_detectors() -> Vec<Box<dyn IssueDetector>> {
    vec![
        Box::new(HighCpuUsage),
        Box::new(MemoryLeak),
        Box::new(ResponseTimeDegradation),
        Box::new(ErrorRateSpike),
        Box::new(DiskSpaceExhaustion),
        Box::new(ConnectionPoolExhaustion),
        Box::new(CacheHitDegradation),
        Box::new(DatabaseSlowdown),
        Box::new(NetworkLatency),
        Box::new(ResourceContention),
    ]
}

/// Sustained high CPU across at least 70% of the last 10 samples
pub struct HighCpuUsage;

impl IssueDetector for HighCpuUsage {
    fn name(&self) -> &'static str {
        "high_cpu_usage"
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Result<Vec<Issue>, MonitorError> {
        let Some(latest) = ctx.system.last() else {
            return Ok(Vec::new());
        };

        let recent = last_n(ctx.system, 10);
        let high_count = recent.iter().filter(|s| s.cpu_percent > 80.0).count();
        if high_count < 7 {
            return Ok(Vec::new());
        }

        let latest_cpu = latest.cpu_percent;
        let severity = if latest_cpu > 95.0 {
            Severity::Critical
        } else if latest_cpu > 85.0 {
            Severity::High
        } else {
            Severity::Medium
        };

        let mut root_causes = Vec::new();
        if recent.len() >= 5 {
            let slope = trend_slope(&recent.iter().map(|s| s.cpu_percent).collect::<Vec<_>>());
            if slope > 1.0 {
                root_causes
                    .push("CPU usage climbing steadily; a CPU-bound task or busy loop is likely".to_string());
            }
        }
        if latest.process_count > 200 {
            root_causes.push("Process count is unusually high; possible process leak".to_string());
        }
        if root_causes.is_empty() {
            root_causes.push("Overall system load exceeds capacity".to_string());
        }

        let mut issue = Issue::new(self.name(), severity, IssueCategory::Performance);
        issue.title = "Sustained high CPU usage".to_string();
        issue.description = format!(
            "CPU at {:.1}%, above the normal baseline of {:.0}%",
            latest_cpu, ctx.config.baselines.cpu_normal
        );
        issue.impact = "Evaluation and order paths slow down under CPU pressure".to_string();
        issue.root_causes = root_causes;
        issue.recommendations = vec![
            "Profile CPU-heavy components and optimize hot paths".to_string(),
            "Add CPU capacity or shed load".to_string(),
            "Check for busy loops or unbounded recursion".to_string(),
        ];
        issue.confidence = (high_count as f64 / 10.0).min(0.9);
        issue.evidence.insert("current_cpu_percent".into(), json!(latest_cpu));
        issue
            .evidence
            .insert("baseline_cpu_percent".into(), json!(ctx.config.baselines.cpu_normal));
        issue.evidence.insert("high_cpu_periods".into(), json!(high_count));
        issue.evidence.insert("process_count".into(), json!(latest.process_count));

        Ok(vec![issue])
    }
}

/// Monotonic memory growth suggesting a leak
pub struct MemoryLeak;

impl IssueDetector for MemoryLeak {
    fn name(&self) -> &'static str {
        "memory_leak"
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Result<Vec<Issue>, MonitorError> {
        let points = ctx.config.trend_analysis_points;
        if ctx.system.len() < points {
            return Ok(Vec::new());
        }

        let values: Vec<f64> = last_n(ctx.system, points).iter().map(|s| s.memory_percent).collect();
        let slope = trend_slope(&values);
        if slope <= 0.3 {
            return Ok(Vec::new());
        }

        let latest_memory = values[values.len() - 1];
        let severity = if latest_memory > 90.0 {
            Severity::Critical
        } else if latest_memory > 80.0 {
            Severity::High
        } else {
            Severity::Medium
        };

        // Linear extrapolation of the slope against remaining headroom
        let samples_to_exhaustion = (100.0 - latest_memory) / slope;

        let mut issue = Issue::new(self.name(), severity, IssueCategory::Resource);
        issue.title = "Suspected memory leak".to_string();
        issue.description = format!(
            "Memory usage rising at {:.2}%/sample, currently {:.1}%",
            slope, latest_memory
        );
        issue.impact = format!(
            "Memory may be exhausted within roughly {:.0} samples at the current rate",
            samples_to_exhaustion
        );
        issue.root_causes = vec![
            "Application is leaking allocations".to_string(),
            "Caches grow without eviction".to_string(),
            "Long-lived references prevent reclamation".to_string(),
        ];
        issue.recommendations = vec![
            "Inspect heap growth per component".to_string(),
            "Review cache eviction policies".to_string(),
            "Restart the service to reclaim memory if growth continues".to_string(),
        ];
        issue.confidence = (slope / 0.5).min(0.95);
        issue.evidence.insert("memory_trend_slope".into(), json!(slope));
        issue.evidence.insert("current_memory_percent".into(), json!(latest_memory));
        issue
            .evidence
            .insert("samples_to_exhaustion".into(), json!(samples_to_exhaustion));
        issue.evidence.insert("analysis_window_size".into(), json!(values.len()));

        Ok(vec![issue])
    }
}

/// Average response time well above the normal baseline
pub struct ResponseTimeDegradation;

impl IssueDetector for ResponseTimeDegradation {
    fn name(&self) -> &'static str {
        "response_time_degradation"
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Result<Vec<Issue>, MonitorError> {
        let Some(latest) = ctx.application.last() else {
            return Ok(Vec::new());
        };

        let baseline = ctx.config.baselines.response_time_normal;
        let latest_rt = latest.response_time_avg;
        if latest_rt <= baseline * 3.0 {
            return Ok(Vec::new());
        }

        let severity = if latest_rt > 5.0 {
            Severity::Critical
        } else if latest_rt > 2.0 {
            Severity::High
        } else {
            Severity::Medium
        };

        let mut root_causes = Vec::new();
        if ctx.application.len() >= 10 {
            let values: Vec<f64> = last_n(ctx.application, 10)
                .iter()
                .map(|a| a.response_time_avg)
                .collect();
            if trend_slope(&values) > 0.01 {
                root_causes.push("Response time is still worsening".to_string());
            }
        }
        if let Some(sys) = ctx.system.last() {
            if sys.cpu_percent > 80.0 {
                root_causes.push("CPU saturation is slowing request handling".to_string());
            }
            if sys.memory_percent > 85.0 {
                root_causes.push("Memory pressure is likely forcing frequent reclamation".to_string());
            }
        }
        if latest.database_connections > 80 {
            root_causes.push("Database pool near saturation".to_string());
        }
        if root_causes.is_empty() {
            root_causes.push("Application slowdown or slow external dependency".to_string());
        }

        let mut issue = Issue::new(self.name(), severity, IssueCategory::Performance);
        issue.title = "Response time degradation".to_string();
        issue.description = format!(
            "Average response time {:.3}s against a normal baseline of {:.3}s",
            latest_rt, baseline
        );
        issue.impact = "Requests risk timing out; downstream consumers see stale data".to_string();
        issue.root_causes = root_causes;
        issue.recommendations = vec![
            "Inspect slow queries and database latency".to_string(),
            "Check latency of external dependencies".to_string(),
            "Review cache hit rate".to_string(),
        ];
        issue.confidence = (latest_rt / baseline / 10.0).min(0.9);
        issue.evidence.insert("current_response_time".into(), json!(latest_rt));
        issue.evidence.insert("baseline_response_time".into(), json!(baseline));
        issue
            .evidence
            .insert("degradation_ratio".into(), json!(latest_rt / baseline));

        Ok(vec![issue])
    }
}

/// Error rate far above the normal baseline
pub struct ErrorRateSpike;

impl IssueDetector for ErrorRateSpike {
    fn name(&self) -> &'static str {
        "error_rate_spike"
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Result<Vec<Issue>, MonitorError> {
        let Some(latest) = ctx.application.last() else {
            return Ok(Vec::new());
        };

        let baseline = ctx.config.baselines.error_rate_normal;
        let latest_rate = latest.error_rate;
        if latest_rate <= baseline * 5.0 {
            return Ok(Vec::new());
        }

        let severity = if latest_rate > 0.1 {
            Severity::Critical
        } else if latest_rate > 0.05 {
            Severity::High
        } else {
            Severity::Medium
        };

        let mut root_causes = Vec::new();
        if ctx.application.len() >= 5 {
            let sustained = last_n(ctx.application, 5)
                .iter()
                .all(|a| a.error_rate > baseline * 2.0);
            if sustained {
                root_causes.push("Error rate has stayed elevated across recent samples".to_string());
            }
        }
        if let Some(sys) = ctx.system.last() {
            if sys.cpu_percent > 90.0 {
                root_causes.push("CPU exhaustion can fail requests outright".to_string());
            }
            if sys.memory_percent > 90.0 {
                root_causes.push("Memory exhaustion can abort request handling".to_string());
            }
        }
        if latest.database_connections < 5 {
            root_causes.push("Too few database connections; acquisition failures likely".to_string());
        }
        if root_causes.is_empty() {
            root_causes.push("Application fault or failing external dependency".to_string());
        }

        let mut issue = Issue::new(self.name(), severity, IssueCategory::Stability);
        issue.title = "Error rate spike".to_string();
        issue.description = format!(
            "Error rate {:.2}% against a normal baseline of {:.2}%",
            latest_rate * 100.0,
            baseline * 100.0
        );
        issue.impact = "Request failures are reaching callers".to_string();
        issue.root_causes = root_causes;
        issue.recommendations = vec![
            "Read the application error log for the dominant failure".to_string(),
            "Check external dependency health".to_string(),
            "Verify database connectivity".to_string(),
        ];
        issue.confidence = (latest_rate / baseline / 10.0).min(0.95);
        issue.evidence.insert("current_error_rate".into(), json!(latest_rate));
        issue.evidence.insert("baseline_error_rate".into(), json!(baseline));
        issue.evidence.insert("spike_ratio".into(), json!(latest_rate / baseline));
        issue.evidence.insert("total_errors".into(), json!(latest.error_count));

        Ok(vec![issue])
    }
}

/// Disk usage approaching the storage ceiling
pub struct DiskSpaceExhaustion;

impl IssueDetector for DiskSpaceExhaustion {
    fn name(&self) -> &'static str {
        "disk_space_exhaustion"
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Result<Vec<Issue>, MonitorError> {
        let Some(latest) = ctx.system.last() else {
            return Ok(Vec::new());
        };

        let latest_disk = latest.disk_percent;
        if latest_disk <= 85.0 {
            return Ok(Vec::new());
        }

        let severity = if latest_disk > 95.0 {
            Severity::Critical
        } else if latest_disk > 90.0 {
            Severity::High
        } else {
            Severity::Medium
        };

        let samples_to_exhaustion = if ctx.system.len() >= 10 {
            let values: Vec<f64> = last_n(ctx.system, 10).iter().map(|s| s.disk_percent).collect();
            let slope = trend_slope(&values);
            (slope > 0.0).then(|| (100.0 - latest_disk) / slope)
        } else {
            None
        };

        let mut issue = Issue::new(self.name(), severity, IssueCategory::Resource);
        issue.title = "Disk space running out".to_string();
        issue.description = format!("Disk usage at {:.1}%", latest_disk);
        issue.impact = "Writes will start failing once the volume fills".to_string();
        issue.root_causes = vec![
            "Log files growing unchecked".to_string(),
            "Temporary files not cleaned up".to_string(),
            "Data files growing faster than planned".to_string(),
        ];
        issue.recommendations = vec![
            "Rotate and compress logs".to_string(),
            "Archive or delete stale data".to_string(),
            "Extend the volume".to_string(),
        ];
        issue.confidence = 0.9;
        issue.evidence.insert("current_disk_percent".into(), json!(latest_disk));
        if let Some(est) = samples_to_exhaustion {
            issue.evidence.insert("samples_to_exhaustion".into(), json!(est));
        }

        Ok(vec![issue])
    }
}

/// Database pool close to its connection ceiling
pub struct ConnectionPoolExhaustion;

impl IssueDetector for ConnectionPoolExhaustion {
    fn name(&self) -> &'static str {
        "connection_pool_exhaustion"
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Result<Vec<Issue>, MonitorError> {
        let Some(latest) = ctx.application.last() else {
            return Ok(Vec::new());
        };

        let max_connections = ctx.config.baselines.max_db_connections.max(1);
        let usage = latest.database_connections as f64 / max_connections as f64;
        if usage <= 0.8 {
            return Ok(Vec::new());
        }

        let severity = if usage > 0.95 {
            Severity::Critical
        } else if usage > 0.9 {
            Severity::High
        } else {
            Severity::Medium
        };

        let mut issue = Issue::new(self.name(), severity, IssueCategory::Resource);
        issue.title = "Database connection pool near saturation".to_string();
        issue.description = format!(
            "{}/{} connections in use ({:.0}%)",
            latest.database_connections,
            max_connections,
            usage * 100.0
        );
        issue.impact = "New requests may fail to acquire a connection".to_string();
        issue.root_causes = vec![
            "Connections leaked without being returned".to_string(),
            "Long-running queries holding connections".to_string(),
            "Pool sized below current concurrency".to_string(),
        ];
        issue.recommendations = vec![
            "Audit connection checkout/return paths".to_string(),
            "Kill or optimize long-running queries".to_string(),
            "Raise the pool ceiling with a connection timeout".to_string(),
        ];
        issue.confidence = 0.85;
        issue
            .evidence
            .insert("current_connections".into(), json!(latest.database_connections));
        issue.evidence.insert("max_connections".into(), json!(max_connections));
        issue.evidence.insert("usage_rate".into(), json!(usage));

        Ok(vec![issue])
    }
}

/// Cache hit rate below the expected floor
pub struct CacheHitDegradation;

impl IssueDetector for CacheHitDegradation {
    fn name(&self) -> &'static str {
        "cache_performance_degradation"
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Result<Vec<Issue>, MonitorError> {
        let Some(latest) = ctx.application.last() else {
            return Ok(Vec::new());
        };

        let hit_rate = latest.cache_hit_rate;
        if hit_rate >= 0.7 {
            return Ok(Vec::new());
        }

        let severity = if hit_rate > 0.5 { Severity::Medium } else { Severity::High };

        let mut issue = Issue::new(self.name(), severity, IssueCategory::Performance);
        issue.title = "Cache hit rate degraded".to_string();
        issue.description = format!("Cache hit rate at {:.1}%", hit_rate * 100.0);
        issue.impact = "More queries fall through to the database, inflating latency".to_string();
        issue.root_causes = vec![
            "TTLs shorter than the access pattern".to_string(),
            "Access pattern shifted away from cached keys".to_string(),
            "Cache capacity too small, causing churn".to_string(),
        ];
        issue.recommendations = vec![
            "Re-check key design against the current access pattern".to_string(),
            "Tune TTLs and capacity".to_string(),
            "Pre-warm hot keys after deployments".to_string(),
        ];
        issue.confidence = 0.75;
        issue.evidence.insert("cache_hit_rate".into(), json!(hit_rate));
        issue.evidence.insert("expected_hit_rate".into(), json!(0.8));

        Ok(vec![issue])
    }
}

/// High latency with a healthy cache and a busy pool points at the database
pub struct DatabaseSlowdown;

impl IssueDetector for DatabaseSlowdown {
    fn name(&self) -> &'static str {
        "database_slowdown"
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Result<Vec<Issue>, MonitorError> {
        let Some(latest) = ctx.application.last() else {
            return Ok(Vec::new());
        };

        if !(latest.response_time_avg > 1.0
            && latest.cache_hit_rate > 0.8
            && latest.database_connections > 20)
        {
            return Ok(Vec::new());
        }

        let mut issue = Issue::new(self.name(), Severity::Medium, IssueCategory::Performance);
        issue.title = "Suspected database slowdown".to_string();
        issue.description =
            "Latency is high while the cache is healthy; the database is the likely bottleneck"
                .to_string();
        issue.impact = "Query latency dominates overall response time".to_string();
        issue.root_causes = vec![
            "Slow queries or lock contention".to_string(),
            "Missing or stale indexes".to_string(),
            "Database host under-resourced".to_string(),
        ];
        issue.recommendations = vec![
            "Read the slow query log".to_string(),
            "Check index usage on the hottest tables".to_string(),
            "Monitor database host resource usage".to_string(),
        ];
        issue.confidence = 0.6;
        issue
            .evidence
            .insert("response_time".into(), json!(latest.response_time_avg));
        issue.evidence.insert("cache_hit_rate".into(), json!(latest.cache_hit_rate));
        issue
            .evidence
            .insert("db_connections".into(), json!(latest.database_connections));

        Ok(vec![issue])
    }
}

/// Heavy network IO together with high latency
pub struct NetworkLatency;

impl IssueDetector for NetworkLatency {
    fn name(&self) -> &'static str {
        "network_latency"
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Result<Vec<Issue>, MonitorError> {
        if ctx.system.len() < 2 {
            return Ok(Vec::new());
        }
        let current = &ctx.system[ctx.system.len() - 1];
        let previous = &ctx.system[ctx.system.len() - 2];

        let current_total = current.network_bytes_sent + current.network_bytes_recv;
        let previous_total = previous.network_bytes_sent + previous.network_bytes_recv;
        let delta = current_total.saturating_sub(previous_total);

        let Some(latest_app) = ctx.application.last() else {
            return Ok(Vec::new());
        };
        if delta <= 1_000_000 || latest_app.response_time_avg <= 1.0 {
            return Ok(Vec::new());
        }

        let mut issue = Issue::new(self.name(), Severity::Medium, IssueCategory::Performance);
        issue.title = "Suspected network bottleneck".to_string();
        issue.description =
            "Network IO is heavy while response times are elevated".to_string();
        issue.impact = "Transfer latency is inflating response times".to_string();
        issue.root_causes = vec![
            "Bandwidth saturation".to_string(),
            "Slow external services".to_string(),
            "DNS resolution delays".to_string(),
        ];
        issue.recommendations = vec![
            "Measure bandwidth headroom".to_string(),
            "Probe external service latency directly".to_string(),
            "Cache or batch large transfers".to_string(),
        ];
        issue.confidence = 0.5;
        issue.evidence.insert("network_io_delta".into(), json!(delta));
        issue
            .evidence
            .insert("response_time".into(), json!(latest_app.response_time_avg));

        Ok(vec![issue])
    }
}

/// Several resources under pressure at once
pub struct ResourceContention;

impl IssueDetector for ResourceContention {
    fn name(&self) -> &'static str {
        "resource_contention"
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Result<Vec<Issue>, MonitorError> {
        let (Some(sys), Some(app)) = (ctx.system.last(), ctx.application.last()) else {
            return Ok(Vec::new());
        };

        let mut pressure = Vec::new();
        if sys.cpu_percent > 80.0 {
            pressure.push(format!("cpu {:.1}%", sys.cpu_percent));
        }
        if sys.memory_percent > 80.0 {
            pressure.push(format!("memory {:.1}%", sys.memory_percent));
        }
        if app.database_connections > 80 {
            pressure.push(format!("db connections {}", app.database_connections));
        }
        if app.response_time_avg > 1.0 {
            pressure.push(format!("response time {:.3}s", app.response_time_avg));
        }

        if pressure.len() < 3 {
            return Ok(Vec::new());
        }

        let mut issue = Issue::new(self.name(), Severity::High, IssueCategory::Performance);
        issue.title = "Multi-resource contention".to_string();
        issue.description = format!("{} resources under pressure simultaneously", pressure.len());
        issue.impact = "Pressure in one resource compounds the others; cascading slowdown likely"
            .to_string();
        issue.root_causes = vec![
            "Load beyond designed capacity".to_string(),
            "Unbalanced resource allocation".to_string(),
            "A shared hotspot serializing work".to_string(),
        ];
        issue.recommendations = vec![
            "Check the load distribution immediately".to_string(),
            "Scale out or shed non-critical work".to_string(),
            "Rebalance resource allocation".to_string(),
        ];
        issue.confidence = 0.8;
        issue.evidence.insert("pressure_count".into(), json!(pressure.len()));
        issue.evidence.insert("pressure_details".into(), json!(pressure));

        Ok(vec![issue])
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn system_snapshot(cpu: f64, memory: f64, disk: f64) -> SystemSnapshot {
        SystemSnapshot {
            timestamp: Utc::now(),
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
            network_bytes_sent: 0,
            network_bytes_recv: 0,
            process_count: 120,
            load_average: [0.5, 0.4, 0.3],
        }
    }

    pub fn app_snapshot(rt: f64, error_rate: f64, db_conns: u32, cache_hit: f64) -> ApplicationSnapshot {
        ApplicationSnapshot {
            timestamp: Utc::now(),
            response_time_avg: rt,
            response_time_p95: rt * 2.5,
            request_count: 1000,
            error_count: (1000.0 * error_rate) as u64,
            error_rate,
            active_connections: 25,
            database_connections: db_conns,
            cache_hit_rate: cache_hit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{app_snapshot, system_snapshot};
    use super::*;

    fn ctx<'a>(
        config: &'a DiagnosticConfig,
        system: &'a [SystemSnapshot],
        application: &'a [ApplicationSnapshot],
    ) -> DetectorContext<'a> {
        DetectorContext {
            config,
            system,
            application,
            anomalies: &[],
        }
    }

    #[test]
    fn test_high_cpu_requires_sustained_breach() {
        let config = DiagnosticConfig::default();

        // 6 of 10 high: below the 70% gate
        let mut history: Vec<_> = (0..4).map(|_| system_snapshot(50.0, 40.0, 50.0)).collect();
        history.extend((0..6).map(|_| system_snapshot(90.0, 40.0, 50.0)));
        let issues = HighCpuUsage.detect(&ctx(&config, &history, &[])).unwrap();
        assert!(issues.is_empty());

        // 8 of 10 high with latest at 96: critical
        let mut history: Vec<_> = (0..2).map(|_| system_snapshot(50.0, 40.0, 50.0)).collect();
        history.extend((0..7).map(|_| system_snapshot(90.0, 40.0, 50.0)));
        history.push(system_snapshot(96.0, 40.0, 50.0));
        let issues = HighCpuUsage.detect(&ctx(&config, &history, &[])).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[0].evidence["high_cpu_periods"], json!(8));
    }

    #[test]
    fn test_memory_leak_slope_gate() {
        let config = DiagnosticConfig::default();

        // Flat memory: nothing
        let history: Vec<_> = (0..20).map(|_| system_snapshot(30.0, 55.0, 50.0)).collect();
        assert!(MemoryLeak.detect(&ctx(&config, &history, &[])).unwrap().is_empty());

        // 0.5%/sample from 60%: fires, ends at 69.5 -> medium
        let history: Vec<_> = (0..20)
            .map(|i| system_snapshot(30.0, 60.0 + 0.5 * i as f64, 50.0))
            .collect();
        let issues = MemoryLeak.detect(&ctx(&config, &history, &[])).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Medium);
        assert!(issues[0].evidence.contains_key("samples_to_exhaustion"));
    }

    #[test]
    fn test_response_time_degradation_ratio() {
        let config = DiagnosticConfig::default();

        // 0.5s is below 3x the 0.2s baseline
        let app = vec![app_snapshot(0.5, 0.01, 10, 0.9)];
        assert!(ResponseTimeDegradation
            .detect(&ctx(&config, &[], &app))
            .unwrap()
            .is_empty());

        // 1.5s: fires at medium, confidence 1.5/0.2/10 = 0.75
        let app = vec![app_snapshot(1.5, 0.01, 10, 0.9)];
        let issues = ResponseTimeDegradation.detect(&ctx(&config, &[], &app)).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Medium);
        assert!((issues[0].confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_error_rate_spike_severity_tiers() {
        let config = DiagnosticConfig::default();

        let app = vec![app_snapshot(0.2, 0.06, 10, 0.9)];
        let issues = ErrorRateSpike.detect(&ctx(&config, &[], &app)).unwrap();
        assert_eq!(issues[0].severity, Severity::High);

        let app = vec![app_snapshot(0.2, 0.15, 10, 0.9)];
        let issues = ErrorRateSpike.detect(&ctx(&config, &[], &app)).unwrap();
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[0].category, IssueCategory::Stability);
    }

    #[test]
    fn test_disk_exhaustion_gate() {
        let config = DiagnosticConfig::default();

        let history = vec![system_snapshot(30.0, 40.0, 84.0)];
        assert!(DiskSpaceExhaustion.detect(&ctx(&config, &history, &[])).unwrap().is_empty());

        let history = vec![system_snapshot(30.0, 40.0, 96.0)];
        let issues = DiskSpaceExhaustion.detect(&ctx(&config, &history, &[])).unwrap();
        assert_eq!(issues[0].severity, Severity::Critical);
    }

    #[test]
    fn test_connection_pool_saturation() {
        let config = DiagnosticConfig::default();

        let app = vec![app_snapshot(0.2, 0.01, 96, 0.9)];
        let issues = ConnectionPoolExhaustion.detect(&ctx(&config, &[], &app)).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Critical);

        let app = vec![app_snapshot(0.2, 0.01, 50, 0.9)];
        assert!(ConnectionPoolExhaustion.detect(&ctx(&config, &[], &app)).unwrap().is_empty());
    }

    #[test]
    fn test_cache_degradation() {
        let config = DiagnosticConfig::default();

        let app = vec![app_snapshot(0.2, 0.01, 10, 0.65)];
        let issues = CacheHitDegradation.detect(&ctx(&config, &[], &app)).unwrap();
        assert_eq!(issues[0].severity, Severity::Medium);

        let app = vec![app_snapshot(0.2, 0.01, 10, 0.4)];
        let issues = CacheHitDegradation.detect(&ctx(&config, &[], &app)).unwrap();
        assert_eq!(issues[0].severity, Severity::High);
    }

    #[test]
    fn test_resource_contention_needs_three_signals() {
        let config = DiagnosticConfig::default();

        // Only cpu + memory: two signals
        let system = vec![system_snapshot(85.0, 85.0, 50.0)];
        let app = vec![app_snapshot(0.2, 0.01, 10, 0.9)];
        assert!(ResourceContention.detect(&ctx(&config, &system, &app)).unwrap().is_empty());

        // cpu + memory + response time
        let app = vec![app_snapshot(1.5, 0.01, 10, 0.9)];
        let issues = ResourceContention.detect(&ctx(&config, &system, &app)).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].evidence["pressure_count"], json!(3));
    }
}
