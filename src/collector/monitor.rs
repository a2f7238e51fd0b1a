//! Periodic metrics collection
//!
//! The collector owns the only loop that writes system/application snapshots
//! into the [`MetricStore`]. Each cycle samples, appends, evicts expired
//! points, and runs threshold checks; a failed cycle is logged and the loop
//! proceeds at the next tick. Export runs on its own interval and its
//! failures never stop collection.

use super::sampler::{ApplicationProbe, SystemSampler};
use super::store::{MetricStore, StoreCounts};
use crate::config::CollectorConfig;
use crate::core::{ApplicationSnapshot, MetricSample, MonitorError, MonitorResult, SystemSnapshot};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Breach level for threshold events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BreachLevel {
    Warning,
    Critical,
}

/// A configured bound crossed by the latest snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdBreach {
    pub level: BreachLevel,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

/// Events delivered to collector subscribers
#[derive(Debug, Clone)]
pub enum CollectorEvent {
    System(SystemSnapshot),
    Application(ApplicationSnapshot),
    ThresholdBreach(ThresholdBreach),
}

type Subscriber = Box<dyn Fn(&CollectorEvent) + Send + Sync>;

/// Destination for periodic snapshot dumps
pub trait ExportSink: Send + Sync {
    fn export(&self, dump: &MetricsDump) -> MonitorResult<()>;
}

/// Structured dump of everything currently retained
#[derive(Debug, Clone, Serialize)]
pub struct MetricsDump {
    pub exported_at: DateTime<Utc>,
    pub system_metrics: Vec<SystemSnapshot>,
    pub application_metrics: Vec<ApplicationSnapshot>,
    pub custom_metrics: HashMap<String, Vec<MetricSample>>,
}

/// Writes dumps as pretty JSON to a file, creating parent directories
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ExportSink for JsonFileSink {
    fn export(&self, dump: &MetricsDump) -> MonitorResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MonitorError::persistence(e.to_string()))?;
            }
        }
        let json = serde_json::to_string_pretty(dump)
            .map_err(|e| MonitorError::persistence(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| MonitorError::persistence(e.to_string()))?;
        Ok(())
    }
}

struct CollectorShared {
    config: CollectorConfig,
    store: Arc<MetricStore>,
    probe: Option<Arc<dyn ApplicationProbe>>,
    sink: Option<Arc<dyn ExportSink>>,
    subscribers: RwLock<Vec<Subscriber>>,
}

/// Periodic system/application metrics collector
pub struct MetricsCollector {
    shared: Arc<CollectorShared>,
    shutdown_tx: RwLock<Option<watch::Sender<bool>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MetricsCollector {
    pub fn new(config: CollectorConfig) -> Self {
        let store = Arc::new(MetricStore::new(
            config.max_points_per_metric,
            config.retention_hours,
        ));
        let sink: Option<Arc<dyn ExportSink>> = if config.export.enabled {
            Some(Arc::new(JsonFileSink::new(config.export.file_path.clone())))
        } else {
            None
        };
        Self {
            shared: Arc::new(CollectorShared {
                config,
                store,
                probe: None,
                sink,
                subscribers: RwLock::new(Vec::new()),
            }),
            shutdown_tx: RwLock::new(None),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Wire an application metrics source. Must be called before `start`,
    /// while this handle is the sole owner of the collector state.
    pub fn with_probe(mut self, probe: Arc<dyn ApplicationProbe>) -> MonitorResult<Self> {
        let shared = Arc::get_mut(&mut self.shared).ok_or_else(|| {
            MonitorError::configuration("probe must be wired before the collector is started")
        })?;
        shared.probe = Some(probe);
        Ok(self)
    }

    /// Replace the export sink. Must be called before `start`.
    pub fn with_sink(mut self, sink: Arc<dyn ExportSink>) -> MonitorResult<Self> {
        let shared = Arc::get_mut(&mut self.shared).ok_or_else(|| {
            MonitorError::configuration("sink must be wired before the collector is started")
        })?;
        shared.sink = Some(sink);
        Ok(self)
    }

    pub fn store(&self) -> Arc<MetricStore> {
        Arc::clone(&self.shared.store)
    }

    /// Observer registration for snapshot and threshold-breach events
    pub fn subscribe(&self, callback: impl Fn(&CollectorEvent) + Send + Sync + 'static) {
        self.shared.subscribers.write().push(Box::new(callback));
    }

    /// Append an externally measured sample. Never blocks on I/O.
    pub fn record_metric(
        &self,
        name: impl Into<String>,
        value: f64,
        labels: HashMap<String, String>,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let sample = MetricSample {
            name: name.into(),
            timestamp: timestamp.unwrap_or_else(Utc::now),
            value,
            labels,
        };
        self.shared.store.push_sample(sample);
    }

    /// Start the collection loop. No-op with a warning if already running.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!("metrics collector already running");
            return;
        }

        let (tx, rx) = watch::channel(false);
        *self.shutdown_tx.write() = Some(tx);

        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(collection_loop(shared, rx)));

        info!(
            interval_secs = self.shared.config.collection_interval_secs,
            "metrics collector started"
        );
    }

    /// Stop the loop and wait for the in-flight cycle to finish
    pub async fn stop(&self) {
        let handle = {
            let mut task = self.task.lock().await;
            task.take()
        };
        let Some(handle) = handle else {
            warn!("metrics collector not running");
            return;
        };

        if let Some(tx) = self.shutdown_tx.write().take() {
            let _ = tx.send(true);
        }
        if let Err(e) = handle.await {
            error!("collection loop join failed: {e}");
        }
        info!("metrics collector stopped");
    }

    /// Compare the snapshot's fields against configured bounds
    pub fn check_system_thresholds(&self, snapshot: &SystemSnapshot) -> Vec<ThresholdBreach> {
        check_system_thresholds(&self.shared.config, snapshot)
    }

    pub fn check_application_thresholds(
        &self,
        snapshot: &ApplicationSnapshot,
    ) -> Vec<ThresholdBreach> {
        check_application_thresholds(&self.shared.config, snapshot)
    }

    /// Read-only status overview for dashboards
    pub fn metrics_summary(&self) -> MetricsSummary {
        MetricsSummary {
            running: self.shutdown_tx.read().is_some(),
            collection_interval_secs: self.shared.config.collection_interval_secs,
            counts: self.shared.store.counts(),
            latest_system: self.shared.store.latest_system(),
            latest_application: self.shared.store.latest_application(),
            custom_metrics: self.shared.store.metric_names(),
        }
    }

    /// Aggregate statistics over a trailing window
    pub fn metrics_report(&self, hours: u64) -> MetricsReport {
        let cutoff = Utc::now() - ChronoDuration::hours(hours as i64);
        let system = self.shared.store.system_history_since(cutoff);
        let application = self.shared.store.application_history_since(cutoff);

        MetricsReport {
            report_period_hours: hours,
            generated_at: Utc::now(),
            cpu: FieldStats::from_values(system.iter().map(|s| s.cpu_percent)),
            memory: FieldStats::from_values(system.iter().map(|s| s.memory_percent)),
            disk: FieldStats::from_values(system.iter().map(|s| s.disk_percent)),
            response_time: FieldStats::from_values(application.iter().map(|a| a.response_time_avg)),
            error_rate: FieldStats::from_values(application.iter().map(|a| a.error_rate)),
            total_requests: application.iter().map(|a| a.request_count).sum(),
            total_errors: application.iter().map(|a| a.error_count).sum(),
            system_points: system.len(),
            application_points: application.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub running: bool,
    pub collection_interval_secs: u64,
    pub counts: StoreCounts,
    pub latest_system: Option<SystemSnapshot>,
    pub latest_application: Option<ApplicationSnapshot>,
    pub custom_metrics: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FieldStats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

impl FieldStats {
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let values: Vec<f64> = values.collect();
        if values.is_empty() {
            return None;
        }
        Some(Self {
            avg: values.iter().sum::<f64>() / values.len() as f64,
            max: values.iter().cloned().fold(f64::MIN, f64::max),
            min: values.iter().cloned().fold(f64::MAX, f64::min),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub report_period_hours: u64,
    pub generated_at: DateTime<Utc>,
    pub cpu: Option<FieldStats>,
    pub memory: Option<FieldStats>,
    pub disk: Option<FieldStats>,
    pub response_time: Option<FieldStats>,
    pub error_rate: Option<FieldStats>,
    pub total_requests: u64,
    pub total_errors: u64,
    pub system_points: usize,
    pub application_points: usize,
}

async fn collection_loop(shared: Arc<CollectorShared>, mut shutdown: watch::Receiver<bool>) {
    let interval = Duration::from_secs(shared.config.collection_interval_secs);
    let export_interval = Duration::from_secs(shared.config.export.export_interval_secs.max(1));

    let mut collect_tick = tokio::time::interval(interval);
    collect_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut export_tick = tokio::time::interval(export_interval);
    export_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first export tick fires immediately; swallow it
    export_tick.tick().await;

    let mut sampler = SystemSampler::new();

    loop {
        tokio::select! {
            _ = collect_tick.tick() => {
                let started = Instant::now();
                if let Err(e) = collect_cycle(&shared, &mut sampler) {
                    error!("collection cycle failed: {e}");
                }
                let elapsed = started.elapsed();
                if elapsed > interval / 2 {
                    warn!(elapsed_ms = elapsed.as_millis() as u64, "collection cycle ran long");
                }
            }
            _ = export_tick.tick() => {
                if let Some(sink) = &shared.sink {
                    if let Err(e) = export_metrics(&shared, sink.as_ref()) {
                        error!("metrics export failed: {e}");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    // One final export so a shutdown does not lose the tail of the window
    if let Some(sink) = &shared.sink {
        if let Err(e) = export_metrics(&shared, sink.as_ref()) {
            error!("final metrics export failed: {e}");
        }
    }
    debug!("collection loop exited");
}

fn collect_cycle(shared: &CollectorShared, sampler: &mut SystemSampler) -> MonitorResult<()> {
    let mut breaches = Vec::new();

    if shared.config.enable_system_metrics {
        let snapshot = sampler.sample()?;
        breaches.extend(check_system_thresholds(&shared.config, &snapshot));
        shared.store.push_system(snapshot.clone());
        notify(shared, &CollectorEvent::System(snapshot));
    }

    if let Some(probe) = &shared.probe {
        match probe.sample() {
            Ok(snapshot) => {
                breaches.extend(check_application_thresholds(&shared.config, &snapshot));
                shared.store.push_application(snapshot.clone());
                notify(shared, &CollectorEvent::Application(snapshot));
            }
            Err(e) => error!("application probe failed: {e}"),
        }
    }

    let evicted = shared.store.evict_expired(Utc::now());
    if evicted > 0 {
        debug!(evicted, "evicted expired metric points");
    }

    for breach in breaches {
        match breach.level {
            BreachLevel::Warning => warn!("{}", breach.message),
            BreachLevel::Critical => error!("{}", breach.message),
        }
        notify(shared, &CollectorEvent::ThresholdBreach(breach));
    }

    Ok(())
}

fn notify(shared: &CollectorShared, event: &CollectorEvent) {
    for subscriber in shared.subscribers.read().iter() {
        // A misbehaving subscriber must not take the loop down with it
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| subscriber(event)));
        if result.is_err() {
            error!("collector subscriber panicked");
        }
    }
}

fn export_metrics(shared: &CollectorShared, sink: &dyn ExportSink) -> MonitorResult<()> {
    let custom_metrics = shared
        .store
        .metric_names()
        .into_iter()
        .map(|name| {
            let history = shared.store.sample_history(&name);
            (name, history)
        })
        .collect();

    let dump = MetricsDump {
        exported_at: Utc::now(),
        system_metrics: shared.store.system_history(),
        application_metrics: shared.store.application_history(),
        custom_metrics,
    };
    sink.export(&dump)?;
    debug!(
        system = dump.system_metrics.len(),
        application = dump.application_metrics.len(),
        "metrics exported"
    );
    Ok(())
}

fn check_system_thresholds(
    config: &CollectorConfig,
    snapshot: &SystemSnapshot,
) -> Vec<ThresholdBreach> {
    let t = &config.thresholds;
    let mut breaches = Vec::new();

    push_breach(
        &mut breaches,
        "cpu_percent",
        snapshot.cpu_percent,
        t.cpu_warning,
        t.cpu_critical,
        "%",
    );
    push_breach(
        &mut breaches,
        "memory_percent",
        snapshot.memory_percent,
        t.memory_warning,
        t.memory_critical,
        "%",
    );
    push_breach(
        &mut breaches,
        "disk_percent",
        snapshot.disk_percent,
        t.disk_warning,
        t.disk_critical,
        "%",
    );

    breaches
}

fn check_application_thresholds(
    config: &CollectorConfig,
    snapshot: &ApplicationSnapshot,
) -> Vec<ThresholdBreach> {
    let t = &config.thresholds;
    let mut breaches = Vec::new();

    push_breach(
        &mut breaches,
        "response_time_avg",
        snapshot.response_time_avg,
        t.response_time_warning,
        t.response_time_critical,
        "s",
    );
    push_breach(
        &mut breaches,
        "error_rate",
        snapshot.error_rate,
        t.error_rate_warning,
        t.error_rate_critical,
        "",
    );

    breaches
}

fn push_breach(
    breaches: &mut Vec<ThresholdBreach>,
    metric: &str,
    value: f64,
    warning: f64,
    critical: f64,
    unit: &str,
) {
    if value >= critical {
        breaches.push(ThresholdBreach {
            level: BreachLevel::Critical,
            metric: metric.to_string(),
            value,
            threshold: critical,
            message: format!("{metric} at critical level: {value:.2}{unit} >= {critical:.2}{unit}"),
        });
    } else if value >= warning {
        breaches.push(ThresholdBreach {
            level: BreachLevel::Warning,
            metric: metric.to_string(),
            value,
            threshold: warning,
            message: format!("{metric} elevated: {value:.2}{unit} >= {warning:.2}{unit}"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdConfig;

    fn system_snapshot(cpu: f64, memory: f64, disk: f64) -> SystemSnapshot {
        SystemSnapshot {
            timestamp: Utc::now(),
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
            network_bytes_sent: 0,
            network_bytes_recv: 0,
            process_count: 100,
            load_average: [0.1, 0.1, 0.1],
        }
    }

    #[test]
    fn test_threshold_levels() {
        let config = CollectorConfig {
            thresholds: ThresholdConfig::default(),
            ..Default::default()
        };

        // Below everything
        assert!(check_system_thresholds(&config, &system_snapshot(10.0, 10.0, 10.0)).is_empty());

        // CPU warning only (70 <= 75 < 90)
        let breaches = check_system_thresholds(&config, &system_snapshot(75.0, 10.0, 10.0));
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].level, BreachLevel::Warning);
        assert_eq!(breaches[0].metric, "cpu_percent");

        // CPU critical and memory critical together
        let breaches = check_system_thresholds(&config, &system_snapshot(95.0, 96.0, 10.0));
        assert_eq!(breaches.len(), 2);
        assert!(breaches.iter().all(|b| b.level == BreachLevel::Critical));
    }

    #[test]
    fn test_record_metric_isolated_rings() {
        let collector = MetricsCollector::new(CollectorConfig::default());
        collector.record_metric("fill_latency_ms", 0.8, HashMap::new(), None);
        collector.record_metric("fill_latency_ms", 1.2, HashMap::new(), None);
        collector.record_metric("spread_bps", 12.0, HashMap::new(), None);

        let store = collector.store();
        assert_eq!(store.sample_history("fill_latency_ms").len(), 2);
        assert_eq!(store.sample_history("spread_bps").len(), 1);
    }

    #[test]
    fn test_subscribers_receive_threshold_events() {
        let collector = MetricsCollector::new(CollectorConfig::default());
        let seen = Arc::new(RwLock::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        collector.subscribe(move |event| {
            if let CollectorEvent::ThresholdBreach(b) = event {
                seen_clone.write().push(b.metric.clone());
            }
        });

        let breaches = collector.check_system_thresholds(&system_snapshot(95.0, 10.0, 10.0));
        for breach in breaches {
            notify(
                &collector.shared,
                &CollectorEvent::ThresholdBreach(breach),
            );
        }
        assert_eq!(seen.read().as_slice(), ["cpu_percent"]);
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let collector = MetricsCollector::new(CollectorConfig {
            collection_interval_secs: 3600,
            enable_system_metrics: false,
            ..Default::default()
        });

        collector.start().await;
        collector.start().await; // warns, no second task
        collector.stop().await;
        collector.stop().await; // warns, no panic
    }

    #[tokio::test]
    async fn test_late_probe_wiring_rejected() {
        struct NoopProbe;
        impl ApplicationProbe for NoopProbe {
            fn sample(&self) -> MonitorResult<ApplicationSnapshot> {
                Err(MonitorError::configuration("unused"))
            }
        }

        let collector = MetricsCollector::new(CollectorConfig {
            collection_interval_secs: 3600,
            enable_system_metrics: false,
            ..Default::default()
        });
        collector.start().await;

        // The running loop holds a clone of the shared state
        let err = collector
            .with_probe(Arc::new(NoopProbe))
            .err()
            .expect("wiring a probe after start must fail");
        assert!(matches!(err, MonitorError::Configuration(_)));
    }

    #[test]
    fn test_json_file_sink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export").join("metrics.json");
        let sink = JsonFileSink::new(&path);

        let dump = MetricsDump {
            exported_at: Utc::now(),
            system_metrics: vec![system_snapshot(40.0, 50.0, 60.0)],
            application_metrics: Vec::new(),
            custom_metrics: HashMap::new(),
        };
        sink.export(&dump).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("system_metrics"));
        assert!(contents.contains("cpu_percent"));
    }

    #[test]
    fn test_metrics_report_aggregates() {
        let collector = MetricsCollector::new(CollectorConfig::default());
        let store = collector.store();
        store.push_system(system_snapshot(20.0, 40.0, 50.0));
        store.push_system(system_snapshot(60.0, 40.0, 50.0));

        let report = collector.metrics_report(1);
        let cpu = report.cpu.unwrap();
        assert_eq!(cpu.avg, 40.0);
        assert_eq!(cpu.max, 60.0);
        assert_eq!(cpu.min, 20.0);
        assert_eq!(report.system_points, 2);
        assert!(report.response_time.is_none());
    }
}
