//! Alert lifecycle management
//!
//! Each rule runs an independent state machine:
//! Idle -> Breaching (condition true, timer started) -> Firing (condition
//! sustained for the rule's duration) -> Resolved (condition false while
//! firing) -> Idle. Notifications go out only on the Firing and Resolved
//! transitions; re-evaluations of an already-firing alert update it in place.

use super::alert::{alert_id, Alert, AlertStatistics, AlertStatus};
use super::channels::{ChannelSender, LogSender, NotificationChannel, RateLimiter};
use super::dispatch::{DispatchCounts, Dispatcher, NotificationJob};
use super::persistence;
use super::rules::{AlertRule, RuleState};
use crate::config::AlertConfig;
use crate::core::{MonitorError, MonitorResult, Severity};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Same-severity alerts firing close together, for batched reporting
#[derive(Debug, Clone, Serialize)]
pub struct AlertGroup {
    pub group_id: String,
    pub severity: Severity,
    pub alert_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct AlertManager {
    config: AlertConfig,
    rules: RwLock<HashMap<String, AlertRule>>,
    rule_states: RwLock<HashMap<String, RuleState>>,
    channels: RwLock<HashMap<String, NotificationChannel>>,
    active: RwLock<HashMap<String, Alert>>,
    history: RwLock<VecDeque<Alert>>,
    groups: RwLock<Vec<AlertGroup>>,
    rate_limiter: RateLimiter,
    sender: Arc<dyn ChannelSender>,
    dispatcher: RwLock<Option<Dispatcher>>,
    shutdown_tx: RwLock<Option<watch::Sender<bool>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl AlertManager {
    pub fn new(config: AlertConfig) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute);
        Self {
            config,
            rules: RwLock::new(HashMap::new()),
            rule_states: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            groups: RwLock::new(Vec::new()),
            rate_limiter,
            sender: Arc::new(LogSender),
            dispatcher: RwLock::new(None),
            shutdown_tx: RwLock::new(None),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Swap the delivery transport. Must be called before `start`.
    pub fn with_sender(mut self, sender: Arc<dyn ChannelSender>) -> Self {
        self.sender = sender;
        self
    }

    /// Restore rules and active alerts from the configured store
    pub fn load_state(&self) {
        let Some(path) = self.config.storage_path.as_ref() else {
            return;
        };
        let store = persistence::load(path);
        let mut rules = self.rules.write();
        for rule in store.rules {
            rules.insert(rule.rule_id.clone(), rule);
        }
        drop(rules);
        let mut active = self.active.write();
        for alert in store.active_alerts {
            active.insert(alert.alert_id.clone(), alert);
        }
    }

    pub fn save_state(&self) -> MonitorResult<()> {
        let Some(path) = self.config.storage_path.as_ref() else {
            return Ok(());
        };
        let rules: Vec<AlertRule> = self.rules.read().values().cloned().collect();
        let active: Vec<Alert> = self.active.read().values().cloned().collect();
        persistence::save(path, rules, active)
    }

    pub fn add_rule(&self, rule: AlertRule) -> MonitorResult<()> {
        rule.validate()?;
        let mut rules = self.rules.write();
        if rules.insert(rule.rule_id.clone(), rule.clone()).is_some() {
            info!(rule_id = %rule.rule_id, "alert rule replaced");
        } else {
            info!(rule_id = %rule.rule_id, metric = %rule.metric_name, "alert rule added");
        }
        Ok(())
    }

    /// Remove a rule and resolve any alert it had active
    pub fn remove_rule(&self, rule_id: &str) -> bool {
        let removed = self.rules.write().remove(rule_id).is_some();
        if removed {
            self.rule_states.write().remove(rule_id);
            let now = Utc::now();
            let orphaned: Vec<Alert> = {
                let mut active = self.active.write();
                let ids: Vec<String> = active
                    .values()
                    .filter(|a| a.rule_id == rule_id)
                    .map(|a| a.alert_id.clone())
                    .collect();
                ids.iter().filter_map(|id| active.remove(id)).collect()
            };
            for mut alert in orphaned {
                alert.resolve(now);
                self.record_resolution(&alert);
                info!(alert_id = %alert.alert_id, "alert resolved by rule removal");
            }
            info!(rule_id, "alert rule removed");
        }
        removed
    }

    pub fn add_channel(&self, channel: NotificationChannel) -> MonitorResult<()> {
        if channel.channel_id.is_empty() {
            return Err(MonitorError::configuration("channel_id must not be empty"));
        }
        info!(channel_id = %channel.channel_id, kind = ?channel.kind, "notification channel added");
        self.channels.write().insert(channel.channel_id.clone(), channel);
        Ok(())
    }

    pub fn remove_channel(&self, channel_id: &str) -> bool {
        let removed = self.channels.write().remove(channel_id).is_some();
        if removed {
            info!(channel_id, "notification channel removed");
        }
        removed
    }

    /// Deliver a synthetic alert through one channel, bypassing rate limits
    pub fn test_channel(&self, channel_id: &str) -> MonitorResult<()> {
        let channel = self
            .channels
            .read()
            .get(channel_id)
            .cloned()
            .ok_or_else(|| {
                MonitorError::configuration(format!("unknown channel: {channel_id}"))
            })?;

        let rule = AlertRule::new(
            "channel_test",
            "Channel delivery test",
            "test_metric",
            super::rules::Condition::Gt,
            0.0,
            Severity::Low,
        );
        let alert = Alert::from_rule(&rule, 1.0, Utc::now());
        self.sender.deliver(&channel, &alert).map_err(|e| {
            MonitorError::notification(channel_id, e.to_string())
        })
    }

    /// Evaluate one sample against every enabled rule on its metric.
    /// Returns alerts that transitioned to Firing on this evaluation.
    pub fn evaluate(
        &self,
        metric_name: &str,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Vec<Alert> {
        let now = timestamp.unwrap_or_else(Utc::now);

        let matching: Vec<AlertRule> = self
            .rules
            .read()
            .values()
            .filter(|r| r.enabled && r.metric_name == metric_name)
            .cloned()
            .collect();

        let mut fired = Vec::new();
        for rule in matching {
            if rule.condition.check(value, rule.threshold) {
                let elapsed = {
                    let mut states = self.rule_states.write();
                    states.entry(rule.rule_id.clone()).or_default().record_breach(now)
                };
                debug!(
                    rule_id = %rule.rule_id,
                    value,
                    breach_secs = elapsed.num_seconds(),
                    "rule condition breaching"
                );
                if elapsed >= Duration::seconds(rule.duration_secs as i64) {
                    if let Some(alert) = self.fire_alert(&rule, value, now) {
                        fired.push(alert);
                    }
                }
            } else {
                // State exists only while the condition holds
                self.rule_states.write().remove(&rule.rule_id);
                self.resolve_for_rule(&rule.rule_id, now);
            }
        }
        fired
    }

    /// Create or refresh the alert for a sustained breach. Returns the alert
    /// only on the Idle/Breaching -> Firing transition.
    fn fire_alert(&self, rule: &AlertRule, value: f64, now: DateTime<Utc>) -> Option<Alert> {
        let id = alert_id(&rule.rule_id, &rule.labels);

        let alert = Alert::from_rule(rule, value, now);
        {
            let mut active = self.active.write();
            if let Some(existing) = active.get_mut(&id) {
                existing.current_value = value;
                existing
                    .annotations
                    .insert("last_updated".to_string(), now.to_rfc3339());
                return None;
            }
            active.insert(id.clone(), alert.clone());
        }
        info!(
            alert_id = %alert.alert_id,
            rule_id = %alert.rule_id,
            severity = %alert.severity,
            value,
            "alert firing"
        );

        self.push_history(alert.clone());
        if self.config.enable_grouping {
            self.associate_group(&alert, now);
        }
        self.notify(&alert, now);
        Some(alert)
    }

    /// Resolve the active alert for a rule once its condition clears
    fn resolve_for_rule(&self, rule_id: &str, now: DateTime<Utc>) {
        let resolved: Vec<Alert> = {
            let mut active = self.active.write();
            let ids: Vec<String> = active
                .values()
                .filter(|a| a.rule_id == rule_id)
                .map(|a| a.alert_id.clone())
                .collect();
            ids.iter().filter_map(|id| active.remove(id)).collect()
        };

        for mut alert in resolved {
            alert.resolve(now);
            info!(
                alert_id = %alert.alert_id,
                rule_id,
                duration_secs = (now - alert.started_at).num_seconds(),
                "alert resolved"
            );
            self.record_resolution(&alert);
            self.notify(&alert, now);
        }
    }

    fn push_history(&self, alert: Alert) {
        let mut history = self.history.write();
        if history.len() == self.config.max_history {
            history.pop_front();
        }
        history.push_back(alert);
    }

    /// Mark the matching firing entry in history as resolved
    fn record_resolution(&self, alert: &Alert) {
        let mut history = self.history.write();
        if let Some(entry) = history
            .iter_mut()
            .rev()
            .find(|e| e.alert_id == alert.alert_id && e.status == AlertStatus::Firing)
        {
            entry.status = AlertStatus::Resolved;
            entry.resolved_at = alert.resolved_at;
        } else {
            // Resolution without a firing entry (e.g. restored state)
            if history.len() == self.config.max_history {
                history.pop_front();
            }
            history.push_back(alert.clone());
        }
    }

    fn associate_group(&self, alert: &Alert, now: DateTime<Utc>) {
        let window = Duration::minutes(self.config.grouping_window_minutes);
        let mut groups = self.groups.write();
        if let Some(group) = groups
            .iter_mut()
            .find(|g| g.severity == alert.severity && now - g.updated_at <= window)
        {
            group.alert_ids.push(alert.alert_id.clone());
            group.updated_at = now;
            debug!(group_id = %group.group_id, alert_id = %alert.alert_id, "alert joined group");
        } else {
            groups.push(AlertGroup {
                group_id: format!("group_{}_{}", alert.severity, now.timestamp()),
                severity: alert.severity,
                alert_ids: vec![alert.alert_id.clone()],
                created_at: now,
                updated_at: now,
            });
        }
    }

    /// Route one transitioned alert to its channels
    fn notify(&self, alert: &Alert, now: DateTime<Utc>) {
        let mut channel_ids: Vec<String> = self.config.default_channels.clone();
        if let Some(extra) = alert.labels.get("notification_channels") {
            for id in extra.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !channel_ids.iter().any(|c| c == id) {
                    channel_ids.push(id.to_string());
                }
            }
        }

        let channels = self.channels.read();
        for channel_id in channel_ids {
            let Some(channel) = channels.get(&channel_id) else {
                warn!(channel_id, alert_id = %alert.alert_id, "unknown notification channel");
                continue;
            };
            if !channel.enabled {
                debug!(channel_id, "channel disabled, skipping");
                continue;
            }
            if !channel.accepts(alert.severity) {
                debug!(
                    channel_id,
                    severity = %alert.severity,
                    "severity filtered, skipping"
                );
                continue;
            }
            if !self.rate_limiter.try_acquire(&channel_id, now) {
                warn!(
                    channel_id,
                    alert_id = %alert.alert_id,
                    limit_per_minute = self.config.rate_limit_per_minute,
                    "notification rate limited, dropping"
                );
                continue;
            }

            let job = NotificationJob {
                channel: channel.clone(),
                alert: alert.clone(),
            };
            let dispatched = {
                let dispatcher = self.dispatcher.read();
                match dispatcher.as_ref() {
                    Some(d) => {
                        d.enqueue(job);
                        true
                    }
                    None => false,
                }
            };
            // Without the worker pool running, deliver inline
            if !dispatched {
                if let Err(e) = self.sender.deliver(channel, alert) {
                    error!(channel_id, alert_id = %alert.alert_id, "delivery failed: {e}");
                }
            }
        }
    }

    /// Active alerts ordered by severity then recency. An empty severity
    /// list means all severities, like a channel's severity filter.
    pub fn get_active_alerts(&self, severities: &[Severity]) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .active
            .read()
            .values()
            .filter(|a| severities.is_empty() || severities.contains(&a.severity))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.started_at.cmp(&a.started_at))
        });
        alerts
    }

    pub fn get_history(&self) -> Vec<Alert> {
        self.history.read().iter().cloned().collect()
    }

    pub fn get_groups(&self) -> Vec<AlertGroup> {
        self.groups.read().clone()
    }

    pub fn get_alert_statistics(&self) -> AlertStatistics {
        let cutoff = Utc::now() - Duration::hours(24);
        let active = self.active.read();
        let history = self.history.read();
        let rules = self.rules.read();

        let mut by_severity: HashMap<String, usize> = HashMap::new();
        for alert in active.values() {
            *by_severity.entry(alert.severity.to_string()).or_default() += 1;
        }

        AlertStatistics {
            active_total: active.len(),
            active_by_severity: by_severity,
            history_total: history.len(),
            fired_last_24h: history.iter().filter(|a| a.started_at >= cutoff).count(),
            resolved_last_24h: history
                .iter()
                .filter(|a| a.resolved_at.is_some_and(|t| t >= cutoff))
                .count(),
            rules_total: rules.len(),
            rules_enabled: rules.values().filter(|r| r.enabled).count(),
            channels_total: self.channels.read().len(),
        }
    }

    pub fn dispatch_counts(&self) -> DispatchCounts {
        self.dispatcher
            .read()
            .as_ref()
            .map(Dispatcher::counts)
            .unwrap_or_default()
    }

    /// Purge expired history and stale groups
    pub fn cleanup(&self, now: DateTime<Utc>) {
        let retention_cutoff = now - Duration::hours(self.config.retention_hours as i64);
        let purged = {
            let mut history = self.history.write();
            let before = history.len();
            history.retain(|a| a.started_at >= retention_cutoff);
            before - history.len()
        };
        if purged > 0 {
            debug!(purged, "expired alerts purged from history");
        }

        let window = Duration::minutes(self.config.grouping_window_minutes);
        self.groups.write().retain(|g| now - g.updated_at <= window);
    }

    /// Start the notification worker pool and the maintenance loop
    pub async fn start(self: Arc<Self>) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!("alert manager already running");
            return;
        }

        *self.dispatcher.write() = Some(Dispatcher::new(
            self.config.notification_workers,
            self.config.notification_queue_capacity,
            Arc::clone(&self.sender),
        ));

        let (tx, rx) = watch::channel(false);
        *self.shutdown_tx.write() = Some(tx);

        let loop_manager = Arc::clone(&self);
        *task = Some(tokio::spawn(maintenance_loop(loop_manager, rx)));

        info!(
            workers = self.config.notification_workers,
            maintenance_interval_secs = self.config.maintenance_interval_secs,
            "alert manager started"
        );
    }

    /// Stop the maintenance loop, drain the worker pool, save state
    pub async fn stop(&self) {
        let handle = {
            let mut task = self.task.lock().await;
            task.take()
        };
        let Some(handle) = handle else {
            warn!("alert manager not running");
            return;
        };

        if let Some(tx) = self.shutdown_tx.write().take() {
            let _ = tx.send(true);
        }
        if let Err(e) = handle.await {
            error!("maintenance loop join failed: {e}");
        }

        let dispatcher = self.dispatcher.write().take();
        if let Some(dispatcher) = dispatcher {
            dispatcher.shutdown().await;
        }

        if let Err(e) = self.save_state() {
            error!("alert state save failed on shutdown: {e}");
        }
        info!("alert manager stopped");
    }
}

async fn maintenance_loop(manager: Arc<AlertManager>, mut shutdown: watch::Receiver<bool>) {
    let interval = StdDuration::from_secs(manager.config.maintenance_interval_secs);
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tick.tick().await;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                manager.cleanup(Utc::now());
                if let Err(e) = manager.save_state() {
                    error!("periodic alert state save failed: {e}");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("maintenance loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::channels::ChannelKind;
    use crate::alerting::rules::Condition;

    fn manager() -> AlertManager {
        AlertManager::new(AlertConfig::default())
    }

    fn cpu_rule(duration_secs: u64) -> AlertRule {
        AlertRule::new("cpu_high", "High CPU", "cpu_percent", Condition::Gt, 80.0, Severity::High)
            .with_duration(duration_secs)
    }

    #[test]
    fn test_duration_gate_holds_until_sustained() {
        let manager = manager();
        manager.add_rule(cpu_rule(3)).unwrap();
        let t0 = Utc::now();

        assert!(manager.evaluate("cpu_percent", 85.0, Some(t0)).is_empty());
        assert!(manager
            .evaluate("cpu_percent", 87.0, Some(t0 + Duration::seconds(1)))
            .is_empty());
        // 3 seconds after the first breach the gate opens
        let fired = manager.evaluate("cpu_percent", 90.0, Some(t0 + Duration::seconds(3)));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].current_value, 90.0);
        assert_eq!(fired[0].status, AlertStatus::Firing);
    }

    #[test]
    fn test_false_evaluation_resets_breach() {
        let manager = manager();
        manager.add_rule(cpu_rule(5)).unwrap();
        let t0 = Utc::now();

        for i in 0..4 {
            assert!(manager
                .evaluate("cpu_percent", 85.0, Some(t0 + Duration::seconds(i)))
                .is_empty());
        }
        // Condition clears before the gate opens: full reset
        manager.evaluate("cpu_percent", 50.0, Some(t0 + Duration::seconds(4)));

        // The timer starts over; 4 more seconds of breach still isn't enough
        for i in 5..9 {
            assert!(manager
                .evaluate("cpu_percent", 85.0, Some(t0 + Duration::seconds(i)))
                .is_empty());
        }
        let fired = manager.evaluate("cpu_percent", 85.0, Some(t0 + Duration::seconds(10)));
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn test_rule_state_exists_only_while_breaching() {
        let manager = manager();
        manager.add_rule(cpu_rule(5)).unwrap();
        let t0 = Utc::now();

        // A passing evaluation must not materialize state for the rule
        manager.evaluate("cpu_percent", 50.0, Some(t0));
        assert!(!manager.rule_states.read().contains_key("cpu_high"));

        // Breach creates it, clearing removes it
        manager.evaluate("cpu_percent", 85.0, Some(t0 + Duration::seconds(1)));
        assert!(manager.rule_states.read().contains_key("cpu_high"));
        manager.evaluate("cpu_percent", 50.0, Some(t0 + Duration::seconds(2)));
        assert!(!manager.rule_states.read().contains_key("cpu_high"));
    }

    #[test]
    fn test_refire_dedupes_and_updates_value() {
        let manager = manager();
        manager.add_rule(cpu_rule(0)).unwrap();
        let t0 = Utc::now();

        let fired = manager.evaluate("cpu_percent", 85.0, Some(t0));
        assert_eq!(fired.len(), 1);
        let id = fired[0].alert_id.clone();

        // Still breaching: no new alert, value updated in place
        let fired = manager.evaluate("cpu_percent", 92.0, Some(t0 + Duration::seconds(5)));
        assert!(fired.is_empty());

        let active = manager.get_active_alerts(&[]);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].alert_id, id);
        assert_eq!(active[0].current_value, 92.0);
        assert!(active[0].annotations.contains_key("last_updated"));
    }

    #[test]
    fn test_resolution_moves_to_history() {
        let manager = manager();
        manager.add_rule(cpu_rule(0)).unwrap();
        let t0 = Utc::now();

        manager.evaluate("cpu_percent", 85.0, Some(t0));
        manager.evaluate("cpu_percent", 60.0, Some(t0 + Duration::seconds(30)));

        assert!(manager.get_active_alerts(&[]).is_empty());
        let history = manager.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, AlertStatus::Resolved);
        assert!(history[0].resolved_at.unwrap() >= history[0].started_at);
    }

    #[test]
    fn test_active_alerts_sorted_and_filtered() {
        let manager = manager();
        manager.add_rule(cpu_rule(0)).unwrap();
        manager
            .add_rule(
                AlertRule::new("mem_high", "High memory", "memory_percent", Condition::Gt, 90.0, Severity::Critical)
                    .with_duration(0),
            )
            .unwrap();

        manager
            .add_rule(
                AlertRule::new("disk_low", "Disk filling", "disk_percent", Condition::Gt, 70.0, Severity::Medium)
                    .with_duration(0),
            )
            .unwrap();

        let t0 = Utc::now();
        manager.evaluate("cpu_percent", 85.0, Some(t0));
        manager.evaluate("memory_percent", 95.0, Some(t0 + Duration::seconds(1)));
        manager.evaluate("disk_percent", 75.0, Some(t0 + Duration::seconds(2)));

        let active = manager.get_active_alerts(&[]);
        assert_eq!(active.len(), 3);
        assert_eq!(active[0].severity, Severity::Critical);

        let critical_only = manager.get_active_alerts(&[Severity::Critical]);
        assert_eq!(critical_only.len(), 1);
        assert_eq!(critical_only[0].rule_id, "mem_high");

        // Multiple severities select the union, still ordered
        let urgent = manager.get_active_alerts(&[Severity::Critical, Severity::High]);
        assert_eq!(urgent.len(), 2);
        assert_eq!(urgent[0].rule_id, "mem_high");
        assert_eq!(urgent[1].rule_id, "cpu_high");
    }

    #[test]
    fn test_grouping_by_severity_within_window() {
        let manager = manager();
        manager.add_rule(cpu_rule(0)).unwrap();
        manager
            .add_rule(
                AlertRule::new("load_high", "High load", "load_1m", Condition::Gt, 8.0, Severity::High)
                    .with_duration(0),
            )
            .unwrap();

        let t0 = Utc::now();
        manager.evaluate("cpu_percent", 85.0, Some(t0));
        manager.evaluate("load_1m", 9.0, Some(t0 + Duration::seconds(60)));

        let groups = manager.get_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].alert_ids.len(), 2);
        assert_eq!(groups[0].severity, Severity::High);
    }

    #[test]
    fn test_cleanup_purges_expired_history() {
        let mut config = AlertConfig::default();
        config.retention_hours = 1;
        let manager = AlertManager::new(config);
        manager.add_rule(cpu_rule(0)).unwrap();

        let old = Utc::now() - Duration::hours(2);
        manager.evaluate("cpu_percent", 85.0, Some(old));
        manager.evaluate("cpu_percent", 50.0, Some(old + Duration::seconds(10)));
        assert_eq!(manager.get_history().len(), 1);

        manager.cleanup(Utc::now());
        assert!(manager.get_history().is_empty());
    }

    #[test]
    fn test_rule_removal_resolves_its_alerts() {
        let manager = manager();
        manager.add_rule(cpu_rule(0)).unwrap();
        manager.evaluate("cpu_percent", 85.0, None);
        assert_eq!(manager.get_active_alerts(&[]).len(), 1);

        assert!(manager.remove_rule("cpu_high"));
        assert!(manager.get_active_alerts(&[]).is_empty());
        assert_eq!(manager.get_history()[0].status, AlertStatus::Resolved);
    }

    #[test]
    fn test_statistics() {
        let manager = manager();
        manager.add_rule(cpu_rule(0)).unwrap();
        manager
            .add_channel(NotificationChannel::new("hook", "Hook", ChannelKind::Webhook))
            .unwrap();
        manager.evaluate("cpu_percent", 85.0, None);

        let stats = manager.get_alert_statistics();
        assert_eq!(stats.active_total, 1);
        assert_eq!(stats.active_by_severity["high"], 1);
        assert_eq!(stats.fired_last_24h, 1);
        assert_eq!(stats.rules_total, 1);
        assert_eq!(stats.channels_total, 1);
    }

    #[test]
    fn test_unknown_test_channel_errors() {
        let manager = manager();
        assert!(manager.test_channel("missing").is_err());
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let manager = Arc::new(AlertManager::new(AlertConfig::default()));
        Arc::clone(&manager).start().await;
        Arc::clone(&manager).start().await; // warns, no second loop
        manager.stop().await;
        manager.stop().await; // warns, no panic
    }
}
