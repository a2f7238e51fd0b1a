//! Notification channels, payload rendering, and per-channel rate limiting
//!
//! Channels declare a kind, provider settings, and a severity filter. Payloads
//! are rendered per provider shape; actual delivery goes through the
//! `ChannelSender` seam so transports can be swapped without touching the
//! manager. The default sender logs the rendered payload.

use super::alert::Alert;
use crate::core::{MonitorResult, Severity};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use tracing::info;

/// Known provider kinds; unrecognized kinds fail deserialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Webhook,
    Slack,
    Dingtalk,
}

/// A configured notification target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub channel_id: String,
    pub name: String,
    pub kind: ChannelKind,
    /// Provider settings: recipients, URLs, tokens
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Severities this channel accepts; empty means all
    #[serde(default)]
    pub severity_filter: Vec<Severity>,
}

fn default_enabled() -> bool {
    true
}

impl NotificationChannel {
    pub fn new(channel_id: impl Into<String>, name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            channel_id: channel_id.into(),
            name: name.into(),
            kind,
            config: HashMap::new(),
            enabled: true,
            severity_filter: Vec::new(),
        }
    }

    pub fn with_severity_filter(mut self, severities: Vec<Severity>) -> Self {
        self.severity_filter = severities;
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn accepts(&self, severity: Severity) -> bool {
        self.severity_filter.is_empty() || self.severity_filter.contains(&severity)
    }
}

/// Render the provider-shaped payload for one alert
pub fn render_payload(channel: &NotificationChannel, alert: &Alert) -> Value {
    match channel.kind {
        ChannelKind::Email => json!({
            "to": channel.config.get("recipients").cloned().unwrap_or_default(),
            "subject": format!("[{}] {}", alert.severity.to_string().to_uppercase(), alert.title),
            "body": format!(
                "Alert: {}\nSeverity: {}\nMetric: {} = {}\nThreshold: {}\nStarted: {}\n\n{}",
                alert.title,
                alert.severity,
                alert.metric_name,
                alert.current_value,
                alert.threshold,
                alert.started_at.to_rfc3339(),
                alert.description
            ),
        }),
        ChannelKind::Webhook => json!({
            "url": channel.config.get("url").cloned().unwrap_or_default(),
            "payload": {
                "alert_id": alert.alert_id,
                "rule_id": alert.rule_id,
                "title": alert.title,
                "description": alert.description,
                "severity": alert.severity,
                "status": alert.status,
                "metric_name": alert.metric_name,
                "current_value": alert.current_value,
                "threshold": alert.threshold,
                "started_at": alert.started_at,
                "labels": alert.labels,
            },
        }),
        ChannelKind::Slack => json!({
            "channel": channel.config.get("channel").cloned().unwrap_or_default(),
            "attachments": [{
                "color": slack_color(alert.severity),
                "title": alert.title,
                "text": alert.description,
                "fields": [
                    {"title": "Severity", "value": alert.severity.to_string(), "short": true},
                    {"title": "Metric", "value": alert.metric_name, "short": true},
                    {"title": "Value", "value": alert.current_value.to_string(), "short": true},
                    {"title": "Threshold", "value": alert.threshold.to_string(), "short": true},
                ],
                "ts": alert.started_at.timestamp(),
            }],
        }),
        ChannelKind::Dingtalk => json!({
            "msgtype": "markdown",
            "markdown": {
                "title": format!("{} alert: {}", alert.severity, alert.title),
                "text": format!(
                    "### {} alert: {}\n- metric: {}\n- value: {}\n- threshold: {}\n- started: {}\n\n{}",
                    alert.severity,
                    alert.title,
                    alert.metric_name,
                    alert.current_value,
                    alert.threshold,
                    alert.started_at.to_rfc3339(),
                    alert.description
                ),
            },
        }),
    }
}

fn slack_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "#d32f2f",
        Severity::High => "#f57c00",
        Severity::Medium => "#fbc02d",
        Severity::Low => "#388e3c",
    }
}

/// Delivery seam; the manager only knows this trait
pub trait ChannelSender: Send + Sync {
    fn deliver(&self, channel: &NotificationChannel, alert: &Alert) -> MonitorResult<()>;
}

/// Default delivery: render the payload and log it
pub struct LogSender;

impl ChannelSender for LogSender {
    fn deliver(&self, channel: &NotificationChannel, alert: &Alert) -> MonitorResult<()> {
        let payload = render_payload(channel, alert);
        info!(
            channel = %channel.channel_id,
            kind = ?channel.kind,
            alert_id = %alert.alert_id,
            severity = %alert.severity,
            payload = %payload,
            "notification delivered"
        );
        Ok(())
    }
}

/// Sliding-window rate limiter keyed by channel id
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    sent: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: usize) -> Self {
        Self {
            limit: limit_per_minute,
            window: Duration::seconds(60),
            sent: Mutex::new(HashMap::new()),
        }
    }

    /// Record one send if the channel is under its limit within the rolling
    /// window; returns false when the send must be dropped.
    pub fn try_acquire(&self, channel_id: &str, now: DateTime<Utc>) -> bool {
        let mut sent = self.sent.lock();
        let entries = sent.entry(channel_id.to_string()).or_default();

        let cutoff = now - self.window;
        while entries.front().is_some_and(|t| *t <= cutoff) {
            entries.pop_front();
        }

        if entries.len() < self.limit {
            entries.push_back(now);
            true
        } else {
            false
        }
    }
}
