//! Alert instances and their deterministic identity
//!
//! An alert's identity is a function of its rule and labels only, so the
//! same condition breaching again maps onto the same id and deduplicates
//! instead of stacking.

use super::rules::AlertRule;
use crate::core::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
    Suppressed,
}

/// One firing (or resolved) instance of a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    pub rule_id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: AlertStatus,
    pub metric_name: String,
    pub current_value: f64,
    pub threshold: f64,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl Alert {
    /// Build a firing alert from a breached rule
    pub fn from_rule(rule: &AlertRule, current_value: f64, started_at: DateTime<Utc>) -> Self {
        Self {
            alert_id: alert_id(&rule.rule_id, &rule.labels),
            rule_id: rule.rule_id.clone(),
            title: rule.name.clone(),
            description: format!(
                "{} {} {} (current: {})",
                rule.metric_name,
                rule.condition.as_str(),
                rule.threshold,
                current_value
            ),
            severity: rule.severity,
            status: AlertStatus::Firing,
            metric_name: rule.metric_name.clone(),
            current_value,
            threshold: rule.threshold,
            started_at,
            resolved_at: None,
            labels: rule.labels.clone(),
            annotations: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, at: DateTime<Utc>) {
        self.status = AlertStatus::Resolved;
        self.resolved_at = Some(at);
    }

    pub fn is_firing(&self) -> bool {
        self.status == AlertStatus::Firing
    }
}

/// Deterministic id: hash of the rule id and the sorted label set.
/// Every component is NUL-terminated in the hash input so that distinct
/// (rule, labels) inputs can never concatenate to the same byte stream.
pub fn alert_id(rule_id: &str, labels: &HashMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rule_id.as_bytes());
    hasher.update([0u8]);

    let mut pairs: Vec<(&String, &String)> = labels.iter().collect();
    pairs.sort();
    for (key, value) in pairs {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }

    hex::encode(hasher.finalize())[..16].to_string()
}

/// Aggregate counters over active alerts and history
#[derive(Debug, Clone, Serialize)]
pub struct AlertStatistics {
    pub active_total: usize,
    pub active_by_severity: HashMap<String, usize>,
    pub history_total: usize,
    pub fired_last_24h: usize,
    pub resolved_last_24h: usize,
    pub rules_total: usize,
    pub rules_enabled: usize,
    pub channels_total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::rules::Condition;

    fn rule() -> AlertRule {
        AlertRule::new("cpu_high", "High CPU", "cpu_percent", Condition::Gt, 80.0, Severity::High)
            .with_label("host", "trader-01")
            .with_label("env", "prod")
    }

    #[test]
    fn test_alert_id_deterministic_and_label_order_free() {
        let mut labels_a = HashMap::new();
        labels_a.insert("host".to_string(), "trader-01".to_string());
        labels_a.insert("env".to_string(), "prod".to_string());

        let mut labels_b = HashMap::new();
        labels_b.insert("env".to_string(), "prod".to_string());
        labels_b.insert("host".to_string(), "trader-01".to_string());

        let id_a = alert_id("cpu_high", &labels_a);
        let id_b = alert_id("cpu_high", &labels_b);
        assert_eq!(id_a, id_b);
        assert_eq!(id_a.len(), 16);

        // Different labels make a different alert
        labels_a.insert("host".to_string(), "trader-02".to_string());
        assert_ne!(alert_id("cpu_high", &labels_a), id_b);
    }

    #[test]
    fn test_alert_id_distinguishes_boundary_ambiguous_inputs() {
        // Keys and values containing '=' must not collapse into one id
        let mut labels_a = HashMap::new();
        labels_a.insert("env".to_string(), "prod=eu".to_string());
        let mut labels_b = HashMap::new();
        labels_b.insert("env=prod".to_string(), "eu".to_string());
        assert_ne!(alert_id("cpu_high", &labels_a), alert_id("cpu_high", &labels_b));

        // A rule id sharing a prefix with the first label key is distinct too
        let mut labels_c = HashMap::new();
        labels_c.insert("high_host".to_string(), "a".to_string());
        let mut labels_d = HashMap::new();
        labels_d.insert("host".to_string(), "a".to_string());
        assert_ne!(alert_id("cpu", &labels_c), alert_id("cpu_high", &labels_d));
    }

    #[test]
    fn test_alert_from_rule() {
        let alert = Alert::from_rule(&rule(), 91.5, Utc::now());
        assert_eq!(alert.rule_id, "cpu_high");
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.status, AlertStatus::Firing);
        assert_eq!(alert.current_value, 91.5);
        assert_eq!(alert.labels["host"], "trader-01");
        assert!(alert.description.contains("cpu_percent > 80"));
    }

    #[test]
    fn test_resolve_sets_timestamp() {
        let started = Utc::now();
        let mut alert = Alert::from_rule(&rule(), 91.5, started);
        let resolved = started + chrono::Duration::seconds(30);
        alert.resolve(resolved);
        assert_eq!(alert.status, AlertStatus::Resolved);
        assert!(alert.resolved_at.unwrap() >= alert.started_at);
    }
}
