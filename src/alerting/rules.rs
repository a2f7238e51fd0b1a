//! Alert rule definitions and per-rule breach tracking

use crate::core::{MonitorError, MonitorResult, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Comparison applied to each evaluated sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Condition {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Ge => value >= threshold,
            Self::Le => value <= threshold,
            Self::Eq => value == threshold,
            Self::Ne => value != threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// A registered alerting rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub rule_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Metric this rule evaluates against
    pub metric_name: String,
    pub condition: Condition,
    pub threshold: f64,
    pub severity: Severity,
    /// The condition must hold continuously for this long before firing
    #[serde(default)]
    pub duration_secs: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl AlertRule {
    pub fn new(
        rule_id: impl Into<String>,
        name: impl Into<String>,
        metric_name: impl Into<String>,
        condition: Condition,
        threshold: f64,
        severity: Severity,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            name: name.into(),
            description: String::new(),
            metric_name: metric_name.into(),
            condition,
            threshold,
            severity,
            duration_secs: 0,
            enabled: true,
            labels: HashMap::new(),
        }
    }

    pub fn with_duration(mut self, duration_secs: u64) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if self.rule_id.is_empty() {
            return Err(MonitorError::configuration("rule_id must not be empty"));
        }
        if self.metric_name.is_empty() {
            return Err(MonitorError::configuration(format!(
                "rule {}: metric_name must not be empty",
                self.rule_id
            )));
        }
        if !self.threshold.is_finite() {
            return Err(MonitorError::configuration(format!(
                "rule {}: threshold must be finite",
                self.rule_id
            )));
        }
        Ok(())
    }
}

/// Mutable breach tracking for one rule, reset whenever the condition clears
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleState {
    /// When the current uninterrupted breach began
    pub breach_start: Option<DateTime<Utc>>,
    /// Consecutive breaching evaluations, informational only
    pub consecutive: u32,
}

impl RuleState {
    /// Record one breaching evaluation; returns the breach duration so far
    pub fn record_breach(&mut self, now: DateTime<Utc>) -> chrono::Duration {
        self.consecutive += 1;
        let start = *self.breach_start.get_or_insert(now);
        now - start
    }

    pub fn clear(&mut self) {
        self.breach_start = None;
        self.consecutive = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_checks() {
        assert!(Condition::Gt.check(81.0, 80.0));
        assert!(!Condition::Gt.check(80.0, 80.0));
        assert!(Condition::Ge.check(80.0, 80.0));
        assert!(Condition::Lt.check(0.5, 0.7));
        assert!(Condition::Ne.check(1.0, 2.0));
    }

    #[test]
    fn test_condition_serde_symbols() {
        let json = serde_json::to_string(&Condition::Ge).unwrap();
        assert_eq!(json, "\">=\"");
        let parsed: Condition = serde_json::from_str("\"<\"").unwrap();
        assert_eq!(parsed, Condition::Lt);
    }

    #[test]
    fn test_rule_validation() {
        let rule = AlertRule::new("cpu_high", "High CPU", "cpu_percent", Condition::Gt, 80.0, Severity::High);
        assert!(rule.validate().is_ok());

        let mut bad = rule.clone();
        bad.rule_id = String::new();
        assert!(bad.validate().is_err());

        let mut bad = rule;
        bad.threshold = f64::NAN;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_rule_state_breach_tracking() {
        let mut state = RuleState::default();
        let t0 = Utc::now();

        assert_eq!(state.record_breach(t0).num_seconds(), 0);
        assert_eq!(state.consecutive, 1);

        let elapsed = state.record_breach(t0 + chrono::Duration::seconds(10));
        assert_eq!(elapsed.num_seconds(), 10);
        assert_eq!(state.consecutive, 2);

        state.clear();
        assert!(state.breach_start.is_none());
        assert_eq!(state.consecutive, 0);
    }
}
