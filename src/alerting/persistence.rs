//! Alert state persistence
//!
//! Rules and active alerts are saved as schema-versioned JSON on every
//! maintenance cycle and on shutdown. A missing or unreadable store is never
//! fatal: the manager logs it and starts empty.

use super::alert::Alert;
use super::rules::AlertRule;
use crate::core::{MonitorError, MonitorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AlertStore {
    pub version: u32,
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rules: Vec<AlertRule>,
    #[serde(default)]
    pub active_alerts: Vec<Alert>,
}

pub fn save<P: AsRef<Path>>(
    path: P,
    rules: Vec<AlertRule>,
    active_alerts: Vec<Alert>,
) -> MonitorResult<()> {
    let path = path.as_ref();
    let store = AlertStore {
        version: SCHEMA_VERSION,
        saved_at: Some(Utc::now()),
        rules,
        active_alerts,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| MonitorError::persistence(format!("create {}: {e}", parent.display())))?;
    }
    let body = serde_json::to_string_pretty(&store)
        .map_err(|e| MonitorError::persistence(format!("serialize alert store: {e}")))?;
    std::fs::write(path, body)
        .map_err(|e| MonitorError::persistence(format!("write {}: {e}", path.display())))?;
    Ok(())
}

/// Best-effort load; any failure yields an empty store
pub fn load<P: AsRef<Path>>(path: P) -> AlertStore {
    let path = path.as_ref();
    let body = match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no alert store found, starting empty");
            return AlertStore::default();
        }
        Err(e) => {
            warn!(path = %path.display(), "alert store unreadable, starting empty: {e}");
            return AlertStore::default();
        }
    };

    match serde_json::from_str::<AlertStore>(&body) {
        Ok(store) if store.version == SCHEMA_VERSION => {
            info!(
                path = %path.display(),
                rules = store.rules.len(),
                active = store.active_alerts.len(),
                "alert store loaded"
            );
            store
        }
        Ok(store) => {
            warn!(
                path = %path.display(),
                found = store.version,
                expected = SCHEMA_VERSION,
                "alert store schema mismatch, starting empty"
            );
            AlertStore::default()
        }
        Err(e) => {
            warn!(path = %path.display(), "alert store corrupt, starting empty: {e}");
            AlertStore::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::rules::Condition;
    use crate::core::Severity;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/alerts.json");

        let rule = AlertRule::new("cpu_high", "High CPU", "cpu_percent", Condition::Gt, 80.0, Severity::High);
        let alert = Alert::from_rule(&rule, 91.0, Utc::now());

        save(&path, vec![rule], vec![alert.clone()]).unwrap();
        let store = load(&path);
        assert_eq!(store.version, SCHEMA_VERSION);
        assert_eq!(store.rules.len(), 1);
        assert_eq!(store.active_alerts[0].alert_id, alert.alert_id);
    }

    #[test]
    fn test_missing_store_is_empty() {
        let store = load("/nonexistent/alerts.json");
        assert!(store.rules.is_empty());
        assert!(store.active_alerts.is_empty());
    }

    #[test]
    fn test_corrupt_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = load(&path);
        assert!(store.rules.is_empty());
    }

    #[test]
    fn test_version_mismatch_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        std::fs::write(&path, r#"{"version": 99, "rules": [], "active_alerts": []}"#).unwrap();
        let store = load(&path);
        assert!(store.rules.is_empty());
    }
}
