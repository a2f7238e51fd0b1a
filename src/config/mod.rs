pub mod types;

pub use types::{
    AlertConfig, CollectorConfig, Config, DiagnosticConfig, ExportConfig, LoggingConfig,
    PerformanceBaselines, ThresholdConfig,
};

use anyhow::{Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use std::path::Path;

impl Config {
    /// Load configuration from file with optional environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();

        let config = ConfigLoader::builder()
            // Start with default values
            .set_default("collector.collection_interval_secs", 5)?
            .set_default("collector.retention_hours", 24)?
            .set_default("collector.export.export_interval_secs", 300)?
            .set_default("diagnostics.anomaly_threshold", 2.0)?
            .set_default("diagnostics.confidence_threshold", 0.6)?
            .set_default("alerts.rate_limit_per_minute", 10)?
            .set_default("alerts.retention_hours", 168)?
            .set_default("logging.log_level", "info")?
            .set_default("logging.json_logs", false)?
            // Load from TOML file
            .add_source(File::from(config_path))
            // Override with environment variables (VIGIL_)
            .add_source(Environment::with_prefix("VIGIL").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let cfg: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Load from default location (./config/default.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("config/default.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.collector.collection_interval_secs == 0 {
            anyhow::bail!("collector.collection_interval_secs must be at least 1");
        }
        if self.collector.max_points_per_metric == 0 {
            anyhow::bail!("collector.max_points_per_metric must be at least 1");
        }
        if self.collector.thresholds.cpu_warning >= self.collector.thresholds.cpu_critical {
            anyhow::bail!(
                "collector.thresholds: cpu_warning ({}) must be below cpu_critical ({})",
                self.collector.thresholds.cpu_warning,
                self.collector.thresholds.cpu_critical
            );
        }
        if self.diagnostics.analysis_interval_secs == 0 {
            anyhow::bail!("diagnostics.analysis_interval_secs must be at least 1");
        }
        if self.diagnostics.anomaly_threshold <= 0.0 {
            anyhow::bail!("diagnostics.anomaly_threshold must be positive");
        }
        if self.diagnostics.trend_analysis_points < 2 {
            anyhow::bail!("diagnostics.trend_analysis_points must be at least 2");
        }
        if !(0.0..=1.0).contains(&self.diagnostics.confidence_threshold) {
            anyhow::bail!("diagnostics.confidence_threshold must be within [0, 1]");
        }
        if self.alerts.notification_workers == 0 {
            anyhow::bail!("alerts.notification_workers must be at least 1");
        }
        if self.alerts.notification_queue_capacity == 0 {
            anyhow::bail!("alerts.notification_queue_capacity must be at least 1");
        }
        if self.alerts.rate_limit_per_minute == 0 {
            anyhow::bail!("alerts.rate_limit_per_minute must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.collector.collection_interval_secs, 5);
        assert_eq!(cfg.diagnostics.baseline_window, 50);
        assert_eq!(cfg.alerts.retention_hours, 168);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut cfg = Config::default();
        cfg.collector.thresholds.cpu_warning = 95.0;
        cfg.collector.thresholds.cpu_critical = 90.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[collector]\ncollection_interval_secs = 10\n\n[alerts]\nrate_limit_per_minute = 3\n"
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.collector.collection_interval_secs, 10);
        assert_eq!(cfg.alerts.rate_limit_per_minute, 3);
        // Untouched sections keep defaults
        assert_eq!(cfg.diagnostics.max_issues_per_analysis, 50);
    }
}
