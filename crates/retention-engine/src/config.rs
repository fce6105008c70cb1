//! Configuration for retention runs
//!
//! Defines where the catalog and target data live, the schedule interval,
//! and the default selection applied to scheduled runs.

use crate::RunError;
use retention_domain::{Strategy, TagSet};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the retention engine
///
/// # Examples
///
/// ```
/// use retention_engine::RetentionConfig;
///
/// // Default configuration (hourly, all policies)
/// let config = RetentionConfig::default();
/// assert_eq!(config.schedule_interval_minutes, 60);
///
/// // Once a day
/// let config = RetentionConfig::daily();
/// assert_eq!(config.schedule_interval_minutes, 1440);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Path of the policy catalog database
    /// Default: retention.db
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Directory holding the target store's data files
    /// Default: data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// How often scheduled runs fire (in minutes)
    /// Default: Every 60 minutes (hourly)
    #[serde(default = "default_interval")]
    pub schedule_interval_minutes: u64,

    /// Render statements without executing them
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// Tags every scheduled run requires
    #[serde(default)]
    pub default_tags: Vec<String>,

    /// Restrict scheduled runs to one strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Stop starting new policies once a run has taken this long (in seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("retention.db")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_interval() -> u64 {
    60
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            data_dir: default_data_dir(),
            schedule_interval_minutes: default_interval(),
            dry_run: false,
            default_tags: Vec::new(),
            strategy: None,
            run_timeout_secs: None,
        }
    }
}

impl RetentionConfig {
    /// Hourly runs, same as the default
    pub fn hourly() -> Self {
        Self::default()
    }

    /// Daily runs with a one hour budget per run
    pub fn daily() -> Self {
        Self {
            schedule_interval_minutes: 24 * 60,
            run_timeout_secs: Some(3600),
            ..Self::default()
        }
    }

    /// Get schedule interval as Duration
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_minutes * 60)
    }

    /// Get the per-run time budget as Duration
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    /// Tags required by scheduled runs
    pub fn tags(&self) -> TagSet {
        self.default_tags.iter().cloned().collect()
    }

    /// Resolve the configured strategy filter
    pub fn strategy_filter(&self) -> Result<Option<Strategy>, RunError> {
        self.strategy
            .as_deref()
            .map(Strategy::resolve)
            .transpose()
            .map_err(|e| RunError::Config(e.to_string()))
    }

    /// Check the configuration can drive a scheduler
    pub fn validate(&self) -> Result<(), RunError> {
        if self.schedule_interval_minutes == 0 {
            return Err(RunError::Config(
                "schedule_interval_minutes must be at least 1".to_string(),
            ));
        }
        self.strategy_filter()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetentionConfig::default();
        assert_eq!(config.catalog_path, PathBuf::from("retention.db"));
        assert_eq!(config.schedule_interval_minutes, 60);
        assert!(!config.dry_run);
        assert!(config.tags().is_empty());
        assert!(config.run_timeout().is_none());
        assert_eq!(RetentionConfig::hourly(), config);
    }

    #[test]
    fn test_daily_config() {
        let config = RetentionConfig::daily();
        assert_eq!(config.schedule_interval(), Duration::from_secs(86400));
        assert_eq!(config.run_timeout(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_strategy_filter() {
        let mut config = RetentionConfig::default();
        assert_eq!(config.strategy_filter().unwrap(), None);

        config.strategy = Some("Snapshot".to_string());
        assert_eq!(config.strategy_filter().unwrap(), Some(Strategy::Snapshot));

        config.strategy = Some("archive".to_string());
        assert!(matches!(config.validate(), Err(RunError::Config(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = RetentionConfig {
            schedule_interval_minutes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: RetentionConfig = toml::from_str(
            r#"
            data_dir = "/var/lib/cluster"
            default_tags = ["foo", "bar"]
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/cluster"));
        assert_eq!(config.tags(), TagSet::parse("bar,foo"));
        assert_eq!(config.schedule_interval_minutes, 60);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = RetentionConfig::daily();
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: RetentionConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
