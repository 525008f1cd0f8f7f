//! Ingester configuration.
//!
//! Loaded from a YAML file when one is given, otherwise from `ND_*`
//! environment variables.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndfile::StoreConfig;
use serde::{Deserialize, Serialize};

/// Top-level ingester configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngesterConfig {
    /// Day-file store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Inbox polling settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Reverse ascending latitude axes of north-to-south grids before writing
    #[serde(default)]
    pub normalize_latitudes: bool,
}

/// Inbox directory polled by `watch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: PathBuf,

    /// Where successfully written datasets are moved
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Where rejected datasets are moved; defaults to `<inbox>/failed`
    #[serde(default)]
    pub failed_dir: Option<PathBuf>,

    /// Polling interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_inbox_dir() -> PathBuf {
    PathBuf::from("./data/inbox")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("./data/archive")
}

fn default_poll_interval() -> u64 {
    30
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            inbox_dir: default_inbox_dir(),
            archive_dir: default_archive_dir(),
            failed_dir: None,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl WatchConfig {
    pub fn failed_dir(&self) -> PathBuf {
        self.failed_dir
            .clone()
            .unwrap_or_else(|| self.inbox_dir.join("failed"))
    }
}

impl IngesterConfig {
    /// Load from `path` if given, otherwise from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_yaml(path),
            None => Self::from_env(),
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let store = StoreConfig::from_env().context("Invalid ND_* store settings")?;
        let mut watch = WatchConfig::default();

        if let Ok(val) = env::var("ND_INBOX_DIR") {
            watch.inbox_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("ND_ARCHIVE_DIR") {
            watch.archive_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("ND_FAILED_DIR") {
            watch.failed_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("ND_POLL_INTERVAL_SECS") {
            watch.poll_interval_secs = val
                .parse()
                .with_context(|| format!("Invalid ND_POLL_INTERVAL_SECS: {}", val))?;
        }

        let normalize_latitudes = env::var("ND_NORMALIZE_LATITUDES")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let config = Self {
            store,
            watch,
            normalize_latitudes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        if self.watch.poll_interval_secs == 0 {
            bail!("watch.poll_interval_secs must be positive");
        }
        if self.watch.inbox_dir == self.watch.archive_dir {
            bail!("watch.archive_dir must differ from watch.inbox_dir");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndfile::{CorruptFilePolicy, QuantizePolicy};

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
store:
  root_path: /var/lib/nd
  interval: 15
  corrupt_file_policy: replace
  quantize_policy: clamp

watch:
  inbox_dir: /var/spool/nd/inbox
  archive_dir: /var/spool/nd/done
  poll_interval_secs: 10

normalize_latitudes: true
"#;

        let config = IngesterConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.store.root_path, PathBuf::from("/var/lib/nd"));
        assert_eq!(config.store.interval.minutes(), 15);
        assert_eq!(config.store.corrupt_file_policy, CorruptFilePolicy::Replace);
        assert_eq!(config.store.quantize_policy, QuantizePolicy::Clamp);
        assert_eq!(config.watch.poll_interval_secs, 10);
        assert_eq!(
            config.watch.failed_dir(),
            PathBuf::from("/var/spool/nd/inbox/failed")
        );
        assert!(config.normalize_latitudes);
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = IngesterConfig::from_yaml_str("normalize_latitudes: false\n").unwrap();
        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.store.interval.minutes(), 10);
        assert_eq!(config.watch, WatchConfig::default());
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let yaml = "store:\n  root_path: /tmp/nd\n  interval: 7\n";
        assert!(IngesterConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let yaml = "watch:\n  poll_interval_secs: 0\n";
        assert!(IngesterConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nd-ingester.yaml");
        std::fs::write(&path, "store:\n  root_path: /srv/nd\n  interval: 60\n").unwrap();

        let config = IngesterConfig::load(Some(&path)).unwrap();
        assert_eq!(config.store.interval.slots_per_day(), 24);

        let missing = dir.path().join("missing.yaml");
        let err = IngesterConfig::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
