//! Configuration for the day-file store.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{NdFileError, Result};
use crate::layout::SlotInterval;
use crate::quantize::QuantizePolicy;

/// Configuration for [`crate::DayFileStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the day files.
    pub root_path: PathBuf,

    /// Slot width; validated on construction and deserialization.
    #[serde(default)]
    pub interval: SlotInterval,

    /// Handling of day files whose header or size cannot be trusted.
    #[serde(default)]
    pub corrupt_file_policy: CorruptFilePolicy,

    /// Handling of values outside the int16 encoding.
    #[serde(default)]
    pub quantize_policy: QuantizePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("./data/nd"),
            interval: SlotInterval::default(),
            corrupt_file_policy: CorruptFilePolicy::default(),
            quantize_policy: QuantizePolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Configuration rooted at `root_path` with the given slot width.
    pub fn new(root_path: impl Into<PathBuf>, interval_minutes: u32) -> Result<Self> {
        Ok(Self {
            root_path: root_path.into(),
            interval: SlotInterval::new(interval_minutes)?,
            ..Self::default()
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Unlike unset variables, values that are present but invalid are
    /// reported rather than replaced by defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ND_ROOT_PATH") {
            config.root_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("ND_INTERVAL_MINUTES") {
            let minutes = val
                .parse()
                .map_err(|_| NdFileError::Config(format!("ND_INTERVAL_MINUTES={}", val)))?;
            config.interval = SlotInterval::new(minutes)?;
        }

        if let Ok(val) = std::env::var("ND_CORRUPT_FILE_POLICY") {
            config.corrupt_file_policy = CorruptFilePolicy::from_str(&val)
                .ok_or_else(|| NdFileError::Config(format!("ND_CORRUPT_FILE_POLICY={}", val)))?;
        }

        if let Ok(val) = std::env::var("ND_QUANTIZE_POLICY") {
            config.quantize_policy = QuantizePolicy::from_str(&val)
                .ok_or_else(|| NdFileError::Config(format!("ND_QUANTIZE_POLICY={}", val)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.root_path.as_os_str().is_empty() {
            return Err(NdFileError::Config("root_path must not be empty".to_string()));
        }
        Ok(())
    }
}

/// What the writer does with a day file that exists but fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptFilePolicy {
    /// Return `CorruptFile` and leave the file untouched.
    #[default]
    Fail,
    /// Recreate the file from the incoming dataset, discarding its contents.
    Replace,
}

impl CorruptFilePolicy {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fail" => Some(Self::Fail),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Replace => "replace",
        }
    }
}

impl std::fmt::Display for CorruptFilePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
