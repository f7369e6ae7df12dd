//! Configuration structures for the multi-timeframe pipeline.
//!
//! One explicit object handed to every stage instead of module-level paths.

use crate::error::{Error, Result};
use crate::types::Timeframe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Raw bar sources.
    pub input: InputConfig,
    /// Timeframe labels and alignment.
    pub timeframes: TimeframeConfig,
    /// Feature selection.
    pub features: FeatureConfig,
    /// Sequence windows.
    pub windows: WindowConfig,
    /// Train/validation/test partition.
    pub split: SplitConfig,
    /// Artifact locations.
    pub artifacts: ArtifactConfig,
}

impl Config {
    /// Load a JSON configuration file and validate it.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse a JSON configuration string and validate it.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let fast = self.timeframes.fast()?;
        let slow = self.timeframes.slow()?;
        if fast.label() == slow.label() {
            return Err(Error::config(format!(
                "fast and slow timeframes share the label '{fast}'"
            )));
        }
        if slow.seconds() < fast.seconds() {
            return Err(Error::config(format!(
                "slow timeframe '{slow}' is shorter than fast timeframe '{fast}'"
            )));
        }
        if self.windows.sequence_length == 0 {
            return Err(Error::config("sequence_length must be at least 1"));
        }
        if let Some(names) = &self.features.names {
            if names.is_empty() {
                return Err(Error::config("features.names is empty"));
            }
        }
        if self.input.delimiter.len_utf8() != 1 {
            return Err(Error::config("delimiter must be a single-byte character"));
        }
        self.split.validate()
    }
}

/// Raw bar source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Fast-timeframe bar file.
    pub fast_path: PathBuf,
    /// Slow-timeframe bar file.
    pub slow_path: PathBuf,
    /// Field delimiter of both files.
    pub delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            fast_path: PathBuf::from("data/M15.csv"),
            slow_path: PathBuf::from("data/H4.csv"),
            delimiter: ',',
        }
    }
}

impl InputConfig {
    /// Delimiter as the byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> u8 {
        let mut buf = [0u8; 4];
        self.delimiter.encode_utf8(&mut buf);
        buf[0]
    }
}

/// When a slow bar becomes visible to fast bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlowVisibility {
    /// At its own timestamp.
    Open,
    /// Once its period has ended (timestamp + period).
    Close,
}

/// Timeframe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeframeConfig {
    /// Fast timeframe label; also the resampling grid.
    pub fast: String,
    /// Slow timeframe label.
    pub slow: String,
    /// Slow bar visibility rule for the as-of join.
    pub slow_visibility: SlowVisibility,
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        Self {
            fast: "15m".to_string(),
            slow: "4h".to_string(),
            slow_visibility: SlowVisibility::Open,
        }
    }
}

impl TimeframeConfig {
    pub fn fast(&self) -> Result<Timeframe> {
        Timeframe::parse(&self.fast)
    }

    pub fn slow(&self) -> Result<Timeframe> {
        Timeframe::parse(&self.slow)
    }
}

/// What to do with a row that lacks a selected feature mid-series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Drop the row and count it.
    Drop,
    /// Fail with [`Error::Data`].
    Reject,
}

/// Feature selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Candidate feature names; `None` uses the canonical list.
    pub names: Option<Vec<String>>,
    /// Incomplete row handling.
    pub gap_policy: GapPolicy,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            names: None,
            gap_policy: GapPolicy::Drop,
        }
    }
}

/// Window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Timesteps per window.
    pub sequence_length: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { sequence_length: 1 }
    }
}

/// How windows next to a split boundary are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Keep every window; windows near a boundary share rows with the previous partition.
    Overlap,
    /// Drop validation/test windows that read rows an earlier partition reads.
    Purge,
}

/// Split configuration, as cumulative fractions of the window count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// End of the training partition (e.g. 0.70).
    pub train_end: f64,
    /// End of the validation partition (e.g. 0.85); equal to `train_end` for a two-way split.
    pub validation_end: f64,
    /// Boundary treatment.
    pub boundary: BoundaryPolicy,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_end: 0.70,
            validation_end: 0.85,
            boundary: BoundaryPolicy::Purge,
        }
    }
}

impl SplitConfig {
    /// Train/test split with no validation partition.
    pub fn two_way(train_end: f64) -> Self {
        Self {
            train_end,
            validation_end: train_end,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 < self.train_end
            && self.train_end <= self.validation_end
            && self.validation_end <= 1.0;
        if !ordered {
            return Err(Error::config(format!(
                "split fractions must satisfy 0 < train_end <= validation_end <= 1 (got {} / {})",
                self.train_end, self.validation_end
            )));
        }
        Ok(())
    }
}

/// Artifact locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Merged table CSV.
    pub merged_path: PathBuf,
    /// Scaler + feature-order JSON.
    pub preprocessing_path: PathBuf,
    /// Directory for exported train/validation/test windows.
    pub dataset_dir: PathBuf,
    /// Signal file read by the trading client.
    pub signal_path: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            merged_path: PathBuf::from("merged_data.csv"),
            preprocessing_path: PathBuf::from("models/preprocessing.json"),
            dataset_dir: PathBuf::from("dataset"),
            signal_path: PathBuf::from("signal.csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.split.train_end, 0.70);
        assert_eq!(config.split.validation_end, 0.85);
        assert_eq!(config.windows.sequence_length, 1);
        assert_eq!(config.timeframes.fast().unwrap().seconds(), 900);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json_str(
            r#"{ "windows": { "sequence_length": 8 }, "split": { "boundary": "overlap" } }"#,
        )
        .unwrap();
        assert_eq!(config.windows.sequence_length, 8);
        assert_eq!(config.split.boundary, BoundaryPolicy::Overlap);
        assert_eq!(config.split.train_end, 0.70);
        assert_eq!(config.timeframes.slow, "4h");
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = Config::default();
        config.windows.sequence_length = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.timeframes.slow = "5m".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.split.validation_end = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timeframes.slow = config.timeframes.fast.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_two_way_split() {
        let split = SplitConfig::two_way(0.8);
        assert_eq!(split.validation_end, 0.8);
        assert!(split.validate().is_ok());
    }

    #[test]
    fn test_tab_delimiter() {
        let config = Config::from_json_str(r#"{ "input": { "delimiter": "\t" } }"#).unwrap();
        assert_eq!(config.input.delimiter_byte(), b'\t');
    }
}
