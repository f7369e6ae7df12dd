//! Preprocessing artifact.
//!
//! The only state shared between preparation and inference: the ordered
//! feature names and the scaler fitted on them.

use crate::scaler::ScalerState;
use mtf_core::{Error, Result, Timeframe};
use mtf_features::FeatureSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current artifact format.
pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingArtifact {
    pub version: u32,
    /// Fast timeframe label, e.g. `15m`.
    pub fast: String,
    /// Slow timeframe label, e.g. `4h`.
    pub slow: String,
    pub sequence_length: usize,
    pub features: FeatureSet,
    pub scaler: ScalerState,
}

impl PreprocessingArtifact {
    pub fn new(
        fast: &Timeframe,
        slow: &Timeframe,
        sequence_length: usize,
        features: FeatureSet,
        scaler: ScalerState,
    ) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            fast: fast.label().to_string(),
            slow: slow.label().to_string(),
            sequence_length,
            features,
            scaler,
        }
    }

    /// Feature count every window must have.
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Reject an artifact that cannot be used as-is.
    pub fn validate(&self) -> Result<()> {
        let unusable = |why: String| Error::missing_artifact(format!("unusable artifact: {why}"));

        if self.version != ARTIFACT_VERSION {
            return Err(unusable(format!(
                "version {} (expected {ARTIFACT_VERSION})",
                self.version
            )));
        }
        if self.sequence_length == 0 {
            return Err(unusable("sequence_length is 0".to_string()));
        }
        if self.features.is_empty() {
            return Err(unusable("no features".to_string()));
        }
        if self.scaler.len() != self.features.len() {
            return Err(unusable(format!(
                "{} features but {} scaler entries",
                self.features.len(),
                self.scaler.len()
            )));
        }
        self.scaler
            .validate()
            .map_err(|e| unusable(e.to_string()))
    }

    /// Check the artifact was built for this timeframe pair.
    pub fn check_timeframes(&self, fast: &Timeframe, slow: &Timeframe) -> Result<()> {
        if self.fast != fast.label() || self.slow != slow.label() {
            return Err(Error::config(format!(
                "artifact is for {}/{}, data is {fast}/{slow}",
                self.fast, self.slow
            )));
        }
        Ok(())
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::missing_artifact(format!(
                "{} does not exist",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&raw)?;
        artifact.validate()?;
        Ok(artifact)
    }
}
