//! Single-window inference.
//!
//! Rebuilds the latest window from a merged table with the persisted feature
//! order and scaler, hands it to a [`Predictor`], and writes the signal file.

use crate::artifact::PreprocessingArtifact;
use crate::predictor::{predict_checked, Predictor};
use crate::window::WindowBuilder;
use mtf_core::config::GapPolicy;
use mtf_core::{Error, MergedTable, Result, Timestamp};
use mtf_features::{AssemblyReport, FeatureAssembler};
use ndarray::{s, Array3, Axis};
use std::io::Write;
use std::path::{Path, PathBuf};

/// The window for the latest eligible row.
#[derive(Debug, Clone)]
pub struct LatestWindow {
    /// Scaled window shaped (1, S, F).
    pub window: Array3<f64>,
    /// Timestamp of the window's last row.
    pub time: Timestamp,
    pub report: AssemblyReport,
}

/// A served prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub probability: f64,
    /// Row the prediction was made from.
    pub time: Timestamp,
}

/// Serves predictions with a fixed preprocessing artifact.
pub struct InferenceAdapter {
    artifact: PreprocessingArtifact,
    assembler: FeatureAssembler,
    builder: WindowBuilder,
}

impl InferenceAdapter {
    pub fn new(artifact: PreprocessingArtifact) -> Result<Self> {
        artifact.validate()?;
        let builder = WindowBuilder::new(artifact.sequence_length)?;
        let assembler = FeatureAssembler::new(artifact.features.clone(), GapPolicy::Drop);
        Ok(Self {
            artifact,
            assembler,
            builder,
        })
    }

    /// Load the artifact from disk.
    pub fn from_artifact_file(path: &Path) -> Result<Self> {
        Self::new(PreprocessingArtifact::load(path)?)
    }

    pub fn artifact(&self) -> &PreprocessingArtifact {
        &self.artifact
    }

    /// `(sequence_length, feature_count)` of the windows this adapter builds.
    pub fn input_shape(&self) -> (usize, usize) {
        (self.artifact.sequence_length, self.artifact.feature_count())
    }

    /// Build the scaled window ending at the latest complete row.
    ///
    /// Rows with a missing feature are skipped, never filled. Fewer complete
    /// rows than the sequence length, or a latest window that would bridge a
    /// skipped row, is [`Error::NoData`].
    pub fn latest_window(&self, table: &MergedTable) -> Result<LatestWindow> {
        self.artifact.check_timeframes(&table.fast, &table.slow)?;
        let (matrix, report) = self.assembler.inference(table)?;

        let start = self.builder.latest_start(&matrix.sources).map_err(|e| match e {
            Error::NoData(msg) => Error::no_data(format!(
                "{msg} ({} of {} merged rows complete)",
                matrix.rows(),
                table.len()
            )),
            other => other,
        })?;

        let tail = matrix.values.slice(s![start.., ..]);
        let window = self.artifact.scaler.transform(tail)?.insert_axis(Axis(0));

        Ok(LatestWindow {
            window,
            time: matrix.times[matrix.rows() - 1],
            report,
        })
    }

    /// Predict from the latest window.
    pub fn predict<P: Predictor + ?Sized>(
        &self,
        table: &MergedTable,
        predictor: &P,
    ) -> Result<Prediction> {
        if predictor.input_shape() != self.input_shape() {
            let (steps, features) = predictor.input_shape();
            let (want_steps, want_features) = self.input_shape();
            return Err(Error::predictor(format!(
                "predictor expects {steps}x{features} windows, artifact builds {want_steps}x{want_features}"
            )));
        }

        let latest = self.latest_window(table)?;
        let out = predict_checked(predictor, latest.window.view())?;
        let probability = out
            .first()
            .copied()
            .ok_or_else(|| Error::predictor("no output for the latest window"))?;

        Ok(Prediction {
            probability,
            time: latest.time,
        })
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "signal".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write the probability as six-decimal text, replacing `path` atomically.
pub fn write_signal(path: &Path, probability: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(Error::predictor(format!(
            "refusing to write signal {probability}"
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(path);
    {
        let mut file = std::fs::File::create(&tmp)?;
        writeln!(file, "{probability:.6}")?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
