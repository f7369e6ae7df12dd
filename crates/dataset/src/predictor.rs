//! Predictor boundary.
//!
//! The sequence model itself lives outside this workspace. Anything that maps
//! (batch, timestep, feature) windows to bullish probabilities can sit behind
//! [`Predictor`]; [`LogisticPredictor`] is a JSON-loadable linear baseline.

use mtf_core::{Error, Result};
use ndarray::ArrayView3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maps windows to per-window probabilities in `[0, 1]`.
pub trait Predictor {
    /// Expected `(sequence_length, feature_count)` of each window.
    fn input_shape(&self) -> (usize, usize);

    /// One probability per window in `batch`.
    fn predict(&self, batch: ArrayView3<f64>) -> Result<Vec<f64>>;
}

/// Check a batch against a predictor's declared shape.
pub fn check_batch_shape<P: Predictor + ?Sized>(predictor: &P, batch: ArrayView3<f64>) -> Result<()> {
    let (_, steps, features) = batch.dim();
    let (want_steps, want_features) = predictor.input_shape();
    if steps != want_steps {
        return Err(Error::DimensionMismatch {
            expected: want_steps,
            actual: steps,
        });
    }
    if features != want_features {
        return Err(Error::DimensionMismatch {
            expected: want_features,
            actual: features,
        });
    }
    Ok(())
}

/// Run a predictor and hold it to its contract: one finite probability in
/// `[0, 1]` per window.
pub fn predict_checked<P: Predictor + ?Sized>(
    predictor: &P,
    batch: ArrayView3<f64>,
) -> Result<Vec<f64>> {
    check_batch_shape(predictor, batch)?;
    let out = predictor.predict(batch)?;
    if out.len() != batch.dim().0 {
        return Err(Error::predictor(format!(
            "returned {} outputs for {} windows",
            out.len(),
            batch.dim().0
        )));
    }
    if let Some(p) = out.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(Error::predictor(format!("output {p} is not a probability")));
    }
    Ok(out)
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Logistic regression over the flattened window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticPredictor {
    pub sequence_length: usize,
    pub feature_count: usize,
    /// Step-major weights, `sequence_length * feature_count` of them.
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticPredictor {
    pub fn new(
        sequence_length: usize,
        feature_count: usize,
        weights: Vec<f64>,
        bias: f64,
    ) -> Result<Self> {
        let model = Self {
            sequence_length,
            feature_count,
            weights,
            bias,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        let expected = self.sequence_length * self.feature_count;
        if expected == 0 {
            return Err(Error::predictor("model input shape is empty"));
        }
        if self.weights.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: self.weights.len(),
            });
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::predictor("model has non-finite parameters"));
        }
        Ok(())
    }

    /// Load from JSON.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::missing_artifact(format!(
                "model {} does not exist",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&raw)?;
        model.validate()?;
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl Predictor for LogisticPredictor {
    fn input_shape(&self) -> (usize, usize) {
        (self.sequence_length, self.feature_count)
    }

    fn predict(&self, batch: ArrayView3<f64>) -> Result<Vec<f64>> {
        check_batch_shape(self, batch)?;
        Ok(batch
            .outer_iter()
            .map(|window| {
                let z: f64 = window
                    .iter()
                    .zip(&self.weights)
                    .map(|(x, w)| x * w)
                    .sum();
                sigmoid(z + self.bias)
            })
            .collect())
    }
}
