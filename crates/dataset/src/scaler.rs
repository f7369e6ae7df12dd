//! Per-feature standardization.
//!
//! A [`ScalerState`] only exists once fitted (or loaded), so transforming with
//! an unfitted scaler cannot be expressed.

use mtf_core::{Error, Result};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Fitted per-feature mean and scale, in feature order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// A standard deviation this small relative to the mean is treated as zero.
fn is_degenerate(std: f64, mean: f64) -> bool {
    std < 10.0 * f64::EPSILON * mean.abs().max(1.0)
}

impl ScalerState {
    /// Fit on `values` (rows = observations) using population statistics.
    ///
    /// Zero-variance features get scale 1, so they transform to a zero column
    /// on the fitting set instead of failing.
    pub fn fit(values: ArrayView2<f64>) -> Result<Self> {
        Self::fit_reporting(values).map(|(state, _)| state)
    }

    /// Like [`ScalerState::fit`], also returning the indices of the features
    /// whose scale fell back to 1.
    pub fn fit_reporting(values: ArrayView2<f64>) -> Result<(Self, Vec<usize>)> {
        if values.nrows() == 0 {
            return Err(Error::insufficient_data("cannot fit a scaler on zero rows"));
        }
        if let Some(((row, j), x)) = values.indexed_iter().find(|(_, x)| !x.is_finite()) {
            return Err(Error::data(format!(
                "cannot fit a scaler on {x} at row {row}, feature {j}"
            )));
        }

        let mut mean = Vec::with_capacity(values.ncols());
        let mut scale = Vec::with_capacity(values.ncols());
        let mut degenerate = Vec::new();
        for (j, column) in values.axis_iter(Axis(1)).enumerate() {
            let m = column.iter().copied().mean();
            let std = column.iter().copied().population_std_dev();
            mean.push(m);
            if is_degenerate(std, m) {
                degenerate.push(j);
                scale.push(1.0);
            } else {
                scale.push(std);
            }
        }
        Ok((Self { mean, scale }, degenerate))
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Check a loaded state before use.
    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(Error::DimensionMismatch {
                expected: self.mean.len(),
                actual: self.scale.len(),
            });
        }
        if let Some(j) = self
            .scale
            .iter()
            .zip(&self.mean)
            .position(|(s, m)| !(s.is_finite() && *s > 0.0 && m.is_finite()))
        {
            return Err(Error::data(format!(
                "scaler feature {j} has mean {} and scale {}",
                self.mean[j], self.scale[j]
            )));
        }
        Ok(())
    }

    /// Apply `(x - mean) / scale` per feature.
    pub fn transform(&self, values: ArrayView2<f64>) -> Result<Array2<f64>> {
        if values.ncols() != self.len() {
            return Err(Error::DimensionMismatch {
                expected: self.len(),
                actual: values.ncols(),
            });
        }
        let mut out = values.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|x| (x - m) / s);
        }
        Ok(out)
    }
}
