//! Classification metrics.
//!
//! Scores predicted probabilities against next-bar direction labels.

use crate::predictor::{predict_checked, Predictor};
use crate::window::WindowSet;
use mtf_core::{Error, Result};
use serde::Serialize;

/// Probabilities are clipped to `[EPS, 1 - EPS]` for log-loss.
const LOG_LOSS_EPS: f64 = 1e-15;

/// Classification metrics at a fixed threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    /// Number of scored windows.
    pub samples: usize,
    /// Windows predicted up.
    pub predicted_up: usize,
    /// Windows labeled up.
    pub actual_up: usize,
    /// Fraction predicted correctly (0-1).
    pub accuracy: f64,
    /// Of the predicted ups, the fraction that went up.
    pub precision: f64,
    /// Of the actual ups, the fraction predicted up.
    pub recall: f64,
    /// Mean binary cross-entropy.
    pub log_loss: f64,
    /// Fraction of windows labeled up; accuracy of always guessing the majority
    /// is `max(base_rate, 1 - base_rate)`.
    pub base_rate: f64,
}

/// Metrics calculator.
pub struct MetricsCalculator {
    threshold: f64,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl MetricsCalculator {
    /// Create a calculator that predicts up when probability >= `threshold`.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Score probabilities against labels.
    pub fn calculate(&self, probabilities: &[f64], labels: &[u8]) -> Result<ClassificationMetrics> {
        if probabilities.len() != labels.len() {
            return Err(Error::DimensionMismatch {
                expected: labels.len(),
                actual: probabilities.len(),
            });
        }
        if labels.is_empty() {
            return Ok(ClassificationMetrics::default());
        }

        let mut metrics = ClassificationMetrics {
            samples: labels.len(),
            ..ClassificationMetrics::default()
        };

        let mut correct = 0usize;
        let mut true_up = 0usize;
        let mut loss = 0.0;

        for (&p, &label) in probabilities.iter().zip(labels) {
            let predicted_up = p >= self.threshold;
            let actual_up = label == 1;

            if predicted_up {
                metrics.predicted_up += 1;
            }
            if actual_up {
                metrics.actual_up += 1;
            }
            if predicted_up == actual_up {
                correct += 1;
            }
            if predicted_up && actual_up {
                true_up += 1;
            }

            let clipped = p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
            loss -= if actual_up {
                clipped.ln()
            } else {
                (1.0 - clipped).ln()
            };
        }

        let n = metrics.samples as f64;
        metrics.accuracy = correct as f64 / n;
        metrics.base_rate = metrics.actual_up as f64 / n;
        metrics.log_loss = loss / n;

        metrics.precision = if metrics.predicted_up > 0 {
            true_up as f64 / metrics.predicted_up as f64
        } else {
            0.0
        };

        metrics.recall = if metrics.actual_up > 0 {
            true_up as f64 / metrics.actual_up as f64
        } else {
            0.0
        };

        Ok(metrics)
    }

    /// Run `predictor` over a partition and score it.
    pub fn evaluate<P: Predictor + ?Sized>(
        &self,
        predictor: &P,
        set: &WindowSet,
    ) -> Result<ClassificationMetrics> {
        if set.is_empty() {
            return Ok(ClassificationMetrics::default());
        }
        let probabilities = predict_checked(predictor, set.windows.view())?;
        self.calculate(&probabilities, &set.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_basic_metrics() {
        let probabilities = [0.9, 0.8, 0.3, 0.6, 0.1];
        let labels = [1, 0, 0, 1, 1];
        let metrics = MetricsCalculator::default()
            .calculate(&probabilities, &labels)
            .unwrap();

        assert_eq!(metrics.samples, 5);
        assert_eq!(metrics.predicted_up, 3);
        assert_eq!(metrics.actual_up, 3);
        assert_abs_diff_eq!(metrics.accuracy, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.precision, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.recall, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.base_rate, 0.6, epsilon = 1e-12);

        let expected_loss = -(0.9_f64.ln()
            + 0.2_f64.ln()
            + 0.7_f64.ln()
            + 0.6_f64.ln()
            + 0.1_f64.ln())
            / 5.0;
        assert_abs_diff_eq!(metrics.log_loss, expected_loss, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_and_mismatched() {
        let calc = MetricsCalculator::default();
        assert_eq!(calc.calculate(&[], &[]).unwrap(), ClassificationMetrics::default());
        assert!(matches!(
            calc.calculate(&[0.5], &[1, 0]),
            Err(Error::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_never_predicting_up() {
        let metrics = MetricsCalculator::default()
            .calculate(&[0.1, 0.2], &[1, 0])
            .unwrap();
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_abs_diff_eq!(metrics.accuracy, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_certain_wrong_prediction_is_finite() {
        let metrics = MetricsCalculator::default()
            .calculate(&[0.0, 1.0], &[1, 0])
            .unwrap();
        assert!(metrics.log_loss.is_finite());
        assert!(metrics.log_loss > 30.0);
    }
}
