//! Training and serving datasets for the multi-timeframe pipeline.
//!
//! This crate handles:
//! - Fixed-length windows and the temporal train/validation/test split
//! - Scaler fitting on training rows and the preprocessing artifact
//! - Partition export for an external training loop
//! - The predictor boundary, latest-window inference and the signal file
//! - Classification metrics

pub mod artifact;
pub mod export;
pub mod inference;
pub mod metrics;
pub mod predictor;
pub mod prepare;
pub mod scaler;
pub mod split;
pub mod window;

pub use artifact::{PreprocessingArtifact, ARTIFACT_VERSION};
pub use export::{write_dataset, write_partition, PARTITION_FILES};
pub use inference::{write_signal, InferenceAdapter, LatestWindow, Prediction};
pub use metrics::{ClassificationMetrics, MetricsCalculator};
pub use predictor::{predict_checked, LogisticPredictor, Predictor};
pub use prepare::{prepare_dataset, rebuild_dataset, PrepareReport, PreparedDataset};
pub use scaler::ScalerState;
pub use split::{SplitRanges, TemporalSplitter};
pub use window::{WindowBuilder, WindowSet};
