//! Feature construction for the multi-timeframe pipeline.
//!
//! This crate handles:
//! - Forward-fill resampling of the slow series onto the fast grid
//! - Backward as-of join into the merged table
//! - Feature selection, ordering and next-bar labels

pub mod aligner;
pub mod assembler;

pub use aligner::{AlignReport, Aligned, GridPoint, TimeframeAligner};
pub use assembler::{AssemblyReport, FeatureAssembler, FeatureMatrix, FeatureSet, TrainingData};
