//! Dataset preparation.
//!
//! Merged table → feature matrix → split → scaler fitted on the rows the
//! training windows read → scaled windows per partition.

use crate::artifact::PreprocessingArtifact;
use crate::scaler::ScalerState;
use crate::split::{SplitRanges, TemporalSplitter};
use crate::window::{WindowBuilder, WindowSet};
use mtf_core::config::{GapPolicy, SplitConfig};
use mtf_core::{Config, MergedTable, Result};
use mtf_features::{AssemblyReport, FeatureAssembler, FeatureSet, TrainingData};
use ndarray::s;

/// What preparation kept and dropped.
#[derive(Debug, Clone)]
pub struct PrepareReport {
    pub assembly: AssemblyReport,
    /// Feature rows after assembly.
    pub rows: usize,
    /// Windows before the split.
    pub windows: usize,
    /// Windows not formed because a dropped row broke their run of rows.
    pub broken_windows: usize,
    pub split: SplitRanges,
    /// Rows the scaler was fitted on.
    pub scaler_rows: usize,
    /// Features that did not vary over the fitting rows.
    pub degenerate_features: Vec<String>,
}

/// Scaled, windowed partitions plus the artifact that produced them.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub artifact: PreprocessingArtifact,
    pub train: WindowSet,
    pub validation: WindowSet,
    pub test: WindowSet,
    pub report: PrepareReport,
}

struct Layout {
    data: TrainingData,
    builder: WindowBuilder,
    starts: Vec<usize>,
    broken_windows: usize,
    split: SplitRanges,
}

fn layout(
    table: &MergedTable,
    features: FeatureSet,
    gap_policy: GapPolicy,
    sequence_length: usize,
    split: &SplitConfig,
) -> Result<Layout> {
    let builder = WindowBuilder::new(sequence_length)?;
    let splitter = TemporalSplitter::new(split)?;
    let data = FeatureAssembler::new(features, gap_policy).training(table)?;
    let starts = builder.starts(&data.matrix.sources)?;
    let broken_windows = builder.count(data.matrix.rows())? - starts.len();
    let split = splitter.split(starts.len(), sequence_length)?;
    Ok(Layout {
        data,
        builder,
        starts,
        broken_windows,
        split,
    })
}

fn finish(
    layout: Layout,
    artifact: PreprocessingArtifact,
    scaler_rows: usize,
    degenerate: &[usize],
) -> Result<PreparedDataset> {
    let Layout {
        data,
        builder,
        starts,
        broken_windows,
        split,
    } = layout;

    let scaled = artifact.scaler.transform(data.matrix.values.view())?;
    let all = builder.build(scaled.view(), &data.matrix.times, &data.labels, &starts)?;

    let degenerate_features = degenerate
        .iter()
        .filter_map(|&j| artifact.features.names().get(j).cloned())
        .collect();

    Ok(PreparedDataset {
        train: all.slice(split.train.clone()),
        validation: all.slice(split.validation.clone()),
        test: all.slice(split.test.clone()),
        report: PrepareReport {
            assembly: data.report,
            rows: data.matrix.rows(),
            windows: starts.len(),
            broken_windows,
            split,
            scaler_rows,
            degenerate_features,
        },
        artifact,
    })
}

/// Select features, split, fit the scaler on training rows only, and window.
pub fn prepare_dataset(table: &MergedTable, config: &Config) -> Result<PreparedDataset> {
    let candidates = config
        .features
        .names
        .clone()
        .unwrap_or_else(|| FeatureSet::canonical(&table.fast, &table.slow));
    let features = FeatureSet::select(&candidates, table)?;
    let sequence_length = config.windows.sequence_length;

    let layout = layout(
        table,
        features.clone(),
        config.features.gap_policy,
        sequence_length,
        &config.split,
    )?;

    let scaler_rows = layout.builder.fit_rows(&layout.starts, layout.split.train.end);
    let fit_rows = layout.data.matrix.values.slice(s![..scaler_rows, ..]);
    let (scaler, degenerate) = ScalerState::fit_reporting(fit_rows)?;

    let artifact =
        PreprocessingArtifact::new(&table.fast, &table.slow, sequence_length, features, scaler);
    finish(layout, artifact, scaler_rows, &degenerate)
}

/// Rebuild the partitions of a table with a previously written artifact.
///
/// The artifact's feature order, sequence length and scaler are used as-is;
/// nothing is refitted.
pub fn rebuild_dataset(
    table: &MergedTable,
    artifact: &PreprocessingArtifact,
    gap_policy: GapPolicy,
    split: &SplitConfig,
) -> Result<PreparedDataset> {
    artifact.validate()?;
    artifact.check_timeframes(&table.fast, &table.slow)?;

    let layout = layout(
        table,
        artifact.features.clone(),
        gap_policy,
        artifact.sequence_length,
        split,
    )?;
    finish(layout, artifact.clone(), 0, &[])
}
