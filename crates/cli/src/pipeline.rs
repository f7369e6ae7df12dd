//! Subcommand implementations.
//!
//! Every library stage returns typed results; reporting happens here.

use std::path::Path;

use anyhow::{Context, Result};
use mtf_core::{Config, MergedTable};
use mtf_dataset::{
    prepare_dataset, rebuild_dataset, write_dataset, write_signal, ClassificationMetrics,
    InferenceAdapter, LogisticPredictor, MetricsCalculator, PreprocessingArtifact,
};
use mtf_features::TimeframeAligner;
use mtf_ingestion::{read_merged_file, write_merged_file, BarLoader, LoadReport};
use tracing::{debug, info, warn};

fn log_load(label: &str, path: &Path, report: &LoadReport, rows: usize) {
    info!(
        timeframe = label,
        path = %path.display(),
        records = report.records,
        rows,
        "Loaded bars"
    );
    if report.duplicates_removed > 0 {
        warn!(
            timeframe = label,
            duplicates = report.duplicates_removed,
            "Removed duplicate timestamps"
        );
    }
    if report.coerced_returns > 0 {
        warn!(
            timeframe = label,
            coerced = report.coerced_returns,
            "Non-finite log-returns set to 0"
        );
    }
}

/// Load both raw series, align them and write the merged table.
pub fn run_merge(config: &Config) -> Result<MergedTable> {
    let fast_tf = config.timeframes.fast()?;
    let slow_tf = config.timeframes.slow()?;
    let delimiter = config.input.delimiter_byte();

    let fast = BarLoader::new(fast_tf.clone())
        .load_file(&config.input.fast_path, delimiter)
        .with_context(|| format!("Failed to load {}", config.input.fast_path.display()))?;
    log_load(fast_tf.label(), &config.input.fast_path, &fast.report, fast.series.len());

    let slow = BarLoader::new(slow_tf.clone())
        .load_file(&config.input.slow_path, delimiter)
        .with_context(|| format!("Failed to load {}", config.input.slow_path.display()))?;
    log_load(slow_tf.label(), &config.input.slow_path, &slow.report, slow.series.len());

    let aligned =
        TimeframeAligner::new(config.timeframes.slow_visibility).align(&fast.series, &slow.series);
    debug!(
        grid_points = aligned.report.grid_points,
        dropped_before_overlap = aligned.report.dropped_before_overlap,
        "Aligned series"
    );
    let table = aligned.table.ensure_non_empty()?;

    let path = &config.artifacts.merged_path;
    write_merged_file(path, &table)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(rows = table.len(), path = %path.display(), "Merged table written");
    Ok(table)
}

fn read_merged(config: &Config) -> Result<MergedTable> {
    let path = &config.artifacts.merged_path;
    let table = read_merged_file(path, &config.timeframes.fast()?, &config.timeframes.slow()?)
        .with_context(|| format!("Failed to read merged table {}", path.display()))?;
    debug!(rows = table.len(), path = %path.display(), "Read merged table");
    Ok(table)
}

/// Window, split and scale the merged table; write the artifact and partitions.
pub fn run_prepare(config: &Config) -> Result<()> {
    let table = read_merged(config)?;
    let prepared = prepare_dataset(&table, config)?;
    let report = &prepared.report;

    info!(
        features = ?prepared.artifact.features.names(),
        sequence_length = prepared.artifact.sequence_length,
        rows = report.rows,
        windows = report.windows,
        "Assembled dataset"
    );
    if report.assembly.incomplete_rows > 0 {
        warn!(
            dropped = report.assembly.incomplete_rows,
            "Dropped rows with missing features"
        );
    }
    if report.broken_windows > 0 {
        warn!(
            skipped = report.broken_windows,
            "Windows skipped where a dropped row broke the sequence"
        );
    }
    if !report.degenerate_features.is_empty() {
        warn!(
            features = ?report.degenerate_features,
            "Features constant over training rows; scaled to zero"
        );
    }
    info!(
        train = prepared.train.len(),
        validation = prepared.validation.len(),
        test = prepared.test.len(),
        purged = report.split.purged,
        scaler_rows = report.scaler_rows,
        "Split windows"
    );

    let artifact_path = &config.artifacts.preprocessing_path;
    prepared
        .artifact
        .save(artifact_path)
        .with_context(|| format!("Failed to write {}", artifact_path.display()))?;
    info!(path = %artifact_path.display(), "Preprocessing artifact written");

    let dir = &config.artifacts.dataset_dir;
    let written = write_dataset(dir, &prepared)
        .with_context(|| format!("Failed to write partitions to {}", dir.display()))?;
    info!(files = written.len(), dir = %dir.display(), "Partitions written");
    Ok(())
}

fn log_metrics(partition: &str, m: &ClassificationMetrics) {
    info!(
        partition,
        samples = m.samples,
        accuracy = m.accuracy,
        precision = m.precision,
        recall = m.recall,
        log_loss = m.log_loss,
        base_rate = m.base_rate,
        "Evaluation"
    );
}

/// Score a model on the test partition rebuilt with the saved artifact.
pub fn run_evaluate(config: &Config, model_path: &Path) -> Result<()> {
    let table = read_merged(config)?;
    let artifact = PreprocessingArtifact::load(&config.artifacts.preprocessing_path)?;
    let model = LogisticPredictor::from_json_file(model_path)
        .with_context(|| format!("Failed to load model {}", model_path.display()))?;

    let dataset = rebuild_dataset(
        &table,
        &artifact,
        config.features.gap_policy,
        &config.split,
    )?;
    if dataset.test.is_empty() {
        warn!("Test partition is empty");
    }

    let calculator = MetricsCalculator::default();
    let metrics = calculator.evaluate(&model, &dataset.test)?;
    log_metrics("test", &metrics);
    Ok(())
}

/// Serve the latest window and write the signal file.
pub fn run_predict(config: &Config, model_path: &Path, remerge: bool) -> Result<()> {
    let table = if remerge {
        run_merge(config)?
    } else {
        read_merged(config)?
    };

    let adapter = InferenceAdapter::from_artifact_file(&config.artifacts.preprocessing_path)?;
    let model = LogisticPredictor::from_json_file(model_path)
        .with_context(|| format!("Failed to load model {}", model_path.display()))?;

    let prediction = adapter.predict(&table, &model)?;
    let path = &config.artifacts.signal_path;
    write_signal(path, prediction.probability)
        .with_context(|| format!("Failed to write signal {}", path.display()))?;

    info!(
        probability = %format!("{:.6}", prediction.probability),
        time = %mtf_core::format_timestamp(prediction.time),
        path = %path.display(),
        "Signal written"
    );
    Ok(())
}
