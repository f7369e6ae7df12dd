//! Partition export for an external training loop.
//!
//! One CSV per partition: `time` (last input row), one `t{step}_{feature}`
//! column per window cell in step-major order, then `label`.

use crate::prepare::PreparedDataset;
use crate::window::WindowSet;
use csv::WriterBuilder;
use mtf_core::{format_timestamp, Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Partition file names, in time order.
pub const PARTITION_FILES: [&str; 3] = ["train.csv", "validation.csv", "test.csv"];

fn header(set: &WindowSet, features: &[String]) -> Vec<String> {
    let mut names = Vec::with_capacity(2 + set.sequence_length() * features.len());
    names.push("time".to_string());
    for step in 0..set.sequence_length() {
        for feature in features {
            names.push(format!("t{step}_{feature}"));
        }
    }
    names.push("label".to_string());
    names
}

/// Write one partition.
pub fn write_partition<W: Write>(writer: W, set: &WindowSet, features: &[String]) -> Result<()> {
    if set.feature_count() != features.len() {
        return Err(Error::DimensionMismatch {
            expected: features.len(),
            actual: set.feature_count(),
        });
    }

    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(header(set, features))?;

    let mut record = Vec::new();
    for (i, window) in set.windows.outer_iter().enumerate() {
        record.clear();
        record.push(format_timestamp(set.end_times[i]));
        record.extend(window.iter().map(|v| v.to_string()));
        record.push(set.labels[i].to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write all three partitions into `dir`, returning the paths written.
pub fn write_dataset(dir: &Path, dataset: &PreparedDataset) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let features = dataset.artifact.features.names();
    let sets = [&dataset.train, &dataset.validation, &dataset.test];

    let mut written = Vec::with_capacity(sets.len());
    for (name, set) in PARTITION_FILES.iter().zip(sets) {
        let path = dir.join(name);
        let file = std::fs::File::create(&path)?;
        write_partition(std::io::BufWriter::new(file), set, features)?;
        written.push(path);
    }
    Ok(written)
}
