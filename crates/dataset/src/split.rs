//! Temporal train/validation/test split.
//!
//! Partitions are contiguous index ranges in time order. Boundaries are
//! `floor(fraction * windows)`.

use mtf_core::config::{BoundaryPolicy, SplitConfig};
use mtf_core::{Error, Result};
use std::ops::Range;

/// Window index ranges of each partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRanges {
    pub train: Range<usize>,
    pub validation: Range<usize>,
    pub test: Range<usize>,
    /// Windows removed at the start of validation and test.
    pub purged: usize,
}

impl SplitRanges {
    /// Windows kept across all partitions.
    pub fn kept(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

/// Splits `n` windows by position.
#[derive(Debug, Clone)]
pub struct TemporalSplitter {
    train_end: f64,
    validation_end: f64,
    boundary: BoundaryPolicy,
}

impl TemporalSplitter {
    pub fn new(config: &SplitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            train_end: config.train_end,
            validation_end: config.validation_end,
            boundary: config.boundary,
        })
    }

    /// Raw boundary indices `(train_end, validation_end)`.
    pub fn boundaries(&self, n: usize) -> (usize, usize) {
        let a = ((self.train_end * n as f64).floor() as usize).min(n);
        let b = ((self.validation_end * n as f64).floor() as usize).clamp(a, n);
        (a, b)
    }

    /// Windows after a boundary that read a row an earlier window reads.
    ///
    /// The label at row `r` compares the closes of rows `r` and `r + 1`. A
    /// window of length `S > 1` labels at row `i + S`, so it reads rows
    /// `[i, i + S + 1]` and the next `S + 1` windows share a row with it. A
    /// single-step window reads rows `i` and `i + 1`.
    fn purge_width(&self, sequence_length: usize) -> usize {
        match self.boundary {
            BoundaryPolicy::Overlap => 0,
            BoundaryPolicy::Purge if sequence_length > 1 => sequence_length + 1,
            BoundaryPolicy::Purge => 1,
        }
    }

    /// Split `n` windows of length `sequence_length`.
    pub fn split(&self, n: usize, sequence_length: usize) -> Result<SplitRanges> {
        let (a, b) = self.boundaries(n);
        if a == 0 {
            return Err(Error::insufficient_data(format!(
                "training partition is empty for {n} windows at train_end {}",
                self.train_end
            )));
        }

        let gap = self.purge_width(sequence_length);
        let validation = (a + gap).min(b)..b;
        let test = (b + gap).min(n)..n;
        let purged = (validation.start - a) + (test.start - b);

        Ok(SplitRanges {
            train: 0..a,
            validation,
            test,
            purged,
        })
    }
}
