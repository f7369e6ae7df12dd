//! Fixed-length windows over a feature matrix.

use mtf_core::{Error, Result, Timestamp};
use ndarray::{s, Array3, ArrayView2};
use std::ops::Range;

/// Windows in time order, shaped (batch, timestep, feature).
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet {
    pub windows: Array3<f64>,
    /// One label per window.
    pub labels: Vec<u8>,
    /// Timestamp of each window's last input row.
    pub end_times: Vec<Timestamp>,
}

impl WindowSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn sequence_length(&self) -> usize {
        self.windows.dim().1
    }

    pub fn feature_count(&self) -> usize {
        self.windows.dim().2
    }

    /// Copy out a contiguous range of windows.
    pub fn slice(&self, range: Range<usize>) -> WindowSet {
        WindowSet {
            windows: self.windows.slice(s![range.clone(), .., ..]).to_owned(),
            labels: self.labels[range.clone()].to_vec(),
            end_times: self.end_times[range].to_vec(),
        }
    }
}

/// Builds windows of `sequence_length` rows.
///
/// With length 1 every row is its own one-step window and keeps its own label.
/// With length `S > 1`, the window starting at row `k` covers rows `[k, k + S)`
/// and takes the label at row `k + S`. Windows are only formed over rows that
/// are consecutive in the merged table, so a dropped row is never bridged.
#[derive(Debug, Clone, Copy)]
pub struct WindowBuilder {
    sequence_length: usize,
}

impl WindowBuilder {
    pub fn new(sequence_length: usize) -> Result<Self> {
        if sequence_length == 0 {
            return Err(Error::config("sequence_length must be at least 1"));
        }
        Ok(Self { sequence_length })
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Offset from a window's first row to its label row.
    #[inline]
    fn label_offset(&self) -> usize {
        if self.sequence_length == 1 {
            0
        } else {
            self.sequence_length
        }
    }

    /// Number of windows over `rows` consecutive rows.
    pub fn count(&self, rows: usize) -> Result<usize> {
        let offset = self.label_offset();
        if rows == 0 || rows <= offset {
            return Err(Error::insufficient_data(format!(
                "{rows} rows cannot fill a window of length {}",
                self.sequence_length
            )));
        }
        Ok(rows - offset)
    }

    /// First row of every window over a matrix whose row `k` came from merged
    /// row `sources[k]`. `sources` must be strictly increasing.
    pub fn starts(&self, sources: &[usize]) -> Result<Vec<usize>> {
        let count = self.count(sources.len())?;
        let offset = self.label_offset();
        let starts: Vec<usize> = (0..count)
            .filter(|&k| sources[k] + offset == sources[k + offset])
            .collect();
        if starts.is_empty() {
            return Err(Error::insufficient_data(format!(
                "no {} consecutive rows among {} rows",
                offset + 1,
                sources.len()
            )));
        }
        Ok(starts)
    }

    /// Rows `[0, n)` that the first `windows` of `starts` read as input.
    pub fn fit_rows(&self, starts: &[usize], windows: usize) -> usize {
        starts[..windows.min(starts.len())]
            .last()
            .map_or(0, |&k| k + self.sequence_length)
    }

    /// Build the labeled windows starting at `starts`.
    pub fn build(
        &self,
        values: ArrayView2<f64>,
        times: &[Timestamp],
        labels: &[u8],
        starts: &[usize],
    ) -> Result<WindowSet> {
        let rows = values.nrows();
        if labels.len() != rows {
            return Err(Error::DimensionMismatch {
                expected: rows,
                actual: labels.len(),
            });
        }
        if times.len() != rows {
            return Err(Error::DimensionMismatch {
                expected: rows,
                actual: times.len(),
            });
        }

        let seq = self.sequence_length;
        let offset = self.label_offset();
        if let Some(&k) = starts.iter().find(|&&k| k + offset >= rows || k + seq > rows) {
            return Err(Error::insufficient_data(format!(
                "window at row {k} runs past {rows} rows"
            )));
        }

        let mut windows = Array3::zeros((starts.len(), seq, values.ncols()));
        let mut out_labels = Vec::with_capacity(starts.len());
        let mut end_times = Vec::with_capacity(starts.len());
        for (i, &k) in starts.iter().enumerate() {
            windows
                .slice_mut(s![i, .., ..])
                .assign(&values.slice(s![k..k + seq, ..]));
            out_labels.push(labels[k + offset]);
            end_times.push(times[k + seq - 1]);
        }

        Ok(WindowSet {
            windows,
            labels: out_labels,
            end_times,
        })
    }

    /// First row of the window ending at the last row.
    ///
    /// [`Error::NoData`] when there are fewer than `S` rows or the last `S`
    /// are not consecutive in the merged table.
    pub fn latest_start(&self, sources: &[usize]) -> Result<usize> {
        let rows = sources.len();
        let seq = self.sequence_length;
        if rows < seq {
            return Err(Error::no_data(format!("{rows} complete rows, need {seq}")));
        }
        let start = rows - seq;
        if sources[start] + seq - 1 != sources[rows - 1] {
            return Err(Error::no_data(format!(
                "the latest {seq} complete rows are not consecutive"
            )));
        }
        Ok(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn matrix(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(i, j)| (i * 10 + j) as f64)
    }

    fn times(rows: usize) -> Vec<Timestamp> {
        (0..rows as i64).map(|i| 1_000 + i * 900).collect()
    }

    fn consecutive(rows: usize) -> Vec<usize> {
        (0..rows).collect()
    }

    #[test]
    fn test_single_step_windows() {
        let m = matrix(5, 3);
        let labels = vec![1, 0, 1, 1, 0];
        let builder = WindowBuilder::new(1).unwrap();
        let starts = builder.starts(&consecutive(5)).unwrap();
        let set = builder.build(m.view(), &times(5), &labels, &starts).unwrap();

        assert_eq!(set.windows.dim(), (5, 1, 3));
        assert_eq!(set.labels, labels);
        assert_eq!(set.windows[[3, 0, 2]], 32.0);
        assert_eq!(set.end_times[4], 1_000 + 4 * 900);
    }

    #[test]
    fn test_sliding_windows_take_next_label() {
        let m = matrix(6, 2);
        let labels = vec![0, 1, 2, 3, 4, 5];
        let builder = WindowBuilder::new(3).unwrap();
        let starts = builder.starts(&consecutive(6)).unwrap();
        let set = builder.build(m.view(), &times(6), &labels, &starts).unwrap();

        assert_eq!(starts, vec![0, 1, 2]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.windows.dim(), (3, 3, 2));
        assert_eq!(set.labels, vec![3, 4, 5]);
        assert_eq!(set.windows[[1, 0, 0]], 10.0);
        assert_eq!(set.windows[[1, 2, 1]], 31.0);
        assert_eq!(set.end_times[0], times(6)[2]);
        assert_eq!(builder.fit_rows(&starts, 2), 4);
    }

    #[test]
    fn test_windows_skip_dropped_rows() {
        // Merged row 3 was dropped; matrix row 3 is merged row 4.
        let sources = vec![0, 1, 2, 4, 5, 6, 7, 8];
        let builder = WindowBuilder::new(3).unwrap();
        let starts = builder.starts(&sources).unwrap();

        // Only rows 3..=6 (merged 4..=7) and 4..=7 (merged 5..=8) are unbroken
        // runs of three inputs plus a label row.
        assert_eq!(starts, vec![3, 4]);
        assert_eq!(builder.fit_rows(&starts, 1), 6);

        let m = matrix(8, 1);
        let labels = vec![0, 0, 0, 0, 0, 0, 1, 0];
        let set = builder.build(m.view(), &times(8), &labels, &starts).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.windows[[0, 0, 0]], 30.0);
        assert_eq!(set.labels, vec![1, 0]);

        // Single-step windows never span rows.
        assert_eq!(WindowBuilder::new(1).unwrap().starts(&sources).unwrap().len(), 8);
        assert!(matches!(
            builder.starts(&[0, 1, 2, 4, 5, 6]),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_insufficient_rows() {
        let builder = WindowBuilder::new(4).unwrap();
        assert!(matches!(builder.count(4), Err(Error::InsufficientData(_))));
        assert_eq!(builder.count(5).unwrap(), 1);
        assert!(matches!(
            WindowBuilder::new(1).unwrap().count(0),
            Err(Error::InsufficientData(_))
        ));
        assert!(WindowBuilder::new(0).is_err());
    }

    #[test]
    fn test_label_length_mismatch() {
        let m = matrix(4, 2);
        let err = WindowBuilder::new(1)
            .unwrap()
            .build(m.view(), &times(4), &[1, 0], &[0, 1])
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 4, actual: 2 }));
    }

    #[test]
    fn test_latest_start() {
        let builder = WindowBuilder::new(2).unwrap();
        assert_eq!(builder.latest_start(&consecutive(5)).unwrap(), 3);
        assert_eq!(builder.latest_start(&[0, 2, 3]).unwrap(), 1);

        assert!(matches!(builder.latest_start(&[4]), Err(Error::NoData(_))));
        assert!(matches!(builder.latest_start(&[0, 1, 3]), Err(Error::NoData(_))));
    }

    #[test]
    fn test_slice_partition() {
        let m = matrix(6, 2);
        let builder = WindowBuilder::new(1).unwrap();
        let starts = builder.starts(&consecutive(6)).unwrap();
        let set = builder
            .build(m.view(), &times(6), &[0, 1, 0, 1, 0, 1], &starts)
            .unwrap();
        let part = set.slice(2..4);
        assert_eq!(part.len(), 2);
        assert_eq!(part.windows[[0, 0, 0]], 20.0);
        assert_eq!(part.labels, vec![0, 1]);
    }
}
