//! Timeframe alignment.
//!
//! The slow series is forward-filled onto the fast series' grid, then every fast
//! bar takes the latest grid point at or before its own timestamp (backward
//! as-of join). A fast bar never sees a slow bar that is not yet visible.

use mtf_core::config::SlowVisibility;
use mtf_core::{floor_to, MergedRow, MergedTable, SeriesRow, Timeframe, TimeframeSeries, Timestamp};

/// One point of the resampled slow series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPoint {
    /// Grid timestamp (a multiple of the grid interval).
    pub time: Timestamp,
    /// Index of the slow row carried at this point.
    pub source: usize,
}

/// What alignment dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignReport {
    /// Points on the resampled slow grid.
    pub grid_points: usize,
    /// Fast rows with no visible slow row (before the slow series starts).
    pub dropped_before_overlap: usize,
}

/// Alignment output. An empty table is a valid result.
#[derive(Debug, Clone)]
pub struct Aligned {
    pub table: MergedTable,
    pub report: AlignReport,
}

/// Aligner for a fast/slow pair.
pub struct TimeframeAligner {
    visibility: SlowVisibility,
}

impl TimeframeAligner {
    /// Create an aligner with the given slow-bar visibility rule.
    pub fn new(visibility: SlowVisibility) -> Self {
        Self { visibility }
    }

    /// Time from which a slow row may be attached to fast rows.
    #[inline]
    fn visible_at(&self, row: &SeriesRow, slow: &Timeframe) -> Timestamp {
        match self.visibility {
            SlowVisibility::Open => row.time(),
            SlowVisibility::Close => row.time() + slow.seconds(),
        }
    }

    /// Forward-fill the slow series onto a grid of `interval` seconds.
    ///
    /// The grid runs from the first grid point at or after the first visible
    /// slow row to the first grid point at or after the last one. Nothing is
    /// emitted before the first slow row.
    pub fn resample(&self, slow: &TimeframeSeries, interval: i64) -> Vec<GridPoint> {
        let rows = &slow.rows;
        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            return Vec::new();
        };

        let first_visible = self.visible_at(first, &slow.timeframe);
        let last_visible = self.visible_at(last, &slow.timeframe);

        let mut start = floor_to(first_visible, interval);
        if start < first_visible {
            start += interval;
        }
        let mut end = floor_to(last_visible, interval);
        if end < last_visible {
            end += interval;
        }

        let mut grid = Vec::with_capacity(((end - start) / interval + 1) as usize);
        let mut source = 0usize;
        let mut t = start;
        while t <= end {
            while source + 1 < rows.len()
                && self.visible_at(&rows[source + 1], &slow.timeframe) <= t
            {
                source += 1;
            }
            grid.push(GridPoint { time: t, source });
            t += interval;
        }
        grid
    }

    /// Align a fast series with a slow series.
    ///
    /// Both series must be sorted by time, as produced by the loader. The
    /// resampling grid is the fast timeframe's period.
    pub fn align(&self, fast: &TimeframeSeries, slow: &TimeframeSeries) -> Aligned {
        debug_assert!(fast.rows.windows(2).all(|w| w[0].time() < w[1].time()));

        let grid = self.resample(slow, fast.timeframe.seconds());
        let mut report = AlignReport {
            grid_points: grid.len(),
            ..AlignReport::default()
        };

        let mut rows = Vec::with_capacity(fast.rows.len());
        let mut g = 0usize;
        for fast_row in &fast.rows {
            let t = fast_row.time();
            while g + 1 < grid.len() && grid[g + 1].time <= t {
                g += 1;
            }
            match grid.get(g) {
                Some(point) if point.time <= t => rows.push(MergedRow {
                    time: t,
                    fast: fast_row.clone(),
                    slow: slow.rows[point.source].clone(),
                }),
                _ => report.dropped_before_overlap += 1,
            }
        }

        Aligned {
            table: MergedTable::new(fast.timeframe.clone(), slow.timeframe.clone(), rows),
            report,
        }
    }
}

impl Default for TimeframeAligner {
    fn default() -> Self {
        Self::new(SlowVisibility::Open)
    }
}
