//! Bar loading.
//!
//! Turns raw records of one timeframe into a time-sorted, de-duplicated series
//! with log-returns. Column names are namespaced by the series' timeframe
//! (`close` becomes `Close15m`) through [`mtf_core::BarField::column`].

use crate::returns::log_return;
use crate::source::{read_raw_bar_file, RawBar};
use mtf_core::{
    parse_timestamp, Bar, Error, Result, SeriesRow, Timeframe, TimeframeSeries,
    BAR_DATETIME_FORMAT,
};
use std::path::Path;

/// What the loader removed or rewrote, so expected edge drops can be told
/// apart from anything unexpected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records read from the source.
    pub records: usize,
    /// Records removed because an earlier record had the same timestamp.
    pub duplicates_removed: usize,
    /// Leading rows dropped for lack of a previous close (0 or 1).
    pub leading_dropped: usize,
    /// Non-finite log-returns replaced by 0.
    pub coerced_returns: usize,
}

/// A loaded series and its report.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: TimeframeSeries,
    pub report: LoadReport,
}

/// Loader for one timeframe.
pub struct BarLoader {
    timeframe: Timeframe,
}

impl BarLoader {
    /// Create a loader for the given timeframe.
    pub fn new(timeframe: Timeframe) -> Self {
        Self { timeframe }
    }

    /// Timeframe used to namespace the loaded columns.
    pub fn timeframe(&self) -> &Timeframe {
        &self.timeframe
    }

    /// Derive the unified timestamp of each record.
    ///
    /// The raw date/time (and any spread-availability flag) are not kept once
    /// the timestamp exists; the spread value itself is.
    pub fn parse_bars(&self, raw: &[RawBar]) -> Result<Vec<Bar>> {
        raw.iter()
            .map(|r| {
                let stamp = format!("{} {}", r.date, r.time);
                let time = parse_timestamp(&stamp, BAR_DATETIME_FORMAT).ok_or_else(|| {
                    Error::parse(format!(
                        "line {}: cannot parse date/time '{stamp}' as YYYY.MM.DD HH:MM:SS",
                        r.line
                    ))
                })?;
                Ok(Bar {
                    time,
                    open: r.open,
                    high: r.high,
                    low: r.low,
                    close: r.close,
                    volume: r.volume,
                    spread: r.spread,
                })
            })
            .collect()
    }

    /// Load raw records into a series.
    pub fn load(&self, raw: Vec<RawBar>) -> Result<LoadedSeries> {
        let mut report = LoadReport {
            records: raw.len(),
            ..LoadReport::default()
        };

        let mut bars = self.parse_bars(&raw)?;

        // Stable sort, so the first occurrence of a timestamp survives dedup.
        bars.sort_by_key(|b| b.time);
        let before = bars.len();
        bars.dedup_by_key(|b| b.time);
        report.duplicates_removed = before - bars.len();

        let mut rows = Vec::with_capacity(bars.len().saturating_sub(1));
        let mut prev_close: Option<f64> = None;
        for bar in bars {
            let close = bar.close;
            match prev_close {
                Some(prev) => {
                    let (ret, coerced) = log_return(prev, close);
                    if coerced {
                        report.coerced_returns += 1;
                    }
                    rows.push(SeriesRow { bar, log_return: ret });
                }
                None => report.leading_dropped += 1,
            }
            prev_close = Some(close);
        }

        Ok(LoadedSeries {
            series: TimeframeSeries::new(self.timeframe.clone(), rows),
            report,
        })
    }

    /// Read and load a bar file.
    pub fn load_file(&self, path: &Path, delimiter: u8) -> Result<LoadedSeries> {
        let raw = read_raw_bar_file(path, delimiter)?;
        self.load(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn make_raw(date: &str, time: &str, close: f64) -> RawBar {
        RawBar {
            line: 0,
            date: date.to_string(),
            time: time.to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
            spread: None,
        }
    }

    fn loader() -> BarLoader {
        BarLoader::new(Timeframe::parse("15m").unwrap())
    }

    #[test]
    fn test_first_row_dropped_and_returns() {
        let raw = vec![
            make_raw("2021.01.01", "00:00:00", 100.0),
            make_raw("2021.01.01", "00:15:00", 110.0),
            make_raw("2021.01.01", "00:30:00", 99.0),
            make_raw("2021.01.01", "00:45:00", 99.0),
        ];
        let loaded = loader().load(raw).unwrap();
        let rows = &loaded.series.rows;

        assert_eq!(rows.len(), 3);
        assert_eq!(loaded.report.leading_dropped, 1);
        assert_abs_diff_eq!(rows[0].log_return, 1.1_f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(rows[1].log_return, -0.2007, epsilon = 1e-4);
        assert_eq!(rows[2].log_return, 0.0);
        assert_eq!(rows[0].time(), 1_609_460_100);
    }

    #[test]
    fn test_sorts_and_keeps_first_duplicate() {
        let raw = vec![
            make_raw("2021.01.01", "00:30:00", 102.0),
            make_raw("2021.01.01", "00:00:00", 100.0),
            make_raw("2021.01.01", "00:15:00", 101.0),
            make_raw("2021.01.01", "00:15:00", 555.0),
        ];
        let loaded = loader().load(raw).unwrap();
        let closes: Vec<f64> = loaded.series.rows.iter().map(|r| r.bar.close).collect();

        assert_eq!(loaded.report.duplicates_removed, 1);
        assert_eq!(closes, vec![101.0, 102.0]);
        assert!(loaded
            .series
            .rows
            .windows(2)
            .all(|w| w[0].time() < w[1].time()));
    }

    #[test]
    fn test_zero_close_coerced_to_zero_return() {
        let raw = vec![
            make_raw("2021.01.01", "00:00:00", 100.0),
            make_raw("2021.01.01", "00:15:00", 0.0),
            make_raw("2021.01.01", "00:30:00", 100.0),
        ];
        let loaded = loader().load(raw).unwrap();
        let rets: Vec<f64> = loaded.series.rows.iter().map(|r| r.log_return).collect();

        assert_eq!(rets, vec![0.0, 0.0]);
        assert_eq!(loaded.report.coerced_returns, 2);
    }

    #[test]
    fn test_bad_timestamp_is_parse_error() {
        let raw = vec![make_raw("2021-01-01", "00:00:00", 100.0)];
        assert!(matches!(loader().load(raw), Err(Error::Parse(_))));

        let raw = vec![make_raw("2021.01.01", "25:00:00", 100.0)];
        assert!(matches!(loader().load(raw), Err(Error::Parse(_))));
    }

    #[test]
    fn test_empty_and_single_record() {
        let loaded = loader().load(Vec::new()).unwrap();
        assert!(loaded.series.is_empty());
        assert_eq!(loaded.report.leading_dropped, 0);

        let loaded = loader()
            .load(vec![make_raw("2021.01.01", "00:00:00", 1.0)])
            .unwrap();
        assert!(loaded.series.is_empty());
        assert_eq!(loaded.report.leading_dropped, 1);
    }

    #[test]
    fn test_load_file_keeps_spread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m15.csv");
        std::fs::write(
            &path,
            "DATE,TIME,OPEN,HIGH,LOW,CLOSE,TICKVOL,SPREAD\n\
             2021.01.01,00:00:00,1.0,1.0,1.0,1.0,10,4\n\
             2021.01.01,00:15:00,1.0,1.1,1.0,1.1,12,5\n",
        )
        .unwrap();
        let loaded = loader().load_file(&path, b',').unwrap();

        assert_eq!(loaded.series.len(), 1);
        assert_eq!(loaded.series.rows[0].bar.spread, Some(5.0));
        assert!(loaded.series.has_spread());
    }
}
