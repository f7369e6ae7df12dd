//! Core data types for the multi-timeframe pipeline.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp in seconds since Unix epoch (UTC).
pub type Timestamp = i64;

/// Date/time layout of raw bar sources (`date` + ` ` + `time`).
pub const BAR_DATETIME_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// Date/time layout of the merged table artifact.
pub const TABLE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Floor a timestamp to a multiple of `interval` seconds.
#[inline]
pub fn floor_to(ts: Timestamp, interval: i64) -> Timestamp {
    ts.div_euclid(interval) * interval
}

/// Parse a naive UTC date/time string with the given layout.
pub fn parse_timestamp(raw: &str, format: &str) -> Option<Timestamp> {
    NaiveDateTime::parse_from_str(raw.trim(), format)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Format a timestamp with [`TABLE_DATETIME_FORMAT`].
pub fn format_timestamp(ts: Timestamp) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format(TABLE_DATETIME_FORMAT).to_string(),
        None => ts.to_string(),
    }
}

/// A bar timeframe: the label used to namespace columns plus its period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    label: String,
    seconds: i64,
}

impl Timeframe {
    /// Parse a label such as `15m`, `15min`, `4h`, `1d` or `30s`.
    pub fn parse(label: &str) -> Result<Self> {
        let label = label.trim();
        let split = label
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| Error::config(format!("timeframe '{label}' has no unit")))?;
        let (count, unit) = label.split_at(split);
        let count: i64 = count
            .parse()
            .map_err(|_| Error::config(format!("timeframe '{label}' has no count")))?;
        let unit_seconds = match unit {
            "s" => 1,
            "m" | "min" => 60,
            "h" => 3_600,
            "d" => 86_400,
            _ => return Err(Error::config(format!("timeframe '{label}' has unknown unit '{unit}'"))),
        };
        if count <= 0 {
            return Err(Error::config(format!("timeframe '{label}' must be positive")));
        }
        Ok(Self {
            label: label.to_string(),
            seconds: count * unit_seconds,
        })
    }

    /// Column suffix, e.g. `15m`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Period length in seconds.
    pub fn seconds(&self) -> i64 {
        self.seconds
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl TryFrom<String> for Timeframe {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Timeframe::parse(&value)
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.label
    }
}

/// One OHLC observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar timestamp (UTC seconds).
    pub time: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Tick volume.
    pub volume: f64,
    /// Spread, when the source carries it.
    pub spread: Option<f64>,
}

/// A loaded bar together with its log-return against the previous bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub bar: Bar,
    pub log_return: f64,
}

impl SeriesRow {
    /// Timestamp of the underlying bar.
    #[inline]
    pub fn time(&self) -> Timestamp {
        self.bar.time
    }

    /// Value of a named field. Only `Spread` can be absent.
    pub fn field(&self, field: BarField) -> Option<f64> {
        match field {
            BarField::Open => Some(self.bar.open),
            BarField::High => Some(self.bar.high),
            BarField::Low => Some(self.bar.low),
            BarField::Close => Some(self.bar.close),
            BarField::Vol => Some(self.bar.volume),
            BarField::LogReturn => Some(self.log_return),
            BarField::Spread => self.bar.spread,
        }
    }
}

/// Time-sorted, de-duplicated rows of one timeframe.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeSeries {
    pub timeframe: Timeframe,
    pub rows: Vec<SeriesRow>,
}

impl TimeframeSeries {
    pub fn new(timeframe: Timeframe, rows: Vec<SeriesRow>) -> Self {
        Self { timeframe, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether any row carries a spread value.
    pub fn has_spread(&self) -> bool {
        self.rows.iter().any(|r| r.bar.spread.is_some())
    }
}

/// Per-timeframe fields that appear as columns, suffixed with the timeframe label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarField {
    Open,
    High,
    Low,
    Close,
    Vol,
    LogReturn,
    Spread,
}

impl BarField {
    /// All fields in artifact column order.
    pub const ALL: [BarField; 7] = [
        BarField::Open,
        BarField::High,
        BarField::Low,
        BarField::Close,
        BarField::Vol,
        BarField::LogReturn,
        BarField::Spread,
    ];

    /// Column name prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            BarField::Open => "Open",
            BarField::High => "High",
            BarField::Low => "Low",
            BarField::Close => "Close",
            BarField::Vol => "Vol",
            BarField::LogReturn => "LogReturn",
            BarField::Spread => "Spread",
        }
    }

    /// Column name for this field in the given timeframe, e.g. `Close15m`.
    pub fn column(self, timeframe: &Timeframe) -> String {
        format!("{}{}", self.prefix(), timeframe.label())
    }
}

/// Which of the two merged series a column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Fast,
    Slow,
}

/// A resolved column of a [`MergedTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub side: Side,
    pub field: BarField,
}

/// One fast-timeframe row with the most recent visible slow-timeframe row attached.
///
/// `slow.time()` is the source slow bar's own timestamp and never exceeds `time`.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub time: Timestamp,
    pub fast: SeriesRow,
    pub slow: SeriesRow,
}

impl MergedRow {
    fn side(&self, side: Side) -> &SeriesRow {
        match side {
            Side::Fast => &self.fast,
            Side::Slow => &self.slow,
        }
    }

    /// Value of a resolved column.
    pub fn value(&self, column: ColumnRef) -> Option<f64> {
        self.side(column.side).field(column.field)
    }
}

/// The aligned table, ordered by fast timestamp.
#[derive(Debug, Clone)]
pub struct MergedTable {
    pub fast: Timeframe,
    pub slow: Timeframe,
    pub rows: Vec<MergedRow>,
    /// `Spread` columns declared for (fast, slow) even if every cell is empty.
    spread_columns: (bool, bool),
}

impl MergedTable {
    pub fn new(fast: Timeframe, slow: Timeframe, rows: Vec<MergedRow>) -> Self {
        Self {
            fast,
            slow,
            rows,
            spread_columns: (false, false),
        }
    }

    /// Declare the `Spread` column of one side, whether or not any row fills it.
    pub fn with_spread_column(mut self, side: Side) -> Self {
        match side {
            Side::Fast => self.spread_columns.0 = true,
            Side::Slow => self.spread_columns.1 = true,
        }
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Turn an empty table into [`Error::EmptyResult`].
    pub fn ensure_non_empty(self) -> Result<Self> {
        if self.rows.is_empty() {
            return Err(Error::empty_result(format!(
                "no {} rows overlap the {} series",
                self.fast, self.slow
            )));
        }
        Ok(self)
    }

    /// Timeframe of one side.
    pub fn timeframe(&self, side: Side) -> &Timeframe {
        match side {
            Side::Fast => &self.fast,
            Side::Slow => &self.slow,
        }
    }

    /// Whether the given side has a spread column: declared, or carried by any row.
    pub fn has_spread(&self, side: Side) -> bool {
        let declared = match side {
            Side::Fast => self.spread_columns.0,
            Side::Slow => self.spread_columns.1,
        };
        declared || self.rows.iter().any(|r| r.side(side).bar.spread.is_some())
    }

    /// Check that rows ascend strictly in time and never carry a slow bar from
    /// after their own timestamp.
    pub fn check_order(&self) -> Result<()> {
        for (i, row) in self.rows.iter().enumerate() {
            if row.slow.time() > row.time {
                return Err(Error::data(format!(
                    "row {i} at {} carries a {} bar from {}",
                    format_timestamp(row.time),
                    self.slow,
                    format_timestamp(row.slow.time())
                )));
            }
        }
        if let Some(i) = self.rows.windows(2).position(|w| w[1].time <= w[0].time) {
            return Err(Error::data(format!(
                "row {} at {} does not come after {}",
                i + 1,
                format_timestamp(self.rows[i + 1].time),
                format_timestamp(self.rows[i].time)
            )));
        }
        Ok(())
    }

    fn has_column(&self, column: ColumnRef) -> bool {
        column.field != BarField::Spread || self.has_spread(column.side)
    }

    /// Resolve a column name such as `LogReturn4h`; `None` when it is not in the table.
    pub fn resolve_column(&self, name: &str) -> Option<ColumnRef> {
        for field in BarField::ALL {
            let Some(suffix) = name.strip_prefix(field.prefix()) else {
                continue;
            };
            for side in [Side::Fast, Side::Slow] {
                if suffix == self.timeframe(side).label() {
                    let column = ColumnRef { side, field };
                    return self.has_column(column).then_some(column);
                }
            }
        }
        None
    }

    /// Names of the value columns present, fast side first, in artifact order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for side in [Side::Fast, Side::Slow] {
            for field in BarField::ALL {
                let column = ColumnRef { side, field };
                if self.has_column(column) {
                    names.push(field.column(self.timeframe(side)));
                }
            }
        }
        names
    }
}

impl PartialEq for MergedTable {
    fn eq(&self, other: &Self) -> bool {
        self.fast == other.fast
            && self.slow == other.slow
            && self.rows == other.rows
            && [Side::Fast, Side::Slow]
                .into_iter()
                .all(|side| self.has_spread(side) == other.has_spread(side))
    }
}
