//! Raw bar source reading.
//!
//! Reads delimited bar exports (`date`, `time`, `open`, `high`, `low`, `close`,
//! `volume`, optional `spread`). MetaTrader headers such as `<DATE>` and
//! `<TICKVOL>` are accepted.

use csv::{ReaderBuilder, StringRecord, Trim};
use mtf_core::{Error, Result};
use std::io::Read;
use std::path::Path;

/// One unvalidated bar record. Date and time stay textual until the loader
/// derives the unified timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    /// 1-based line in the source, for error messages.
    pub line: u64,
    pub date: String,
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub spread: Option<f64>,
}

/// Column positions of the fields we need.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    date: usize,
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    spread: Option<usize>,
}

fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_ascii_lowercase()
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut date = None;
        let mut time = None;
        let mut open = None;
        let mut high = None;
        let mut low = None;
        let mut close = None;
        let mut volume = None;
        let mut tickvol = None;
        let mut spread = None;

        for (i, h) in headers.iter().enumerate() {
            match normalize_header(h).as_str() {
                "date" => date = Some(i),
                "time" => time = Some(i),
                "open" => open = Some(i),
                "high" => high = Some(i),
                "low" => low = Some(i),
                "close" => close = Some(i),
                "volume" => volume = Some(i),
                "tickvol" => tickvol = Some(i),
                "spread" => spread = Some(i),
                _ => {}
            }
        }

        let required = |idx: Option<usize>, name: &str| {
            idx.ok_or_else(|| Error::schema(format!("missing required field '{name}'")))
        };

        Ok(Self {
            date: required(date, "date")?,
            time: required(time, "time")?,
            open: required(open, "open")?,
            high: required(high, "high")?,
            low: required(low, "low")?,
            close: required(close, "close")?,
            volume: required(tickvol.or(volume), "volume")?,
            spread,
        })
    }
}

fn field<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("")
}

fn parse_finite(record: &StringRecord, idx: usize, name: &str, line: u64) -> Result<f64> {
    let raw = field(record, idx);
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(Error::parse(format!(
            "line {line}: {name} '{raw}' is not a finite number"
        ))),
    }
}

fn parse_record(record: &StringRecord, columns: &ColumnMap) -> Result<RawBar> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);

    let volume = parse_finite(record, columns.volume, "volume", line)?;
    if volume < 0.0 {
        return Err(Error::parse(format!("line {line}: volume {volume} is negative")));
    }

    let spread = match columns.spread {
        Some(idx) if !field(record, idx).is_empty() => {
            Some(parse_finite(record, idx, "spread", line)?)
        }
        _ => None,
    };

    Ok(RawBar {
        line,
        date: field(record, columns.date).to_string(),
        time: field(record, columns.time).to_string(),
        open: parse_finite(record, columns.open, "open", line)?,
        high: parse_finite(record, columns.high, "high", line)?,
        low: parse_finite(record, columns.low, "low", line)?,
        close: parse_finite(record, columns.close, "close", line)?,
        volume,
        spread,
    })
}

/// Read raw bars from any reader.
pub fn read_raw_bars<R: Read>(reader: R, delimiter: u8) -> Result<Vec<RawBar>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(Trim::All)
        .from_reader(reader);

    let columns = ColumnMap::from_headers(reader.headers()?)?;

    let mut bars = Vec::new();
    for result in reader.records() {
        let record = result?;
        bars.push(parse_record(&record, &columns)?);
    }
    Ok(bars)
}

/// Read raw bars from a file.
pub fn read_raw_bar_file(path: &Path, delimiter: u8) -> Result<Vec<RawBar>> {
    let file = std::fs::File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    read_raw_bars(file, delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_plain_headers() {
        let csv = "date,time,open,high,low,close,volume,spread\n\
                   2021.01.01,00:00:00,1.3650,1.3660,1.3640,1.3655,120,3\n\
                   2021.01.01,00:15:00,1.3655,1.3670,1.3650,1.3668,98,\n";
        let bars = read_raw_bars(csv.as_bytes(), b',').unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, "2021.01.01");
        assert_eq!(bars[0].time, "00:00:00");
        assert_eq!(bars[0].close, 1.3655);
        assert_eq!(bars[0].spread, Some(3.0));
        assert_eq!(bars[1].spread, None);
        assert_eq!(bars[1].line, 3);
    }

    #[test]
    fn test_read_metatrader_export() {
        let csv = "<DATE>\t<TIME>\t<OPEN>\t<HIGH>\t<LOW>\t<CLOSE>\t<TICKVOL>\t<VOL>\t<SPREAD>\n\
                   2021.01.04\t04:00:00\t1.3670\t1.3700\t1.3660\t1.3690\t5400\t0\t12\n";
        let bars = read_raw_bars(csv.as_bytes(), b'\t').unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 5400.0);
        assert_eq!(bars[0].spread, Some(12.0));
    }

    #[test]
    fn test_missing_field_is_schema_error() {
        let csv = "date,time,open,high,low,volume\n2021.01.01,00:00:00,1,1,1,1\n";
        let err = read_raw_bars(csv.as_bytes(), b',').unwrap_err();
        match err {
            Error::Schema(msg) => assert!(msg.contains("close")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_number_is_parse_error() {
        let csv = "date,time,open,high,low,close,volume\n2021.01.01,00:00:00,1,1,1,abc,1\n";
        assert!(matches!(read_raw_bars(csv.as_bytes(), b','), Err(Error::Parse(_))));
    }

    #[test]
    fn test_negative_volume_is_parse_error() {
        let csv = "date,time,open,high,low,close,volume\n2021.01.01,00:00:00,1,1,1,1,-4\n";
        assert!(matches!(read_raw_bars(csv.as_bytes(), b','), Err(Error::Parse(_))));
    }
}
