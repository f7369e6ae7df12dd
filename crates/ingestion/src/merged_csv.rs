//! Merged table artifact.
//!
//! Columns: `Time`, the fast timeframe's fields, `Time{slow}` (source slow bar
//! time), then the slow timeframe's fields. `Spread{tf}` only appears when the
//! series carries spread.

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use mtf_core::{
    format_timestamp, parse_timestamp, Bar, BarField, Error, MergedRow, MergedTable, Result,
    SeriesRow, Side, Timeframe, Timestamp, TABLE_DATETIME_FORMAT,
};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

const TIME_COLUMN: &str = "Time";

fn slow_time_column(slow: &Timeframe) -> String {
    format!("{TIME_COLUMN}{}", slow.label())
}

fn header(table: &MergedTable) -> Vec<String> {
    let mut names = vec![TIME_COLUMN.to_string()];
    for side in [Side::Fast, Side::Slow] {
        let tf = table.timeframe(side);
        if side == Side::Slow {
            names.push(slow_time_column(tf));
        }
        for field in BarField::ALL {
            if field != BarField::Spread || table.has_spread(side) {
                names.push(field.column(tf));
            }
        }
    }
    names
}

fn push_row(out: &mut Vec<String>, row: &SeriesRow, with_spread: bool) {
    for field in BarField::ALL {
        match field {
            BarField::Spread if !with_spread => {}
            BarField::Spread => out.push(row.bar.spread.map(|s| s.to_string()).unwrap_or_default()),
            _ => out.push(row.field(field).map(|v| v.to_string()).unwrap_or_default()),
        }
    }
}

/// Write the merged table to any writer.
pub fn write_merged<W: Write>(writer: W, table: &MergedTable) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(header(table))?;

    let fast_spread = table.has_spread(Side::Fast);
    let slow_spread = table.has_spread(Side::Slow);
    let mut record = Vec::new();
    for row in &table.rows {
        record.clear();
        record.push(format_timestamp(row.time));
        push_row(&mut record, &row.fast, fast_spread);
        record.push(format_timestamp(row.slow.time()));
        push_row(&mut record, &row.slow, slow_spread);
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the merged table to a file, creating parent directories.
pub fn write_merged_file(path: &Path, table: &MergedTable) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_merged(file, table)
}

/// Column positions for one side of the table.
struct SideColumns {
    fields: Vec<(BarField, usize)>,
    spread: Option<usize>,
}

impl SideColumns {
    fn resolve(index: &HashMap<String, usize>, tf: &Timeframe) -> Result<Self> {
        let mut fields = Vec::new();
        for field in BarField::ALL {
            if field == BarField::Spread {
                continue;
            }
            let name = field.column(tf);
            let idx = index
                .get(&name)
                .copied()
                .ok_or_else(|| Error::schema(format!("merged table has no '{name}' column")))?;
            fields.push((field, idx));
        }
        Ok(Self {
            fields,
            spread: index.get(&BarField::Spread.column(tf)).copied(),
        })
    }

    fn row(&self, record: &StringRecord, time: Timestamp, line: u64) -> Result<SeriesRow> {
        let mut bar = Bar {
            time,
            open: 0.0,
            high: 0.0,
            low: 0.0,
            close: 0.0,
            volume: 0.0,
            spread: None,
        };
        let mut log_return = 0.0;
        for &(field, idx) in &self.fields {
            let value = parse_number(record, idx, line)?;
            match field {
                BarField::Open => bar.open = value,
                BarField::High => bar.high = value,
                BarField::Low => bar.low = value,
                BarField::Close => bar.close = value,
                BarField::Vol => bar.volume = value,
                BarField::LogReturn => log_return = value,
                BarField::Spread => {}
            }
        }
        if let Some(idx) = self.spread {
            bar.spread = parse_optional(record, idx, line)?;
        }
        Ok(SeriesRow { bar, log_return })
    }
}

fn parse_number(record: &StringRecord, idx: usize, line: u64) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("");
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(Error::parse(format!(
            "line {line}: '{raw}' is not a finite number"
        ))),
    }
}

/// An empty or `NaN` cell is a missing value.
fn parse_optional(record: &StringRecord, idx: usize, line: u64) -> Result<Option<f64>> {
    let raw = record.get(idx).unwrap_or("");
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    parse_number(record, idx, line).map(Some)
}

fn parse_time(record: &StringRecord, idx: usize, line: u64) -> Result<Timestamp> {
    let raw = record.get(idx).unwrap_or("");
    parse_timestamp(raw, TABLE_DATETIME_FORMAT)
        .ok_or_else(|| Error::parse(format!("line {line}: cannot parse time '{raw}'")))
}

/// Read a merged table written by [`write_merged`] (or any file with the same columns).
pub fn read_merged<R: Read>(reader: R, fast: &Timeframe, slow: &Timeframe) -> Result<MergedTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let index: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_string(), i))
        .collect();

    let time_idx = index
        .get(TIME_COLUMN)
        .copied()
        .ok_or_else(|| Error::schema("merged table has no 'Time' column"))?;
    let slow_time_idx = index.get(&slow_time_column(slow)).copied();
    let fast_cols = SideColumns::resolve(&index, fast)?;
    let slow_cols = SideColumns::resolve(&index, slow)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let time = parse_time(&record, time_idx, line)?;
        let slow_time = match slow_time_idx {
            Some(idx) => parse_time(&record, idx, line)?,
            None => time,
        };
        rows.push(MergedRow {
            time,
            fast: fast_cols.row(&record, time, line)?,
            slow: slow_cols.row(&record, slow_time, line)?,
        });
    }

    let mut table = MergedTable::new(fast.clone(), slow.clone(), rows);
    if fast_cols.spread.is_some() {
        table = table.with_spread_column(Side::Fast);
    }
    if slow_cols.spread.is_some() {
        table = table.with_spread_column(Side::Slow);
    }
    table.check_order()?;
    Ok(table)
}

/// Read a merged table file.
pub fn read_merged_file(path: &Path, fast: &Timeframe, slow: &Timeframe) -> Result<MergedTable> {
    let file = std::fs::File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    read_merged(file, fast, slow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_row(time: Timestamp, close: f64, spread: Option<f64>) -> SeriesRow {
        SeriesRow {
            bar: Bar {
                time,
                open: close - 0.001,
                high: close + 0.002,
                low: close - 0.002,
                close,
                volume: 321.0,
                spread,
            },
            log_return: -0.000_731_5,
        }
    }

    fn sample_table() -> MergedTable {
        let fast = Timeframe::parse("15m").unwrap();
        let slow = Timeframe::parse("4h").unwrap();
        let rows = vec![
            MergedRow {
                time: 1_609_460_100,
                fast: series_row(1_609_460_100, 1.3655, Some(3.0)),
                slow: series_row(1_609_459_200, 1.3601, None),
            },
            MergedRow {
                time: 1_609_461_000,
                fast: series_row(1_609_461_000, 1.3671, None),
                slow: series_row(1_609_459_200, 1.3601, None),
            },
        ];
        MergedTable::new(fast, slow, rows)
    }

    #[test]
    fn test_header_layout() {
        let mut buf = Vec::new();
        write_merged(&mut buf, &sample_table()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let first = text.lines().next().unwrap();
        assert_eq!(
            first,
            "Time,Open15m,High15m,Low15m,Close15m,Vol15m,LogReturn15m,Spread15m,\
             Time4h,Open4h,High4h,Low4h,Close4h,Vol4h,LogReturn4h"
        );
        assert!(text.lines().nth(1).unwrap().starts_with("2021-01-01 00:15:00,"));
    }

    #[test]
    fn test_write_then_read() {
        let table = sample_table();
        let mut buf = Vec::new();
        write_merged(&mut buf, &table).unwrap();

        let read = read_merged(buf.as_slice(), &table.fast, &table.slow).unwrap();
        assert_eq!(read, table);
    }

    #[test]
    fn test_read_without_slow_time_falls_back() {
        let csv = "Time,Open15m,High15m,Low15m,Close15m,Vol15m,LogReturn15m,\
                   Open4h,High4h,Low4h,Close4h,Vol4h,LogReturn4h\n\
                   2021-01-01 00:15:00,1,1,1,1,5,0.01,2,2,2,2,50,0.02\n";
        let fast = Timeframe::parse("15m").unwrap();
        let slow = Timeframe::parse("4h").unwrap();
        let table = read_merged(csv.as_bytes(), &fast, &slow).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].slow.time(), table.rows[0].time);
        assert_eq!(table.rows[0].slow.log_return, 0.02);
    }

    const HEADER: &str = "Time,Open15m,High15m,Low15m,Close15m,Vol15m,LogReturn15m,Spread15m,\
                          Time4h,Open4h,High4h,Low4h,Close4h,Vol4h,LogReturn4h\n";

    fn read(body: &str) -> Result<MergedTable> {
        let fast = Timeframe::parse("15m").unwrap();
        let slow = Timeframe::parse("4h").unwrap();
        read_merged(format!("{HEADER}{body}").as_bytes(), &fast, &slow)
    }

    #[test]
    fn test_non_finite_value_is_parse_error() {
        let err = read(
            "2021-01-01 00:15:00,1,1,1,1,NaN,0.01,2,2021-01-01 00:00:00,2,2,2,2,50,0.02\n",
        )
        .unwrap_err();
        match err {
            Error::Parse(msg) => assert!(msg.contains("NaN")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            read("2021-01-01 00:15:00,1,1,1,1,5,inf,2,2021-01-01 00:00:00,2,2,2,2,50,0.02\n"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_empty_or_nan_spread_is_missing() {
        let table = read(
            "2021-01-01 00:15:00,1,1,1,1,5,0.01,,2021-01-01 00:00:00,2,2,2,2,50,0.02\n\
             2021-01-01 00:30:00,1,1,1,1,5,0.01,NaN,2021-01-01 00:00:00,2,2,2,2,50,0.02\n",
        )
        .unwrap();
        assert!(table.rows.iter().all(|r| r.fast.bar.spread.is_none()));
        // The column stays declared even though no row fills it.
        assert!(table.has_spread(Side::Fast));
        assert!(table.resolve_column("Spread15m").is_some());
    }

    #[test]
    fn test_unordered_or_look_ahead_rows_rejected() {
        let descending = "2021-01-01 00:30:00,1,1,1,1,5,0.01,2,2021-01-01 00:00:00,2,2,2,2,50,0.02\n\
                          2021-01-01 00:15:00,1,1,1,1,5,0.01,2,2021-01-01 00:00:00,2,2,2,2,50,0.02\n";
        assert!(matches!(read(descending), Err(Error::Data(_))));

        let look_ahead =
            "2021-01-01 00:15:00,1,1,1,1,5,0.01,2,2021-01-01 04:00:00,2,2,2,2,50,0.02\n";
        assert!(matches!(read(look_ahead), Err(Error::Data(_))));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let csv = "Time,Open15m,High15m,Low15m,Close15m,Vol15m,LogReturn15m\n";
        let fast = Timeframe::parse("15m").unwrap();
        let slow = Timeframe::parse("4h").unwrap();
        assert!(matches!(
            read_merged(csv.as_bytes(), &fast, &slow),
            Err(Error::Schema(_))
        ));
    }
}
