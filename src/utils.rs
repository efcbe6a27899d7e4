//! Timestamp normalization and JSON persistence.
//!
//! The engine only knows integer epoch seconds. Dates coming from files are
//! normalized here, once, with [`parse_timestamp`].

use chrono::NaiveDateTime;

use crate::errors::{Error, Result};

/// Textual date format accepted besides epoch seconds, read as UTC.
pub const DATE_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// Parses an epoch seconds integer or a [`DATE_FORMAT`] date.
///
/// ### Returns
/// The epoch timestamp, or [`Error::InvalidTimestamp`] for any other form.
///
/// ### Example
/// ```rust
/// use bts_ml::utils::parse_timestamp;
///
/// assert_eq!(parse_timestamp("1704189600").unwrap(), 1_704_189_600);
/// assert_eq!(parse_timestamp("01/02/2024 10:00:00 AM").unwrap(), 1_704_189_600);
/// assert!(parse_timestamp("2024-01-02").is_err());
/// ```
pub fn parse_timestamp(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(epoch) = value.parse::<i64>() {
        return Ok(epoch);
    }
    NaiveDateTime::parse_from_str(value, DATE_FORMAT)
        .map(|date| date.and_utc().timestamp())
        .map_err(|_| Error::InvalidTimestamp(value.to_string()))
}

#[cfg(feature = "serde")]
pub use self::json::*;

#[cfg(feature = "serde")]
mod json {
    use std::{
        fs::File,
        io::{BufReader, BufWriter, Write},
        path::Path,
    };

    use serde::Deserialize;

    use super::parse_timestamp;
    use crate::engine::{BarBuilder, BarSeries, Trade};
    use crate::errors::Result;
    use crate::metrics::Summary;

    // { "date": "01/02/2024 10:00:00 AM", "open": 100.0, "high": 101.5, "low": 99.5, "close": 101.0 }
    // { "date": 1704189600, ... }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Date {
        Epoch(i64),
        Text(String),
    }

    #[derive(Deserialize)]
    struct Record {
        #[serde(alias = "timestamp", alias = "time")]
        date: Date,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    }

    /// Reads bar records from a JSON array and returns the bar series.
    pub fn get_bars_from_file(filepath: impl AsRef<Path>) -> Result<BarSeries> {
        let reader = BufReader::new(File::open(filepath)?);
        let records: Vec<Record> = serde_json::from_reader(reader)?;

        let bars = records
            .into_iter()
            .map(|record| {
                let timestamp = match record.date {
                    Date::Epoch(epoch) => epoch,
                    Date::Text(text) => parse_timestamp(&text)?,
                };
                BarBuilder::builder()
                    .timestamp(timestamp)
                    .open(record.open)
                    .high(record.high)
                    .low(record.low)
                    .close(record.close)
                    .build()
            })
            .collect::<Result<Vec<_>>>()?;

        BarSeries::new(bars)
    }

    /// Writes the trade log as a JSON array.
    pub fn write_trades(filepath: impl AsRef<Path>, trades: &[Trade]) -> Result<()> {
        let mut writer = BufWriter::new(File::create(filepath)?);
        serde_json::to_writer_pretty(&mut writer, trades)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes the summary as a JSON object. Undefined ratios are `null`.
    pub fn write_summary(filepath: impl AsRef<Path>, summary: &Summary) -> Result<()> {
        let mut writer = BufWriter::new(File::create(filepath)?);
        serde_json::to_writer_pretty(&mut writer, summary)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[test]
fn epoch_and_text_dates() {
    assert_eq!(parse_timestamp(" 42 ").unwrap(), 42);
    assert_eq!(parse_timestamp("-5").unwrap(), -5);
    assert_eq!(parse_timestamp("01/02/2024 04:10:00 PM").unwrap(), 1_704_211_800);
    assert_eq!(parse_timestamp("01/02/2024 12:00:00 AM").unwrap(), 1_704_153_600);
}

#[cfg(test)]
#[test]
fn rejected_dates() {
    for value in ["", "2024-01-02T10:00:00Z", "13/02/2024 10:00:00 AM", "12.5"] {
        assert!(matches!(parse_timestamp(value), Err(Error::InvalidTimestamp(_))));
    }
}
