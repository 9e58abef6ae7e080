//! CSV price data adapter.
//!
//! One file per ticker under the base directory, `<TICKER>.csv`, columns
//! `Date,Open,High,Low,Close,Volume,Error`. A row with an unparsable price or
//! volume is kept with its error flag set, so downstream counters can tell
//! "bar missing" from "bar present but bad".

use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

use crate::domain::bar::{Bar, BarSeries};
use crate::domain::error::EarntraderError;
use crate::ports::data_port::DataPort;

pub struct CsvBarAdapter {
    base_path: PathBuf,
}

impl CsvBarAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker.to_uppercase()))
    }
}

impl DataPort for CsvBarAdapter {
    fn load_series(&self, ticker: &str) -> Result<BarSeries, EarntraderError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| EarntraderError::BarData {
            ticker: ticker.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in reader.records() {
            let record = result.map_err(|e| EarntraderError::BarData {
                ticker: ticker.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(0).ok_or_else(|| EarntraderError::BarData {
                ticker: ticker.to_string(),
                reason: "missing date column".into(),
            })?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                EarntraderError::BarData {
                    ticker: ticker.to_string(),
                    reason: format!("invalid date {date_str}: {e}"),
                }
            })?;

            let open = parse_price(&record, 1);
            let high = parse_price(&record, 2);
            let low = parse_price(&record, 3);
            let close = parse_price(&record, 4);
            let volume = parse_volume(&record, 5);
            let flagged = matches!(record.get(6).map(str::trim), Some("1") | Some("true"));

            let error = flagged
                || open.is_none()
                || high.is_none()
                || low.is_none()
                || close.is_none()
                || volume.is_none();

            bars.push(Bar {
                date,
                open: open.unwrap_or(0.0),
                high: high.unwrap_or(0.0),
                low: low.unwrap_or(0.0),
                close: close.unwrap_or(0.0),
                volume: volume.unwrap_or(0),
                error,
            });
        }

        Ok(BarSeries::new(bars))
    }

    fn list_tickers(&self) -> Result<Vec<String>, EarntraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| EarntraderError::BarData {
            ticker: "*".to_string(),
            reason: format!("failed to read directory {}: {}", self.base_path.display(), e),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(EarntraderError::Io)?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(ticker) = name.strip_suffix(".csv") {
                tickers.push(ticker.to_uppercase());
            }
        }

        tickers.sort();
        Ok(tickers)
    }
}

/// A price must be present, numeric, and non-zero.
fn parse_price(record: &csv::StringRecord, index: usize) -> Option<f64> {
    let value: f64 = record.get(index)?.trim().parse().ok()?;
    if value == 0.0 || value.is_nan() {
        None
    } else {
        Some(value)
    }
}

fn parse_volume(record: &csv::StringRecord, index: usize) -> Option<i64> {
    let raw = record.get(index)?.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    // Some sources export volume as a float.
    let v: f64 = raw.parse().ok()?;
    if v.is_nan() { None } else { Some(v.round() as i64) }
}
