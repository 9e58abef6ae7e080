//! Daily OHLCV bars and the per-ticker bar store.
//!
//! Bars are immutable once loaded. A [`BarSeries`] keeps one ticker's bars in
//! date order with an index for O(1) date lookup and a rolling average-volume
//! series computed at construction. The [`BarStore`] is the explicit cache the
//! simulation reads from; it is fully populated before a run starts.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::domain::error::EarntraderError;
use crate::ports::data_port::DataPort;

/// Window for the rolling average-volume series used by the volume filter.
pub const AVG_VOLUME_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// Set by the loader when any price/volume field was absent or not a number.
    pub error: bool,
}

/// Date-ordered daily bars for a single ticker.
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    bars: Vec<Bar>,
    date_index: HashMap<NaiveDate, usize>,
    avg_volume: Vec<Option<f64>>,
}

impl BarSeries {
    pub fn new(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        let avg_volume = rolling_mean_volume(&bars, AVG_VOLUME_WINDOW);
        Self {
            bars,
            date_index,
            avg_volume,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Bar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    /// Rolling mean volume ending at `date`, or `None` until the window fills.
    pub fn avg_volume(&self, date: NaiveDate) -> Option<f64> {
        self.date_index
            .get(&date)
            .and_then(|&i| self.avg_volume[i])
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }
}

fn rolling_mean_volume(bars: &[Bar], window: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(bars.len());
    let mut sum = 0i64;
    for (i, bar) in bars.iter().enumerate() {
        sum += bar.volume;
        if i + 1 > window {
            sum -= bars[i - window].volume;
        }
        if i + 1 >= window {
            out.push(Some(sum as f64 / window as f64));
        } else {
            out.push(None);
        }
    }
    out
}

/// All loaded price series, keyed by ticker. Populated once, read-only during
/// a run.
#[derive(Debug, Default)]
pub struct BarStore {
    series: HashMap<String, BarSeries>,
}

impl BarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: &str, series: BarSeries) {
        self.series.insert(ticker.to_uppercase(), series);
    }

    pub fn series(&self, ticker: &str) -> Option<&BarSeries> {
        self.series.get(&ticker.to_uppercase())
    }

    pub fn bar(&self, ticker: &str, date: NaiveDate) -> Option<&Bar> {
        self.series(ticker).and_then(|s| s.get(date))
    }

    pub fn avg_volume(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        self.series(ticker).and_then(|s| s.avg_volume(date))
    }

    pub fn ticker_count(&self) -> usize {
        self.series.len()
    }

    /// Population phase: load every ticker through the data port. A ticker
    /// that fails to load gets an empty series so later lookups report a data
    /// gap instead of aborting the run.
    pub fn populate(
        port: &dyn DataPort,
        tickers: &[String],
    ) -> Result<Self, EarntraderError> {
        let mut store = Self::new();
        for ticker in tickers {
            match port.load_series(ticker) {
                Ok(series) => store.insert(ticker, series),
                Err(e) => {
                    tracing::warn!(target: "history_download_error", ticker = %ticker, error = %e, "no price series loaded");
                    store.insert(ticker, BarSeries::empty());
                }
            }
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bar(date: &str, volume: i64) -> Bar {
        Bar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: 10.0,
            high: 11.0,
            low: 9.0,
            close: 10.5,
            volume,
            error: false,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn series_sorts_and_indexes_by_date() {
        let series = BarSeries::new(vec![
            make_bar("2018-03-07", 100),
            make_bar("2018-03-05", 200),
            make_bar("2018-03-06", 300),
        ]);

        assert_eq!(series.len(), 3);
        assert_eq!(series.bars()[0].date, date("2018-03-05"));
        assert_eq!(series.get(date("2018-03-06")).unwrap().volume, 300);
        assert!(series.get(date("2018-03-08")).is_none());
    }

    #[test]
    fn avg_volume_none_until_window_fills() {
        let bars: Vec<Bar> = (0..AVG_VOLUME_WINDOW + 5)
            .map(|i| Bar {
                date: date("2018-01-01") + chrono::Duration::days(i as i64),
                volume: 1000,
                ..make_bar("2018-01-01", 0)
            })
            .collect();
        let series = BarSeries::new(bars);

        assert!(series.avg_volume(date("2018-01-01")).is_none());
        assert!(
            series
                .avg_volume(date("2018-01-01") + chrono::Duration::days(AVG_VOLUME_WINDOW as i64 - 2))
                .is_none()
        );
        let first_full =
            date("2018-01-01") + chrono::Duration::days(AVG_VOLUME_WINDOW as i64 - 1);
        assert_eq!(series.avg_volume(first_full), Some(1000.0));
    }

    #[test]
    fn avg_volume_is_windowed_mean() {
        let bars: Vec<Bar> = (0..AVG_VOLUME_WINDOW + 1)
            .map(|i| Bar {
                date: date("2018-01-01") + chrono::Duration::days(i as i64),
                volume: i as i64,
                ..make_bar("2018-01-01", 0)
            })
            .collect();
        let series = BarSeries::new(bars);

        // Window over volumes 0..=19 -> mean 9.5; over 1..=20 -> mean 10.5.
        let d0 = date("2018-01-01") + chrono::Duration::days(AVG_VOLUME_WINDOW as i64 - 1);
        let d1 = d0 + chrono::Duration::days(1);
        assert_eq!(series.avg_volume(d0), Some(9.5));
        assert_eq!(series.avg_volume(d1), Some(10.5));
    }

    #[test]
    fn store_lookup_is_case_insensitive() {
        let mut store = BarStore::new();
        store.insert("aapl", BarSeries::new(vec![make_bar("2018-03-05", 100)]));

        assert!(store.bar("AAPL", date("2018-03-05")).is_some());
        assert!(store.bar("aapl", date("2018-03-05")).is_some());
        assert!(store.bar("MSFT", date("2018-03-05")).is_none());
        assert_eq!(store.ticker_count(), 1);
    }

    #[test]
    fn empty_series_has_no_bars() {
        let series = BarSeries::empty();
        assert!(series.is_empty());
        assert!(series.get(date("2018-03-05")).is_none());
        assert!(series.avg_volume(date("2018-03-05")).is_none());
    }
}
