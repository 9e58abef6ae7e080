#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use earntrader::domain::bar::{Bar, BarSeries, BarStore};
use earntrader::domain::broker::{Broker, BrokerProfile};
use earntrader::domain::calendar::Calendar;
use earntrader::domain::error::EarntraderError;
use earntrader::domain::event::{Event, Surprise, Timing, ValidEvent};
use earntrader::domain::ledger::LedgerConfig;
use earntrader::domain::policy::EarningsConfig;
use earntrader::ports::data_port::DataPort;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(d: &str, open: f64, high: f64, low: f64, close: f64, volume: i64) -> Bar {
    Bar {
        date: date(d),
        open,
        high,
        low,
        close,
        volume,
        error: false,
    }
}

/// Flat quiet bars over consecutive trading days, so the average-volume
/// window is full well before the interesting dates.
pub fn quiet_history(from: &str, days: usize, price: f64, volume: i64) -> Vec<Bar> {
    let calendar = Calendar::default();
    let mut bars = Vec::with_capacity(days);
    let mut day = date(from);
    for _ in 0..days {
        bars.push(Bar {
            date: day,
            open: price,
            high: price + 1.0,
            low: price - 1.0,
            close: price + 0.5,
            volume,
            error: false,
        });
        day = calendar.next_trading_day(day);
    }
    bars
}

/// `quiet_history` with specific bars substituted by date.
pub fn history_with(from: &str, days: usize, price: f64, volume: i64, overrides: Vec<Bar>) -> Vec<Bar> {
    let by_date: HashMap<NaiveDate, Bar> =
        overrides.into_iter().map(|b| (b.date, b)).collect();
    quiet_history(from, days, price, volume)
        .into_iter()
        .map(|bar| by_date.get(&bar.date).cloned().unwrap_or(bar))
        .collect()
}

pub fn store_with(series: Vec<(&str, Vec<Bar>)>) -> BarStore {
    let mut store = BarStore::new();
    for (ticker, bars) in series {
        store.insert(ticker, BarSeries::new(bars));
    }
    store
}

pub fn eps_rev_event(
    ticker: &str,
    announced: &str,
    timing: Timing,
    eps: (f64, f64),
    rev: (f64, f64),
) -> Event {
    Event {
        ticker: ticker.to_string(),
        date: date(announced),
        timing,
        surprise: Surprise::eps_and_revenue(Some(eps.0), Some(eps.1), Some(rev.0), Some(rev.1))
            .unwrap(),
    }
}

pub fn bucket_of(events: Vec<ValidEvent>) -> BTreeMap<NaiveDate, Vec<ValidEvent>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<ValidEvent>> = BTreeMap::new();
    for event in events {
        buckets.entry(event.entry_date).or_default().push(event);
    }
    buckets
}

pub fn ledger_config(start: &str, end: &str) -> LedgerConfig {
    LedgerConfig {
        start_date: date(start),
        end_date: date(end),
        starting_balance: 10_000.0,
        day_margin: 1.0,
        overnight_margin: 1.0,
        slippage_per_share: 0.0,
    }
}

pub fn earnings_config() -> EarningsConfig {
    EarningsConfig {
        price_range: (5.0, 100.0),
        min_avg_volume: 0.0,
        portfolio_size: 20,
        portfolio_risk: 1.0,
        max_volume: 15_000,
        long_same_day: true,
    }
}

pub fn ib_cfd() -> Broker {
    Broker::new(BrokerProfile::IbCfd)
}

/// In-memory data port for store-population tests.
pub struct MockDataPort {
    pub series: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.series.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_series(&self, ticker: &str) -> Result<BarSeries, EarntraderError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(EarntraderError::BarData {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(BarSeries::new(
            self.series.get(ticker).cloned().unwrap_or_default(),
        ))
    }

    fn list_tickers(&self) -> Result<Vec<String>, EarntraderError> {
        let mut tickers: Vec<String> = self.series.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }
}
