//! Pipeline tests with real files on disk: INI config, CSV bars, CSV events,
//! snapshot reuse.

mod common;

use common::*;

use earntrader::adapters::csv_bar_adapter::CsvBarAdapter;
use earntrader::adapters::csv_event_adapter::{CsvEventAdapter, EventSourceSpec};
use earntrader::adapters::file_config_adapter::FileConfigAdapter;
use earntrader::adapters::snapshot::EventSnapshotStore;
use earntrader::cli;
use earntrader::domain::bar::BarStore;
use earntrader::domain::calendar::Calendar;
use earntrader::domain::config_validation::{
    validate_backtest_config, validate_strategy_config,
};
use earntrader::domain::validate::EventValidator;
use earntrader::ports::data_port::DataPort;
use earntrader::ports::event_port::EventPort;
use std::fs;
use std::path::Path;

fn write_bar_csv(dir: &Path, ticker: &str, bars: &[earntrader::domain::bar::Bar]) {
    let mut content = String::from("Date,Open,High,Low,Close,Volume,Error\n");
    for bar in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            bar.date.format("%Y-%m-%d"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
            if bar.error { 1 } else { 0 },
        ));
    }
    fs::write(dir.join(format!("{ticker}.csv")), content).unwrap();
}

fn write_estimize_events(path: &Path, rows: &[&str]) {
    let mut content =
        String::from("ticker,date,reports,epsWallStreet,epsActual,revWallStreet,revActual\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(path, content).unwrap();
}

#[test]
fn config_file_round_trip_validates() {
    let dir = tempfile::TempDir::new().unwrap();
    let config_path = dir.path().join("earntrader.ini");
    fs::write(
        &config_path,
        "[backtest]\n\
         start_date = 2018-03-01\n\
         end_date = 2018-03-14\n\
         starting_balance = 10000\n\
         day_margin = 4\n\
         overnight_margin = 4\n\
         slippage = 0.0\n\
         broker = ib_cfd\n\
         data_dir = data\n\
         events = estimize\n\
         events_file = events.csv\n\
         \n\
         [strategy]\n\
         price_min = 5\n\
         price_max = 100\n\
         portfolio_size = 20\n\
         max_volume = 15000\n\
         long_same_day = false\n",
    )
    .unwrap();

    let adapter = cli::load_config(&config_path).unwrap();
    assert!(validate_backtest_config(&adapter).is_ok());
    assert!(validate_strategy_config(&adapter).is_ok());
}

#[test]
fn load_config_missing_file_fails() {
    assert!(cli::load_config(Path::new("/nonexistent/earntrader.ini")).is_err());
}

#[test]
fn csv_pipeline_loads_store_and_events() {
    let dir = tempfile::TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    fs::create_dir(&data_dir).unwrap();
    write_bar_csv(
        &data_dir,
        "AAPL",
        &history_with(
            "2018-01-02",
            60,
            50.0,
            500_000,
            vec![make_bar("2018-03-05", 50.0, 51.0, 49.5, 50.5, 500_000)],
        ),
    );
    write_bar_csv(&data_dir, "MSFT", &quiet_history("2018-01-02", 60, 40.0, 300_000));

    let events_path = dir.path().join("events.csv");
    write_estimize_events(
        &events_path,
        &[
            "AAPL,2018-03-05,BMO,1.00,1.20,100,110",
            // Saturday announcement: dropped with the holiday counter.
            "MSFT,2018-03-03,AMC,1.00,1.10,50,55",
        ],
    );

    let data_port = CsvBarAdapter::new(data_dir);
    let tickers = data_port.list_tickers().unwrap();
    assert_eq!(tickers, vec!["AAPL", "MSFT"]);
    let store = BarStore::populate(&data_port, &tickers).unwrap();
    assert_eq!(store.ticker_count(), 2);

    let calendar = Calendar::default();
    let mut validator = EventValidator::new(&calendar, &store);
    let adapter = CsvEventAdapter::new(
        events_path,
        EventSourceSpec::builtin("estimize").unwrap(),
    );
    let book = adapter.load_events(&mut validator).unwrap();

    assert_eq!(book.event_count(), 1);
    assert_eq!(validator.counters.valid_events, 1);
    assert_eq!(validator.counters.holiday_events, 1);
    assert!(book.by_entry_date.contains_key(&date("2018-03-05")));
}

#[test]
fn snapshot_skips_revalidation_until_source_changes() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_with(vec![(
        "AAPL",
        quiet_history("2018-01-02", 60, 50.0, 500_000),
    )]);
    let calendar = Calendar::default();

    let events_path = dir.path().join("events.csv");
    write_estimize_events(&events_path, &["AAPL,2018-03-05,BMO,1.00,1.20,100,110"]);

    // First pass validates and saves.
    let mut validator = EventValidator::new(&calendar, &store);
    let adapter = CsvEventAdapter::new(
        events_path.clone(),
        EventSourceSpec::builtin("estimize").unwrap(),
    );
    let book = adapter.load_events(&mut validator).unwrap();
    let snapshot = EventSnapshotStore::new(dir.path(), "estimize");
    let hash = EventSnapshotStore::content_hash(&events_path, "estimize").unwrap();
    snapshot.save(&hash, &book, &validator.counters).unwrap();

    // Second pass hits the snapshot with identical content.
    let (cached_book, cached_counters) = snapshot.load(&hash).unwrap();
    assert_eq!(cached_book.event_count(), book.event_count());
    assert_eq!(cached_counters, validator.counters);

    // Growing the file changes the hash and misses.
    write_estimize_events(
        &events_path,
        &[
            "AAPL,2018-03-05,BMO,1.00,1.20,100,110",
            "AAPL,2018-03-06,BMO,1.00,1.30,100,120",
        ],
    );
    let new_hash = EventSnapshotStore::content_hash(&events_path, "estimize").unwrap();
    assert_ne!(hash, new_hash);
    assert!(snapshot.load(&new_hash).is_none());
}
