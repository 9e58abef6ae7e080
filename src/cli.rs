//! CLI definition and dispatch.

use chrono::Datelike;
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_bar_adapter::CsvBarAdapter;
use crate::adapters::csv_event_adapter::{self, CsvEventAdapter, EventSourceSpec};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::snapshot::EventSnapshotStore;
use crate::adapters::text_report_adapter::{self, TextReportAdapter};
use crate::domain::bar::BarStore;
use crate::domain::broker::{Broker, BrokerProfile};
use crate::domain::calendar::Calendar;
use crate::domain::config_validation::{
    parse_date, validate_backtest_config, validate_strategy_config,
};
use crate::domain::engine::Engine;
use crate::domain::error::EarntraderError;
use crate::domain::ledger::LedgerConfig;
use crate::domain::policy::{EarningsConfig, EarningsPolicy};
use crate::domain::report::RunInfo;
use crate::domain::validate::{EventCounters, EventValidator};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::event_port::{EventBook, EventPort};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "earntrader", about = "Earnings-surprise event backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Also write the report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Revalidate events even when a fresh snapshot exists
        #[arg(long)]
        no_cache: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Export validated events in the canonical column layout
    DumpEvents {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    match cli.command {
        Command::Backtest {
            config,
            output,
            no_cache,
        } => run_backtest(&config, output.as_deref(), no_cache),
        Command::Validate { config } => run_validate(&config),
        Command::DumpEvents { config, output } => run_dump_events(&config, &output),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = EarntraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_backtest(config_path: &Path, output_path: Option<&Path>, no_cache: bool) -> ExitCode {
    let loaded = match load_validated(config_path) {
        Ok(l) => l,
        Err(code) => return code,
    };

    eprintln!(
        "Running backtest {}..{} with {} events",
        loaded.ledger_config.start_date,
        loaded.ledger_config.end_date,
        loaded.book.event_count(),
    );
    let events_feed = loaded.events_feed.clone();
    let data_dir = loaded.data_dir.display().to_string();
    let engine = Engine::new(
        loaded.ledger_config,
        RunInfo {
            data_feed: data_dir,
            events_feed,
        },
        loaded.calendar,
        loaded.store,
        loaded.book.by_entry_date,
        loaded.counters,
        loaded.broker,
        EarningsPolicy::new(loaded.earnings_config),
    );
    let result = engine.run();

    print!("{}", text_report_adapter::render(&result.report));
    if let Some(path) = output_path {
        if let Err(e) = TextReportAdapter.write(&result.report, path) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Report written to {}", path.display());
    }

    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    for result in [
        validate_backtest_config(&adapter),
        validate_strategy_config(&adapter),
    ] {
        if let Err(e) = result {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }
    eprintln!("Configuration OK");
    ExitCode::SUCCESS
}

fn run_dump_events(config_path: &Path, output_path: &Path) -> ExitCode {
    let loaded = match load_validated(config_path) {
        Ok(l) => l,
        Err(code) => return code,
    };
    if let Err(e) = csv_event_adapter::dump_events(&loaded.book, output_path) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    eprintln!(
        "Dumped {} events to {}",
        loaded.book.event_count(),
        output_path.display()
    );
    ExitCode::SUCCESS
}

/// Everything the engine needs, assembled from one config file.
struct LoadedRun {
    ledger_config: LedgerConfig,
    earnings_config: EarningsConfig,
    calendar: Calendar,
    store: BarStore,
    broker: Broker,
    book: EventBook,
    counters: EventCounters,
    events_feed: String,
    data_dir: PathBuf,
}

fn load_validated(config_path: &Path) -> Result<LoadedRun, ExitCode> {
    // Stage 1: load and validate config.
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    for result in [
        validate_backtest_config(&adapter),
        validate_strategy_config(&adapter),
    ] {
        if let Err(e) = result {
            eprintln!("error: {e}");
            return Err((&e).into());
        }
    }

    build_run(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        (&e).into()
    })
}

fn build_run(config: &dyn ConfigPort) -> Result<LoadedRun, EarntraderError> {
    let ledger_config = build_ledger_config(config)?;
    let earnings_config = build_earnings_config(config);
    let broker = build_broker(config)?;

    // Stage 2: materialize the bar store before anything reads it.
    let data_dir = PathBuf::from(
        config
            .get_string("backtest", "data_dir")
            .unwrap_or_default(),
    );
    let data_port = CsvBarAdapter::new(data_dir.clone());
    let tickers = data_port.list_tickers()?;
    eprintln!("Loading {} price series from {}", tickers.len(), data_dir.display());
    let store = BarStore::populate(&data_port, &tickers)?;

    // Stage 3: calendar spanning the run, padded a year each side so date
    // rolls near New Year resolve.
    let calendar = Calendar::us_federal(
        ledger_config.start_date.year() - 1..=ledger_config.end_date.year() + 1,
    );

    // Stage 4: events, via snapshot when fresh.
    let events_feed = config
        .get_string("backtest", "events")
        .unwrap_or_default();
    let use_cache = config.get_bool("backtest", "events_cache", true);
    let (book, counters) =
        load_event_book(config, &calendar, &store, &data_dir, use_cache)?;
    eprintln!(
        "Validated {} events across {} tickers",
        book.event_count(),
        book.tickers.len()
    );

    Ok(LoadedRun {
        ledger_config,
        earnings_config,
        calendar,
        store,
        broker,
        book,
        counters,
        events_feed,
        data_dir,
    })
}

fn build_ledger_config(config: &dyn ConfigPort) -> Result<LedgerConfig, EarntraderError> {
    Ok(LedgerConfig {
        start_date: parse_date(
            config.get_string("backtest", "start_date").as_deref(),
            "start_date",
        )?,
        end_date: parse_date(
            config.get_string("backtest", "end_date").as_deref(),
            "end_date",
        )?,
        starting_balance: config.get_double("backtest", "starting_balance", 10_000.0),
        day_margin: config.get_double("backtest", "day_margin", 1.0),
        overnight_margin: config.get_double("backtest", "overnight_margin", 1.0),
        slippage_per_share: config.get_double("backtest", "slippage", 0.0),
    })
}

fn build_earnings_config(config: &dyn ConfigPort) -> EarningsConfig {
    let defaults = EarningsConfig::default();
    EarningsConfig {
        price_range: (
            config.get_double("strategy", "price_min", defaults.price_range.0),
            config.get_double("strategy", "price_max", defaults.price_range.1),
        ),
        min_avg_volume: config.get_double(
            "strategy",
            "min_avg_volume",
            defaults.min_avg_volume,
        ),
        portfolio_size: config.get_int(
            "strategy",
            "portfolio_size",
            defaults.portfolio_size as i64,
        ) as usize,
        portfolio_risk: config.get_double(
            "strategy",
            "portfolio_risk",
            defaults.portfolio_risk,
        ),
        max_volume: config.get_int("strategy", "max_volume", defaults.max_volume),
        long_same_day: config.get_bool("strategy", "long_same_day", defaults.long_same_day),
    }
}

fn build_broker(config: &dyn ConfigPort) -> Result<Broker, EarntraderError> {
    let name = config
        .get_string("backtest", "broker")
        .ok_or_else(|| EarntraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "broker".to_string(),
        })?;
    let profile =
        BrokerProfile::parse(&name).ok_or(EarntraderError::UnsupportedBroker(name))?;

    if profile.uses_availability_list() {
        if let Some(list_path) = config.get_string("backtest", "broker_shares") {
            let tickers = load_ticker_list(Path::new(&list_path))?;
            eprintln!("Loaded {} tradable tickers from {list_path}", tickers.len());
            return Ok(Broker::with_availability(profile, tickers));
        }
    }
    Ok(Broker::new(profile))
}

/// One ticker per line, optional `ticker` header.
fn load_ticker_list(path: &Path) -> Result<HashSet<String>, EarntraderError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case("ticker"))
        .map(str::to_uppercase)
        .collect())
}

fn load_event_book(
    config: &dyn ConfigPort,
    calendar: &Calendar,
    store: &BarStore,
    data_dir: &Path,
    use_cache: bool,
) -> Result<(EventBook, EventCounters), EarntraderError> {
    let source_id = config
        .get_string("backtest", "events")
        .unwrap_or_default();
    let spec = EventSourceSpec::builtin(&source_id)
        .ok_or_else(|| EarntraderError::UnsupportedEventSource(source_id.clone()))?;
    let events_file = PathBuf::from(
        config
            .get_string("backtest", "events_file")
            .unwrap_or_default(),
    );

    let snapshot = EventSnapshotStore::new(data_dir, spec.id);
    let salt = format!("{}:{}", spec.id, data_dir.display());
    let hash = if use_cache {
        EventSnapshotStore::content_hash(&events_file, &salt).ok()
    } else {
        None
    };
    if let Some(hash) = &hash {
        if let Some(cached) = snapshot.load(hash) {
            return Ok(cached);
        }
    }

    let mut validator = EventValidator::new(calendar, store);
    let adapter = CsvEventAdapter::new(events_file, spec);
    let book = adapter.load_events(&mut validator)?;
    let counters = validator.counters;

    if let Some(hash) = &hash {
        if let Err(e) = snapshot.save(hash, &book, &counters) {
            tracing::warn!(target: "hypercache", error = %e, "snapshot save failed");
        }
    }
    Ok((book, counters))
}
