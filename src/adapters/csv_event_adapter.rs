//! CSV earnings-event adapter.
//!
//! Every source shares one ingestion path; what differs between providers is
//! data, not code: a per-source column map, date format, and whether the
//! announcement timing comes from a column or is inferred by comparing the
//! announcement day's volume with the next trading day's.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::EarntraderError;
use crate::domain::event::{Event, RawEvent, Surprise, Timing};
use crate::ports::event_port::{EventBook, EventPort};
use crate::domain::validate::EventValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    EpsOnly,
    EpsAndRevenue,
}

/// Which source columns feed which canonical event fields.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub ticker: &'static str,
    pub date: &'static str,
    pub date_format: &'static str,
    /// `None`: no timing column; infer BMO/AMC from volume.
    pub timing: Option<&'static str>,
    pub eps_consensus: &'static str,
    pub eps_actual: &'static str,
    pub rev_consensus: Option<&'static str>,
    pub rev_actual: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct EventSourceSpec {
    pub id: &'static str,
    pub kind: SourceKind,
    pub columns: ColumnMap,
    /// Scrub exchange suffixes and share-class dots from tickers.
    pub clean_tickers: bool,
}

impl EventSourceSpec {
    /// Column maps for the known providers.
    pub fn builtin(id: &str) -> Option<Self> {
        match id {
            "estimize" => Some(EventSourceSpec {
                id: "estimize",
                kind: SourceKind::EpsAndRevenue,
                columns: ColumnMap {
                    ticker: "ticker",
                    date: "date",
                    date_format: "%Y-%m-%d",
                    timing: Some("reports"),
                    eps_consensus: "epsWallStreet",
                    eps_actual: "epsActual",
                    rev_consensus: Some("revWallStreet"),
                    rev_actual: Some("revActual"),
                },
                clean_tickers: false,
            }),
            "tos" => Some(EventSourceSpec {
                id: "tos",
                kind: SourceKind::EpsOnly,
                columns: ColumnMap {
                    ticker: "ticker",
                    date: "date",
                    date_format: "%Y-%m-%d",
                    timing: Some("reports"),
                    eps_consensus: "eps_con",
                    eps_actual: "eps_act",
                    rev_consensus: None,
                    rev_actual: None,
                },
                clean_tickers: false,
            }),
            "zacks" => Some(EventSourceSpec {
                id: "zacks",
                kind: SourceKind::EpsAndRevenue,
                columns: ColumnMap {
                    ticker: "ticker",
                    date: "date",
                    date_format: "%Y-%m-%d",
                    timing: Some("reports"),
                    eps_consensus: "epsEst",
                    eps_actual: "epsAct",
                    rev_consensus: Some("revEst"),
                    rev_actual: Some("revAct"),
                },
                clean_tickers: false,
            }),
            "ib" => Some(EventSourceSpec {
                id: "ib",
                kind: SourceKind::EpsAndRevenue,
                columns: ColumnMap {
                    ticker: "ticker",
                    date: "date",
                    date_format: "%Y-%m-%d",
                    timing: Some("reports"),
                    eps_consensus: "eps_con",
                    eps_actual: "eps_act",
                    rev_consensus: Some("rev_con"),
                    rev_actual: Some("rev_act"),
                },
                clean_tickers: false,
            }),
            "portfolio123" => Some(EventSourceSpec {
                id: "portfolio123",
                kind: SourceKind::EpsAndRevenue,
                columns: ColumnMap {
                    ticker: "Ticker",
                    date: "@date_",
                    date_format: "%Y-%m-%d",
                    timing: None,
                    eps_consensus: "@est_eps",
                    eps_actual: "@act_eps",
                    rev_consensus: Some("@est_sales"),
                    rev_actual: Some("@act_sales"),
                },
                clean_tickers: true,
            }),
            _ => None,
        }
    }
}

pub struct CsvEventAdapter {
    path: PathBuf,
    spec: EventSourceSpec,
}

impl CsvEventAdapter {
    pub fn new(path: PathBuf, spec: EventSourceSpec) -> Self {
        Self { path, spec }
    }

    fn data_error(&self, reason: String) -> EarntraderError {
        EarntraderError::EventData {
            file: self.path.display().to_string(),
            reason,
        }
    }

    fn column<'h>(
        &self,
        headers: &'h csv::StringRecord,
        name: &str,
    ) -> Result<usize, EarntraderError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| self.data_error(format!("missing column {name}")))
    }

    /// `None` when the ticker is untradable (share classes, warrants).
    fn clean_ticker(&self, raw: &str) -> Option<String> {
        let mut ticker = raw.trim().to_uppercase();
        if self.spec.clean_tickers {
            if let Some(pos) = ticker.find('^') {
                ticker.truncate(pos);
            }
            ticker = ticker
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .to_string();
            if ticker.contains('.') {
                return None;
            }
        }
        if ticker.is_empty() { None } else { Some(ticker) }
    }

    /// Volume heuristic for sources without a timing column: an announcement
    /// before the open trades heavier on the announcement day than the next.
    fn infer_timing(
        &self,
        validator: &EventValidator<'_>,
        ticker: &str,
        date: NaiveDate,
    ) -> Option<Timing> {
        let store = validator.store();
        let announcement = store.bar(ticker, date)?;
        let next_day = validator.calendar().next_trading_day(date);
        let next = store.bar(ticker, next_day)?;
        if announcement.volume > next.volume {
            Some(Timing::BeforeMarket)
        } else {
            Some(Timing::AfterMarket)
        }
    }
}

impl EventPort for CsvEventAdapter {
    fn load_events(
        &self,
        validator: &mut EventValidator<'_>,
    ) -> Result<EventBook, EarntraderError> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| self.data_error(format!("failed to read events file: {e}")))?;
        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| self.data_error(format!("bad header row: {e}")))?
            .clone();

        let columns = &self.spec.columns;
        let ticker_col = self.column(&headers, columns.ticker)?;
        let date_col = self.column(&headers, columns.date)?;
        let timing_col = match columns.timing {
            Some(name) => Some(self.column(&headers, name)?),
            None => None,
        };
        let eps_con_col = self.column(&headers, columns.eps_consensus)?;
        let eps_act_col = self.column(&headers, columns.eps_actual)?;
        let rev_con_col = match columns.rev_consensus {
            Some(name) => Some(self.column(&headers, name)?),
            None => None,
        };
        let rev_act_col = match columns.rev_actual {
            Some(name) => Some(self.column(&headers, name)?),
            None => None,
        };

        let mut book = EventBook::default();
        let mut seen_tickers = HashSet::new();

        for record in reader.records() {
            let record = record.map_err(|e| self.data_error(format!("CSV parse error: {e}")))?;

            let Some(ticker) = record.get(ticker_col).and_then(|t| self.clean_ticker(t)) else {
                continue;
            };
            if seen_tickers.insert(ticker.clone()) {
                book.tickers.push(ticker.clone());
            }

            let raw = RawEvent {
                ticker: ticker.clone(),
                date: record.get(date_col).and_then(|s| {
                    NaiveDate::parse_from_str(s.trim(), columns.date_format).ok()
                }),
                eps_consensus: field(&record, Some(eps_con_col)),
                eps_actual: field(&record, Some(eps_act_col)),
                rev_consensus: field(&record, rev_con_col),
                rev_actual: field(&record, rev_act_col),
            };

            let Some(date) = raw.date else {
                validator.record_invalid(&ticker, "unparsable announcement date");
                continue;
            };

            let timing = match timing_col {
                Some(col) => match record.get(col).and_then(Timing::parse) {
                    Some(t) => t,
                    None => {
                        validator.record_invalid(&ticker, "invalid announcement timing");
                        continue;
                    }
                },
                None => match self.infer_timing(validator, &ticker, date) {
                    Some(t) => t,
                    // No bars to compare against; the event could never trade.
                    None => continue,
                },
            };

            let surprise = match self.spec.kind {
                SourceKind::EpsOnly => Surprise::eps_only(raw.eps_consensus, raw.eps_actual),
                SourceKind::EpsAndRevenue => Surprise::eps_and_revenue(
                    raw.eps_consensus,
                    raw.eps_actual,
                    raw.rev_consensus,
                    raw.rev_actual,
                ),
            };
            let Some(surprise) = surprise else {
                validator.record_invalid(&ticker, "incomplete surprise figures");
                continue;
            };

            let event = Event {
                ticker,
                date,
                timing,
                surprise,
            };
            if let Some(valid) = validator.validate(event) {
                book.by_entry_date
                    .entry(valid.entry_date)
                    .or_default()
                    .push(valid);
            }
        }

        tracing::info!(
            target: "event",
            source = self.spec.id,
            tickers = book.tickers.len(),
            events = book.event_count(),
            "events loaded"
        );
        Ok(book)
    }
}

fn field(record: &csv::StringRecord, index: Option<usize>) -> Option<f64> {
    let raw = record.get(index?)?.trim();
    if raw.is_empty() {
        return None;
    }
    let value: f64 = raw.parse().ok()?;
    if value.is_nan() { None } else { Some(value) }
}

/// Write the validated events back out in the canonical column layout.
pub fn dump_events(book: &EventBook, path: &Path) -> Result<(), EarntraderError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| EarntraderError::EventData {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    writer
        .write_record(["date", "ticker", "reports", "epsEst", "epsAct", "revEst", "revAct"])
        .map_err(|e| EarntraderError::EventData {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let mut events: Vec<_> = book.by_entry_date.values().flatten().collect();
    events.sort_by_key(|v| (v.event.date, v.event.ticker.clone()));

    for valid in events {
        let event = &valid.event;
        let (eps_con, eps_act, rev_con, rev_act) = match event.surprise {
            Surprise::EpsOnly {
                eps_consensus,
                eps_actual,
            } => (eps_consensus, eps_actual, None, None),
            Surprise::EpsAndRevenue {
                eps_consensus,
                eps_actual,
                rev_consensus,
                rev_actual,
            } => (eps_consensus, eps_actual, Some(rev_consensus), Some(rev_actual)),
        };
        let fmt = |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_default();
        writer
            .write_record([
                event.date.format("%Y-%m-%d").to_string(),
                event.ticker.clone(),
                event.timing.label().to_string(),
                format!("{eps_con:.2}"),
                format!("{eps_act:.2}"),
                fmt(rev_con),
                fmt(rev_act),
            ])
            .map_err(|e| EarntraderError::EventData {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;
    }

    writer.flush()?;
    Ok(())
}
