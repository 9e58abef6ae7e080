//! Backtest engine: wires the bar store, event buckets, broker, policy, and
//! ledger into a single synchronous run.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::bar::BarStore;
use crate::domain::broker::Broker;
use crate::domain::calendar::Calendar;
use crate::domain::event::ValidEvent;
use crate::domain::ledger::{Ledger, LedgerConfig, LedgerStats, SeriesPoint};
use crate::domain::policy::{DayContext, StrategyPolicy};
use crate::domain::report::{self, ReportLine, RunInfo};
use crate::domain::trade::ClosedTrade;
use crate::domain::validate::EventCounters;

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunResult {
    pub balance_series: Vec<SeriesPoint>,
    pub drawdown_series: Vec<SeriesPoint>,
    pub trades: Vec<ClosedTrade>,
    pub stats: LedgerStats,
    pub event_counters: EventCounters,
    pub report: Vec<ReportLine>,
}

pub struct Engine<P: StrategyPolicy> {
    config: LedgerConfig,
    info: RunInfo,
    calendar: Calendar,
    store: BarStore,
    events: BTreeMap<NaiveDate, Vec<ValidEvent>>,
    event_counters: EventCounters,
    broker: Broker,
    policy: P,
}

impl<P: StrategyPolicy> Engine<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: LedgerConfig,
        info: RunInfo,
        calendar: Calendar,
        store: BarStore,
        events: BTreeMap<NaiveDate, Vec<ValidEvent>>,
        event_counters: EventCounters,
        broker: Broker,
        policy: P,
    ) -> Self {
        Self {
            config,
            info,
            calendar,
            store,
            events,
            event_counters,
            broker,
            policy,
        }
    }

    /// Step the clock day by day until past the end date. Strictly
    /// sequential: each day's ledger state feeds the next.
    pub fn run(mut self) -> RunResult {
        let mut ledger = Ledger::new(self.config.clone());

        while let Some(date) = ledger.advance(&self.calendar, &self.store, &self.broker) {
            if let Some(events) = self.events.get(&date) {
                let ctx = DayContext {
                    date,
                    events,
                    store: &self.store,
                    broker: &self.broker,
                };
                self.policy.on_day(&ctx, &mut ledger);
            }
        }

        let extra = self.policy.report_lines();
        let report = report::generate(
            &self.info,
            &self.broker,
            &ledger,
            &self.event_counters,
            &extra,
        );

        let (balance_series, drawdown_series, trades, stats) = ledger.finish();
        RunResult {
            balance_series,
            drawdown_series,
            trades,
            stats,
            event_counters: self.event_counters,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::{Bar, BarSeries};
    use crate::domain::broker::BrokerProfile;
    use crate::domain::ledger::TradeRequest;
    use crate::domain::trade::Direction;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// Policy that buys one share of a fixed ticker every day with events.
    struct OneShare;

    impl StrategyPolicy for OneShare {
        fn on_day(&mut self, ctx: &DayContext<'_>, ledger: &mut Ledger) {
            for event in ctx.events {
                let Some(bar) = ctx.store.bar(&event.event.ticker, ctx.date) else {
                    continue;
                };
                ledger.open_trade(
                    ctx.broker,
                    TradeRequest {
                        ticker: event.event.ticker.clone(),
                        entry_date: ctx.date,
                        exit_date: ctx.date,
                        direction: Direction::Long,
                        price: bar.open,
                        stop_distance: 0.0,
                        volume: 1,
                        position_risk: bar.open,
                    },
                );
            }
        }
    }

    fn engine_with(events: BTreeMap<NaiveDate, Vec<ValidEvent>>) -> Engine<OneShare> {
        let mut store = BarStore::new();
        store.insert(
            "AAPL",
            BarSeries::new(vec![
                Bar {
                    date: date("2018-03-05"),
                    open: 50.0,
                    high: 51.0,
                    low: 49.0,
                    close: 52.0,
                    volume: 100_000,
                    error: false,
                },
                Bar {
                    date: date("2018-03-06"),
                    open: 52.0,
                    high: 53.0,
                    low: 51.0,
                    close: 52.5,
                    volume: 100_000,
                    error: false,
                },
            ]),
        );
        Engine::new(
            LedgerConfig {
                start_date: date("2018-03-05"),
                end_date: date("2018-03-06"),
                starting_balance: 10_000.0,
                day_margin: 1.0,
                overnight_margin: 1.0,
                slippage_per_share: 0.0,
            },
            RunInfo {
                data_feed: "csv".into(),
                events_feed: "test".into(),
            },
            Calendar::default(),
            store,
            events,
            EventCounters::default(),
            Broker::new(BrokerProfile::IbCfd),
            OneShare,
        )
    }

    fn bucket(day: &str) -> BTreeMap<NaiveDate, Vec<ValidEvent>> {
        use crate::domain::event::{Event, Surprise, Timing};
        let mut events = BTreeMap::new();
        events.insert(
            date(day),
            vec![ValidEvent {
                event: Event {
                    ticker: "AAPL".into(),
                    date: date(day),
                    timing: Timing::BeforeMarket,
                    surprise: Surprise::eps_only(Some(1.0), Some(1.2)).unwrap(),
                },
                entry_date: date(day),
                next_date: None,
            }],
        );
        events
    }

    #[test]
    fn run_produces_full_series_and_report() {
        let result = engine_with(bucket("2018-03-05")).run();

        assert_eq!(result.balance_series.len(), 2);
        assert_eq!(result.drawdown_series.len(), 2);
        assert_eq!(result.stats.total_trades, 1);
        assert_eq!(result.trades.len(), 1);
        assert!(result.trades[0].exit_date >= result.trades[0].entry_date);
        assert!(!result.report.is_empty());
    }

    #[test]
    fn days_without_events_still_produce_series_entries() {
        let result = engine_with(BTreeMap::new()).run();

        assert_eq!(result.stats.total_trades, 0);
        assert_eq!(result.balance_series.len(), 2);
    }

    #[test]
    fn run_is_deterministic() {
        let first = engine_with(bucket("2018-03-05")).run();
        let second = engine_with(bucket("2018-03-05")).run();

        assert_eq!(first.balance_series, second.balance_series);
        assert_eq!(first.drawdown_series, second.drawdown_series);
        assert_eq!(first.stats, second.stats);
    }
}
