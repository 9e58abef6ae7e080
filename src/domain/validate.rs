//! Event validation: announcement date to tradable entry/exit dates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::bar::BarStore;
use crate::domain::calendar::Calendar;
use crate::domain::event::{Event, Timing, ValidEvent};

/// Per-cause drop counters. Every rejected event lands in exactly one bucket,
/// so the final report can account for all input rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounters {
    /// Announcement fell on a weekend or exchange holiday.
    pub holiday_events: u64,
    /// No bar at a date the event needed.
    pub missed_bars: u64,
    /// Bar present but error-flagged.
    pub error_bars: u64,
    /// Malformed source rows (bad timing string, incomplete figures).
    pub invalid_records: u64,
    pub valid_events: u64,
}

pub struct EventValidator<'a> {
    calendar: &'a Calendar,
    store: &'a BarStore,
    pub counters: EventCounters,
}

impl<'a> EventValidator<'a> {
    pub fn new(calendar: &'a Calendar, store: &'a BarStore) -> Self {
        Self {
            calendar,
            store,
            counters: EventCounters::default(),
        }
    }

    pub fn calendar(&self) -> &Calendar {
        self.calendar
    }

    pub fn store(&self) -> &BarStore {
        self.store
    }

    /// Resolve an event's trading dates, or count and drop it.
    pub fn validate(&mut self, event: Event) -> Option<ValidEvent> {
        if let Some(reason) = self.calendar.day_off(event.date) {
            self.counters.holiday_events += 1;
            tracing::warn!(
                target: "event_holiday",
                ticker = %event.ticker,
                date = %event.date,
                reason,
                "holiday event dropped"
            );
            return None;
        }

        let entry_date = match event.timing {
            Timing::BeforeMarket => event.date,
            Timing::AfterMarket => self.calendar.next_trading_day(event.date),
        };
        if !self.usable_bar(&event.ticker, entry_date, true) {
            return None;
        }

        let next = self.calendar.next_trading_day(entry_date);
        let next_date = self.usable_bar(&event.ticker, next, false).then_some(next);

        self.counters.valid_events += 1;
        Some(ValidEvent {
            event,
            entry_date,
            next_date,
        })
    }

    /// Record a malformed source row (missing figures, bad timing field).
    pub fn record_invalid(&mut self, ticker: &str, detail: &str) {
        self.counters.invalid_records += 1;
        tracing::warn!(target: "event_error", ticker, detail, "invalid event record dropped");
    }

    fn usable_bar(&mut self, ticker: &str, date: NaiveDate, log: bool) -> bool {
        match self.store.bar(ticker, date) {
            None => {
                self.counters.missed_bars += 1;
                if log {
                    tracing::warn!(target: "no_bar_data", ticker, %date, "no bar data");
                }
                false
            }
            Some(bar) if bar.error => {
                self.counters.error_bars += 1;
                if log {
                    tracing::warn!(target: "error_bar_data", ticker, %date, "error bar rejected");
                }
                false
            }
            Some(_) => true,
        }
    }
}
