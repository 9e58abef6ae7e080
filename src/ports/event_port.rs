//! Event source port.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::error::EarntraderError;
use crate::domain::event::ValidEvent;
use crate::domain::validate::EventValidator;

/// Validated events bucketed by entry date, plus the tickers they reference.
#[derive(Debug, Clone, Default)]
pub struct EventBook {
    pub tickers: Vec<String>,
    pub by_entry_date: BTreeMap<NaiveDate, Vec<ValidEvent>>,
}

impl EventBook {
    pub fn event_count(&self) -> usize {
        self.by_entry_date.values().map(Vec::len).sum()
    }
}

/// Source of earnings events. Rows that fail validation are counted on the
/// validator and dropped; only an unreadable source is an error.
pub trait EventPort {
    fn load_events(&self, validator: &mut EventValidator<'_>)
    -> Result<EventBook, EarntraderError>;
}
