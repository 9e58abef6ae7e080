//! Trade records owned by the ledger.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

/// An open position. Never mutated after creation; the ledger moves it between
/// its trade sets and drops it on close.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub id: u64,
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub direction: Direction,
    pub entry_price: f64,
    /// Absolute price move from entry that triggers the protective exit;
    /// zero disables the stop.
    pub stop_distance: f64,
    pub volume: i64,
    pub margin_used: f64,
    pub position_risk: f64,
}

impl Trade {
    pub fn is_day_trade(&self) -> bool {
        self.entry_date == self.exit_date
    }

    /// Log prefix: `"overnight "` for held positions, empty for day trades.
    pub fn kind_label(&self) -> &'static str {
        if self.is_day_trade() { "" } else { "overnight " }
    }
}

/// A finished round trip, kept for the run result.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub id: u64,
    pub ticker: String,
    pub direction: Direction,
    pub entry_date: NaiveDate,
    /// Day the position actually left the book.
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub volume: i64,
    /// Signed price P&L, before commissions.
    pub result: f64,
    /// Closed by a protective stop rather than the scheduled exit.
    pub stopped: bool,
}
