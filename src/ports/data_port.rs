//! Price data access port.

use crate::domain::bar::BarSeries;
use crate::domain::error::EarntraderError;

/// Source of daily bar history, one series per ticker. The engine materializes
/// every ticker into a [`crate::domain::bar::BarStore`] before a run starts;
/// nothing is fetched mid-simulation.
pub trait DataPort {
    fn load_series(&self, ticker: &str) -> Result<BarSeries, EarntraderError>;

    /// Every ticker the source can serve.
    fn list_tickers(&self) -> Result<Vec<String>, EarntraderError>;
}
