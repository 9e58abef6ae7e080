//! Earnings-surprise events.
//!
//! A [`RawEvent`] comes straight off a source row with whatever fields the
//! source had. It becomes an [`Event`] only when every field its surprise type
//! needs is present. Ranking produces a separate [`Decision`]; the event
//! itself never carries strategy state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::trade::Direction;

/// Announcement timing relative to the trading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timing {
    /// BMO: tradable at the open of the announcement day.
    BeforeMarket,
    /// AMC: tradable at the open of the next trading day.
    AfterMarket,
}

impl Timing {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "BMO" => Some(Timing::BeforeMarket),
            "AMC" => Some(Timing::AfterMarket),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timing::BeforeMarket => "BMO",
            Timing::AfterMarket => "AMC",
        }
    }
}

/// The surprise figures, tagged by what the source reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Surprise {
    EpsOnly {
        eps_consensus: f64,
        eps_actual: f64,
    },
    EpsAndRevenue {
        eps_consensus: f64,
        eps_actual: f64,
        rev_consensus: f64,
        rev_actual: f64,
    },
}

impl Surprise {
    /// `None` when either figure is missing; the raw record is then invalid.
    pub fn eps_only(consensus: Option<f64>, actual: Option<f64>) -> Option<Self> {
        Some(Surprise::EpsOnly {
            eps_consensus: consensus?,
            eps_actual: actual?,
        })
    }

    pub fn eps_and_revenue(
        eps_consensus: Option<f64>,
        eps_actual: Option<f64>,
        rev_consensus: Option<f64>,
        rev_actual: Option<f64>,
    ) -> Option<Self> {
        Some(Surprise::EpsAndRevenue {
            eps_consensus: eps_consensus?,
            eps_actual: eps_actual?,
            rev_consensus: rev_consensus?,
            rev_actual: rev_actual?,
        })
    }

    /// Relative EPS surprise. Undefined when consensus or actual is zero.
    pub fn eps_change(&self) -> Option<f64> {
        let (consensus, actual) = match *self {
            Surprise::EpsOnly {
                eps_consensus,
                eps_actual,
            } => (eps_consensus, eps_actual),
            Surprise::EpsAndRevenue {
                eps_consensus,
                eps_actual,
                ..
            } => (eps_consensus, eps_actual),
        };
        relative_change(consensus, actual)
    }

    /// Relative revenue surprise; `None` for EPS-only events.
    pub fn rev_change(&self) -> Option<f64> {
        match *self {
            Surprise::EpsOnly { .. } => None,
            Surprise::EpsAndRevenue {
                rev_consensus,
                rev_actual,
                ..
            } => relative_change(rev_consensus, rev_actual),
        }
    }
}

fn relative_change(consensus: f64, actual: f64) -> Option<f64> {
    if consensus != 0.0 && actual != 0.0 {
        Some((actual - consensus) / consensus.abs())
    } else {
        None
    }
}

/// A source row before completeness checking. Timing is resolved separately,
/// from a column or by inference.
#[derive(Debug, Clone, Default)]
pub struct RawEvent {
    pub ticker: String,
    pub date: Option<NaiveDate>,
    pub eps_consensus: Option<f64>,
    pub eps_actual: Option<f64>,
    pub rev_consensus: Option<f64>,
    pub rev_actual: Option<f64>,
}

/// A complete, typed earnings event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub ticker: String,
    pub date: NaiveDate,
    pub timing: Timing,
    pub surprise: Surprise,
}

/// Validator output: an event with its resolved trading dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidEvent {
    pub event: Event,
    /// Trading day a position opened from this event would enter.
    pub entry_date: NaiveDate,
    /// Next trading day with a usable bar, if any.
    pub next_date: Option<NaiveDate>,
}

/// Ranking outcome for one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub rank: f64,
    pub side: Option<Direction>,
}

impl Decision {
    pub fn none() -> Self {
        Decision {
            rank: 0.0,
            side: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_parse() {
        assert_eq!(Timing::parse("BMO"), Some(Timing::BeforeMarket));
        assert_eq!(Timing::parse(" AMC "), Some(Timing::AfterMarket));
        assert_eq!(Timing::parse("bmo"), None);
        assert_eq!(Timing::parse("DMH"), None);
    }

    #[test]
    fn eps_only_requires_both_fields() {
        assert!(Surprise::eps_only(Some(1.0), Some(1.2)).is_some());
        assert!(Surprise::eps_only(None, Some(1.2)).is_none());
        assert!(Surprise::eps_only(Some(1.0), None).is_none());
    }

    #[test]
    fn eps_and_revenue_requires_all_fields() {
        assert!(
            Surprise::eps_and_revenue(Some(1.0), Some(1.2), Some(100.0), Some(110.0)).is_some()
        );
        assert!(Surprise::eps_and_revenue(Some(1.0), Some(1.2), None, Some(110.0)).is_none());
        assert!(Surprise::eps_and_revenue(Some(1.0), Some(1.2), Some(100.0), None).is_none());
    }

    #[test]
    fn eps_change_relative_to_consensus_magnitude() {
        let s = Surprise::eps_only(Some(1.0), Some(1.2)).unwrap();
        assert!((s.eps_change().unwrap() - 0.2).abs() < 1e-12);

        // Negative consensus: beat of 0.5 on a -1.0 consensus is +50%.
        let s = Surprise::eps_only(Some(-1.0), Some(-0.5)).unwrap();
        assert!((s.eps_change().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn eps_change_undefined_on_zero() {
        let s = Surprise::eps_only(Some(0.0), Some(1.2)).unwrap();
        assert!(s.eps_change().is_none());
        let s = Surprise::eps_only(Some(1.0), Some(0.0)).unwrap();
        assert!(s.eps_change().is_none());
    }

    #[test]
    fn rev_change_only_for_revenue_events() {
        let s = Surprise::eps_only(Some(1.0), Some(1.2)).unwrap();
        assert!(s.rev_change().is_none());

        let s = Surprise::eps_and_revenue(Some(1.0), Some(1.2), Some(100.0), Some(110.0)).unwrap();
        assert!((s.rev_change().unwrap() - 0.1).abs() < 1e-12);
    }
}
