//! Strategy policies: ranking, filtering, and sizing of the day's events.

use chrono::NaiveDate;

use crate::domain::bar::BarStore;
use crate::domain::broker::Broker;
use crate::domain::event::{Decision, Surprise, ValidEvent};
use crate::domain::ledger::{Ledger, MarginKind, TradeRequest};
use crate::domain::trade::Direction;

/// Everything a policy may consult while deciding the day's entries.
pub struct DayContext<'a> {
    pub date: NaiveDate,
    pub events: &'a [ValidEvent],
    pub store: &'a BarStore,
    pub broker: &'a Broker,
}

pub trait StrategyPolicy {
    /// Called once per trading day that has events bucketed on it.
    fn on_day(&mut self, ctx: &DayContext<'_>, ledger: &mut Ledger);

    /// Extra (label, value) lines appended to the final report.
    fn report_lines(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

#[derive(Debug, Clone)]
pub struct EarningsConfig {
    /// Tradable open-price range, inclusive.
    pub price_range: (f64, f64),
    /// Rolling average-volume floor. Even at zero, a missing average still
    /// rejects.
    pub min_avg_volume: f64,
    /// Maximum simultaneous positions.
    pub portfolio_size: usize,
    /// Informational risk fraction carried into the report.
    pub portfolio_risk: f64,
    /// Hard cap on shares per trade.
    pub max_volume: i64,
    /// Exit longs at the entry day's close instead of the next day's.
    pub long_same_day: bool,
}

impl Default for EarningsConfig {
    fn default() -> Self {
        EarningsConfig {
            price_range: (5.0, 100.0),
            min_avg_volume: 0.0,
            portfolio_size: 20,
            portfolio_risk: 1.0,
            max_volume: 15_000,
            long_same_day: true,
        }
    }
}

/// Reference policy: trade the day's earnings surprises, longs on beats and
/// shorts on misses, strongest ranks first.
#[derive(Debug)]
pub struct EarningsPolicy {
    config: EarningsConfig,
    small_avg_volume_skipped: u64,
    missing_avg_volume_skipped: u64,
}

impl EarningsPolicy {
    pub fn new(config: EarningsConfig) -> Self {
        Self {
            config,
            small_avg_volume_skipped: 0,
            missing_avg_volume_skipped: 0,
        }
    }

    /// Signed strength score for one event. Long signals additionally require
    /// a next-day exit to exist unless same-day long exits are enabled.
    pub fn rank_event(&self, event: &ValidEvent) -> Decision {
        let long_ok = self.config.long_same_day || event.next_date.is_some();
        let eps = event.event.surprise.eps_change();

        match event.event.surprise {
            Surprise::EpsOnly { .. } => match eps {
                Some(e) if e > 0.0 && long_ok => Decision {
                    rank: e + 1.0,
                    side: Some(Direction::Long),
                },
                Some(e) if e < 0.0 => Decision {
                    rank: e - 1.0,
                    side: Some(Direction::Short),
                },
                _ => Decision::none(),
            },
            Surprise::EpsAndRevenue { .. } => {
                let rev = event.event.surprise.rev_change();
                match (eps, rev) {
                    (Some(e), Some(r)) if e > 0.0 && r > 0.0 && long_ok => Decision {
                        rank: (e + 1.0) * (r + 1.0),
                        side: Some(Direction::Long),
                    },
                    (Some(e), Some(r)) if e < 0.0 && r < 0.0 => Decision {
                        rank: -((e - 1.0) * (r - 1.0)).abs(),
                        side: Some(Direction::Short),
                    },
                    _ => Decision::none(),
                }
            }
        }
    }

    /// Rank the day's events into longs (best first) and shorts (worst first).
    fn rank<'e>(
        &self,
        events: &'e [ValidEvent],
    ) -> (Vec<(&'e ValidEvent, Decision)>, Vec<(&'e ValidEvent, Decision)>) {
        let mut longs = Vec::new();
        let mut shorts = Vec::new();
        for event in events {
            let decision = self.rank_event(event);
            match decision.side {
                Some(Direction::Long) => longs.push((event, decision)),
                Some(Direction::Short) => shorts.push((event, decision)),
                None => {}
            }
        }
        longs.sort_by(|a, b| b.1.rank.total_cmp(&a.1.rank));
        shorts.sort_by(|a, b| a.1.rank.total_cmp(&b.1.rank));
        (longs, shorts)
    }

    /// Availability, price-range, and average-volume filters, in that order.
    fn passes_filters(&mut self, event: &ValidEvent, ctx: &DayContext<'_>) -> bool {
        let ticker = &event.event.ticker;

        if !ctx.broker.is_available(ticker) {
            tracing::warn!(target: "event", ticker = %ticker, "skipped, not tradable at broker");
            return false;
        }

        let Some(bar) = ctx.store.bar(ticker, ctx.date) else {
            return false;
        };
        let (min_price, max_price) = self.config.price_range;
        if bar.open < min_price || bar.open > max_price {
            tracing::warn!(
                target: "event",
                ticker = %ticker,
                open = bar.open,
                "skipped, price out of range"
            );
            return false;
        }

        match ctx.store.avg_volume(ticker, ctx.date) {
            None => {
                self.missing_avg_volume_skipped += 1;
                tracing::warn!(target: "event", ticker = %ticker, "skipped, no average volume");
                false
            }
            Some(avg) if avg < self.config.min_avg_volume => {
                self.small_avg_volume_skipped += 1;
                tracing::warn!(
                    target: "event",
                    ticker = %ticker,
                    avg_volume = avg,
                    floor = self.config.min_avg_volume,
                    "skipped, average volume below floor"
                );
                false
            }
            Some(_) => true,
        }
    }

    /// Usable per-position budget; floors negative buying power at zero and
    /// records which margin figure ran out.
    fn buying_power(&self, ledger: &mut Ledger) -> f64 {
        let day_bp = ledger.day_buying_power();
        let bp = if self.config.long_same_day {
            day_bp
        } else {
            day_bp.min(ledger.overnight_buying_power())
        };
        if bp < 0.0 {
            let kind = if day_bp < 0.0 {
                MarginKind::Day
            } else {
                MarginKind::Overnight
            };
            ledger.record_margin_shortfall(kind);
            return 0.0;
        }
        bp
    }
}

impl StrategyPolicy for EarningsPolicy {
    fn on_day(&mut self, ctx: &DayContext<'_>, ledger: &mut Ledger) {
        let (longs, shorts) = self.rank(ctx.events);

        let longs: Vec<_> = longs
            .into_iter()
            .filter(|(e, _)| self.passes_filters(e, ctx))
            .collect();
        let shorts: Vec<_> = shorts
            .into_iter()
            .filter(|(e, _)| self.passes_filters(e, ctx))
            .collect();

        let candidates = longs.len() + shorts.len();
        if candidates == 0 {
            return;
        }

        let active = ledger.active_longs() + ledger.active_shorts();
        let pos_left = self.config.portfolio_size.saturating_sub(active);
        if pos_left == 0 {
            return;
        }

        // Proportional slot split when the day offers more candidates than
        // slots: longs get their count-weighted share, shorts the remainder.
        let selected: Vec<(&ValidEvent, Decision)> = if candidates <= pos_left {
            longs.into_iter().chain(shorts).collect()
        } else {
            let long_fraction = longs.len() as f64 / candidates as f64;
            let long_slots = (pos_left as f64 * long_fraction) as usize;
            longs
                .into_iter()
                .take(long_slots)
                .chain(shorts.into_iter().take(pos_left - long_slots))
                .collect()
        };

        let position_risk = self.buying_power(ledger) / pos_left as f64;

        for (event, decision) in selected {
            let ticker = &event.event.ticker;
            let Some(bar) = ctx.store.bar(ticker, ctx.date) else {
                continue;
            };

            let affordable = ctx.broker.max_affordable_volume(position_risk, bar.open);
            let volume = ctx.broker.lot_volume(affordable).min(self.config.max_volume);
            if volume <= 0 {
                continue;
            }

            let exit_date = match decision.side {
                Some(Direction::Long) if !self.config.long_same_day => {
                    match event.next_date {
                        Some(next) => next,
                        // Ranking already gated longs on next_date.
                        None => continue,
                    }
                }
                _ => event.entry_date,
            };
            let Some(direction) = decision.side else {
                continue;
            };

            ledger.open_trade(
                ctx.broker,
                TradeRequest {
                    ticker: ticker.clone(),
                    entry_date: event.entry_date,
                    exit_date,
                    direction,
                    price: bar.open,
                    stop_distance: bar.open,
                    volume,
                    position_risk,
                },
            );
        }
    }

    fn report_lines(&self) -> Vec<(String, String)> {
        let (min_price, max_price) = self.config.price_range;
        vec![
            (
                "Selected stocks range".into(),
                format!("${:.2}..${:.2}", min_price, max_price),
            ),
            (
                "Maximum volume per trade".into(),
                format!("{}", self.config.max_volume),
            ),
            (
                "Maximum risk for portfolio".into(),
                format!(
                    "{:.0}% ({} positions)",
                    self.config.portfolio_risk * 100.0,
                    self.config.portfolio_size
                ),
            ),
            (
                "Small average volume skipped".into(),
                format!(
                    "{}, volume < {:.0}",
                    self.small_avg_volume_skipped, self.config.min_avg_volume
                ),
            ),
            (
                "Missing average volume skipped".into(),
                format!("{}", self.missing_avg_volume_skipped),
            ),
            (
                "Long exits".into(),
                if self.config.long_same_day {
                    "same day".into()
                } else {
                    "next day".into()
                },
            ),
        ]
    }
}
