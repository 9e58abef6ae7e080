//! Simulation clock and trade ledger.
//!
//! The ledger advances one trading day at a time. Finishing a day settles it
//! strictly in this order: overnight gap stops at the day's open, intraday
//! stops at the day's low/high, scheduled exits at the day's close, then day
//! P&L, streaks, drawdown, and promotion of today's held positions into the
//! overnight set. Stops therefore take precedence over a scheduled close
//! falling on the same day.
//!
//! Open positions live in three disjoint sets: day trades (exit today),
//! overnight trades (carried from earlier days), and trades opened today that
//! await overnight promotion. Trades are immutable; closing removes them.

use chrono::{Datelike, NaiveDate};

use crate::domain::bar::BarStore;
use crate::domain::broker::Broker;
use crate::domain::calendar::Calendar;
use crate::domain::trade::{ClosedTrade, Direction, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub starting_balance: f64,
    /// Intraday buying-power multiplier on balance.
    pub day_margin: f64,
    /// Overnight buying-power multiplier on balance.
    pub overnight_margin: f64,
    /// Absolute slippage per share applied to stop exits.
    pub slippage_per_share: f64,
}

/// Which buying-power figure fell below zero during sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginKind {
    Day,
    Overnight,
}

/// Monotonic totals accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerStats {
    pub commission_total: f64,
    pub slippage_total: f64,
    pub stops_reached: u64,
    pub total_volume: i64,
    pub total_winnings: f64,
    pub total_losings: f64,
    pub total_trades: u64,
    pub long_trades: u64,
    pub short_trades: u64,
    pub long_wins: u64,
    pub short_wins: u64,
    pub max_winning_streak: u64,
    pub max_losing_streak: u64,
    pub zombie_trades: u64,
    pub no_day_margin: u64,
    pub no_overnight_margin: u64,
}

/// A request to open a position on the current simulated day.
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub direction: Direction,
    pub price: f64,
    pub stop_distance: f64,
    pub volume: i64,
    pub position_risk: f64,
}

#[derive(Debug)]
pub struct Ledger {
    config: LedgerConfig,
    current_date: Option<NaiveDate>,
    balance: f64,
    gross_balance: f64,
    day_start_balance: f64,
    balance_high: f64,
    winning_streak: u64,
    losing_streak: u64,
    day_trades: Vec<Trade>,
    overnight_trades: Vec<Trade>,
    opened_today: Vec<Trade>,
    balance_series: Vec<SeriesPoint>,
    drawdown_series: Vec<SeriesPoint>,
    closed_trades: Vec<ClosedTrade>,
    stats: LedgerStats,
}

#[derive(Debug, Clone, Copy)]
enum TradeSet {
    Day,
    Overnight,
    OpenedToday,
}

const ALL_SETS: [TradeSet; 3] = [TradeSet::Day, TradeSet::Overnight, TradeSet::OpenedToday];

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        let balance = config.starting_balance;
        Self {
            config,
            current_date: None,
            balance,
            gross_balance: balance,
            day_start_balance: balance,
            balance_high: 0.0,
            winning_streak: 0,
            losing_streak: 0,
            day_trades: Vec::new(),
            overnight_trades: Vec::new(),
            opened_today: Vec::new(),
            balance_series: Vec::new(),
            drawdown_series: Vec::new(),
            closed_trades: Vec::new(),
            stats: LedgerStats::default(),
        }
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.current_date
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn gross_balance(&self) -> f64 {
        self.gross_balance
    }

    pub fn balance_series(&self) -> &[SeriesPoint] {
        &self.balance_series
    }

    pub fn drawdown_series(&self) -> &[SeriesPoint] {
        &self.drawdown_series
    }

    pub fn stats(&self) -> &LedgerStats {
        &self.stats
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn open_trades(&self) -> impl Iterator<Item = &Trade> {
        self.day_trades
            .iter()
            .chain(self.overnight_trades.iter())
            .chain(self.opened_today.iter())
    }

    pub fn margin_used(&self) -> f64 {
        self.open_trades().map(|t| t.margin_used).sum()
    }

    pub fn day_buying_power(&self) -> f64 {
        self.balance * self.config.day_margin - self.margin_used()
    }

    pub fn overnight_buying_power(&self) -> f64 {
        self.balance * self.config.overnight_margin - self.margin_used()
    }

    pub fn active_longs(&self) -> usize {
        self.open_trades()
            .filter(|t| t.direction == Direction::Long)
            .count()
    }

    pub fn active_shorts(&self) -> usize {
        self.open_trades()
            .filter(|t| t.direction == Direction::Short)
            .count()
    }

    pub fn record_margin_shortfall(&mut self, kind: MarginKind) {
        match kind {
            MarginKind::Day => self.stats.no_day_margin += 1,
            MarginKind::Overnight => self.stats.no_overnight_margin += 1,
        }
    }

    /// Advance the clock. Finalizes the day just run (if any), rolls to the
    /// next trading day, and returns it, or `None` once past the end date.
    pub fn advance(
        &mut self,
        calendar: &Calendar,
        store: &BarStore,
        broker: &Broker,
    ) -> Option<NaiveDate> {
        match self.current_date {
            None => {
                let mut date = self.config.start_date;
                if calendar.day_off(date).is_some() {
                    date = calendar.next_trading_day(date);
                }
                self.current_date = Some(date);
                self.balance = self.config.starting_balance;
                self.gross_balance = self.config.starting_balance;
                self.balance_series.push(SeriesPoint {
                    date,
                    value: self.balance,
                });
                self.drawdown_series.push(SeriesPoint { date, value: 0.0 });
            }
            Some(date) => {
                self.finish_day(date, store, broker);
                self.current_date = Some(calendar.next_trading_day(date));
            }
        }

        let date = self.current_date?;
        if date > self.config.end_date {
            return None;
        }

        self.day_start_balance = self.balance;
        tracing::info!(
            target: "day_borders",
            %date,
            day_bp = self.day_buying_power(),
            overnight_bp = self.overnight_buying_power(),
            balance = self.balance,
            longs = self.active_longs(),
            shorts = self.active_shorts(),
            "day started"
        );
        Some(date)
    }

    /// Open a position on the current day. Requests for any other date are
    /// logged and dropped; nothing else fails.
    pub fn open_trade(&mut self, broker: &Broker, request: TradeRequest) {
        if self.current_date != Some(request.entry_date) {
            tracing::error!(
                target: "trade_error",
                ticker = %request.ticker,
                entry_date = %request.entry_date,
                "entry date does not match current day"
            );
            return;
        }

        self.stats.total_trades += 1;
        let trade = Trade {
            id: self.stats.total_trades,
            ticker: request.ticker,
            entry_date: request.entry_date,
            exit_date: request.exit_date,
            direction: request.direction,
            entry_price: request.price,
            stop_distance: request.stop_distance,
            volume: request.volume,
            margin_used: request.price * request.volume as f64,
            position_risk: request.position_risk,
        };

        let commission = broker.commission(trade.volume, trade.entry_price);
        self.balance -= commission;
        self.stats.commission_total += commission;
        self.stats.total_volume += trade.volume;

        match trade.direction {
            Direction::Long => {
                self.stats.long_trades += 1;
                tracing::info!(
                    target: "trade",
                    kind = trade.kind_label(),
                    id = trade.id,
                    ticker = %trade.ticker,
                    price = trade.entry_price,
                    stop = trade.stop_distance,
                    commission,
                    volume = trade.volume,
                    risk = trade.position_risk,
                    "open BUY"
                );
            }
            Direction::Short => {
                self.stats.short_trades += 1;
                tracing::info!(
                    target: "trade",
                    kind = trade.kind_label(),
                    id = trade.id,
                    ticker = %trade.ticker,
                    price = trade.entry_price,
                    stop = trade.stop_distance,
                    commission,
                    volume = trade.volume,
                    risk = trade.position_risk,
                    "open SELL"
                );
            }
        }

        if trade.is_day_trade() {
            self.day_trades.push(trade);
        } else {
            self.opened_today.push(trade);
        }
    }

    fn set_mut(&mut self, set: TradeSet) -> &mut Vec<Trade> {
        match set {
            TradeSet::Day => &mut self.day_trades,
            TradeSet::Overnight => &mut self.overnight_trades,
            TradeSet::OpenedToday => &mut self.opened_today,
        }
    }

    fn finish_day(&mut self, date: NaiveDate, store: &BarStore, broker: &Broker) {
        self.sweep_overnight_stops(date, store, broker);
        for set in ALL_SETS {
            self.sweep_intraday_stops(set, date, store, broker);
        }
        for set in ALL_SETS {
            self.sweep_scheduled_exits(set, date, store, broker);
        }

        let day_result = self.balance - self.day_start_balance;
        if day_result > 0.0 {
            self.winning_streak += 1;
            self.stats.max_losing_streak = self.stats.max_losing_streak.max(self.losing_streak);
            self.losing_streak = 0;
        } else {
            self.losing_streak += 1;
            self.stats.max_winning_streak = self.stats.max_winning_streak.max(self.winning_streak);
            self.winning_streak = 0;
        }

        self.balance_high = self.balance_high.max(self.balance);
        let drawdown = (1.0 - self.balance / self.balance_high) * 100.0;
        upsert(&mut self.drawdown_series, date, drawdown);

        self.overnight_trades.append(&mut self.opened_today);
        upsert(&mut self.balance_series, date, self.balance);

        tracing::info!(
            target: "day_borders",
            %date,
            balance = self.balance,
            longs = self.active_longs(),
            shorts = self.active_shorts(),
            day_result,
            "day finished"
        );
    }

    /// Gap stops for positions held overnight, tested against today's open.
    fn sweep_overnight_stops(&mut self, date: NaiveDate, store: &BarStore, broker: &Broker) {
        let trades = std::mem::take(&mut self.overnight_trades);
        let mut keep = Vec::with_capacity(trades.len());

        for trade in trades {
            let Some(bar) = store.bar(&trade.ticker, date) else {
                self.remove_zombie(&trade, date);
                continue;
            };

            let gap = match trade.direction {
                Direction::Long => trade.entry_price - bar.open,
                Direction::Short => bar.open - trade.entry_price,
            };
            if trade.stop_distance > 0.0 && gap > trade.stop_distance {
                let slippage = self.stop_slippage(&trade);
                let commission = broker.commission(trade.volume, bar.open);
                let loss = (gap + slippage) * trade.volume as f64;
                self.settle_stop(loss, commission, trade.volume);
                self.record_close(&trade, date, bar.open, -loss, true);
                tracing::info!(
                    target: "trade",
                    id = trade.id,
                    ticker = %trade.ticker,
                    price = bar.open,
                    loss,
                    commission,
                    volume = trade.volume,
                    balance = self.balance,
                    "close overnight STOP"
                );
            } else {
                keep.push(trade);
            }
        }

        self.overnight_trades = keep;
    }

    /// Intrabar stops for every open position: low against longs, high
    /// against shorts.
    fn sweep_intraday_stops(
        &mut self,
        set: TradeSet,
        date: NaiveDate,
        store: &BarStore,
        broker: &Broker,
    ) {
        let trades = std::mem::take(self.set_mut(set));
        let mut keep = Vec::with_capacity(trades.len());

        for trade in trades {
            let Some(bar) = store.bar(&trade.ticker, date) else {
                self.remove_zombie(&trade, date);
                continue;
            };

            let excursion = match trade.direction {
                Direction::Long => trade.entry_price - bar.low,
                Direction::Short => bar.high - trade.entry_price,
            };
            if trade.stop_distance > 0.0 && excursion > trade.stop_distance {
                let exit_price = match trade.direction {
                    Direction::Long => trade.entry_price - trade.stop_distance,
                    Direction::Short => trade.entry_price + trade.stop_distance,
                };
                let slippage = self.stop_slippage(&trade);
                let commission = broker.commission(trade.volume, exit_price);
                let loss = (trade.stop_distance + slippage) * trade.volume as f64;
                self.settle_stop(loss, commission, trade.volume);
                self.record_close(&trade, date, exit_price, -loss, true);
                tracing::info!(
                    target: "trade",
                    kind = trade.kind_label(),
                    id = trade.id,
                    ticker = %trade.ticker,
                    price = exit_price,
                    loss,
                    commission,
                    volume = trade.volume,
                    balance = self.balance,
                    "close STOP"
                );
            } else {
                keep.push(trade);
            }
        }

        *self.set_mut(set) = keep;
    }

    /// Close positions whose exit date is today at today's close.
    fn sweep_scheduled_exits(
        &mut self,
        set: TradeSet,
        date: NaiveDate,
        store: &BarStore,
        broker: &Broker,
    ) {
        let trades = std::mem::take(self.set_mut(set));
        let mut keep = Vec::with_capacity(trades.len());

        for trade in trades {
            if trade.exit_date != date {
                keep.push(trade);
                continue;
            }

            let Some(bar) = store.bar(&trade.ticker, date) else {
                self.remove_zombie(&trade, date);
                continue;
            };

            let result = match trade.direction {
                Direction::Long => (bar.close - trade.entry_price) * trade.volume as f64,
                Direction::Short => (trade.entry_price - bar.close) * trade.volume as f64,
            };
            let commission = broker.commission(trade.volume, bar.close);
            self.settle_close(result, commission, trade.volume, trade.direction);
            self.record_close(&trade, date, bar.close, result, false);
            tracing::info!(
                target: "trade",
                kind = trade.kind_label(),
                id = trade.id,
                ticker = %trade.ticker,
                price = bar.close,
                result,
                commission,
                volume = trade.volume,
                balance = self.balance,
                "close"
            );
        }

        *self.set_mut(set) = keep;
    }

    fn stop_slippage(&self, trade: &Trade) -> f64 {
        if trade.stop_distance < trade.entry_price {
            self.config.slippage_per_share
        } else {
            0.0
        }
    }

    /// Book a stop exit. `loss` is the positive amount given up.
    fn settle_stop(&mut self, loss: f64, commission: f64, volume: i64) {
        self.stats.commission_total += commission;
        self.balance -= commission;
        self.balance -= loss;
        self.gross_balance -= loss;
        self.stats.total_volume += volume;
        self.stats.stops_reached += 1;
        self.stats.slippage_total += self.config.slippage_per_share * volume as f64;
        self.stats.total_losings += loss;
    }

    /// Book a scheduled close. `result` is signed; break-even counts as a win.
    fn settle_close(&mut self, result: f64, commission: f64, volume: i64, direction: Direction) {
        self.stats.commission_total += commission;
        self.balance -= commission;
        self.balance += result;
        self.gross_balance += result;
        self.stats.total_volume += volume;

        if result >= 0.0 {
            match direction {
                Direction::Long => self.stats.long_wins += 1,
                Direction::Short => self.stats.short_wins += 1,
            }
            self.stats.total_winnings += result;
        } else {
            self.stats.total_losings += result.abs();
        }
    }

    fn record_close(
        &mut self,
        trade: &Trade,
        exit_date: NaiveDate,
        exit_price: f64,
        result: f64,
        stopped: bool,
    ) {
        self.closed_trades.push(ClosedTrade {
            id: trade.id,
            ticker: trade.ticker.clone(),
            direction: trade.direction,
            entry_date: trade.entry_date,
            exit_date,
            entry_price: trade.entry_price,
            exit_price,
            volume: trade.volume,
            result,
            stopped,
        });
    }

    /// A position with no bar on settlement day cannot be closed; drop it.
    fn remove_zombie(&mut self, trade: &Trade, date: NaiveDate) {
        self.stats.zombie_trades += 1;
        tracing::error!(
            target: "no_bar_data",
            id = trade.id,
            ticker = %trade.ticker,
            %date,
            "removed trade, no bar data on settlement day"
        );
    }

    /// Tear the ledger apart once the run is over.
    pub fn finish(
        self,
    ) -> (
        Vec<SeriesPoint>,
        Vec<SeriesPoint>,
        Vec<ClosedTrade>,
        LedgerStats,
    ) {
        (
            self.balance_series,
            self.drawdown_series,
            self.closed_trades,
            self.stats,
        )
    }

    /// Whole-year span of the configured date range, floored at one year.
    pub fn year_span(&self) -> i32 {
        (self.config.end_date.year() - self.config.start_date.year()).max(1)
    }
}

fn upsert(series: &mut Vec<SeriesPoint>, date: NaiveDate, value: f64) {
    match series.last_mut() {
        Some(point) if point.date == date => point.value = value,
        _ => series.push(SeriesPoint { date, value }),
    }
}
