//! Report generation: aggregate statistics from a finished run.

use crate::domain::broker::Broker;
use crate::domain::ledger::{Ledger, SeriesPoint};
use crate::domain::validate::EventCounters;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// One line of the final report.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportLine {
    Blank,
    Section(String),
    Entry { label: String, value: String },
}

impl ReportLine {
    fn entry(label: &str, value: String) -> Self {
        ReportLine::Entry {
            label: label.to_string(),
            value,
        }
    }
}

/// Run identity rendered into the report header.
#[derive(Debug, Clone, Default)]
pub struct RunInfo {
    pub data_feed: String,
    pub events_feed: String,
}

/// Division that reports 0 on a zero denominator instead of failing.
pub fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 { 0.0 } else { a / b }
}

/// Build the ordered statistics table. Every drop counter appears so no data
/// loss stays silent.
pub fn generate(
    info: &RunInfo,
    broker: &Broker,
    ledger: &Ledger,
    events: &EventCounters,
    extra: &[(String, String)],
) -> Vec<ReportLine> {
    let stats = ledger.stats();
    let config = ledger.config();

    let total_wins = stats.long_wins + stats.short_wins;
    let net_balance =
        ledger.gross_balance() - stats.commission_total - stats.slippage_total;
    let year_yield = annualized_yield(net_balance, config.starting_balance, ledger.year_span());
    let max_drawdown = ledger
        .drawdown_series()
        .iter()
        .fold(0.0_f64, |acc, p| acc.max(p.value));
    let total_losses = stats.total_trades.saturating_sub(total_wins);

    let mut lines = vec![
        ReportLine::Blank,
        ReportLine::Section("**** Backtest statistics".into()),
        ReportLine::entry("Data feed", info.data_feed.clone()),
        ReportLine::entry("Events feed", info.events_feed.clone()),
        ReportLine::entry(
            "Date range",
            format!("{}..{}", config.start_date, config.end_date),
        ),
        ReportLine::entry("Broker profile", broker.profile().label().to_string()),
        ReportLine::entry(
            "Intraday/overnight margins",
            format!("{:.0}/{:.0}", config.day_margin, config.overnight_margin),
        ),
        ReportLine::entry(
            "Beginning balance",
            format!("${:.2}", config.starting_balance),
        ),
        ReportLine::entry(
            "Ending balance (Gross)",
            format!("${:.2}", ledger.gross_balance()),
        ),
        ReportLine::entry("Ending balance (Net)", format!("${:.2}", net_balance)),
        ReportLine::entry("Trade volume", format!("{}", stats.total_volume)),
        ReportLine::entry(
            "Commissions paid",
            format!("${:.2}", stats.commission_total),
        ),
        ReportLine::entry("Slippage paid", format!("${:.2}", stats.slippage_total)),
        ReportLine::entry("Maximum drawdown", format!("{:.2}%", max_drawdown)),
        ReportLine::entry(
            "Total trades",
            format!(
                "{} ({} long, {} short)",
                stats.total_trades, stats.long_trades, stats.short_trades
            ),
        ),
        ReportLine::entry(
            "Winning percentage",
            format!(
                "{:.2}% ({:.2}% long, {:.2}% short)",
                safe_div(total_wins as f64 * 100.0, stats.total_trades as f64),
                safe_div(stats.long_wins as f64 * 100.0, total_wins as f64),
                safe_div(stats.short_wins as f64 * 100.0, total_wins as f64),
            ),
        ),
        ReportLine::entry("Stops reached", format!("{}", stats.stops_reached)),
        ReportLine::entry(
            "Average profit per trade",
            format!(
                "${:.2}",
                safe_div(stats.total_winnings, total_wins as f64)
            ),
        ),
        ReportLine::entry(
            "Average loss per trade",
            format!(
                "-${:.2}",
                safe_div(stats.total_losings, total_losses as f64)
            ),
        ),
        ReportLine::entry(
            "Largest winning streak, days",
            format!("{}", stats.max_winning_streak),
        ),
        ReportLine::entry(
            "Largest losing streak, days",
            format!("{}", stats.max_losing_streak),
        ),
        ReportLine::entry(
            "Profit factor",
            format!(
                "{:.2}",
                safe_div(stats.total_winnings, stats.total_losings)
            ),
        ),
        ReportLine::entry("Y/y yield", format!("{:.2}%", year_yield)),
        ReportLine::entry(
            "Sharpe ratio",
            format!("{:.2}", sharpe_ratio(ledger.balance_series())),
        ),
        ReportLine::entry(
            "Holiday events detected",
            format!("{}", events.holiday_events),
        ),
        ReportLine::entry("Bars missed", format!("{}", events.missed_bars)),
        ReportLine::entry("Error bars skipped", format!("{}", events.error_bars)),
        ReportLine::entry(
            "Invalid event records",
            format!("{}", events.invalid_records),
        ),
        ReportLine::entry("Valid events count", format!("{}", events.valid_events)),
        ReportLine::entry(
            "Unclosable trades removed",
            format!("{}", stats.zombie_trades),
        ),
        ReportLine::entry(
            "No day/overnight margins",
            format!("{}/{}", stats.no_day_margin, stats.no_overnight_margin),
        ),
    ];

    if !extra.is_empty() {
        lines.push(ReportLine::Blank);
        lines.push(ReportLine::Section("**** Additional info".into()));
        for (label, value) in extra {
            lines.push(ReportLine::entry(label, value.clone()));
        }
    }

    lines
}

/// Geometric yearly yield in percent over a whole-year span.
fn annualized_yield(net_balance: f64, starting_balance: f64, years: i32) -> f64 {
    let ratio = safe_div(net_balance, starting_balance);
    if ratio <= 0.0 {
        return -100.0;
    }
    (ratio.powf(1.0 / years as f64) - 1.0) * 100.0
}

/// Annualized mean-over-stddev of daily balance returns; 0 for flat or
/// too-short series.
fn sharpe_ratio(balance_series: &[SeriesPoint]) -> f64 {
    if balance_series.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = balance_series
        .windows(2)
        .map(|w| safe_div(w[1].value - w[0].value, w[0].value))
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return 0.0;
    }
    (mean / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
}
