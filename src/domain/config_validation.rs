//! Configuration validation.
//!
//! Every field is checked before any simulation work so a bad config fails
//! fast with a typed, fatal error instead of misbehaving mid-run.

use crate::domain::broker::BrokerProfile;
use crate::domain::error::EarntraderError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    validate_dates(config)?;
    validate_starting_balance(config)?;
    validate_margins(config)?;
    validate_slippage(config)?;
    validate_broker(config)?;
    validate_data_dir(config)?;
    validate_events(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    validate_price_range(config)?;
    validate_min_avg_volume(config)?;
    validate_portfolio(config)?;
    validate_max_volume(config)?;
    Ok(())
}

fn invalid(key: &str, reason: &str) -> EarntraderError {
    EarntraderError::ConfigInvalid {
        section: "backtest".to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn invalid_strategy(key: &str, reason: &str) -> EarntraderError {
    EarntraderError::ConfigInvalid {
        section: "strategy".to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    let start = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;
    if start >= end {
        return Err(invalid("start_date", "start_date must be before end_date"));
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, EarntraderError> {
    match value {
        None => Err(EarntraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| invalid(field, &format!("invalid {field} format, expected YYYY-MM-DD"))),
    }
}

fn validate_starting_balance(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    let value = config.get_double("backtest", "starting_balance", 0.0);
    if value <= 0.0 {
        return Err(invalid("starting_balance", "starting_balance must be positive"));
    }
    Ok(())
}

fn validate_margins(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    for key in ["day_margin", "overnight_margin"] {
        let value = config.get_double("backtest", key, 1.0);
        if value < 1.0 {
            return Err(invalid(key, "margin multiplier must be at least 1"));
        }
    }
    Ok(())
}

fn validate_slippage(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    let value = config.get_double("backtest", "slippage", 0.0);
    if value < 0.0 {
        return Err(invalid("slippage", "slippage must be non-negative"));
    }
    Ok(())
}

fn validate_broker(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    match config.get_string("backtest", "broker") {
        None => Err(EarntraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "broker".to_string(),
        }),
        Some(name) => match BrokerProfile::parse(&name) {
            Some(_) => Ok(()),
            None => Err(EarntraderError::UnsupportedBroker(name)),
        },
    }
}

fn validate_data_dir(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    match config.get_string("backtest", "data_dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(EarntraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "data_dir".to_string(),
        }),
    }
}

fn validate_events(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    for key in ["events", "events_file"] {
        match config.get_string("backtest", key) {
            Some(s) if !s.trim().is_empty() => {}
            _ => {
                return Err(EarntraderError::ConfigMissing {
                    section: "backtest".to_string(),
                    key: key.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn validate_price_range(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    let min = config.get_double("strategy", "price_min", 0.0);
    let max = config.get_double("strategy", "price_max", 0.0);
    if min < 0.0 {
        return Err(invalid_strategy("price_min", "price_min must be non-negative"));
    }
    if max <= min {
        return Err(invalid_strategy("price_max", "price_max must exceed price_min"));
    }
    Ok(())
}

fn validate_min_avg_volume(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    let value = config.get_double("strategy", "min_avg_volume", 0.0);
    if value < 0.0 {
        return Err(invalid_strategy(
            "min_avg_volume",
            "min_avg_volume must be non-negative",
        ));
    }
    Ok(())
}

fn validate_portfolio(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    let size = config.get_int("strategy", "portfolio_size", 0);
    if size <= 0 {
        return Err(invalid_strategy(
            "portfolio_size",
            "portfolio_size must be positive",
        ));
    }
    let risk = config.get_double("strategy", "portfolio_risk", 1.0);
    if risk <= 0.0 || risk > 1.0 {
        return Err(invalid_strategy(
            "portfolio_risk",
            "portfolio_risk must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_max_volume(config: &dyn ConfigPort) -> Result<(), EarntraderError> {
    let value = config.get_int("strategy", "max_volume", 0);
    if value <= 0 {
        return Err(invalid_strategy("max_volume", "max_volume must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn valid_config() -> String {
        "[backtest]\n\
         start_date = 2012-01-01\n\
         end_date = 2018-09-01\n\
         starting_balance = 10000\n\
         day_margin = 4\n\
         overnight_margin = 4\n\
         slippage = 0.0\n\
         broker = ib_cfd_strict\n\
         data_dir = data/daily\n\
         events = estimize\n\
         events_file = earnings/events.csv\n\
         \n\
         [strategy]\n\
         price_min = 5\n\
         price_max = 100\n\
         min_avg_volume = 0\n\
         portfolio_size = 20\n\
         portfolio_risk = 1.0\n\
         max_volume = 15000\n\
         long_same_day = true\n"
            .to_string()
    }

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn valid_config_passes_both_validators() {
        let config = adapter(&valid_config());
        assert!(validate_backtest_config(&config).is_ok());
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn missing_start_date_fails() {
        let content = valid_config().replace("start_date = 2012-01-01\n", "");
        let err = validate_backtest_config(&adapter(&content)).unwrap_err();
        assert!(matches!(
            err,
            EarntraderError::ConfigMissing { key, .. } if key == "start_date"
        ));
    }

    #[test]
    fn reversed_dates_fail() {
        let content = valid_config().replace("end_date = 2018-09-01", "end_date = 2011-09-01");
        let err = validate_backtest_config(&adapter(&content)).unwrap_err();
        assert!(matches!(err, EarntraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn bad_date_format_fails() {
        let content = valid_config().replace("2012-01-01", "01/01/2012");
        let err = validate_backtest_config(&adapter(&content)).unwrap_err();
        assert!(matches!(
            err,
            EarntraderError::ConfigInvalid { key, .. } if key == "start_date"
        ));
    }

    #[test]
    fn unknown_broker_is_fatal() {
        let content = valid_config().replace("broker = ib_cfd_strict", "broker = robinhood");
        let err = validate_backtest_config(&adapter(&content)).unwrap_err();
        assert!(matches!(
            err,
            EarntraderError::UnsupportedBroker(name) if name == "robinhood"
        ));
    }

    #[test]
    fn margin_below_one_fails() {
        let content = valid_config().replace("day_margin = 4", "day_margin = 0.5");
        let err = validate_backtest_config(&adapter(&content)).unwrap_err();
        assert!(matches!(
            err,
            EarntraderError::ConfigInvalid { key, .. } if key == "day_margin"
        ));
    }

    #[test]
    fn negative_balance_fails() {
        let content =
            valid_config().replace("starting_balance = 10000", "starting_balance = -1");
        assert!(validate_backtest_config(&adapter(&content)).is_err());
    }

    #[test]
    fn price_range_must_be_ordered() {
        let content = valid_config().replace("price_max = 100", "price_max = 4");
        let err = validate_strategy_config(&adapter(&content)).unwrap_err();
        assert!(matches!(
            err,
            EarntraderError::ConfigInvalid { key, .. } if key == "price_max"
        ));
    }

    #[test]
    fn portfolio_size_must_be_positive() {
        let content = valid_config().replace("portfolio_size = 20", "portfolio_size = 0");
        assert!(validate_strategy_config(&adapter(&content)).is_err());
    }

    #[test]
    fn portfolio_risk_bounded() {
        let content = valid_config().replace("portfolio_risk = 1.0", "portfolio_risk = 1.5");
        assert!(validate_strategy_config(&adapter(&content)).is_err());
    }
}
