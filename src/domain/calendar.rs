//! Trading calendar: weekends plus exchange holidays.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::HashMap;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Default)]
pub struct Calendar {
    holidays: HashMap<NaiveDate, String>,
}

impl Calendar {
    pub fn new(holidays: HashMap<NaiveDate, String>) -> Self {
        Self { holidays }
    }

    /// US federal holidays for the given years, without observed-day shifting.
    pub fn us_federal(years: RangeInclusive<i32>) -> Self {
        let mut holidays = HashMap::new();
        for year in years {
            let mut add = |date: NaiveDate, name: &str| {
                holidays.insert(date, name.to_string());
            };
            add(ymd(year, 1, 1), "New Year's Day");
            add(nth_weekday(year, 1, Weekday::Mon, 3), "Martin Luther King Jr. Day");
            add(nth_weekday(year, 2, Weekday::Mon, 3), "Washington's Birthday");
            add(last_weekday(year, 5, Weekday::Mon), "Memorial Day");
            if year >= 2021 {
                add(ymd(year, 6, 19), "Juneteenth National Independence Day");
            }
            add(ymd(year, 7, 4), "Independence Day");
            add(nth_weekday(year, 9, Weekday::Mon, 1), "Labor Day");
            add(nth_weekday(year, 10, Weekday::Mon, 2), "Columbus Day");
            add(ymd(year, 11, 11), "Veterans Day");
            add(nth_weekday(year, 11, Weekday::Thu, 4), "Thanksgiving");
            add(ymd(year, 12, 25), "Christmas Day");
        }
        Self { holidays }
    }

    /// Reason the market is closed on `date`, or `None` on a trading day.
    pub fn day_off(&self, date: NaiveDate) -> Option<&str> {
        match date.weekday() {
            Weekday::Sat => Some("Weekend (Saturday)"),
            Weekday::Sun => Some("Weekend (Sunday)"),
            _ => self.holidays.get(&date).map(String::as_str),
        }
    }

    /// First trading day strictly after `from`.
    pub fn next_trading_day(&self, from: NaiveDate) -> NaiveDate {
        let mut date = from + Duration::days(1);
        while self.day_off(date).is_some() {
            date += Duration::days(1);
        }
        date
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid holiday date")
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let first = ymd(year, month, 1);
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    first + Duration::days(offset as i64 + 7 * (n as i64 - 1))
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let first_next = if month == 12 {
        ymd(year + 1, 1, 1)
    } else {
        ymd(year, month + 1, 1)
    };
    let mut date = first_next - Duration::days(1);
    while date.weekday() != weekday {
        date -= Duration::days(1);
    }
    date
}
