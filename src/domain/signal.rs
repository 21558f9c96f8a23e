//! Scanner signal events and their calendar-week grouping.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub symbol_id: i64,
    pub symbol: String,
    pub signal_date: NaiveDate,
    /// Feed the signal came from, usually the scanner file stem.
    pub source: String,
}

impl Signal {
    pub fn week_start(&self) -> NaiveDate {
        week_start(self.signal_date)
    }
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Partition signals by the Monday of their week. Input order is kept
/// inside each week.
pub fn group_by_week(signals: &[Signal]) -> BTreeMap<NaiveDate, Vec<Signal>> {
    let mut weeks: BTreeMap<NaiveDate, Vec<Signal>> = BTreeMap::new();
    for signal in signals {
        weeks
            .entry(signal.week_start())
            .or_default()
            .push(signal.clone());
    }
    weeks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn signal(symbol: &str, d: NaiveDate) -> Signal {
        Signal {
            symbol_id: 1,
            symbol: symbol.to_string(),
            signal_date: d,
            source: "test".to_string(),
        }
    }

    #[test]
    fn week_start_is_monday() {
        // 2025-01-13 is a Monday
        assert_eq!(week_start(date(2025, 1, 13)), date(2025, 1, 13));
        assert_eq!(week_start(date(2025, 1, 15)), date(2025, 1, 13));
        assert_eq!(week_start(date(2025, 1, 19)), date(2025, 1, 13));
        assert_eq!(week_start(date(2025, 1, 20)), date(2025, 1, 20));
    }

    #[test]
    fn week_start_crosses_year_boundary() {
        // 2025-01-01 is a Wednesday
        assert_eq!(week_start(date(2025, 1, 1)), date(2024, 12, 30));
    }

    #[test]
    fn group_by_week_orders_weeks_and_keeps_input_order() {
        let signals = vec![
            signal("B", date(2025, 1, 22)),
            signal("A", date(2025, 1, 14)),
            signal("C", date(2025, 1, 20)),
            signal("D", date(2025, 1, 13)),
        ];
        let weeks = group_by_week(&signals);

        let keys: Vec<_> = weeks.keys().copied().collect();
        assert_eq!(keys, vec![date(2025, 1, 13), date(2025, 1, 20)]);

        let first: Vec<_> = weeks[&date(2025, 1, 13)]
            .iter()
            .map(|s| s.symbol.as_str())
            .collect();
        assert_eq!(first, vec!["A", "D"]);

        let second: Vec<_> = weeks[&date(2025, 1, 20)]
            .iter()
            .map(|s| s.symbol.as_str())
            .collect();
        assert_eq!(second, vec!["B", "C"]);
    }
}
