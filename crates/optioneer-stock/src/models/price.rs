//! Daily OHLCV bars

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One daily bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Order bars by date and drop anything unusable
///
/// Bars with non-finite prices are discarded. When two bars share a date the
/// later one in the input wins. The result is strictly increasing by date.
pub fn normalize_bars(bars: Vec<PriceBar>) -> Vec<PriceBar> {
    let mut by_date = BTreeMap::new();
    for bar in bars.into_iter().filter(PriceBar::is_well_formed) {
        by_date.insert(bar.date, bar);
    }
    by_date.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn test_sorts_and_dedups() {
        let bars = normalize_bars(vec![bar(3, 12.0), bar(1, 10.0), bar(3, 13.0), bar(2, 11.0)]);

        let dates: Vec<u32> = bars.iter().map(|b| chrono::Datelike::day(&b.date)).collect();
        assert_eq!(dates, vec![1, 2, 3]);
        assert_eq!(bars[2].close, 13.0);
    }

    #[test]
    fn test_drops_non_finite() {
        let bars = normalize_bars(vec![bar(1, 10.0), bar(2, f64::NAN)]);
        assert_eq!(bars.len(), 1);
    }
}
