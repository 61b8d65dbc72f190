//! Technical indicators over a daily close series
//!
//! Every reading is a [`MetricValue`]; short or degenerate input yields
//! `Unavailable` rather than an error.

use crate::models::{MetricValue, PriceBar, TechnicalsRecord};
use ta::Next;
use ta::indicators::{MovingAverageConvergenceDivergence, SimpleMovingAverage};

pub const RSI_PERIOD: usize = 14;
pub const SMA_PERIOD: usize = 20;
pub const PERFORMANCE_WINDOWS: [usize; 3] = [7, 30, 60];

/// Compute the full technicals record for a normalized bar series
pub fn compute_technicals(bars: &[PriceBar]) -> TechnicalsRecord {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let Some(&latest) = closes.last() else {
        return TechnicalsRecord::empty();
    };

    let [perf_7d, perf_30d, perf_60d] = PERFORMANCE_WINDOWS.map(|n| performance(&closes, n));

    TechnicalsRecord {
        current_price: MetricValue::from(latest),
        rsi: rsi(&closes, RSI_PERIOD),
        macd_histogram: macd_histogram(&closes),
        perf_7d,
        perf_30d,
        perf_60d,
        sma_20: sma(&closes, SMA_PERIOD),
    }
}

/// RSI from simple means of the trailing `period` close-to-close moves
///
/// Needs `period + 1` closes. A window with no losses has no defined ratio
/// and reports `Unavailable`.
pub fn rsi(closes: &[f64], period: usize) -> MetricValue {
    if period == 0 || closes.len() < period + 1 {
        return MetricValue::Unavailable;
    }

    let window = &closes[closes.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(g, l), delta| {
            if delta > 0.0 {
                (g + delta, l)
            } else {
                (g, l - delta)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return MetricValue::Unavailable;
    }

    let rs = avg_gain / avg_loss;
    MetricValue::from(100.0 - 100.0 / (1.0 + rs))
}

/// MACD(12, 26, 9) histogram at the latest close
pub fn macd_histogram(closes: &[f64]) -> MetricValue {
    let Ok(mut macd) = MovingAverageConvergenceDivergence::new(12, 26, 9) else {
        return MetricValue::Unavailable;
    };

    closes
        .iter()
        .map(|&close| macd.next(close).histogram)
        .last()
        .map_or(MetricValue::Unavailable, MetricValue::from)
}

/// Percent change from the first close of the trailing `window`-bar span
///
/// With fewer than `window` closes the earliest close is the reference.
pub fn performance(closes: &[f64], window: usize) -> MetricValue {
    let Some(&latest) = closes.last() else {
        return MetricValue::Unavailable;
    };
    if window == 0 {
        return MetricValue::Unavailable;
    }

    let reference = closes[closes.len().saturating_sub(window)];
    if reference == 0.0 {
        return MetricValue::Unavailable;
    }

    MetricValue::from((latest / reference - 1.0) * 100.0)
}

/// Simple moving average of the last `period` closes
pub fn sma(closes: &[f64], period: usize) -> MetricValue {
    if closes.len() < period {
        return MetricValue::Unavailable;
    }
    let Ok(mut sma) = SimpleMovingAverage::new(period) else {
        return MetricValue::Unavailable;
    };

    closes[closes.len() - period..]
        .iter()
        .map(|&close| sma.next(close))
        .last()
        .map_or(MetricValue::Unavailable, MetricValue::from)
}
