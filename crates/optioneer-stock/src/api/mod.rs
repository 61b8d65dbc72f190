//! API clients for market data and fundamentals providers

pub mod alpha_vantage;
pub mod fmp;
pub mod ibkr;
pub mod yahoo;

pub use alpha_vantage::AlphaVantageClient;
pub use fmp::FmpClient;
pub use ibkr::IbkrLiveFeed;
pub use yahoo::YahooClient;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

pub(crate) type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Per-minute limiter shared by every clone of a client
pub(crate) fn per_minute_limiter(requests_per_minute: u32) -> SharedRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Parse a numeric field that providers sometimes send as a string
///
/// `"None"`, `"-"` and empty strings mean missing.
pub(crate) fn lenient_number(value: Option<&serde_json::Value>) -> Option<f64> {
    let number = match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => match s.trim() {
            "" | "None" | "-" | "N/A" => None,
            other => other.parse().ok(),
        },
        _ => None,
    };
    number.filter(|v| v.is_finite())
}
