//! Domain records flowing through the analysis pipeline
//!
//! Every record is created fresh per run and owned by the stage that produced
//! it. Numeric fields that may be missing use [`MetricValue`] so that "no data"
//! is never confused with a number.

pub mod metric;
pub mod price;
pub mod records;

pub use metric::{Metric, MetricValue};
pub use price::{PriceBar, normalize_bars};
pub use records::{
    FundamentalsRecord, ProviderQuote, Recommendation, ResolvedMetric, ScoreResult, Strategy,
    TechnicalsRecord,
};
