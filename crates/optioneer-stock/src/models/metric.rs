//! Metric identifiers and the unavailable sentinel

use serde::{Deserialize, Serialize};
use std::fmt;

/// A numeric reading or the explicit "no data" marker
///
/// Non-finite floats never survive construction: `NaN` and infinities become
/// [`MetricValue::Unavailable`]. Serializes as a JSON number or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum MetricValue {
    /// A finite value
    Available(f64),
    /// No usable value
    #[default]
    Unavailable,
}

impl MetricValue {
    /// The value, if available
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Available(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    /// Whether a value is present
    pub fn is_available(self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Apply a criterion; an unavailable value never passes
    pub fn passes(self, criterion: impl FnOnce(f64) -> bool) -> bool {
        self.value().is_some_and(criterion)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Self::Available(value)
        } else {
            Self::Unavailable
        }
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Unavailable, Self::from)
    }
}

impl From<MetricValue> for Option<f64> {
    fn from(value: MetricValue) -> Self {
        value.value()
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available(v) => match f.precision() {
                Some(p) => write!(f, "{v:.p$}"),
                None => write!(f, "{v}"),
            },
            Self::Unavailable => f.write_str("N/A"),
        }
    }
}

/// Fundamental metrics tracked by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    DebtToEquity,
    CurrentRatio,
    FreeCashFlow,
    ReturnOnEquity,
    RevenueGrowth,
}

impl Metric {
    /// The four metrics every run tracks
    pub const CORE: [Metric; 4] = [
        Metric::DebtToEquity,
        Metric::CurrentRatio,
        Metric::FreeCashFlow,
        Metric::ReturnOnEquity,
    ];

    /// Metrics tracked for a run, revenue growth only on request
    pub fn tracked(include_revenue_growth: bool) -> Vec<Metric> {
        let mut metrics = Self::CORE.to_vec();
        if include_revenue_growth {
            metrics.push(Metric::RevenueGrowth);
        }
        metrics
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            Self::DebtToEquity => "Debt-to-Equity Ratio",
            Self::CurrentRatio => "Current Ratio",
            Self::FreeCashFlow => "Free Cash Flow",
            Self::ReturnOnEquity => "Return on Equity (%)",
            Self::RevenueGrowth => "Revenue Growth (%)",
        }
    }

    /// Providers report these as fractions (0.15 for 15%)
    pub fn is_fractional(self) -> bool {
        matches!(self, Self::ReturnOnEquity | Self::RevenueGrowth)
    }

    /// Convert a raw provider reading into the canonical unit
    pub fn normalize(self, raw: f64) -> f64 {
        if self.is_fractional() { raw * 100.0 } else { raw }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_becomes_unavailable() {
        assert_eq!(MetricValue::from(f64::NAN), MetricValue::Unavailable);
        assert_eq!(MetricValue::from(f64::INFINITY), MetricValue::Unavailable);
        assert_eq!(MetricValue::from(1.5), MetricValue::Available(1.5));
    }

    #[test]
    fn test_unavailable_never_passes() {
        assert!(!MetricValue::Unavailable.passes(|_| true));
        assert!(MetricValue::Available(3.0).passes(|v| v > 2.0));
    }

    #[test]
    fn test_serializes_as_number_or_null() {
        let json = serde_json::to_string(&vec![MetricValue::Available(2.5), MetricValue::Unavailable])
            .unwrap();
        assert_eq!(json, "[2.5,null]");

        let parsed: Vec<MetricValue> = serde_json::from_str("[1.0,null]").unwrap();
        assert_eq!(parsed, vec![MetricValue::Available(1.0), MetricValue::Unavailable]);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{:.2}", MetricValue::Available(1.23456)), "1.23");
        assert_eq!(format!("{:.2}", MetricValue::Unavailable), "N/A");
    }

    #[test]
    fn test_roe_normalization() {
        assert!((Metric::ReturnOnEquity.normalize(0.15) - 15.0).abs() < 1e-9);
        assert!((Metric::DebtToEquity.normalize(0.4) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_tracked_metrics() {
        assert_eq!(Metric::tracked(false).len(), 4);
        assert!(Metric::tracked(true).contains(&Metric::RevenueGrowth));
    }
}
