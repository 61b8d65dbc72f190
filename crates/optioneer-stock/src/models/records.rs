//! Fundamentals, technicals, scores and recommendations

use super::metric::{Metric, MetricValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw metric bag returned by one fundamentals provider
///
/// ROE and revenue growth are fractions here; D/E is a plain ratio.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderQuote {
    pub provider: String,
    pub values: BTreeMap<Metric, f64>,
}

impl ProviderQuote {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            values: BTreeMap::new(),
        }
    }

    /// Record a reading, ignoring absent or non-finite values
    pub fn with(mut self, metric: Metric, value: Option<f64>) -> Self {
        self.insert(metric, value);
        self
    }

    pub fn insert(&mut self, metric: Metric, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.values.insert(metric, v);
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fill metrics missing here from `other`
    pub fn merge_missing(&mut self, other: &ProviderQuote) {
        for (metric, value) in &other.values {
            self.values.entry(*metric).or_insert(*value);
        }
    }
}

/// A resolved metric and the provider it came from
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedMetric {
    pub value: MetricValue,
    pub source: Option<String>,
}

/// Per-symbol fundamentals after ranked resolution
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    metrics: BTreeMap<Metric, ResolvedMetric>,
}

impl FundamentalsRecord {
    pub(crate) fn from_resolved(metrics: BTreeMap<Metric, ResolvedMetric>) -> Self {
        Self { metrics }
    }

    /// Build a record from already-normalized values without provenance
    pub fn from_values(values: impl IntoIterator<Item = (Metric, MetricValue)>) -> Self {
        let metrics = values
            .into_iter()
            .map(|(metric, value)| {
                (
                    metric,
                    ResolvedMetric {
                        value,
                        source: None,
                    },
                )
            })
            .collect();
        Self { metrics }
    }

    /// Value for a metric; untracked metrics are unavailable
    pub fn get(&self, metric: Metric) -> MetricValue {
        self.metrics
            .get(&metric)
            .map_or(MetricValue::Unavailable, |m| m.value)
    }

    /// Provider that supplied a metric
    pub fn source(&self, metric: Metric) -> Option<&str> {
        self.metrics.get(&metric).and_then(|m| m.source.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &ResolvedMetric)> {
        self.metrics.iter().map(|(k, v)| (*k, v))
    }

    /// Tracked metrics that no provider could supply
    pub fn unavailable(&self) -> Vec<Metric> {
        self.metrics
            .iter()
            .filter(|(_, m)| !m.value.is_available())
            .map(|(k, _)| *k)
            .collect()
    }
}

/// Indicator readings at the latest bar
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TechnicalsRecord {
    pub current_price: MetricValue,
    pub rsi: MetricValue,
    pub macd_histogram: MetricValue,
    pub perf_7d: MetricValue,
    pub perf_30d: MetricValue,
    pub perf_60d: MetricValue,
    pub sma_20: MetricValue,
}

impl TechnicalsRecord {
    /// Every field unavailable
    pub fn empty() -> Self {
        Self::default()
    }

    /// Performance readings keyed by window length
    pub fn performance(&self) -> [(usize, MetricValue); 3] {
        [(7, self.perf_7d), (30, self.perf_30d), (60, self.perf_60d)]
    }
}

/// Weighted scores, fundamentals 0-6 and technicals 0-4
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub fundamental: f64,
    pub technical: f64,
    pub composite: f64,
    pub fundamental_points: u32,
    pub fundamental_max_points: u32,
    pub technical_points: u32,
    pub technical_max_points: u32,
}

/// Put-selling posture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Aggressive,
    Moderate,
    Conservative,
}

impl Strategy {
    pub fn label(self) -> &'static str {
        match self {
            Self::Aggressive => "Aggressive (ATM/ITM)",
            Self::Moderate => "Moderate (Near ATM)",
            Self::Conservative => "Conservative (OTM)",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Suggested cash-secured put parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub expiration_days: u32,
    pub target_delta: u32,
    pub strike: f64,
    pub strategy: Strategy,
}
