//! Ranked fundamentals resolution across providers

use crate::error::Result;
use crate::models::{FundamentalsRecord, Metric, MetricValue, ProviderQuote, ResolvedMetric};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A source of raw fundamental metrics for a symbol
///
/// Implementations report ROE and revenue growth as fractions. Missing fields
/// are simply left out of the returned quote.
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    /// Provider name, used for provenance and logging
    fn name(&self) -> &str;

    async fn fetch(&self, symbol: &str) -> Result<ProviderQuote>;
}

#[async_trait]
impl<P: FundamentalsProvider + ?Sized> FundamentalsProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(&self, symbol: &str) -> Result<ProviderQuote> {
        (**self).fetch(symbol).await
    }
}

/// Merge provider quotes in rank order
///
/// For each metric independently the first quote carrying a finite value
/// wins. Fractional metrics are scaled to percent here, once.
pub fn merge_ranked(quotes: &[ProviderQuote], metrics: &[Metric]) -> FundamentalsRecord {
    let resolved = metrics
        .iter()
        .map(|&metric| {
            let winner = quotes.iter().find_map(|quote| {
                quote
                    .get(metric)
                    .filter(|v| v.is_finite())
                    .map(|v| (quote.provider.as_str(), v))
            });

            let entry = match winner {
                Some((provider, raw)) => ResolvedMetric {
                    value: MetricValue::from(metric.normalize(raw)),
                    source: Some(provider.to_string()),
                },
                None => ResolvedMetric::default(),
            };
            (metric, entry)
        })
        .collect::<BTreeMap<_, _>>();

    FundamentalsRecord::from_resolved(resolved)
}

/// Resolves fundamentals from an ordered provider list
#[derive(Clone)]
pub struct FundamentalsResolver {
    providers: Vec<Arc<dyn FundamentalsProvider>>,
}

impl FundamentalsResolver {
    /// Providers are ranked by position, first is primary
    pub fn new(providers: Vec<Arc<dyn FundamentalsProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetch from every provider concurrently and merge by rank
    ///
    /// A failing provider contributes nothing; resolution never aborts.
    #[instrument(skip(self), fields(providers = self.providers.len()))]
    pub async fn resolve(&self, symbol: &str, metrics: &[Metric]) -> FundamentalsRecord {
        let fetches = self.providers.iter().map(|provider| async move {
            match provider.fetch(symbol).await {
                Ok(quote) => {
                    debug!(provider = provider.name(), fields = quote.values.len(), "Provider responded");
                    quote
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Provider unavailable");
                    ProviderQuote::new(provider.name())
                }
            }
        });

        let quotes = join_all(fetches).await;
        let record = merge_ranked(&quotes, metrics);

        let missing = record.unavailable();
        if !missing.is_empty() {
            warn!(symbol, ?missing, "Fundamentals unavailable from every provider");
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StockError;

    struct Fixed(ProviderQuote);

    #[async_trait]
    impl FundamentalsProvider for Fixed {
        fn name(&self) -> &str {
            &self.0.provider
        }

        async fn fetch(&self, _symbol: &str) -> Result<ProviderQuote> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl FundamentalsProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self, symbol: &str) -> Result<ProviderQuote> {
            Err(StockError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "down".to_string(),
            })
        }
    }

    #[test]
    fn test_primary_wins_even_when_unfavorable() {
        let primary = ProviderQuote::new("primary").with(Metric::DebtToEquity, Some(3.5));
        let secondary = ProviderQuote::new("secondary").with(Metric::DebtToEquity, Some(0.2));

        let record = merge_ranked(&[primary, secondary], &Metric::CORE);

        assert_eq!(record.get(Metric::DebtToEquity), MetricValue::Available(3.5));
        assert_eq!(record.source(Metric::DebtToEquity), Some("primary"));
    }

    #[test]
    fn test_falls_back_and_normalizes() {
        let primary = ProviderQuote::new("primary").with(Metric::CurrentRatio, Some(1.8));
        let secondary = ProviderQuote::new("secondary").with(Metric::ReturnOnEquity, Some(0.15));

        let record = merge_ranked(&[primary, secondary], &Metric::CORE);

        let roe = record.get(Metric::ReturnOnEquity).value().unwrap();
        assert!((roe - 15.0).abs() < 1e-9);
        assert_eq!(record.source(Metric::ReturnOnEquity), Some("secondary"));
    }

    #[test]
    fn test_falls_through_to_tertiary() {
        let primary = ProviderQuote::new("yahoo").with(Metric::DebtToEquity, Some(0.4));
        let secondary = ProviderQuote::new("fmp").with(Metric::CurrentRatio, Some(1.9));
        let tertiary = ProviderQuote::new("alpha_vantage")
            .with(Metric::DebtToEquity, Some(2.0))
            .with(Metric::FreeCashFlow, Some(5_000.0));

        let record = merge_ranked(&[primary, secondary, tertiary], &Metric::CORE);

        assert_eq!(record.get(Metric::FreeCashFlow), MetricValue::Available(5_000.0));
        assert_eq!(record.source(Metric::FreeCashFlow), Some("alpha_vantage"));
        assert_eq!(record.source(Metric::DebtToEquity), Some("yahoo"));
        assert_eq!(record.source(Metric::CurrentRatio), Some("fmp"));
        assert_eq!(record.get(Metric::ReturnOnEquity), MetricValue::Unavailable);
    }

    #[test]
    fn test_missing_everywhere_is_unavailable() {
        let record = merge_ranked(&[ProviderQuote::new("empty")], &Metric::tracked(true));

        assert_eq!(record.get(Metric::FreeCashFlow), MetricValue::Unavailable);
        assert_eq!(record.unavailable().len(), 5);
        assert_eq!(record.source(Metric::FreeCashFlow), None);
    }

    #[tokio::test]
    async fn test_resolver_skips_failing_provider() {
        let resolver = FundamentalsResolver::new(vec![
            Arc::new(Failing),
            Arc::new(Fixed(
                ProviderQuote::new("backup")
                    .with(Metric::FreeCashFlow, Some(1_000.0))
                    .with(Metric::RevenueGrowth, Some(0.08)),
            )),
        ]);

        let record = resolver.resolve("AAPL", &Metric::tracked(true)).await;

        assert_eq!(record.get(Metric::FreeCashFlow), MetricValue::Available(1_000.0));
        assert_eq!(record.source(Metric::FreeCashFlow), Some("backup"));
        let growth = record.get(Metric::RevenueGrowth).value().unwrap();
        assert!((growth - 8.0).abs() < 1e-9);
        assert_eq!(resolver.provider_names(), vec!["failing", "backup"]);
    }
}
