//! Financial Modeling Prep ratios and key metrics

use super::{SharedRateLimiter, lenient_number, per_minute_limiter};
use crate::error::{Result, StockError};
use crate::models::{Metric, ProviderQuote};
use crate::resolver::FundamentalsProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const PROVIDER_NAME: &str = "fmp";

const BASE_URL: &str = "https://financialmodelingprep.com/api/v3";

/// Financial Modeling Prep client
#[derive(Debug, Clone)]
pub struct FmpClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl FmpClient {
    pub fn new(
        api_key: impl Into<String>,
        requests_per_minute: u32,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            rate_limiter: per_minute_limiter(requests_per_minute),
        })
    }

    /// Point the client at another host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_latest(&self, endpoint: &str, symbol: &str) -> Result<Option<Value>> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(format!("{}/{endpoint}/{symbol}", self.base_url))
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(StockError::RateLimitExceeded {
                    provider: PROVIDER_NAME.to_string(),
                });
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(StockError::FmpError(format!(
                    "{endpoint} rejected the API key"
                )));
            }
            _ => {}
        }

        let body: Value = response.error_for_status()?.json().await?;
        latest_entry(body)
    }

    /// Ratios and key metrics merged into one quote
    ///
    /// Each endpoint contributes independently; the fetch fails only when
    /// both do.
    #[instrument(skip(self))]
    pub async fn fetch_quote(&self, symbol: &str) -> Result<ProviderQuote> {
        let (ratios, metrics) = tokio::join!(
            self.get_latest("ratios", symbol),
            self.get_latest("key-metrics", symbol)
        );
        merge_endpoints(ratios, metrics)
    }
}

fn merge_endpoints(
    ratios: Result<Option<Value>>,
    metrics: Result<Option<Value>>,
) -> Result<ProviderQuote> {
    let mut quote = ProviderQuote::new(PROVIDER_NAME);
    match (ratios, metrics) {
        (Err(e), Err(other)) => {
            debug!(error = %other, "FMP key metrics failed");
            Err(e)
        }
        (ratios, metrics) => {
            match ratios {
                Ok(Some(entry)) => quote.merge_missing(&parse_ratios(&entry)),
                Ok(None) => debug!("No FMP ratios"),
                Err(e) => warn!(error = %e, "FMP ratios failed"),
            }
            match metrics {
                Ok(Some(entry)) => quote.merge_missing(&parse_key_metrics(&entry)),
                Ok(None) => debug!("No FMP key metrics"),
                Err(e) => warn!(error = %e, "FMP key metrics failed"),
            }
            Ok(quote)
        }
    }
}

#[async_trait]
impl FundamentalsProvider for FmpClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch(&self, symbol: &str) -> Result<ProviderQuote> {
        self.fetch_quote(symbol).await
    }
}

/// Most recent period from an FMP array response
fn latest_entry(body: Value) -> Result<Option<Value>> {
    match body {
        Value::Array(entries) => Ok(entries.into_iter().next()),
        Value::Object(obj) => match obj.get("Error Message").and_then(Value::as_str) {
            Some(message) => Err(StockError::FmpError(message.to_string())),
            None => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Fields from one `/ratios` entry
pub fn parse_ratios(entry: &Value) -> ProviderQuote {
    ProviderQuote::new(PROVIDER_NAME)
        .with(Metric::DebtToEquity, lenient_number(entry.get("debtEquityRatio")))
        .with(Metric::CurrentRatio, lenient_number(entry.get("currentRatio")))
        .with(Metric::ReturnOnEquity, lenient_number(entry.get("returnOnEquity")))
}

/// Fields from one `/key-metrics` entry
pub fn parse_key_metrics(entry: &Value) -> ProviderQuote {
    ProviderQuote::new(PROVIDER_NAME)
        .with(
            Metric::FreeCashFlow,
            lenient_number(entry.get("freeCashFlowPerShare")),
        )
        .with(Metric::RevenueGrowth, lenient_number(entry.get("revenueGrowth")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ratios() {
        let body = json!([
            {"symbol": "AAPL", "date": "2024-09-28", "debtEquityRatio": 1.87, "currentRatio": 0.87, "returnOnEquity": 1.64},
            {"symbol": "AAPL", "date": "2023-09-30", "debtEquityRatio": 1.79, "currentRatio": 0.99, "returnOnEquity": 1.56}
        ]);

        let latest = latest_entry(body).unwrap().unwrap();
        let quote = parse_ratios(&latest);

        assert_eq!(quote.get(Metric::DebtToEquity), Some(1.87));
        assert_eq!(quote.get(Metric::CurrentRatio), Some(0.87));
        assert_eq!(quote.get(Metric::ReturnOnEquity), Some(1.64));
        assert_eq!(quote.get(Metric::FreeCashFlow), None);
    }

    #[test]
    fn test_parse_key_metrics() {
        let entry = json!({"freeCashFlowPerShare": 7.09, "revenueGrowth": null});
        let quote = parse_key_metrics(&entry);

        assert_eq!(quote.get(Metric::FreeCashFlow), Some(7.09));
        assert_eq!(quote.get(Metric::RevenueGrowth), None);
    }

    #[test]
    fn test_empty_and_error_bodies() {
        assert!(latest_entry(json!([])).unwrap().is_none());

        let error = json!({"Error Message": "Invalid API KEY."});
        assert!(matches!(latest_entry(error), Err(StockError::FmpError(_))));
    }

    #[test]
    fn test_key_metrics_survive_ratios_failure() {
        let ratios = Err(StockError::RateLimitExceeded {
            provider: PROVIDER_NAME.to_string(),
        });
        let metrics = Ok(Some(json!({"freeCashFlowPerShare": 7.09, "revenueGrowth": 0.02})));

        let quote = merge_endpoints(ratios, metrics).unwrap();

        assert_eq!(quote.get(Metric::FreeCashFlow), Some(7.09));
        assert_eq!(quote.get(Metric::RevenueGrowth), Some(0.02));
        assert_eq!(quote.get(Metric::DebtToEquity), None);
    }

    #[test]
    fn test_merge_fails_only_when_both_endpoints_fail() {
        let ratios = Err(StockError::FmpError("ratios rejected the API key".to_string()));
        let metrics = Err(StockError::FmpError("key-metrics rejected the API key".to_string()));

        let result = merge_endpoints(ratios, metrics);

        assert!(matches!(result, Err(StockError::FmpError(msg)) if msg.starts_with("ratios")));
    }

    #[test]
    fn test_ratios_alone_make_a_quote() {
        let ratios = Ok(Some(json!({"debtEquityRatio": 0.4, "currentRatio": 2.1})));
        let metrics = Err(StockError::FmpError("key-metrics down".to_string()));

        let quote = merge_endpoints(ratios, metrics).unwrap();

        assert_eq!(quote.get(Metric::DebtToEquity), Some(0.4));
        assert_eq!(quote.get(Metric::FreeCashFlow), None);
    }

    #[tokio::test]
    #[ignore] // Requires network access and FMP_API_KEY
    async fn test_fetch_quote() {
        let key = std::env::var("FMP_API_KEY").unwrap();
        let client = FmpClient::new(key, 10, Duration::from_secs(10)).unwrap();
        let quote = client.fetch("AAPL").await.unwrap();
        assert!(!quote.is_empty());
    }
}
