//! Alpha Vantage company overview

use super::{SharedRateLimiter, lenient_number, per_minute_limiter};
use crate::error::{Result, StockError};
use crate::models::{Metric, ProviderQuote};
use crate::resolver::FundamentalsProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

pub const PROVIDER_NAME: &str = "alpha_vantage";

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Alpha Vantage API client
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl AlphaVantageClient {
    /// Create a client; the free tier allows 5 requests per minute
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

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch the OVERVIEW function for a symbol
    #[instrument(skip(self))]
    pub async fn get_overview(&self, symbol: &str) -> Result<ProviderQuote> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "OVERVIEW"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let data: Value = response.error_for_status()?.json().await?;
        parse_overview(&data)
    }
}

#[async_trait]
impl FundamentalsProvider for AlphaVantageClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch(&self, symbol: &str) -> Result<ProviderQuote> {
        self.get_overview(symbol).await
    }
}

/// Parse an OVERVIEW payload
///
/// An unknown symbol comes back as `{}` and yields an empty quote.
pub fn parse_overview(data: &Value) -> Result<ProviderQuote> {
    if let Some(error) = data.get("Error Message") {
        return Err(StockError::AlphaVantageError(error.to_string()));
    }

    // Quota exhaustion arrives as a 200 with a Note or Information field
    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(StockError::RateLimitExceeded {
            provider: "Alpha Vantage".to_string(),
        });
    }

    Ok(ProviderQuote::new(PROVIDER_NAME)
        .with(Metric::DebtToEquity, lenient_number(data.get("DebtToEquity")))
        .with(Metric::CurrentRatio, lenient_number(data.get("CurrentRatio")))
        .with(
            Metric::ReturnOnEquity,
            lenient_number(data.get("ReturnOnEquityTTM")),
        )
        .with(
            Metric::RevenueGrowth,
            lenient_number(data.get("QuarterlyRevenueGrowthYOY")),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_overview() {
        let data = json!({
            "Symbol": "IBM",
            "ReturnOnEquityTTM": "0.335",
            "QuarterlyRevenueGrowthYOY": "0.015",
            "DebtToEquity": "None",
            "CurrentRatio": "1.02"
        });

        let quote = parse_overview(&data).unwrap();

        assert_eq!(quote.get(Metric::ReturnOnEquity), Some(0.335));
        assert_eq!(quote.get(Metric::RevenueGrowth), Some(0.015));
        assert_eq!(quote.get(Metric::CurrentRatio), Some(1.02));
        assert_eq!(quote.get(Metric::DebtToEquity), None);
    }

    #[test]
    fn test_unknown_symbol_is_empty() {
        assert!(parse_overview(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_rate_limit_note() {
        let data = json!({"Note": "Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day."});
        let err = parse_overview(&data).unwrap_err();
        assert!(err.is_transient());
    }
}
