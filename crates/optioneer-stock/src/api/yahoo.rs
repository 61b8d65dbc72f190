//! Yahoo Finance client: delayed daily history and the fundamentals snapshot

use crate::error::{Result, StockError};
use crate::history::DelayedQuotes;
use crate::models::{Metric, PriceBar, ProviderQuote};
use crate::resolver::FundamentalsProvider;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

pub const PROVIDER_NAME: &str = "yahoo";

const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const REFERER: &str = "https://finance.yahoo.com/";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Yahoo Finance client
///
/// Session cookies live in the client's cookie jar; the crumb that pairs with
/// them is fetched lazily and refreshed once on an auth rejection.
pub struct YahooClient {
    http: reqwest::Client,
    crumb: Mutex<Option<String>>,
}

impl YahooClient {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            crumb: Mutex::new(None),
        })
    }

    async fn crumb(&self) -> Result<String> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie endpoint answers 404 but still sets the session cookie.
        let _ = self
            .http
            .get(COOKIE_URL)
            .header("referer", REFERER)
            .send()
            .await?;

        let response = self
            .http
            .get(CRUMB_URL)
            .header("referer", REFERER)
            .send()
            .await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(StockError::RateLimitExceeded {
                provider: PROVIDER_NAME.to_string(),
            });
        }
        let body = response.error_for_status()?.text().await?;
        let crumb = body.trim();

        if crumb.is_empty() || crumb.len() > 100 || crumb.contains(' ') || crumb.contains('<') {
            return Err(StockError::YahooFinanceError(
                "could not obtain a session crumb".to_string(),
            ));
        }

        *cached = Some(crumb.to_string());
        Ok(crumb.to_string())
    }

    async fn request_summary(&self, symbol: &str) -> Result<reqwest::Response> {
        let crumb = self.crumb().await?;
        let response = self
            .http
            .get(format!("{SUMMARY_URL}/{symbol}"))
            .header("referer", REFERER)
            .query(&[("modules", "financialData"), ("crumb", crumb.as_str())])
            .send()
            .await?;
        Ok(response)
    }

    /// Fetch the quoteSummary financial data for a symbol
    #[instrument(skip(self))]
    pub async fn fetch_summary(&self, symbol: &str) -> Result<ProviderQuote> {
        let mut response = self.request_summary(symbol).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("Yahoo crumb rejected, refreshing");
            *self.crumb.lock().await = None;
            response = self.request_summary(symbol).await?;
        }

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(StockError::RateLimitExceeded {
                provider: PROVIDER_NAME.to_string(),
            }),
            StatusCode::NOT_FOUND => Err(StockError::InvalidSymbol(symbol.to_string())),
            _ => {
                let body = response.error_for_status()?.text().await?;
                parse_quote_summary(&body)
            }
        }
    }
}

#[async_trait]
impl DelayedQuotes for YahooClient {
    #[instrument(skip(self))]
    async fn history(&self, symbol: &str, period: &str) -> Result<Vec<PriceBar>> {
        let provider = yahoo::YahooConnector::new()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        let response = provider
            .get_quote_range(symbol, "1d", period)
            .await
            .map_err(|e| chart_error(symbol, e))?;

        let quotes = response
            .quotes()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        let bars: Vec<PriceBar> = quotes
            .iter()
            .filter_map(|q| {
                let date = DateTime::from_timestamp(q.timestamp as i64, 0)?.date_naive();
                Some(PriceBar {
                    date,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                })
            })
            .collect();

        debug!(bars = bars.len(), "Yahoo history received");
        Ok(bars)
    }

    async fn snapshot_info(&self, symbol: &str) -> Result<ProviderQuote> {
        self.fetch_summary(symbol).await
    }
}

#[async_trait]
impl FundamentalsProvider for YahooClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch(&self, symbol: &str) -> Result<ProviderQuote> {
        self.snapshot_info(symbol).await
    }
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryData,
}

#[derive(Debug, Deserialize)]
struct SummaryData {
    #[serde(default)]
    result: Option<Vec<SummaryResult>>,
    #[serde(default)]
    error: Option<SummaryError>,
}

#[derive(Debug, Deserialize)]
struct SummaryError {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    #[serde(default)]
    financial_data: Option<FinancialData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FinancialData {
    debt_to_equity: Option<RawValue>,
    current_ratio: Option<RawValue>,
    free_cashflow: Option<RawValue>,
    return_on_equity: Option<RawValue>,
    revenue_growth: Option<RawValue>,
}

/// `{"raw": 1.23, "fmt": "1.23"}`, or `{}` when Yahoo has nothing
#[derive(Debug, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

fn raw(value: Option<&RawValue>) -> Option<f64> {
    value.and_then(|v| v.raw)
}

/// Parse a quoteSummary body into a provider quote
///
/// Yahoo reports debt-to-equity in percent; it is converted to a plain ratio
/// here. ROE and revenue growth stay fractional.
pub fn parse_quote_summary(body: &str) -> Result<ProviderQuote> {
    let envelope: SummaryEnvelope = serde_json::from_str(body)?;

    if let Some(error) = envelope.quote_summary.error {
        return Err(StockError::YahooFinanceError(error.description));
    }

    let data = envelope
        .quote_summary
        .result
        .and_then(|results| results.into_iter().next())
        .and_then(|result| result.financial_data)
        .unwrap_or_default();

    Ok(ProviderQuote::new(PROVIDER_NAME)
        .with(
            Metric::DebtToEquity,
            raw(data.debt_to_equity.as_ref()).map(|pct| pct / 100.0),
        )
        .with(Metric::CurrentRatio, raw(data.current_ratio.as_ref()))
        .with(Metric::FreeCashFlow, raw(data.free_cashflow.as_ref()))
        .with(Metric::ReturnOnEquity, raw(data.return_on_equity.as_ref()))
        .with(Metric::RevenueGrowth, raw(data.revenue_growth.as_ref())))
}

/// Dropped or timed-out chart connections are worth retrying
fn chart_error(symbol: &str, error: yahoo::YahooError) -> StockError {
    match error {
        yahoo::YahooError::ConnectionFailed(e) if e.is_timeout() || e.is_connect() => {
            StockError::Timeout {
                operation: format!("yahoo chart for {symbol}: {e}"),
            }
        }
        other => StockError::YahooFinanceError(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str = r#"{
        "quoteSummary": {
            "result": [{
                "financialData": {
                    "currentPrice": {"raw": 189.5, "fmt": "189.50"},
                    "debtToEquity": {"raw": 145.0, "fmt": "145.00%"},
                    "currentRatio": {"raw": 0.99, "fmt": "0.99"},
                    "freeCashflow": {"raw": 84726874112, "fmt": "84.73B"},
                    "returnOnEquity": {"raw": 1.5, "fmt": "150.00%"},
                    "revenueGrowth": {}
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_quote_summary() {
        let quote = parse_quote_summary(SUMMARY).unwrap();

        assert_eq!(quote.provider, "yahoo");
        assert!((quote.get(Metric::DebtToEquity).unwrap() - 1.45).abs() < 1e-9);
        assert_eq!(quote.get(Metric::CurrentRatio), Some(0.99));
        assert_eq!(quote.get(Metric::FreeCashFlow), Some(84_726_874_112.0));
        assert_eq!(quote.get(Metric::ReturnOnEquity), Some(1.5));
        assert_eq!(quote.get(Metric::RevenueGrowth), None);
    }

    #[test]
    fn test_parse_quote_summary_error() {
        let body = r#"{"quoteSummary": {"result": null, "error": {"code": "Not Found", "description": "Quote not found for symbol: ZZZZ"}}}"#;
        let result = parse_quote_summary(body);
        assert!(matches!(result, Err(StockError::YahooFinanceError(msg)) if msg.contains("ZZZZ")));
    }

    #[test]
    fn test_parse_quote_summary_without_financial_data() {
        let body = r#"{"quoteSummary": {"result": [{}], "error": null}}"#;
        assert!(parse_quote_summary(body).unwrap().is_empty());
    }

    #[test]
    fn test_chart_error_without_data_is_permanent() {
        let error = chart_error("ZZZZ", yahoo::YahooError::NoResult);
        assert!(matches!(error, StockError::YahooFinanceError(_)));
        assert!(!error.is_transient());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_history() {
        let client = YahooClient::new(Duration::from_secs(10)).unwrap();
        let bars = client.history("AAPL", "3mo").await.unwrap();
        assert!(bars.len() > 40);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_summary() {
        let client = YahooClient::new(Duration::from_secs(10)).unwrap();
        let quote = client.fetch("MSFT").await.unwrap();
        assert!(quote.get(Metric::CurrentRatio).is_some());
    }
}
