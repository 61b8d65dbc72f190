//! Run configuration: credentials, transport settings and scoring thresholds

use crate::error::{Result, StockError};
use crate::retry::RetryPolicy;
use optioneer_utils::env_var;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default Client Portal gateway address
pub const DEFAULT_IBKR_GATEWAY: &str = "https://localhost:5000/v1/api";

/// Default chat model used for insights
pub const DEFAULT_INSIGHT_MODEL: &str = "mixtral-8x7b-32768";

/// Shortest lookback that still yields 60 trading days
pub const MIN_LOOKBACK_DAYS: u32 = 90;

/// Settings shared by every collaborator in a run
#[derive(Clone)]
pub struct StockConfig {
    /// Financial Modeling Prep API key
    pub fmp_api_key: Option<String>,

    /// Alpha Vantage API key
    pub alpha_vantage_api_key: Option<String>,

    /// Key for the OpenAI-compatible insight endpoint
    pub llm_api_key: Option<String>,

    /// Base URL of the insight endpoint; Groq when unset
    pub llm_api_base: Option<String>,

    /// Chat model for insights
    pub llm_model: String,

    /// Whether the broker live feed is tried before delayed quotes
    pub use_live_feed: bool,

    /// Client Portal gateway base URL
    pub ibkr_gateway_url: String,

    /// Upper bound for one live-feed history query
    pub live_feed_timeout: Duration,

    /// History lookback in calendar days
    pub lookback_days: u32,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    /// Retry behavior for fundamentals providers
    pub retry: RetryPolicy,

    /// Alpha Vantage free-tier quota
    pub alpha_vantage_requests_per_minute: u32,

    /// FMP free-tier quota
    pub fmp_requests_per_minute: u32,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            fmp_api_key: None,
            alpha_vantage_api_key: None,
            llm_api_key: None,
            llm_api_base: None,
            llm_model: DEFAULT_INSIGHT_MODEL.to_string(),
            use_live_feed: false,
            ibkr_gateway_url: DEFAULT_IBKR_GATEWAY.to_string(),
            live_feed_timeout: Duration::from_secs(15),
            lookback_days: 365,
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            alpha_vantage_requests_per_minute: 5,
            fmp_requests_per_minute: 10,
        }
    }
}

// Keys stay out of logs and panic messages.
impl fmt::Debug for StockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(key: Option<&String>) -> &'static str {
            if key.is_some() { "<set>" } else { "<unset>" }
        }

        f.debug_struct("StockConfig")
            .field("fmp_api_key", &redact(self.fmp_api_key.as_ref()))
            .field(
                "alpha_vantage_api_key",
                &redact(self.alpha_vantage_api_key.as_ref()),
            )
            .field("llm_api_key", &redact(self.llm_api_key.as_ref()))
            .field("llm_api_base", &self.llm_api_base)
            .field("llm_model", &self.llm_model)
            .field("use_live_feed", &self.use_live_feed)
            .field("ibkr_gateway_url", &self.ibkr_gateway_url)
            .field("live_feed_timeout", &self.live_feed_timeout)
            .field("lookback_days", &self.lookback_days)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Fill unset credentials from the environment
    ///
    /// Reads `FMP_API_KEY`, `ALPHA_VANTAGE_API_KEY`, `GROQ_API_KEY` (falling
    /// back to `OPENAI_API_KEY`) and `IBKR_GATEWAY_URL`. Values already set
    /// take precedence.
    pub fn with_env_keys(mut self) -> Self {
        self.fmp_api_key = self.fmp_api_key.or_else(|| env_var("FMP_API_KEY"));
        self.alpha_vantage_api_key = self
            .alpha_vantage_api_key
            .or_else(|| env_var("ALPHA_VANTAGE_API_KEY"));
        if self.llm_api_key.is_none() {
            if let Some(key) = env_var("GROQ_API_KEY") {
                self.llm_api_key = Some(key);
            } else if let Some(key) = env_var("OPENAI_API_KEY") {
                self.llm_api_key = Some(key);
                self.llm_api_base
                    .get_or_insert_with(|| "https://api.openai.com/v1".to_string());
            }
        }
        if let Some(url) = env_var("IBKR_GATEWAY_URL") {
            self.ibkr_gateway_url = url;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(StockError::ConfigError(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.lookback_days < MIN_LOOKBACK_DAYS {
            return Err(StockError::ConfigError(format!(
                "lookback_days must be at least {MIN_LOOKBACK_DAYS} calendar days (60 trading days)"
            )));
        }

        if self.live_feed_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(StockError::ConfigError(
                "timeouts must be non-zero".to_string(),
            ));
        }

        if self.use_live_feed && self.ibkr_gateway_url.trim().is_empty() {
            return Err(StockError::ConfigError(
                "ibkr_gateway_url required when the live feed is enabled".to_string(),
            ));
        }

        if self.alpha_vantage_requests_per_minute == 0 || self.fmp_requests_per_minute == 0 {
            return Err(StockError::ConfigError(
                "provider quotas must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Yahoo range string for the configured lookback
    pub fn history_period(&self) -> String {
        match self.lookback_days {
            d if d <= 90 => "3mo".to_string(),
            d if d <= 180 => "6mo".to_string(),
            d if d <= 365 => "1y".to_string(),
            d if d <= 730 => "2y".to_string(),
            _ => "5y".to_string(),
        }
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    config: StockConfig,
    from_env: bool,
}

impl StockConfigBuilder {
    /// Set the FMP API key
    pub fn fmp_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.fmp_api_key = Some(key.into());
        self
    }

    /// Set the Alpha Vantage API key
    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.alpha_vantage_api_key = Some(key.into());
        self
    }

    /// Set the insight endpoint key
    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm_api_key = Some(key.into());
        self
    }

    /// Set the insight endpoint base URL
    pub fn llm_api_base(mut self, base: impl Into<String>) -> Self {
        self.config.llm_api_base = Some(base.into());
        self
    }

    /// Set the insight model
    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm_model = model.into();
        self
    }

    /// Enable or disable the live feed
    pub fn use_live_feed(mut self, enabled: bool) -> Self {
        self.config.use_live_feed = enabled;
        self
    }

    /// Set the gateway base URL
    pub fn ibkr_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.config.ibkr_gateway_url = url.into();
        self
    }

    /// Set the live-feed query timeout
    pub fn live_feed_timeout(mut self, timeout: Duration) -> Self {
        self.config.live_feed_timeout = timeout;
        self
    }

    /// Set the lookback window in days
    pub fn lookback_days(mut self, days: u32) -> Self {
        self.config.lookback_days = days;
        self
    }

    /// Set the HTTP request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set the Alpha Vantage quota
    pub fn alpha_vantage_requests_per_minute(mut self, rate: u32) -> Self {
        self.config.alpha_vantage_requests_per_minute = rate;
        self
    }

    /// Set the FMP quota
    pub fn fmp_requests_per_minute(mut self, rate: u32) -> Self {
        self.config.fmp_requests_per_minute = rate;
        self
    }

    /// Fill missing credentials from the environment at build time
    pub fn with_env_keys(mut self) -> Self {
        self.from_env = true;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let config = if self.from_env {
            self.config.with_env_keys()
        } else {
            self.config
        };

        config.validate()?;
        Ok(config)
    }
}

/// Scoring thresholds for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Maximum acceptable debt-to-equity ratio
    pub max_debt_to_equity: f64,

    /// Minimum acceptable current ratio
    pub min_current_ratio: f64,

    /// Minimum return on equity, in percent
    pub min_roe: f64,

    /// Minimum revenue growth in percent; the criterion is skipped when unset
    pub min_revenue_growth: Option<f64>,

    /// Lower RSI bound, inclusive
    pub rsi_low: f64,

    /// Upper RSI bound, inclusive
    pub rsi_high: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            max_debt_to_equity: 0.5,
            min_current_ratio: 1.5,
            min_roe: 15.0,
            min_revenue_growth: None,
            rsi_low: 40.0,
            rsi_high: 60.0,
        }
    }
}

impl ThresholdConfig {
    /// Create a new threshold builder
    pub fn builder() -> ThresholdConfigBuilder {
        ThresholdConfigBuilder::default()
    }

    /// Parse thresholds from JSON; omitted fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let thresholds: Self = serde_json::from_str(json)
            .map_err(|e| StockError::ConfigError(format!("invalid thresholds: {e}")))?;
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Reject thresholds that cannot produce a meaningful score
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("max_debt_to_equity", self.max_debt_to_equity),
            ("min_current_ratio", self.min_current_ratio),
            ("min_roe", self.min_roe),
            ("rsi_low", self.rsi_low),
            ("rsi_high", self.rsi_high),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(StockError::ConfigError(format!("{name} must be finite")));
            }
        }

        if self.min_revenue_growth.is_some_and(|g| !g.is_finite()) {
            return Err(StockError::ConfigError(
                "min_revenue_growth must be finite".to_string(),
            ));
        }

        for (name, value) in [("rsi_low", self.rsi_low), ("rsi_high", self.rsi_high)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(StockError::ConfigError(format!(
                    "{name} must be within 0-100, got {value}"
                )));
            }
        }

        if self.rsi_low > self.rsi_high {
            return Err(StockError::ConfigError(format!(
                "rsi_low ({}) exceeds rsi_high ({})",
                self.rsi_low, self.rsi_high
            )));
        }

        Ok(())
    }
}

/// Builder for ThresholdConfig
#[derive(Debug, Default)]
pub struct ThresholdConfigBuilder {
    thresholds: ThresholdConfig,
}

impl ThresholdConfigBuilder {
    /// Start from an existing set of thresholds
    pub fn from_base(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    pub fn max_debt_to_equity(mut self, value: f64) -> Self {
        self.thresholds.max_debt_to_equity = value;
        self
    }

    pub fn min_current_ratio(mut self, value: f64) -> Self {
        self.thresholds.min_current_ratio = value;
        self
    }

    pub fn min_roe(mut self, value: f64) -> Self {
        self.thresholds.min_roe = value;
        self
    }

    pub fn min_revenue_growth(mut self, value: f64) -> Self {
        self.thresholds.min_revenue_growth = Some(value);
        self
    }

    /// Set the inclusive RSI band
    pub fn rsi_band(mut self, low: f64, high: f64) -> Self {
        self.thresholds.rsi_low = low;
        self.thresholds.rsi_high = high;
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<ThresholdConfig> {
        self.thresholds.validate()?;
        Ok(self.thresholds)
    }
}
