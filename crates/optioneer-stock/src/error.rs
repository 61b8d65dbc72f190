//! Error types for stock analysis operations

use thiserror::Error;

/// Stock analysis specific errors
#[derive(Debug, Error)]
pub enum StockError {
    /// Invalid stock symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Request did not complete in time
    #[error("{operation} timed out")]
    Timeout { operation: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Alpha Vantage API error
    #[error("Alpha Vantage error: {0}")]
    AlphaVantageError(String),

    /// Financial Modeling Prep API error
    #[error("Financial Modeling Prep error: {0}")]
    FmpError(String),

    /// Broker live-feed error
    #[error("Broker feed error: {0}")]
    BrokerError(String),

    /// Configuration error, including malformed thresholds
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Prompt rendering error
    #[error("Prompt error: {0}")]
    PromptError(#[from] minijinja::Error),

    /// LLM provider error
    #[error("LLM error: {0}")]
    LlmError(#[from] optioneer_llm::LLMError),
}

impl StockError {
    /// Whether the failure is a transport hiccup worth retrying
    ///
    /// Connection resets, timeouts, rate limiting and 5xx responses qualify.
    /// Malformed payloads, bad symbols and configuration problems do not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status()
                        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            Self::Timeout { .. } | Self::RateLimitExceeded { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StockError::InvalidSymbol("INVALID".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: INVALID");

        let err = StockError::DataUnavailable {
            symbol: "AAPL".to_string(),
            reason: "No data found".to_string(),
        };
        assert_eq!(err.to_string(), "Data not available for AAPL: No data found");
    }

    #[test]
    fn test_transient_classification() {
        assert!(
            StockError::Timeout {
                operation: "fmp ratios".to_string()
            }
            .is_transient()
        );
        assert!(
            StockError::RateLimitExceeded {
                provider: "Alpha Vantage".to_string()
            }
            .is_transient()
        );
        assert!(!StockError::ConfigError("bad".to_string()).is_transient());
        assert!(!StockError::InvalidSymbol("ZZZZ".to_string()).is_transient());
    }
}
