//! Daily price history with a live-feed first, delayed-quote fallback
//!
//! The live session is opened right before the query and released on every
//! exit path, before any fallback runs.

use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::models::{PriceBar, ProviderQuote, normalize_bars};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Handle to an open broker session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSession {
    pub endpoint: String,
    pub session_id: String,
}

/// Broker market-data feed
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiveFeed: Send + Sync {
    async fn connect(&self, endpoint: &str, session_id: &str) -> Result<LiveSession>;

    /// Daily bars covering `lookback_days`
    async fn query(
        &self,
        session: &LiveSession,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<PriceBar>>;

    /// Implied volatility snapshot, if the broker has one
    async fn implied_volatility(&self, session: &LiveSession, symbol: &str)
    -> Result<Option<f64>>;

    async fn disconnect(&self, session: LiveSession) -> Result<()>;
}

/// Delayed quote source, also the primary fundamentals snapshot
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DelayedQuotes: Send + Sync {
    /// Daily bars for a range such as `"1y"`
    async fn history(&self, symbol: &str, period: &str) -> Result<Vec<PriceBar>>;

    async fn snapshot_info(&self, symbol: &str) -> Result<ProviderQuote>;
}

/// Where the bars came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    Live,
    Delayed,
    /// Neither source produced bars
    Unavailable,
}

/// Normalized bars plus what the caller should know about them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub bars: Vec<PriceBar>,
    pub source: HistorySource,
    pub advisories: Vec<String>,
    pub implied_volatility: Option<f64>,
}

impl PriceHistory {
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Price history fetcher
#[derive(Clone)]
pub struct PriceHistorySource {
    live: Option<Arc<dyn LiveFeed>>,
    live_enabled: bool,
    delayed: Arc<dyn DelayedQuotes>,
    endpoint: String,
    live_timeout: Duration,
    lookback_days: u32,
    period: String,
    retry: RetryPolicy,
}

impl PriceHistorySource {
    /// Delayed quotes only; attach a live feed with [`Self::with_live_feed`]
    pub fn new(delayed: Arc<dyn DelayedQuotes>, config: &StockConfig) -> Self {
        Self {
            live: None,
            live_enabled: config.use_live_feed,
            delayed,
            endpoint: config.ibkr_gateway_url.clone(),
            live_timeout: config.live_feed_timeout,
            lookback_days: config.lookback_days,
            period: config.history_period(),
            retry: config.retry.clone(),
        }
    }

    /// Attach a live feed; it is consulted only when the config enables it
    pub fn with_live_feed(mut self, live: Arc<dyn LiveFeed>) -> Self {
        self.live = Some(live);
        self
    }

    /// Fetch normalized daily bars, never failing
    ///
    /// An empty result means both sources came up empty.
    #[instrument(skip(self), fields(live = self.live_enabled))]
    pub async fn fetch(&self, symbol: &str) -> PriceHistory {
        let mut advisories = Vec::new();

        if let Some(live) = self.live.as_ref().filter(|_| self.live_enabled) {
            match self.fetch_live(&**live, symbol).await {
                Ok((bars, implied_volatility)) if !bars.is_empty() => {
                    info!(symbol, bars = bars.len(), "Using live feed history");
                    return PriceHistory {
                        bars,
                        source: HistorySource::Live,
                        advisories,
                        implied_volatility,
                    };
                }
                Ok(_) => {
                    warn!(symbol, "Live feed returned no bars");
                    advisories.push(format!(
                        "Live feed returned no bars for {symbol}; using delayed quotes"
                    ));
                }
                Err(e) => {
                    warn!(symbol, error = %e, "Live feed unavailable");
                    advisories.push(format!(
                        "Live feed unavailable for {symbol} ({e}); using delayed quotes"
                    ));
                }
            }
        }

        let operation = format!("delayed history {symbol}");
        let delayed = self
            .retry
            .execute(&operation, || self.delayed.history(symbol, &self.period))
            .await;
        let bars = match delayed {
            Ok(bars) => normalize_bars(bars),
            Err(e) => {
                warn!(symbol, error = %e, "Delayed quotes unavailable");
                Vec::new()
            }
        };

        let source = if bars.is_empty() {
            advisories.push(format!("No price history available for {symbol}"));
            HistorySource::Unavailable
        } else {
            debug!(symbol, bars = bars.len(), "Using delayed history");
            HistorySource::Delayed
        };

        PriceHistory {
            bars,
            source,
            advisories,
            implied_volatility: None,
        }
    }

    async fn fetch_live(
        &self,
        live: &dyn LiveFeed,
        symbol: &str,
    ) -> Result<(Vec<PriceBar>, Option<f64>)> {
        let session_id = Uuid::new_v4().to_string();
        let session = live.connect(&self.endpoint, &session_id).await?;
        debug!(symbol, session_id = %session.session_id, "Live session opened");

        let outcome = tokio::time::timeout(self.live_timeout, async {
            let bars = live.query(&session, symbol, self.lookback_days).await?;
            if bars.is_empty() {
                return Ok((bars, None));
            }
            let iv = live
                .implied_volatility(&session, symbol)
                .await
                .unwrap_or_else(|e| {
                    debug!(symbol, error = %e, "No implied volatility snapshot");
                    None
                });
            Ok::<_, StockError>((bars, iv))
        })
        .await
        .map_err(|_| StockError::Timeout {
            operation: format!("live history for {symbol}"),
        })
        .and_then(|result| result);

        if let Err(e) = live.disconnect(session).await {
            warn!(symbol, error = %e, "Live session disconnect failed");
        }

        let (bars, iv) = outcome?;
        Ok((normalize_bars(bars), iv.filter(|v| v.is_finite())))
    }
}
