//! One analysis run per symbol: fetch, compute, score, recommend, comment

use crate::api::{AlphaVantageClient, FmpClient, IbkrLiveFeed, YahooClient};
use crate::config::{StockConfig, ThresholdConfig};
use crate::error::{Result, StockError};
use crate::history::{HistorySource, PriceHistorySource};
use crate::indicators::compute_technicals;
use crate::insight::{DisabledInsight, InsightGenerator, LlmInsight};
use crate::models::{FundamentalsRecord, Metric, Recommendation, ScoreResult, TechnicalsRecord};
use crate::recommendation::recommend;
use crate::resolver::{FundamentalsProvider, FundamentalsResolver};
use crate::retry::Retrying;
use crate::scoring::score;
use chrono::{DateTime, Utc};
use optioneer_llm::providers::{OpenAIConfig, OpenAIProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Everything produced for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: Uuid,
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    pub price_source: HistorySource,
    pub bar_count: usize,
    pub advisories: Vec<String>,
    /// Live-feed implied volatility as a fraction
    pub implied_volatility: Option<f64>,
    pub fundamentals: FundamentalsRecord,
    pub technicals: TechnicalsRecord,
    pub score: ScoreResult,
    pub recommendation: Recommendation,
    pub insight: String,
}

/// Result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Complete(Box<AnalysisReport>),
    /// No price history from any source; nothing was scored
    InsufficientData {
        symbol: String,
        advisories: Vec<String>,
    },
}

impl AnalysisOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Complete(report) => &report.symbol,
            Self::InsufficientData { symbol, .. } => symbol,
        }
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            Self::Complete(report) => Some(report),
            Self::InsufficientData { .. } => None,
        }
    }
}

/// Wires the stages together
#[derive(Clone)]
pub struct AnalysisPipeline {
    history: PriceHistorySource,
    resolver: FundamentalsResolver,
    insight: Arc<dyn InsightGenerator>,
}

impl AnalysisPipeline {
    pub fn new(
        history: PriceHistorySource,
        resolver: FundamentalsResolver,
        insight: Arc<dyn InsightGenerator>,
    ) -> Self {
        Self {
            history,
            resolver,
            insight,
        }
    }

    /// Build the production pipeline from configuration
    ///
    /// Providers without credentials are left out of the ranking. Insight is
    /// disabled when `with_insight` is false or no LLM key is configured.
    pub fn from_config(config: &StockConfig, with_insight: bool) -> Result<Self> {
        config.validate()?;

        let yahoo = Arc::new(YahooClient::new(config.request_timeout)?);

        let mut providers: Vec<Arc<dyn FundamentalsProvider>> = vec![Arc::new(Retrying::new(
            yahoo.clone(),
            config.retry.clone(),
        ))];
        if let Some(key) = &config.fmp_api_key {
            let fmp = FmpClient::new(key, config.fmp_requests_per_minute, config.request_timeout)?;
            providers.push(Arc::new(Retrying::new(fmp, config.retry.clone())));
        }
        if let Some(key) = &config.alpha_vantage_api_key {
            let av = AlphaVantageClient::new(
                key,
                config.alpha_vantage_requests_per_minute,
                config.request_timeout,
            )?;
            providers.push(Arc::new(Retrying::new(av, config.retry.clone())));
        }

        let mut history = PriceHistorySource::new(yahoo, config);
        if config.use_live_feed {
            history = history.with_live_feed(Arc::new(IbkrLiveFeed::new(config.request_timeout)?));
        }

        let insight: Arc<dyn InsightGenerator> = match (&config.llm_api_key, with_insight) {
            (Some(key), true) => {
                let llm_config = match &config.llm_api_base {
                    Some(base) => OpenAIConfig::new(key).with_api_base(base),
                    None => OpenAIConfig::groq(key),
                };
                let provider = OpenAIProvider::with_config(llm_config)?;
                Arc::new(LlmInsight::new(Arc::new(provider), &config.llm_model))
            }
            (None, true) => {
                warn!("No LLM API key configured; insights disabled");
                Arc::new(DisabledInsight)
            }
            (_, false) => Arc::new(DisabledInsight),
        };

        Ok(Self::new(
            history,
            FundamentalsResolver::new(providers),
            insight,
        ))
    }

    /// Analyze one symbol
    ///
    /// Thresholds are validated before any network traffic. Provider trouble
    /// degrades to unavailable values; only configuration problems and bad
    /// symbols surface as errors.
    #[instrument(skip(self, thresholds))]
    pub async fn analyze(&self, symbol: &str, thresholds: &ThresholdConfig) -> Result<AnalysisOutcome> {
        thresholds.validate()?;

        let symbol = normalize_symbol(symbol)?;
        let metrics = Metric::tracked(thresholds.min_revenue_growth.is_some());

        let (history, fundamentals) = tokio::join!(
            self.history.fetch(&symbol),
            self.resolver.resolve(&symbol, &metrics)
        );

        if history.is_empty() {
            warn!(%symbol, "Insufficient price history");
            return Ok(AnalysisOutcome::InsufficientData {
                symbol,
                advisories: history.advisories,
            });
        }

        let technicals = compute_technicals(&history.bars);
        let Some(price) = technicals.current_price.value() else {
            return Ok(AnalysisOutcome::InsufficientData {
                symbol,
                advisories: history.advisories,
            });
        };

        let score = score(&fundamentals, &technicals, thresholds);
        let recommendation = recommend(score.composite, price);
        info!(
            %symbol,
            composite = score.composite,
            strategy = %recommendation.strategy,
            "Scored"
        );

        let insight = self
            .insight
            .generate(&symbol, &fundamentals, &technicals)
            .await;

        Ok(AnalysisOutcome::Complete(Box::new(AnalysisReport {
            id: Uuid::new_v4(),
            symbol,
            generated_at: Utc::now(),
            price_source: history.source,
            bar_count: history.bars.len(),
            advisories: history.advisories,
            implied_volatility: history.implied_volatility,
            fundamentals,
            technicals,
            score,
            recommendation,
            insight,
        })))
    }
}

/// Trim and upper-case a ticker, rejecting anything that is not one
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_ascii_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 12
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));

    if valid {
        Ok(symbol)
    } else {
        Err(StockError::InvalidSymbol(symbol))
    }
}
