//! Put-selling candidate analysis
//!
//! This crate scores a stock as a cash-secured put candidate. It includes:
//!
//! - Daily price history from a broker live feed with a delayed-quote fallback
//! - Ranked fundamentals resolution across Yahoo Finance, Financial Modeling
//!   Prep and Alpha Vantage
//! - Technical indicators (RSI, MACD histogram, trailing performance, SMA)
//! - A weighted fundamentals/technicals score and an expiration/delta/strike
//!   recommendation
//! - Optional LLM commentary
//!
//! # Example
//!
//! ```rust,ignore
//! use optioneer_stock::{AnalysisPipeline, StockConfig, ThresholdConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StockConfig::builder().with_env_keys().build()?;
//!     let pipeline = AnalysisPipeline::from_config(&config, true)?;
//!
//!     let outcome = pipeline.analyze("AAPL", &ThresholdConfig::default()).await?;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod indicators;
pub mod insight;
pub mod models;
pub mod pipeline;
pub mod recommendation;
pub mod resolver;
pub mod retry;
pub mod scoring;

pub use config::{StockConfig, ThresholdConfig};
pub use error::{Result, StockError};
pub use history::{DelayedQuotes, HistorySource, LiveFeed, LiveSession, PriceHistory, PriceHistorySource};
pub use insight::{INSIGHT_UNAVAILABLE, InsightGenerator, LlmInsight};
pub use models::{
    FundamentalsRecord, Metric, MetricValue, PriceBar, ProviderQuote, Recommendation,
    ScoreResult, Strategy, TechnicalsRecord,
};
pub use pipeline::{AnalysisOutcome, AnalysisPipeline, AnalysisReport};
pub use resolver::{FundamentalsProvider, FundamentalsResolver};
pub use retry::{RetryPolicy, Retrying};
