//! Command-line interface for optioneer
//!
//! ```bash
//! export FMP_API_KEY=...            # optional secondary fundamentals
//! export ALPHA_VANTAGE_API_KEY=...  # optional tertiary fundamentals
//! export GROQ_API_KEY=...           # optional insight commentary
//!
//! optioneer analyze AAPL MSFT --min-revenue-growth 5
//! optioneer analyze NVDA --live --json
//! ```

mod render;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use optioneer_stock::config::ThresholdConfigBuilder;
use optioneer_stock::{AnalysisOutcome, AnalysisPipeline, StockConfig, ThresholdConfig};
use optioneer_utils::{LogFormat, init_tracing_with};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "optioneer")]
#[command(about = "Score stocks as cash-secured put candidates", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one or more symbols
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Ticker symbols
    #[arg(required = true)]
    symbols: Vec<String>,

    /// Try the IBKR Client Portal gateway before delayed quotes
    #[arg(long)]
    live: bool,

    /// JSON file with scoring thresholds
    #[arg(long, value_name = "FILE")]
    thresholds: Option<PathBuf>,

    /// Maximum debt-to-equity ratio
    #[arg(long)]
    max_debt_to_equity: Option<f64>,

    /// Minimum current ratio
    #[arg(long)]
    min_current_ratio: Option<f64>,

    /// Minimum return on equity, percent
    #[arg(long)]
    min_roe: Option<f64>,

    /// Minimum revenue growth, percent; enables the revenue growth criterion
    #[arg(long)]
    min_revenue_growth: Option<f64>,

    /// Lower RSI bound
    #[arg(long)]
    rsi_low: Option<f64>,

    /// Upper RSI bound
    #[arg(long)]
    rsi_high: Option<f64>,

    /// Skip LLM commentary
    #[arg(long)]
    no_insight: bool,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    /// Symbols analyzed at once
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..=16))]
    concurrency: u16,

    /// Chat model for commentary
    #[arg(long)]
    model: Option<String>,
}

impl AnalyzeArgs {
    fn thresholds(&self) -> anyhow::Result<ThresholdConfig> {
        let base = match &self.thresholds {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                ThresholdConfig::from_json(&json)?
            }
            None => ThresholdConfig::default(),
        };

        let mut builder = ThresholdConfigBuilder::from_base(base.clone());
        if let Some(v) = self.max_debt_to_equity {
            builder = builder.max_debt_to_equity(v);
        }
        if let Some(v) = self.min_current_ratio {
            builder = builder.min_current_ratio(v);
        }
        if let Some(v) = self.min_roe {
            builder = builder.min_roe(v);
        }
        if let Some(v) = self.min_revenue_growth {
            builder = builder.min_revenue_growth(v);
        }
        builder = builder.rsi_band(
            self.rsi_low.unwrap_or(base.rsi_low),
            self.rsi_high.unwrap_or(base.rsi_high),
        );

        Ok(builder.build()?)
    }

    fn stock_config(&self) -> anyhow::Result<StockConfig> {
        let mut builder = StockConfig::builder()
            .with_env_keys()
            .use_live_feed(self.live);
        if let Some(model) = &self.model {
            builder = builder.llm_model(model);
        }
        Ok(builder.build()?)
    }
}

/// Upper-case and drop repeats, keeping first-seen order
fn dedup_symbols(symbols: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for symbol in symbols {
        let symbol = symbol.trim().to_ascii_uppercase();
        if !symbol.is_empty() && !seen.contains(&symbol) {
            seen.push(symbol);
        }
    }
    seen
}

async fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let thresholds = Arc::new(args.thresholds()?);
    let config = args.stock_config()?;
    let pipeline = Arc::new(AnalysisPipeline::from_config(&config, !args.no_insight)?);
    let symbols = dedup_symbols(&args.symbols);

    info!(symbols = symbols.len(), live = config.use_live_feed, "Starting analysis");

    let results: Vec<(String, optioneer_stock::Result<AnalysisOutcome>)> = stream::iter(symbols)
        .map(|symbol| {
            let pipeline = pipeline.clone();
            let thresholds = thresholds.clone();
            async move {
                let outcome = pipeline.analyze(&symbol, &thresholds).await;
                (symbol, outcome)
            }
        })
        .buffered(usize::from(args.concurrency))
        .collect()
        .await;

    let failures = results.iter().filter(|(_, r)| r.is_err()).count();

    if args.json {
        let payload: Vec<serde_json::Value> = results
            .iter()
            .map(|(symbol, result)| match result {
                Ok(outcome) => serde_json::to_value(outcome)
                    .unwrap_or_else(|e| json!({"symbol": symbol, "status": "error", "error": e.to_string()})),
                Err(e) => json!({"symbol": symbol, "status": "error", "error": e.to_string()}),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for (symbol, result) in &results {
            match result {
                Ok(AnalysisOutcome::Complete(report)) => println!("{}", render::render_report(report)),
                Ok(AnalysisOutcome::InsufficientData { symbol, advisories }) => {
                    println!("{}", render::render_insufficient(symbol, advisories));
                }
                Err(e) => {
                    error!(%symbol, error = %e, "Analysis failed");
                    eprintln!("{symbol}: {e}");
                }
            }
        }
    }

    if failures == results.len() {
        anyhow::bail!("every symbol failed to analyze");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing_with("warn,optioneer_stock=info,optioneer=info", format);
    match cli.command {
        Command::Analyze(args) => analyze(args).await,
    }
}
