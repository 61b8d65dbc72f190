//! Free-text put-selling commentary from an LLM

use crate::error::Result;
use crate::models::{FundamentalsRecord, MetricValue, TechnicalsRecord};
use async_trait::async_trait;
use minijinja::{Environment, context};
use optioneer_llm::{CompletionRequest, LLMProvider, Message};
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Returned whenever commentary cannot be produced
pub const INSIGHT_UNAVAILABLE: &str = "Insight unavailable.";

const INSIGHT_TEMPLATE: &str = "\
Analyze the stock {{ symbol }} for selling put options based on the following data:
Fundamentals:
{% for row in fundamentals %}- {{ row.label }}: {{ row.value }}
{% endfor %}Technicals:
{% for row in technicals %}- {{ row.label }}: {{ row.value }}
{% endfor %}
Provide a brief insight on whether this is a good candidate for selling puts \
aggressively (ATM/ITM), moderately (near ATM), or conservatively (OTM), and \
suggest an expiration and Delta.";

/// Produces commentary for a scored symbol; never fails
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(
        &self,
        symbol: &str,
        fundamentals: &FundamentalsRecord,
        technicals: &TechnicalsRecord,
    ) -> String;
}

#[derive(Serialize)]
struct Row {
    label: &'static str,
    value: String,
}

fn row(label: &'static str, value: MetricValue) -> Row {
    Row {
        label,
        value: format!("{value:.2}"),
    }
}

/// Render the insight prompt
pub fn render_prompt(
    symbol: &str,
    fundamentals: &FundamentalsRecord,
    technicals: &TechnicalsRecord,
) -> Result<String> {
    let fundamentals: Vec<Row> = fundamentals
        .iter()
        .map(|(metric, resolved)| row(metric.label(), resolved.value))
        .collect();

    let mut technical_rows = vec![
        row("Current Price", technicals.current_price),
        row("RSI (14)", technicals.rsi),
        row("MACD Histogram", technicals.macd_histogram),
    ];
    technical_rows.extend([
        row("7-Day Performance (%)", technicals.perf_7d),
        row("30-Day Performance (%)", technicals.perf_30d),
        row("60-Day Performance (%)", technicals.perf_60d),
        row("20-Day SMA", technicals.sma_20),
    ]);

    let mut env = Environment::new();
    env.add_template("insight", INSIGHT_TEMPLATE)?;
    let prompt = env.get_template("insight")?.render(context! {
        symbol => symbol,
        fundamentals => fundamentals,
        technicals => technical_rows,
    })?;
    Ok(prompt)
}

/// Insight generator backed by any chat-completion provider
pub struct LlmInsight {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
}

impl LlmInsight {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 200,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn try_generate(
        &self,
        symbol: &str,
        fundamentals: &FundamentalsRecord,
        technicals: &TechnicalsRecord,
    ) -> Result<Option<String>> {
        let prompt = render_prompt(symbol, fundamentals, technicals)?;
        let request = CompletionRequest::builder(&self.model)
            .add_message(Message::user(prompt))
            .max_tokens(self.max_tokens)
            .build();

        let response = self.provider.complete(request).await?;
        Ok(response.message.text().map(str::to_string))
    }
}

#[async_trait]
impl InsightGenerator for LlmInsight {
    #[instrument(skip(self, fundamentals, technicals), fields(provider = self.provider.name()))]
    async fn generate(
        &self,
        symbol: &str,
        fundamentals: &FundamentalsRecord,
        technicals: &TechnicalsRecord,
    ) -> String {
        match self.try_generate(symbol, fundamentals, technicals).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                warn!("Insight provider returned an empty message");
                INSIGHT_UNAVAILABLE.to_string()
            }
            Err(e) => {
                warn!(error = %e, "Insight generation failed");
                INSIGHT_UNAVAILABLE.to_string()
            }
        }
    }
}

/// Generator used when commentary is switched off or no key is configured
pub struct DisabledInsight;

#[async_trait]
impl InsightGenerator for DisabledInsight {
    async fn generate(&self, _: &str, _: &FundamentalsRecord, _: &TechnicalsRecord) -> String {
        INSIGHT_UNAVAILABLE.to_string()
    }
}
