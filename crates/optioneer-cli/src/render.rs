//! Terminal tables for analysis reports

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use optioneer_stock::{AnalysisReport, MetricValue};
use std::fmt::Write;

fn table(header: [&str; 2]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn value(v: MetricValue) -> String {
    format!("{v:.2}")
}

fn percent(v: MetricValue) -> String {
    match v.value() {
        Some(p) => format!("{p:+.2}%"),
        None => value(v),
    }
}

/// Render a complete report as stacked tables
pub fn render_report(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", report.symbol);
    for advisory in &report.advisories {
        let _ = writeln!(out, "note: {advisory}");
    }

    let mut fundamentals = table(["Fundamental", "Value"]);
    for (metric, resolved) in report.fundamentals.iter() {
        let shown = match &resolved.source {
            Some(source) => format!("{} ({source})", value(resolved.value)),
            None => value(resolved.value),
        };
        fundamentals.add_row(vec![metric.label().to_string(), shown]);
    }
    let _ = writeln!(out, "{fundamentals}");

    let t = &report.technicals;
    let mut technicals = table(["Technical", "Value"]);
    technicals
        .add_row(vec!["Current Price".to_string(), value(t.current_price)])
        .add_row(vec!["RSI (14)".to_string(), value(t.rsi)])
        .add_row(vec!["MACD Histogram".to_string(), value(t.macd_histogram)])
        .add_row(vec!["20-Day SMA".to_string(), value(t.sma_20)]);
    for (window, perf) in t.performance() {
        technicals.add_row(vec![format!("{window}-Day Performance"), percent(perf)]);
    }
    if let Some(iv) = report.implied_volatility {
        technicals.add_row(vec![
            "Implied Volatility".to_string(),
            format!("{:.1}%", iv * 100.0),
        ]);
    }
    let _ = writeln!(out, "{technicals}");

    let s = &report.score;
    let r = &report.recommendation;
    let mut summary = table(["Recommendation", "Value"]);
    summary
        .add_row(vec![
            "Fundamental Score".to_string(),
            format!("{:.2} / 6", s.fundamental),
        ])
        .add_row(vec![
            "Technical Score".to_string(),
            format!("{:.2} / 4", s.technical),
        ])
        .add_row(vec![
            "Composite Score".to_string(),
            format!("{:.2} / 10", s.composite),
        ])
        .add_row(vec!["Strategy".to_string(), r.strategy.to_string()])
        .add_row(vec!["Expiration".to_string(), format!("{} days", r.expiration_days)])
        .add_row(vec!["Target Delta".to_string(), format!("{}", r.target_delta)])
        .add_row(vec!["Strike".to_string(), format!("{:.2}", r.strike)]);
    let _ = writeln!(out, "{summary}");

    let _ = write!(out, "Insight: {}", report.insight);
    out
}

/// Render the message for a symbol with no price history
pub fn render_insufficient(symbol: &str, advisories: &[String]) -> String {
    let mut out = format!("=== {symbol} ===\nInsufficient price history; not scored.");
    for advisory in advisories {
        let _ = write!(out, "\nnote: {advisory}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use optioneer_stock::history::HistorySource;
    use optioneer_stock::{
        FundamentalsRecord, Metric, Recommendation, ScoreResult, Strategy, TechnicalsRecord,
    };

    fn report() -> AnalysisReport {
        let mut technicals = TechnicalsRecord::empty();
        technicals.current_price = MetricValue::Available(187.4);
        technicals.perf_7d = MetricValue::Available(3.25);

        AnalysisReport {
            id: uuid::Uuid::new_v4(),
            symbol: "AAPL".to_string(),
            generated_at: chrono::Utc::now(),
            price_source: HistorySource::Delayed,
            bar_count: 250,
            advisories: vec!["Live feed unavailable".to_string()],
            implied_volatility: Some(0.274),
            fundamentals: FundamentalsRecord::from_values([
                (Metric::DebtToEquity, MetricValue::Available(1.45)),
                (Metric::FreeCashFlow, MetricValue::Unavailable),
            ]),
            technicals,
            score: ScoreResult {
                fundamental: 3.0,
                technical: 0.8,
                composite: 3.8,
                fundamental_points: 20,
                fundamental_max_points: 40,
                technical_points: 10,
                technical_max_points: 50,
            },
            recommendation: Recommendation {
                expiration_days: 30,
                target_delta: 20,
                strike: 168.66,
                strategy: Strategy::Conservative,
            },
            insight: "Stay out of the money.".to_string(),
        }
    }

    #[test]
    fn test_render_report() {
        let out = render_report(&report());

        assert!(out.starts_with("=== AAPL ==="));
        assert!(out.contains("note: Live feed unavailable"));
        assert!(out.contains("Debt-to-Equity Ratio"));
        assert!(out.contains("N/A"));
        assert!(out.contains("+3.25%"));
        assert!(out.contains("27.4%"));
        assert!(out.contains("Conservative (OTM)"));
        assert!(out.contains("3.80 / 10"));
        assert!(out.ends_with("Insight: Stay out of the money."));
    }

    #[test]
    fn test_render_insufficient() {
        let out = render_insufficient("ZZZZ", &["No price history available for ZZZZ".to_string()]);
        assert!(out.contains("Insufficient price history"));
        assert!(out.contains("note: No price history"));
    }
}
