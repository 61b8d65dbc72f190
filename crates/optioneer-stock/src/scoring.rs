//! Weighted put-selling score

use crate::config::ThresholdConfig;
use crate::models::{FundamentalsRecord, Metric, ScoreResult, TechnicalsRecord};

/// Points awarded per satisfied criterion
pub const POINTS_PER_CRITERION: u32 = 10;
/// Share of the composite carried by fundamentals
pub const FUNDAMENTAL_WEIGHT: f64 = 6.0;
/// Share of the composite carried by technicals
pub const TECHNICAL_WEIGHT: f64 = 4.0;
/// Minimum percent move for a performance window to count
pub const PERFORMANCE_THRESHOLD: f64 = 2.0;

/// Score a symbol against the configured thresholds
///
/// Unavailable inputs earn no points. Revenue growth is only a criterion when
/// a minimum is configured.
pub fn score(
    fundamentals: &FundamentalsRecord,
    technicals: &TechnicalsRecord,
    thresholds: &ThresholdConfig,
) -> ScoreResult {
    let mut fundamental_checks = vec![
        fundamentals
            .get(Metric::DebtToEquity)
            .passes(|v| v <= thresholds.max_debt_to_equity),
        fundamentals
            .get(Metric::CurrentRatio)
            .passes(|v| v >= thresholds.min_current_ratio),
        fundamentals.get(Metric::FreeCashFlow).passes(|v| v > 0.0),
        fundamentals
            .get(Metric::ReturnOnEquity)
            .passes(|v| v >= thresholds.min_roe),
    ];
    if let Some(min_growth) = thresholds.min_revenue_growth {
        fundamental_checks.push(
            fundamentals
                .get(Metric::RevenueGrowth)
                .passes(|v| v >= min_growth),
        );
    }

    let mut technical_checks = vec![
        technicals
            .rsi
            .passes(|v| (thresholds.rsi_low..=thresholds.rsi_high).contains(&v)),
        technicals.macd_histogram.passes(|v| v > 0.0),
    ];
    technical_checks.extend(
        technicals
            .performance()
            .iter()
            .map(|(_, perf)| perf.passes(|v| v > PERFORMANCE_THRESHOLD)),
    );

    let (fundamental_points, fundamental_max_points) = tally(&fundamental_checks);
    let (technical_points, technical_max_points) = tally(&technical_checks);

    let fundamental = weighted(fundamental_points, fundamental_max_points, FUNDAMENTAL_WEIGHT);
    let technical = weighted(technical_points, technical_max_points, TECHNICAL_WEIGHT);

    ScoreResult {
        fundamental,
        technical,
        composite: fundamental + technical,
        fundamental_points,
        fundamental_max_points,
        technical_points,
        technical_max_points,
    }
}

fn tally(checks: &[bool]) -> (u32, u32) {
    let passed = checks.iter().filter(|&&ok| ok).count() as u32;
    (
        passed * POINTS_PER_CRITERION,
        checks.len() as u32 * POINTS_PER_CRITERION,
    )
}

fn weighted(points: u32, max_points: u32, weight: f64) -> f64 {
    if max_points == 0 {
        return 0.0;
    }
    f64::from(points) / f64::from(max_points) * weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricValue;

    fn strong_fundamentals() -> FundamentalsRecord {
        FundamentalsRecord::from_values([
            (Metric::DebtToEquity, MetricValue::Available(0.4)),
            (Metric::CurrentRatio, MetricValue::Available(2.0)),
            (Metric::FreeCashFlow, MetricValue::Available(500.0)),
            (Metric::ReturnOnEquity, MetricValue::Available(20.0)),
        ])
    }

    fn mixed_technicals() -> TechnicalsRecord {
        TechnicalsRecord {
            current_price: MetricValue::Available(100.0),
            rsi: MetricValue::Available(45.0),
            macd_histogram: MetricValue::Available(1.2),
            perf_7d: MetricValue::Available(3.0),
            perf_30d: MetricValue::Available(-1.0),
            perf_60d: MetricValue::Available(4.0),
            sma_20: MetricValue::Unavailable,
        }
    }

    #[test]
    fn test_all_fundamentals_pass() {
        let result = score(
            &strong_fundamentals(),
            &TechnicalsRecord::empty(),
            &ThresholdConfig::default(),
        );

        assert_eq!(result.fundamental_points, 40);
        assert!((result.fundamental - 6.0).abs() < 1e-9);
        assert_eq!(result.technical, 0.0);
    }

    #[test]
    fn test_technicals_scenario() {
        let result = score(
            &FundamentalsRecord::default(),
            &mixed_technicals(),
            &ThresholdConfig::default(),
        );

        assert_eq!(result.technical_points, 40);
        assert_eq!(result.technical_max_points, 50);
        assert!((result.technical - 3.2).abs() < 1e-9);
        assert!((result.composite - 3.2).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_band_inclusive() {
        let mut technicals = TechnicalsRecord::empty();
        technicals.rsi = MetricValue::Available(60.0);

        let result = score(
            &FundamentalsRecord::default(),
            &technicals,
            &ThresholdConfig::default(),
        );
        assert_eq!(result.technical_points, 10);
    }

    #[test]
    fn test_unavailable_scores_zero() {
        let result = score(
            &FundamentalsRecord::default(),
            &TechnicalsRecord::empty(),
            &ThresholdConfig::default(),
        );

        assert_eq!(result.composite, 0.0);
        assert_eq!(result.fundamental_max_points, 40);
    }

    #[test]
    fn test_revenue_growth_criterion_when_configured() {
        let thresholds = ThresholdConfig::builder().min_revenue_growth(5.0).build().unwrap();

        let result = score(&strong_fundamentals(), &TechnicalsRecord::empty(), &thresholds);

        assert_eq!(result.fundamental_points, 40);
        assert_eq!(result.fundamental_max_points, 50);
        assert!((result.fundamental - 4.8).abs() < 1e-9);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let thresholds = ThresholdConfig::default();
        let a = score(&strong_fundamentals(), &mixed_technicals(), &thresholds);
        let b = score(&strong_fundamentals(), &mixed_technicals(), &thresholds);

        assert_eq!(a, b);
        assert!((a.composite - 9.2).abs() < 1e-9);
    }
}
