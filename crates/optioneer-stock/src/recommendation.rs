//! Composite score to put-selling parameters

use crate::models::{Recommendation, Strategy};

/// Composite at or above which the aggressive posture applies
pub const AGGRESSIVE_FLOOR: f64 = 8.0;
/// Composite at or above which the moderate posture applies
pub const MODERATE_FLOOR: f64 = 6.0;

/// Map a composite score and spot price to expiration, delta and strike
pub fn recommend(composite: f64, price: f64) -> Recommendation {
    let strategy = if composite >= AGGRESSIVE_FLOOR {
        Strategy::Aggressive
    } else if composite >= MODERATE_FLOOR {
        Strategy::Moderate
    } else {
        Strategy::Conservative
    };

    let (expiration_days, target_delta, strike_factor) = match strategy {
        Strategy::Aggressive => (60, 50, 1.0),
        Strategy::Moderate => (45, 35, 0.97),
        Strategy::Conservative => (30, 20, 0.90),
    };

    Recommendation {
        expiration_days,
        target_delta,
        strike: price * strike_factor,
        strategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        let at_eight = recommend(8.0, 100.0);
        assert_eq!((at_eight.expiration_days, at_eight.target_delta), (60, 50));
        assert_eq!(at_eight.strike, 100.0);

        let below_eight = recommend(7.999, 100.0);
        assert_eq!((below_eight.expiration_days, below_eight.target_delta), (45, 35));
        assert!((below_eight.strike - 97.0).abs() < 1e-9);
        assert_eq!(below_eight.strategy, Strategy::Moderate);

        let at_six = recommend(6.0, 100.0);
        assert_eq!(at_six.strategy, Strategy::Moderate);
    }

    #[test]
    fn test_conservative() {
        let rec = recommend(3.2, 50.0);
        assert_eq!(rec.strategy, Strategy::Conservative);
        assert_eq!((rec.expiration_days, rec.target_delta), (30, 20));
        assert!((rec.strike - 45.0).abs() < 1e-9);
    }
}
