//! ELO delta computation for two-player matches
//!
//! Pure and fully deterministic: given both prior ratings and the outcome,
//! produce the rounded rating delta for each side. The logistic expectation
//! comes from the skillratings crate's Elo implementation; deltas are computed
//! independently per participant, so rounding can make a decisive result sum
//! to a nonzero total. Only a draw between equal ratings is exactly zero-sum.

use crate::config::RatingConfig;
use crate::error::Result;
use crate::types::MatchOutcome;
use skillratings::elo::{expected_score, EloRating};

/// Rating deltas for both participants, in participant order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingDeltas {
    pub delta_a: i32,
    pub delta_b: i32,
}

/// ELO rating engine configured with a K-factor and default rating
#[derive(Debug, Clone)]
pub struct EloEngine {
    config: RatingConfig,
}

impl EloEngine {
    /// Create a new engine; rejects non-positive K-factors
    pub fn new(config: RatingConfig) -> Result<Self> {
        if config.k_factor <= 0.0 {
            return Err(crate::error::SessionError::Internal {
                message: format!("Invalid rating K-factor: {}", config.k_factor),
            }
            .into());
        }
        Ok(Self { config })
    }

    /// Rating assigned to players with no stored rating
    pub fn default_rating(&self) -> i32 {
        self.config.default_rating
    }

    /// Expected score for each side: `E_a = 1 / (1 + 10^((R_b - R_a)/400))`
    /// and symmetric for b. The two always sum to 1.
    pub fn expected(&self, rating_a: i32, rating_b: i32) -> (f64, f64) {
        let a = EloRating {
            rating: rating_a as f64,
        };
        let b = EloRating {
            rating: rating_b as f64,
        };
        expected_score(&a, &b)
    }

    /// Compute both deltas for a finished match.
    ///
    /// `outcome` is from participant A's perspective. Each delta is
    /// `round(K * (S - E))`, applied independently per participant.
    pub fn settle(&self, rating_a: i32, rating_b: i32, outcome: MatchOutcome) -> RatingDeltas {
        let (expected_a, expected_b) = self.expected(rating_a, rating_b);
        let score_a = outcome.score();
        let score_b = outcome.inverse().score();

        RatingDeltas {
            delta_a: (self.config.k_factor * (score_a - expected_a)).round() as i32,
            delta_b: (self.config.k_factor * (score_b - expected_b)).round() as i32,
        }
    }
}

impl Default for EloEngine {
    fn default() -> Self {
        Self {
            config: RatingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn engine() -> EloEngine {
        EloEngine::default()
    }

    #[test]
    fn test_expected_scores_sum_to_one() {
        let (ea, eb) = engine().expected(1200, 1400);
        assert!((ea + eb - 1.0).abs() < 1e-9);
        assert!(ea < eb);
    }

    #[test]
    fn test_equal_ratings_neutral_expectation() {
        let (ea, eb) = engine().expected(1200, 1200);
        assert!((ea - 0.5).abs() < 1e-9);
        assert!((eb - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_equal_ratings_win() {
        // E = 0.5 both sides, K = 20: winner +10, loser -10.
        let deltas = engine().settle(1200, 1200, MatchOutcome::Win);
        assert_eq!(deltas.delta_a, 10);
        assert_eq!(deltas.delta_b, -10);
    }

    #[test]
    fn test_equal_ratings_draw_is_zero() {
        let deltas = engine().settle(1200, 1200, MatchOutcome::Draw);
        assert_eq!(deltas.delta_a, 0);
        assert_eq!(deltas.delta_b, 0);
    }

    #[test]
    fn test_underdog_gains_more() {
        let underdog = engine().settle(1000, 1400, MatchOutcome::Win);
        let favorite = engine().settle(1400, 1000, MatchOutcome::Win);
        assert!(underdog.delta_a > favorite.delta_a);
        assert!(favorite.delta_a >= 1);
    }

    #[test]
    fn test_loss_is_win_mirrored() {
        let win = engine().settle(1300, 1100, MatchOutcome::Win);
        let loss = engine().settle(1100, 1300, MatchOutcome::Loss);
        assert_eq!(win.delta_a, loss.delta_b);
        assert_eq!(win.delta_b, loss.delta_a);
    }

    #[test]
    fn test_rejects_non_positive_k() {
        let config = RatingConfig {
            k_factor: 0.0,
            ..RatingConfig::default()
        };
        assert!(EloEngine::new(config).is_err());
    }

    proptest! {
        #[test]
        fn prop_deltas_bounded_by_k(ra in 0i32..4000, rb in 0i32..4000) {
            let e = engine();
            for outcome in [MatchOutcome::Win, MatchOutcome::Loss, MatchOutcome::Draw] {
                let deltas = e.settle(ra, rb, outcome);
                prop_assert!(deltas.delta_a.abs() <= 20);
                prop_assert!(deltas.delta_b.abs() <= 20);
            }
        }

        #[test]
        fn prop_winner_never_loses_points(ra in 0i32..4000, rb in 0i32..4000) {
            let deltas = engine().settle(ra, rb, MatchOutcome::Win);
            prop_assert!(deltas.delta_a >= 0);
            prop_assert!(deltas.delta_b <= 0);
        }

        #[test]
        fn prop_deterministic(ra in 0i32..4000, rb in 0i32..4000) {
            let e = engine();
            let first = e.settle(ra, rb, MatchOutcome::Win);
            let second = e.settle(ra, rb, MatchOutcome::Win);
            prop_assert_eq!(first, second);
        }
    }
}
