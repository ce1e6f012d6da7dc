//! Rating system configuration

use serde::{Deserialize, Serialize};

/// Configuration for the ELO rating engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingConfig {
    /// K-factor applied to the expectation gap
    pub k_factor: f64,
    /// Rating assigned to players without a stored rating
    pub default_rating: i32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k_factor: 20.0,
            default_rating: 1200,
        }
    }
}
