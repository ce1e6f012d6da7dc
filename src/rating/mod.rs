//! ELO rating engine for head-to-head match settlement
//!
//! This module provides the pure rating calculation used when a match is
//! settled, built on the classic Elo formulation from the skillratings crate.

pub mod elo;

// Re-export commonly used types
pub use elo::{EloEngine, RatingDeltas};
