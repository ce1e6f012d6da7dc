//! Utility functions for the match session service

use crate::types::MatchId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> MatchId {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Calculate the absolute difference between two ratings
pub fn rating_difference(rating1: i32, rating2: i32) -> i32 {
    (rating1 - rating2).abs()
}

/// Check if two ratings fall within the pairing window
pub fn ratings_within_window(rating1: i32, rating2: i32, window: i32) -> bool {
    rating_difference(rating1, rating2) <= window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_match_id();
        let id2 = generate_match_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_rating_difference() {
        assert_eq!(rating_difference(1300, 1200), 100);
        assert_eq!(rating_difference(1200, 1300), 100);
        assert_eq!(rating_difference(1200, 1200), 0);
    }

    #[test]
    fn test_ratings_within_window() {
        assert!(ratings_within_window(1200, 1400, 200));
        assert!(!ratings_within_window(1200, 1401, 200));
        assert!(ratings_within_window(1200, 1200, 0));
    }
}
