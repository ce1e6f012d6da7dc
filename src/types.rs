//! Common types used throughout the match session service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for matches (shared by the Room and its MatchRecord)
pub type MatchId = Uuid;

/// Default rating assigned to players without a stored rating
pub const DEFAULT_RATING: i32 = 1200;

/// Persisted match-state marker for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MatchState {
    /// Not pairing and not playing
    #[default]
    None,
    /// Waiting alone in a room for an opponent
    Pairing,
    /// Playing an in-progress match
    InMatch,
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchState::None => write!(f, "none"),
            MatchState::Pairing => write!(f, "pairing"),
            MatchState::InMatch => write!(f, "in-match"),
        }
    }
}

/// Outcome of a finished match from player one's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
}

impl MatchOutcome {
    /// Actual score S used by the rating engine
    pub fn score(&self) -> f64 {
        match self {
            MatchOutcome::Win => 1.0,
            MatchOutcome::Loss => 0.0,
            MatchOutcome::Draw => 0.5,
        }
    }

    /// The same outcome seen from the other side of the table
    pub fn inverse(&self) -> Self {
        match self {
            MatchOutcome::Win => MatchOutcome::Loss,
            MatchOutcome::Loss => MatchOutcome::Win,
            MatchOutcome::Draw => MatchOutcome::Draw,
        }
    }
}

/// Persistent user profile fields owned by the session logic
///
/// Authentication material lives with the auth collaborator and is not
/// represented here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: PlayerId,
    pub display_name: String,
    pub rating: i32,
    pub match_state: MatchState,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    /// Current consecutive-win streak; reset on loss or draw
    pub streak: i32,
    pub best_streak: i32,
}

impl UserProfile {
    /// Create a fresh profile with default rating and zeroed counters
    pub fn new(id: PlayerId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            rating: DEFAULT_RATING,
            match_state: MatchState::None,
            games: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            streak: 0,
            best_streak: 0,
        }
    }

    /// Apply one settled match to the profile: rating delta, lifetime
    /// counters, streak bookkeeping, and the match-state reset.
    pub fn apply_settlement(&mut self, delta: i32, outcome: MatchOutcome) {
        self.rating += delta;
        self.games += 1;
        match outcome {
            MatchOutcome::Win => {
                self.wins += 1;
                self.streak += 1;
                self.best_streak = self.best_streak.max(self.streak);
            }
            MatchOutcome::Loss => {
                self.losses += 1;
                self.streak = 0;
            }
            MatchOutcome::Draw => {
                self.draws += 1;
                self.streak = 0;
            }
        }
        self.match_state = MatchState::None;
    }
}

/// Durable record of a match: participants, outcome and rating deltas
///
/// Created when a room is created (second participant unset until joined),
/// finalized exactly once when the match completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub player_one: PlayerId,
    pub player_two: Option<PlayerId>,
    /// None means draw once finalized, or "not finished yet" before that
    pub winner: Option<PlayerId>,
    pub delta_one: Option<i32>,
    pub delta_two: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl MatchRecord {
    /// Create a new open record with the second participant slot empty
    pub fn open(id: MatchId, player_one: PlayerId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            player_one,
            player_two: None,
            winner: None,
            delta_one: None,
            delta_two: None,
            created_at,
            finalized_at: None,
        }
    }

    /// Whether the record has been finalized
    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }
}

/// A trivia question as stored; read-only during a match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub correct_answer: String,
    /// Up to three distractors
    pub incorrect_answers: Vec<String>,
    pub topic: String,
    pub difficulty: String,
}

/// Per-player line of a settlement summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSettlement {
    pub player_id: PlayerId,
    pub reported_correct: u32,
    pub delta: i32,
    pub new_rating: i32,
}

/// Result of settling a finished match, pushed to the room and recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub match_id: MatchId,
    pub total_questions: usize,
    pub players: Vec<PlayerSettlement>,
    /// None for a draw
    pub winner: Option<PlayerId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_scores() {
        assert_eq!(MatchOutcome::Win.score(), 1.0);
        assert_eq!(MatchOutcome::Loss.score(), 0.0);
        assert_eq!(MatchOutcome::Draw.score(), 0.5);
    }

    #[test]
    fn test_outcome_inverse() {
        assert_eq!(MatchOutcome::Win.inverse(), MatchOutcome::Loss);
        assert_eq!(MatchOutcome::Loss.inverse(), MatchOutcome::Win);
        assert_eq!(MatchOutcome::Draw.inverse(), MatchOutcome::Draw);
    }

    #[test]
    fn test_open_record_has_empty_second_slot() {
        let record = MatchRecord::open(Uuid::new_v4(), "p1".to_string(), Utc::now());
        assert!(record.player_two.is_none());
        assert!(record.winner.is_none());
        assert!(!record.is_finalized());
    }

    #[test]
    fn test_new_profile_defaults() {
        let profile = UserProfile::new("p1".to_string(), "Player One".to_string());
        assert_eq!(profile.rating, DEFAULT_RATING);
        assert_eq!(profile.match_state, MatchState::None);
        assert_eq!(profile.games, 0);
    }

    #[test]
    fn test_apply_settlement_win_extends_streak() {
        let mut profile = UserProfile::new("p1".to_string(), "Player One".to_string());
        profile.match_state = MatchState::InMatch;

        profile.apply_settlement(10, MatchOutcome::Win);
        profile.apply_settlement(8, MatchOutcome::Win);

        assert_eq!(profile.rating, DEFAULT_RATING + 18);
        assert_eq!(profile.games, 2);
        assert_eq!(profile.wins, 2);
        assert_eq!(profile.streak, 2);
        assert_eq!(profile.best_streak, 2);
        assert_eq!(profile.match_state, MatchState::None);
    }

    #[test]
    fn test_apply_settlement_draw_resets_streak() {
        let mut profile = UserProfile::new("p1".to_string(), "Player One".to_string());
        profile.apply_settlement(10, MatchOutcome::Win);
        profile.apply_settlement(0, MatchOutcome::Draw);

        assert_eq!(profile.streak, 0);
        assert_eq!(profile.best_streak, 1);
        assert_eq!(profile.draws, 1);
    }
}
