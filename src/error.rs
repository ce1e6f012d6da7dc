//! Error types for the match session service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific session scenarios
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    #[error("Player {player_id} is already pairing or in a match")]
    AlreadyInMatchOrPairing { player_id: String },

    #[error("Match {match_id} has already started")]
    MatchAlreadyStarted { match_id: String },

    #[error("Unknown match: {match_id}")]
    UnknownMatch { match_id: String },

    #[error("Player {player_id} is not a participant of match {match_id}")]
    PlayerNotInMatch { match_id: String, player_id: String },

    #[error("Unknown player: {player_id}")]
    UnknownPlayer { player_id: String },

    #[error("No questions available for distribution")]
    NoQuestionsAvailable,

    #[error("Session store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Settlement failed for match {match_id}: {message}")]
    SettlementFailed { match_id: String, message: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl SessionError {
    /// Whether the error is a player-facing precondition/validation failure
    /// rather than an infrastructure fault.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            SessionError::Validation { .. }
                | SessionError::AlreadyInMatchOrPairing { .. }
                | SessionError::MatchAlreadyStarted { .. }
                | SessionError::UnknownMatch { .. }
                | SessionError::PlayerNotInMatch { .. }
                | SessionError::UnknownPlayer { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_fault_classification() {
        let precondition = SessionError::AlreadyInMatchOrPairing {
            player_id: "p1".to_string(),
        };
        assert!(precondition.is_client_fault());

        let store = SessionError::StoreUnavailable {
            message: "connection refused".to_string(),
        };
        assert!(!store.is_client_fault());

        let settlement = SessionError::SettlementFailed {
            match_id: "m1".to_string(),
            message: "commit aborted".to_string(),
        };
        assert!(!settlement.is_client_fault());
    }
}
