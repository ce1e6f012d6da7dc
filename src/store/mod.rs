//! Persistent session store interface and implementations
//!
//! This module defines the narrow interface the session logic needs from the
//! durable store (user profiles, match records, questions), with an in-memory,
//! database-ready implementation used by tests and standalone runs.

pub mod memory;

use crate::error::Result;
use crate::types::{MatchId, MatchOutcome, MatchRecord, MatchState, PlayerId, Question, UserProfile};
use async_trait::async_trait;

// Re-export commonly used types
pub use memory::InMemorySessionStore;

/// One participant's share of a settlement commit
#[derive(Debug, Clone)]
pub struct SettlementUpdate {
    pub player_id: PlayerId,
    pub delta: i32,
    /// Outcome from this participant's perspective
    pub outcome: MatchOutcome,
}

/// Trait for durable session storage operations
///
/// The store is the source of truth across process restarts; room state is
/// not persisted here, only MatchRecords and user profile fields.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Point lookup of a user profile
    async fn get_user(&self, player_id: &str) -> Result<Option<UserProfile>>;

    /// Insert or replace a user profile
    async fn upsert_user(&self, profile: UserProfile) -> Result<()>;

    /// Atomic single-field update of a user's match-state marker
    async fn set_match_state(&self, player_id: &str, state: MatchState) -> Result<()>;

    /// Top users by rating, for the ranking endpoint
    async fn top_by_rating(&self, limit: usize) -> Result<Vec<UserProfile>>;

    /// Persist a newly opened match record (second participant unset)
    async fn create_match(&self, record: MatchRecord) -> Result<()>;

    /// Point lookup of a match record
    async fn get_match(&self, match_id: MatchId) -> Result<Option<MatchRecord>>;

    /// Fill the second participant slot of an open match record
    async fn set_second_participant(&self, match_id: MatchId, player_id: &str) -> Result<()>;

    /// Delete a match record that never completed (cancel/reap paths)
    async fn void_match(&self, match_id: MatchId) -> Result<()>;

    /// Random sample of up to `count` questions
    async fn sample_questions(&self, count: usize) -> Result<Vec<Question>>;

    /// Commit a settlement as one logical transaction: the finalized match
    /// record plus both participants' rating/counter/state updates. Either
    /// everything is applied or nothing is.
    async fn commit_settlement(
        &self,
        record: &MatchRecord,
        updates: &[SettlementUpdate],
    ) -> Result<()>;
}
