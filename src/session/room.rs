//! Room lifecycle and per-match state
//!
//! A Room is the ephemeral, in-memory side of a match: participants, reported
//! scores and lifecycle state. It never survives a process restart; the
//! durable side lives in the MatchRecord.

use crate::error::{Result, SessionError};
use crate::types::{MatchId, MatchOutcome, PlayerId};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Room capacity is fixed: matches are strictly head-to-head
pub const ROOM_CAPACITY: usize = 2;

/// Possible states of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// One participant, waiting to be paired
    WaitingForOpponent,
    /// Both participants present, round distributed or being distributed
    InProgress,
    /// Settlement underway; the room is removed right after
    Finalized,
}

/// In-memory state for one active or pending match
#[derive(Debug, Clone)]
pub struct Room {
    id: MatchId,
    /// Ordered: creator first, joiner second
    participants: Vec<PlayerId>,
    /// Creator's rating at creation time, used by the pairing search
    creator_rating: i32,
    state: RoomState,
    /// Size of the distributed batch; the batch itself is not retained
    total_questions: usize,
    reported: HashMap<PlayerId, u32>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Room {
    /// Create a room with its first participant, waiting for an opponent
    pub fn new(id: MatchId, creator: PlayerId, creator_rating: i32) -> Self {
        let now = current_timestamp();
        Self {
            id,
            participants: vec![creator],
            creator_rating,
            state: RoomState::WaitingForOpponent,
            total_questions: 0,
            reported: HashMap::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn participants(&self) -> &[PlayerId] {
        &self.participants
    }

    /// The room's first participant (its creator)
    pub fn creator(&self) -> &PlayerId {
        &self.participants[0]
    }

    /// The creator's rating as snapshotted at room creation
    pub fn creator_rating(&self) -> i32 {
        self.creator_rating
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.participants.iter().any(|p| p == player_id)
    }

    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    fn touch(&mut self) {
        self.last_activity = current_timestamp();
    }

    /// Add the second participant and start the match
    pub fn join(&mut self, player_id: PlayerId) -> Result<()> {
        if self.state != RoomState::WaitingForOpponent {
            return Err(SessionError::MatchAlreadyStarted {
                match_id: self.id.to_string(),
            }
            .into());
        }
        if self.contains(&player_id) {
            return Err(SessionError::Validation {
                reason: format!("Player {} is already in this room", player_id),
            }
            .into());
        }
        if self.participants.len() >= ROOM_CAPACITY {
            return Err(SessionError::Internal {
                message: format!("Room {} is over capacity", self.id),
            }
            .into());
        }

        self.participants.push(player_id);
        self.state = RoomState::InProgress;
        self.touch();
        Ok(())
    }

    /// Record the distributed batch size
    pub fn set_total_questions(&mut self, total: usize) {
        self.total_questions = total;
        self.touch();
    }

    /// Record a participant's self-reported correct count.
    ///
    /// Idempotent per player: a later report overwrites the earlier value.
    pub fn record_result(&mut self, player_id: &str, correct_count: u32) -> Result<()> {
        if self.state != RoomState::InProgress {
            return Err(SessionError::UnknownMatch {
                match_id: self.id.to_string(),
            }
            .into());
        }
        if !self.contains(player_id) {
            return Err(SessionError::PlayerNotInMatch {
                match_id: self.id.to_string(),
                player_id: player_id.to_string(),
            }
            .into());
        }

        self.reported.insert(player_id.to_string(), correct_count);
        self.touch();
        Ok(())
    }

    /// A participant's latest reported count, if any
    pub fn reported_for(&self, player_id: &str) -> Option<u32> {
        self.reported.get(player_id).copied()
    }

    /// Completion: exactly two participants and a recorded count for each
    pub fn is_complete(&self) -> bool {
        self.participants.len() == ROOM_CAPACITY
            && self
                .participants
                .iter()
                .all(|p| self.reported.contains_key(p.as_str()))
    }

    /// Outcome from the creator's perspective; None until complete
    pub fn outcome(&self) -> Option<MatchOutcome> {
        if !self.is_complete() {
            return None;
        }
        let first = self.reported_for(&self.participants[0])?;
        let second = self.reported_for(&self.participants[1])?;
        Some(match first.cmp(&second) {
            std::cmp::Ordering::Greater => MatchOutcome::Win,
            std::cmp::Ordering::Less => MatchOutcome::Loss,
            std::cmp::Ordering::Equal => MatchOutcome::Draw,
        })
    }

    /// Transition into settlement; only valid once, from a complete room
    pub fn mark_finalized(&mut self) -> Result<()> {
        if self.state != RoomState::InProgress || !self.is_complete() {
            return Err(SessionError::Internal {
                message: format!("Room {} is not ready for settlement", self.id),
            }
            .into());
        }
        self.state = RoomState::Finalized;
        self.touch();
        Ok(())
    }

    /// Roll back to InProgress after a failed settlement commit so a
    /// repeated report can retry.
    pub fn revert_to_in_progress(&mut self) {
        if self.state == RoomState::Finalized {
            self.state = RoomState::InProgress;
            self.touch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_match_id;

    fn waiting_room() -> Room {
        Room::new(generate_match_id(), "p1".to_string(), 1200)
    }

    fn started_room() -> Room {
        let mut room = waiting_room();
        room.join("p2".to_string()).unwrap();
        room
    }

    #[test]
    fn test_new_room_waits_for_opponent() {
        let room = waiting_room();
        assert_eq!(room.state(), RoomState::WaitingForOpponent);
        assert_eq!(room.participants().len(), 1);
        assert!(!room.is_complete());
    }

    #[test]
    fn test_join_starts_the_match() {
        let room = started_room();
        assert_eq!(room.state(), RoomState::InProgress);
        assert_eq!(room.participants(), ["p1".to_string(), "p2".to_string()]);
    }

    #[test]
    fn test_join_started_room_fails() {
        let mut room = started_room();
        assert!(room.join("p3".to_string()).is_err());
        assert_eq!(room.participants().len(), 2);
    }

    #[test]
    fn test_creator_cannot_join_own_room() {
        let mut room = waiting_room();
        assert!(room.join("p1".to_string()).is_err());
    }

    #[test]
    fn test_record_result_requires_participant() {
        let mut room = started_room();
        assert!(room.record_result("intruder", 5).is_err());
        assert!(room.record_result("p1", 5).is_ok());
    }

    #[test]
    fn test_record_result_before_start_fails() {
        let mut room = waiting_room();
        assert!(room.record_result("p1", 5).is_err());
    }

    #[test]
    fn test_report_overwrite_is_idempotent() {
        let mut room = started_room();
        room.record_result("p1", 3).unwrap();
        room.record_result("p1", 7).unwrap();
        assert_eq!(room.reported_for("p1"), Some(7));
        assert!(!room.is_complete());
    }

    #[test]
    fn test_completion_and_outcome() {
        let mut room = started_room();
        room.record_result("p1", 7).unwrap();
        assert!(room.outcome().is_none());

        room.record_result("p2", 5).unwrap();
        assert!(room.is_complete());
        assert_eq!(room.outcome(), Some(MatchOutcome::Win));
    }

    #[test]
    fn test_equal_counts_is_a_draw() {
        let mut room = started_room();
        room.record_result("p1", 5).unwrap();
        room.record_result("p2", 5).unwrap();
        assert_eq!(room.outcome(), Some(MatchOutcome::Draw));
    }

    #[test]
    fn test_finalize_guards() {
        let mut room = started_room();
        assert!(room.mark_finalized().is_err());

        room.record_result("p1", 7).unwrap();
        room.record_result("p2", 5).unwrap();
        assert!(room.mark_finalized().is_ok());
        assert_eq!(room.state(), RoomState::Finalized);

        // No second settlement from the same room.
        assert!(room.mark_finalized().is_err());
    }

    #[test]
    fn test_revert_reopens_for_retry() {
        let mut room = started_room();
        room.record_result("p1", 7).unwrap();
        room.record_result("p2", 5).unwrap();
        room.mark_finalized().unwrap();

        room.revert_to_in_progress();
        assert_eq!(room.state(), RoomState::InProgress);
        assert!(room.mark_finalized().is_ok());
    }
}
