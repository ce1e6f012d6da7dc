//! In-memory room registry
//!
//! The registry is the only shared mutable in-memory resource of the service.
//! It is owned exclusively by the SessionManager and never exposes its raw
//! map; every mutation happens through a guarded accessor so room transitions
//! stay serialized. Nothing here is persisted — a room with no corresponding
//! in-progress MatchRecord is a bug, not a recovery source.

use crate::error::{Result, SessionError};
use crate::session::room::{Room, RoomState};
use crate::types::{MatchId, PlayerId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Statistics about registry contents
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStats {
    pub active_rooms: usize,
    pub waiting_rooms: usize,
    pub in_progress_rooms: usize,
}

/// Owned service object wrapping the match-id → room map
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<MatchId, Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<MatchId, Room>>> {
        self.rooms.read().map_err(|_| {
            SessionError::Internal {
                message: "Failed to acquire room registry read lock".to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<MatchId, Room>>> {
        self.rooms.write().map_err(|_| {
            SessionError::Internal {
                message: "Failed to acquire room registry write lock".to_string(),
            }
            .into()
        })
    }

    /// Insert a freshly created room
    pub fn insert(&self, room: Room) -> Result<()> {
        let mut rooms = self.write()?;
        rooms.insert(room.id(), room);
        Ok(())
    }

    /// Remove a room, returning it if present
    pub fn remove(&self, match_id: MatchId) -> Result<Option<Room>> {
        let mut rooms = self.write()?;
        Ok(rooms.remove(&match_id))
    }

    /// Snapshot of a room's current state
    pub fn snapshot(&self, match_id: MatchId) -> Result<Option<Room>> {
        let rooms = self.read()?;
        Ok(rooms.get(&match_id).cloned())
    }

    /// Run a closure against a room under the write lock.
    ///
    /// Fails with `UnknownMatch` when the room does not exist. The closure
    /// must not block: the lock is held for its duration.
    pub fn with_room<T>(
        &self,
        match_id: MatchId,
        f: impl FnOnce(&mut Room) -> Result<T>,
    ) -> Result<T> {
        let mut rooms = self.write()?;
        let room = rooms.get_mut(&match_id).ok_or_else(|| SessionError::UnknownMatch {
            match_id: match_id.to_string(),
        })?;
        f(room)
    }

    /// Pairing search: the first room still waiting for an opponent whose
    /// creator satisfies the predicate, in registry iteration order.
    /// Intentionally not a best-fit matcher.
    pub fn find_waiting(
        &self,
        accept: impl Fn(&Room) -> bool,
    ) -> Result<Option<Room>> {
        let rooms = self.read()?;
        Ok(rooms
            .values()
            .find(|room| room.state() == RoomState::WaitingForOpponent && accept(room))
            .cloned())
    }

    /// The room a player currently belongs to, if any
    pub fn find_room_of(&self, player_id: &str) -> Result<Option<Room>> {
        let rooms = self.read()?;
        Ok(rooms.values().find(|room| room.contains(player_id)).cloned())
    }

    /// Rooms eligible for reaping: waiting rooms created before
    /// `waiting_cutoff` and in-progress rooms idle since before
    /// `stalled_cutoff`.
    pub fn find_stale(
        &self,
        waiting_cutoff: DateTime<Utc>,
        stalled_cutoff: DateTime<Utc>,
    ) -> Result<Vec<Room>> {
        let rooms = self.read()?;
        Ok(rooms
            .values()
            .filter(|room| match room.state() {
                RoomState::WaitingForOpponent => room.created_at() < waiting_cutoff,
                RoomState::InProgress => room.last_activity() < stalled_cutoff,
                RoomState::Finalized => false,
            })
            .cloned()
            .collect())
    }

    /// All participant ids across live rooms (for stats/health)
    pub fn active_players(&self) -> Result<Vec<PlayerId>> {
        let rooms = self.read()?;
        Ok(rooms
            .values()
            .flat_map(|room| room.participants().iter().cloned())
            .collect())
    }

    /// Current registry statistics
    pub fn stats(&self) -> Result<RegistryStats> {
        let rooms = self.read()?;
        let waiting = rooms
            .values()
            .filter(|r| r.state() == RoomState::WaitingForOpponent)
            .count();
        let in_progress = rooms
            .values()
            .filter(|r| r.state() == RoomState::InProgress)
            .count();
        Ok(RegistryStats {
            active_rooms: rooms.len(),
            waiting_rooms: waiting,
            in_progress_rooms: in_progress,
        })
    }
}
