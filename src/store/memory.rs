//! In-memory session store implementation
//!
//! Database-ready shape: the same trait can be implemented over a SQL pool
//! without touching the session logic. The in-memory variant keeps all three
//! record families under one lock so the settlement commit is atomic.

use crate::error::Result;
use crate::store::{SessionStore, SettlementUpdate};
use crate::types::{
    MatchId, MatchRecord, MatchState, PlayerId, Question, UserProfile,
};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct StoreInner {
    users: HashMap<PlayerId, UserProfile>,
    matches: HashMap<MatchId, MatchRecord>,
    questions: Vec<Question>,
}

/// In-memory implementation of the session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: RwLock<StoreInner>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user profile (test/bootstrap helper)
    pub fn seed_user(&self, profile: UserProfile) {
        if let Ok(mut inner) = self.inner.write() {
            inner.users.insert(profile.id.clone(), profile);
        }
    }

    /// Seed the question pool (test/bootstrap helper)
    pub fn seed_questions(&self, questions: Vec<Question>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.questions.extend(questions);
        }
    }

    /// Number of stored match records (for tests and health reporting)
    pub fn match_count(&self) -> usize {
        self.inner.read().map(|inner| inner.matches.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreInner>> {
        self.inner
            .read()
            .map_err(|_| {
                crate::error::SessionError::StoreUnavailable {
                    message: "Failed to acquire store read lock".to_string(),
                }
                .into()
            })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreInner>> {
        self.inner
            .write()
            .map_err(|_| {
                crate::error::SessionError::StoreUnavailable {
                    message: "Failed to acquire store write lock".to_string(),
                }
                .into()
            })
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_user(&self, player_id: &str) -> Result<Option<UserProfile>> {
        let inner = self.read()?;
        Ok(inner.users.get(player_id).cloned())
    }

    async fn upsert_user(&self, profile: UserProfile) -> Result<()> {
        let mut inner = self.write()?;
        inner.users.insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn set_match_state(&self, player_id: &str, state: MatchState) -> Result<()> {
        let mut inner = self.write()?;
        match inner.users.get_mut(player_id) {
            Some(user) => {
                user.match_state = state;
                Ok(())
            }
            None => Err(crate::error::SessionError::UnknownPlayer {
                player_id: player_id.to_string(),
            }
            .into()),
        }
    }

    async fn top_by_rating(&self, limit: usize) -> Result<Vec<UserProfile>> {
        let inner = self.read()?;
        let mut users: Vec<UserProfile> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.id.cmp(&b.id)));
        users.truncate(limit);
        Ok(users)
    }

    async fn create_match(&self, record: MatchRecord) -> Result<()> {
        let mut inner = self.write()?;
        inner.matches.insert(record.id, record);
        Ok(())
    }

    async fn get_match(&self, match_id: MatchId) -> Result<Option<MatchRecord>> {
        let inner = self.read()?;
        Ok(inner.matches.get(&match_id).cloned())
    }

    async fn set_second_participant(&self, match_id: MatchId, player_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        match inner.matches.get_mut(&match_id) {
            Some(record) => {
                record.player_two = Some(player_id.to_string());
                Ok(())
            }
            None => Err(crate::error::SessionError::UnknownMatch {
                match_id: match_id.to_string(),
            }
            .into()),
        }
    }

    async fn void_match(&self, match_id: MatchId) -> Result<()> {
        let mut inner = self.write()?;
        inner.matches.remove(&match_id);
        Ok(())
    }

    async fn sample_questions(&self, count: usize) -> Result<Vec<Question>> {
        let inner = self.read()?;
        let pool = &inner.questions;
        if pool.is_empty() || count == 0 {
            return Ok(Vec::new());
        }

        // Partial Fisher-Yates over the index space: up to `count` distinct rows.
        let mut rng = rand::rng();
        let mut indices: Vec<usize> = (0..pool.len()).collect();
        let take = count.min(pool.len());
        for i in 0..take {
            let j = rng.random_range(i..indices.len());
            indices.swap(i, j);
        }

        Ok(indices[..take].iter().map(|&i| pool[i].clone()).collect())
    }

    async fn commit_settlement(
        &self,
        record: &MatchRecord,
        updates: &[SettlementUpdate],
    ) -> Result<()> {
        let mut inner = self.write()?;

        // Validate everything before mutating anything: the commit is atomic.
        if !inner.matches.contains_key(&record.id) {
            return Err(crate::error::SessionError::UnknownMatch {
                match_id: record.id.to_string(),
            }
            .into());
        }
        for update in updates {
            if !inner.users.contains_key(&update.player_id) {
                return Err(crate::error::SessionError::UnknownPlayer {
                    player_id: update.player_id.clone(),
                }
                .into());
            }
        }

        let mut finalized = record.clone();
        if finalized.finalized_at.is_none() {
            finalized.finalized_at = Some(current_timestamp());
        }
        inner.matches.insert(finalized.id, finalized);

        for update in updates {
            if let Some(user) = inner.users.get_mut(&update.player_id) {
                user.apply_settlement(update.delta, update.outcome);
            }
        }

        Ok(())
    }
}
