//! Test fixtures and mock implementations for integration testing

use async_trait::async_trait;
use quiz_duel::error::{Result, SessionError};
use quiz_duel::store::{InMemorySessionStore, SessionStore, SettlementUpdate};
use quiz_duel::types::{
    MatchId, MatchRecord, MatchState, Question, UserProfile,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Build a question pool of the given size
pub fn question_pool(count: usize) -> Vec<Question> {
    (0..count)
        .map(|i| Question {
            id: format!("q{}", i),
            text: format!("Question {}?", i),
            correct_answer: "right".to_string(),
            incorrect_answers: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            topic: "general".to_string(),
            difficulty: "easy".to_string(),
        })
        .collect()
}

/// Build a seeded store with players and a question pool
pub fn seeded_store(players: &[(&str, i32)], questions: usize) -> Arc<InMemorySessionStore> {
    let store = Arc::new(InMemorySessionStore::new());
    for (id, rating) in players {
        let mut profile = UserProfile::new(id.to_string(), id.to_uppercase());
        profile.rating = *rating;
        store.seed_user(profile);
    }
    store.seed_questions(question_pool(questions));
    store
}

/// Store wrapper with failure injection, for atomicity tests
pub struct FlakySessionStore {
    inner: Arc<InMemorySessionStore>,
    pub fail_create_match: AtomicBool,
    pub fail_set_match_state: AtomicBool,
    /// Number of upcoming settlement commits that should fail
    pub failing_commits: AtomicUsize,
}

impl FlakySessionStore {
    pub fn new(inner: Arc<InMemorySessionStore>) -> Self {
        Self {
            inner,
            fail_create_match: AtomicBool::new(false),
            fail_set_match_state: AtomicBool::new(false),
            failing_commits: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> Arc<InMemorySessionStore> {
        self.inner.clone()
    }

    fn unavailable() -> anyhow::Error {
        SessionError::StoreUnavailable {
            message: "injected store failure".to_string(),
        }
        .into()
    }
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn get_user(&self, player_id: &str) -> Result<Option<UserProfile>> {
        self.inner.get_user(player_id).await
    }

    async fn upsert_user(&self, profile: UserProfile) -> Result<()> {
        self.inner.upsert_user(profile).await
    }

    async fn set_match_state(&self, player_id: &str, state: MatchState) -> Result<()> {
        if self.fail_set_match_state.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.set_match_state(player_id, state).await
    }

    async fn top_by_rating(&self, limit: usize) -> Result<Vec<UserProfile>> {
        self.inner.top_by_rating(limit).await
    }

    async fn create_match(&self, record: MatchRecord) -> Result<()> {
        if self.fail_create_match.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.create_match(record).await
    }

    async fn get_match(&self, match_id: MatchId) -> Result<Option<MatchRecord>> {
        self.inner.get_match(match_id).await
    }

    async fn set_second_participant(&self, match_id: MatchId, player_id: &str) -> Result<()> {
        self.inner.set_second_participant(match_id, player_id).await
    }

    async fn void_match(&self, match_id: MatchId) -> Result<()> {
        self.inner.void_match(match_id).await
    }

    async fn sample_questions(&self, count: usize) -> Result<Vec<Question>> {
        self.inner.sample_questions(count).await
    }

    async fn commit_settlement(
        &self,
        record: &MatchRecord,
        updates: &[SettlementUpdate],
    ) -> Result<()> {
        let remaining = self.failing_commits.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_commits.store(remaining - 1, Ordering::SeqCst);
            return Err(Self::unavailable());
        }
        self.inner.commit_settlement(record, updates).await
    }
}
