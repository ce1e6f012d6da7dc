//! Question supply for match rounds
//!
//! The supplier is stateless beyond the store query: each match gets a fresh
//! randomized batch, and the session logic only retains the batch size.

use crate::error::Result;
use crate::store::SessionStore;
use crate::types::Question;
use std::sync::Arc;
use tracing::{debug, warn};

/// Draws randomized question batches from the persistent question pool
pub struct QuestionSupplier {
    store: Arc<dyn SessionStore>,
    batch_size: usize,
}

impl QuestionSupplier {
    /// Create a supplier drawing `batch_size` questions per match
    pub fn new(store: Arc<dyn SessionStore>, batch_size: usize) -> Self {
        Self { store, batch_size }
    }

    /// Number of questions requested per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Draw a random batch for one match.
    ///
    /// Fails with `NoQuestionsAvailable` when the pool is empty; a partial
    /// batch (pool smaller than the requested size) is served as-is.
    pub async fn draw_batch(&self) -> Result<Vec<Question>> {
        let batch = self.store.sample_questions(self.batch_size).await?;

        if batch.is_empty() {
            warn!("Question pool is empty, cannot distribute a round");
            return Err(crate::error::SessionError::NoQuestionsAvailable.into());
        }

        if batch.len() < self.batch_size {
            warn!(
                "Question pool smaller than batch size: serving {} of {}",
                batch.len(),
                self.batch_size
            );
        }

        debug!("Drew question batch of {}", batch.len());
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySessionStore;

    fn test_question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            text: format!("Question {}?", id),
            correct_answer: "right".to_string(),
            incorrect_answers: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            topic: "history".to_string(),
            difficulty: "medium".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_pool_is_an_error() {
        let store = Arc::new(InMemorySessionStore::new());
        let supplier = QuestionSupplier::new(store, 10);
        assert!(supplier.draw_batch().await.is_err());
    }

    #[tokio::test]
    async fn test_full_batch() {
        let store = Arc::new(InMemorySessionStore::new());
        store.seed_questions((0..20).map(|i| test_question(&i.to_string())).collect());

        let supplier = QuestionSupplier::new(store, 10);
        let batch = supplier.draw_batch().await.unwrap();
        assert_eq!(batch.len(), 10);
    }

    #[tokio::test]
    async fn test_partial_batch_served_as_is() {
        let store = Arc::new(InMemorySessionStore::new());
        store.seed_questions((0..4).map(|i| test_question(&i.to_string())).collect());

        let supplier = QuestionSupplier::new(store, 10);
        let batch = supplier.draw_batch().await.unwrap();
        assert_eq!(batch.len(), 4);
    }
}
