use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{TallyOutcome, VoteCounts, VoteDirection};

// Postgres SQLSTATEs that mean "another transaction got there first"
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Forum post {0} not found")]
    PostNotFound(Uuid),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::ConcurrentModification(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        let code = error
            .as_database_error()
            .and_then(|db_error| db_error.code())
            .map(|code| code.into_owned());

        match code.as_deref() {
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | UNIQUE_VIOLATION) => {
                StoreError::ConcurrentModification(error.to_string())
            }
            _ => StoreError::Database(error),
        }
    }
}

/// Durable vote rows plus the per-post aggregate they feed.
///
/// `apply_transition` is the only write path. Implementations must read the
/// current vote, write or delete it, and apply the counter delta as one
/// atomic unit: either all of it becomes visible or none of it does.
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn apply_transition(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        requested: VoteDirection,
    ) -> Result<TallyOutcome, StoreError>;

    async fn current_vote(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<Option<VoteDirection>, StoreError>;

    /// Stored counters, `None` when the post does not exist.
    async fn counts(&self, post_id: Uuid) -> Result<Option<VoteCounts>, StoreError>;

    /// Counters recomputed from the vote rows, `None` when the post does not exist.
    async fn recount(&self, post_id: Uuid) -> Result<Option<VoteCounts>, StoreError>;
}
