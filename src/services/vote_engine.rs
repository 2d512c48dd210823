use std::{sync::Arc, time::Duration};

use rand::Rng;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{AggregateAudit, TallyOutcome, VoteDirection},
    services::{
        invalidation::{TallyNotifier, VoteInvalidation},
        vote_store::{StoreError, VoteStore},
    },
};

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("User not authenticated")]
    Unauthenticated,

    #[error("Forum post {0} not found")]
    NotFound(Uuid),

    #[error("Failed to record vote: {0}")]
    TallyFailed(String),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff with up to one base interval of jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = u64::try_from(self.base_backoff.as_millis()).unwrap_or(u64::MAX);
        let jitter = if base == 0 {
            0
        } else {
            rand::rng().random_range(0..=base)
        };
        Duration::from_millis(base.saturating_mul(attempt as u64).saturating_add(jitter))
    }
}

/// Applies vote requests to a [`VoteStore`] and announces committed tallies.
///
/// Transient conflicts are retried up to `RetryPolicy::max_attempts` times.
/// Every failure reaching the caller is a [`TallyError`]; the store
/// guarantees that a failed attempt left nothing behind.
pub struct VoteEngine {
    store: Arc<dyn VoteStore>,
    notifier: Arc<dyn TallyNotifier>,
    retry: RetryPolicy,
}

impl VoteEngine {
    pub fn new(
        store: Arc<dyn VoteStore>,
        notifier: Arc<dyn TallyNotifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            retry,
        }
    }

    pub async fn upvote(
        &self,
        user_id: Option<Uuid>,
        post_id: Uuid,
    ) -> Result<TallyOutcome, TallyError> {
        self.apply_vote(user_id, post_id, VoteDirection::Up).await
    }

    pub async fn downvote(
        &self,
        user_id: Option<Uuid>,
        post_id: Uuid,
    ) -> Result<TallyOutcome, TallyError> {
        self.apply_vote(user_id, post_id, VoteDirection::Down).await
    }

    pub async fn apply_vote(
        &self,
        user_id: Option<Uuid>,
        post_id: Uuid,
        requested: VoteDirection,
    ) -> Result<TallyOutcome, TallyError> {
        let Some(user_id) = user_id else {
            return Err(TallyError::Unauthenticated);
        };

        let outcome = self.apply_with_retry(user_id, post_id, requested).await?;

        tracing::debug!(
            %user_id,
            %post_id,
            %requested,
            upvotes = outcome.upvote_count,
            downvotes = outcome.downvote_count,
            vote = ?outcome.vote,
            "vote tallied"
        );

        // The tally is committed; a failed notification only leaves caches stale
        let event = VoteInvalidation::new(post_id, &outcome);
        if let Err(e) = self.notifier.post_tallied(&event).await {
            tracing::warn!(%post_id, "Failed to publish vote invalidation: {:?}", e);
        }

        Ok(outcome)
    }

    async fn apply_with_retry(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        requested: VoteDirection,
    ) -> Result<TallyOutcome, TallyError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self
                .store
                .apply_transition(user_id, post_id, requested)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(%post_id, attempt, "Vote tally conflicted, retrying: {}", e);
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                    attempt += 1;
                }
                Err(StoreError::PostNotFound(id)) => return Err(TallyError::NotFound(id)),
                Err(e) => {
                    tracing::error!(%post_id, attempt, "Vote tally failed: {:?}", e);
                    return Err(TallyError::TallyFailed(e.to_string()));
                }
            }
        }
    }

    /// Current counters plus the caller's vote, for rendering highlight state.
    pub async fn vote_state(
        &self,
        user_id: Option<Uuid>,
        post_id: Uuid,
    ) -> Result<TallyOutcome, TallyError> {
        let counts = self
            .store
            .counts(post_id)
            .await
            .map_err(read_failed)?
            .ok_or(TallyError::NotFound(post_id))?;

        let vote = match user_id {
            Some(user_id) => self
                .store
                .current_vote(user_id, post_id)
                .await
                .map_err(read_failed)?,
            None => None,
        };

        Ok(TallyOutcome::new(counts, vote))
    }

    pub async fn audit(&self, post_id: Uuid) -> Result<AggregateAudit, TallyError> {
        let stored = self
            .store
            .counts(post_id)
            .await
            .map_err(read_failed)?
            .ok_or(TallyError::NotFound(post_id))?;
        let recomputed = self
            .store
            .recount(post_id)
            .await
            .map_err(read_failed)?
            .ok_or(TallyError::NotFound(post_id))?;

        let consistent = stored == recomputed;
        if !consistent {
            tracing::warn!(
                %post_id,
                ?stored,
                ?recomputed,
                "Vote aggregate drifted from vote rows"
            );
        }

        Ok(AggregateAudit {
            post_id,
            stored,
            recomputed,
            consistent,
        })
    }
}

fn read_failed(error: StoreError) -> TallyError {
    match error {
        StoreError::PostNotFound(id) => TallyError::NotFound(id),
        other => TallyError::TallyFailed(other.to_string()),
    }
}
