use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{TallyOutcome, VoteCounts, VoteDirection},
    services::{
        tally::{self, VoteAction},
        vote_store::{StoreError, VoteStore},
    },
};

/// Postgres-backed vote store.
///
/// Every tally locks the post row with `FOR UPDATE` before reading the
/// caller's vote, so tallies on the same post run one after another and the
/// vote row and counters always commit together.
#[derive(Clone)]
pub struct PgVoteStore {
    db: PgPool,
}

impl PgVoteStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VoteStore for PgVoteStore {
    async fn apply_transition(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        requested: VoteDirection,
    ) -> Result<TallyOutcome, StoreError> {
        let mut tx = self.db.begin().await?;

        let locked = sqlx::query_as::<_, VoteCounts>(
            "SELECT upvote_count, downvote_count FROM forum_posts WHERE id = $1 FOR UPDATE",
        )
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            // Dropping the transaction rolls it back
            return Err(StoreError::PostNotFound(post_id));
        }

        let current = sqlx::query_scalar::<_, VoteDirection>(
            "SELECT direction FROM forum_votes WHERE user_id = $1 AND post_id = $2",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;

        let transition = tally::plan(current, requested);
        let now = Utc::now();

        match transition.action {
            VoteAction::Insert(direction) => {
                sqlx::query(
                    r#"
                    INSERT INTO forum_votes (user_id, post_id, direction, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $4)
                    "#,
                )
                .bind(user_id)
                .bind(post_id)
                .bind(direction)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            VoteAction::Switch(direction) => {
                sqlx::query(
                    r#"
                    UPDATE forum_votes SET direction = $3, updated_at = $4
                    WHERE user_id = $1 AND post_id = $2
                    "#,
                )
                .bind(user_id)
                .bind(post_id)
                .bind(direction)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            VoteAction::Retract => {
                sqlx::query("DELETE FROM forum_votes WHERE user_id = $1 AND post_id = $2")
                    .bind(user_id)
                    .bind(post_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let counts = sqlx::query_as::<_, VoteCounts>(
            r#"
            UPDATE forum_posts
            SET upvote_count = GREATEST(upvote_count + $2, 0),
                downvote_count = GREATEST(downvote_count + $3, 0),
                updated_at = $4
            WHERE id = $1
            RETURNING upvote_count, downvote_count
            "#,
        )
        .bind(post_id)
        .bind(transition.delta.upvotes)
        .bind(transition.delta.downvotes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(TallyOutcome::new(counts, transition.next))
    }

    async fn current_vote(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<Option<VoteDirection>, StoreError> {
        let direction = sqlx::query_scalar::<_, VoteDirection>(
            "SELECT direction FROM forum_votes WHERE user_id = $1 AND post_id = $2",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(direction)
    }

    async fn counts(&self, post_id: Uuid) -> Result<Option<VoteCounts>, StoreError> {
        let counts = sqlx::query_as::<_, VoteCounts>(
            "SELECT upvote_count, downvote_count FROM forum_posts WHERE id = $1",
        )
        .bind(post_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(counts)
    }

    async fn recount(&self, post_id: Uuid) -> Result<Option<VoteCounts>, StoreError> {
        let counts = sqlx::query_as::<_, VoteCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM forum_votes v
                 WHERE v.post_id = p.id AND v.direction = 'up')::INT AS upvote_count,
                (SELECT COUNT(*) FROM forum_votes v
                 WHERE v.post_id = p.id AND v.direction = 'down')::INT AS downvote_count
            FROM forum_posts p
            WHERE p.id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(counts)
    }
}
