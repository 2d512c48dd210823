use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::Result,
    models::TallyOutcome,
    redis::{RedisClient, forum_post_cache_key},
};

pub const VOTE_CHANNEL: &str = "forum:votes";

/// Emitted after a tally commits so cached renderings of the post can be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteInvalidation {
    pub post_id: Uuid,
    pub upvote_count: i32,
    pub downvote_count: i32,
}

impl VoteInvalidation {
    pub fn new(post_id: Uuid, outcome: &TallyOutcome) -> Self {
        Self {
            post_id,
            upvote_count: outcome.upvote_count,
            downvote_count: outcome.downvote_count,
        }
    }
}

#[async_trait]
pub trait TallyNotifier: Send + Sync {
    async fn post_tallied(&self, event: &VoteInvalidation) -> Result<()>;
}

pub struct NoopNotifier;

#[async_trait]
impl TallyNotifier for NoopNotifier {
    async fn post_tallied(&self, _event: &VoteInvalidation) -> Result<()> {
        Ok(())
    }
}

/// Drops the cached post body and announces the new counters on `forum:votes`.
pub struct RedisTallyNotifier {
    redis: Arc<RedisClient>,
}

impl RedisTallyNotifier {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl TallyNotifier for RedisTallyNotifier {
    async fn post_tallied(&self, event: &VoteInvalidation) -> Result<()> {
        self.redis
            .cache_delete(&forum_post_cache_key(&event.post_id))
            .await?;

        let message = serde_json::to_string(event)?;
        self.redis.publish(VOTE_CHANNEL, &message).await?;

        Ok(())
    }
}
