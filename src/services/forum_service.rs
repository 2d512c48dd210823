use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{CreateForumPostRequest, ForumPost, ForumPostResponse, ForumPostWithVote, Pagination},
    redis::{RedisClient, forum_post_cache_key},
    services::vote_engine::{TallyError, VoteEngine},
};

const POST_CACHE_TTL_SECONDS: usize = 60;

pub async fn create_post(
    db: &PgPool,
    author_id: Uuid,
    request: &CreateForumPostRequest,
) -> Result<ForumPost> {
    let now = Utc::now();

    let post = sqlx::query_as::<_, ForumPost>(
        r#"
        INSERT INTO forum_posts (
            id, author_id, title, description, upvote_count, downvote_count, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, 0, 0, $5, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(author_id)
    .bind(request.title.trim())
    .bind(request.description.as_deref().unwrap_or_default())
    .bind(now)
    .fetch_one(db)
    .await?;

    Ok(post)
}

pub async fn get_post_by_id_raw(db: &PgPool, post_id: Uuid) -> Result<Option<ForumPost>> {
    let post = sqlx::query_as::<_, ForumPost>("SELECT * FROM forum_posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(db)
        .await?;

    Ok(post)
}

/// The post body may come from Redis, but counters and the viewer's vote are
/// always read live through the engine. A cached body can outlive a tally, so
/// its counters are never shown.
pub async fn get_post(
    db: &PgPool,
    redis: Option<&RedisClient>,
    engine: &VoteEngine,
    post_id: Uuid,
    viewer_id: Option<Uuid>,
) -> Result<Option<ForumPostResponse>> {
    let Some(post) = get_cached_post(db, redis, post_id).await? else {
        return Ok(None);
    };

    let live = match engine.vote_state(viewer_id, post_id).await {
        Ok(live) => live,
        Err(TallyError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(ForumPostResponse::new(post, None).with_tally(&live)))
}

async fn get_cached_post(
    db: &PgPool,
    redis: Option<&RedisClient>,
    post_id: Uuid,
) -> Result<Option<ForumPost>> {
    let Some(redis) = redis else {
        return get_post_by_id_raw(db, post_id).await;
    };

    let key = forum_post_cache_key(&post_id);
    match redis.cache_get(&key).await {
        Ok(Some(cached)) => match serde_json::from_str::<ForumPost>(&cached) {
            Ok(post) => return Ok(Some(post)),
            Err(e) => tracing::warn!(%post_id, "Discarding unreadable cached post: {:?}", e),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!(%post_id, "Post cache read failed: {:?}", e),
    }

    let post = get_post_by_id_raw(db, post_id).await?;
    if let Some(post) = &post {
        let body = serde_json::to_string(post)?;
        if let Err(e) = redis.cache_set(&key, &body, POST_CACHE_TTL_SECONDS).await {
            tracing::warn!(%post_id, "Post cache write failed: {:?}", e);
        }
    }

    Ok(post)
}

pub async fn list_posts(
    db: &PgPool,
    pagination: Pagination,
    viewer_id: Option<Uuid>,
) -> Result<Vec<ForumPostResponse>> {
    let rows = sqlx::query_as::<_, ForumPostWithVote>(
        r#"
        SELECT
            p.id, p.author_id, p.title, p.description,
            p.upvote_count, p.downvote_count, p.created_at, p.updated_at,
            v.direction AS user_vote
        FROM forum_posts p
        LEFT JOIN forum_votes v ON v.post_id = p.id AND v.user_id = $1
        ORDER BY p.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(viewer_id)
    .bind(pagination.page_size as i64)
    .bind(pagination.offset())
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(ForumPostResponse::from).collect())
}

pub async fn count_posts(db: &PgPool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM forum_posts")
        .fetch_one(db)
        .await?;

    Ok(count)
}
