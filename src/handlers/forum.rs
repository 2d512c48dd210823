use axum::{extract::State, http::StatusCode};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::{AppError, Result},
    extract::{Json, Path, Query},
    models::{
        AggregateAudit, CreateForumPostRequest, ForumPageResponse, ForumPostResponse,
        ListForumQuery, Pagination, VoteDirection, VoteRequest, VoteResponse,
    },
    services::forum_service,
};

pub async fn list_posts(
    State(state): State<AppState>,
    viewer: OptionalAuthUser,
    Query(query): Query<ListForumQuery>,
) -> Result<Json<ForumPageResponse>> {
    let pagination = Pagination::from_query(&query);

    let posts = forum_service::list_posts(&state.db, pagination, viewer.user_id()).await?;
    let total = forum_service::count_posts(&state.db).await?;

    Ok(Json(ForumPageResponse {
        posts,
        page: pagination.page,
        page_size: pagination.page_size,
        total,
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateForumPostRequest>,
) -> Result<(StatusCode, Json<ForumPostResponse>)> {
    payload.validate()?;

    let post = forum_service::create_post(&state.db, auth_user.user_id, &payload).await?;
    tracing::info!(post_id = %post.id, author = %auth_user.username, "Forum post created");

    Ok((
        StatusCode::CREATED,
        Json(ForumPostResponse::new(post, None)),
    ))
}

pub async fn get_post(
    State(state): State<AppState>,
    viewer: OptionalAuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<ForumPostResponse>> {
    let post = forum_service::get_post(
        &state.db,
        state.redis.as_deref(),
        &state.engine,
        post_id,
        viewer.user_id(),
    )
    .await?
    .ok_or_else(|| AppError::NotFound("Forum post not found".to_string()))?;

    Ok(Json(post))
}

pub async fn vote_post(
    State(state): State<AppState>,
    voter: OptionalAuthUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteResponse>> {
    tally(&state, voter.user_id(), post_id, payload.direction).await
}

pub async fn upvote_post(
    State(state): State<AppState>,
    voter: OptionalAuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<VoteResponse>> {
    tally(&state, voter.user_id(), post_id, VoteDirection::Up).await
}

pub async fn downvote_post(
    State(state): State<AppState>,
    voter: OptionalAuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<VoteResponse>> {
    tally(&state, voter.user_id(), post_id, VoteDirection::Down).await
}

async fn tally(
    state: &AppState,
    user_id: Option<Uuid>,
    post_id: Uuid,
    direction: VoteDirection,
) -> Result<Json<VoteResponse>> {
    // Rate limiting for voting
    if let (Some(redis), Some(user_id)) = (&state.redis, user_id) {
        let rate_limit_key = format!("vote_forum_post:{}", user_id);
        if !redis
            .check_rate_limit(&rate_limit_key, state.config.vote_rate_limit, 3600)
            .await?
        {
            return Err(AppError::RateLimit);
        }
    }

    let outcome = state.engine.apply_vote(user_id, post_id, direction).await?;

    Ok(Json(VoteResponse::from(outcome)))
}

pub async fn audit_post(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<AggregateAudit>> {
    let audit = state.engine.audit(post_id).await?;
    Ok(Json(audit))
}
