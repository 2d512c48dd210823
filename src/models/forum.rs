use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::{TallyOutcome, VoteDirection};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ForumPost {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub upvote_count: i32,
    pub downvote_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Post row joined with the viewer's vote
#[derive(Debug, Clone, FromRow)]
pub struct ForumPostWithVote {
    #[sqlx(flatten)]
    pub post: ForumPost,
    pub user_vote: Option<VoteDirection>,
}

// Create post request
#[derive(Debug, Validate, Deserialize)]
pub struct CreateForumPostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
}

// Post response with the viewer's vote
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPostResponse {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub upvote_count: i32,
    pub downvote_count: i32,
    pub user_vote: Option<VoteDirection>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ForumPostResponse {
    pub fn new(post: ForumPost, user_vote: Option<VoteDirection>) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            title: post.title,
            description: post.description,
            upvote_count: post.upvote_count,
            downvote_count: post.downvote_count,
            user_vote,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }

    /// Replaces the counters and viewer vote with a live reading.
    pub fn with_tally(self, live: &TallyOutcome) -> Self {
        Self {
            upvote_count: live.upvote_count,
            downvote_count: live.downvote_count,
            user_vote: live.vote,
            ..self
        }
    }
}

impl From<ForumPostWithVote> for ForumPostResponse {
    fn from(row: ForumPostWithVote) -> Self {
        Self::new(row.post, row.user_vote)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListForumQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn from_query(query: &ListForumQuery) -> Self {
        Self {
            page: query.page.unwrap_or(1).max(1),
            page_size: query
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPageResponse {
    pub posts: Vec<ForumPostResponse>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}
