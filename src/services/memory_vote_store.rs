use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    models::{TallyOutcome, Vote, VoteCounts, VoteDirection},
    services::{
        tally::{self, VoteAction},
        vote_store::{StoreError, VoteStore},
    },
};

#[derive(Default)]
struct Tables {
    posts: HashMap<Uuid, VoteCounts>,
    votes: HashMap<(Uuid, Uuid), Vote>,
}

/// In-process vote store. The whole read-modify-write of a tally happens
/// under a single lock acquisition.
#[derive(Default)]
pub struct MemoryVoteStore {
    tables: Mutex<Tables>,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_post(&self, post_id: Uuid, counts: VoteCounts) {
        self.tables.lock().await.posts.insert(post_id, counts);
    }

    pub async fn vote_rows(&self, post_id: Uuid) -> Vec<Vote> {
        let tables = self.tables.lock().await;
        tables
            .votes
            .values()
            .filter(|vote| vote.post_id == post_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl VoteStore for MemoryVoteStore {
    async fn apply_transition(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        requested: VoteDirection,
    ) -> Result<TallyOutcome, StoreError> {
        let mut tables = self.tables.lock().await;

        let counts = *tables
            .posts
            .get(&post_id)
            .ok_or(StoreError::PostNotFound(post_id))?;

        let key = (user_id, post_id);
        let current = tables.votes.get(&key).map(|vote| vote.direction);
        let transition = tally::plan(current, requested);
        let now = Utc::now();

        match transition.action {
            VoteAction::Insert(direction) => {
                tables.votes.insert(
                    key,
                    Vote {
                        user_id,
                        post_id,
                        direction,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
            VoteAction::Switch(direction) => {
                if let Some(vote) = tables.votes.get_mut(&key) {
                    vote.direction = direction;
                    vote.updated_at = now;
                }
            }
            VoteAction::Retract => {
                tables.votes.remove(&key);
            }
        }

        let counts = transition.apply_to(counts);
        tables.posts.insert(post_id, counts);

        Ok(TallyOutcome::new(counts, transition.next))
    }

    async fn current_vote(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<Option<VoteDirection>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .votes
            .get(&(user_id, post_id))
            .map(|vote| vote.direction))
    }

    async fn counts(&self, post_id: Uuid) -> Result<Option<VoteCounts>, StoreError> {
        Ok(self.tables.lock().await.posts.get(&post_id).copied())
    }

    async fn recount(&self, post_id: Uuid) -> Result<Option<VoteCounts>, StoreError> {
        let tables = self.tables.lock().await;
        if !tables.posts.contains_key(&post_id) {
            return Ok(None);
        }

        let counts = tables
            .votes
            .values()
            .filter(|vote| vote.post_id == post_id)
            .fold(VoteCounts::default(), |acc, vote| match vote.direction {
                VoteDirection::Up => VoteCounts::new(acc.upvote_count + 1, acc.downvote_count),
                VoteDirection::Down => VoteCounts::new(acc.upvote_count, acc.downvote_count + 1),
            });

        Ok(Some(counts))
    }
}
