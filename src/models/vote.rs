use std::{fmt, ops::Sub};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "vote_direction", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn opposite(self) -> Self {
        match self {
            VoteDirection::Up => VoteDirection::Down,
            VoteDirection::Down => VoteDirection::Up,
        }
    }
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteDirection::Up => f.write_str("UP"),
            VoteDirection::Down => f.write_str("DOWN"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vote {
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub direction: VoteDirection,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Signed change to a post's counters produced by one tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteDelta {
    pub upvotes: i32,
    pub downvotes: i32,
}

impl VoteDelta {
    /// Contribution of a single vote state to the aggregate.
    pub fn of(state: Option<VoteDirection>) -> Self {
        match state {
            Some(VoteDirection::Up) => Self {
                upvotes: 1,
                downvotes: 0,
            },
            Some(VoteDirection::Down) => Self {
                upvotes: 0,
                downvotes: 1,
            },
            None => Self::default(),
        }
    }
}

impl Sub for VoteDelta {
    type Output = VoteDelta;

    fn sub(self, rhs: Self) -> Self::Output {
        VoteDelta {
            upvotes: self.upvotes - rhs.upvotes,
            downvotes: self.downvotes - rhs.downvotes,
        }
    }
}

/// Denormalized per-post counters stored on the forum post row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VoteCounts {
    pub upvote_count: i32,
    pub downvote_count: i32,
}

impl VoteCounts {
    pub fn new(upvote_count: i32, downvote_count: i32) -> Self {
        Self {
            upvote_count,
            downvote_count,
        }
    }

    /// Applies a delta, flooring both counters at zero.
    pub fn apply(self, delta: VoteDelta) -> Self {
        Self {
            upvote_count: (self.upvote_count + delta.upvotes).max(0),
            downvote_count: (self.downvote_count + delta.downvotes).max(0),
        }
    }
}

/// Authoritative result of one tally: the post's new counters and the
/// caller's resulting vote (`None` when the vote was retracted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyOutcome {
    pub upvote_count: i32,
    pub downvote_count: i32,
    pub vote: Option<VoteDirection>,
}

impl TallyOutcome {
    pub fn new(counts: VoteCounts, vote: Option<VoteDirection>) -> Self {
        Self {
            upvote_count: counts.upvote_count,
            downvote_count: counts.downvote_count,
            vote,
        }
    }

    pub fn counts(&self) -> VoteCounts {
        VoteCounts::new(self.upvote_count, self.downvote_count)
    }
}

// Vote request
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

// Vote response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub success: bool,
    pub upvote_count: i32,
    pub downvote_count: i32,
    pub vote: Option<VoteDirection>,
}

impl From<TallyOutcome> for VoteResponse {
    fn from(outcome: TallyOutcome) -> Self {
        Self {
            success: true,
            upvote_count: outcome.upvote_count,
            downvote_count: outcome.downvote_count,
            vote: outcome.vote,
        }
    }
}

/// Stored counters next to counters recomputed from the vote rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateAudit {
    pub post_id: Uuid,
    pub stored: VoteCounts,
    pub recomputed: VoteCounts,
    pub consistent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direction_uses_uppercase_wire_names() {
        assert_eq!(serde_json::to_value(VoteDirection::Up).unwrap(), json!("UP"));
        let parsed: VoteRequest = serde_json::from_value(json!({ "direction": "DOWN" })).unwrap();
        assert_eq!(parsed.direction, VoteDirection::Down);
        assert!(serde_json::from_value::<VoteRequest>(json!({ "direction": "SIDEWAYS" })).is_err());
    }

    #[test]
    fn retracted_vote_serializes_as_null() {
        let outcome = TallyOutcome::new(VoteCounts::new(5, 2), None);
        let body = serde_json::to_value(VoteResponse::from(outcome)).unwrap();
        assert_eq!(
            body,
            json!({ "success": true, "upvoteCount": 5, "downvoteCount": 2, "vote": null })
        );
    }

    #[test]
    fn counts_never_drop_below_zero() {
        let counts = VoteCounts::new(0, 1).apply(VoteDelta {
            upvotes: -1,
            downvotes: -2,
        });
        assert_eq!(counts, VoteCounts::new(0, 0));
    }
}
