//! Per-(user, post) vote state machine.
//!
//! States are `None`, `Some(Up)` and `Some(Down)`. Requesting the direction
//! the user already holds retracts the vote; requesting any other direction
//! sets it. The counter delta is the contribution of the next state minus the
//! contribution of the current one, so both directions share one code path.

use crate::models::{VoteCounts, VoteDelta, VoteDirection};

/// What a store must do to the vote row for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Insert(VoteDirection),
    Switch(VoteDirection),
    Retract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: Option<VoteDirection>,
    pub action: VoteAction,
    pub delta: VoteDelta,
}

impl Transition {
    pub fn apply_to(&self, counts: VoteCounts) -> VoteCounts {
        counts.apply(self.delta)
    }
}

pub fn plan(current: Option<VoteDirection>, requested: VoteDirection) -> Transition {
    let next = if current == Some(requested) {
        None
    } else {
        Some(requested)
    };

    let action = match (current, next) {
        (None, Some(direction)) => VoteAction::Insert(direction),
        (Some(_), Some(direction)) => VoteAction::Switch(direction),
        (_, None) => VoteAction::Retract,
    };

    Transition {
        next,
        action,
        delta: VoteDelta::of(next) - VoteDelta::of(current),
    }
}
