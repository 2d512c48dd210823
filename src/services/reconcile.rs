//! Optimistic vote state held by a rendering client.
//!
//! A click applies the tally table locally and records a snapshot. While a
//! request is outstanding further clicks on the same post are dropped. A
//! successful response replaces the local counters with the authoritative
//! ones; a failed response restores the snapshot exactly.

use uuid::Uuid;

use crate::{
    models::{TallyOutcome, VoteCounts, VoteDirection},
    services::{tally, vote_engine::TallyError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingVote {
    pub post_id: Uuid,
    pub direction: VoteDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    counts: VoteCounts,
    vote: Option<VoteDirection>,
}

#[derive(Debug, Clone)]
pub struct VoteWidget {
    post_id: Uuid,
    counts: VoteCounts,
    vote: Option<VoteDirection>,
    in_flight: Option<Snapshot>,
    last_error: Option<String>,
}

impl VoteWidget {
    pub fn new(post_id: Uuid, counts: VoteCounts, vote: Option<VoteDirection>) -> Self {
        Self {
            post_id,
            counts,
            vote,
            in_flight: None,
            last_error: None,
        }
    }

    pub fn from_outcome(post_id: Uuid, outcome: &TallyOutcome) -> Self {
        Self::new(post_id, outcome.counts(), outcome.vote)
    }

    pub fn counts(&self) -> VoteCounts {
        self.counts
    }

    pub fn vote(&self) -> Option<VoteDirection> {
        self.vote
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the request to send, or `None` if one is already outstanding.
    pub fn click(&mut self, direction: VoteDirection) -> Option<PendingVote> {
        if self.in_flight.is_some() {
            return None;
        }

        self.in_flight = Some(Snapshot {
            counts: self.counts,
            vote: self.vote,
        });
        self.last_error = None;

        let transition = tally::plan(self.vote, direction);
        self.counts = transition.apply_to(self.counts);
        self.vote = transition.next;

        Some(PendingVote {
            post_id: self.post_id,
            direction,
        })
    }

    /// Settles the outstanding request. Returns `false` if nothing was in flight.
    pub fn resolve(&mut self, result: Result<TallyOutcome, TallyError>) -> bool {
        let Some(snapshot) = self.in_flight.take() else {
            return false;
        };

        match result {
            Ok(outcome) => {
                self.counts = outcome.counts();
                self.vote = outcome.vote;
            }
            Err(e) => {
                tracing::warn!(post_id = %self.post_id, "Vote failed, rolling back: {}", e);
                self.counts = snapshot.counts;
                self.vote = snapshot.vote;
                self.last_error = Some(e.to_string());
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> VoteWidget {
        VoteWidget::new(Uuid::new_v4(), VoteCounts::new(5, 2), None)
    }

    #[test]
    fn click_applies_optimistic_transition() {
        let mut widget = widget();

        let pending = widget.click(VoteDirection::Up).unwrap();

        assert_eq!(pending.direction, VoteDirection::Up);
        assert_eq!(widget.counts(), VoteCounts::new(6, 2));
        assert_eq!(widget.vote(), Some(VoteDirection::Up));
        assert!(widget.is_in_flight());
    }

    #[test]
    fn second_click_while_in_flight_is_dropped() {
        let mut widget = widget();
        widget.click(VoteDirection::Up).unwrap();

        assert!(widget.click(VoteDirection::Down).is_none());
        assert_eq!(widget.counts(), VoteCounts::new(6, 2));
        assert_eq!(widget.vote(), Some(VoteDirection::Up));
    }

    #[test]
    fn success_adopts_authoritative_counts() {
        let mut widget = widget();
        widget.click(VoteDirection::Up).unwrap();

        // Another voter landed in between
        let outcome = TallyOutcome::new(VoteCounts::new(7, 2), Some(VoteDirection::Up));
        assert!(widget.resolve(Ok(outcome)));

        assert_eq!(widget.counts(), VoteCounts::new(7, 2));
        assert!(!widget.is_in_flight());
        assert!(widget.click(VoteDirection::Down).is_some());
    }

    #[test]
    fn failure_restores_snapshot_exactly() {
        let mut widget = VoteWidget::new(
            Uuid::new_v4(),
            VoteCounts::new(5, 3),
            Some(VoteDirection::Down),
        );
        widget.click(VoteDirection::Up).unwrap();
        assert_eq!(widget.counts(), VoteCounts::new(6, 2));

        assert!(widget.resolve(Err(TallyError::TallyFailed("timeout".to_string()))));

        assert_eq!(widget.counts(), VoteCounts::new(5, 3));
        assert_eq!(widget.vote(), Some(VoteDirection::Down));
        assert!(widget.last_error().unwrap().contains("timeout"));
        assert!(!widget.is_in_flight());
    }

    #[test]
    fn stray_resolution_is_ignored() {
        let mut widget = widget();
        let outcome = TallyOutcome::new(VoteCounts::new(9, 9), None);

        assert!(!widget.resolve(Ok(outcome)));
        assert_eq!(widget.counts(), VoteCounts::new(5, 2));
    }
}
