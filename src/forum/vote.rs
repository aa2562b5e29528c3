//! Up/down votes and their effect on scores and karma.

use crate::forum::types::{TargetRef, UserId, VoteDirection};
use serde::{Deserialize, Serialize};

/// A stored vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub user_id: UserId,
    pub target: TargetRef,
    pub direction: VoteDirection,
    pub updated_at: u64,
}

/// State of a target after a vote was cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub target: TargetRef,
    pub score: i64,
    pub upvotes: u64,
    pub downvotes: u64,
    pub your_vote: VoteDirection,
}

/// Up/down counters of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteTally {
    pub upvotes: u64,
    pub downvotes: u64,
}

impl VoteTally {
    pub fn new(upvotes: u64, downvotes: u64) -> Self {
        Self { upvotes, downvotes }
    }

    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }

    /// Replaces a voter's `old` direction with `new`.
    pub fn apply(&mut self, old: VoteDirection, new: VoteDirection) {
        match old {
            VoteDirection::Up => self.upvotes = self.upvotes.saturating_sub(1),
            VoteDirection::Down => self.downvotes = self.downvotes.saturating_sub(1),
            VoteDirection::None => {}
        }
        match new {
            VoteDirection::Up => self.upvotes += 1,
            VoteDirection::Down => self.downvotes += 1,
            VoteDirection::None => {}
        }
    }
}

/// Karma the target's author gains (or loses) when a vote changes.
pub fn karma_delta(old: VoteDirection, new: VoteDirection) -> i64 {
    new.value() - old.value()
}
