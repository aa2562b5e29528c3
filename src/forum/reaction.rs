//! Emoji reactions on threads and comments.
//!
//! Each user can hold at most one reaction of each kind on a target; reacting
//! again with the same kind removes it.

use crate::forum::types::{ReactionKind, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reaction counts on one target, plus the viewer's own reactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSummary {
    /// Only kinds with a non-zero count appear.
    pub counts: BTreeMap<ReactionKind, u64>,
    pub yours: Vec<ReactionKind>,
}

impl ReactionSummary {
    /// Builds a summary from stored `(user, kind)` pairs.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (UserId, ReactionKind)>,
        viewer: Option<&UserId>,
    ) -> Self {
        let mut summary = Self::default();
        for (user, kind) in entries {
            *summary.counts.entry(kind).or_insert(0) += 1;
            if viewer == Some(&user) && !summary.yours.contains(&kind) {
                summary.yours.push(kind);
            }
        }
        summary.yours.sort();
        summary
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn count(&self, kind: ReactionKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// One-line rendering such as `👍 3  😂 1`.
    pub fn render(&self) -> String {
        self.counts
            .iter()
            .map(|(kind, count)| format!("{} {}", kind.emoji(), count))
            .collect::<Vec<_>>()
            .join("  ")
    }
}

/// Result of a toggle: whether the reaction is now present, and the new
/// summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionToggle {
    pub kind: ReactionKind,
    pub added: bool,
    pub summary: ReactionSummary,
}
