//! Write actions a client can queue while it cannot reach the server.

use crate::forum::{CommentId, ReactionKind, TargetRef, ThreadId, VoteDirection};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{BASE_BACKOFF_MS, MAX_BACKOFF_MS};

/// A write the server has not seen yet.
///
/// Stored with bincode, so it stays externally tagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingAction {
    CreateComment {
        thread_id: ThreadId,
        parent_id: Option<CommentId>,
        body: String,
    },
    Vote {
        target: TargetRef,
        direction: VoteDirection,
    },
    React {
        target: TargetRef,
        kind: ReactionKind,
    },
}

impl PendingAction {
    /// Thread or comment the action touches, for votes and reactions.
    pub fn target(&self) -> Option<TargetRef> {
        match self {
            PendingAction::CreateComment { .. } => None,
            PendingAction::Vote { target, .. } | PendingAction::React { target, .. } => {
                Some(*target)
            }
        }
    }

    /// Short label for queue listings.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PendingAction::CreateComment { .. } => "comment",
            PendingAction::Vote { .. } => "vote",
            PendingAction::React { .. } => "react",
        }
    }
}

impl fmt::Display for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingAction::CreateComment {
                thread_id,
                parent_id,
                body,
            } => {
                let preview: String = body.chars().take(40).collect();
                match parent_id {
                    Some(parent) => write!(
                        f,
                        "reply to comment {} in thread {}: \"{}\"",
                        parent.short(),
                        thread_id.short(),
                        preview
                    ),
                    None => write!(f, "comment on thread {}: \"{}\"", thread_id.short(), preview),
                }
            }
            PendingAction::Vote { target, direction } => {
                write!(f, "vote {:?} on {}", direction, target)
            }
            PendingAction::React { target, kind } => {
                write!(f, "react {} on {}", kind.emoji(), target)
            }
        }
    }
}

/// A queued action with its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Position in the queue; delivery follows ascending order.
    pub seq: u64,
    pub action: PendingAction,
    pub enqueued_at: u64,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    /// Earliest time of the next attempt.
    pub next_attempt_at: u64,
    pub last_error: Option<String>,
}

impl QueuedAction {
    pub fn new(seq: u64, action: PendingAction, now: u64) -> Self {
        Self {
            seq,
            action,
            enqueued_at: now,
            attempts: 0,
            next_attempt_at: now,
            last_error: None,
        }
    }

    pub fn is_due(&self, now: u64) -> bool {
        self.next_attempt_at <= now
    }
}

/// Delay after the given number of failed attempts:
/// `min(2 s * 2^(attempts - 1), 5 min)`.
pub fn backoff_delay_ms(attempts: u32) -> u64 {
    if attempts == 0 {
        return 0;
    }
    let factor = 1u64.checked_shl(attempts - 1).unwrap_or(u64::MAX);
    BASE_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS)
}
