//! Comments and comment trees.

use crate::error::{LoopHubError, Result};
use crate::forum::constants::{DELETED_BODY, HIDDEN_BODY, MAX_COMMENT_BODY_SIZE};
use crate::forum::types::{CommentId, ThreadId, UserId, VoteDirection};
use crate::forum::user::UserSummary;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub thread_id: ThreadId,
    /// `None` for top-level comments.
    pub parent_id: Option<CommentId>,
    pub author_id: UserId,
    pub body: String,
    /// 0 for top-level comments.
    pub depth: u32,
    pub created_at: u64,
    pub edited_at: Option<u64>,
    pub upvotes: u64,
    pub downvotes: u64,
    pub hidden: bool,
    pub deleted: bool,
}

impl Comment {
    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }

    pub fn is_publicly_visible(&self) -> bool {
        !self.hidden && !self.deleted
    }

    /// Copy with the body replaced for readers who may not see it.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.deleted {
            copy.body = DELETED_BODY.to_string();
        } else if copy.hidden {
            copy.body = HIDDEN_BODY.to_string();
        }
        copy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    /// Highest score first.
    #[default]
    Best,
    New,
    Old,
}

impl fmt::Display for CommentSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentSort::Best => write!(f, "best"),
            CommentSort::New => write!(f, "new"),
            CommentSort::Old => write!(f, "old"),
        }
    }
}

impl FromStr for CommentSort {
    type Err = LoopHubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best" | "top" => Ok(CommentSort::Best),
            "new" | "newest" => Ok(CommentSort::New),
            "old" | "oldest" => Ok(CommentSort::Old),
            other => Err(LoopHubError::validation(format!(
                "Unknown comment sort '{}'",
                other
            ))),
        }
    }
}

/// Input for creating a comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub thread_id: ThreadId,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    pub body: String,
}

/// A comment with its author and replies, as returned by listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentNode {
    pub comment: Comment,
    pub author: UserSummary,
    pub score: i64,
    pub your_vote: VoteDirection,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn new(comment: Comment, author: UserSummary, your_vote: VoteDirection) -> Self {
        Self {
            score: comment.score(),
            comment,
            author,
            your_vote,
            replies: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including itself.
    pub fn subtree_size(&self) -> usize {
        1 + self
            .replies
            .iter()
            .map(CommentNode::subtree_size)
            .sum::<usize>()
    }
}

fn compare(a: &Comment, b: &Comment, sort: CommentSort) -> Ordering {
    let oldest_first = a
        .created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id));
    match sort {
        CommentSort::Best => b.score().cmp(&a.score()).then(oldest_first),
        CommentSort::New => oldest_first.reverse(),
        CommentSort::Old => oldest_first,
    }
}

/// Arranges flat nodes into a forest, sorting siblings at every level.
///
/// Nodes whose parent is missing from `nodes` are promoted to the top level.
pub fn build_tree(nodes: Vec<CommentNode>, sort: CommentSort) -> Vec<CommentNode> {
    let present: std::collections::HashSet<CommentId> =
        nodes.iter().map(|n| n.comment.id).collect();

    let mut children: HashMap<Option<CommentId>, Vec<CommentNode>> = HashMap::new();
    for node in nodes {
        let parent = node.comment.parent_id.filter(|p| present.contains(p));
        children.entry(parent).or_default().push(node);
    }

    fn attach(
        parent: Option<CommentId>,
        children: &mut HashMap<Option<CommentId>, Vec<CommentNode>>,
        sort: CommentSort,
    ) -> Vec<CommentNode> {
        let mut level = children.remove(&parent).unwrap_or_default();
        level.sort_by(|a, b| compare(&a.comment, &b.comment, sort));
        for node in &mut level {
            node.replies = attach(Some(node.comment.id), children, sort);
        }
        level
    }

    attach(None, &mut children, sort)
}

pub fn validate_comment_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(LoopHubError::validation("Comment cannot be empty"));
    }
    if body.len() > MAX_COMMENT_BODY_SIZE {
        return Err(LoopHubError::validation(format!(
            "Comment too large: {} bytes (max {})",
            body.len(),
            MAX_COMMENT_BODY_SIZE
        )));
    }
    Ok(())
}
