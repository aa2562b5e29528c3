//! Threads: the top-level posts of a community.

use crate::error::{LoopHubError, Result};
use crate::forum::constants::{
    DELETED_BODY, HIDDEN_BODY, MAX_TAGS_COUNT, MAX_TAG_LEN, MAX_THREAD_BODY_SIZE,
    MAX_THREAD_TITLE_LEN,
};
use crate::forum::poll::{NewPoll, PollResults};
use crate::forum::reaction::ReactionSummary;
use crate::forum::types::{CommunityId, PollId, ThreadId, UserId, VoteDirection};
use crate::forum::user::UserSummary;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub community_id: CommunityId,
    pub author_id: UserId,
    pub title: String,
    /// Markdown body.
    pub body: String,
    pub tags: Vec<String>,
    pub created_at: u64,
    pub edited_at: Option<u64>,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comment_count: u64,
    pub pinned: bool,
    pub locked: bool,
    pub hidden: bool,
    pub deleted: bool,
    pub poll_id: Option<PollId>,
}

impl Thread {
    /// Upvotes minus downvotes.
    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }

    /// Whether a non-moderator may see this thread at all.
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

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadSort {
    #[default]
    New,
    Hot,
    Top,
}

impl fmt::Display for ThreadSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadSort::New => write!(f, "new"),
            ThreadSort::Hot => write!(f, "hot"),
            ThreadSort::Top => write!(f, "top"),
        }
    }
}

impl FromStr for ThreadSort {
    type Err = LoopHubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" | "latest" => Ok(ThreadSort::New),
            "hot" => Ok(ThreadSort::Hot),
            "top" => Ok(ThreadSort::Top),
            other => Err(LoopHubError::validation(format!(
                "Unknown sort '{}', expected new, hot or top",
                other
            ))),
        }
    }
}

/// Input for creating a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewThread {
    pub community_id: CommunityId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub poll: Option<NewPoll>,
}

impl NewThread {
    pub fn new(community_id: CommunityId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            community_id,
            title: title.into(),
            body: body.into(),
            tags: Vec::new(),
            poll: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_poll(mut self, poll: NewPoll) -> Self {
        self.poll = Some(poll);
        self
    }
}

/// Author edits. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadEdit {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ThreadEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.tags.is_none()
    }
}

/// A thread with everything a reader needs to display it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadView {
    pub thread: Thread,
    pub author: UserSummary,
    pub community_slug: String,
    pub score: i64,
    pub your_vote: VoteDirection,
    pub reactions: ReactionSummary,
    pub poll: Option<PollResults>,
}

pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(LoopHubError::validation("Thread title cannot be empty"));
    }
    if title.chars().count() > MAX_THREAD_TITLE_LEN {
        return Err(LoopHubError::validation(format!(
            "Thread title too long (max {} characters)",
            MAX_THREAD_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

pub fn validate_thread_body(body: &str) -> Result<()> {
    if body.len() > MAX_THREAD_BODY_SIZE {
        return Err(LoopHubError::validation(format!(
            "Thread body too large: {} bytes (max {})",
            body.len(),
            MAX_THREAD_BODY_SIZE
        )));
    }
    Ok(())
}

/// Lowercases, trims and deduplicates tags, keeping the first occurrence order.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(LoopHubError::validation(format!(
                "Tag '{}' too long (max {} characters)",
                tag, MAX_TAG_LEN
            )));
        }
        if !tag.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return Err(LoopHubError::validation(format!(
                "Tag '{}' may only contain letters, digits, '-' and '_'",
                tag
            )));
        }
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    if out.len() > MAX_TAGS_COUNT {
        return Err(LoopHubError::validation(format!(
            "Too many tags: {} (max {})",
            out.len(),
            MAX_TAGS_COUNT
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Thread {
        Thread {
            id: ThreadId::new(),
            community_id: CommunityId::new(),
            author_id: UserId::new(),
            title: "Hello".to_string(),
            body: "World".to_string(),
            tags: vec![],
            created_at: 0,
            edited_at: None,
            upvotes: 5,
            downvotes: 7,
            comment_count: 0,
            pinned: false,
            locked: false,
            hidden: false,
            deleted: false,
            poll_id: None,
        }
    }

    #[test]
    fn test_score_can_go_negative() {
        assert_eq!(sample().score(), -2);
    }

    #[test]
    fn test_redaction() {
        let mut thread = sample();
        assert_eq!(thread.redacted().body, "World");
        thread.hidden = true;
        assert_eq!(thread.redacted().body, HIDDEN_BODY);
        thread.deleted = true;
        assert_eq!(thread.redacted().body, DELETED_BODY);
        assert!(!thread.is_publicly_visible());
    }

    #[test]
    fn test_title_rules() {
        assert_eq!(validate_title("  Hi  ").unwrap(), "Hi");
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"t".repeat(301)).is_err());
        assert!(validate_thread_body(&"b".repeat(40 * 1024 + 1)).is_err());
    }

    #[test]
    fn test_tag_normalization() {
        let tags: Vec<String> = vec!["#Rust".into(), "rust".into(), " async ".into(), "".into()];
        assert_eq!(normalize_tags(&tags).unwrap(), vec!["rust", "async"]);

        let too_many: Vec<String> = (0..6).map(|i| format!("t{}", i)).collect();
        assert!(normalize_tags(&too_many).is_err());
        assert!(normalize_tags(&["no spaces".to_string()]).is_err());
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!("HOT".parse::<ThreadSort>().unwrap(), ThreadSort::Hot);
        assert_eq!("latest".parse::<ThreadSort>().unwrap(), ThreadSort::New);
        assert!("best".parse::<ThreadSort>().is_err());
    }
}
