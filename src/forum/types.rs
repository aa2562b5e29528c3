//! Identifiers and small shared types for the forum domain.

use crate::error::{LoopHubError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Random 128-bit identifier used for every stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generates a fresh random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses the hyphenated string form.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| LoopHubError::validation(format!("Invalid id: {}", s)))
    }

    /// Builds an ID from its 16 raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Reads an ID from the first 16 bytes of `slice`.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 16] = slice.get(..16)?.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }

    /// Raw bytes, used as storage key material.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = LoopHubError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

pub type UserId = EntityId;
pub type CommunityId = EntityId;
pub type ThreadId = EntityId;
pub type CommentId = EntityId;
pub type PollId = EntityId;
pub type NotificationId = EntityId;
pub type ReportId = EntityId;

/// Something that can be voted on, reacted to or reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRef {
    Thread(ThreadId),
    Comment(CommentId),
}

impl TargetRef {
    /// Returns the wrapped ID.
    pub fn id(&self) -> EntityId {
        match self {
            TargetRef::Thread(id) | TargetRef::Comment(id) => *id,
        }
    }

    /// Storage key: one tag byte followed by the ID.
    pub fn key_bytes(&self) -> [u8; 17] {
        let mut out = [0u8; 17];
        out[0] = match self {
            TargetRef::Thread(_) => b't',
            TargetRef::Comment(_) => b'c',
        };
        out[1..].copy_from_slice(self.id().as_bytes());
        out
    }

    /// Parses `thread` / `comment` plus an ID string.
    pub fn parse(kind: &str, id: &str) -> Result<Self> {
        let id = EntityId::parse(id)?;
        match kind.to_ascii_lowercase().as_str() {
            "thread" | "t" => Ok(TargetRef::Thread(id)),
            "comment" | "c" => Ok(TargetRef::Comment(id)),
            other => Err(LoopHubError::validation(format!(
                "Unknown target kind '{}', expected thread or comment",
                other
            ))),
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRef::Thread(id) => write!(f, "thread {}", id),
            TargetRef::Comment(id) => write!(f, "comment {}", id),
        }
    }
}

/// A user's vote on a thread or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
    #[default]
    None,
}

impl VoteDirection {
    /// +1, -1 or 0.
    pub fn value(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
            VoteDirection::None => 0,
        }
    }
}

impl FromStr for VoteDirection {
    type Err = LoopHubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "+" | "+1" => Ok(VoteDirection::Up),
            "down" | "-" | "-1" => Ok(VoteDirection::Down),
            "none" | "clear" | "0" => Ok(VoteDirection::None),
            other => Err(LoopHubError::validation(format!(
                "Unknown vote direction '{}'",
                other
            ))),
        }
    }
}

/// Reaction kinds offered on threads and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ReactionKind {
    Like = 1,
    Love = 2,
    Laugh = 3,
    Wow = 4,
    Sad = 5,
    Angry = 6,
}

impl ReactionKind {
    /// Every kind, in display order.
    pub const ALL: [ReactionKind; 6] = [
        ReactionKind::Like,
        ReactionKind::Love,
        ReactionKind::Laugh,
        ReactionKind::Wow,
        ReactionKind::Sad,
        ReactionKind::Angry,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            ReactionKind::Like => "👍",
            ReactionKind::Love => "❤️",
            ReactionKind::Laugh => "😂",
            ReactionKind::Wow => "😮",
            ReactionKind::Sad => "😢",
            ReactionKind::Angry => "😡",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Love => "love",
            ReactionKind::Laugh => "laugh",
            ReactionKind::Wow => "wow",
            ReactionKind::Sad => "sad",
            ReactionKind::Angry => "angry",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = LoopHubError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        ReactionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted || k.emoji() == s.trim())
            .ok_or_else(|| LoopHubError::validation(format!("Unknown reaction '{}'", s)))
    }
}

// =============================================================================
// Time
// =============================================================================

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn current_timestamp_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Source of "now" for everything time-dependent (sessions, bans, polls).
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        current_timestamp_millis()
    }
}

/// A clock that only moves when told to. Used by tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self(AtomicU64::new(start_millis))
    }

    pub fn set(&self, millis: u64) {
        self.0.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.0.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_round_trip_through_string_and_bytes() {
        let id = EntityId::new();
        assert_eq!(EntityId::parse(&id.to_string()).unwrap(), id);
        assert_eq!(EntityId::from_slice(id.as_bytes()).unwrap(), id);
        assert!(EntityId::parse("not-an-id").is_err());
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_target_keys_differ_by_kind() {
        let id = EntityId::new();
        let t = TargetRef::Thread(id).key_bytes();
        let c = TargetRef::Comment(id).key_bytes();
        assert_ne!(t, c);
        assert_eq!(&t[1..], id.as_bytes());
        assert_eq!(
            TargetRef::parse("comment", &id.to_string()).unwrap(),
            TargetRef::Comment(id)
        );
        assert!(TargetRef::parse("poll", &id.to_string()).is_err());
    }

    #[test]
    fn test_vote_direction_parsing() {
        assert_eq!("up".parse::<VoteDirection>().unwrap(), VoteDirection::Up);
        assert_eq!("-1".parse::<VoteDirection>().unwrap(), VoteDirection::Down);
        assert_eq!("clear".parse::<VoteDirection>().unwrap(), VoteDirection::None);
        assert_eq!(VoteDirection::Down.value(), -1);
        assert!("sideways".parse::<VoteDirection>().is_err());
    }

    #[test]
    fn test_reaction_parse_accepts_names_and_emoji() {
        assert_eq!("LOVE".parse::<ReactionKind>().unwrap(), ReactionKind::Love);
        assert_eq!("😂".parse::<ReactionKind>().unwrap(), ReactionKind::Laugh);
        assert!("meh".parse::<ReactionKind>().is_err());
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        clock.advance(500);
        assert_eq!(clock.now_millis(), 1_500);
        clock.set(10);
        assert_eq!(clock.now_millis(), 10);
    }
}
