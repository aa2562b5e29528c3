//! Per-user notification inbox items.

use crate::error::{LoopHubError, Result};
use crate::forum::types::{NotificationId, TargetRef, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Someone replied to your thread or comment.
    Reply,
    /// Someone @-mentioned you.
    Mention,
    /// Someone reacted to your content.
    Reaction,
    /// A moderator acted on you or your content.
    Moderation,
    /// Your karma crossed into a new level.
    LevelUp,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationKind::Reply => "reply",
            NotificationKind::Mention => "mention",
            NotificationKind::Reaction => "reaction",
            NotificationKind::Moderation => "moderation",
            NotificationKind::LevelUp => "level_up",
        };
        f.write_str(s)
    }
}

impl FromStr for NotificationKind {
    type Err = LoopHubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reply" => Ok(NotificationKind::Reply),
            "mention" => Ok(NotificationKind::Mention),
            "reaction" => Ok(NotificationKind::Reaction),
            "moderation" => Ok(NotificationKind::Moderation),
            "level_up" | "levelup" => Ok(NotificationKind::LevelUp),
            other => Err(LoopHubError::validation(format!(
                "Unknown notification kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    /// Recipient.
    pub user_id: UserId,
    pub kind: NotificationKind,
    /// Who caused it; `None` for system notifications such as level-ups.
    pub actor_id: Option<UserId>,
    pub target: Option<TargetRef>,
    pub message: String,
    pub created_at: u64,
    pub read: bool,
}

impl Notification {
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        actor_id: Option<UserId>,
        target: Option<TargetRef>,
        message: impl Into<String>,
        now: u64,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            user_id,
            kind,
            actor_id,
            target,
            message: message.into(),
            created_at: now,
            read: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(NotificationKind::LevelUp.to_string(), "level_up");
        assert_eq!(
            "level_up".parse::<NotificationKind>().unwrap(),
            NotificationKind::LevelUp
        );
        let json = serde_json::to_string(&NotificationKind::LevelUp).unwrap();
        assert_eq!(json, "\"level_up\"");
    }

    #[test]
    fn test_new_is_unread() {
        let n = Notification::new(
            UserId::new(),
            NotificationKind::Reply,
            Some(UserId::new()),
            None,
            "ferris replied",
            42,
        );
        assert!(!n.read);
        assert_eq!(n.created_at, 42);
    }
}
