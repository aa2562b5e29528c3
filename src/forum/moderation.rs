//! Moderation actions, the community mod log and user reports.
//!
//! Every action a moderator takes is recorded as a [`ModLogEntry`]. The log is
//! append-only; reversing an action (unhide, unban, ...) is a new entry rather
//! than an edit of the old one.

use crate::error::{LoopHubError, Result};
use crate::forum::constants::MAX_REASON_SIZE;
use crate::forum::types::{CommentId, CommunityId, ReportId, TargetRef, ThreadId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a moderator can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModAction {
    AddModerator,
    RemoveModerator,
    HideThread,
    UnhideThread,
    HideComment,
    UnhideComment,
    LockThread,
    UnlockThread,
    PinThread,
    UnpinThread,
    BanUser,
    UnbanUser,
}

impl ModAction {
    pub const ALL: [ModAction; 12] = [
        ModAction::AddModerator,
        ModAction::RemoveModerator,
        ModAction::HideThread,
        ModAction::UnhideThread,
        ModAction::HideComment,
        ModAction::UnhideComment,
        ModAction::LockThread,
        ModAction::UnlockThread,
        ModAction::PinThread,
        ModAction::UnpinThread,
        ModAction::BanUser,
        ModAction::UnbanUser,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModAction::AddModerator => "add_moderator",
            ModAction::RemoveModerator => "remove_moderator",
            ModAction::HideThread => "hide_thread",
            ModAction::UnhideThread => "unhide_thread",
            ModAction::HideComment => "hide_comment",
            ModAction::UnhideComment => "unhide_comment",
            ModAction::LockThread => "lock_thread",
            ModAction::UnlockThread => "unlock_thread",
            ModAction::PinThread => "pin_thread",
            ModAction::UnpinThread => "unpin_thread",
            ModAction::BanUser => "ban_user",
            ModAction::UnbanUser => "unban_user",
        }
    }

    /// Actions that change the moderator set (owner only).
    pub fn is_role_action(self) -> bool {
        matches!(self, ModAction::AddModerator | ModAction::RemoveModerator)
    }

    /// Actions that need `target_user`.
    pub fn targets_user(self) -> bool {
        matches!(
            self,
            ModAction::AddModerator
                | ModAction::RemoveModerator
                | ModAction::BanUser
                | ModAction::UnbanUser
        )
    }

    /// Actions that need `target_thread`.
    pub fn targets_thread(self) -> bool {
        matches!(
            self,
            ModAction::HideThread
                | ModAction::UnhideThread
                | ModAction::LockThread
                | ModAction::UnlockThread
                | ModAction::PinThread
                | ModAction::UnpinThread
        )
    }

    /// Actions that need `target_comment`.
    pub fn targets_comment(self) -> bool {
        matches!(self, ModAction::HideComment | ModAction::UnhideComment)
    }
}

impl fmt::Display for ModAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModAction {
    type Err = LoopHubError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ModAction::ALL
            .into_iter()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| LoopHubError::validation(format!("Unknown moderation action '{}'", s)))
    }
}

/// A moderation request as submitted by a moderator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModRequest {
    pub community: CommunityId,
    pub action: ModAction,
    #[serde(default)]
    pub target_user: Option<UserId>,
    #[serde(default)]
    pub target_thread: Option<ThreadId>,
    #[serde(default)]
    pub target_comment: Option<CommentId>,
    #[serde(default)]
    pub reason: String,
    /// Ban duration; `None` bans permanently.
    #[serde(default)]
    pub duration_hours: Option<u64>,
}

impl ModRequest {
    pub fn new(community: CommunityId, action: ModAction) -> Self {
        Self {
            community,
            action,
            target_user: None,
            target_thread: None,
            target_comment: None,
            reason: String::new(),
            duration_hours: None,
        }
    }

    pub fn user(mut self, user: UserId) -> Self {
        self.target_user = Some(user);
        self
    }

    pub fn thread(mut self, thread: ThreadId) -> Self {
        self.target_thread = Some(thread);
        self
    }

    pub fn comment(mut self, comment: CommentId) -> Self {
        self.target_comment = Some(comment);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn duration_hours(mut self, hours: u64) -> Self {
        self.duration_hours = Some(hours);
        self
    }

    /// Checks that the request names exactly the target the action works on.
    pub fn validate(&self) -> Result<()> {
        validate_reason(&self.reason)?;
        let targets = [
            ("user", self.action.targets_user(), self.target_user.is_some()),
            ("thread", self.action.targets_thread(), self.target_thread.is_some()),
            ("comment", self.action.targets_comment(), self.target_comment.is_some()),
        ];
        for (kind, needed, given) in targets {
            if needed && !given {
                return Err(LoopHubError::validation(format!(
                    "{} requires a target {}",
                    self.action, kind
                )));
            }
            if given && !needed {
                return Err(LoopHubError::validation(format!(
                    "{} does not take a target {}",
                    self.action, kind
                )));
            }
        }
        if self.duration_hours.is_some() && self.action != ModAction::BanUser {
            return Err(LoopHubError::validation(format!(
                "{} does not take a duration",
                self.action
            )));
        }
        if self.duration_hours == Some(0) {
            return Err(LoopHubError::validation("Ban duration must be positive"));
        }
        Ok(())
    }
}

/// One row of a community's mod log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModLogEntry {
    pub id: crate::forum::types::EntityId,
    pub community_id: CommunityId,
    pub moderator_id: UserId,
    pub action: ModAction,
    pub target_user: Option<UserId>,
    pub target_thread: Option<ThreadId>,
    pub target_comment: Option<CommentId>,
    pub reason: String,
    pub created_at: u64,
    /// Set for temporary bans.
    pub expires_at: Option<u64>,
}

/// Lifecycle of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn is_open(self) -> bool {
        self == ReportStatus::Open
    }
}

impl FromStr for ReportStatus {
    type Err = LoopHubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(ReportStatus::Open),
            "resolved" => Ok(ReportStatus::Resolved),
            "dismissed" => Ok(ReportStatus::Dismissed),
            other => Err(LoopHubError::validation(format!(
                "Unknown report status '{}'",
                other
            ))),
        }
    }
}

/// A user's report of a thread or comment to the community moderators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub community_id: CommunityId,
    pub reporter_id: UserId,
    pub target: TargetRef,
    pub reason: String,
    pub status: ReportStatus,
    pub created_at: u64,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<u64>,
}

pub fn validate_reason(reason: &str) -> Result<()> {
    if reason.len() > MAX_REASON_SIZE {
        return Err(LoopHubError::validation(format!(
            "Reason too large: {} bytes (max {})",
            reason.len(),
            MAX_REASON_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_round_trip() {
        for action in ModAction::ALL {
            assert_eq!(action.as_str().parse::<ModAction>().unwrap(), action);
        }
        assert_eq!("pin-thread".parse::<ModAction>().unwrap(), ModAction::PinThread);
        assert!("delete_everything".parse::<ModAction>().is_err());
    }

    #[test]
    fn test_each_action_has_exactly_one_target_kind() {
        for action in ModAction::ALL {
            let kinds = [
                action.targets_user(),
                action.targets_thread(),
                action.targets_comment(),
            ];
            assert_eq!(kinds.iter().filter(|k| **k).count(), 1, "{}", action);
        }
    }

    #[test]
    fn test_request_requires_targets() {
        let community = CommunityId::new();
        assert!(ModRequest::new(community, ModAction::BanUser)
            .validate()
            .is_err());
        assert!(ModRequest::new(community, ModAction::BanUser)
            .user(UserId::new())
            .validate()
            .is_ok());
        assert!(ModRequest::new(community, ModAction::HideComment)
            .thread(ThreadId::new())
            .validate()
            .is_err());
        assert!(ModRequest::new(community, ModAction::LockThread)
            .thread(ThreadId::new())
            .comment(CommentId::new())
            .validate()
            .is_err());
        assert!(ModRequest::new(community, ModAction::UnbanUser)
            .user(UserId::new())
            .duration_hours(24)
            .validate()
            .is_err());
        assert!(ModRequest::new(community, ModAction::BanUser)
            .user(UserId::new())
            .duration_hours(0)
            .validate()
            .is_err());
        assert!(ModRequest::new(community, ModAction::LockThread)
            .thread(ThreadId::new())
            .reason("x".repeat(2000))
            .validate()
            .is_err());
    }

    #[test]
    fn test_report_status_parse() {
        assert_eq!("Resolved".parse::<ReportStatus>().unwrap(), ReportStatus::Resolved);
        assert!(ReportStatus::Open.is_open());
        assert!("closed".parse::<ReportStatus>().is_err());
    }
}
