//! Parameters and results of the JSON-RPC methods.
//!
//! The server deserializes the `*Params` types from `params` and the client
//! serializes them; results are the forum's own types unless a method needs
//! a wrapper.

use crate::forum::karma::{Level, LevelPermissions, LevelProgress};
use crate::forum::{
    CommentId, CommentSort, CommunityId, CommunityUpdate, NotificationId, PollId, ReactionKind,
    ReportId, ReportStatus, TargetRef, ThreadEdit, ThreadId, ThreadSort, UserId, UserProfile,
    VoteDirection,
};
use serde::{Deserialize, Serialize};

/// Method names as they appear on the wire.
pub mod methods {
    pub const AUTH_REGISTER: &str = "auth.register";
    pub const AUTH_LOGIN: &str = "auth.login";
    pub const AUTH_LOGOUT: &str = "auth.logout";
    pub const AUTH_WHOAMI: &str = "auth.whoami";

    pub const USER_GET: &str = "user.get";
    pub const USER_UPDATE: &str = "user.update";
    pub const USER_LEVEL: &str = "user.level";

    pub const COMMUNITY_CREATE: &str = "community.create";
    pub const COMMUNITY_GET: &str = "community.get";
    pub const COMMUNITY_LIST: &str = "community.list";
    pub const COMMUNITY_JOIN: &str = "community.join";
    pub const COMMUNITY_LEAVE: &str = "community.leave";
    pub const COMMUNITY_MEMBERS: &str = "community.members";
    pub const COMMUNITY_UPDATE: &str = "community.update";
    pub const COMMUNITY_ADD_MEMBER: &str = "community.add_member";

    pub const THREAD_CREATE: &str = "thread.create";
    pub const THREAD_GET: &str = "thread.get";
    pub const THREAD_LIST: &str = "thread.list";
    pub const THREAD_EDIT: &str = "thread.edit";
    pub const THREAD_DELETE: &str = "thread.delete";

    pub const COMMENT_CREATE: &str = "comment.create";
    pub const COMMENT_LIST: &str = "comment.list";
    pub const COMMENT_EDIT: &str = "comment.edit";
    pub const COMMENT_DELETE: &str = "comment.delete";

    pub const VOTE_CAST: &str = "vote.cast";
    pub const REACTION_TOGGLE: &str = "reaction.toggle";
    pub const REACTION_LIST: &str = "reaction.list";

    pub const POLL_GET: &str = "poll.get";
    pub const POLL_VOTE: &str = "poll.vote";

    pub const NOTIFICATION_LIST: &str = "notification.list";
    pub const NOTIFICATION_READ: &str = "notification.read";
    pub const NOTIFICATION_READ_ALL: &str = "notification.read_all";
    pub const NOTIFICATION_UNREAD_COUNT: &str = "notification.unread_count";

    pub const MENTION_SUGGEST: &str = "mention.suggest";

    pub const MOD_ACTION: &str = "mod.action";
    pub const MOD_LOG: &str = "mod.log";

    pub const REPORT_CREATE: &str = "report.create";
    pub const REPORT_LIST: &str = "report.list";
    pub const REPORT_RESOLVE: &str = "report.resolve";

    pub const SYSTEM_HEALTH: &str = "system.health";
    pub const SYSTEM_STATS: &str = "system.stats";

    /// Whether `method` changes server state. Writes get a tighter rate
    /// limit than reads.
    pub fn is_write(method: &str) -> bool {
        matches!(
            method,
            AUTH_REGISTER
                | AUTH_LOGIN
                | AUTH_LOGOUT
                | USER_UPDATE
                | COMMUNITY_CREATE
                | COMMUNITY_JOIN
                | COMMUNITY_LEAVE
                | COMMUNITY_UPDATE
                | COMMUNITY_ADD_MEMBER
                | THREAD_CREATE
                | THREAD_EDIT
                | THREAD_DELETE
                | COMMENT_CREATE
                | COMMENT_EDIT
                | COMMENT_DELETE
                | VOTE_CAST
                | REACTION_TOGGLE
                | POLL_VOTE
                | NOTIFICATION_READ
                | NOTIFICATION_READ_ALL
                | MOD_ACTION
                | REPORT_CREATE
                | REPORT_RESOLVE
        )
    }
}

// =============================================================================
// Accounts
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterParams {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginParams {
    pub username: String,
    pub password: String,
}

/// Result of `auth.login`. The token is shown once; the server keeps only
/// its hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    pub token: String,
    pub expires_at: u64,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsernameParams {
    pub username: String,
}

/// `user.level` without a username reports on the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A level table row with owned strings, so clients can deserialize it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub number: u8,
    pub name: String,
    pub min_karma: i64,
    pub permissions: LevelPermissions,
}

impl From<Level> for LevelInfo {
    fn from(level: Level) -> Self {
        Self {
            number: level.number,
            name: level.name.to_string(),
            min_karma: level.min_karma,
            permissions: level.permissions,
        }
    }
}

/// Result of `user.level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelResult {
    pub username: String,
    pub karma: i64,
    pub level: LevelInfo,
    pub next: Option<LevelInfo>,
    pub karma_needed: i64,
    pub percent: u8,
}

impl LevelResult {
    pub fn new(username: impl Into<String>, progress: LevelProgress) -> Self {
        Self {
            username: username.into(),
            karma: progress.karma,
            level: progress.level.into(),
            next: progress.next.map(Into::into),
            karma_needed: progress.karma_needed,
            percent: progress.percent,
        }
    }
}

// =============================================================================
// Communities
// =============================================================================

/// Accepts a community ID or slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityRefParams {
    pub community: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityIdParams {
    pub community_id: CommunityId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityUpdateParams {
    pub community_id: CommunityId,
    #[serde(flatten)]
    pub update: CommunityUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberParams {
    pub community_id: CommunityId,
    pub user_id: UserId,
}

/// Cursor and page size shared by plain listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

// =============================================================================
// Threads and comments
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadIdParams {
    pub thread_id: ThreadId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadListParams {
    pub community_id: CommunityId,
    #[serde(default)]
    pub sort: ThreadSort,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadEditParams {
    pub thread_id: ThreadId,
    #[serde(flatten)]
    pub edit: ThreadEdit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentListParams {
    pub thread_id: ThreadId,
    #[serde(default)]
    pub sort: CommentSort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentIdParams {
    pub comment_id: CommentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentEditParams {
    pub comment_id: CommentId,
    pub body: String,
}

// =============================================================================
// Engagement
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteParams {
    pub target: TargetRef,
    pub direction: VoteDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionParams {
    pub target: TargetRef,
    pub kind: ReactionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetParams {
    pub target: TargetRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollIdParams {
    pub poll_id: PollId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollVoteParams {
    pub poll_id: PollId,
    pub choices: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionParams {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationListParams {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadParams {
    pub ids: Vec<NotificationId>,
}

/// Result of methods that only report a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResult {
    pub count: usize,
}

// =============================================================================
// Moderation
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModLogParams {
    pub community_id: CommunityId,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportParams {
    pub target: TargetRef,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportListParams {
    pub community_id: CommunityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveReportParams {
    pub report_id: ReportId,
    pub status: ReportStatus,
}

// =============================================================================
// System
// =============================================================================

/// Result of methods that succeed without returning data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResult {
    pub ok: bool,
}

impl OkResult {
    pub const YES: OkResult = OkResult { ok: true };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResult {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::karma::progress;
    use crate::forum::EntityId;
    use serde_json::json;

    #[test]
    fn test_write_methods() {
        assert!(methods::is_write(methods::VOTE_CAST));
        assert!(methods::is_write(methods::AUTH_LOGIN));
        assert!(!methods::is_write(methods::THREAD_LIST));
        assert!(!methods::is_write(methods::SYSTEM_HEALTH));
        assert!(!methods::is_write("no.such_method"));
    }

    #[test]
    fn test_thread_list_params_flatten_paging() {
        let id = EntityId::new();
        let params: ThreadListParams = serde_json::from_value(json!({
            "community_id": id,
            "sort": "hot",
            "cursor": "abc",
        }))
        .unwrap();
        assert_eq!(params.community_id, id);
        assert_eq!(params.sort, ThreadSort::Hot);
        assert_eq!(params.page.cursor.as_deref(), Some("abc"));
        assert_eq!(params.page.limit, None);
    }

    #[test]
    fn test_sort_defaults() {
        let params: CommentListParams =
            serde_json::from_value(json!({ "thread_id": EntityId::new() })).unwrap();
        assert_eq!(params.sort, CommentSort::Best);

        let params: NotificationListParams = serde_json::from_value(json!({})).unwrap();
        assert!(!params.unread_only);
    }

    #[test]
    fn test_target_wire_format() {
        let id = EntityId::new();
        let params = VoteParams {
            target: TargetRef::Comment(id),
            direction: VoteDirection::Down,
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["target"]["comment"], json!(id.to_string()));
        assert_eq!(value["direction"], json!("down"));
    }

    #[test]
    fn test_level_result_is_deserializable() {
        let result = LevelResult::new("alice", progress(60));
        let text = serde_json::to_string(&result).unwrap();
        let back: LevelResult = serde_json::from_str(&text).unwrap();
        assert_eq!(back.level.name, "Regular");
        assert_eq!(back.next.map(|l| l.number), Some(4));
        assert_eq!(back, result);
    }
}
