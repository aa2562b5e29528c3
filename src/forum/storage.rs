//! Forum data persistence using RocksDB.
//!
//! ## Storage Layout
//!
//! Entity column families are keyed by the 16-byte entity ID unless noted:
//! - `users`: user_id -> UserAccount
//! - `usernames`: normalized username -> user_id
//! - `sessions`: sha3(token) -> Session
//! - `communities`: community_id -> Community
//! - `slugs`: slug -> community_id
//! - `memberships`: community_id + user_id -> Membership
//! - `bans`: community_id + user_id -> Ban
//! - `threads`, `comments`, `polls`, `reports`: id -> entity
//! - `votes`: target + user_id -> Vote
//! - `reactions`: target + user_id + kind -> ()
//! - `poll_votes`: poll_id + user_id -> Vec<u32>
//! - `notifications`: user_id + inverted_timestamp + id -> Notification
//! - `mod_log`: community_id + inverted_timestamp + id -> ModLogEntry
//! - `meta`: open-report markers
//!
//! Index column families hold empty values and exist for ordered scans:
//! - `idx_communities`: inverted_timestamp + community_id
//! - `idx_threads`: community_id + inverted_timestamp + thread_id
//! - `idx_comments`: thread_id + timestamp + comment_id (oldest first)
//! - `idx_reports`: community_id + inverted_timestamp + report_id

use crate::auth::Session;
use crate::error::{LoopHubError, Result};
use crate::forum::comment::Comment;
use crate::forum::community::{Ban, Community, Membership};
use crate::forum::moderation::{ModLogEntry, Report};
use crate::forum::notification::Notification;
use crate::forum::poll::Poll;
use crate::forum::thread::Thread;
use crate::forum::types::{
    CommentId, CommunityId, EntityId, PollId, ReactionKind, ReportId, TargetRef, ThreadId, UserId,
};
use crate::forum::user::UserAccount;
use crate::forum::vote::Vote;
use crate::storage::{invert_timestamp, revert_timestamp, BatchOp, RocksDbConfig, RocksDbHandle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Database subdirectory.
const DB_DIR: &str = "forum_db";

/// Column family names.
const CF_USERS: &str = "users";
const CF_USERNAMES: &str = "usernames";
const CF_SESSIONS: &str = "sessions";
const CF_COMMUNITIES: &str = "communities";
const CF_SLUGS: &str = "slugs";
const CF_MEMBERSHIPS: &str = "memberships";
const CF_BANS: &str = "bans";
const CF_THREADS: &str = "threads";
const CF_COMMENTS: &str = "comments";
const CF_VOTES: &str = "votes";
const CF_REACTIONS: &str = "reactions";
const CF_POLLS: &str = "polls";
const CF_POLL_VOTES: &str = "poll_votes";
const CF_NOTIFICATIONS: &str = "notifications";
const CF_MOD_LOG: &str = "mod_log";
const CF_REPORTS: &str = "reports";
const CF_META: &str = "meta";

/// Index column families (sorted by key for efficient range queries).
const CF_IDX_COMMUNITIES: &str = "idx_communities";
const CF_IDX_THREADS: &str = "idx_threads";
const CF_IDX_COMMENTS: &str = "idx_comments";
const CF_IDX_REPORTS: &str = "idx_reports";

const ALL_CFS: [&str; 21] = [
    CF_USERS,
    CF_USERNAMES,
    CF_SESSIONS,
    CF_COMMUNITIES,
    CF_SLUGS,
    CF_MEMBERSHIPS,
    CF_BANS,
    CF_THREADS,
    CF_COMMENTS,
    CF_VOTES,
    CF_REACTIONS,
    CF_POLLS,
    CF_POLL_VOTES,
    CF_NOTIFICATIONS,
    CF_MOD_LOG,
    CF_REPORTS,
    CF_META,
    CF_IDX_COMMUNITIES,
    CF_IDX_THREADS,
    CF_IDX_COMMENTS,
    CF_IDX_REPORTS,
];

/// Meta key prefix for "reporter already has an open report on target".
const META_OPEN_REPORT: &[u8] = b"open_report:";

// =============================================================================
// Pagination
// =============================================================================

/// Position in a listing, handed to clients as an opaque string.
///
/// Time-ordered listings resume after the last item seen; computed orders
/// (hot, top) resume at an offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cursor {
    After { timestamp: u64, id: EntityId },
    Offset(usize),
}

impl Cursor {
    /// Encodes the cursor as a base64 string for URL-safe transport.
    pub fn encode(&self) -> String {
        let bytes = bincode::serialize(self).unwrap_or_default();
        base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, &bytes)
    }

    /// Decodes a cursor produced by [`Cursor::encode`].
    pub fn decode(s: &str) -> Result<Self> {
        base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, s.trim())
            .ok()
            .and_then(|bytes| bincode::deserialize(&bytes).ok())
            .ok_or_else(|| LoopHubError::validation("Invalid cursor"))
    }

    /// Decodes an optional cursor string.
    pub fn decode_opt(s: Option<&str>) -> Result<Option<Self>> {
        s.filter(|s| !s.is_empty()).map(Self::decode).transpose()
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Encoded cursor for the next page, if there is one.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }

    /// Slices an already-ordered list for offset pagination.
    pub fn from_offset(all: Vec<T>, offset: usize, limit: usize) -> Self {
        let total = all.len();
        let items: Vec<T> = all.into_iter().skip(offset).take(limit).collect();
        let end = offset + items.len();
        Self {
            items,
            next_cursor: (end < total).then(|| Cursor::Offset(end).encode()),
        }
    }
}

/// Row counts for `system.stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumStats {
    pub users: usize,
    pub communities: usize,
    pub threads: usize,
    pub comments: usize,
    pub sessions: usize,
}

// =============================================================================
// Keys
// =============================================================================

fn pair_key(a: &EntityId, b: &EntityId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(a.as_bytes());
    key.extend_from_slice(b.as_bytes());
    key
}

fn newest_first_key(prefix: &[u8], timestamp: u64, id: &EntityId) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 24);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&invert_timestamp(timestamp));
    key.extend_from_slice(id.as_bytes());
    key
}

fn vote_key(target: &TargetRef, user: &UserId) -> Vec<u8> {
    let mut key = target.key_bytes().to_vec();
    key.extend_from_slice(user.as_bytes());
    key
}

fn reaction_key(target: &TargetRef, user: &UserId, kind: ReactionKind) -> Vec<u8> {
    let mut key = vote_key(target, user);
    key.push(kind as u8);
    key
}

fn reaction_kind_from_byte(b: u8) -> Option<ReactionKind> {
    ReactionKind::ALL.into_iter().find(|k| *k as u8 == b)
}

fn open_report_key(reporter: &UserId, target: &TargetRef) -> Vec<u8> {
    let mut key = META_OPEN_REPORT.to_vec();
    key.extend_from_slice(reporter.as_bytes());
    key.extend_from_slice(&target.key_bytes());
    key
}

fn comment_index_key(comment: &Comment) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(comment.thread_id.as_bytes());
    key.extend_from_slice(&comment.created_at.to_be_bytes());
    key.extend_from_slice(comment.id.as_bytes());
    key
}

// =============================================================================
// Storage
// =============================================================================

/// RocksDB-backed forum storage.
#[derive(Debug, Clone)]
pub struct ForumStorage {
    db: RocksDbHandle,
}

impl ForumStorage {
    /// Opens storage under `data_dir` with client tuning.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(data_dir, &RocksDbConfig::default())
    }

    /// Opens storage under `data_dir` with explicit tuning.
    pub fn with_config(data_dir: impl AsRef<Path>, config: &RocksDbConfig) -> Result<Self> {
        let db_path = data_dir.as_ref().join(DB_DIR);
        let db = RocksDbHandle::open(&db_path, config, &ALL_CFS)?;
        info!("Opened forum RocksDB at {:?}", db_path);
        Ok(Self { db })
    }

    /// Applies several writes atomically.
    pub fn commit(&self, ops: Vec<BatchOp>) -> Result<()> {
        self.db.write_batch(ops)
    }

    // -------------------------------------------------------------------------
    // Batch builders
    // -------------------------------------------------------------------------

    pub fn user_op(account: &UserAccount) -> Result<BatchOp> {
        BatchOp::put(CF_USERS, account.profile.id.as_bytes().to_vec(), account)
    }

    pub fn community_op(community: &Community) -> Result<BatchOp> {
        BatchOp::put(CF_COMMUNITIES, community.id.as_bytes().to_vec(), community)
    }

    pub fn membership_op(membership: &Membership) -> Result<BatchOp> {
        BatchOp::put(
            CF_MEMBERSHIPS,
            pair_key(&membership.community_id, &membership.user_id),
            membership,
        )
    }

    pub fn membership_delete_op(community: &CommunityId, user: &UserId) -> BatchOp {
        BatchOp::delete(CF_MEMBERSHIPS, pair_key(community, user))
    }

    pub fn ban_op(ban: &Ban) -> Result<BatchOp> {
        BatchOp::put(CF_BANS, pair_key(&ban.community_id, &ban.user_id), ban)
    }

    pub fn ban_delete_op(community: &CommunityId, user: &UserId) -> BatchOp {
        BatchOp::delete(CF_BANS, pair_key(community, user))
    }

    pub fn thread_op(thread: &Thread) -> Result<BatchOp> {
        BatchOp::put(CF_THREADS, thread.id.as_bytes().to_vec(), thread)
    }

    pub fn comment_op(comment: &Comment) -> Result<BatchOp> {
        BatchOp::put(CF_COMMENTS, comment.id.as_bytes().to_vec(), comment)
    }

    pub fn vote_op(vote: &Vote) -> Result<BatchOp> {
        BatchOp::put(CF_VOTES, vote_key(&vote.target, &vote.user_id), vote)
    }

    pub fn vote_delete_op(target: &TargetRef, user: &UserId) -> BatchOp {
        BatchOp::delete(CF_VOTES, vote_key(target, user))
    }

    pub fn reaction_op(target: &TargetRef, user: &UserId, kind: ReactionKind) -> BatchOp {
        BatchOp::marker(CF_REACTIONS, reaction_key(target, user, kind))
    }

    pub fn reaction_delete_op(target: &TargetRef, user: &UserId, kind: ReactionKind) -> BatchOp {
        BatchOp::delete(CF_REACTIONS, reaction_key(target, user, kind))
    }

    pub fn notification_op(notification: &Notification) -> Result<BatchOp> {
        BatchOp::put(
            CF_NOTIFICATIONS,
            newest_first_key(
                notification.user_id.as_bytes(),
                notification.created_at,
                &notification.id,
            ),
            notification,
        )
    }

    pub fn mod_log_op(entry: &ModLogEntry) -> Result<BatchOp> {
        BatchOp::put(
            CF_MOD_LOG,
            newest_first_key(entry.community_id.as_bytes(), entry.created_at, &entry.id),
            entry,
        )
    }

    pub fn report_op(report: &Report) -> Result<BatchOp> {
        BatchOp::put(CF_REPORTS, report.id.as_bytes().to_vec(), report)
    }

    // -------------------------------------------------------------------------
    // Users and sessions
    // -------------------------------------------------------------------------

    /// Stores a new account and claims its username.
    pub fn create_user(&self, account: &UserAccount, normalized_username: &str) -> Result<()> {
        self.commit(vec![
            Self::user_op(account)?,
            BatchOp::Put {
                cf: CF_USERNAMES,
                key: normalized_username.as_bytes().to_vec(),
                value: account.profile.id.as_bytes().to_vec(),
            },
        ])
    }

    pub fn put_user(&self, account: &UserAccount) -> Result<()> {
        self.db.put(CF_USERS, account.profile.id.as_bytes(), account)
    }

    pub fn get_user(&self, id: &UserId) -> Result<Option<UserAccount>> {
        self.db.get(CF_USERS, id.as_bytes())
    }

    pub fn user_id_by_username(&self, normalized_username: &str) -> Result<Option<UserId>> {
        Ok(self
            .db
            .get_raw(CF_USERNAMES, normalized_username.as_bytes())?
            .and_then(|bytes| EntityId::from_slice(&bytes)))
    }

    /// Every normalized username starting with `prefix`, with its user ID,
    /// in name order. Reads only the username index.
    pub fn usernames_with_prefix(&self, prefix: &str) -> Result<Vec<(String, UserId)>> {
        let mut names = Vec::new();
        self.db
            .prefix_iterate(CF_USERNAMES, prefix.as_bytes(), |key, value| {
                if let (Ok(name), Some(id)) = (std::str::from_utf8(key), EntityId::from_slice(value)) {
                    names.push((name.to_string(), id));
                }
                true
            })?;
        Ok(names)
    }

    /// True once any account exists.
    pub fn has_users(&self) -> Result<bool> {
        let mut any = false;
        self.db.iterate_all(CF_USERS, |_, _| {
            any = true;
            false
        })?;
        Ok(any)
    }

    pub fn put_session(&self, session: &Session) -> Result<()> {
        self.db.put(CF_SESSIONS, &session.token_hash, session)
    }

    pub fn get_session(&self, token_hash: &[u8; 32]) -> Result<Option<Session>> {
        self.db.get(CF_SESSIONS, token_hash)
    }

    pub fn delete_session(&self, token_hash: &[u8; 32]) -> Result<()> {
        self.db.delete(CF_SESSIONS, token_hash)
    }

    // -------------------------------------------------------------------------
    // Communities
    // -------------------------------------------------------------------------

    /// Stores a new community, its slug, its listing index entry and the
    /// owner's membership in one batch.
    pub fn create_community(&self, community: &Community, owner: &Membership) -> Result<()> {
        self.commit(vec![
            Self::community_op(community)?,
            BatchOp::Put {
                cf: CF_SLUGS,
                key: community.slug.as_bytes().to_vec(),
                value: community.id.as_bytes().to_vec(),
            },
            BatchOp::marker(
                CF_IDX_COMMUNITIES,
                newest_first_key(&[], community.created_at, &community.id),
            ),
            Self::membership_op(owner)?,
        ])
    }

    pub fn put_community(&self, community: &Community) -> Result<()> {
        self.db.put(CF_COMMUNITIES, community.id.as_bytes(), community)
    }

    pub fn get_community(&self, id: &CommunityId) -> Result<Option<Community>> {
        self.db.get(CF_COMMUNITIES, id.as_bytes())
    }

    pub fn community_id_by_slug(&self, slug: &str) -> Result<Option<CommunityId>> {
        Ok(self
            .db
            .get_raw(CF_SLUGS, slug.as_bytes())?
            .and_then(|bytes| EntityId::from_slice(&bytes)))
    }

    /// Communities newest first. `keep` filters (for example private ones the
    /// viewer cannot see) without breaking pagination.
    pub fn list_communities(
        &self,
        cursor: Option<&Cursor>,
        limit: usize,
        mut keep: impl FnMut(&Community) -> Result<bool>,
    ) -> Result<Page<Community>> {
        self.scan_newest_first(CF_IDX_COMMUNITIES, &[], cursor, limit, |id, _| {
            match self.get_community(&id)? {
                Some(community) if keep(&community)? => Ok(Some(community)),
                _ => Ok(None),
            }
        })
    }

    pub fn get_membership(&self, community: &CommunityId, user: &UserId) -> Result<Option<Membership>> {
        self.db.get(CF_MEMBERSHIPS, &pair_key(community, user))
    }

    pub fn memberships(&self, community: &CommunityId) -> Result<Vec<Membership>> {
        self.db.prefix_collect(CF_MEMBERSHIPS, community.as_bytes())
    }

    pub fn get_ban(&self, community: &CommunityId, user: &UserId) -> Result<Option<Ban>> {
        self.db.get(CF_BANS, &pair_key(community, user))
    }

    // -------------------------------------------------------------------------
    // Threads and polls
    // -------------------------------------------------------------------------

    /// Stores a new thread with its index entry, optional poll and the
    /// community's updated counters.
    pub fn create_thread(&self, thread: &Thread, poll: Option<&Poll>, community: &Community) -> Result<()> {
        self.commit(Self::create_thread_ops(thread, poll, community)?)
    }

    /// The writes behind [`Self::create_thread`], for callers that add their
    /// own records to the same batch.
    pub fn create_thread_ops(
        thread: &Thread,
        poll: Option<&Poll>,
        community: &Community,
    ) -> Result<Vec<BatchOp>> {
        let mut ops = vec![
            Self::thread_op(thread)?,
            BatchOp::marker(
                CF_IDX_THREADS,
                newest_first_key(thread.community_id.as_bytes(), thread.created_at, &thread.id),
            ),
            Self::community_op(community)?,
        ];
        if let Some(poll) = poll {
            ops.push(BatchOp::put(CF_POLLS, poll.id.as_bytes().to_vec(), poll)?);
        }
        Ok(ops)
    }

    pub fn put_thread(&self, thread: &Thread) -> Result<()> {
        self.db.put(CF_THREADS, thread.id.as_bytes(), thread)
    }

    pub fn get_thread(&self, id: &ThreadId) -> Result<Option<Thread>> {
        self.db.get(CF_THREADS, id.as_bytes())
    }

    /// Threads of a community newest first, filtered by `keep`.
    pub fn list_threads(
        &self,
        community: &CommunityId,
        cursor: Option<&Cursor>,
        limit: usize,
        mut keep: impl FnMut(&Thread) -> bool,
    ) -> Result<Page<Thread>> {
        self.scan_newest_first(CF_IDX_THREADS, community.as_bytes(), cursor, limit, |id, _| {
            Ok(self.get_thread(&id)?.filter(|t| keep(t)))
        })
    }

    /// Every thread of a community, for computed sort orders.
    pub fn community_threads(&self, community: &CommunityId) -> Result<Vec<Thread>> {
        let mut ids = Vec::new();
        let prefix = community.as_bytes();
        self.db.prefix_iterate(CF_IDX_THREADS, prefix, |key, _| {
            if let Some(id) = key.get(prefix.len() + 8..).and_then(EntityId::from_slice) {
                ids.push(id);
            }
            true
        })?;
        let mut threads = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(thread) = self.get_thread(&id)? {
                threads.push(thread);
            }
        }
        Ok(threads)
    }

    pub fn get_poll(&self, id: &PollId) -> Result<Option<Poll>> {
        self.db.get(CF_POLLS, id.as_bytes())
    }

    pub fn put_ballot(&self, poll: &PollId, user: &UserId, choices: &[u32]) -> Result<()> {
        self.db.put(CF_POLL_VOTES, &pair_key(poll, user), &choices)
    }

    pub fn get_ballot(&self, poll: &PollId, user: &UserId) -> Result<Option<Vec<u32>>> {
        self.db.get(CF_POLL_VOTES, &pair_key(poll, user))
    }

    pub fn ballots(&self, poll: &PollId) -> Result<Vec<Vec<u32>>> {
        self.db.prefix_collect(CF_POLL_VOTES, poll.as_bytes())
    }

    // -------------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------------

    /// Stores a new comment, its index entry and the thread's updated
    /// counters.
    pub fn create_comment(&self, comment: &Comment, thread: &Thread) -> Result<()> {
        self.commit(Self::create_comment_ops(comment, thread)?)
    }

    /// Comment record, its index entry and the parent thread's counters.
    pub fn create_comment_ops(comment: &Comment, thread: &Thread) -> Result<Vec<BatchOp>> {
        Ok(vec![
            Self::comment_op(comment)?,
            BatchOp::marker(CF_IDX_COMMENTS, comment_index_key(comment)),
            Self::thread_op(thread)?,
        ])
    }

    pub fn put_comment(&self, comment: &Comment) -> Result<()> {
        self.db.put(CF_COMMENTS, comment.id.as_bytes(), comment)
    }

    pub fn get_comment(&self, id: &CommentId) -> Result<Option<Comment>> {
        self.db.get(CF_COMMENTS, id.as_bytes())
    }

    /// All comments of a thread, oldest first.
    pub fn thread_comments(&self, thread: &ThreadId) -> Result<Vec<Comment>> {
        let mut ids = Vec::new();
        let prefix = thread.as_bytes();
        self.db.prefix_iterate(CF_IDX_COMMENTS, prefix, |key, _| {
            if let Some(id) = key.get(prefix.len() + 8..).and_then(EntityId::from_slice) {
                ids.push(id);
            }
            true
        })?;
        let mut comments = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(comment) = self.get_comment(&id)? {
                comments.push(comment);
            }
        }
        Ok(comments)
    }

    // -------------------------------------------------------------------------
    // Votes and reactions
    // -------------------------------------------------------------------------

    pub fn get_vote(&self, target: &TargetRef, user: &UserId) -> Result<Option<Vote>> {
        self.db.get(CF_VOTES, &vote_key(target, user))
    }

    pub fn has_reaction(&self, target: &TargetRef, user: &UserId, kind: ReactionKind) -> Result<bool> {
        self.db.exists(CF_REACTIONS, &reaction_key(target, user, kind))
    }

    /// Every `(user, kind)` reaction on a target.
    pub fn reactions(&self, target: &TargetRef) -> Result<Vec<(UserId, ReactionKind)>> {
        let prefix = target.key_bytes();
        let mut out = Vec::new();
        self.db.prefix_iterate(CF_REACTIONS, &prefix, |key, _| {
            let user = key.get(17..33).and_then(EntityId::from_slice);
            let kind = key.get(33).copied().and_then(reaction_kind_from_byte);
            if let (Some(user), Some(kind)) = (user, kind) {
                out.push((user, kind));
            }
            true
        })?;
        Ok(out)
    }

    // -------------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------------

    pub fn put_notification(&self, notification: &Notification) -> Result<()> {
        self.commit(vec![Self::notification_op(notification)?])
    }

    pub fn list_notifications(
        &self,
        user: &UserId,
        unread_only: bool,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<Page<Notification>> {
        self.scan_newest_first(CF_NOTIFICATIONS, user.as_bytes(), cursor, limit, |_, value| {
            let notification: Notification = bincode::deserialize(value)
                .map_err(|e| LoopHubError::serialization(format!("Bad notification: {}", e)))?;
            Ok((!unread_only || !notification.read).then_some(notification))
        })
    }

    /// Every notification of a user, newest first.
    pub fn user_notifications(&self, user: &UserId) -> Result<Vec<Notification>> {
        self.db.prefix_collect(CF_NOTIFICATIONS, user.as_bytes())
    }

    // -------------------------------------------------------------------------
    // Moderation
    // -------------------------------------------------------------------------

    pub fn mod_log(
        &self,
        community: &CommunityId,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<Page<ModLogEntry>> {
        self.scan_newest_first(CF_MOD_LOG, community.as_bytes(), cursor, limit, |_, value| {
            bincode::deserialize(value)
                .map(Some)
                .map_err(|e| LoopHubError::serialization(format!("Bad mod log entry: {}", e)))
        })
    }

    /// Stores a new report with its index entry and open marker.
    pub fn create_report(&self, report: &Report) -> Result<()> {
        self.commit(vec![
            Self::report_op(report)?,
            BatchOp::marker(
                CF_IDX_REPORTS,
                newest_first_key(report.community_id.as_bytes(), report.created_at, &report.id),
            ),
            BatchOp::Put {
                cf: CF_META,
                key: open_report_key(&report.reporter_id, &report.target),
                value: report.id.as_bytes().to_vec(),
            },
        ])
    }

    /// Stores a report whose status changed, clearing its open marker.
    pub fn close_report(&self, report: &Report) -> Result<()> {
        self.commit(vec![
            Self::report_op(report)?,
            BatchOp::delete(CF_META, open_report_key(&report.reporter_id, &report.target)),
        ])
    }

    pub fn get_report(&self, id: &ReportId) -> Result<Option<Report>> {
        self.db.get(CF_REPORTS, id.as_bytes())
    }

    pub fn open_report_for(&self, reporter: &UserId, target: &TargetRef) -> Result<Option<ReportId>> {
        Ok(self
            .db
            .get_raw(CF_META, &open_report_key(reporter, target))?
            .and_then(|bytes| EntityId::from_slice(&bytes)))
    }

    /// Reports of a community newest first.
    pub fn community_reports(&self, community: &CommunityId) -> Result<Vec<Report>> {
        let prefix = community.as_bytes();
        let mut ids = Vec::new();
        self.db.prefix_iterate(CF_IDX_REPORTS, prefix, |key, _| {
            if let Some(id) = key.get(prefix.len() + 8..).and_then(EntityId::from_slice) {
                ids.push(id);
            }
            true
        })?;
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(report) = self.get_report(&id)? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    pub fn stats(&self) -> Result<ForumStats> {
        Ok(ForumStats {
            users: self.db.count_prefix(CF_USERS, &[])?,
            communities: self.db.count_prefix(CF_COMMUNITIES, &[])?,
            threads: self.db.count_prefix(CF_THREADS, &[])?,
            comments: self.db.count_prefix(CF_COMMENTS, &[])?,
            sessions: self.db.count_prefix(CF_SESSIONS, &[])?,
        })
    }

    /// Deletes everything. Used by tests.
    pub fn clear(&self) -> Result<()> {
        for cf in ALL_CFS {
            self.db.prefix_delete(cf, &[])?;
        }
        info!("Cleared all forum storage data");
        Ok(())
    }

    /// Walks a `prefix + inverted_timestamp + id` keyed column family newest
    /// first, resuming after `cursor`. `load` turns each entry into an item or
    /// skips it by returning `None`.
    fn scan_newest_first<T>(
        &self,
        cf: &str,
        prefix: &[u8],
        cursor: Option<&Cursor>,
        limit: usize,
        mut load: impl FnMut(EntityId, &[u8]) -> Result<Option<T>>,
    ) -> Result<Page<T>> {
        let seek_key = match cursor {
            Some(Cursor::After { timestamp, id }) => newest_first_key(prefix, *timestamp, id),
            Some(Cursor::Offset(_)) => {
                return Err(LoopHubError::validation(
                    "Offset cursor is not valid for this listing",
                ))
            }
            None => prefix.to_vec(),
        };
        let key_len = prefix.len() + 24;

        let mut items: Vec<(u64, EntityId, T)> = Vec::with_capacity(limit + 1);
        let mut failure: Option<LoopHubError> = None;

        self.db.seek_iterate(cf, &seek_key, prefix, |key, value| {
            // Skip the cursor item itself.
            if key.len() != key_len || (cursor.is_some() && key == seek_key.as_slice()) {
                return true;
            }
            let timestamp = revert_timestamp(&key[prefix.len()..]);
            let id = EntityId::from_slice(&key[prefix.len() + 8..]);
            let (Some(timestamp), Some(id)) = (timestamp, id) else {
                return true;
            };
            match load(id, value) {
                Ok(Some(item)) => items.push((timestamp, id, item)),
                Ok(None) => {}
                Err(e) => {
                    failure = Some(e);
                    return false;
                }
            }
            items.len() <= limit
        })?;

        if let Some(e) = failure {
            return Err(e);
        }

        let has_more = items.len() > limit;
        items.truncate(limit);
        let next_cursor = if has_more {
            items
                .last()
                .map(|(timestamp, id, _)| Cursor::After { timestamp: *timestamp, id: *id }.encode())
        } else {
            None
        };

        Ok(Page {
            items: items.into_iter().map(|(_, _, item)| item).collect(),
            next_cursor,
        })
    }
}
