//! The forum's operations, on top of [`ForumStorage`].
//!
//! Every public method resolves the acting user, checks permissions and
//! karma level, then writes all affected records in one batch. Methods that
//! change state take `&mut self`, so wrapping the service in a `RwLock`
//! serializes writers while readers proceed in parallel.

mod accounts;
mod comments;
mod communities;
mod engagement;
mod moderation;
mod notifications;
mod threads;

use crate::error::{LoopHubError, Result};
use crate::forum::comment::Comment;
use crate::forum::community::Community;
use crate::forum::constants::DEFAULT_SESSION_TTL_MS;
use crate::forum::karma::{level_up, permissions_for, LevelPermissions};
use crate::forum::mention::extract_mentions;
use crate::forum::notification::{Notification, NotificationKind};
use crate::forum::permissions::CommunityPermissions;
use crate::forum::storage::{ForumStats, ForumStorage};
use crate::forum::thread::Thread;
use crate::forum::types::{
    Clock, CommentId, CommunityId, EntityId, SystemClock, TargetRef, ThreadId, UserId,
};
use crate::forum::user::{UserAccount, UserSummary};
use crate::storage::BatchOp;
use std::sync::Arc;
use tracing::debug;

pub use communities::{CommunityView, MemberView};
pub use threads::ThreadListItem;

/// The forum service.
pub struct ForumService {
    storage: ForumStorage,
    clock: Arc<dyn Clock>,
    session_ttl_ms: u64,
}

impl std::fmt::Debug for ForumService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForumService")
            .field("storage", &self.storage)
            .field("session_ttl_ms", &self.session_ttl_ms)
            .finish()
    }
}

/// The thread (and comment, if any) a vote, reaction or report points at.
struct TargetContext {
    community: Community,
    thread: Thread,
    comment: Option<Comment>,
}

impl TargetContext {
    fn author_id(&self) -> UserId {
        self.comment
            .as_ref()
            .map_or(self.thread.author_id, |c| c.author_id)
    }

    fn is_publicly_visible(&self) -> bool {
        self.thread.is_publicly_visible()
            && self.comment.as_ref().map_or(true, Comment::is_publicly_visible)
    }

    fn describe(&self) -> String {
        match &self.comment {
            Some(_) => format!("your comment in \"{}\"", self.thread.title),
            None => format!("your thread \"{}\"", self.thread.title),
        }
    }
}

impl ForumService {
    pub fn new(storage: ForumStorage, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            session_ttl_ms: DEFAULT_SESSION_TTL_MS,
        }
    }

    /// Service using the wall clock.
    pub fn with_system_clock(storage: ForumStorage) -> Self {
        Self::new(storage, Arc::new(SystemClock))
    }

    /// Overrides the session lifetime.
    pub fn with_session_ttl(mut self, ttl_ms: u64) -> Self {
        self.session_ttl_ms = ttl_ms;
        self
    }

    pub fn storage(&self) -> &ForumStorage {
        &self.storage
    }

    pub fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    pub fn stats(&self) -> Result<ForumStats> {
        self.storage.stats()
    }

    // =========================================================================
    // Loading helpers
    // =========================================================================

    fn load_user(&self, id: &UserId) -> Result<UserAccount> {
        self.storage
            .get_user(id)?
            .ok_or_else(|| LoopHubError::not_found(format!("User {} not found", id)))
    }

    fn load_community(&self, id: &CommunityId) -> Result<Community> {
        self.storage
            .get_community(id)?
            .ok_or_else(|| LoopHubError::not_found(format!("Community {} not found", id)))
    }

    fn load_thread(&self, id: &ThreadId) -> Result<Thread> {
        self.storage
            .get_thread(id)?
            .ok_or_else(|| LoopHubError::not_found(format!("Thread {} not found", id)))
    }

    fn load_comment(&self, id: &CommentId) -> Result<Comment> {
        self.storage
            .get_comment(id)?
            .ok_or_else(|| LoopHubError::not_found(format!("Comment {} not found", id)))
    }

    fn load_target(&self, target: &TargetRef) -> Result<TargetContext> {
        let (thread, comment) = match target {
            TargetRef::Thread(id) => (self.load_thread(id)?, None),
            TargetRef::Comment(id) => {
                let comment = self.load_comment(id)?;
                (self.load_thread(&comment.thread_id)?, Some(comment))
            }
        };
        let community = self.load_community(&thread.community_id)?;
        Ok(TargetContext {
            community,
            thread,
            comment,
        })
    }

    /// Author card, falling back to a placeholder for vanished accounts.
    fn user_summary(&self, id: &UserId) -> Result<UserSummary> {
        Ok(self
            .storage
            .get_user(id)?
            .map(|a| a.profile.summary())
            .unwrap_or_else(|| UserSummary::unknown(*id)))
    }

    /// Permission state of `community` with the given users' memberships,
    /// bans and admin flags loaded.
    fn permissions(
        &self,
        community: &Community,
        users: &[&UserAccount],
    ) -> Result<CommunityPermissions> {
        let mut perms = CommunityPermissions::from_community(community);
        for account in users {
            let id = account.profile.id;
            if let Some(membership) = self.storage.get_membership(&community.id, &id)? {
                perms.add_membership(&membership);
            }
            if let Some(ban) = self.storage.get_ban(&community.id, &id)? {
                perms.add_ban(ban);
            }
            if account.profile.is_admin {
                perms.add_admin(id);
            }
        }
        Ok(perms)
    }

    /// Permissions for an optional viewer.
    fn viewer_permissions(
        &self,
        community: &Community,
        viewer: Option<&UserAccount>,
    ) -> Result<CommunityPermissions> {
        match viewer {
            Some(account) => self.permissions(community, &[account]),
            None => self.permissions(community, &[]),
        }
    }

    fn load_viewer(&self, viewer: Option<&UserId>) -> Result<Option<UserAccount>> {
        viewer.map(|id| self.load_user(id)).transpose()
    }

    fn ensure_can_view(
        perms: &CommunityPermissions,
        viewer: Option<&UserId>,
    ) -> Result<()> {
        if perms.can_view(viewer) {
            Ok(())
        } else {
            Err(LoopHubError::permission_denied("This community is private"))
        }
    }

    /// Fails unless the user's karma level (or admin flag) grants `allowed`.
    fn require_level(
        account: &UserAccount,
        allowed: fn(&LevelPermissions) -> bool,
        what: &str,
    ) -> Result<()> {
        let perms = permissions_for(account.profile.karma, account.profile.is_admin);
        if allowed(&perms) {
            Ok(())
        } else {
            let level = account.profile.level();
            Err(LoopHubError::permission_denied(format!(
                "Your level ({} {}) does not allow you to {}",
                level.number, level.name, what
            )))
        }
    }

    // =========================================================================
    // Write helpers
    // =========================================================================

    /// Queues a notification unless the recipient is the actor.
    fn notify(
        &self,
        ops: &mut Vec<BatchOp>,
        recipient: UserId,
        kind: NotificationKind,
        actor: Option<UserId>,
        target: Option<TargetRef>,
        message: String,
    ) -> Result<()> {
        if actor == Some(recipient) {
            return Ok(());
        }
        let notification = Notification::new(recipient, kind, actor, target, message, self.now());
        debug!(
            recipient = %recipient.short(),
            kind = %kind,
            "queue_notification"
        );
        ops.push(ForumStorage::notification_op(&notification)?);
        Ok(())
    }

    /// Adjusts a user's karma and queues a level-up notification when a new
    /// level is reached.
    fn adjust_karma(&self, ops: &mut Vec<BatchOp>, author: &mut UserAccount, delta: i64) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let before = author.profile.karma;
        author.profile.karma = before.saturating_add(delta);
        ops.push(ForumStorage::user_op(author)?);
        if let Some(level) = level_up(before, author.profile.karma) {
            self.notify(
                ops,
                author.profile.id,
                NotificationKind::LevelUp,
                None,
                None,
                format!("You reached level {}: {}", level.number, level.name),
            )?;
        }
        Ok(())
    }

    /// Queues mention notifications for every existing user named in `body`,
    /// skipping the author, anyone in `skip`, and non-members of a private
    /// community.
    #[allow(clippy::too_many_arguments)]
    fn notify_mentions(
        &self,
        ops: &mut Vec<BatchOp>,
        author: &UserAccount,
        community: &Community,
        body: &str,
        target: TargetRef,
        skip: &[UserId],
        context: &str,
    ) -> Result<()> {
        for name in extract_mentions(body) {
            let Some(user) = self.storage.user_id_by_username(&name)? else {
                continue;
            };
            if user == author.profile.id || skip.contains(&user) {
                continue;
            }
            if community.is_private && self.storage.get_membership(&community.id, &user)?.is_none() {
                continue;
            }
            self.notify(
                ops,
                user,
                NotificationKind::Mention,
                Some(author.profile.id),
                Some(target),
                format!("{} mentioned you in {}", author.profile.username, context),
            )?;
        }
        Ok(())
    }

    /// Resolves a community from its ID or slug.
    pub fn find_community(&self, id_or_slug: &str) -> Result<Community> {
        if let Ok(id) = EntityId::parse(id_or_slug) {
            return self.load_community(&id);
        }
        let slug = crate::forum::community::normalize_slug(id_or_slug);
        let id = self
            .storage
            .community_id_by_slug(&slug)?
            .ok_or_else(|| LoopHubError::not_found(format!("Community '{}' not found", slug)))?;
        self.load_community(&id)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::auth::Password;
    use crate::forum::community::NewCommunity;
    use crate::forum::types::ManualClock;
    use tempfile::TempDir;

    pub const START_MS: u64 = 1_750_000_000_000;

    pub struct Harness {
        pub service: ForumService,
        pub clock: Arc<ManualClock>,
        _temp_dir: TempDir,
    }

    pub fn harness() -> Harness {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage = ForumStorage::new(temp_dir.path()).expect("Failed to create storage");
        let clock = Arc::new(ManualClock::new(START_MS));
        let service = ForumService::new(storage, clock.clone());
        Harness {
            service,
            clock,
            _temp_dir: temp_dir,
        }
    }

    impl Harness {
        pub fn user(&mut self, name: &str) -> UserId {
            self.service
                .register(name, &Password::new("password123"), None)
                .expect("register")
                .id
        }

        /// Gives a user enough karma for every level permission.
        pub fn promote(&mut self, user: &UserId, karma: i64) {
            let mut account = self.service.load_user(user).unwrap();
            account.profile.karma = karma;
            self.service.storage.put_user(&account).unwrap();
        }

        pub fn community(&mut self, owner: &UserId, slug: &str) -> CommunityId {
            self.promote(owner, 200);
            self.service
                .create_community(
                    owner,
                    NewCommunity {
                        slug: slug.to_string(),
                        name: slug.to_string(),
                        description: String::new(),
                        is_private: false,
                    },
                )
                .expect("create community")
                .id
        }

        pub fn karma(&self, user: &UserId) -> i64 {
            self.service.load_user(user).unwrap().profile.karma
        }

        pub fn tick(&self) {
            self.clock.advance(1);
        }
    }
}
