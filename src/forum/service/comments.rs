//! Comments and comment trees.

use super::ForumService;
use crate::error::{LoopHubError, Result};
use crate::forum::comment::{build_tree, validate_comment_body, Comment, CommentNode, CommentSort, NewComment};
use crate::forum::constants::MAX_COMMENT_DEPTH;
use crate::forum::notification::NotificationKind;
use crate::forum::storage::ForumStorage;
use crate::forum::types::{CommentId, TargetRef, ThreadId, UserId};
use crate::forum::user::UserSummary;
use std::collections::HashMap;
use tracing::info;

impl ForumService {
    /// Adds a comment to a thread, or a reply to another comment.
    ///
    /// The parent's author (or the thread author, for top-level comments) gets
    /// a reply notification; users mentioned in the body get a mention
    /// notification. Nobody is notified about their own comment.
    pub fn create_comment(&mut self, actor: &UserId, input: NewComment) -> Result<Comment> {
        let account = self.load_user(actor)?;
        let mut thread = self.load_thread(&input.thread_id)?;
        let community = self.load_community(&thread.community_id)?;
        let perms = self.permissions(&community, &[&account])?;
        let now = self.now();

        Self::ensure_can_view(&perms, Some(actor))?;
        if perms.is_banned(actor, now) {
            return Err(LoopHubError::permission_denied(
                "You are banned from this community",
            ));
        }
        Self::require_level(&account, |p| p.comment, "comment")?;
        if !thread.is_publicly_visible() {
            return Err(LoopHubError::validation("Thread is not accepting comments"));
        }
        if thread.locked && !perms.can_moderate(actor) {
            return Err(LoopHubError::validation("Thread is locked"));
        }
        validate_comment_body(&input.body)?;

        let parent = match input.parent_id {
            Some(parent_id) => {
                let parent = self.load_comment(&parent_id)?;
                if parent.thread_id != thread.id {
                    return Err(LoopHubError::validation(
                        "Parent comment belongs to a different thread",
                    ));
                }
                Some(parent)
            }
            None => None,
        };
        let depth = parent.as_ref().map_or(0, |p| p.depth + 1);
        if depth > MAX_COMMENT_DEPTH {
            return Err(LoopHubError::validation(format!(
                "Replies cannot nest deeper than {} levels",
                MAX_COMMENT_DEPTH
            )));
        }

        let comment = Comment {
            id: CommentId::new(),
            thread_id: thread.id,
            parent_id: input.parent_id,
            author_id: *actor,
            body: input.body,
            depth,
            created_at: now,
            edited_at: None,
            upvotes: 0,
            downvotes: 0,
            hidden: false,
            deleted: false,
        };
        thread.comment_count += 1;

        let target = TargetRef::Comment(comment.id);
        let mut ops = ForumStorage::create_comment_ops(&comment, &thread)?;
        let (recipient, message) = match &parent {
            Some(parent) => (
                parent.author_id,
                format!("{} replied to your comment in \"{}\"", account.profile.username, thread.title),
            ),
            None => (
                thread.author_id,
                format!("{} commented on your thread \"{}\"", account.profile.username, thread.title),
            ),
        };
        self.notify(
            &mut ops,
            recipient,
            NotificationKind::Reply,
            Some(*actor),
            Some(target),
            message,
        )?;
        self.notify_mentions(
            &mut ops,
            &account,
            &community,
            &comment.body,
            target,
            &[recipient],
            &format!("a comment on \"{}\"", thread.title),
        )?;
        self.storage.commit(ops)?;

        info!(
            comment = %comment.id.short(),
            thread = %thread.id.short(),
            depth,
            "Created comment"
        );
        Ok(comment)
    }

    /// Comment tree of a thread. Hidden comments keep their place in the tree
    /// with the body removed, except for moderators.
    pub fn list_comments(
        &self,
        viewer: Option<&UserId>,
        thread_id: &ThreadId,
        sort: CommentSort,
    ) -> Result<Vec<CommentNode>> {
        let thread = self.load_thread(thread_id)?;
        let community = self.load_community(&thread.community_id)?;
        let account = self.load_viewer(viewer)?;
        let perms = self.viewer_permissions(&community, account.as_ref())?;
        Self::ensure_can_view(&perms, viewer)?;
        let is_mod = viewer.is_some_and(|v| perms.can_moderate(v));
        if thread.hidden && !is_mod {
            return Err(LoopHubError::not_found(format!("Thread {} not found", thread_id)));
        }

        let mut authors: HashMap<UserId, UserSummary> = HashMap::new();
        let mut nodes = Vec::new();
        for comment in self.storage.thread_comments(thread_id)? {
            let author = match authors.get(&comment.author_id) {
                Some(author) => author.clone(),
                None => {
                    let author = self.user_summary(&comment.author_id)?;
                    authors.insert(comment.author_id, author.clone());
                    author
                }
            };
            let your_vote = self.vote_of(viewer, &TargetRef::Comment(comment.id))?;
            let shown = if is_mod && !comment.deleted {
                comment
            } else {
                comment.redacted()
            };
            nodes.push(CommentNode::new(shown, author, your_vote));
        }
        Ok(build_tree(nodes, sort))
    }

    pub fn edit_comment(&mut self, actor: &UserId, comment_id: &CommentId, body: String) -> Result<Comment> {
        let mut comment = self.load_comment(comment_id)?;
        if comment.author_id != *actor {
            return Err(LoopHubError::permission_denied(
                "Only the author can edit a comment",
            ));
        }
        if comment.deleted {
            return Err(LoopHubError::validation("Comment has been deleted"));
        }
        validate_comment_body(&body)?;
        comment.body = body;
        comment.edited_at = Some(self.now());
        self.storage.put_comment(&comment)?;
        Ok(comment)
    }

    /// Soft-deletes a comment. Replies stay in place under a `[deleted]`
    /// parent.
    pub fn delete_comment(&mut self, actor: &UserId, comment_id: &CommentId) -> Result<Comment> {
        let account = self.load_user(actor)?;
        let mut comment = self.load_comment(comment_id)?;
        if comment.author_id != *actor {
            let thread = self.load_thread(&comment.thread_id)?;
            let community = self.load_community(&thread.community_id)?;
            let perms = self.permissions(&community, &[&account])?;
            if !perms.can_moderate(actor) {
                return Err(LoopHubError::permission_denied(
                    "Only the author or a moderator can delete a comment",
                ));
            }
        }
        if !comment.deleted {
            comment.deleted = true;
            comment.body.clear();
            self.storage.commit(vec![ForumStorage::comment_op(&comment)?])?;
            info!(comment = %comment_id.short(), by = %actor.short(), "Deleted comment");
        }
        Ok(comment.redacted())
    }
}
