//! Threads, listings and polls.

use super::ForumService;
use crate::error::{LoopHubError, Result};
use crate::forum::community::Community;
use crate::forum::constants::clamp_page_size;
use crate::forum::feed::sort_threads;
use crate::forum::permissions::CommunityPermissions;
use crate::forum::poll::{Poll, PollResults};
use crate::forum::reaction::ReactionSummary;
use crate::forum::storage::{Cursor, ForumStorage, Page};
use crate::forum::thread::{
    normalize_tags, validate_thread_body, validate_title, NewThread, Thread, ThreadEdit,
    ThreadSort, ThreadView,
};
use crate::forum::types::{CommunityId, PollId, TargetRef, ThreadId, UserId, VoteDirection};
use crate::forum::user::{UserAccount, UserSummary};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// A row of a thread listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadListItem {
    pub thread: Thread,
    pub author: UserSummary,
    pub score: i64,
    pub your_vote: VoteDirection,
}

impl ForumService {
    /// Posts a thread, with an optional poll, to a community the actor is a
    /// member of.
    pub fn create_thread(&mut self, actor: &UserId, input: NewThread) -> Result<Thread> {
        let account = self.load_user(actor)?;
        let mut community = self.load_community(&input.community_id)?;
        let perms = self.permissions(&community, &[&account])?;
        let now = self.now();
        Self::ensure_can_post(&perms, actor, now)?;
        Self::require_level(&account, |p| p.create_thread, "create threads")?;

        let title = validate_title(&input.title)?;
        validate_thread_body(&input.body)?;
        let tags = normalize_tags(&input.tags)?;

        let thread_id = ThreadId::new();
        let poll = match input.poll {
            Some(new_poll) => {
                Self::require_level(&account, |p| p.create_poll, "create polls")?;
                new_poll.validate()?;
                Some(new_poll.into_poll(thread_id, now))
            }
            None => None,
        };

        let thread = Thread {
            id: thread_id,
            community_id: community.id,
            author_id: *actor,
            title,
            body: input.body,
            tags,
            created_at: now,
            edited_at: None,
            upvotes: 0,
            downvotes: 0,
            comment_count: 0,
            pinned: false,
            locked: false,
            hidden: false,
            deleted: false,
            poll_id: poll.as_ref().map(|p| p.id),
        };
        community.thread_count += 1;

        let mut ops = ForumStorage::create_thread_ops(&thread, poll.as_ref(), &community)?;
        self.notify_mentions(
            &mut ops,
            &account,
            &community,
            &thread.body,
            TargetRef::Thread(thread.id),
            &[],
            &format!("\"{}\"", thread.title),
        )?;
        self.storage.commit(ops)?;

        info!(
            thread = %thread.id.short(),
            community = %community.slug,
            author = %actor.short(),
            "Created thread"
        );
        Ok(thread)
    }

    /// Fails unless `user` is a member in good standing.
    pub(super) fn ensure_can_post(perms: &CommunityPermissions, user: &UserId, now: u64) -> Result<()> {
        if perms.can_post(user, now) {
            return Ok(());
        }
        if perms.is_banned(user, now) {
            Err(LoopHubError::permission_denied(
                "You are banned from this community",
            ))
        } else {
            Err(LoopHubError::permission_denied(
                "Join the community before posting",
            ))
        }
    }

    pub fn get_thread(&self, viewer: Option<&UserId>, thread_id: &ThreadId) -> Result<ThreadView> {
        let thread = self.load_thread(thread_id)?;
        let community = self.load_community(&thread.community_id)?;
        let account = self.load_viewer(viewer)?;
        let perms = self.viewer_permissions(&community, account.as_ref())?;
        Self::ensure_can_view(&perms, viewer)?;

        let is_mod = viewer.is_some_and(|v| perms.can_moderate(v));
        if thread.hidden && !is_mod {
            return Err(LoopHubError::not_found(format!("Thread {} not found", thread_id)));
        }

        let target = TargetRef::Thread(thread.id);
        let your_vote = self.vote_of(viewer, &target)?;
        let reactions = ReactionSummary::from_entries(self.storage.reactions(&target)?, viewer);
        let poll = match thread.poll_id {
            Some(poll_id) => Some(self.poll_results(&poll_id, viewer)?),
            None => None,
        };

        Ok(ThreadView {
            author: self.user_summary(&thread.author_id)?,
            community_slug: community.slug,
            score: thread.score(),
            your_vote,
            reactions,
            poll,
            thread: Self::shown_thread(thread, is_mod),
        })
    }

    /// Moderators see hidden bodies; deleted bodies are gone for everyone.
    fn shown_thread(thread: Thread, is_mod: bool) -> Thread {
        if is_mod && !thread.deleted {
            thread
        } else {
            thread.redacted()
        }
    }

    pub(super) fn vote_of(&self, viewer: Option<&UserId>, target: &TargetRef) -> Result<VoteDirection> {
        Ok(match viewer {
            Some(user) => self
                .storage
                .get_vote(target, user)?
                .map(|v| v.direction)
                .unwrap_or_default(),
            None => VoteDirection::None,
        })
    }

    /// Lists a community's threads. Pinned threads lead the first page of
    /// every sort order. Hidden and deleted threads are only listed for
    /// moderators.
    pub fn list_threads(
        &self,
        viewer: Option<&UserId>,
        community_id: &CommunityId,
        sort: ThreadSort,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<ThreadListItem>> {
        let community = self.load_community(community_id)?;
        let account = self.load_viewer(viewer)?;
        let perms = self.viewer_permissions(&community, account.as_ref())?;
        Self::ensure_can_view(&perms, viewer)?;

        let is_mod = viewer.is_some_and(|v| perms.can_moderate(v));
        let visible = |t: &Thread| is_mod || t.is_publicly_visible();
        let limit = clamp_page_size(limit);
        let cursor = Cursor::decode_opt(cursor)?;

        let pinned = self.pinned_threads(&community, visible)?;
        let pinned_ids: HashSet<ThreadId> = community.pinned_thread_ids.iter().copied().collect();

        let (first_page, page) = match sort {
            ThreadSort::New => {
                let page = self.storage.list_threads(community_id, cursor.as_ref(), limit, |t| {
                    visible(t) && !pinned_ids.contains(&t.id)
                })?;
                (cursor.is_none(), page)
            }
            ThreadSort::Hot | ThreadSort::Top => {
                let offset = match cursor {
                    None => 0,
                    Some(Cursor::Offset(offset)) => offset,
                    Some(Cursor::After { .. }) => {
                        return Err(LoopHubError::validation(format!(
                            "Cursor does not belong to a {} listing",
                            sort
                        )))
                    }
                };
                let mut threads: Vec<Thread> = self
                    .storage
                    .community_threads(community_id)?
                    .into_iter()
                    .filter(|t| visible(t) && !pinned_ids.contains(&t.id))
                    .collect();
                sort_threads(&mut threads, sort);
                (offset == 0, Page::from_offset(threads, offset, limit))
            }
        };

        let leading = if first_page { pinned } else { Vec::new() };
        let mut items = Vec::with_capacity(leading.len() + page.items.len());
        for thread in leading.into_iter().chain(page.items) {
            items.push(self.list_item(thread, viewer, is_mod)?);
        }
        Ok(Page {
            items,
            next_cursor: page.next_cursor,
        })
    }

    fn pinned_threads(&self, community: &Community, visible: impl Fn(&Thread) -> bool) -> Result<Vec<Thread>> {
        let mut pinned = Vec::with_capacity(community.pinned_thread_ids.len());
        for id in &community.pinned_thread_ids {
            if let Some(thread) = self.storage.get_thread(id)?.filter(|t| visible(t)) {
                pinned.push(thread);
            }
        }
        Ok(pinned)
    }

    fn list_item(&self, thread: Thread, viewer: Option<&UserId>, is_mod: bool) -> Result<ThreadListItem> {
        Ok(ThreadListItem {
            author: self.user_summary(&thread.author_id)?,
            score: thread.score(),
            your_vote: self.vote_of(viewer, &TargetRef::Thread(thread.id))?,
            thread: Self::shown_thread(thread, is_mod),
        })
    }

    /// Edits a thread. Only the author may edit, and not after deletion.
    pub fn edit_thread(&mut self, actor: &UserId, thread_id: &ThreadId, edit: ThreadEdit) -> Result<Thread> {
        if edit.is_empty() {
            return Err(LoopHubError::validation("Nothing to edit"));
        }
        let mut thread = self.load_thread(thread_id)?;
        if thread.author_id != *actor {
            return Err(LoopHubError::permission_denied(
                "Only the author can edit a thread",
            ));
        }
        if thread.deleted {
            return Err(LoopHubError::validation("Thread has been deleted"));
        }

        if let Some(title) = edit.title {
            thread.title = validate_title(&title)?;
        }
        if let Some(body) = edit.body {
            validate_thread_body(&body)?;
            thread.body = body;
        }
        if let Some(tags) = edit.tags {
            thread.tags = normalize_tags(&tags)?;
        }
        thread.edited_at = Some(self.now());
        self.storage.put_thread(&thread)?;
        Ok(thread)
    }

    /// Soft-deletes a thread: the body is cleared, comments stay readable.
    /// Authors and moderators may delete.
    pub fn delete_thread(&mut self, actor: &UserId, thread_id: &ThreadId) -> Result<Thread> {
        let account = self.load_user(actor)?;
        let mut thread = self.load_thread(thread_id)?;
        let mut community = self.load_community(&thread.community_id)?;
        let perms = self.permissions(&community, &[&account])?;
        if thread.author_id != *actor && !perms.can_moderate(actor) {
            return Err(LoopHubError::permission_denied(
                "Only the author or a moderator can delete a thread",
            ));
        }
        if thread.deleted {
            return Ok(thread.redacted());
        }

        thread.deleted = true;
        thread.body.clear();
        let mut ops = vec![];
        if thread.pinned {
            thread.pinned = false;
            community.pinned_thread_ids.retain(|id| id != thread_id);
            ops.push(ForumStorage::community_op(&community)?);
        }
        ops.push(ForumStorage::thread_op(&thread)?);
        self.storage.commit(ops)?;

        info!(thread = %thread_id.short(), by = %actor.short(), "Deleted thread");
        Ok(thread.redacted())
    }

    // -------------------------------------------------------------------------
    // Polls
    // -------------------------------------------------------------------------

    fn load_poll(&self, poll_id: &PollId) -> Result<Poll> {
        self.storage
            .get_poll(poll_id)?
            .ok_or_else(|| LoopHubError::not_found(format!("Poll {} not found", poll_id)))
    }

    fn poll_results(&self, poll_id: &PollId, viewer: Option<&UserId>) -> Result<PollResults> {
        let poll = self.load_poll(poll_id)?;
        let ballots = self.storage.ballots(poll_id)?;
        let yours = match viewer {
            Some(user) => self.storage.get_ballot(poll_id, user)?.unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(PollResults::tally(
            poll,
            ballots.iter().map(Vec::as_slice),
            yours,
            self.now(),
        ))
    }

    /// Checks that `viewer` may see the thread a poll belongs to.
    fn poll_thread(&self, poll: &Poll, viewer: Option<&UserAccount>) -> Result<(Thread, CommunityPermissions)> {
        let thread = self.load_thread(&poll.thread_id)?;
        let community = self.load_community(&thread.community_id)?;
        let perms = self.viewer_permissions(&community, viewer)?;
        let viewer_id = viewer.map(|a| &a.profile.id);
        Self::ensure_can_view(&perms, viewer_id)?;
        let is_mod = viewer_id.is_some_and(|v| perms.can_moderate(v));
        if thread.hidden && !is_mod {
            return Err(LoopHubError::not_found(format!("Poll {} not found", poll.id)));
        }
        Ok((thread, perms))
    }

    pub fn get_poll(&self, viewer: Option<&UserId>, poll_id: &PollId) -> Result<PollResults> {
        let poll = self.load_poll(poll_id)?;
        let account = self.load_viewer(viewer)?;
        self.poll_thread(&poll, account.as_ref())?;
        self.poll_results(poll_id, viewer)
    }

    /// Casts or replaces the actor's ballot.
    pub fn vote_poll(&mut self, actor: &UserId, poll_id: &PollId, choices: &[u32]) -> Result<PollResults> {
        let account = self.load_user(actor)?;
        let poll = self.load_poll(poll_id)?;
        let (thread, perms) = self.poll_thread(&poll, Some(&account))?;
        let now = self.now();
        if perms.is_banned(actor, now) {
            return Err(LoopHubError::permission_denied(
                "You are banned from this community",
            ));
        }
        if thread.locked || thread.deleted {
            return Err(LoopHubError::validation("Thread is closed for voting"));
        }

        let ballot = poll.check_ballot(choices, now)?;
        self.storage.put_ballot(poll_id, actor, &ballot)?;
        self.poll_results(poll_id, Some(actor))
    }
}
