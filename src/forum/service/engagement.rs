//! Votes, reactions and mention suggestions.

use super::{ForumService, TargetContext};
use crate::error::{LoopHubError, Result};
use crate::forum::constants::MAX_MENTION_SUGGESTIONS;
use crate::forum::mention::{suggest, MentionCandidate};
use crate::forum::notification::NotificationKind;
use crate::forum::reaction::{ReactionSummary, ReactionToggle};
use crate::forum::storage::ForumStorage;
use crate::forum::types::{ReactionKind, TargetRef, UserId, VoteDirection};
use crate::forum::user::{normalize_username, UserAccount};
use crate::forum::vote::{karma_delta, Vote, VoteOutcome, VoteTally};
use tracing::debug;

impl ForumService {
    /// Loads a target and checks that `account` may interact with it.
    fn engagement_target(&self, account: &UserAccount, target: &TargetRef) -> Result<TargetContext> {
        let ctx = self.load_target(target)?;
        let actor = &account.profile.id;
        let perms = self.permissions(&ctx.community, &[account])?;
        Self::ensure_can_view(&perms, Some(actor))?;
        if perms.is_banned(actor, self.now()) {
            return Err(LoopHubError::permission_denied(
                "You are banned from this community",
            ));
        }
        if !ctx.is_publicly_visible() {
            return Err(LoopHubError::not_found(format!("{} is not available", target)));
        }
        Ok(ctx)
    }

    /// Sets the actor's vote on a thread or comment. `VoteDirection::None`
    /// clears it. The author's karma moves by the change in vote value.
    pub fn cast_vote(
        &mut self,
        actor: &UserId,
        target: TargetRef,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        let account = self.load_user(actor)?;
        let mut ctx = self.engagement_target(&account, &target)?;
        if ctx.author_id() == *actor {
            return Err(LoopHubError::validation(
                "You cannot vote on your own content",
            ));
        }
        match direction {
            VoteDirection::Up => Self::require_level(&account, |p| p.upvote, "upvote")?,
            VoteDirection::Down => Self::require_level(&account, |p| p.downvote, "downvote")?,
            VoteDirection::None => {}
        }

        let old = self
            .storage
            .get_vote(&target, actor)?
            .map(|v| v.direction)
            .unwrap_or_default();
        let mut tally = match &ctx.comment {
            Some(comment) => VoteTally::new(comment.upvotes, comment.downvotes),
            None => VoteTally::new(ctx.thread.upvotes, ctx.thread.downvotes),
        };

        if old != direction {
            tally.apply(old, direction);
            let mut ops = Vec::new();
            match &mut ctx.comment {
                Some(comment) => {
                    comment.upvotes = tally.upvotes;
                    comment.downvotes = tally.downvotes;
                    ops.push(ForumStorage::comment_op(comment)?);
                }
                None => {
                    ctx.thread.upvotes = tally.upvotes;
                    ctx.thread.downvotes = tally.downvotes;
                    ops.push(ForumStorage::thread_op(&ctx.thread)?);
                }
            }
            ops.push(match direction {
                VoteDirection::None => ForumStorage::vote_delete_op(&target, actor),
                _ => ForumStorage::vote_op(&Vote {
                    user_id: *actor,
                    target,
                    direction,
                    updated_at: self.now(),
                })?,
            });
            if let Some(mut author) = self.storage.get_user(&ctx.author_id())? {
                self.adjust_karma(&mut ops, &mut author, karma_delta(old, direction))?;
            }
            self.storage.commit(ops)?;
            debug!(
                target = %target,
                voter = %actor.short(),
                from = ?old,
                to = ?direction,
                "Vote changed"
            );
        }

        Ok(VoteOutcome {
            target,
            score: tally.score(),
            upvotes: tally.upvotes,
            downvotes: tally.downvotes,
            your_vote: direction,
        })
    }

    /// Adds the reaction if the actor has not made it yet, removes it
    /// otherwise. Adding notifies the author.
    pub fn toggle_reaction(
        &mut self,
        actor: &UserId,
        target: TargetRef,
        kind: ReactionKind,
    ) -> Result<ReactionToggle> {
        let account = self.load_user(actor)?;
        let ctx = self.engagement_target(&account, &target)?;
        Self::require_level(&account, |p| p.react, "react")?;

        let added = !self.storage.has_reaction(&target, actor, kind)?;
        let mut ops = Vec::new();
        if added {
            ops.push(ForumStorage::reaction_op(&target, actor, kind));
            self.notify(
                &mut ops,
                ctx.author_id(),
                NotificationKind::Reaction,
                Some(*actor),
                Some(target),
                format!(
                    "{} reacted {} to {}",
                    account.profile.username,
                    kind.emoji(),
                    ctx.describe()
                ),
            )?;
        } else {
            ops.push(ForumStorage::reaction_delete_op(&target, actor, kind));
        }
        self.storage.commit(ops)?;

        let summary = ReactionSummary::from_entries(self.storage.reactions(&target)?, Some(actor));
        Ok(ReactionToggle {
            kind,
            added,
            summary,
        })
    }

    /// Reaction summary of a target for a viewer.
    pub fn reactions(&self, viewer: Option<&UserId>, target: &TargetRef) -> Result<ReactionSummary> {
        let ctx = self.load_target(target)?;
        let account = self.load_viewer(viewer)?;
        let perms = self.viewer_permissions(&ctx.community, account.as_ref())?;
        Self::ensure_can_view(&perms, viewer)?;
        Ok(ReactionSummary::from_entries(self.storage.reactions(target)?, viewer))
    }

    /// Usernames starting with `prefix`, best matches first.
    pub fn suggest_mentions(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<MentionCandidate>> {
        let wanted = normalize_username(prefix.trim_start_matches('@'));
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit
            .unwrap_or(MAX_MENTION_SUGGESTIONS)
            .clamp(1, MAX_MENTION_SUGGESTIONS);

        // The exact name is the shortest match. Karma only orders names of
        // equal length, so accounts are loaded one length group at a time.
        let mut names = self.storage.usernames_with_prefix(&wanted)?;
        names.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        let mut candidates = Vec::new();
        let mut group_len = None;
        for (name, id) in names {
            if candidates.len() >= limit && group_len != Some(name.len()) {
                break;
            }
            group_len = Some(name.len());
            if let Some(account) = self.storage.get_user(&id)? {
                candidates.push(MentionCandidate {
                    display_name: account.profile.shown_name().to_string(),
                    username: account.profile.username,
                    karma: account.profile.karma,
                });
            }
        }
        Ok(suggest(&wanted, &candidates, limit))
    }
}
