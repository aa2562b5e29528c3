//! Moderation actions, the mod log and user reports.

use super::ForumService;
use crate::error::{LoopHubError, Result};
use crate::forum::community::{Community, CommunityRole};
use crate::forum::constants::{clamp_page_size, MAX_PINNED_THREADS};
use crate::forum::moderation::{validate_reason, ModAction, ModLogEntry, ModRequest, Report, ReportStatus};
use crate::forum::notification::NotificationKind;
use crate::forum::storage::{Cursor, ForumStorage, Page};
use crate::forum::thread::Thread;
use crate::forum::types::{CommunityId, EntityId, ReportId, TargetRef, UserId};
use crate::storage::BatchOp;
use tracing::info;

/// Who to tell about a moderation action, and what.
struct Affected {
    user: UserId,
    target: Option<TargetRef>,
    message: String,
}

impl ForumService {
    /// Performs a moderation action and records it in the community's mod
    /// log. The affected user is notified.
    pub fn moderate(&mut self, actor: &UserId, request: ModRequest) -> Result<ModLogEntry> {
        request.validate()?;
        let account = self.load_user(actor)?;
        let mut community = self.load_community(&request.community)?;
        let target_account = request
            .target_user
            .map(|id| self.load_user(&id))
            .transpose()?;

        let mut users = vec![&account];
        users.extend(target_account.as_ref());
        let mut perms = self.permissions(&community, &users)?;
        let now = self.now();
        perms.apply_action(actor, &request, now)?;

        let mut ops = Vec::new();
        let mut expires_at = None;
        let affected = match (request.action, request.target_user) {
            (ModAction::AddModerator | ModAction::RemoveModerator, Some(user)) => {
                let promote = request.action == ModAction::AddModerator;
                let mut membership = self
                    .storage
                    .get_membership(&community.id, &user)?
                    .ok_or_else(|| LoopHubError::not_found("User is not a member"))?;
                membership.role = if promote {
                    CommunityRole::Moderator
                } else {
                    CommunityRole::Member
                };
                ops.push(ForumStorage::membership_op(&membership)?);
                Affected {
                    user,
                    target: None,
                    message: if promote {
                        format!("You are now a moderator of {}", community.slug)
                    } else {
                        format!("You are no longer a moderator of {}", community.slug)
                    },
                }
            }
            (ModAction::BanUser, Some(user)) => {
                let ban = perms
                    .ban(&user)
                    .cloned()
                    .ok_or_else(|| LoopHubError::storage("Ban was not recorded"))?;
                expires_at = ban.expires_at;
                ops.push(ForumStorage::ban_op(&ban)?);
                if let Some(mut membership) = self.storage.get_membership(&community.id, &user)? {
                    if membership.role == CommunityRole::Moderator {
                        membership.role = CommunityRole::Member;
                        ops.push(ForumStorage::membership_op(&membership)?);
                    }
                }
                let duration = match ban.expires_at {
                    Some(until) => format!(" until {}", format_time(until)),
                    None => String::new(),
                };
                Affected {
                    user,
                    target: None,
                    message: format!(
                        "You were banned from {}{}{}",
                        community.slug,
                        duration,
                        reason_suffix(&request.reason)
                    ),
                }
            }
            (ModAction::UnbanUser, Some(user)) => {
                ops.push(ForumStorage::ban_delete_op(&community.id, &user));
                Affected {
                    user,
                    target: None,
                    message: format!("Your ban from {} was lifted", community.slug),
                }
            }
            _ => self.moderate_content(&request, &mut community, &mut ops)?,
        };

        self.notify(
            &mut ops,
            affected.user,
            NotificationKind::Moderation,
            Some(*actor),
            affected.target,
            affected.message,
        )?;

        let entry = ModLogEntry {
            id: EntityId::new(),
            community_id: community.id,
            moderator_id: *actor,
            action: request.action,
            target_user: request.target_user,
            target_thread: request.target_thread,
            target_comment: request.target_comment,
            reason: request.reason,
            created_at: now,
            expires_at,
        };
        ops.push(ForumStorage::mod_log_op(&entry)?);
        self.storage.commit(ops)?;

        info!(
            community = %community.slug,
            moderator = %actor.short(),
            action = %entry.action,
            "Moderation action"
        );
        Ok(entry)
    }

    /// Applies a thread or comment action, queueing the writes.
    fn moderate_content(
        &self,
        request: &ModRequest,
        community: &mut Community,
        ops: &mut Vec<BatchOp>,
    ) -> Result<Affected> {
        if request.action.targets_comment() {
            let comment_id = request
                .target_comment
                .ok_or_else(|| LoopHubError::validation(format!("{} requires a target", request.action)))?;
            let mut comment = self.load_comment(&comment_id)?;
            let thread = self.load_thread(&comment.thread_id)?;
            Self::ensure_in_community(&thread, community)?;
            let hide = request.action == ModAction::HideComment;
            if comment.hidden == hide {
                return Err(LoopHubError::validation(if hide {
                    "Comment is already hidden"
                } else {
                    "Comment is not hidden"
                }));
            }
            comment.hidden = hide;
            ops.push(ForumStorage::comment_op(&comment)?);
            return Ok(Affected {
                user: comment.author_id,
                target: Some(TargetRef::Comment(comment.id)),
                message: format!(
                    "A moderator {} your comment in \"{}\"{}",
                    if hide { "removed" } else { "restored" },
                    thread.title,
                    reason_suffix(&request.reason)
                ),
            });
        }

        let thread_id = request
            .target_thread
            .ok_or_else(|| LoopHubError::validation(format!("{} requires a target", request.action)))?;
        let mut thread = self.load_thread(&thread_id)?;
        Self::ensure_in_community(&thread, community)?;

        let (already, verb) = match request.action {
            ModAction::HideThread => (thread.hidden, "removed"),
            ModAction::UnhideThread => (!thread.hidden, "restored"),
            ModAction::LockThread => (thread.locked, "locked"),
            ModAction::UnlockThread => (!thread.locked, "unlocked"),
            ModAction::PinThread => (thread.pinned, "pinned"),
            ModAction::UnpinThread => (!thread.pinned, "unpinned"),
            other => {
                return Err(LoopHubError::validation(format!(
                    "{} is not a content action",
                    other
                )))
            }
        };
        if already {
            return Err(LoopHubError::validation(format!(
                "Thread is already {}",
                verb
            )));
        }

        match request.action {
            ModAction::HideThread => thread.hidden = true,
            ModAction::UnhideThread => thread.hidden = false,
            ModAction::LockThread => thread.locked = true,
            ModAction::UnlockThread => thread.locked = false,
            ModAction::PinThread => {
                if thread.deleted || thread.hidden {
                    return Err(LoopHubError::validation(
                        "Only visible threads can be pinned",
                    ));
                }
                if community.pinned_thread_ids.len() >= MAX_PINNED_THREADS {
                    return Err(LoopHubError::validation(format!(
                        "A community can pin at most {} threads",
                        MAX_PINNED_THREADS
                    )));
                }
                thread.pinned = true;
                community.pinned_thread_ids.push(thread.id);
                ops.push(ForumStorage::community_op(community)?);
            }
            ModAction::UnpinThread => {
                thread.pinned = false;
                community.pinned_thread_ids.retain(|id| *id != thread.id);
                ops.push(ForumStorage::community_op(community)?);
            }
            _ => {}
        }
        ops.push(ForumStorage::thread_op(&thread)?);

        Ok(Affected {
            user: thread.author_id,
            target: Some(TargetRef::Thread(thread.id)),
            message: format!(
                "A moderator {} your thread \"{}\"{}",
                verb,
                thread.title,
                reason_suffix(&request.reason)
            ),
        })
    }

    fn ensure_in_community(thread: &Thread, community: &Community) -> Result<()> {
        if thread.community_id == community.id {
            Ok(())
        } else {
            Err(LoopHubError::validation(
                "Target does not belong to this community",
            ))
        }
    }

    /// The community's mod log, newest first. Anyone who can see the
    /// community can read it.
    pub fn mod_log(
        &self,
        viewer: Option<&UserId>,
        community_id: &CommunityId,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<ModLogEntry>> {
        let community = self.load_community(community_id)?;
        let account = self.load_viewer(viewer)?;
        let perms = self.viewer_permissions(&community, account.as_ref())?;
        Self::ensure_can_view(&perms, viewer)?;
        let cursor = Cursor::decode_opt(cursor)?;
        self.storage
            .mod_log(community_id, cursor.as_ref(), clamp_page_size(limit))
    }

    // -------------------------------------------------------------------------
    // Reports
    // -------------------------------------------------------------------------

    /// Reports a thread or comment to the community's moderators. A user can
    /// have one open report per target.
    pub fn report(&mut self, actor: &UserId, target: TargetRef, reason: &str) -> Result<Report> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LoopHubError::validation("A report needs a reason"));
        }
        validate_reason(reason)?;

        let account = self.load_user(actor)?;
        let ctx = self.load_target(&target)?;
        let perms = self.permissions(&ctx.community, &[&account])?;
        Self::ensure_can_view(&perms, Some(actor))?;
        if ctx.author_id() == *actor {
            return Err(LoopHubError::validation("You cannot report your own content"));
        }
        if self.storage.open_report_for(actor, &target)?.is_some() {
            return Err(LoopHubError::conflict(
                "You already have an open report for this",
            ));
        }

        let report = Report {
            id: ReportId::new(),
            community_id: ctx.community.id,
            reporter_id: *actor,
            target,
            reason: reason.to_string(),
            status: ReportStatus::Open,
            created_at: self.now(),
            resolved_by: None,
            resolved_at: None,
        };
        self.storage.create_report(&report)?;
        info!(
            report = %report.id.short(),
            community = %ctx.community.slug,
            target = %target,
            "Report filed"
        );
        Ok(report)
    }

    /// Reports of a community, newest first, optionally by status.
    /// Moderators only.
    pub fn list_reports(
        &self,
        actor: &UserId,
        community_id: &CommunityId,
        status: Option<ReportStatus>,
    ) -> Result<Vec<Report>> {
        let account = self.load_user(actor)?;
        let community = self.load_community(community_id)?;
        let perms = self.permissions(&community, &[&account])?;
        if !perms.can_moderate(actor) {
            return Err(LoopHubError::permission_denied(
                "Only moderators can view reports",
            ));
        }
        Ok(self
            .storage
            .community_reports(community_id)?
            .into_iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect())
    }

    /// Closes an open report as resolved or dismissed and tells the reporter.
    pub fn resolve_report(
        &mut self,
        actor: &UserId,
        report_id: &ReportId,
        status: ReportStatus,
    ) -> Result<Report> {
        if status.is_open() {
            return Err(LoopHubError::validation(
                "A report can only be resolved or dismissed",
            ));
        }
        let account = self.load_user(actor)?;
        let mut report = self
            .storage
            .get_report(report_id)?
            .ok_or_else(|| LoopHubError::not_found(format!("Report {} not found", report_id)))?;
        let community = self.load_community(&report.community_id)?;
        let perms = self.permissions(&community, &[&account])?;
        if !perms.can_moderate(actor) {
            return Err(LoopHubError::permission_denied(
                "Only moderators can resolve reports",
            ));
        }
        if !report.status.is_open() {
            return Err(LoopHubError::conflict("Report is already closed"));
        }

        report.status = status;
        report.resolved_by = Some(*actor);
        report.resolved_at = Some(self.now());
        self.storage.close_report(&report)?;

        let mut ops = Vec::new();
        self.notify(
            &mut ops,
            report.reporter_id,
            NotificationKind::Moderation,
            Some(*actor),
            Some(report.target),
            format!(
                "Your report in {} was {}",
                community.slug,
                if status == ReportStatus::Resolved {
                    "resolved"
                } else {
                    "dismissed"
                }
            ),
        )?;
        if !ops.is_empty() {
            self.storage.commit(ops)?;
        }
        Ok(report)
    }
}

fn reason_suffix(reason: &str) -> String {
    if reason.is_empty() {
        String::new()
    } else {
        format!(": {}", reason)
    }
}

fn format_time(millis: u64) -> String {
    chrono::DateTime::from_timestamp_millis(millis as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{harness, Harness, START_MS};
    use crate::error::LoopHubError;
    use crate::forum::community::CommunityRole;
    use crate::forum::moderation::{ModAction, ModRequest, ReportStatus};
    use crate::forum::notification::NotificationKind;
    use crate::forum::thread::{NewThread, ThreadSort};
    use crate::forum::types::{CommunityId, TargetRef, ThreadId, UserId};

    struct World {
        owner: UserId,
        modr: UserId,
        bob: UserId,
        community: CommunityId,
    }

    fn world(h: &mut Harness) -> World {
        let owner = h.user("owner");
        let modr = h.user("modr");
        let bob = h.user("bob");
        let community = h.community(&owner, "rust");
        h.service.join_community(&modr, &community).unwrap();
        h.service.join_community(&bob, &community).unwrap();
        h.service
            .moderate(&owner, ModRequest::new(community, ModAction::AddModerator).user(modr))
            .unwrap();
        World {
            owner,
            modr,
            bob,
            community,
        }
    }

    fn thread(h: &mut Harness, w: &World, author: &UserId, title: &str) -> ThreadId {
        h.tick();
        h.service
            .create_thread(author, NewThread::new(w.community, title, ""))
            .unwrap()
            .id
    }

    #[test]
    fn test_moderator_role_persists() {
        let mut h = harness();
        let w = world(&mut h);
        let view = h.service.get_community(Some(&w.modr), "rust").unwrap();
        assert_eq!(view.your_role, Some(CommunityRole::Moderator));

        // Only the owner manages moderators.
        assert!(matches!(
            h.service.moderate(
                &w.modr,
                ModRequest::new(w.community, ModAction::AddModerator).user(w.bob)
            ),
            Err(LoopHubError::PermissionDenied(_))
        ));
        let notes = h.service.list_notifications(&w.modr, false, None, None).unwrap();
        assert_eq!(notes.items[0].kind, NotificationKind::Moderation);
    }

    #[test]
    fn test_temporary_ban_blocks_posting_until_expiry() {
        let mut h = harness();
        let w = world(&mut h);
        let entry = h
            .service
            .moderate(
                &w.modr,
                ModRequest::new(w.community, ModAction::BanUser)
                    .user(w.bob)
                    .reason("spam")
                    .duration_hours(1),
            )
            .unwrap();
        assert_eq!(entry.expires_at, Some(START_MS + 3_600_000));

        let err = h
            .service
            .create_thread(&w.bob, NewThread::new(w.community, "Back", ""))
            .unwrap_err();
        assert!(matches!(err, LoopHubError::PermissionDenied(_)));
        assert!(h.service.get_community(Some(&w.bob), "rust").unwrap().banned);

        h.clock.advance(3_600_000);
        assert!(h
            .service
            .create_thread(&w.bob, NewThread::new(w.community, "Back", ""))
            .is_ok());
    }

    #[test]
    fn test_moderator_cannot_ban_moderator() {
        let mut h = harness();
        let w = world(&mut h);
        let carol = h.user("carol");
        h.service.join_community(&carol, &w.community).unwrap();
        h.service
            .moderate(&w.owner, ModRequest::new(w.community, ModAction::AddModerator).user(carol))
            .unwrap();

        assert!(h
            .service
            .moderate(&w.modr, ModRequest::new(w.community, ModAction::BanUser).user(carol))
            .is_err());
        // The owner can, and the ban strips the role.
        h.service
            .moderate(&w.owner, ModRequest::new(w.community, ModAction::BanUser).user(carol))
            .unwrap();
        let members = h.service.list_members(None, &w.community).unwrap();
        let carol_role = members.iter().find(|m| m.user.id == carol).unwrap().role;
        assert_eq!(carol_role, CommunityRole::Member);

        h.service
            .moderate(&w.owner, ModRequest::new(w.community, ModAction::UnbanUser).user(carol))
            .unwrap();
        assert!(!h.service.get_community(Some(&carol), "rust").unwrap().banned);
    }

    #[test]
    fn test_pin_limit_and_order() {
        let mut h = harness();
        let w = world(&mut h);
        let pinned: Vec<ThreadId> = (0..4)
            .map(|i| thread(&mut h, &w, &w.bob, &format!("p{}", i)))
            .collect();
        let newest = thread(&mut h, &w, &w.bob, "newest");

        for id in &pinned[..3] {
            h.service
                .moderate(&w.modr, ModRequest::new(w.community, ModAction::PinThread).thread(*id))
                .unwrap();
        }
        let err = h
            .service
            .moderate(
                &w.modr,
                ModRequest::new(w.community, ModAction::PinThread).thread(pinned[3]),
            )
            .unwrap_err();
        assert!(matches!(err, LoopHubError::Validation(_)));

        for sort in [ThreadSort::New, ThreadSort::Hot, ThreadSort::Top] {
            let page = h
                .service
                .list_threads(None, &w.community, sort, None, None)
                .unwrap();
            let ids: Vec<ThreadId> = page.items.iter().map(|i| i.thread.id).collect();
            assert_eq!(&ids[..3], &pinned[..3], "{}", sort);
            assert_eq!(ids.len(), 5);
            assert!(ids[3..].contains(&newest));
        }

        h.service
            .moderate(&w.modr, ModRequest::new(w.community, ModAction::UnpinThread).thread(pinned[0]))
            .unwrap();
        let community = h.service.find_community("rust").unwrap();
        assert_eq!(community.pinned_thread_ids, pinned[1..3].to_vec());
    }

    #[test]
    fn test_hidden_thread_only_visible_to_moderators() {
        let mut h = harness();
        let w = world(&mut h);
        let id = thread(&mut h, &w, &w.bob, "offtopic");
        h.service
            .moderate(&w.modr, ModRequest::new(w.community, ModAction::HideThread).thread(id))
            .unwrap();

        assert!(matches!(
            h.service.get_thread(Some(&w.bob), &id),
            Err(LoopHubError::NotFound(_))
        ));
        assert!(h.service.get_thread(Some(&w.modr), &id).is_ok());
        let public = h
            .service
            .list_threads(None, &w.community, ThreadSort::New, None, None)
            .unwrap();
        assert!(public.items.is_empty());
        let for_mod = h
            .service
            .list_threads(Some(&w.modr), &w.community, ThreadSort::New, None, None)
            .unwrap();
        assert_eq!(for_mod.items.len(), 1);

        // Hiding twice is rejected; the log has the first action.
        assert!(h
            .service
            .moderate(&w.modr, ModRequest::new(w.community, ModAction::HideThread).thread(id))
            .is_err());
        let log = h.service.mod_log(None, &w.community, None, None).unwrap();
        assert_eq!(log.items[0].action, ModAction::HideThread);
    }

    #[test]
    fn test_targets_must_belong_to_community() {
        let mut h = harness();
        let w = world(&mut h);
        let other = h.community(&w.owner, "other");
        h.tick();
        let foreign = h
            .service
            .create_thread(&w.owner, NewThread::new(other, "Elsewhere", ""))
            .unwrap();
        let err = h
            .service
            .moderate(
                &w.modr,
                ModRequest::new(w.community, ModAction::LockThread).thread(foreign.id),
            )
            .unwrap_err();
        assert!(matches!(err, LoopHubError::Validation(_)));
    }

    #[test]
    fn test_report_lifecycle() {
        let mut h = harness();
        let w = world(&mut h);
        let id = thread(&mut h, &w, &w.owner, "Questionable");
        let target = TargetRef::Thread(id);

        assert!(h.service.report(&w.bob, target, "  ").is_err());
        let report = h.service.report(&w.bob, target, "off-topic").unwrap();
        assert!(matches!(
            h.service.report(&w.bob, target, "again"),
            Err(LoopHubError::Conflict(_))
        ));
        assert!(h.service.list_reports(&w.bob, &w.community, None).is_err());

        let open = h
            .service
            .list_reports(&w.modr, &w.community, Some(ReportStatus::Open))
            .unwrap();
        assert_eq!(open.len(), 1);

        let closed = h
            .service
            .resolve_report(&w.modr, &report.id, ReportStatus::Dismissed)
            .unwrap();
        assert_eq!(closed.resolved_by, Some(w.modr));
        assert!(matches!(
            h.service.resolve_report(&w.modr, &report.id, ReportStatus::Resolved),
            Err(LoopHubError::Conflict(_))
        ));
        // Closing frees the slot for a new report.
        assert!(h.service.report(&w.bob, target, "still bad").is_ok());
    }
}
