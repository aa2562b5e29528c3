//! Moderation workflows: roles, bans, content actions and reports.

use loophub::auth::Password;
use loophub::forum::constants::HIDDEN_BODY;
use loophub::forum::{
    CommentSort, CommunityId, CommunityRole, ForumService, ForumStorage, ManualClock, ModAction,
    ModRequest, NewComment, NewCommunity, NewThread, NotificationKind, ReportStatus, TargetRef,
    ThreadId, ThreadSort, UserId,
};
use loophub::LoopHubError;
use std::sync::Arc;
use tempfile::TempDir;

const HOUR_MS: u64 = 60 * 60 * 1000;

/// A public community with a non-admin owner, a moderator and two members.
struct Setup {
    service: ForumService,
    clock: Arc<ManualClock>,
    community: CommunityId,
    owner: UserId,
    moderator: UserId,
    alice: UserId,
    bob: UserId,
    _dir: TempDir,
}

fn setup() -> Setup {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let storage = ForumStorage::new(dir.path()).expect("Failed to open storage");
    let clock = Arc::new(ManualClock::new(1_750_000_000_000));
    let mut service = ForumService::new(storage, clock.clone());

    let mut user = |name: &str| {
        service
            .register(name, &Password::new("password123"), None)
            .unwrap()
            .id
    };
    // The first account is the site admin; keep it out of the way.
    let _admin = user("admin");
    let owner = user("owner");
    let moderator = user("moderator");
    let alice = user("alice");
    let bob = user("bob");

    let mut account = service.storage().get_user(&owner).unwrap().unwrap();
    account.profile.karma = 200;
    service.storage().put_user(&account).unwrap();

    let community = service
        .create_community(
            &owner,
            NewCommunity {
                slug: "rust".to_string(),
                name: "Rust".to_string(),
                description: String::new(),
                is_private: false,
            },
        )
        .unwrap()
        .id;
    for member in [&moderator, &alice, &bob] {
        service.join_community(member, &community).unwrap();
    }
    service
        .moderate(
            &owner,
            ModRequest::new(community, ModAction::AddModerator).user(moderator),
        )
        .unwrap();

    Setup {
        service,
        clock,
        community,
        owner,
        moderator,
        alice,
        bob,
        _dir: dir,
    }
}

impl Setup {
    fn thread(&mut self, author: &UserId, title: &str) -> ThreadId {
        self.service
            .create_thread(author, NewThread::new(self.community, title, "body"))
            .unwrap()
            .id
    }

    fn act(&mut self, actor: &UserId, request: ModRequest) -> Result<(), LoopHubError> {
        self.service.moderate(actor, request).map(|_| ())
    }

    fn role(&self, user: &UserId) -> CommunityRole {
        self.service
            .list_members(None, &self.community)
            .unwrap()
            .into_iter()
            .find(|m| m.user.id == *user)
            .map(|m| m.role)
            .unwrap()
    }

    fn last_notification(&self, user: &UserId) -> NotificationKind {
        self.service
            .list_notifications(user, false, None, None)
            .unwrap()
            .items
            .first()
            .map(|n| n.kind)
            .unwrap()
    }
}

#[test]
fn test_only_owner_manages_moderators() {
    let mut s = setup();
    assert_eq!(s.role(&s.moderator), CommunityRole::Moderator);
    assert_eq!(s.last_notification(&s.moderator), NotificationKind::Moderation);

    let request = ModRequest::new(s.community, ModAction::AddModerator).user(s.alice);
    let moderator = s.moderator;
    let err = s.act(&moderator, request.clone()).unwrap_err();
    assert!(matches!(err, LoopHubError::PermissionDenied(_)));

    let owner = s.owner;
    s.act(&owner, request.clone()).unwrap();
    assert_eq!(s.role(&s.alice), CommunityRole::Moderator);

    // Only moderators can lose the role.
    let err = s
        .act(
            &owner,
            ModRequest::new(s.community, ModAction::RemoveModerator).user(s.bob),
        )
        .unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));

    let err = s
        .act(
            &owner,
            ModRequest::new(s.community, ModAction::RemoveModerator).user(owner),
        )
        .unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));
}

#[test]
fn test_hidden_thread_is_only_visible_to_moderators() {
    let mut s = setup();
    s.clock.advance(1_000);
    let alice = s.alice;
    let thread = s.thread(&alice, "Spam");

    let moderator = s.moderator;
    s.act(
        &moderator,
        ModRequest::new(s.community, ModAction::HideThread)
            .thread(thread)
            .reason("off topic"),
    )
    .unwrap();
    assert_eq!(s.last_notification(&alice), NotificationKind::Moderation);

    let err = s.service.get_thread(Some(&s.bob), &thread).unwrap_err();
    assert!(matches!(err, LoopHubError::NotFound(_)));
    assert!(s.service.get_thread(None, &thread).is_err());
    let view = s.service.get_thread(Some(&moderator), &thread).unwrap();
    assert!(view.thread.hidden);
    assert_eq!(view.thread.body, "body");

    let listed = s
        .service
        .list_threads(Some(&s.bob), &s.community, ThreadSort::New, None, None)
        .unwrap();
    assert!(listed.items.is_empty());

    // Hiding twice is a no-op, which is reported as an error.
    let err = s
        .act(
            &moderator,
            ModRequest::new(s.community, ModAction::HideThread).thread(thread),
        )
        .unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));

    let log = s.service.mod_log(Some(&s.bob), &s.community, None, None).unwrap();
    assert_eq!(log.items[0].action, ModAction::HideThread);
    assert_eq!(log.items[0].reason, "off topic");
    assert_eq!(log.items[1].action, ModAction::AddModerator);
}

#[test]
fn test_hidden_comment_keeps_its_place() {
    let mut s = setup();
    let alice = s.alice;
    let bob = s.bob;
    let thread = s.thread(&alice, "Discussion");
    let comment = s
        .service
        .create_comment(
            &bob,
            NewComment {
                thread_id: thread,
                parent_id: None,
                body: "rude".to_string(),
            },
        )
        .unwrap();

    let moderator = s.moderator;
    s.act(
        &moderator,
        ModRequest::new(s.community, ModAction::HideComment).comment(comment.id),
    )
    .unwrap();

    let tree = s
        .service
        .list_comments(Some(&alice), &thread, CommentSort::New)
        .unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].comment.body, HIDDEN_BODY);
    let tree = s
        .service
        .list_comments(Some(&moderator), &thread, CommentSort::New)
        .unwrap();
    assert_eq!(tree[0].comment.body, "rude");
}

#[test]
fn test_temporary_ban() {
    let mut s = setup();
    let bob = s.bob;
    let moderator = s.moderator;
    let entry = s
        .service
        .moderate(
            &moderator,
            ModRequest::new(s.community, ModAction::BanUser)
                .user(bob)
                .duration_hours(24),
        )
        .unwrap();
    assert!(entry.expires_at.is_some());
    assert_eq!(s.last_notification(&bob), NotificationKind::Moderation);

    let err = s
        .service
        .create_thread(&bob, NewThread::new(s.community, "Let me in", ""))
        .unwrap_err();
    assert!(matches!(err, LoopHubError::PermissionDenied(_)));

    let alice = s.alice;
    let thread = s.thread(&alice, "Open thread");
    let err = s
        .service
        .create_comment(
            &bob,
            NewComment {
                thread_id: thread,
                parent_id: None,
                body: "hello?".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, LoopHubError::PermissionDenied(_)));

    s.clock.advance(25 * HOUR_MS);
    assert!(s
        .service
        .create_thread(&bob, NewThread::new(s.community, "Back again", ""))
        .is_ok());
}

#[test]
fn test_ban_rules() {
    let mut s = setup();
    let moderator = s.moderator;
    let owner = s.owner;

    let err = s
        .act(
            &moderator,
            ModRequest::new(s.community, ModAction::BanUser).user(owner),
        )
        .unwrap_err();
    assert!(matches!(err, LoopHubError::PermissionDenied(_)));

    let err = s
        .act(
            &moderator,
            ModRequest::new(s.community, ModAction::BanUser).user(moderator),
        )
        .unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));

    // The owner may ban a moderator, who loses the role.
    s.act(
        &owner,
        ModRequest::new(s.community, ModAction::BanUser).user(moderator),
    )
    .unwrap();
    assert_eq!(s.role(&moderator), CommunityRole::Member);

    s.act(
        &owner,
        ModRequest::new(s.community, ModAction::UnbanUser).user(moderator),
    )
    .unwrap();
    let err = s
        .act(
            &owner,
            ModRequest::new(s.community, ModAction::UnbanUser).user(moderator),
        )
        .unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));
}

#[test]
fn test_locked_thread() {
    let mut s = setup();
    let alice = s.alice;
    let bob = s.bob;
    let moderator = s.moderator;
    let thread = s.thread(&alice, "Closed topic");
    s.act(
        &moderator,
        ModRequest::new(s.community, ModAction::LockThread).thread(thread),
    )
    .unwrap();

    let comment = |body: &str| NewComment {
        thread_id: thread,
        parent_id: None,
        body: body.to_string(),
    };
    let err = s.service.create_comment(&bob, comment("late")).unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));
    assert!(s.service.create_comment(&moderator, comment("final word")).is_ok());

    s.act(
        &moderator,
        ModRequest::new(s.community, ModAction::UnlockThread).thread(thread),
    )
    .unwrap();
    assert!(s.service.create_comment(&bob, comment("reopened")).is_ok());
}

#[test]
fn test_pins_lead_listings() {
    let mut s = setup();
    let alice = s.alice;
    let moderator = s.moderator;
    let mut threads = Vec::new();
    for i in 0..5 {
        threads.push(s.thread(&alice, &format!("thread {}", i)));
        s.clock.advance(1_000);
    }

    let pin = |thread: ThreadId| ModRequest::new(s.community, ModAction::PinThread).thread(thread);
    let requests: Vec<ModRequest> = threads.iter().map(|t| pin(*t)).collect();
    for request in requests.iter().take(3) {
        s.act(&moderator, request.clone()).unwrap();
    }
    let err = s.act(&moderator, requests[3].clone()).unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));

    let page = s
        .service
        .list_threads(None, &s.community, ThreadSort::New, None, None)
        .unwrap();
    let titles: Vec<String> = page.items.into_iter().map(|i| i.thread.title).collect();
    assert_eq!(
        titles,
        vec!["thread 0", "thread 1", "thread 2", "thread 4", "thread 3"]
    );

    s.act(
        &moderator,
        ModRequest::new(s.community, ModAction::UnpinThread).thread(threads[0]),
    )
    .unwrap();
    assert!(s.act(&moderator, requests[3].clone()).is_ok());
}

#[test]
fn test_report_lifecycle() {
    let mut s = setup();
    let alice = s.alice;
    let bob = s.bob;
    let moderator = s.moderator;
    let thread = s.thread(&alice, "Questionable");
    let target = TargetRef::Thread(thread);

    let err = s.service.report(&alice, target, "my own").unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));
    let err = s.service.report(&bob, target, "   ").unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));

    let report = s.service.report(&bob, target, "spam").unwrap();
    assert_eq!(report.status, ReportStatus::Open);
    let err = s.service.report(&bob, target, "still spam").unwrap_err();
    assert!(matches!(err, LoopHubError::Conflict(_)));

    let err = s.service.list_reports(&bob, &s.community, None).unwrap_err();
    assert!(matches!(err, LoopHubError::PermissionDenied(_)));
    let open = s
        .service
        .list_reports(&moderator, &s.community, Some(ReportStatus::Open))
        .unwrap();
    assert_eq!(open.len(), 1);

    let err = s
        .service
        .resolve_report(&moderator, &report.id, ReportStatus::Open)
        .unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));
    let resolved = s
        .service
        .resolve_report(&moderator, &report.id, ReportStatus::Resolved)
        .unwrap();
    assert_eq!(resolved.resolved_by, Some(moderator));
    assert_eq!(s.last_notification(&bob), NotificationKind::Moderation);

    let err = s
        .service
        .resolve_report(&moderator, &report.id, ReportStatus::Dismissed)
        .unwrap_err();
    assert!(matches!(err, LoopHubError::Conflict(_)));
    assert!(s
        .service
        .list_reports(&moderator, &s.community, Some(ReportStatus::Open))
        .unwrap()
        .is_empty());

    // With the first report closed, a new one may be filed.
    assert!(s.service.report(&bob, target, "again").is_ok());
}

#[test]
fn test_action_only_touches_its_own_target() {
    let mut s = setup();
    let alice = s.alice;
    let bob = s.bob;
    let moderator = s.moderator;
    let thread = s.thread(&alice, "Heated");
    let comment = s
        .service
        .create_comment(
            &bob,
            NewComment {
                thread_id: thread,
                parent_id: None,
                body: "rude".to_string(),
            },
        )
        .unwrap()
        .id;
    s.clock.advance(1_000);
    s.act(
        &moderator,
        ModRequest::new(s.community, ModAction::HideComment).comment(comment),
    )
    .unwrap();

    // A thread action carrying a stray comment target is rejected outright.
    s.clock.advance(1_000);
    let err = s
        .act(
            &moderator,
            ModRequest::new(s.community, ModAction::LockThread)
                .thread(thread)
                .comment(comment),
        )
        .unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));
    let err = s
        .act(
            &moderator,
            ModRequest::new(s.community, ModAction::UnhideComment)
                .comment(comment)
                .thread(thread),
        )
        .unwrap_err();
    assert!(matches!(err, LoopHubError::Validation(_)));

    let view = s.service.get_thread(Some(&moderator), &thread).unwrap();
    assert!(!view.thread.locked);
    let tree = s
        .service
        .list_comments(Some(&alice), &thread, CommentSort::New)
        .unwrap();
    assert_eq!(tree[0].comment.body, HIDDEN_BODY);
    let log = s.service.mod_log(None, &s.community, None, None).unwrap();
    assert_eq!(log.items[0].action, ModAction::HideComment);

    s.act(
        &moderator,
        ModRequest::new(s.community, ModAction::LockThread).thread(thread),
    )
    .unwrap();
    assert!(s.service.get_thread(None, &thread).unwrap().thread.locked);
    let tree = s
        .service
        .list_comments(Some(&alice), &thread, CommentSort::New)
        .unwrap();
    assert_eq!(tree[0].comment.body, HIDDEN_BODY);
}

#[test]
fn test_restriction_starts_below_threshold() {
    let mut s = setup();
    let alice = s.alice;
    let bob = s.bob;
    let set_karma = |s: &Setup, user: &UserId, karma: i64| {
        let mut account = s.service.storage().get_user(user).unwrap().unwrap();
        account.profile.karma = karma;
        s.service.storage().put_user(&account).unwrap();
    };

    set_karma(&s, &alice, -20);
    let thread = s.thread(&alice, "Still allowed");

    set_karma(&s, &alice, -21);
    let err = s
        .service
        .create_thread(&alice, NewThread::new(s.community, "Not any more", ""))
        .unwrap_err();
    assert!(matches!(err, LoopHubError::PermissionDenied(_)));
    // Restricted users keep their voice in comments.
    assert!(s
        .service
        .create_comment(
            &alice,
            NewComment {
                thread_id: thread,
                parent_id: None,
                body: "sorry".to_string(),
            },
        )
        .is_ok());

    set_karma(&s, &bob, -20);
    assert_eq!(s.service.level_progress(&bob).unwrap().level.number, 1);
    set_karma(&s, &bob, -21);
    assert_eq!(s.service.level_progress(&bob).unwrap().level.number, 0);
}
