//! Command implementations for the LoopHub CLI.

use crate::api::{NotificationListParams, PageParams, ThreadListParams};
use crate::cli::args::{PageArgs, QueueCommand};
use crate::cli::utils::{
    clear_token, format_age, format_timestamp, password_or_prompt, preview, read_token,
    write_token,
};
use crate::client::{ClientError, LoopHubClient};
use crate::error::{LoopHubError, Result};
use crate::forum::types::current_timestamp_millis;
use crate::forum::{
    CommentId, CommentNode, CommentSort, NewComment, NewCommunity, NewPoll, NewThread, PollId,
    PollResults, ReactionKind, TargetRef, ThreadId, ThreadListItem, ThreadSort, ThreadView,
    VoteDirection,
};
use crate::offline::{
    self, CacheLookup, Connectivity, Enqueued, OfflineStore, PendingAction, QueuedAction,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// State shared by all commands: the client and the lazily opened offline
/// store.
pub struct Context {
    state_dir: PathBuf,
    client: LoopHubClient,
    store: Option<OfflineStore>,
}

impl Context {
    pub fn new(server: &str, state_dir: PathBuf) -> Result<Self> {
        let token = read_token(&state_dir)?;
        let client = LoopHubClient::new(server)?.with_token(token);
        Ok(Self {
            state_dir,
            client,
            store: None,
        })
    }

    fn store(&mut self) -> Result<&OfflineStore> {
        if self.store.is_none() {
            self.store = Some(OfflineStore::open(&self.state_dir)?);
        }
        self.store
            .as_ref()
            .ok_or_else(|| LoopHubError::storage("Offline store unavailable"))
    }

    fn require_login(&self) -> Result<()> {
        if self.client.token().is_none() {
            return Err(LoopHubError::unauthorized(
                "Not logged in; run `loophub login <username>` first",
            ));
        }
        Ok(())
    }

    /// Replays older queued actions before a direct write. Returns false
    /// when some are still waiting, in which case the write must be queued.
    async fn flush_queue(&mut self) -> Result<bool> {
        let now = current_timestamp_millis();
        let mut queue = self.store()?.queue();
        offline::flush_before_write(&mut queue, &self.client, now).await
    }

    /// Queues `action` instead of sending it. `why` is shown to the user.
    fn queue_action(&mut self, action: PendingAction, why: &str) -> Result<()> {
        debug!(why, "Queueing {}", action.kind_name());
        let now = current_timestamp_millis();
        let mut queue = self.store()?.queue();
        match queue.enqueue(action, now)? {
            Enqueued::Queued(seq) => {
                println!("{}; queued as #{}. Run `loophub sync` later.", why, seq)
            }
            Enqueued::Replaced(seq) => println!("{}; updated queued vote #{}.", why, seq),
            Enqueued::Cancelled(seq) => {
                println!("{}; cancelled queued reaction #{}.", why, seq)
            }
        }
        Ok(())
    }

    fn queue_unreachable(&mut self, action: PendingAction, err: &ClientError) -> Result<()> {
        debug!(%err, "Server unreachable");
        self.queue_action(action, "Server unreachable")
    }

    fn cache_put<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let now = current_timestamp_millis();
        self.store()?.cache().put(key, value, now)
    }

    /// Serves `key` from the cache after a failed fetch, or returns the
    /// fetch error when nothing usable is cached.
    fn cached<T: DeserializeOwned>(&mut self, key: &str, err: ClientError) -> Result<T> {
        let now = current_timestamp_millis();
        let cache = self.store()?.cache();
        match cache.get::<T>(key, now)? {
            CacheLookup::Fresh(value) => {
                println!("(offline: showing cached copy)");
                Ok(value)
            }
            CacheLookup::Stale { value, age_ms } => {
                println!(
                    "(offline: showing cached copy from {} ago, may be out of date)",
                    format_age(age_ms)
                );
                Ok(value)
            }
            CacheLookup::Miss => match cache.fetched_at(key)? {
                Some(at) => Err(LoopHubError::network(format!(
                    "{} (last synced {}, too old to show)",
                    err,
                    format_timestamp(at)
                ))),
                None => Err(err.into()),
            },
        }
    }
}

/// Message used when a write is held back behind older queued actions.
const WAITING_BEHIND_QUEUE: &str = "Earlier offline actions are still waiting";

fn is_offline(err: &ClientError) -> bool {
    err.connectivity() == Connectivity::Offline
}

fn page_params(page: PageArgs) -> PageParams {
    PageParams {
        cursor: page.cursor,
        limit: page.limit,
    }
}

fn print_next_cursor(next: Option<&str>) {
    if let Some(cursor) = next {
        println!("\nMore: --cursor {}", cursor);
    }
}

// =============================================================================
// Accounts
// =============================================================================

pub async fn register(
    ctx: &mut Context,
    username: &str,
    display_name: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let password = password_or_prompt(password, "Choose a password")?;
    let profile = ctx
        .client
        .register(username, password.as_str(), display_name.as_deref())
        .await?;
    println!("Registered {} ({})", profile.username, profile.id);
    println!("Log in with `loophub login {}`", profile.username);
    Ok(())
}

pub async fn login(ctx: &mut Context, username: &str, password: Option<String>) -> Result<()> {
    let password = password_or_prompt(password, "Password")?;
    let result = ctx.client.login(username, password.as_str()).await?;
    write_token(&ctx.state_dir, &result.token)?;
    info!(user = %result.user.username, "Logged in");
    println!(
        "Logged in as {} (session valid until {})",
        result.user.username,
        format_timestamp(result.expires_at)
    );
    Ok(())
}

pub async fn logout(ctx: &mut Context) -> Result<()> {
    if ctx.client.token().is_some() {
        match ctx.client.logout().await {
            Ok(_) => {}
            // The local token goes away regardless.
            Err(err) => debug!(%err, "Server-side logout failed"),
        }
    }
    clear_token(&ctx.state_dir)?;
    ctx.client.set_token(None);
    println!("Logged out");
    Ok(())
}

pub async fn whoami(ctx: &mut Context) -> Result<()> {
    ctx.require_login()?;
    let profile = ctx.client.whoami().await?;
    let level = profile.level();
    println!("{} ({})", profile.shown_name(), profile.username);
    println!("  id:     {}", profile.id);
    println!("  karma:  {}", profile.karma);
    println!("  level:  {} {}", level.number, level.name);
    if profile.is_admin {
        println!("  admin");
    }
    println!("  joined: {}", format_timestamp(profile.created_at));
    Ok(())
}

pub async fn level(ctx: &mut Context, username: Option<&str>) -> Result<()> {
    if username.is_none() {
        ctx.require_login()?;
    }
    let result = ctx.client.level(username).await?;
    println!(
        "{}: level {} {} ({} karma)",
        result.username, result.level.number, result.level.name, result.karma
    );
    match &result.next {
        Some(next) => {
            let filled = usize::from(result.percent / 10);
            println!(
                "  [{}{}] {}% to level {} {} ({} more karma)",
                "#".repeat(filled),
                "-".repeat(10 - filled.min(10)),
                result.percent,
                next.number,
                next.name,
                result.karma_needed
            );
        }
        None => println!("  Highest level reached"),
    }
    Ok(())
}

// =============================================================================
// Communities
// =============================================================================

pub async fn communities(ctx: &mut Context, page: PageArgs) -> Result<()> {
    let page = ctx.client.list_communities(page_params(page)).await?;
    if page.items.is_empty() {
        println!("No communities yet");
    }
    for community in &page.items {
        let private = if community.is_private { " [private]" } else { "" };
        println!(
            "{:<24} {} members, {} threads{}",
            community.slug, community.member_count, community.thread_count, private
        );
        if !community.description.is_empty() {
            println!("    {}", preview(&community.description, 70));
        }
    }
    print_next_cursor(page.next_cursor.as_deref());
    Ok(())
}

pub async fn create_community(
    ctx: &mut Context,
    slug: String,
    name: String,
    description: String,
    is_private: bool,
) -> Result<()> {
    ctx.require_login()?;
    let community = ctx
        .client
        .create_community(NewCommunity {
            slug,
            name,
            description,
            is_private,
        })
        .await?;
    println!("Created {} ({})", community.slug, community.id);
    Ok(())
}

pub async fn join(ctx: &mut Context, community: &str) -> Result<()> {
    ctx.require_login()?;
    let view = ctx.client.get_community(community).await?;
    let membership = ctx.client.join_community(view.community.id).await?;
    println!("Joined {} as {}", view.community.slug, membership.role);
    Ok(())
}

// =============================================================================
// Threads
// =============================================================================

fn print_thread_list(items: &[ThreadListItem]) {
    if items.is_empty() {
        println!("No threads");
    }
    for item in items {
        let thread = &item.thread;
        let mut flags = String::new();
        if thread.pinned {
            flags.push_str("[pinned] ");
        }
        if thread.locked {
            flags.push_str("[locked] ");
        }
        if thread.poll_id.is_some() {
            flags.push_str("[poll] ");
        }
        println!("{:>5}  {}{}", item.score, flags, preview(&thread.title, 70));
        println!(
            "       {} by {} · {} comments · {}",
            thread.id,
            item.author.username,
            thread.comment_count,
            format_timestamp(thread.created_at)
        );
    }
}

pub async fn threads(
    ctx: &mut Context,
    community: &str,
    sort: ThreadSort,
    page: PageArgs,
) -> Result<()> {
    // Only the first page is cached.
    let cacheable = page.cursor.is_none();
    let key = format!("threads:{}:{}", community, sort);

    let fetched = async {
        let view = ctx.client.get_community(community).await?;
        ctx.client
            .list_threads(ThreadListParams {
                community_id: view.community.id,
                sort,
                page: page_params(page),
            })
            .await
    }
    .await;

    let page = match fetched {
        Ok(page) => {
            if cacheable {
                ctx.cache_put(&key, &page)?;
            }
            page
        }
        Err(err) if is_offline(&err) && cacheable => ctx.cached(&key, err)?,
        Err(err) => return Err(err.into()),
    };

    print_thread_list(&page.items);
    print_next_cursor(page.next_cursor.as_deref());
    Ok(())
}

/// A thread with its comment tree, as cached for offline reading.
#[derive(Debug, Serialize, Deserialize)]
struct ThreadSnapshot {
    view: ThreadView,
    comments: Vec<CommentNode>,
}

fn print_poll(results: &PollResults) {
    let poll = &results.poll;
    let mode = if poll.multiple_choice {
        "multiple choice"
    } else {
        "single choice"
    };
    let state = if results.closed { ", closed" } else { "" };
    println!("\nPoll {}: {} ({}{})", poll.id, poll.question, mode, state);
    for (i, option) in poll.options.iter().enumerate() {
        let count = results.counts.get(i).copied().unwrap_or_default();
        let percent = results.percentages.get(i).copied().unwrap_or_default();
        let mine = if results.your_choices.contains(&(i as u32)) {
            "*"
        } else {
            " "
        };
        println!(
            "  {}{}. {:<30} {:>4} ({}%)",
            mine,
            i + 1,
            option,
            count,
            percent
        );
    }
    println!("  {} voters", results.total_voters);
}

fn print_comments(nodes: &[CommentNode], indent: usize) {
    for node in nodes {
        let pad = "  ".repeat(indent);
        let comment = &node.comment;
        let edited = if comment.edited_at.is_some() {
            " (edited)"
        } else {
            ""
        };
        println!(
            "{}[{}] {} · {}{} · {}",
            pad,
            node.score,
            node.author.username,
            format_timestamp(comment.created_at),
            edited,
            comment.id
        );
        for line in comment.body.lines() {
            println!("{}  {}", pad, line);
        }
        print_comments(&node.replies, indent + 1);
    }
}

pub async fn show(ctx: &mut Context, thread_id: &str, sort: CommentSort) -> Result<()> {
    let id: ThreadId = thread_id.parse()?;
    let key = format!("thread:{}", id);

    let fetched = async {
        let view = ctx.client.get_thread(id).await?;
        let comments = ctx.client.list_comments(id, sort).await?;
        Ok::<_, ClientError>(ThreadSnapshot { view, comments })
    }
    .await;

    let snapshot = match fetched {
        Ok(snapshot) => {
            ctx.cache_put(&key, &snapshot)?;
            snapshot
        }
        Err(err) if is_offline(&err) => ctx.cached(&key, err)?,
        Err(err) => return Err(err.into()),
    };

    let ThreadSnapshot { view, comments } = snapshot;
    let thread = &view.thread;
    println!("{}", thread.title);
    println!(
        "in {} by {} ({}) · score {} · {}",
        view.community_slug,
        view.author.username,
        view.author.level_name,
        view.score,
        format_timestamp(thread.created_at)
    );
    if !thread.tags.is_empty() {
        println!("tags: {}", thread.tags.join(", "));
    }
    if thread.locked {
        println!("[locked]");
    }
    println!();
    println!("{}", thread.body);
    let reactions = view.reactions.render();
    if !reactions.is_empty() {
        println!("\n{}", reactions);
    }
    if let Some(poll) = &view.poll {
        print_poll(poll);
    }
    println!("\n{} comments", thread.comment_count);
    print_comments(&comments, 0);
    Ok(())
}

pub struct PostArgs {
    pub community: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub poll: Option<NewPoll>,
}

pub async fn post(ctx: &mut Context, args: PostArgs) -> Result<()> {
    ctx.require_login()?;
    let view = ctx.client.get_community(&args.community).await?;
    let mut input = NewThread::new(view.community.id, args.title, args.body).with_tags(args.tags);
    if let Some(poll) = args.poll {
        input = input.with_poll(poll);
    }
    let thread = ctx.client.create_thread(input).await?;
    println!("Posted thread {}", thread.id);
    Ok(())
}

// =============================================================================
// Offline-capable writes
// =============================================================================

pub async fn comment(
    ctx: &mut Context,
    thread_id: &str,
    body: String,
    parent: Option<&str>,
) -> Result<()> {
    ctx.require_login()?;
    let thread_id: ThreadId = thread_id.parse()?;
    let parent_id = parent.map(str::parse::<CommentId>).transpose()?;
    let input = NewComment {
        thread_id,
        parent_id,
        body,
    };
    let action = PendingAction::CreateComment {
        thread_id,
        parent_id,
        body: input.body.clone(),
    };
    if !ctx.flush_queue().await? {
        return ctx.queue_action(action, WAITING_BEHIND_QUEUE);
    }

    match ctx.client.create_comment(input).await {
        Ok(comment) => {
            println!("Commented {}", comment.id);
            Ok(())
        }
        Err(err) if is_offline(&err) => ctx.queue_unreachable(action, &err),
        Err(err) => Err(err.into()),
    }
}

pub async fn vote(
    ctx: &mut Context,
    kind: &str,
    id: &str,
    direction: VoteDirection,
) -> Result<()> {
    ctx.require_login()?;
    let target = TargetRef::parse(kind, id)?;
    let action = PendingAction::Vote { target, direction };
    if !ctx.flush_queue().await? {
        return ctx.queue_action(action, WAITING_BEHIND_QUEUE);
    }
    match ctx.client.cast_vote(target, direction).await {
        Ok(outcome) => {
            println!(
                "Score of {} is now {} (+{} / -{})",
                outcome.target, outcome.score, outcome.upvotes, outcome.downvotes
            );
            Ok(())
        }
        Err(err) if is_offline(&err) => ctx.queue_unreachable(action, &err),
        Err(err) => Err(err.into()),
    }
}

pub async fn react(ctx: &mut Context, kind: &str, id: &str, reaction: ReactionKind) -> Result<()> {
    ctx.require_login()?;
    let target = TargetRef::parse(kind, id)?;
    let action = PendingAction::React {
        target,
        kind: reaction,
    };
    if !ctx.flush_queue().await? {
        return ctx.queue_action(action, WAITING_BEHIND_QUEUE);
    }
    match ctx.client.toggle_reaction(target, reaction).await {
        Ok(toggle) => {
            let verb = if toggle.added { "Added" } else { "Removed" };
            println!("{} {} on {}", verb, toggle.kind.emoji(), target);
            let summary = toggle.summary.render();
            if !summary.is_empty() {
                println!("  {}", summary);
            }
            Ok(())
        }
        Err(err) if is_offline(&err) => ctx.queue_unreachable(action, &err),
        Err(err) => Err(err.into()),
    }
}

pub async fn poll_vote(ctx: &mut Context, poll_id: &str, choices: Vec<u32>) -> Result<()> {
    ctx.require_login()?;
    let poll_id: PollId = poll_id.parse()?;
    // Options are numbered from 1 on the command line.
    let choices = choices
        .into_iter()
        .map(|c| {
            c.checked_sub(1)
                .ok_or_else(|| LoopHubError::validation("Poll options are numbered from 1"))
        })
        .collect::<Result<Vec<u32>>>()?;
    let results = ctx.client.vote_poll(poll_id, choices).await?;
    print_poll(&results);
    Ok(())
}

// =============================================================================
// Notifications
// =============================================================================

pub async fn notifications(
    ctx: &mut Context,
    unread_only: bool,
    mark_read: bool,
    page: PageArgs,
) -> Result<()> {
    ctx.require_login()?;
    let page = ctx
        .client
        .notifications(NotificationListParams {
            unread_only,
            page: page_params(page),
        })
        .await?;
    if page.items.is_empty() {
        println!("No notifications");
    }
    for notification in &page.items {
        let marker = if notification.read { " " } else { "•" };
        println!(
            "{} {} [{}] {}",
            marker,
            format_timestamp(notification.created_at),
            notification.kind,
            notification.message
        );
    }
    print_next_cursor(page.next_cursor.as_deref());

    if mark_read {
        let marked = ctx.client.mark_all_read().await?;
        println!("Marked {} as read", marked.count);
    }
    Ok(())
}

// =============================================================================
// Offline queue
// =============================================================================

fn print_queued(entry: &QueuedAction, now: u64) {
    let mut line = format!(
        "#{:<4} {:<8} {} (queued {} ago)",
        entry.seq,
        entry.action.kind_name(),
        entry.action,
        format_age(now.saturating_sub(entry.enqueued_at))
    );
    if entry.attempts > 0 {
        line.push_str(&format!(", {} attempts", entry.attempts));
    }
    println!("{}", line);
    if let Some(error) = &entry.last_error {
        println!("       last error: {}", error);
    }
}

pub fn queue(ctx: &mut Context, action: Option<QueueCommand>) -> Result<()> {
    let now = current_timestamp_millis();
    let mut queue = ctx.store()?.queue();
    match action {
        Some(QueueCommand::Retry { seq }) => {
            let new_seq = queue.retry_failed(seq, now)?;
            println!("Requeued #{} as #{}", seq, new_seq);
        }
        Some(QueueCommand::Discard { seq }) => {
            if queue.discard_failed(seq)? {
                println!("Discarded #{}", seq);
            } else {
                return Err(LoopHubError::not_found(format!("No failed action #{}", seq)));
            }
        }
        Some(QueueCommand::ClearFailed) => {
            let cleared = queue.clear_failed()?;
            println!("Cleared {} failed actions", cleared);
        }
        None => {
            let pending = queue.pending()?;
            let failed = queue.failed()?;
            if pending.is_empty() && failed.is_empty() {
                println!("Queue is empty");
                return Ok(());
            }
            if !pending.is_empty() {
                println!("Pending ({}):", pending.len());
                for entry in &pending {
                    print_queued(entry, now);
                }
            }
            if !failed.is_empty() {
                println!("Failed ({}):", failed.len());
                for entry in &failed {
                    print_queued(entry, now);
                }
            }
        }
    }
    Ok(())
}

pub async fn sync(ctx: &mut Context) -> Result<()> {
    ctx.require_login()?;
    let now = current_timestamp_millis();
    let store = ctx.store()?.clone();

    let purged = store.cache().purge_expired(now)?;
    if purged > 0 {
        debug!(purged, "Dropped expired cache entries");
    }

    let mut queue = store.queue();
    if queue.is_empty()? {
        println!("Nothing to sync");
        return Ok(());
    }

    let report = offline::replay(&mut queue, &ctx.client, now).await?;
    println!(
        "Delivered {}, retrying {}, failed {}, still queued {}",
        report.delivered, report.retried, report.failed, report.remaining
    );
    if report.went_offline {
        println!("Server is still unreachable");
    }
    if report.failed > 0 {
        println!("See `loophub queue` for failed actions");
    }
    Ok(())
}
