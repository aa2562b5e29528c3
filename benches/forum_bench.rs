//! Benchmarks for listing, tree building, mentions and the storage path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use loophub::auth::Password;
use loophub::forum::comment::build_tree;
use loophub::forum::feed::sort_threads;
use loophub::forum::mention::extract_mentions;
use loophub::forum::{
    Comment, CommentId, CommentNode, CommentSort, CommunityId, ForumService, ForumStorage,
    ManualClock, NewComment, NewCommunity, NewThread, Thread, ThreadId, ThreadSort, UserId,
    UserSummary, VoteDirection,
};
use std::sync::Arc;
use tempfile::TempDir;

const START_MS: u64 = 1_750_000_000_000;

fn thread(i: u64) -> Thread {
    Thread {
        id: ThreadId::new(),
        community_id: CommunityId::new(),
        author_id: UserId::new(),
        title: format!("thread {}", i),
        body: String::new(),
        tags: Vec::new(),
        created_at: START_MS + i * 60_000,
        edited_at: None,
        upvotes: (i * 7) % 113,
        downvotes: (i * 3) % 17,
        comment_count: 0,
        pinned: false,
        locked: false,
        hidden: false,
        deleted: false,
        poll_id: None,
    }
}

/// A flat list of comments where every fourth one starts a new root and the
/// rest reply to the previous comment.
fn comment_nodes(count: usize) -> Vec<CommentNode> {
    let thread_id = ThreadId::new();
    let author = UserSummary::unknown(UserId::new());
    let mut nodes: Vec<CommentNode> = Vec::with_capacity(count);
    let mut parent: Option<(CommentId, u32)> = None;
    for i in 0..count {
        let (parent_id, depth) = match parent {
            Some((id, depth)) if i % 4 != 0 => (Some(id), depth + 1),
            _ => (None, 0),
        };
        let comment = Comment {
            id: CommentId::new(),
            thread_id,
            parent_id,
            author_id: author.id,
            body: format!("comment {}", i),
            depth,
            created_at: START_MS + i as u64,
            edited_at: None,
            upvotes: (i as u64 * 5) % 31,
            downvotes: (i as u64) % 7,
            hidden: false,
            deleted: false,
        };
        parent = Some((comment.id, depth));
        nodes.push(CommentNode::new(comment, author.clone(), VoteDirection::None));
    }
    nodes
}

fn bench_thread_sorting(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_sorting");
    let threads: Vec<Thread> = (0..1_000).map(thread).collect();
    for sort in [ThreadSort::New, ThreadSort::Hot, ThreadSort::Top] {
        group.bench_with_input(
            BenchmarkId::new("sort_1000", format!("{:?}", sort)),
            &sort,
            |b, sort| {
                b.iter(|| {
                    let mut batch = threads.clone();
                    sort_threads(black_box(&mut batch), *sort);
                    batch
                })
            },
        );
    }
    group.finish();
}

fn bench_comment_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("comment_tree");
    for size in [100usize, 1_000] {
        let nodes = comment_nodes(size);
        group.bench_with_input(BenchmarkId::new("build_best", size), &nodes, |b, nodes| {
            b.iter(|| build_tree(black_box(nodes.clone()), CommentSort::Best))
        });
    }
    group.finish();
}

fn bench_mentions(c: &mut Criterion) {
    let body = "Thanks @alice and @bob_42! See `@not_a_mention` and ask @Carol-Dev. "
        .repeat(50);
    c.bench_function("extract_mentions", |b| {
        b.iter(|| extract_mentions(black_box(&body)))
    });
}

fn bench_service_writes(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(START_MS));
    let mut service = ForumService::new(ForumStorage::new(dir.path()).unwrap(), clock.clone());
    let admin = service
        .register("admin", &Password::new("password123"), None)
        .unwrap()
        .id;
    let community = service
        .create_community(
            &admin,
            NewCommunity {
                slug: "bench".to_string(),
                name: "Bench".to_string(),
                description: String::new(),
                is_private: false,
            },
        )
        .unwrap()
        .id;
    let thread = service
        .create_thread(&admin, NewThread::new(community, "Bench", "body"))
        .unwrap()
        .id;

    c.bench_function("create_comment", |b| {
        b.iter(|| {
            clock.advance(1);
            service
                .create_comment(
                    &admin,
                    NewComment {
                        thread_id: thread,
                        parent_id: None,
                        body: "benchmark comment".to_string(),
                    },
                )
                .unwrap()
        })
    });

    c.bench_function("list_threads_hot", |b| {
        b.iter(|| {
            service
                .list_threads(None, &community, ThreadSort::Hot, None, None)
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_thread_sorting,
    bench_comment_tree,
    bench_mentions,
    bench_service_writes
);
criterion_main!(benches);
