//! Ranking for thread listings.

use crate::forum::thread::{Thread, ThreadSort};
use std::cmp::Ordering;

/// 2024-01-01T00:00:00Z in seconds; the zero point of the time term.
pub const HOT_EPOCH_SECS: i64 = 1_704_067_200;

/// Seconds of age worth one order of magnitude of score.
pub const HOT_DECAY_SECS: f64 = 45_000.0;

/// Log-scaled score plus a time term, so newer threads need fewer votes to
/// rank alongside older ones.
pub fn hot_score(score: i64, created_at_ms: u64) -> f64 {
    let order = (score.unsigned_abs().max(1) as f64).log10();
    let sign = score.signum() as f64;
    let seconds = (created_at_ms / 1000) as i64 - HOT_EPOCH_SECS;
    sign * order + seconds as f64 / HOT_DECAY_SECS
}

/// Newer first, then by ID so the order is total.
fn newest_first(a: &Thread, b: &Thread) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Sorts in place. Pinned threads are not special-cased here; listings put
/// them first separately.
pub fn sort_threads(threads: &mut [Thread], sort: ThreadSort) {
    match sort {
        ThreadSort::New => threads.sort_by(newest_first),
        ThreadSort::Top => threads.sort_by(|a, b| {
            b.score()
                .cmp(&a.score())
                .then_with(|| newest_first(a, b))
        }),
        ThreadSort::Hot => threads.sort_by(|a, b| {
            let ha = hot_score(a.score(), a.created_at);
            let hb = hot_score(b.score(), b.created_at);
            hb.partial_cmp(&ha)
                .unwrap_or(Ordering::Equal)
                .then_with(|| newest_first(a, b))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::types::{CommunityId, ThreadId, UserId};

    const HOUR_MS: u64 = 3_600_000;
    const BASE_MS: u64 = HOT_EPOCH_SECS as u64 * 1000 + 100 * HOUR_MS;

    fn thread(upvotes: u64, downvotes: u64, created_at: u64) -> Thread {
        Thread {
            id: ThreadId::new(),
            community_id: CommunityId::new(),
            author_id: UserId::new(),
            title: "t".to_string(),
            body: String::new(),
            tags: vec![],
            created_at,
            edited_at: None,
            upvotes,
            downvotes,
            comment_count: 0,
            pinned: false,
            locked: false,
            hidden: false,
            deleted: false,
            poll_id: None,
        }
    }

    #[test]
    fn test_hot_score_shape() {
        assert_eq!(hot_score(0, HOT_EPOCH_SECS as u64 * 1000), 0.0);
        assert!((hot_score(100, HOT_EPOCH_SECS as u64 * 1000) - 2.0).abs() < 1e-9);
        assert!((hot_score(-10, HOT_EPOCH_SECS as u64 * 1000) + 1.0).abs() < 1e-9);
        // 12.5 hours later is worth one more order of magnitude.
        let later = HOT_EPOCH_SECS as u64 * 1000 + 45_000_000;
        assert!((hot_score(1, later) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sort_new_and_top() {
        let old_popular = thread(50, 0, BASE_MS);
        let new_quiet = thread(1, 0, BASE_MS + HOUR_MS);
        let mut threads = vec![old_popular.clone(), new_quiet.clone()];

        sort_threads(&mut threads, ThreadSort::New);
        assert_eq!(threads[0].id, new_quiet.id);

        sort_threads(&mut threads, ThreadSort::Top);
        assert_eq!(threads[0].id, old_popular.id);
    }

    #[test]
    fn test_hot_prefers_recent_activity() {
        let day_old = thread(20, 0, BASE_MS);
        let fresh = thread(5, 0, BASE_MS + 24 * HOUR_MS);
        let mut threads = vec![day_old.clone(), fresh.clone()];
        sort_threads(&mut threads, ThreadSort::Hot);
        assert_eq!(threads[0].id, fresh.id);
    }

    #[test]
    fn test_ties_break_on_newer() {
        let a = thread(3, 0, BASE_MS);
        let b = thread(3, 0, BASE_MS + 1000);
        let mut threads = vec![a.clone(), b.clone()];
        sort_threads(&mut threads, ThreadSort::Top);
        assert_eq!(threads[0].id, b.id);
    }
}
