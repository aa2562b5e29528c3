//! Durable FIFO of actions waiting for the server.

use super::action::{backoff_delay_ms, PendingAction, QueuedAction};
use super::{CF_FAILED, CF_META, CF_PENDING, MAX_ATTEMPTS, QUEUE_CAPACITY};
use crate::error::{LoopHubError, Result};
use crate::storage::{BatchOp, RocksDbHandle};
use tracing::{debug, info, warn};

const META_NEXT_SEQ: &[u8] = b"next_seq";

/// What [`OfflineQueue::enqueue`] did with an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Appended at the given sequence number.
    Queued(u64),
    /// Overwrote the pending vote on the same target, keeping its place.
    Replaced(u64),
    /// Undid an identical pending reaction toggle; nothing is left to send.
    Cancelled(u64),
}

impl Enqueued {
    pub fn seq(self) -> u64 {
        match self {
            Enqueued::Queued(seq) | Enqueued::Replaced(seq) | Enqueued::Cancelled(seq) => seq,
        }
    }
}

/// Outcome of recording a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedAttempt {
    /// Stays queued until `next_attempt_at`.
    Retrying { next_attempt_at: u64 },
    /// Out of attempts; moved to the failed list.
    GaveUp,
}

fn seq_key(seq: u64) -> [u8; 8] {
    seq.to_be_bytes()
}

/// RocksDB-backed queue of [`PendingAction`]s.
///
/// Delivery order is the sequence order. Actions that exhaust their attempts
/// or are rejected by the server move to a separate failed list where the
/// user can inspect, retry or discard them.
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    db: RocksDbHandle,
}

impl OfflineQueue {
    pub(crate) fn new(db: RocksDbHandle) -> Self {
        Self { db }
    }

    fn next_seq(&self) -> Result<u64> {
        Ok(self.db.get::<u64>(CF_META, META_NEXT_SEQ)?.unwrap_or(1))
    }

    /// Appends a new action, applying the coalescing rules first:
    /// a vote replaces a pending vote on the same target, and a reaction
    /// toggle cancels a pending identical toggle.
    pub fn enqueue(&mut self, action: PendingAction, now: u64) -> Result<Enqueued> {
        let pending = self.pending()?;

        match &action {
            PendingAction::Vote { target, .. } => {
                let existing = pending.iter().find(|queued| {
                    matches!(&queued.action, PendingAction::Vote { target: t, .. } if t == target)
                });
                if let Some(existing) = existing {
                    let mut replaced = QueuedAction::new(existing.seq, action, now);
                    replaced.enqueued_at = existing.enqueued_at;
                    self.db.put(CF_PENDING, &seq_key(replaced.seq), &replaced)?;
                    debug!(seq = replaced.seq, "Replaced pending vote");
                    return Ok(Enqueued::Replaced(replaced.seq));
                }
            }
            PendingAction::React { .. } => {
                if let Some(existing) = pending.iter().find(|queued| queued.action == action) {
                    self.db.delete(CF_PENDING, &seq_key(existing.seq))?;
                    debug!(seq = existing.seq, "Cancelled pending reaction toggle");
                    return Ok(Enqueued::Cancelled(existing.seq));
                }
            }
            PendingAction::CreateComment { .. } => {}
        }

        if pending.len() >= QUEUE_CAPACITY {
            return Err(LoopHubError::queue_full(format!(
                "{} actions are already waiting; run sync once you are online",
                QUEUE_CAPACITY
            )));
        }

        let seq = self.next_seq()?;
        let queued = QueuedAction::new(seq, action, now);
        self.db.write_batch(vec![
            BatchOp::put(CF_PENDING, seq_key(seq).to_vec(), &queued)?,
            BatchOp::put(CF_META, META_NEXT_SEQ.to_vec(), &(seq + 1))?,
        ])?;
        info!(seq, kind = queued.action.kind_name(), "Queued offline action");
        Ok(Enqueued::Queued(seq))
    }

    /// All pending actions in delivery order.
    pub fn pending(&self) -> Result<Vec<QueuedAction>> {
        self.db.prefix_collect(CF_PENDING, &[])
    }

    /// The pending actions ready to send, in order. Stops at the first
    /// action still backing off so that later actions never overtake it.
    pub fn due(&self, now: u64) -> Result<Vec<QueuedAction>> {
        Ok(self
            .pending()?
            .into_iter()
            .take_while(|queued| queued.is_due(now))
            .collect())
    }

    pub fn get(&self, seq: u64) -> Result<Option<QueuedAction>> {
        self.db.get(CF_PENDING, &seq_key(seq))
    }

    fn load(&self, seq: u64) -> Result<QueuedAction> {
        self.get(seq)?
            .ok_or_else(|| LoopHubError::not_found(format!("No pending action #{}", seq)))
    }

    /// Removes an action the server accepted.
    pub fn mark_delivered(&mut self, seq: u64) -> Result<()> {
        self.db.delete(CF_PENDING, &seq_key(seq))?;
        debug!(seq, "Offline action delivered");
        Ok(())
    }

    /// Records a failed attempt and schedules the next one, or gives up
    /// after the last allowed attempt.
    pub fn mark_failed_attempt(&mut self, seq: u64, error: &str, now: u64) -> Result<FailedAttempt> {
        let mut queued = self.load(seq)?;
        queued.attempts += 1;
        queued.last_error = Some(error.to_string());

        if queued.attempts >= MAX_ATTEMPTS {
            self.move_to_failed(queued)?;
            return Ok(FailedAttempt::GaveUp);
        }

        queued.next_attempt_at = now.saturating_add(backoff_delay_ms(queued.attempts));
        self.db.put(CF_PENDING, &seq_key(seq), &queued)?;
        debug!(
            seq,
            attempts = queued.attempts,
            next_attempt_at = queued.next_attempt_at,
            "Offline action will be retried"
        );
        Ok(FailedAttempt::Retrying {
            next_attempt_at: queued.next_attempt_at,
        })
    }

    /// Moves an action the server rejected straight to the failed list.
    pub fn mark_rejected(&mut self, seq: u64, error: &str) -> Result<()> {
        let mut queued = self.load(seq)?;
        queued.attempts += 1;
        queued.last_error = Some(error.to_string());
        self.move_to_failed(queued)
    }

    fn move_to_failed(&mut self, queued: QueuedAction) -> Result<()> {
        warn!(
            seq = queued.seq,
            attempts = queued.attempts,
            error = queued.last_error.as_deref().unwrap_or(""),
            "Offline action failed"
        );
        self.db.write_batch(vec![
            BatchOp::delete(CF_PENDING, seq_key(queued.seq).to_vec()),
            BatchOp::put(CF_FAILED, seq_key(queued.seq).to_vec(), &queued)?,
        ])
    }

    /// Actions that will not be retried automatically.
    pub fn failed(&self) -> Result<Vec<QueuedAction>> {
        self.db.prefix_collect(CF_FAILED, &[])
    }

    /// Drops one failed action. Returns false if there was none.
    pub fn discard_failed(&mut self, seq: u64) -> Result<bool> {
        let key = seq_key(seq);
        if !self.db.exists(CF_FAILED, &key)? {
            return Ok(false);
        }
        self.db.delete(CF_FAILED, &key)?;
        Ok(true)
    }

    /// Drops every failed action.
    pub fn clear_failed(&mut self) -> Result<usize> {
        self.db.prefix_delete(CF_FAILED, &[])
    }

    /// Puts a failed action back at the end of the queue with fresh
    /// attempts. Returns its new sequence number.
    pub fn retry_failed(&mut self, seq: u64, now: u64) -> Result<u64> {
        let failed: QueuedAction = self
            .db
            .get(CF_FAILED, &seq_key(seq))?
            .ok_or_else(|| LoopHubError::not_found(format!("No failed action #{}", seq)))?;
        if self.len()? >= QUEUE_CAPACITY {
            return Err(LoopHubError::queue_full("The offline queue is full"));
        }

        let new_seq = self.next_seq()?;
        let queued = QueuedAction::new(new_seq, failed.action, now);
        self.db.write_batch(vec![
            BatchOp::delete(CF_FAILED, seq_key(seq).to_vec()),
            BatchOp::put(CF_PENDING, seq_key(new_seq).to_vec(), &queued)?,
            BatchOp::put(CF_META, META_NEXT_SEQ.to_vec(), &(new_seq + 1))?,
        ])?;
        info!(old_seq = seq, seq = new_seq, "Requeued failed action");
        Ok(new_seq)
    }

    /// Number of pending actions.
    pub fn len(&self) -> Result<usize> {
        self.db.count_prefix(CF_PENDING, &[])
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::{EntityId, ReactionKind, TargetRef, VoteDirection};
    use crate::offline::test_support::store;

    fn comment(body: &str) -> PendingAction {
        PendingAction::CreateComment {
            thread_id: EntityId::from_bytes([1; 16]),
            parent_id: None,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_fifo_order_and_persistence() {
        let (store, dir) = store();
        let mut queue = store.queue();
        for i in 0..3 {
            queue.enqueue(comment(&format!("c{}", i)), 1_000 + i).unwrap();
        }
        drop(queue);
        drop(store);

        let reopened = crate::offline::OfflineStore::open(dir.path()).unwrap();
        let queue = reopened.queue();
        let seqs: Vec<u64> = queue.pending().unwrap().iter().map(|q| q.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(queue.len().unwrap(), 3);
    }

    #[test]
    fn test_capacity() {
        let (store, _dir) = store();
        let mut queue = store.queue();
        for i in 0..QUEUE_CAPACITY {
            queue.enqueue(comment(&i.to_string()), 0).unwrap();
        }
        assert!(matches!(
            queue.enqueue(comment("one too many"), 0),
            Err(LoopHubError::QueueFull(_))
        ));
    }

    #[test]
    fn test_vote_coalescing_keeps_position() {
        let (store, _dir) = store();
        let mut queue = store.queue();
        let target = TargetRef::Thread(EntityId::new());
        let up = PendingAction::Vote {
            target,
            direction: VoteDirection::Up,
        };
        let down = PendingAction::Vote {
            target,
            direction: VoteDirection::Down,
        };

        assert_eq!(queue.enqueue(up, 10).unwrap(), Enqueued::Queued(1));
        queue.enqueue(comment("after"), 11).unwrap();
        assert_eq!(queue.enqueue(down.clone(), 12).unwrap(), Enqueued::Replaced(1));

        let pending = queue.pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].action, down);
        assert_eq!(pending[0].enqueued_at, 10);
    }

    #[test]
    fn test_reaction_toggle_cancels() {
        let (store, _dir) = store();
        let mut queue = store.queue();
        let target = TargetRef::Comment(EntityId::new());
        let laugh = PendingAction::React {
            target,
            kind: ReactionKind::Laugh,
        };
        let love = PendingAction::React {
            target,
            kind: ReactionKind::Love,
        };

        queue.enqueue(laugh.clone(), 0).unwrap();
        queue.enqueue(love, 0).unwrap();
        assert_eq!(queue.enqueue(laugh, 0).unwrap(), Enqueued::Cancelled(1));
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn test_backoff_then_give_up() {
        let (store, _dir) = store();
        let mut queue = store.queue();
        let seq = queue.enqueue(comment("flaky"), 0).unwrap().seq();

        let outcome = queue.mark_failed_attempt(seq, "timeout", 100).unwrap();
        assert_eq!(
            outcome,
            FailedAttempt::Retrying {
                next_attempt_at: 2_100
            }
        );
        assert!(queue.due(2_099).unwrap().is_empty());
        assert_eq!(queue.due(2_100).unwrap().len(), 1);

        for _ in 1..MAX_ATTEMPTS - 1 {
            assert!(matches!(
                queue.mark_failed_attempt(seq, "timeout", 0).unwrap(),
                FailedAttempt::Retrying { .. }
            ));
        }
        assert_eq!(
            queue.mark_failed_attempt(seq, "timeout", 0).unwrap(),
            FailedAttempt::GaveUp
        );
        assert!(queue.is_empty().unwrap());

        let failed = queue.failed().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempts, MAX_ATTEMPTS);
        assert_eq!(failed[0].last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_due_stops_at_backing_off_head() {
        let (store, _dir) = store();
        let mut queue = store.queue();
        let first = queue.enqueue(comment("first"), 0).unwrap().seq();
        queue.enqueue(comment("second"), 0).unwrap();
        queue.mark_failed_attempt(first, "503", 0).unwrap();

        assert!(queue.due(1_000).unwrap().is_empty());
        assert_eq!(queue.due(2_000).unwrap().len(), 2);
    }

    #[test]
    fn test_retry_and_discard_failed() {
        let (store, _dir) = store();
        let mut queue = store.queue();
        let a = queue.enqueue(comment("a"), 0).unwrap().seq();
        let b = queue.enqueue(comment("b"), 0).unwrap().seq();
        queue.mark_rejected(a, "Thread is locked").unwrap();
        queue.mark_rejected(b, "Thread is locked").unwrap();

        let new_seq = queue.retry_failed(a, 50).unwrap();
        assert!(new_seq > b);
        let pending = queue.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 0);

        assert!(queue.discard_failed(b).unwrap());
        assert!(!queue.discard_failed(b).unwrap());
        assert!(queue.failed().unwrap().is_empty());
        assert!(matches!(
            queue.retry_failed(b, 0),
            Err(LoopHubError::NotFound(_))
        ));
    }
}
