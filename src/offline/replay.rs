//! Sending queued actions once the server is reachable again.

use super::action::PendingAction;
use super::queue::{FailedAttempt, OfflineQueue};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a delivery did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The server could not be reached at all.
    #[error("offline: {0}")]
    Offline(String),
    /// The server failed in a way that may pass on a later try.
    #[error("transient failure: {0}")]
    Transient(String),
    /// The server rejected the action; retrying will not help.
    #[error("rejected: {0}")]
    Permanent(String),
}

/// Something that can perform a queued action against the server.
#[async_trait]
pub trait ActionSink: Send + Sync {
    async fn deliver(&self, action: &PendingAction) -> std::result::Result<(), DeliveryError>;
}

/// Summary of one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub delivered: usize,
    /// Actions that failed transiently and were rescheduled.
    pub retried: usize,
    /// Actions moved to the failed list during this run.
    pub failed: usize,
    /// Pending actions left afterwards.
    pub remaining: usize,
    /// The run stopped because the server became unreachable.
    pub went_offline: bool,
}

/// Delivers due actions in queue order.
///
/// - `Offline` stops the run without consuming an attempt.
/// - `Transient` records a backoff attempt and stops, so nothing queued
///   later is delivered ahead of it.
/// - `Permanent` moves the action to the failed list and continues.
pub async fn replay<S>(queue: &mut OfflineQueue, sink: &S, now: u64) -> Result<ReplayReport>
where
    S: ActionSink + ?Sized,
{
    let mut report = ReplayReport::default();

    for queued in queue.due(now)? {
        match sink.deliver(&queued.action).await {
            Ok(()) => {
                queue.mark_delivered(queued.seq)?;
                report.delivered += 1;
            }
            Err(DeliveryError::Offline(reason)) => {
                debug!(seq = queued.seq, %reason, "Server unreachable, replay paused");
                report.went_offline = true;
                break;
            }
            Err(DeliveryError::Transient(reason)) => {
                match queue.mark_failed_attempt(queued.seq, &reason, now)? {
                    FailedAttempt::Retrying { .. } => report.retried += 1,
                    FailedAttempt::GaveUp => report.failed += 1,
                }
                break;
            }
            Err(DeliveryError::Permanent(reason)) => {
                warn!(seq = queued.seq, %reason, "Server rejected queued action");
                queue.mark_rejected(queued.seq, &reason)?;
                report.failed += 1;
            }
        }
    }

    report.remaining = queue.len()?;
    info!(
        delivered = report.delivered,
        retried = report.retried,
        failed = report.failed,
        remaining = report.remaining,
        "Replay finished"
    );
    Ok(report)
}

/// Replays whatever is due before a new write goes out. Returns whether the
/// queue is now clear. While older actions remain pending, a new write has to
/// be queued behind them rather than sent directly, or a later replay would
/// apply the older action on top of it.
pub async fn flush_before_write<S>(queue: &mut OfflineQueue, sink: &S, now: u64) -> Result<bool>
where
    S: ActionSink + ?Sized,
{
    if queue.is_empty()? {
        return Ok(true);
    }
    let report = replay(queue, sink, now).await?;
    Ok(report.remaining == 0)
}
