//! Delivery sweep over the message queue.
//!
//! Each sweep reclaims abandoned claims, then claims and sends up to one
//! batch of due jobs, one at a time, pausing between sends. Failures are
//! handled per job and never abort the batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::QueueConfig;
use crate::models::message::{Direction, Message};
use crate::persistence::conversation_repo::ConversationRepo;
use crate::persistence::db::Database;
use crate::persistence::message_repo::MessageRepo;
use crate::persistence::property_repo::PropertyRepo;
use crate::{AppError, Result};

use super::gateway::{Gateway, SendReceipt};
use super::pacer::Pacer;

/// Error recorded on jobs whose claim outlived the claim timeout.
pub const CLAIM_EXPIRED: &str = "claim expired";

/// Identity-migration attempts after a send before falling back to an
/// in-place status write.
const STATUS_WRITE_ATTEMPTS: u32 = 3;

/// Aggregate result of one delivery sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSweepSummary {
    /// Jobs claimed and attempted in this sweep.
    pub processed: u32,
    /// Eligible jobs left for a later sweep.
    pub left_in_queue: u64,
    /// Jobs accepted by the gateway.
    pub sent: u32,
    /// Jobs that failed and were rescheduled.
    pub delayed: u32,
    /// Jobs that exhausted their attempts.
    pub failed: u32,
    /// Abandoned claims routed through the retry policy.
    pub reclaimed: u32,
}

/// What happens to a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back to `pending`, due at `next_attempt_at`.
    Retry {
        /// Attempt count including the one that just failed.
        attempts: u32,
        /// New `scheduled_for`.
        next_attempt_at: DateTime<Utc>,
    },
    /// Attempts exhausted; freeze in `failed`.
    Fail {
        /// Attempt count including the one that just failed.
        attempts: u32,
    },
}

/// Apply the retry policy to `job` after a failed attempt at `now`.
///
/// The next due time is pushed past both `now` and the previous
/// `scheduled_for`, so it strictly increases on every retry.
#[must_use]
pub fn retry_decision(job: &Message, now: DateTime<Utc>, backoff: chrono::Duration) -> RetryDecision {
    let attempts = job.attempts.saturating_add(1);
    if attempts >= job.max_attempts {
        return RetryDecision::Fail { attempts };
    }
    RetryDecision::Retry {
        attempts,
        next_attempt_at: now.max(job.scheduled_for) + backoff,
    }
}

/// Sends due jobs through the gateway.
#[derive(Clone)]
pub struct QueueProcessor {
    messages: MessageRepo,
    properties: PropertyRepo,
    conversations: ConversationRepo,
    gateway: Arc<dyn Gateway>,
    pacer: Arc<dyn Pacer>,
    config: QueueConfig,
}

impl QueueProcessor {
    /// Create a processor over the shared database.
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn Gateway>,
        pacer: Arc<dyn Pacer>,
        config: QueueConfig,
    ) -> Self {
        Self {
            messages: MessageRepo::new(Arc::clone(&db)),
            properties: PropertyRepo::new(Arc::clone(&db)),
            conversations: ConversationRepo::new(db),
            gateway,
            pacer,
            config,
        }
    }

    /// Run one delivery sweep as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the eligible set cannot be read. Failures of
    /// individual jobs are recorded on the job and counted in the summary.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<QueueSweepSummary> {
        let started = Instant::now();
        let mut summary = QueueSweepSummary {
            reclaimed: self.reclaim_stale(now).await?,
            ..QueueSweepSummary::default()
        };

        let cutoff = now + secs(self.config.safety_margin_seconds);
        let eligible = self.messages.count_due(cutoff).await?;
        let batch = self
            .messages
            .list_due(cutoff, self.config.batch_size)
            .await?;

        let mut claimed: u64 = 0;
        for job in batch {
            if claimed > 0 {
                self.pacer.pause().await;
            }

            let at = elapsed_since(now, started);
            if !self.messages.claim(&job.id, at).await? {
                debug!(job_id = %job.id, "job claimed elsewhere; skipping");
                continue;
            }
            claimed += 1;
            summary.processed += 1;

            let span = info_span!("deliver", job_id = %job.id, property_id = %job.property_id);
            self.process_job(&job, started, now, &mut summary)
                .instrument(span)
                .await;
        }

        summary.left_in_queue = eligible.saturating_sub(claimed);
        info!(
            processed = summary.processed,
            left_in_queue = summary.left_in_queue,
            sent = summary.sent,
            delayed = summary.delayed,
            failed = summary.failed,
            reclaimed = summary.reclaimed,
            "queue sweep complete"
        );
        Ok(summary)
    }

    /// Put a `failed` job back in the queue, due at `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id, `AppError::Conflict`
    /// if the job is not `failed`, or `AppError::Db` on write failure.
    pub async fn retry_failed(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.messages.reset_for_retry(id, now).await?;
        info!(job_id = id, "failed job requeued");
        Ok(())
    }

    /// Persist the `sent` transition after the gateway accepted a job.
    ///
    /// The identity migration is retried a few times; if it keeps failing
    /// the row is marked `sent` in place so it never re-enters the retry
    /// pool. Returns `None` only when no status write succeeded.
    async fn record_sent(
        &self,
        job: &Message,
        provider_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Option<String> {
        for attempt in 1..=STATUS_WRITE_ATTEMPTS {
            match self.messages.mark_sent(job, provider_id, at).await {
                Ok(final_id) => return Some(final_id),
                Err(err) => warn!(attempt, %err, "status update after send failed"),
            }
        }
        match self.messages.mark_sent(job, None, at).await {
            Ok(final_id) => {
                warn!(
                    provider_id = provider_id.unwrap_or_default(),
                    "marked sent in place without provider id"
                );
                Some(final_id)
            }
            Err(err) => {
                error!(%err, "in-place status update failed");
                None
            }
        }
    }

    async fn process_job(
        &self,
        job: &Message,
        started: Instant,
        now: DateTime<Utc>,
        summary: &mut QueueSweepSummary,
    ) {
        match self.deliver(job).await {
            Ok(receipt) => {
                let at = elapsed_since(now, started);
                match self
                    .record_sent(job, receipt.provider_message_id.as_deref(), at)
                    .await
                {
                    Some(final_id) => {
                        info!(final_id = %final_id, "message sent");
                        summary.sent += 1;
                    }
                    None => {
                        error!("message sent but status could not be recorded");
                    }
                }

                if let Err(err) = self
                    .conversations
                    .record_activity(
                        &job.property_id,
                        &job.contact_number,
                        &job.body,
                        Direction::Outbound,
                        None,
                        at,
                    )
                    .await
                {
                    warn!(%err, "conversation summary update failed");
                }
            }
            Err(err) => {
                let at = elapsed_since(now, started);
                match self.record_failure(job, at, &err.to_string()).await {
                    Ok(RetryDecision::Retry { .. }) => summary.delayed += 1,
                    Ok(RetryDecision::Fail { .. }) => summary.failed += 1,
                    Err(db_err) => {
                        error!(%db_err, send_error = %err, "could not record delivery failure");
                    }
                }
            }
        }
    }

    async fn deliver(&self, job: &Message) -> Result<SendReceipt> {
        let property = self
            .properties
            .get(&job.property_id)
            .await?
            .ok_or_else(|| AppError::Config(format!("property {} not found", job.property_id)))?;
        let target = property.delivery_config()?;

        let timeout = Duration::from_secs(self.config.send_timeout_seconds);
        tokio::time::timeout(
            timeout,
            self.gateway.send(target, &job.contact_number, &job.body),
        )
        .await
        .map_err(|_| AppError::Gateway(format!("send timed out after {timeout:?}")))?
    }

    async fn record_failure(
        &self,
        job: &Message,
        now: DateTime<Utc>,
        error: &str,
    ) -> Result<RetryDecision> {
        let decision = retry_decision(job, now, secs(self.config.retry_backoff_seconds));
        match decision {
            RetryDecision::Retry {
                attempts,
                next_attempt_at,
            } => {
                self.messages
                    .schedule_retry(&job.id, attempts, next_attempt_at, error)
                    .await?;
                warn!(
                    job_id = %job.id,
                    attempts,
                    next_attempt_at = %next_attempt_at,
                    error,
                    "delivery failed; rescheduled"
                );
            }
            RetryDecision::Fail { attempts } => {
                self.messages.mark_failed(&job.id, attempts, error).await?;
                error!(job_id = %job.id, attempts, error, "delivery failed permanently");
            }
        }
        Ok(decision)
    }

    async fn reclaim_stale(&self, now: DateTime<Utc>) -> Result<u32> {
        let cutoff = now - secs(self.config.claim_timeout_seconds);
        let stale = self.messages.list_stale_claims(cutoff).await?;

        let mut reclaimed = 0;
        for job in &stale {
            match self.record_failure(job, now, CLAIM_EXPIRED).await {
                Ok(_) => reclaimed += 1,
                Err(err) => error!(job_id = %job.id, %err, "failed to reclaim stale job"),
            }
        }
        if reclaimed > 0 {
            warn!(reclaimed, "reclaimed abandoned claims");
        }
        Ok(reclaimed)
    }
}

fn secs(seconds: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX / 1000))
}

/// `now` advanced by the wall time spent in this sweep.
fn elapsed_since(now: DateTime<Utc>, started: Instant) -> DateTime<Utc> {
    now + chrono::Duration::from_std(started.elapsed()).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Spawn the embedded queue sweep loop.
#[must_use]
pub fn spawn_queue_task(
    processor: Arc<QueueProcessor>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("queue task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = processor.run_sweep(Utc::now()).await {
                        error!(%err, "queue sweep failed");
                    }
                }
            }
        }
    })
}
