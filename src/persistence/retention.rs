//! Retention service for time-based data purge.
//!
//! Runs as a background task deleting finished messages older than
//! `retention_days`. Queued and in-flight jobs are never touched.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::db::Database;
use super::ts;
use crate::Result;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Spawn the retention purge background task.
///
/// The task runs hourly until `cancel` fires.
#[must_use]
pub fn spawn_retention_task(
    db: Arc<Database>,
    retention_days: u32,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = purge(&db, retention_days, Utc::now()).await {
                        error!(?err, "retention purge failed");
                    }
                }
            }
        }
    })
}

/// Delete finished messages created before `now - retention_days`.
///
/// Returns the number of rows removed.
///
/// # Errors
///
/// Returns `AppError::Db` if the delete fails.
pub async fn purge(db: &Database, retention_days: u32, now: DateTime<Utc>) -> Result<u64> {
    let cutoff = now - chrono::Duration::days(i64::from(retention_days));

    let result = sqlx::query(
        "DELETE FROM message \
         WHERE status IN ('sent', 'delivered', 'read', 'failed', 'received') \
         AND created_at < ?1",
    )
    .bind(ts(cutoff))
    .execute(db)
    .await?;

    let removed = result.rows_affected();
    info!(retention_days, removed, "retention purge completed");
    Ok(removed)
}
