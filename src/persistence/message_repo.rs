//! Message repository for `SQLite` persistence.
//!
//! Messages are addressable by two keys: the primary `id` and the
//! gateway-assigned `provider_message_id` (unique secondary index).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::automation::TriggerEvent;
use crate::models::message::{Direction, Message, MessageStatus};
use crate::{AppError, Result};

use super::conversation_repo::{insert_contact_if_absent, upsert_activity, Activity};
use super::db::Database;
use super::{parse_opt_ts, parse_ts, to_u32, ts};

const COLUMNS: &str = "id, property_id, contact_number, body, direction, is_automated,
    trigger_event, stay_id, status, scheduled_for, attempts, max_attempts, error_message,
    claimed_at, provider_message_id, status_api, reaction, sent_at, created_at";

/// Repository wrapper around `SQLite` for message records.
#[derive(Clone)]
pub struct MessageRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    property_id: String,
    contact_number: String,
    body: String,
    direction: String,
    is_automated: i64,
    trigger_event: Option<String>,
    stay_id: Option<String>,
    status: String,
    scheduled_for: String,
    attempts: i64,
    max_attempts: i64,
    error_message: Option<String>,
    claimed_at: Option<String>,
    provider_message_id: Option<String>,
    status_api: Option<i64>,
    reaction: Option<String>,
    sent_at: Option<String>,
    created_at: String,
}

impl MessageRow {
    /// Convert a database row into the domain model.
    fn into_message(self) -> Result<Message> {
        let direction = Direction::parse(&self.direction)
            .ok_or_else(|| AppError::Db(format!("invalid direction: {}", self.direction)))?;
        let status = MessageStatus::parse(&self.status)
            .ok_or_else(|| AppError::Db(format!("invalid message status: {}", self.status)))?;
        let trigger_event = self
            .trigger_event
            .as_deref()
            .map(|raw| {
                TriggerEvent::parse(raw)
                    .ok_or_else(|| AppError::Db(format!("invalid trigger_event: {raw}")))
            })
            .transpose()?;

        Ok(Message {
            id: self.id,
            property_id: self.property_id,
            contact_number: self.contact_number,
            body: self.body,
            direction,
            is_automated: self.is_automated != 0,
            trigger_event,
            stay_id: self.stay_id,
            status,
            scheduled_for: parse_ts("scheduled_for", &self.scheduled_for)?,
            attempts: to_u32("attempts", self.attempts)?,
            max_attempts: to_u32("max_attempts", self.max_attempts)?,
            error_message: self.error_message,
            claimed_at: parse_opt_ts("claimed_at", self.claimed_at.as_deref())?,
            provider_message_id: self.provider_message_id,
            status_api: self.status_api,
            reaction: self.reaction,
            sent_at: parse_opt_ts("sent_at", self.sent_at.as_deref())?,
            created_at: parse_ts("created_at", &self.created_at)?,
        })
    }
}

/// Bind every column of `message` in `COLUMNS` order.
fn bind_all<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    message: &'q Message,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&message.id)
        .bind(&message.property_id)
        .bind(&message.contact_number)
        .bind(&message.body)
        .bind(message.direction.as_str())
        .bind(i64::from(message.is_automated))
        .bind(message.trigger_event.map(TriggerEvent::as_str))
        .bind(&message.stay_id)
        .bind(message.status.as_str())
        .bind(ts(message.scheduled_for))
        .bind(i64::from(message.attempts))
        .bind(i64::from(message.max_attempts))
        .bind(&message.error_message)
        .bind(message.claimed_at.map(ts))
        .bind(&message.provider_message_id)
        .bind(message.status_api)
        .bind(&message.reaction)
        .bind(message.sent_at.map(ts))
        .bind(ts(message.created_at))
}

impl MessageRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new message record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails, including on a duplicate id.
    pub async fn insert(&self, message: &Message) -> Result<Message> {
        let sql = format!(
            "INSERT INTO message ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
        );
        bind_all(sqlx::query(&sql), message)
            .execute(self.db.as_ref())
            .await?;

        Ok(message.clone())
    }

    /// Record a mirrored message together with its conversation summary and
    /// contact, all in one transaction.
    ///
    /// Returns `None` when the id or provider id is already stored (nothing
    /// is written), otherwise whether a new contact was created. A failure
    /// in any step rolls back the message too, so a redelivered event is
    /// processed in full.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any write fails.
    pub async fn insert_mirrored(
        &self,
        message: &Message,
        guest_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<bool>> {
        let sql = format!(
            "INSERT OR IGNORE INTO message ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
        );

        let mut tx = self.db.begin().await?;
        let inserted = bind_all(sqlx::query(&sql), message)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            == 1;
        if !inserted {
            tx.rollback().await?;
            return Ok(None);
        }

        upsert_activity(
            &mut tx,
            &Activity {
                property_id: &message.property_id,
                contact_number: &message.contact_number,
                body: &message.body,
                direction: message.direction,
                guest_id,
                at: now,
            },
        )
        .await?;
        let contact_created =
            insert_contact_if_absent(&mut tx, &message.property_id, &message.contact_number, now)
                .await?;
        tx.commit().await?;

        Ok(Some(contact_created))
    }

    /// Retrieve a message by its primary id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as("SELECT * FROM message WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(MessageRow::into_message).transpose()
    }

    /// Retrieve a message by the gateway-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_by_provider_id(&self, provider_id: &str) -> Result<Option<Message>> {
        let row: Option<MessageRow> =
            sqlx::query_as("SELECT * FROM message WHERE provider_message_id = ?1")
                .bind(provider_id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(MessageRow::into_message).transpose()
    }

    /// Resolve a key against the primary id first, then the provider id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if either query fails.
    pub async fn resolve(&self, key: &str) -> Result<Option<Message>> {
        if let Some(found) = self.get_by_id(key).await? {
            return Ok(Some(found));
        }
        self.find_by_provider_id(key).await
    }

    /// Count pending messages due at or before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_due(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM message WHERE status = 'pending' AND scheduled_for <= ?1",
        )
        .bind(ts(cutoff))
        .fetch_one(self.db.as_ref())
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// List pending messages due at or before `cutoff`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_due(&self, cutoff: DateTime<Utc>, limit: u32) -> Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT * FROM message WHERE status = 'pending' AND scheduled_for <= ?1 \
             ORDER BY scheduled_for ASC, created_at ASC LIMIT ?2",
        )
        .bind(ts(cutoff))
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }

    /// Atomically move a pending message to `processing`.
    ///
    /// Returns `false` if the message was no longer pending.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn claim(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE message SET status = 'processing', claimed_at = ?1 \
             WHERE id = ?2 AND status = 'pending'",
        )
        .bind(ts(now))
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// List `processing` messages whose claim was taken before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_stale_claims(&self, cutoff: DateTime<Utc>) -> Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT * FROM message WHERE status = 'processing' \
             AND (claimed_at IS NULL OR claimed_at < ?1)",
        )
        .bind(ts(cutoff))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }

    /// Record a successful send and return the id the message now lives under.
    ///
    /// When the gateway returned a canonical id different from the job id,
    /// the job is re-keyed under it: the payload is upserted at the provider
    /// id (keeping any ack/reaction already recorded there) and the original
    /// row is removed, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn mark_sent(
        &self,
        job: &Message,
        provider_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let Some(provider_id) = provider_id.filter(|pid| *pid != job.id) else {
            sqlx::query(
                "UPDATE message SET status = 'sent', sent_at = ?1, claimed_at = NULL, \
                 provider_message_id = COALESCE(?2, provider_message_id) WHERE id = ?3",
            )
            .bind(ts(now))
            .bind(provider_id)
            .bind(&job.id)
            .execute(self.db.as_ref())
            .await?;
            return Ok(job.id.clone());
        };

        let mut migrated = job.clone();
        migrated.id = provider_id.to_owned();
        migrated.provider_message_id = Some(provider_id.to_owned());
        migrated.status = MessageStatus::Sent;
        migrated.sent_at = Some(now);
        migrated.claimed_at = None;

        let sql = format!(
            "INSERT INTO message ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
             ON CONFLICT(id) DO UPDATE SET
                property_id = excluded.property_id,
                contact_number = excluded.contact_number,
                body = excluded.body,
                direction = excluded.direction,
                is_automated = excluded.is_automated,
                trigger_event = excluded.trigger_event,
                stay_id = excluded.stay_id,
                status = excluded.status,
                scheduled_for = excluded.scheduled_for,
                attempts = excluded.attempts,
                max_attempts = excluded.max_attempts,
                error_message = excluded.error_message,
                claimed_at = excluded.claimed_at,
                provider_message_id = excluded.provider_message_id,
                sent_at = excluded.sent_at,
                created_at = excluded.created_at"
        );

        let mut tx = self.db.begin().await?;
        bind_all(sqlx::query(&sql), &migrated)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM message WHERE id = ?1")
            .bind(&job.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(migrated.id)
    }

    /// Return a claimed message to the queue after a retryable failure.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn schedule_retry(
        &self,
        id: &str,
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE message SET status = 'pending', attempts = ?1, scheduled_for = ?2, \
             error_message = ?3, claimed_at = NULL WHERE id = ?4 AND status = 'processing'",
        )
        .bind(i64::from(attempts))
        .bind(ts(next_attempt_at))
        .bind(error)
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Freeze a claimed message in `failed` after its last attempt.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_failed(&self, id: &str, attempts: u32, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE message SET status = 'failed', attempts = ?1, error_message = ?2, \
             claimed_at = NULL WHERE id = ?3 AND status = 'processing'",
        )
        .bind(i64::from(attempts))
        .bind(error)
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Put a failed message back in the queue, due immediately.
    ///
    /// `attempts` is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the message does not exist,
    /// `AppError::Conflict` if it is not `failed`, or `AppError::Db` if the
    /// update fails.
    pub async fn reset_for_retry(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let current = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("message {id} not found")))?;

        if current.status != MessageStatus::Failed {
            return Err(AppError::Conflict(format!(
                "message {id} is {} and cannot be retried",
                current.status.as_str()
            )));
        }

        let result = sqlx::query(
            "UPDATE message SET status = 'pending', scheduled_for = ?1 \
             WHERE id = ?2 AND status = 'failed'",
        )
        .bind(ts(now))
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "message {id} changed state during retry"
            )));
        }
        Ok(())
    }

    /// Most recent outbound message for a contact that reached the network
    /// (or is being placed on it right now).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn latest_outbound_for_contact(
        &self,
        property_id: &str,
        contact_number: &str,
    ) -> Result<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as(
            "SELECT * FROM message WHERE property_id = ?1 AND contact_number = ?2 \
             AND direction = 'outbound' \
             AND status IN ('processing', 'sent', 'delivered', 'read') \
             ORDER BY COALESCE(sent_at, claimed_at, created_at) DESC LIMIT 1",
        )
        .bind(property_id)
        .bind(contact_number)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(MessageRow::into_message).transpose()
    }

    /// List a contact's thread, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_contact(
        &self,
        property_id: &str,
        contact_number: &str,
    ) -> Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT * FROM message WHERE property_id = ?1 AND contact_number = ?2 \
             ORDER BY created_at ASC",
        )
        .bind(property_id)
        .bind(contact_number)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }

    /// Overlay a gateway ack code.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn apply_ack(&self, id: &str, ack: i64) -> Result<()> {
        sqlx::query("UPDATE message SET status_api = ?1 WHERE id = ?2")
            .bind(ack)
            .bind(id)
            .execute(self.db.as_ref())
            .await?;

        Ok(())
    }

    /// Overlay a gateway reaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn apply_reaction(&self, id: &str, reaction: &str) -> Result<()> {
        sqlx::query("UPDATE message SET reaction = ?1 WHERE id = ?2")
            .bind(reaction)
            .bind(id)
            .execute(self.db.as_ref())
            .await?;

        Ok(())
    }
}
