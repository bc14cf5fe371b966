//! Conversation index and contact repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::conversation::{Contact, Conversation};
use crate::models::message::Direction;
use crate::{AppError, Result};

use super::db::Database;
use super::{parse_ts, to_u32, ts};

/// Repository for per-contact conversation summaries and contacts.
#[derive(Clone)]
pub struct ConversationRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ConversationRow {
    property_id: String,
    contact_number: String,
    guest_id: Option<String>,
    last_message: String,
    last_direction: String,
    updated_at: String,
    unread: i64,
}

impl ConversationRow {
    fn into_conversation(self) -> Result<Conversation> {
        let last_direction = Direction::parse(&self.last_direction).ok_or_else(|| {
            AppError::Db(format!("invalid last_direction: {}", self.last_direction))
        })?;
        Ok(Conversation {
            property_id: self.property_id,
            contact_number: self.contact_number,
            guest_id: self.guest_id,
            last_message: self.last_message,
            last_direction,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            unread: to_u32("unread", self.unread)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    property_id: String,
    number: String,
    name: Option<String>,
    is_guest: i64,
    guest_id: Option<String>,
    created_at: String,
}

impl ContactRow {
    fn into_contact(self) -> Result<Contact> {
        Ok(Contact {
            property_id: self.property_id,
            number: self.number,
            name: self.name,
            is_guest: self.is_guest != 0,
            guest_id: self.guest_id,
            created_at: parse_ts("created_at", &self.created_at)?,
        })
    }
}

impl ConversationRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Upsert the conversation summary for a contact.
    ///
    /// `unread` is incremented only for inbound messages. An existing guest
    /// link is kept when `guest_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn record_activity(
        &self,
        property_id: &str,
        contact_number: &str,
        body: &str,
        direction: Direction,
        guest_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        upsert_activity(
            &mut conn,
            &Activity {
                property_id,
                contact_number,
                body,
                direction,
                guest_id,
                at,
            },
        )
        .await
    }

    /// Retrieve the conversation summary for a contact.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, property_id: &str, contact_number: &str) -> Result<Option<Conversation>> {
        let row: Option<ConversationRow> = sqlx::query_as(
            "SELECT * FROM conversation WHERE property_id = ?1 AND contact_number = ?2",
        )
        .bind(property_id)
        .bind(contact_number)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(ConversationRow::into_conversation).transpose()
    }

    /// Retrieve a contact.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_contact(&self, property_id: &str, number: &str) -> Result<Option<Contact>> {
        let row: Option<ContactRow> =
            sqlx::query_as("SELECT * FROM contact WHERE property_id = ?1 AND number = ?2")
                .bind(property_id)
                .bind(number)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(ContactRow::into_contact).transpose()
    }
}

/// One message's effect on its conversation summary.
pub(crate) struct Activity<'a> {
    pub property_id: &'a str,
    pub contact_number: &'a str,
    pub body: &'a str,
    pub direction: Direction,
    pub guest_id: Option<&'a str>,
    pub at: DateTime<Utc>,
}

/// Upsert the conversation summary on `conn`, which may be inside a
/// transaction. `unread` grows only for inbound messages.
pub(crate) async fn upsert_activity(
    conn: &mut SqliteConnection,
    activity: &Activity<'_>,
) -> Result<()> {
    let unread_delta = i64::from(activity.direction == Direction::Inbound);

    sqlx::query(
        "INSERT INTO conversation (property_id, contact_number, guest_id, last_message,
         last_direction, updated_at, unread)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(property_id, contact_number) DO UPDATE SET
            guest_id = COALESCE(excluded.guest_id, conversation.guest_id),
            last_message = excluded.last_message,
            last_direction = excluded.last_direction,
            updated_at = excluded.updated_at,
            unread = conversation.unread + ?7",
    )
    .bind(activity.property_id)
    .bind(activity.contact_number)
    .bind(activity.guest_id)
    .bind(activity.body)
    .bind(activity.direction.as_str())
    .bind(ts(activity.at))
    .bind(unread_delta)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Create a minimal non-guest contact on `conn` unless one exists.
pub(crate) async fn insert_contact_if_absent(
    conn: &mut SqliteConnection,
    property_id: &str,
    number: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO contact (property_id, number, name, is_guest, guest_id, created_at)
         VALUES (?1, ?2, NULL, 0, NULL, ?3)",
    )
    .bind(property_id)
    .bind(number)
    .bind(ts(now))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
