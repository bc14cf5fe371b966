//! Stay, guest, and cabin repository for `SQLite` persistence.
//!
//! Booking rows are owned by the booking domain; this subsystem only reads
//! them, except for the automation flag ledger written by the scheduler.

use std::sync::Arc;

use crate::models::conversation::normalize_number;
use crate::models::stay::{AutomationFlags, Cabin, Guest, Stay, StayStatus};
use crate::{AppError, Result};

use super::db::Database;
use super::{parse_date, to_u32};

/// Repository for stays and the guest/cabin rows they reference.
#[derive(Clone)]
pub struct StayRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct StayRow {
    id: String,
    property_id: String,
    guest_id: String,
    cabin_id: Option<String>,
    check_in: String,
    check_out: String,
    status: String,
    send_48h: i64,
    send_24h: i64,
    pre_checkin_sent: i64,
    pre_checkout_sent: i64,
    reminders_count: i64,
}

impl StayRow {
    fn into_stay(self) -> Result<Stay> {
        let status = StayStatus::parse(&self.status)
            .ok_or_else(|| AppError::Db(format!("invalid stay status: {}", self.status)))?;
        Ok(Stay {
            id: self.id,
            property_id: self.property_id,
            guest_id: self.guest_id,
            cabin_id: self.cabin_id,
            check_in: parse_date("check_in", &self.check_in)?,
            check_out: parse_date("check_out", &self.check_out)?,
            status,
            automation_flags: AutomationFlags {
                send_48h: self.send_48h != 0,
                send_24h: self.send_24h != 0,
                pre_checkin_sent: self.pre_checkin_sent != 0,
                pre_checkout_sent: self.pre_checkout_sent != 0,
                reminders_count: to_u32("reminders_count", self.reminders_count)?,
            },
        })
    }
}

#[derive(sqlx::FromRow)]
struct GuestRow {
    id: String,
    property_id: String,
    full_name: String,
    phone: Option<String>,
}

impl From<GuestRow> for Guest {
    fn from(row: GuestRow) -> Self {
        Self {
            id: row.id,
            property_id: row.property_id,
            full_name: row.full_name,
            phone: row.phone,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CabinRow {
    id: String,
    property_id: String,
    name: String,
}

impl From<CabinRow> for Cabin {
    fn from(row: CabinRow) -> Self {
        Self {
            id: row.id,
            property_id: row.property_id,
            name: row.name,
        }
    }
}

impl StayRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace a stay, including its flag ledger.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert_stay(&self, stay: &Stay) -> Result<()> {
        let flags = &stay.automation_flags;
        sqlx::query(
            "INSERT OR REPLACE INTO stay (id, property_id, guest_id, cabin_id, check_in, check_out,
             status, send_48h, send_24h, pre_checkin_sent, pre_checkout_sent, reminders_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&stay.id)
        .bind(&stay.property_id)
        .bind(&stay.guest_id)
        .bind(&stay.cabin_id)
        .bind(stay.check_in.format("%Y-%m-%d").to_string())
        .bind(stay.check_out.format("%Y-%m-%d").to_string())
        .bind(stay.status.as_str())
        .bind(i64::from(flags.send_48h))
        .bind(i64::from(flags.send_24h))
        .bind(i64::from(flags.pre_checkin_sent))
        .bind(i64::from(flags.pre_checkout_sent))
        .bind(i64::from(flags.reminders_count))
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Retrieve a stay by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_stay(&self, id: &str) -> Result<Option<Stay>> {
        let row: Option<StayRow> = sqlx::query_as("SELECT * FROM stay WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(StayRow::into_stay).transpose()
    }

    /// Stays of a tenant that the daily sweep must evaluate.
    ///
    /// Each row is converted on its own, so a malformed booking row yields
    /// an `Err` entry without hiding the rest of the tenant's stays.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_schedulable(&self, property_id: &str) -> Result<Vec<Result<Stay>>> {
        let rows: Vec<StayRow> = sqlx::query_as(
            "SELECT * FROM stay WHERE property_id = ?1 \
             AND status IN ('pending', 'pre_checkin_done', 'active') ORDER BY check_in",
        )
        .bind(property_id)
        .fetch_all(self.db.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id.clone();
                row.into_stay()
                    .map_err(|err| AppError::Db(format!("stay {id}: {err}")))
            })
            .collect())
    }

    /// Persist the automation flag ledger of a stay.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the stay does not exist, or
    /// `AppError::Db` if the update fails.
    pub async fn update_flags(&self, stay_id: &str, flags: &AutomationFlags) -> Result<()> {
        let result = sqlx::query(
            "UPDATE stay SET send_48h = ?1, send_24h = ?2, pre_checkin_sent = ?3, \
             pre_checkout_sent = ?4, reminders_count = ?5 WHERE id = ?6",
        )
        .bind(i64::from(flags.send_48h))
        .bind(i64::from(flags.send_24h))
        .bind(i64::from(flags.pre_checkin_sent))
        .bind(i64::from(flags.pre_checkout_sent))
        .bind(i64::from(flags.reminders_count))
        .bind(stay_id)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("stay {stay_id} not found")));
        }
        Ok(())
    }

    /// Insert or replace a guest. The phone is stored digits-only.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert_guest(&self, guest: &Guest) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO guest (id, property_id, full_name, phone) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&guest.id)
        .bind(&guest.property_id)
        .bind(&guest.full_name)
        .bind(guest.phone.as_deref().map(normalize_number))
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Retrieve a guest by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_guest(&self, id: &str) -> Result<Option<Guest>> {
        let row: Option<GuestRow> = sqlx::query_as("SELECT * FROM guest WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        Ok(row.map(Guest::from))
    }

    /// Find a tenant's guest by digits-only phone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_guest_by_phone(&self, property_id: &str, phone: &str) -> Result<Option<Guest>> {
        let row: Option<GuestRow> =
            sqlx::query_as("SELECT * FROM guest WHERE property_id = ?1 AND phone = ?2 LIMIT 1")
                .bind(property_id)
                .bind(phone)
                .fetch_optional(self.db.as_ref())
                .await?;

        Ok(row.map(Guest::from))
    }

    /// Insert or replace a cabin.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert_cabin(&self, cabin: &Cabin) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO cabin (id, property_id, name) VALUES (?1, ?2, ?3)")
            .bind(&cabin.id)
            .bind(&cabin.property_id)
            .bind(&cabin.name)
            .execute(self.db.as_ref())
            .await?;

        Ok(())
    }

    /// Retrieve a cabin by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_cabin(&self, id: &str) -> Result<Option<Cabin>> {
        let row: Option<CabinRow> = sqlx::query_as("SELECT * FROM cabin WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        Ok(row.map(Cabin::from))
    }
}
