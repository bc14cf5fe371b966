//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS`, so it is safe to
//! re-run on every server startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS property (
    id                TEXT PRIMARY KEY NOT NULL,
    name              TEXT NOT NULL,
    timezone          TEXT,
    whatsapp_enabled  INTEGER NOT NULL DEFAULT 0,
    whatsapp_api_url  TEXT,
    whatsapp_token    TEXT
);

CREATE TABLE IF NOT EXISTS automation_rule (
    property_id     TEXT NOT NULL,
    trigger         TEXT NOT NULL CHECK(trigger IN ('pre_checkin_48h','pre_checkin_24h','pre_checkout')),
    active          INTEGER NOT NULL DEFAULT 1,
    template_id     TEXT NOT NULL,
    delay_minutes   INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (property_id, trigger)
);

CREATE TABLE IF NOT EXISTS message_template (
    id              TEXT NOT NULL,
    property_id     TEXT NOT NULL,
    name            TEXT NOT NULL,
    body            TEXT NOT NULL,
    PRIMARY KEY (property_id, id)
);

CREATE TABLE IF NOT EXISTS guest (
    id              TEXT PRIMARY KEY NOT NULL,
    property_id     TEXT NOT NULL,
    full_name       TEXT NOT NULL,
    phone           TEXT
);

CREATE TABLE IF NOT EXISTS cabin (
    id              TEXT PRIMARY KEY NOT NULL,
    property_id     TEXT NOT NULL,
    name            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stay (
    id                  TEXT PRIMARY KEY NOT NULL,
    property_id         TEXT NOT NULL,
    guest_id            TEXT NOT NULL,
    cabin_id            TEXT,
    check_in            TEXT NOT NULL,
    check_out           TEXT NOT NULL,
    status              TEXT NOT NULL CHECK(status IN ('pending','pre_checkin_done','active','checked_out','cancelled')),
    send_48h            INTEGER NOT NULL DEFAULT 1,
    send_24h            INTEGER NOT NULL DEFAULT 1,
    pre_checkin_sent    INTEGER NOT NULL DEFAULT 0,
    pre_checkout_sent   INTEGER NOT NULL DEFAULT 0,
    reminders_count     INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS message (
    id                  TEXT PRIMARY KEY NOT NULL,
    property_id         TEXT NOT NULL,
    contact_number      TEXT NOT NULL,
    body                TEXT NOT NULL,
    direction           TEXT NOT NULL CHECK(direction IN ('inbound','outbound')),
    is_automated        INTEGER NOT NULL DEFAULT 0,
    trigger_event       TEXT,
    stay_id             TEXT,
    status              TEXT NOT NULL CHECK(status IN ('pending','processing','sent','delivered','read','failed','received')),
    scheduled_for       TEXT NOT NULL,
    attempts            INTEGER NOT NULL DEFAULT 0,
    max_attempts        INTEGER NOT NULL DEFAULT 0,
    error_message       TEXT,
    claimed_at          TEXT,
    provider_message_id TEXT,
    status_api          INTEGER,
    reaction            TEXT,
    sent_at             TEXT,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversation (
    property_id     TEXT NOT NULL,
    contact_number  TEXT NOT NULL,
    guest_id        TEXT,
    last_message    TEXT NOT NULL,
    last_direction  TEXT NOT NULL CHECK(last_direction IN ('inbound','outbound')),
    updated_at      TEXT NOT NULL,
    unread          INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (property_id, contact_number)
);

CREATE TABLE IF NOT EXISTS contact (
    property_id     TEXT NOT NULL,
    number          TEXT NOT NULL,
    name            TEXT,
    is_guest        INTEGER NOT NULL DEFAULT 0,
    guest_id        TEXT,
    created_at      TEXT NOT NULL,
    PRIMARY KEY (property_id, number)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_message_provider_id ON message(provider_message_id);
CREATE INDEX IF NOT EXISTS idx_message_due ON message(status, scheduled_for);
CREATE INDEX IF NOT EXISTS idx_message_contact ON message(property_id, contact_number, created_at);
CREATE INDEX IF NOT EXISTS idx_stay_property ON stay(property_id, status);
CREATE INDEX IF NOT EXISTS idx_guest_phone ON guest(property_id, phone);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
