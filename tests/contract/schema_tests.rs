//! Contract tests for the `SQLite` schema.

use hostline::persistence::{db, schema};

const TABLES: [&str; 9] = [
    "property",
    "automation_rule",
    "message_template",
    "guest",
    "cabin",
    "stay",
    "message",
    "conversation",
    "contact",
];

#[tokio::test]
async fn schema_creates_every_table() {
    let pool = db::connect_memory().await.expect("db");
    for table in TABLES {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .expect("query");
        assert_eq!(count, 1, "missing table {table}");
    }
}

#[tokio::test]
async fn bootstrap_is_idempotent() {
    let pool = db::connect_memory().await.expect("db");
    schema::bootstrap_schema(&pool).await.expect("second run");
}

#[tokio::test]
async fn provider_id_is_unique() {
    let pool = db::connect_memory().await.expect("db");
    let insert = "INSERT INTO message (id, property_id, contact_number, body, direction, \
                  is_automated, status, scheduled_for, attempts, max_attempts, \
                  provider_message_id, created_at) \
                  VALUES (?1, 'p', '1', 'hi', 'outbound', 0, 'sent', \
                  '2026-05-10T12:00:00.000000Z', 0, 3, 'wamid.1', '2026-05-10T12:00:00.000000Z')";

    sqlx::query(insert).bind("a").execute(&pool).await.expect("first");
    let dup = sqlx::query(insert).bind("b").execute(&pool).await;
    assert!(dup.is_err(), "second row with the same provider id must fail");
}
