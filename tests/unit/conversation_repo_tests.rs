//! Unit tests for `ConversationRepo` against in-memory `SQLite`.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use hostline::models::message::{Direction, Message};
use hostline::persistence::conversation_repo::ConversationRepo;
use hostline::persistence::db;
use hostline::persistence::message_repo::MessageRepo;

fn t(m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 10, 12, m, 0).single().expect("instant")
}

async fn repo() -> ConversationRepo {
    let pool = db::connect_memory().await.expect("db");
    ConversationRepo::new(Arc::new(pool))
}

#[tokio::test]
async fn unread_counts_only_inbound() {
    let repo = repo().await;
    repo.record_activity("p", "1", "oi", Direction::Inbound, None, t(0))
        .await
        .expect("inbound");
    repo.record_activity("p", "1", "olá!", Direction::Outbound, None, t(1))
        .await
        .expect("outbound");
    repo.record_activity("p", "1", "tudo bem?", Direction::Inbound, None, t(2))
        .await
        .expect("inbound");

    let conv = repo.get("p", "1").await.expect("get").expect("row");
    assert_eq!(conv.unread, 2);
    assert_eq!(conv.last_message, "tudo bem?");
    assert_eq!(conv.last_direction, Direction::Inbound);
    assert_eq!(conv.updated_at, t(2));
}

#[tokio::test]
async fn guest_link_is_kept_when_absent() {
    let repo = repo().await;
    repo.record_activity("p", "1", "oi", Direction::Inbound, Some("g-1"), t(0))
        .await
        .expect("linked");
    repo.record_activity("p", "1", "ok", Direction::Outbound, None, t(1))
        .await
        .expect("unlinked");

    let conv = repo.get("p", "1").await.expect("get").expect("row");
    assert_eq!(conv.guest_id.as_deref(), Some("g-1"));
}

#[tokio::test]
async fn conversations_are_scoped_per_tenant() {
    let repo = repo().await;
    repo.record_activity("p", "1", "oi", Direction::Inbound, None, t(0))
        .await
        .expect("write");
    assert!(repo.get("other", "1").await.expect("get").is_none());
}

#[tokio::test]
async fn first_mirrored_message_creates_the_contact_once() {
    let pool = Arc::new(db::connect_memory().await.expect("db"));
    let repo = ConversationRepo::new(Arc::clone(&pool));
    let messages = MessageRepo::new(pool);
    for (id, minute) in [("wamid.1", 0), ("wamid.2", 5)] {
        let message = Message::mirrored(
            "p".into(),
            "1".into(),
            "oi".into(),
            Direction::Inbound,
            Some(id.into()),
            t(minute),
        );
        messages
            .insert_mirrored(&message, None, t(minute))
            .await
            .expect("insert");
    }

    let contact = repo.get_contact("p", "1").await.expect("get").expect("row");
    assert!(!contact.is_guest);
    assert!(contact.name.is_none());
    assert_eq!(contact.created_at, t(0));
    assert_eq!(repo.get("p", "1").await.expect("get").expect("row").unread, 2);
}
