//! Unit tests for `MessageRepo` against in-memory `SQLite`.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use hostline::models::message::{Direction, Message, MessageStatus};
use hostline::persistence::db;
use hostline::persistence::message_repo::MessageRepo;
use hostline::AppError;

fn t(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 10, h, m, 0).single().expect("instant")
}

async fn repo() -> MessageRepo {
    let pool = db::connect_memory().await.expect("db");
    MessageRepo::new(Arc::new(pool))
}

fn job(body: &str, scheduled_for: DateTime<Utc>) -> Message {
    Message::new_job(
        "prop".into(),
        "5511999990000".into(),
        body.into(),
        scheduled_for,
        3,
        scheduled_for,
    )
}

#[tokio::test]
async fn insert_and_get_round_trip() {
    let repo = repo().await;
    let original = job("hello", t(12, 0));
    repo.insert(&original).await.expect("insert");

    let loaded = repo
        .get_by_id(&original.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(loaded, original);
}

#[tokio::test]
async fn due_listing_is_ordered_capped_and_counted() {
    let repo = repo().await;
    let late = job("late", t(12, 30));
    let early = job("early", t(11, 0));
    let future = job("future", t(15, 0));
    for m in [&late, &early, &future] {
        repo.insert(m).await.expect("insert");
    }

    let cutoff = t(13, 0);
    assert_eq!(repo.count_due(cutoff).await.expect("count"), 2);
    let due = repo.list_due(cutoff, 1).await.expect("list");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, early.id);
}

#[tokio::test]
async fn claim_is_exclusive() {
    let repo = repo().await;
    let m = job("hi", t(12, 0));
    repo.insert(&m).await.expect("insert");

    assert!(repo.claim(&m.id, t(12, 1)).await.expect("claim"));
    assert!(!repo.claim(&m.id, t(12, 1)).await.expect("second claim"));

    let claimed = repo.get_by_id(&m.id).await.expect("get").expect("row");
    assert_eq!(claimed.status, MessageStatus::Processing);
    assert_eq!(claimed.claimed_at, Some(t(12, 1)));
    assert_eq!(repo.count_due(t(13, 0)).await.expect("count"), 0);
}

#[tokio::test]
async fn mark_sent_migrates_identity_to_provider_id() {
    let repo = repo().await;
    let m = job("hi", t(12, 0));
    repo.insert(&m).await.expect("insert");
    repo.claim(&m.id, t(12, 0)).await.expect("claim");

    let final_id = repo
        .mark_sent(&m, Some("wamid.42"), t(12, 1))
        .await
        .expect("mark sent");
    assert_eq!(final_id, "wamid.42");

    assert!(repo.get_by_id(&m.id).await.expect("get").is_none());
    let sent = repo.get_by_id("wamid.42").await.expect("get").expect("row");
    assert_eq!(sent.status, MessageStatus::Sent);
    assert_eq!(sent.body, "hi");
    assert_eq!(sent.sent_at, Some(t(12, 1)));
    assert!(sent.claimed_at.is_none());
    assert_eq!(
        repo.list_for_contact("prop", "5511999990000")
            .await
            .expect("list")
            .len(),
        1
    );
}

#[tokio::test]
async fn migration_onto_mirrored_row_keeps_overlays() {
    let repo = repo().await;
    let mirror = Message::mirrored(
        "prop".into(),
        "5511999990000".into(),
        "hi".into(),
        Direction::Outbound,
        Some("wamid.7".into()),
        t(12, 0),
    );
    repo.insert(&mirror).await.expect("insert mirror");
    repo.apply_ack("wamid.7", 2).await.expect("ack");

    let m = job("hi", t(11, 59));
    repo.insert(&m).await.expect("insert");
    repo.claim(&m.id, t(12, 0)).await.expect("claim");
    repo.mark_sent(&m, Some("wamid.7"), t(12, 0))
        .await
        .expect("mark sent");

    let rows = repo
        .list_for_contact("prop", "5511999990000")
        .await
        .expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "wamid.7");
    assert_eq!(rows[0].status_api, Some(2));
    assert_eq!(rows[0].max_attempts, 3);
}

#[tokio::test]
async fn mark_sent_without_provider_id_updates_in_place() {
    let repo = repo().await;
    let m = job("hi", t(12, 0));
    repo.insert(&m).await.expect("insert");
    repo.claim(&m.id, t(12, 0)).await.expect("claim");

    let final_id = repo.mark_sent(&m, None, t(12, 1)).await.expect("mark sent");
    assert_eq!(final_id, m.id);
    let sent = repo.get_by_id(&m.id).await.expect("get").expect("row");
    assert_eq!(sent.status, MessageStatus::Sent);
}

#[tokio::test]
async fn retry_and_failure_only_apply_to_claimed_rows() {
    let repo = repo().await;
    let m = job("hi", t(12, 0));
    repo.insert(&m).await.expect("insert");

    // Not claimed yet: no effect.
    repo.mark_failed(&m.id, 3, "boom").await.expect("noop");
    assert_eq!(
        repo.get_by_id(&m.id).await.expect("get").expect("row").status,
        MessageStatus::Pending
    );

    repo.claim(&m.id, t(12, 0)).await.expect("claim");
    repo.schedule_retry(&m.id, 1, t(12, 5), "gateway: down")
        .await
        .expect("retry");
    let retried = repo.get_by_id(&m.id).await.expect("get").expect("row");
    assert_eq!(retried.status, MessageStatus::Pending);
    assert_eq!(retried.attempts, 1);
    assert_eq!(retried.scheduled_for, t(12, 5));
    assert_eq!(retried.error_message.as_deref(), Some("gateway: down"));
}

#[tokio::test]
async fn reset_for_retry_requires_failed_status() {
    let repo = repo().await;
    let m = job("hi", t(12, 0));
    repo.insert(&m).await.expect("insert");

    let err = repo.reset_for_retry(&m.id, t(13, 0)).await.expect_err("pending");
    assert!(matches!(err, AppError::Conflict(_)));
    let err = repo.reset_for_retry("nope", t(13, 0)).await.expect_err("missing");
    assert!(matches!(err, AppError::NotFound(_)));

    repo.claim(&m.id, t(12, 0)).await.expect("claim");
    repo.mark_failed(&m.id, 3, "boom").await.expect("fail");
    repo.reset_for_retry(&m.id, t(13, 0)).await.expect("reset");
    let reset = repo.get_by_id(&m.id).await.expect("get").expect("row");
    assert_eq!(reset.status, MessageStatus::Pending);
    assert_eq!(reset.attempts, 3);
    assert_eq!(reset.scheduled_for, t(13, 0));
}

#[tokio::test]
async fn insert_mirrored_respects_both_keys() {
    let repo = repo().await;
    let first = Message::mirrored(
        "prop".into(),
        "1".into(),
        "oi".into(),
        Direction::Inbound,
        Some("wamid.1".into()),
        t(12, 0),
    );
    assert_eq!(
        repo.insert_mirrored(&first, None, t(12, 0)).await.expect("insert"),
        Some(true)
    );
    assert_eq!(
        repo.insert_mirrored(&first, None, t(12, 0)).await.expect("dup id"),
        None
    );

    let mut clash = job("other", t(12, 0));
    clash.provider_message_id = Some("wamid.1".into());
    assert_eq!(
        repo.insert_mirrored(&clash, None, t(12, 1))
            .await
            .expect("dup provider id"),
        None
    );

    let second = Message::mirrored(
        "prop".into(),
        "1".into(),
        "tudo bem?".into(),
        Direction::Inbound,
        Some("wamid.2".into()),
        t(12, 2),
    );
    assert_eq!(
        repo.insert_mirrored(&second, None, t(12, 2)).await.expect("insert"),
        Some(false)
    );
}

#[tokio::test]
async fn resolve_falls_back_to_provider_id() {
    let repo = repo().await;
    let mut m = job("hi", t(12, 0));
    m.provider_message_id = Some("wamid.9".into());
    repo.insert(&m).await.expect("insert");

    let by_id = repo.resolve(&m.id).await.expect("resolve").expect("row");
    let by_provider = repo.resolve("wamid.9").await.expect("resolve").expect("row");
    assert_eq!(by_id.id, by_provider.id);
    assert!(repo.resolve("unknown").await.expect("resolve").is_none());
}

#[tokio::test]
async fn latest_outbound_ignores_unsent_jobs() {
    let repo = repo().await;
    let mut sent = job("sent one", t(11, 0));
    sent.status = MessageStatus::Sent;
    sent.sent_at = Some(t(11, 0));
    repo.insert(&sent).await.expect("insert");
    repo.insert(&job("still pending", t(12, 0)))
        .await
        .expect("insert");

    let latest = repo
        .latest_outbound_for_contact("prop", "5511999990000")
        .await
        .expect("query")
        .expect("row");
    assert_eq!(latest.body, "sent one");
}
