//! Unit tests for `StayRepo` against in-memory `SQLite`.

use std::sync::Arc;

use chrono::NaiveDate;
use hostline::models::automation::TriggerEvent;
use hostline::models::stay::{AutomationFlags, Cabin, Guest, Stay, StayStatus};
use hostline::persistence::db;
use hostline::persistence::stay_repo::StayRepo;
use hostline::AppError;

async fn repo() -> StayRepo {
    let pool = db::connect_memory().await.expect("db");
    StayRepo::new(Arc::new(pool))
}

fn stay(id: &str, property_id: &str, status: StayStatus) -> Stay {
    Stay {
        id: id.into(),
        property_id: property_id.into(),
        guest_id: "g-1".into(),
        cabin_id: Some("c-1".into()),
        check_in: NaiveDate::from_ymd_opt(2026, 5, 12).expect("date"),
        check_out: NaiveDate::from_ymd_opt(2026, 5, 15).expect("date"),
        status,
        automation_flags: AutomationFlags::default(),
    }
}

#[tokio::test]
async fn stay_round_trips_with_flags() {
    let repo = repo().await;
    let mut original = stay("s-1", "p", StayStatus::Pending);
    original.automation_flags.mark_fired(TriggerEvent::PreCheckin48h);
    repo.upsert_stay(&original).await.expect("upsert");

    let loaded = repo.get_stay("s-1").await.expect("get").expect("row");
    assert_eq!(loaded, original);
    assert!(repo.get_stay("missing").await.expect("get").is_none());
}

#[tokio::test]
async fn schedulable_excludes_closed_stays_and_other_tenants() {
    let repo = repo().await;
    for s in [
        stay("pending", "p", StayStatus::Pending),
        stay("done", "p", StayStatus::PreCheckinDone),
        stay("active", "p", StayStatus::Active),
        stay("out", "p", StayStatus::CheckedOut),
        stay("cancelled", "p", StayStatus::Cancelled),
        stay("foreign", "other", StayStatus::Pending),
    ] {
        repo.upsert_stay(&s).await.expect("upsert");
    }

    let mut ids: Vec<String> = repo
        .list_schedulable("p")
        .await
        .expect("list")
        .into_iter()
        .map(|s| s.expect("valid row").id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["active", "done", "pending"]);
}

#[tokio::test]
async fn malformed_stay_row_does_not_hide_the_others() {
    let pool = Arc::new(db::connect_memory().await.expect("db"));
    let repo = StayRepo::new(Arc::clone(&pool));
    repo.upsert_stay(&stay("good", "p", StayStatus::Pending))
        .await
        .expect("upsert");
    repo.upsert_stay(&stay("bad", "p", StayStatus::Pending))
        .await
        .expect("upsert");
    sqlx::query("UPDATE stay SET check_out = '15/06/2026' WHERE id = 'bad'")
        .execute(pool.as_ref())
        .await
        .expect("corrupt row");

    let rows = repo.list_schedulable("p").await.expect("list");
    assert_eq!(rows.len(), 2);
    let good: Vec<_> = rows.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(good.len(), 1);
    assert_eq!(good[0].id, "good");
    let err = rows
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("bad row reported");
    assert!(err.to_string().contains("stay bad"), "{err}");
}

#[tokio::test]
async fn update_flags_persists_ledger() {
    let repo = repo().await;
    repo.upsert_stay(&stay("s-1", "p", StayStatus::Active))
        .await
        .expect("upsert");

    let mut flags = AutomationFlags::default();
    flags.mark_fired(TriggerEvent::PreCheckout);
    repo.update_flags("s-1", &flags).await.expect("update");

    let loaded = repo.get_stay("s-1").await.expect("get").expect("row");
    assert!(loaded.automation_flags.pre_checkout_sent);
    assert_eq!(loaded.automation_flags.reminders_count, 1);
}

#[tokio::test]
async fn update_flags_on_missing_stay_is_not_found() {
    let repo = repo().await;
    let err = repo
        .update_flags("ghost", &AutomationFlags::default())
        .await
        .expect_err("missing");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn guest_phone_is_stored_normalised() {
    let repo = repo().await;
    repo.upsert_guest(&Guest {
        id: "g-1".into(),
        property_id: "p".into(),
        full_name: "Ana Souza".into(),
        phone: Some("+55 (11) 99999-0000".into()),
    })
    .await
    .expect("upsert");

    let found = repo
        .find_guest_by_phone("p", "5511999990000")
        .await
        .expect("find")
        .expect("guest");
    assert_eq!(found.id, "g-1");
    assert_eq!(found.phone.as_deref(), Some("5511999990000"));
    assert!(repo
        .find_guest_by_phone("other", "5511999990000")
        .await
        .expect("find")
        .is_none());
}

#[tokio::test]
async fn cabin_round_trip() {
    let repo = repo().await;
    let cabin = Cabin {
        id: "c-1".into(),
        property_id: "p".into(),
        name: "Cabana Ipê".into(),
    };
    repo.upsert_cabin(&cabin).await.expect("upsert");
    assert_eq!(
        repo.get_cabin("c-1").await.expect("get").expect("row").name,
        "Cabana Ipê"
    );
}
