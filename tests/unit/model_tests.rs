//! Unit tests for domain models: flag ledger, message lifecycle, tenant
//! delivery settings, and number normalisation.

use chrono::{TimeZone, Utc};
use hostline::models::automation::TriggerEvent;
use hostline::models::conversation::normalize_number;
use hostline::models::message::{AckLevel, Direction, Message, MessageStatus};
use hostline::models::property::{Property, WhatsappConfig};
use hostline::models::stay::{AutomationFlags, Guest};
use hostline::AppError;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).single().expect("instant")
}

#[test]
fn fresh_flags_allow_every_trigger() {
    let flags = AutomationFlags::default();
    for trigger in TriggerEvent::ALL {
        assert!(flags.is_eligible(trigger), "{trigger:?}");
    }
}

#[test]
fn firing_consumes_only_that_trigger() {
    let mut flags = AutomationFlags::default();
    flags.mark_fired(TriggerEvent::PreCheckin48h);
    assert!(!flags.is_eligible(TriggerEvent::PreCheckin48h));
    assert!(flags.is_eligible(TriggerEvent::PreCheckin24h));
    assert!(flags.is_eligible(TriggerEvent::PreCheckout));
    assert_eq!(flags.reminders_count, 1);

    flags.mark_fired(TriggerEvent::PreCheckout);
    assert!(!flags.is_eligible(TriggerEvent::PreCheckout));
    assert!(flags.pre_checkout_sent);
    assert_eq!(flags.reminders_count, 2);
}

#[test]
fn completed_pre_checkin_blocks_both_reminders() {
    let flags = AutomationFlags {
        pre_checkin_sent: true,
        ..AutomationFlags::default()
    };
    assert!(!flags.is_eligible(TriggerEvent::PreCheckin48h));
    assert!(!flags.is_eligible(TriggerEvent::PreCheckin24h));
    assert!(flags.is_eligible(TriggerEvent::PreCheckout));
}

#[test]
fn trigger_names_round_trip() {
    assert_eq!(TriggerEvent::PreCheckin48h.as_str(), "pre_checkin_48h");
    assert_eq!(
        TriggerEvent::parse("pre_checkout"),
        Some(TriggerEvent::PreCheckout)
    );
    assert_eq!(TriggerEvent::parse("post_checkout"), None);
    assert_eq!(
        serde_json::to_string(&TriggerEvent::PreCheckin24h).expect("json"),
        "\"pre_checkin_24h\""
    );
}

#[test]
fn new_job_starts_pending_with_no_attempts() {
    let job = Message::new_job("p".into(), "1".into(), "hi".into(), now(), 3, now());
    assert_eq!(job.status, MessageStatus::Pending);
    assert_eq!(job.direction, Direction::Outbound);
    assert_eq!(job.attempts, 0);
    assert!(!job.is_automated);
    assert_eq!(job.scheduled_for, now());
    assert!(job.claimed_at.is_none());

    let automated = job.automated(TriggerEvent::PreCheckin24h, "stay-1".into());
    assert!(automated.is_automated);
    assert_eq!(automated.stay_id.as_deref(), Some("stay-1"));
}

#[test]
fn mirrored_messages_use_provider_id() {
    let inbound = Message::mirrored(
        "p".into(),
        "1".into(),
        "oi".into(),
        Direction::Inbound,
        Some("wamid.1".into()),
        now(),
    );
    assert_eq!(inbound.id, "wamid.1");
    assert_eq!(inbound.status, MessageStatus::Received);
    assert_eq!(inbound.sent_at, Some(now()));

    let outbound = Message::mirrored("p".into(), "1".into(), "oi".into(), Direction::Outbound, None, now());
    assert_eq!(outbound.status, MessageStatus::Sent);
    assert!(outbound.provider_message_id.is_none());
    assert!(!outbound.id.is_empty());
}

#[test]
fn ack_codes_map_to_levels() {
    assert_eq!(AckLevel::from_code(-1), Some(AckLevel::Error));
    assert_eq!(AckLevel::from_code(3), Some(AckLevel::Read));
    assert_eq!(AckLevel::from_code(4), Some(AckLevel::Played));
    assert_eq!(AckLevel::from_code(9), None);
}

#[test]
fn status_and_direction_parse() {
    assert_eq!(MessageStatus::parse("received"), Some(MessageStatus::Received));
    assert_eq!(MessageStatus::parse("queued"), None);
    assert_eq!(Direction::parse("inbound"), Some(Direction::Inbound));
    assert_eq!(Direction::parse("INBOUND"), None);
}

#[test]
fn normalizes_phone_notations() {
    assert_eq!(normalize_number("+55 (11) 99999-0000"), "5511999990000");
    assert_eq!(normalize_number("5511999990000@c.us"), "5511999990000");
    assert_eq!(normalize_number("abc"), "");
}

#[test]
fn guest_first_name() {
    let guest = Guest {
        id: "g".into(),
        property_id: "p".into(),
        full_name: "  Ana Maria Souza".into(),
        phone: None,
    };
    assert_eq!(guest.first_name(), "Ana");
}

fn property(enabled: bool, config: Option<WhatsappConfig>) -> Property {
    Property {
        id: "p".into(),
        name: "Pousada".into(),
        timezone: None,
        whatsapp_enabled: enabled,
        whatsapp_config: config,
    }
}

#[test]
fn delivery_config_requires_enabled_and_complete_settings() {
    let complete = WhatsappConfig {
        api_url: "http://gw".into(),
        token: "t".into(),
    };
    assert!(property(true, Some(complete.clone())).delivery_config().is_ok());

    let err = property(false, Some(complete)).delivery_config().expect_err("disabled");
    assert!(matches!(err, AppError::Config(_)));

    assert!(property(true, None).delivery_config().is_err());
    let blank = WhatsappConfig {
        api_url: " ".into(),
        token: "t".into(),
    };
    assert!(property(true, Some(blank)).delivery_config().is_err());
}
