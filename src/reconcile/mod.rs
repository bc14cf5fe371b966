//! Gateway webhook reconciliation.
//!
//! Mirrors every message the gateway observes into the conversation thread,
//! suppressing echoes of our own sends, and overlays delivery acks and
//! reactions onto existing messages.

mod inbound;
mod status;

use std::sync::Arc;

use serde::Deserialize;

use crate::persistence::db::Database;
use crate::persistence::message_repo::MessageRepo;
use crate::persistence::property_repo::PropertyRepo;
use crate::persistence::stay_repo::StayRepo;

/// Message event reported by the gateway.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    /// Owning tenant.
    #[serde(default)]
    pub property_id: String,
    /// Guest-side address in any notation.
    #[serde(default)]
    pub contact_number: String,
    /// Message text.
    #[serde(default)]
    pub text: String,
    /// `inbound` or `outbound`.
    #[serde(default)]
    pub direction: String,
    /// Provider id, when the gateway supplied one.
    #[serde(default)]
    pub message_id: Option<String>,
}

/// Delivery status or reaction event reported by the gateway.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    /// Owning tenant.
    #[serde(default)]
    pub property_id: String,
    /// Internal or provider id of the target message.
    #[serde(default)]
    pub message_id: String,
    /// `ack` or `reaction`.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Ack code for `ack` events.
    #[serde(default)]
    pub ack: Option<i64>,
    /// Reaction for `reaction` events.
    #[serde(default)]
    pub reaction: Option<String>,
}

/// Result of mirroring one message event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new message row was written.
    Recorded {
        /// Id of the new row.
        id: String,
    },
    /// Reflection of a message the processor already sent; dropped.
    Echo,
    /// Redelivery of an event already recorded; dropped.
    Duplicate {
        /// Id of the existing row.
        id: String,
    },
}

impl RecordOutcome {
    /// Human-readable acknowledgement for the webhook response.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Recorded { .. } => "message recorded",
            Self::Echo => "echo ignored",
            Self::Duplicate { .. } => "duplicate ignored",
        }
    }
}

/// Applies gateway webhooks to the store.
#[derive(Clone)]
pub struct Reconciler {
    messages: MessageRepo,
    properties: PropertyRepo,
    stays: StayRepo,
    echo_window: chrono::Duration,
}

impl Reconciler {
    /// Create a reconciler with the given echo window.
    #[must_use]
    pub fn new(db: Arc<Database>, echo_window_seconds: u64) -> Self {
        Self {
            messages: MessageRepo::new(Arc::clone(&db)),
            properties: PropertyRepo::new(Arc::clone(&db)),
            stays: StayRepo::new(db),
            echo_window: chrono::Duration::seconds(
                i64::try_from(echo_window_seconds).unwrap_or(i64::MAX / 1000),
            ),
        }
    }
}
