//! Conversation index and contact book models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Direction;

/// Per-contact conversation summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Conversation {
    /// Owning tenant.
    pub property_id: String,
    /// Digits-only contact address.
    pub contact_number: String,
    /// Linked guest, when the number belongs to one.
    pub guest_id: Option<String>,
    /// Body of the most recent message.
    pub last_message: String,
    /// Side of the most recent message.
    pub last_direction: Direction,
    /// Time of the most recent message.
    pub updated_at: DateTime<Utc>,
    /// Inbound messages not yet read by staff.
    pub unread: u32,
}

/// Address-book entry for a number seen on the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Contact {
    /// Owning tenant.
    pub property_id: String,
    /// Digits-only address.
    pub number: String,
    /// Display name, if known.
    pub name: Option<String>,
    /// Whether the number is a known guest.
    pub is_guest: bool,
    /// Linked guest.
    pub guest_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Strip everything but ASCII digits from a phone number.
///
/// `"+55 (11) 98765-4321"` and `"5511987654321@c.us"` both become
/// `"5511987654321"`.
#[must_use]
pub fn normalize_number(raw: &str) -> String {
    let raw = raw.split('@').next().unwrap_or(raw);
    raw.chars().filter(char::is_ascii_digit).collect()
}
