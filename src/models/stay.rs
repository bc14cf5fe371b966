//! Stay, guest, and cabin models read by the automation scheduler.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::automation::TriggerEvent;

/// Booking lifecycle of a stay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StayStatus {
    /// Booked, guest has not completed pre-check-in.
    Pending,
    /// Guest completed the pre-check-in form.
    PreCheckinDone,
    /// Guest is on site.
    Active,
    /// Guest has left.
    CheckedOut,
    /// Booking cancelled.
    Cancelled,
}

impl StayStatus {
    /// Statuses the daily sweep looks at.
    pub const SCHEDULABLE: [Self; 3] = [Self::Pending, Self::PreCheckinDone, Self::Active];

    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PreCheckinDone => "pre_checkin_done",
            Self::Active => "active",
            Self::CheckedOut => "checked_out",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "pre_checkin_done" => Some(Self::PreCheckinDone),
            "active" => Some(Self::Active),
            "checked_out" => Some(Self::CheckedOut),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Per-stay idempotency ledger for automation triggers.
///
/// `send_48h` and `send_24h` mean "still eligible": they start `true` and
/// flip to `false` once the trigger has been enqueued. `pre_checkout_sent`
/// starts `false` and flips to `true`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AutomationFlags {
    /// 48h pre-check-in reminder not yet sent.
    pub send_48h: bool,
    /// 24h pre-check-in reminder not yet sent.
    pub send_24h: bool,
    /// Guest already completed pre-check-in; suppresses reminders.
    pub pre_checkin_sent: bool,
    /// Pre-checkout message already enqueued.
    pub pre_checkout_sent: bool,
    /// Automated messages enqueued for this stay.
    pub reminders_count: u32,
}

impl Default for AutomationFlags {
    fn default() -> Self {
        Self {
            send_48h: true,
            send_24h: true,
            pre_checkin_sent: false,
            pre_checkout_sent: false,
            reminders_count: 0,
        }
    }
}

impl AutomationFlags {
    /// Whether the ledger still allows `trigger` to fire.
    #[must_use]
    pub fn is_eligible(&self, trigger: TriggerEvent) -> bool {
        match trigger {
            TriggerEvent::PreCheckin48h => self.send_48h && !self.pre_checkin_sent,
            TriggerEvent::PreCheckin24h => self.send_24h && !self.pre_checkin_sent,
            TriggerEvent::PreCheckout => !self.pre_checkout_sent,
        }
    }

    /// Record that `trigger` has been enqueued.
    pub fn mark_fired(&mut self, trigger: TriggerEvent) {
        match trigger {
            TriggerEvent::PreCheckin48h => self.send_48h = false,
            TriggerEvent::PreCheckin24h => self.send_24h = false,
            TriggerEvent::PreCheckout => self.pre_checkout_sent = true,
        }
        self.reminders_count = self.reminders_count.saturating_add(1);
    }
}

/// A guest's booking at a property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Stay {
    /// Unique record identifier.
    pub id: String,
    /// Owning tenant.
    pub property_id: String,
    /// Booking guest.
    pub guest_id: String,
    /// Assigned cabin, if any.
    pub cabin_id: Option<String>,
    /// Arrival date (tenant civil time).
    pub check_in: NaiveDate,
    /// Departure date (tenant civil time).
    pub check_out: NaiveDate,
    /// Booking lifecycle.
    pub status: StayStatus,
    /// Trigger idempotency ledger.
    pub automation_flags: AutomationFlags,
}

/// Guest fields used for rendering and delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Guest {
    /// Unique record identifier.
    pub id: String,
    /// Owning tenant.
    pub property_id: String,
    /// Full display name.
    pub full_name: String,
    /// Digits-only phone, if known.
    pub phone: Option<String>,
}

impl Guest {
    /// First word of the full name.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.full_name.split_whitespace().next().unwrap_or("")
    }
}

/// Cabin fields used for rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Cabin {
    /// Unique record identifier.
    pub id: String,
    /// Owning tenant.
    pub property_id: String,
    /// Display name.
    pub name: String,
}
