//! Automation rule and message template models.

use serde::{Deserialize, Serialize};

/// Named automation condition; the rule id doubles as the trigger name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    /// Two days before check-in.
    #[serde(rename = "pre_checkin_48h")]
    PreCheckin48h,
    /// One day before check-in.
    #[serde(rename = "pre_checkin_24h")]
    PreCheckin24h,
    /// Evening before check-out.
    #[serde(rename = "pre_checkout")]
    PreCheckout,
}

impl TriggerEvent {
    /// Evaluation order; the first matching trigger wins.
    pub const ALL: [Self; 3] = [Self::PreCheckin48h, Self::PreCheckin24h, Self::PreCheckout];

    /// Storage and wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreCheckin48h => "pre_checkin_48h",
            Self::PreCheckin24h => "pre_checkin_24h",
            Self::PreCheckout => "pre_checkout",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// Tenant-scoped automation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AutomationRule {
    /// Owning tenant.
    pub property_id: String,
    /// Trigger this rule configures.
    pub trigger: TriggerEvent,
    /// Disabled rules never fire.
    pub active: bool,
    /// Template rendered when the rule fires.
    pub template_id: String,
    /// Static delay applied to the enqueued job.
    pub delay_minutes: i64,
}

/// Message body with `{{placeholder}}` markers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MessageTemplate {
    /// Template identifier, unique per tenant.
    pub id: String,
    /// Owning tenant.
    pub property_id: String,
    /// Display name.
    pub name: String,
    /// Body text with placeholders.
    pub body: String,
}
