//! Message model: queued outbound jobs and mirrored conversation messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::automation::TriggerEvent;

/// Delivery lifecycle status of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Waiting in the queue until `scheduled_for`.
    Pending,
    /// Claimed by a processor sweep; a send is in flight.
    Processing,
    /// Accepted by the gateway.
    Sent,
    /// Reached the recipient device.
    Delivered,
    /// Opened by the recipient.
    Read,
    /// Attempts exhausted; needs an operator retry.
    Failed,
    /// Inbound message mirrored from the gateway.
    Received,
}

impl MessageStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
            Self::Received => "received",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            "failed" => Some(Self::Failed),
            "received" => Some(Self::Received),
            _ => None,
        }
    }
}

/// Which side of the conversation produced a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Guest to property.
    Inbound,
    /// Property to guest.
    Outbound,
}

impl Direction {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    /// Parse the storage / wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            _ => None,
        }
    }
}

/// Gateway acknowledgement levels carried in `status_api`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckLevel {
    /// Gateway reported a delivery error.
    Error,
    /// Queued on the device, not yet on the server.
    Pending,
    /// Accepted by the network server.
    Server,
    /// Delivered to the recipient device.
    Device,
    /// Read by the recipient.
    Read,
    /// Media played by the recipient.
    Played,
}

impl AckLevel {
    /// Map a raw gateway ack code; unknown codes yield `None`.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Self::Error),
            0 => Some(Self::Pending),
            1 => Some(Self::Server),
            2 => Some(Self::Device),
            3 => Some(Self::Read),
            4 => Some(Self::Played),
            _ => None,
        }
    }
}

/// One message in a tenant's conversation log.
///
/// Outbound rows double as delivery jobs: the processor owns `status`,
/// `attempts`, `scheduled_for`, `error_message`, and `claimed_at`, while the
/// reconciler owns `status_api` and `reaction`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Message {
    /// Record identifier; becomes the provider id after a successful send.
    pub id: String,
    /// Owning tenant.
    pub property_id: String,
    /// Digits-only address of the guest side of the conversation.
    pub contact_number: String,
    /// Rendered text; immutable after creation.
    pub body: String,
    /// Conversation side.
    pub direction: Direction,
    /// Produced by an automation rule rather than a person.
    pub is_automated: bool,
    /// Rule that produced the message, if any.
    pub trigger_event: Option<TriggerEvent>,
    /// Stay that triggered the message, if any.
    pub stay_id: Option<String>,
    /// Current lifecycle status.
    pub status: MessageStatus,
    /// Earliest eligible send time.
    pub scheduled_for: DateTime<Utc>,
    /// Delivery attempts consumed so far.
    pub attempts: u32,
    /// Attempts allowed before the job freezes in `failed`.
    pub max_attempts: u32,
    /// Last failure reason.
    pub error_message: Option<String>,
    /// When the current processor claim was taken.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Canonical id assigned by the gateway.
    pub provider_message_id: Option<String>,
    /// Raw gateway ack code.
    pub status_api: Option<i64>,
    /// Latest reaction pushed by the gateway.
    pub reaction: Option<String>,
    /// When the gateway accepted (outbound) or observed (mirrored) it.
    pub sent_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Construct a new pending outbound job.
    #[must_use]
    pub fn new_job(
        property_id: String,
        contact_number: String,
        body: String,
        scheduled_for: DateTime<Utc>,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            property_id,
            contact_number,
            body,
            direction: Direction::Outbound,
            is_automated: false,
            trigger_event: None,
            stay_id: None,
            status: MessageStatus::Pending,
            scheduled_for,
            attempts: 0,
            max_attempts,
            error_message: None,
            claimed_at: None,
            provider_message_id: None,
            status_api: None,
            reaction: None,
            sent_at: None,
            created_at: now,
        }
    }

    /// Tag a job as produced by an automation trigger for a stay.
    #[must_use]
    pub fn automated(mut self, trigger: TriggerEvent, stay_id: String) -> Self {
        self.is_automated = true;
        self.trigger_event = Some(trigger);
        self.stay_id = Some(stay_id);
        self
    }

    /// Construct a message mirrored from a gateway webhook.
    ///
    /// The id is the provider id when one was supplied.
    #[must_use]
    pub fn mirrored(
        property_id: String,
        contact_number: String,
        body: String,
        direction: Direction,
        provider_message_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let status = match direction {
            Direction::Inbound => MessageStatus::Received,
            Direction::Outbound => MessageStatus::Sent,
        };
        Self {
            id: provider_message_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            property_id,
            contact_number,
            body,
            direction,
            is_automated: false,
            trigger_event: None,
            stay_id: None,
            status,
            scheduled_for: now,
            attempts: 0,
            max_attempts: 0,
            error_message: None,
            claimed_at: None,
            provider_message_id,
            status_api: None,
            reaction: None,
            sent_at: Some(now),
            created_at: now,
        }
    }
}
