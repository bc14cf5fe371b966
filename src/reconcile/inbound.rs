//! Message webhook: mirror into the thread with echo suppression.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::models::conversation::normalize_number;
use crate::models::message::{Direction, Message};
use crate::{AppError, Result};

use super::{MessageEvent, RecordOutcome, Reconciler};

impl Reconciler {
    /// Mirror one gateway message event.
    ///
    /// Outbound events matching the latest outbound message to the same
    /// contact verbatim, sent within the echo window or with no send time,
    /// are treated as echoes and dropped. Redelivered events are dropped
    /// without touching the conversation summary.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for an incomplete payload,
    /// `AppError::NotFound` for an unknown property, or `AppError::Db`.
    pub async fn record_message(
        &self,
        event: MessageEvent,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome> {
        let property_id = event.property_id.trim();
        if property_id.is_empty() {
            return Err(AppError::Validation("propertyId is required".into()));
        }
        let contact = normalize_number(&event.contact_number);
        if contact.is_empty() {
            return Err(AppError::Validation("contactNumber is required".into()));
        }
        if event.text.is_empty() {
            return Err(AppError::Validation("text is required".into()));
        }
        let direction = Direction::parse(&event.direction).ok_or_else(|| {
            AppError::Validation(format!("invalid direction '{}'", event.direction))
        })?;
        let provider_id = event
            .message_id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty());

        if self.properties.get(property_id).await?.is_none() {
            return Err(AppError::NotFound(format!("property {property_id} not found")));
        }

        if direction == Direction::Outbound
            && self
                .is_echo(property_id, &contact, &event.text, now)
                .await?
        {
            debug!(property_id, contact = %contact, "outbound echo suppressed");
            return Ok(RecordOutcome::Echo);
        }

        let message = Message::mirrored(
            property_id.to_owned(),
            contact.clone(),
            event.text,
            direction,
            provider_id,
            now,
        );
        let guest_id = self
            .stays
            .find_guest_by_phone(property_id, &contact)
            .await?
            .map(|guest| guest.id);
        let Some(contact_created) = self
            .messages
            .insert_mirrored(&message, guest_id.as_deref(), now)
            .await?
        else {
            debug!(message_id = %message.id, "message already recorded");
            return Ok(RecordOutcome::Duplicate { id: message.id });
        };
        if contact_created {
            info!(property_id, contact = %contact, "contact created");
        }

        info!(
            message_id = %message.id,
            property_id,
            direction = direction.as_str(),
            "message mirrored"
        );
        Ok(RecordOutcome::Recorded { id: message.id })
    }

    async fn is_echo(
        &self,
        property_id: &str,
        contact: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(latest) = self
            .messages
            .latest_outbound_for_contact(property_id, contact)
            .await?
        else {
            return Ok(false);
        };
        if latest.body != text {
            return Ok(false);
        }
        Ok(latest
            .sent_at
            .is_none_or(|sent_at| now - sent_at <= self.echo_window))
    }
}
