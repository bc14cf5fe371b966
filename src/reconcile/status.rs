//! Status webhook: ack and reaction overlays.

use tracing::info;

use crate::models::message::AckLevel;
use crate::{AppError, Result};

use super::{Reconciler, StatusEvent};

impl Reconciler {
    /// Overlay an ack code or reaction onto an existing message.
    ///
    /// The message is resolved by internal id first, then by provider id.
    /// Only `status_api` or `reaction` is written.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for an incomplete payload,
    /// `AppError::NotFound` if no message of that tenant matches, or
    /// `AppError::Db`.
    pub async fn apply_status(&self, event: StatusEvent) -> Result<()> {
        let property_id = event.property_id.trim();
        if property_id.is_empty() {
            return Err(AppError::Validation("propertyId is required".into()));
        }
        let key = event.message_id.trim();
        if key.is_empty() {
            return Err(AppError::Validation("messageId is required".into()));
        }

        enum Patch {
            Ack(i64),
            Reaction(String),
        }
        let patch = match event.kind.as_str() {
            "ack" => Patch::Ack(
                event
                    .ack
                    .ok_or_else(|| AppError::Validation("ack is required".into()))?,
            ),
            "reaction" => Patch::Reaction(
                event
                    .reaction
                    .ok_or_else(|| AppError::Validation("reaction is required".into()))?,
            ),
            other => {
                return Err(AppError::Validation(format!("unknown status type '{other}'")));
            }
        };

        let message = self
            .messages
            .resolve(key)
            .await?
            .filter(|m| m.property_id == property_id)
            .ok_or_else(|| AppError::NotFound(format!("message {key} not found")))?;

        match patch {
            Patch::Ack(code) => {
                self.messages.apply_ack(&message.id, code).await?;
                info!(
                    message_id = %message.id,
                    ack = code,
                    level = ?AckLevel::from_code(code),
                    "ack applied"
                );
            }
            Patch::Reaction(reaction) => {
                self.messages.apply_reaction(&message.id, &reaction).await?;
                info!(message_id = %message.id, "reaction applied");
            }
        }
        Ok(())
    }
}
