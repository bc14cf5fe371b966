//! Queue writer: renders and persists new delivery jobs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::models::automation::{MessageTemplate, TriggerEvent};
use crate::models::conversation::normalize_number;
use crate::models::message::Message;
use crate::models::property::Property;
use crate::models::stay::{Cabin, Guest, Stay};
use crate::persistence::db::Database;
use crate::persistence::message_repo::MessageRepo;
use crate::persistence::property_repo::PropertyRepo;
use crate::persistence::stay_repo::StayRepo;
use crate::{AppError, Result};

use super::template::{render, TemplateContext};

/// Everything needed to queue one automation-triggered message.
#[derive(Debug, Clone, Copy)]
pub struct AutomatedMessage<'a> {
    /// Owning tenant.
    pub property: &'a Property,
    /// Stay the trigger fired for.
    pub stay: &'a Stay,
    /// Recipient; must have a phone.
    pub guest: &'a Guest,
    /// Assigned cabin, when it could be resolved.
    pub cabin: Option<&'a Cabin>,
    /// Template configured on the rule.
    pub template: &'a MessageTemplate,
    /// Trigger that fired.
    pub trigger: TriggerEvent,
    /// Minutes to hold the job before it becomes due.
    pub delay_minutes: i64,
}

/// A message queued directly by another part of the product.
#[derive(Debug, Clone)]
pub struct ManualMessage {
    /// Owning tenant.
    pub property_id: String,
    /// Destination number in any common notation.
    pub to: String,
    /// Final text.
    pub body: String,
    /// Earliest send time; defaults to "now".
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Attempt cap; defaults to the configured cap.
    pub max_attempts: Option<u32>,
}

/// Writes pending jobs and advances the stay flag ledger.
#[derive(Clone)]
pub struct QueueWriter {
    messages: MessageRepo,
    properties: PropertyRepo,
    stays: StayRepo,
    default_max_attempts: u32,
}

impl QueueWriter {
    /// Create a writer over the shared database.
    #[must_use]
    pub fn new(db: Arc<Database>, default_max_attempts: u32) -> Self {
        Self {
            messages: MessageRepo::new(Arc::clone(&db)),
            properties: PropertyRepo::new(Arc::clone(&db)),
            stays: StayRepo::new(db),
            default_max_attempts,
        }
    }

    /// Render and queue an automated message, then mark the trigger as fired
    /// on the stay.
    ///
    /// The flag ledger is only written after the job row exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the guest has no usable phone, or
    /// `AppError::Db` if either write fails.
    pub async fn enqueue_automated(
        &self,
        request: AutomatedMessage<'_>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let phone = request
            .guest
            .phone
            .as_deref()
            .map(normalize_number)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                AppError::Validation(format!("guest {} has no phone", request.guest.id))
            })?;

        let ctx = TemplateContext {
            property_name: Some(&request.property.name),
            guest: Some(request.guest),
            cabin: request.cabin,
            stay: Some(request.stay),
        };
        let body = render(&request.template.body, &ctx);
        let scheduled_for = now + chrono::Duration::minutes(request.delay_minutes.max(0));

        let job = Message::new_job(
            request.property.id.clone(),
            phone,
            body,
            scheduled_for,
            self.default_max_attempts,
            now,
        )
        .automated(request.trigger, request.stay.id.clone());
        self.messages.insert(&job).await?;

        let mut flags = request.stay.automation_flags.clone();
        flags.mark_fired(request.trigger);
        if let Err(err) = self.stays.update_flags(&request.stay.id, &flags).await {
            warn!(
                job_id = %job.id,
                stay_id = %request.stay.id,
                %err,
                "job queued but flag ledger update failed; trigger may refire"
            );
            return Err(err);
        }

        info!(
            job_id = %job.id,
            property_id = %job.property_id,
            stay_id = %request.stay.id,
            trigger = request.trigger.as_str(),
            scheduled_for = %job.scheduled_for,
            "automated message queued"
        );
        Ok(job.id)
    }

    /// Queue a ready-made message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if a required field is empty or the
    /// attempt cap is zero, `AppError::NotFound` for an unknown property, or
    /// `AppError::Db` if the write fails.
    pub async fn enqueue(&self, request: ManualMessage, now: DateTime<Utc>) -> Result<String> {
        if request.property_id.trim().is_empty() {
            return Err(AppError::Validation("propertyId is required".into()));
        }
        let to = normalize_number(&request.to);
        if to.is_empty() {
            return Err(AppError::Validation("to must contain a phone number".into()));
        }
        if request.body.trim().is_empty() {
            return Err(AppError::Validation("body is required".into()));
        }
        let max_attempts = request.max_attempts.unwrap_or(self.default_max_attempts);
        if max_attempts == 0 {
            return Err(AppError::Validation("maxRetries must be at least 1".into()));
        }
        if self.properties.get(&request.property_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "property {} not found",
                request.property_id
            )));
        }

        let job = Message::new_job(
            request.property_id,
            to,
            request.body,
            request.scheduled_for.unwrap_or(now),
            max_attempts,
            now,
        );
        self.messages.insert(&job).await?;

        info!(
            job_id = %job.id,
            property_id = %job.property_id,
            scheduled_for = %job.scheduled_for,
            "message queued"
        );
        Ok(job.id)
    }
}
