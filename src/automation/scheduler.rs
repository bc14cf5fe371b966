//! Daily automation sweep.
//!
//! Walks every tenant and its open stays, evaluates the trigger rules, and
//! hands each match to the [`QueueWriter`]. Failures are isolated per stay
//! and per tenant so one bad record never stops the sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::models::automation::{AutomationRule, MessageTemplate, TriggerEvent};
use crate::models::property::Property;
use crate::models::stay::Stay;
use crate::persistence::db::Database;
use crate::persistence::property_repo::PropertyRepo;
use crate::persistence::stay_repo::StayRepo;
use crate::Result;

use super::trigger::{evaluate, EvaluationContext, TriggerMatch};
use super::writer::{AutomatedMessage, QueueWriter};

/// Aggregate result of one automation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySweepSummary {
    /// Tenants visited.
    pub properties: u32,
    /// Stays run through the evaluator.
    pub stays_evaluated: u32,
    /// Jobs written to the queue.
    pub enqueued: u32,
    /// Matches dropped because of missing data.
    pub skipped: u32,
    /// Stays or tenants that failed with an error.
    pub errors: u32,
}

enum FireOutcome {
    Enqueued,
    Skipped,
}

/// Tenant-scoped lookups loaded once per sweep.
struct TenantRules {
    rules: HashMap<TriggerEvent, AutomationRule>,
    templates: HashMap<String, MessageTemplate>,
}

/// Runs the automation sweep over all tenants.
#[derive(Clone)]
pub struct AutomationScheduler {
    properties: PropertyRepo,
    stays: StayRepo,
    writer: QueueWriter,
    default_tz: Tz,
    checkout_cutoff_hour: u32,
}

impl AutomationScheduler {
    /// Create a scheduler over the shared database.
    #[must_use]
    pub fn new(db: Arc<Database>, config: &GlobalConfig) -> Self {
        Self {
            properties: PropertyRepo::new(Arc::clone(&db)),
            stays: StayRepo::new(Arc::clone(&db)),
            writer: QueueWriter::new(db, config.queue.max_attempts),
            default_tz: config.default_tz(),
            checkout_cutoff_hour: config.automation.checkout_cutoff_hour,
        }
    }

    /// Run one sweep as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` only if the tenant list cannot be loaded; every
    /// later failure is logged and counted in [`DailySweepSummary::errors`].
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<DailySweepSummary> {
        let properties = self.properties.list_all().await?;
        let mut summary = DailySweepSummary::default();

        for property in &properties {
            summary.properties += 1;
            let span = info_span!("automation_property", property_id = %property.id);
            if let Err(err) = self
                .sweep_property(property, now, &mut summary)
                .instrument(span)
                .await
            {
                error!(property_id = %property.id, %err, "automation sweep failed for property");
                summary.errors += 1;
            }
        }

        info!(
            properties = summary.properties,
            stays = summary.stays_evaluated,
            enqueued = summary.enqueued,
            skipped = summary.skipped,
            errors = summary.errors,
            "automation sweep complete"
        );
        Ok(summary)
    }

    async fn sweep_property(
        &self,
        property: &Property,
        now: DateTime<Utc>,
        summary: &mut DailySweepSummary,
    ) -> Result<()> {
        let rules = self.properties.active_rules(&property.id).await?;
        if rules.is_empty() {
            debug!("no active automation rules");
            return Ok(());
        }
        let tenant = TenantRules {
            rules,
            templates: self.properties.templates(&property.id).await?,
        };

        let ctx = EvaluationContext {
            now,
            tz: self.tenant_tz(property),
            checkout_cutoff_hour: self.checkout_cutoff_hour,
        };

        for stay in self.stays.list_schedulable(&property.id).await? {
            let stay = match stay {
                Ok(stay) => stay,
                Err(err) => {
                    error!(%err, "skipping unreadable stay");
                    summary.errors += 1;
                    continue;
                }
            };
            summary.stays_evaluated += 1;
            let Some(matched) = evaluate(&stay, &ctx, &tenant.rules) else {
                continue;
            };

            match self.fire(property, &stay, &tenant, matched, now).await {
                Ok(FireOutcome::Enqueued) => summary.enqueued += 1,
                Ok(FireOutcome::Skipped) => summary.skipped += 1,
                Err(err) => {
                    error!(
                        stay_id = %stay.id,
                        trigger = matched.trigger.as_str(),
                        %err,
                        "failed to queue automated message"
                    );
                    summary.errors += 1;
                }
            }
        }

        Ok(())
    }

    async fn fire(
        &self,
        property: &Property,
        stay: &Stay,
        tenant: &TenantRules,
        matched: TriggerMatch,
        now: DateTime<Utc>,
    ) -> Result<FireOutcome> {
        let trigger = matched.trigger.as_str();
        let Some(template) = tenant
            .rules
            .get(&matched.trigger)
            .and_then(|rule| tenant.templates.get(&rule.template_id))
        else {
            warn!(stay_id = %stay.id, trigger, "rule template missing; skipping");
            return Ok(FireOutcome::Skipped);
        };

        let Some(guest) = self.stays.get_guest(&stay.guest_id).await? else {
            warn!(stay_id = %stay.id, guest_id = %stay.guest_id, "guest not found; skipping");
            return Ok(FireOutcome::Skipped);
        };
        if guest.phone.as_deref().is_none_or(|p| p.trim().is_empty()) {
            debug!(stay_id = %stay.id, guest_id = %guest.id, "guest has no phone; skipping");
            return Ok(FireOutcome::Skipped);
        }

        let cabin = match stay.cabin_id.as_deref() {
            Some(cabin_id) => match self.stays.get_cabin(cabin_id).await {
                Ok(cabin) => cabin,
                Err(err) => {
                    warn!(stay_id = %stay.id, cabin_id, %err, "cabin lookup failed; sending without it");
                    None
                }
            },
            None => None,
        };

        self.writer
            .enqueue_automated(
                AutomatedMessage {
                    property,
                    stay,
                    guest: &guest,
                    cabin: cabin.as_ref(),
                    template,
                    trigger: matched.trigger,
                    delay_minutes: matched.delay_minutes,
                },
                now,
            )
            .await?;
        Ok(FireOutcome::Enqueued)
    }

    fn tenant_tz(&self, property: &Property) -> Tz {
        match property.timezone.as_deref() {
            Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                warn!(timezone = name, "invalid property timezone, using default");
                self.default_tz
            }),
            None => self.default_tz,
        }
    }
}

/// Spawn the embedded daily sweep loop.
///
/// The first sweep runs immediately, then every `interval` until `cancel`
/// fires.
#[must_use]
pub fn spawn_daily_task(
    scheduler: Arc<AutomationScheduler>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("automation task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = scheduler.run_sweep(Utc::now()).await {
                        error!(%err, "automation sweep failed");
                    }
                }
            }
        }
    })
}
