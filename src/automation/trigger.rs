//! Trigger evaluation for automated guest messages.
//!
//! Pure functions: every input, including "now" and the tenant time zone,
//! is passed explicitly so the rules are testable without a wall clock.

use std::collections::HashMap;

use chrono::{DateTime, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::automation::{AutomationRule, TriggerEvent};
use crate::models::stay::{Stay, StayStatus};

/// A trigger that fired for a stay, with the delay to apply when queueing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerMatch {
    /// Trigger that fired.
    pub trigger: TriggerEvent,
    /// Minutes between enqueue time and `scheduled_for`.
    pub delay_minutes: i64,
}

/// Clock and locale inputs for one evaluation pass.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext {
    /// Instant of the sweep.
    pub now: DateTime<Utc>,
    /// Tenant civil time zone.
    pub tz: Tz,
    /// Local hour at which pre-checkout messages are released.
    pub checkout_cutoff_hour: u32,
}

impl EvaluationContext {
    /// Tenant-local calendar date of `now`.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now.with_timezone(&self.tz).date_naive()
    }
}

/// Whole days from `today` until `date` (negative when in the past).
#[must_use]
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Minutes from `now` until `hour:00` on the same local day in `tz`.
///
/// Returns 0 once that moment has passed. A local time skipped by a DST
/// transition resolves to the next valid hour.
#[must_use]
pub fn minutes_until_local_hour(now: DateTime<Utc>, tz: Tz, hour: u32) -> i64 {
    let local_date = now.with_timezone(&tz).date_naive();
    let Some(mut target_naive) = local_date.and_hms_opt(hour, 0, 0) else {
        return 0;
    };

    let target = loop {
        match tz.from_local_datetime(&target_naive) {
            LocalResult::Single(dt) => break dt,
            LocalResult::Ambiguous(earliest, _) => break earliest,
            LocalResult::None => {
                target_naive += chrono::Duration::hours(1);
                if target_naive.date() != local_date {
                    return 0;
                }
            }
        }
    };

    (target.with_timezone(&Utc) - now).num_minutes().max(0)
}

/// Decide which trigger, if any, fires for `stay`.
///
/// Triggers are checked in [`TriggerEvent::ALL`] order and the first match
/// wins, so a stay never receives two triggers in one pass. Each trigger
/// requires its rule to be present in `rules` and active.
#[must_use]
pub fn evaluate(
    stay: &Stay,
    ctx: &EvaluationContext,
    rules: &HashMap<TriggerEvent, AutomationRule>,
) -> Option<TriggerMatch> {
    let today = ctx.today();
    let flags = &stay.automation_flags;

    TriggerEvent::ALL.into_iter().find_map(|trigger| {
        let rule = rules.get(&trigger).filter(|rule| rule.active)?;
        if !flags.is_eligible(trigger) {
            return None;
        }

        let fires = match trigger {
            TriggerEvent::PreCheckin48h => {
                stay.status == StayStatus::Pending && days_until(stay.check_in, today) == 2
            }
            TriggerEvent::PreCheckin24h => {
                stay.status == StayStatus::Pending && days_until(stay.check_in, today) == 1
            }
            TriggerEvent::PreCheckout => {
                stay.status == StayStatus::Active && days_until(stay.check_out, today) == 1
            }
        };
        if !fires {
            return None;
        }

        let delay_minutes = match trigger {
            TriggerEvent::PreCheckout => {
                minutes_until_local_hour(ctx.now, ctx.tz, ctx.checkout_cutoff_hour)
            }
            _ => rule.delay_minutes.max(0),
        };

        Some(TriggerMatch {
            trigger,
            delay_minutes,
        })
    })
}
