//! Fit of a task's estimate into the available time, the calendar and
//! the user's energy.
//!
//! A failed calendar lookup counts as "no conflict": availability wins
//! here, unlike the location rule which hides on lookup failure.

use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use super::{names, required_energy, Rule, RuleOutcome};
use crate::config::{EngineConfig, MAX_CALENDAR_BUFFER_MINUTES};
use crate::context::Context;
use crate::lookup::{bounded, CalendarLookup};
use crate::task::{CalendarEvent, Task};

pub struct TimeRule {
    enabled: bool,
    min_energy_level: u8,
    buffer: Duration,
    timeout: StdDuration,
    calendar: Arc<dyn CalendarLookup>,
}

impl TimeRule {
    pub fn new(calendar: Arc<dyn CalendarLookup>, config: &EngineConfig) -> Self {
        Self {
            enabled: config.time_enabled,
            min_energy_level: config.min_energy_level,
            buffer: Duration::try_minutes(
                config
                    .calendar_buffer_minutes
                    .clamp(0, MAX_CALENDAR_BUFFER_MINUTES),
            )
            .unwrap_or_else(Duration::zero),
            timeout: config.lookup_timeout(),
            calendar,
        }
    }

    /// First busy event overlapping the task's prospective window.
    ///
    /// A window that falls outside the representable time range has no
    /// conflict.
    async fn find_conflict(&self, ctx: &Context, estimate: u32) -> Option<CalendarEvent> {
        let span = Duration::minutes(i64::from(estimate)) + self.buffer;
        let window = ctx
            .timestamp
            .checked_sub_signed(self.buffer)
            .zip(ctx.timestamp.checked_add_signed(span));
        let Some((start, end)) = window else {
            tracing::warn!(
                user_id = %ctx.user_id,
                timestamp = %ctx.timestamp,
                "calendar window out of range, assuming no conflict"
            );
            return None;
        };

        match bounded(
            "events_in_range",
            self.timeout,
            self.calendar.events_in_range(&ctx.user_id, start, end),
        )
        .await
        {
            Ok(events) => events
                .into_iter()
                .find(|e| e.busy && e.overlaps(start, end)),
            Err(e) => {
                tracing::warn!(
                    user_id = %ctx.user_id,
                    error = %e,
                    "calendar lookup failed, assuming no conflict"
                );
                None
            }
        }
    }
}

#[async_trait]
impl Rule for TimeRule {
    fn name(&self) -> &str {
        names::TIME
    }

    fn priority(&self) -> i32 {
        80
    }

    async fn apply(&self, ctx: &Context, task: &Task) -> RuleOutcome {
        if !self.enabled {
            return RuleOutcome::pass("time filtering disabled");
        }

        let Some(estimate) = task.estimate() else {
            return RuleOutcome::pass("no time estimate");
        };

        let available = ctx.available();
        if available == 0 {
            return RuleOutcome::fail("no time available");
        }

        if estimate > available {
            return RuleOutcome::fail(format!(
                "needs {estimate} min but only {available} min available"
            ));
        }

        if let Some(event) = self.find_conflict(ctx, estimate).await {
            return RuleOutcome::fail(format!("conflicts with calendar event '{}'", event.title));
        }

        let required = required_energy(task).max(self.min_energy_level);
        let energy = ctx.energy();
        if required > energy {
            return RuleOutcome::fail(format!(
                "requires energy {required} but current energy is {energy}"
            ));
        }

        RuleOutcome::pass(format!(
            "fits: {estimate} of {available} min, energy {required} of {energy}"
        ))
    }
}
