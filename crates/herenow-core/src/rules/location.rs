//! Proximity to a task's required locations.
//!
//! Unknown user position is fail-open; a failed location lookup is
//! fail-closed, since feasibility cannot be confirmed.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{names, Rule, RuleOutcome};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::lookup::{bounded, LocationLookup};
use crate::task::{Location, Task};

pub struct LocationRule {
    enabled: bool,
    max_distance_meters: f64,
    timeout: Duration,
    lookup: Arc<dyn LocationLookup>,
}

impl LocationRule {
    pub fn new(lookup: Arc<dyn LocationLookup>, config: &EngineConfig) -> Self {
        Self {
            enabled: config.location_enabled,
            max_distance_meters: config.max_distance_meters,
            timeout: config.lookup_timeout(),
            lookup,
        }
    }

    fn threshold_for(&self, location: &Location) -> f64 {
        if location.radius_meters > 0.0 {
            location.radius_meters
        } else {
            self.max_distance_meters
        }
    }
}

#[async_trait]
impl Rule for LocationRule {
    fn name(&self) -> &str {
        names::LOCATION
    }

    fn priority(&self) -> i32 {
        90
    }

    async fn apply(&self, ctx: &Context, task: &Task) -> RuleOutcome {
        if !self.enabled {
            return RuleOutcome::pass("location filtering disabled");
        }

        let here = ctx.position();
        if here.is_none() && ctx.current_location_id.is_none() {
            return RuleOutcome::pass("current location unknown");
        }

        let locations = match bounded(
            "locations_for_task",
            self.timeout,
            self.lookup.locations_for_task(&task.id),
        )
        .await
        {
            Ok(locations) => locations,
            Err(e) => {
                tracing::warn!(
                    task_id = %task.id,
                    error = %e,
                    "location lookup failed, hiding task"
                );
                return RuleOutcome::fail(format!("could not load task locations: {e}"));
            }
        };

        if locations.is_empty() {
            return RuleOutcome::pass("no location constraint");
        }

        if let Some(current) = ctx.current_location_id.as_deref() {
            if let Some(location) = locations.iter().find(|l| l.id == current) {
                return RuleOutcome::pass(format!("at {} (current location)", location.name));
            }
        }

        let Some(here) = here else {
            return RuleOutcome::pass("current location unknown");
        };

        // (location, distance, threshold) of the closest miss so far
        let mut nearest: Option<(&Location, f64, f64)> = None;

        for location in &locations {
            let distance = here.distance_to(&location.coordinates());
            let threshold = self.threshold_for(location);

            if distance <= threshold {
                return RuleOutcome::pass(format!(
                    "at {} ({:.0}m away, within {:.0}m)",
                    location.name, distance, threshold
                ));
            }

            if nearest.map_or(true, |(_, d, _)| distance < d) {
                nearest = Some((location, distance, threshold));
            }
        }

        match nearest {
            Some((location, distance, threshold)) => RuleOutcome::fail(format!(
                "nearest location {} is {:.0}m away (threshold {:.0}m)",
                location.name, distance, threshold
            )),
            None => RuleOutcome::pass("no location constraint"),
        }
    }
}
