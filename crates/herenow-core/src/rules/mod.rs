//! Visibility rules.
//!
//! Each rule inspects one task against one context and returns a
//! pass/fail [`RuleOutcome`] with a human-readable reason. Rules never
//! fail: collaborator errors are folded into the verdict according to
//! the rule's own fail-open or fail-closed policy.

mod dependency;
mod location;
mod priority;
mod time;

pub use dependency::DependencyRule;
pub use location::LocationRule;
pub use priority::{
    dynamic_threshold, PriorityRule, PriorityScorer, ScoreBreakdown, ScoreTerm, ScoreWeights,
};
pub use time::TimeRule;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{Context, MAX_ENERGY};
use crate::task::Task;

/// Names of the built-in rules.
pub mod names {
    pub const LOCATION: &str = "location";
    pub const TIME: &str = "time";
    pub const DEPENDENCY: &str = "dependency";
    pub const PRIORITY: &str = "priority";
}

/// Pass/fail result of one rule for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub visible: bool,
    pub reason: String,
}

impl RuleOutcome {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            visible: true,
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            visible: false,
            reason: reason.into(),
        }
    }
}

/// A rule's outcome tagged with the task and rule it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVerdict {
    pub task_id: String,
    pub rule_name: String,
    pub visible: bool,
    pub reason: String,
}

impl RuleVerdict {
    pub fn new(
        task_id: impl Into<String>,
        rule_name: impl Into<String>,
        outcome: RuleOutcome,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            rule_name: rule_name.into(),
            visible: outcome.visible,
            reason: outcome.reason,
        }
    }
}

/// A pluggable visibility rule.
///
/// `priority` only orders verdicts in explanations (higher first); it
/// has no effect on the AND-aggregation.
#[async_trait]
pub trait Rule: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    async fn apply(&self, ctx: &Context, task: &Task) -> RuleOutcome;
}

/// Energy (1-5) a task is expected to demand, from its estimate and
/// priority.
///
/// Step thresholds on the estimate (>120 min: 4, >60: 3, >30: 2, else 1),
/// plus one for priority 8 and above, capped at 5.
pub fn required_energy(task: &Task) -> u8 {
    let minutes = task.estimate().unwrap_or(0);
    let base: u8 = if minutes > 120 {
        4
    } else if minutes > 60 {
        3
    } else if minutes > 30 {
        2
    } else {
        1
    };
    let bump = u8::from(task.priority.value() >= 8);
    (base + bump).min(MAX_ENERGY)
}
