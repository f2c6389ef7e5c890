//! Priority scoring against a dynamic threshold.
//!
//! Unlike the other rules this one is not a precondition check. It
//! combines four subscores in [0, 1] into a weighted total and compares
//! it to a threshold that moves with the context:
//!
//! | Term     | Base weight | Source                                  |
//! |----------|-------------|-----------------------------------------|
//! | priority | 0.4         | task priority / 10                      |
//! | urgency  | 0.3         | hours until due, stepped                |
//! | context  | 0.2         | time fit + social-setting keywords      |
//! | energy   | 0.1         | required vs. current energy             |
//!
//! Short on time shifts weight from priority to urgency; low energy
//! shifts weight from context to energy. The same breakdown is used to
//! rank visible tasks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{names, required_energy, Rule, RuleOutcome};
use crate::config::EngineConfig;
use crate::context::{Context, SocialContext, MAX_ENERGY};
use crate::task::Task;

const WORK_KEYWORDS: &[&str] = &[
    "meeting",
    "report",
    "email",
    "client",
    "presentation",
    "deadline",
    "project",
    "invoice",
    "review",
    "call",
];

const FAMILY_KEYWORDS: &[&str] = &[
    "family", "kid", "kids", "dinner", "home", "groceries", "birthday", "parent", "chore",
];

const FOCUS_KEYWORDS: &[&str] = &[
    "study", "write", "research", "design", "code", "read", "learn", "analyze", "plan",
];

const COMPLEX_KEYWORDS: &[&str] = &[
    "complex",
    "research",
    "architecture",
    "analysis",
    "analyze",
    "strategy",
    "design",
];

/// Threshold bounds.
const MIN_THRESHOLD: f64 = 0.1;
const MAX_THRESHOLD: f64 = 0.9;

/// Individual term with weight and score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTerm {
    /// Term name
    pub name: String,
    /// Weight for this term
    pub weight: f64,
    /// Raw score (0.0 to 1.0, higher is better)
    pub score: f64,
    /// Weighted contribution
    pub contribution: f64,
}

impl ScoreTerm {
    pub fn new(name: impl Into<String>, weight: f64, score: f64) -> Self {
        let weight = weight.max(0.0);
        let score = score.clamp(0.0, 1.0);
        Self {
            name: name.into(),
            weight,
            score,
            contribution: weight * score,
        }
    }
}

/// Complete scoring breakdown for explainability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScoreBreakdown {
    pub terms: Vec<ScoreTerm>,
    /// Total weighted score (0.0 to 1.0)
    pub total_score: f64,
}

impl ScoreBreakdown {
    pub fn add_term(&mut self, term: ScoreTerm) {
        self.total_score += term.contribution;
        self.terms.push(term);
    }

    pub fn term(&self, name: &str) -> Option<&ScoreTerm> {
        self.terms.iter().find(|t| t.name == name)
    }

    /// `name score x weight` for each term, in insertion order.
    pub fn describe(&self) -> String {
        self.terms
            .iter()
            .map(|t| format!("{} {:.2}x{:.2}", t.name, t.score, t.weight))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Weights for each term after context adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub priority: f64,
    pub urgency: f64,
    pub context: f64,
    pub energy: f64,
}

impl ScoreWeights {
    pub fn base() -> Self {
        Self {
            priority: 0.4,
            urgency: 0.3,
            context: 0.2,
            energy: 0.1,
        }
    }

    fn sum(&self) -> f64 {
        self.priority + self.urgency + self.context + self.energy
    }

    /// Normalize weights to sum to 1.0
    fn normalize(&mut self) {
        let sum = self.sum();
        if sum > 0.0 {
            self.priority /= sum;
            self.urgency /= sum;
            self.context /= sum;
            self.energy /= sum;
        }
    }

    fn floor_at_zero(&mut self) {
        self.priority = self.priority.max(0.0);
        self.urgency = self.urgency.max(0.0);
        self.context = self.context.max(0.0);
        self.energy = self.energy.max(0.0);
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::base()
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}

/// Whether any word of `text` is one of `keywords` (or its plural).
fn mentions(text: &str, keywords: &[&str]) -> bool {
    words(text).any(|w| {
        keywords
            .iter()
            .any(|k| w == *k || w.strip_suffix('s') == Some(*k))
    })
}

/// Task priority as a fraction of 10.
pub fn priority_score(task: &Task) -> f64 {
    task.priority.fraction()
}

/// Stepped urgency from hours left until the due date; 0.5 when there is none.
pub fn urgency_score(task: &Task, ctx: &Context) -> f64 {
    let Some(due) = task.due_at else {
        return 0.5;
    };
    let hours = (due - ctx.timestamp).num_seconds() as f64 / 3600.0;

    if hours <= 0.0 {
        1.0
    } else if hours <= 2.0 {
        0.9
    } else if hours <= 6.0 {
        0.8
    } else if hours <= 24.0 {
        0.6
    } else if hours <= 72.0 {
        0.4
    } else if hours <= 168.0 {
        0.2
    } else {
        0.1
    }
}

/// Time fit plus social-setting keyword bonus, clipped to [0, 1].
pub fn context_score(task: &Task, ctx: &Context) -> f64 {
    let mut score: f64 = 0.5;
    let available = ctx.available();

    match task.estimate() {
        None => score += 0.3,
        Some(estimate) if available >= estimate => score += 0.3,
        Some(estimate) if available as u64 * 2 >= estimate as u64 => score += 0.1,
        Some(_) => {}
    }

    let text = task.searchable_text();
    let social = ctx.social_context;

    if mentions(&text, WORK_KEYWORDS) {
        match social {
            SocialContext::AtWork => score += 0.2,
            SocialContext::WithFamily => score -= 0.1,
            _ => {}
        }
    }
    if mentions(&text, FAMILY_KEYWORDS) && social == SocialContext::WithFamily {
        score += 0.2;
    }
    if mentions(&text, FOCUS_KEYWORDS) && social == SocialContext::Alone {
        score += 0.15;
    }

    score.clamp(0.0, 1.0)
}

/// Energy demand including a bump for complex or long tasks.
pub fn scored_energy_requirement(task: &Task) -> u8 {
    let complex = mentions(&task.searchable_text(), COMPLEX_KEYWORDS)
        || task.estimate().is_some_and(|m| m > 60);
    (required_energy(task) + u8::from(complex)).min(MAX_ENERGY)
}

/// 1.0 when the user has enough energy, minus 0.2 per missing level.
pub fn energy_score(task: &Task, ctx: &Context) -> f64 {
    let required = scored_energy_requirement(task);
    let energy = ctx.energy();
    if required <= energy {
        1.0
    } else {
        let deficit = (required - energy) as f64;
        (1.0 - 0.2 * deficit).max(0.0)
    }
}

/// Acceptance threshold for the current context, in [0.1, 0.9].
pub fn dynamic_threshold(ctx: &Context) -> f64 {
    let mut threshold: f64 = 0.5;
    let available = ctx.available();
    let energy = ctx.energy();

    if available < 15 {
        threshold += 0.2;
    } else if available > 120 {
        threshold -= 0.1;
    }

    if energy <= 2 {
        threshold += 0.15;
    } else if energy >= 4 {
        threshold -= 0.1;
    }

    if ctx.social_context == SocialContext::AtWork {
        threshold -= 0.05;
    }

    let hour = ctx.local_hour();
    if (6..=10).contains(&hour) {
        threshold -= 0.1;
    } else if hour >= 22 || hour <= 5 {
        threshold += 0.2;
    }

    threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

/// Pure scoring logic shared by [`PriorityRule`] and task ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityScorer {
    priority_weight: f64,
}

impl PriorityScorer {
    pub fn new(priority_weight: f64) -> Self {
        Self { priority_weight }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.default_priority_weight)
    }

    /// Weights for `ctx` after the time and energy shifts.
    pub fn weights(&self, ctx: &Context) -> ScoreWeights {
        let mut w = ScoreWeights::base();
        w.priority *= self.priority_weight;

        if ctx.available() < 30 {
            w.urgency += 0.1;
            w.priority -= 0.1;
        }
        if ctx.energy() <= 2 {
            w.energy += 0.15;
            w.context -= 0.15;
        }

        w.floor_at_zero();
        if (w.sum() - 1.0).abs() > 1e-9 {
            w.normalize();
        }
        w
    }

    pub fn score(&self, ctx: &Context, task: &Task) -> ScoreBreakdown {
        let w = self.weights(ctx);
        let mut breakdown = ScoreBreakdown::default();
        breakdown.add_term(ScoreTerm::new("priority", w.priority, priority_score(task)));
        breakdown.add_term(ScoreTerm::new("urgency", w.urgency, urgency_score(task, ctx)));
        breakdown.add_term(ScoreTerm::new("context", w.context, context_score(task, ctx)));
        breakdown.add_term(ScoreTerm::new("energy", w.energy, energy_score(task, ctx)));
        breakdown
    }
}

impl Default for PriorityScorer {
    fn default() -> Self {
        Self::new(1.0)
    }
}

pub struct PriorityRule {
    enabled: bool,
    scorer: PriorityScorer,
}

impl PriorityRule {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            enabled: config.priority_enabled,
            scorer: PriorityScorer::from_config(config),
        }
    }
}

#[async_trait]
impl Rule for PriorityRule {
    fn name(&self) -> &str {
        names::PRIORITY
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn apply(&self, ctx: &Context, task: &Task) -> RuleOutcome {
        if !self.enabled {
            return RuleOutcome::pass("priority filtering disabled");
        }

        let breakdown = self.scorer.score(ctx, task);
        let threshold = dynamic_threshold(ctx);
        let total = breakdown.total_score;

        if total >= threshold {
            RuleOutcome::pass(format!(
                "score {total:.2} >= threshold {threshold:.2} [{}]",
                breakdown.describe()
            ))
        } else {
            RuleOutcome::fail(format!(
                "score {total:.2} < threshold {threshold:.2} [{}]",
                breakdown.describe()
            ))
        }
    }
}
