//! Visibility engine.
//!
//! Runs every registered rule against every task, records one audit
//! entry per (task, rule) verdict, and keeps a task only when all of its
//! verdicts pass. Nothing short-circuits: a task hidden by the first
//! rule still gets verdicts from the rest, so the audit trail is
//! complete.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::EngineConfig;
use crate::context::Context;
use crate::lookup::{bounded, AuditRecord, AuditSink, Collaborators};
use crate::rules::{
    dynamic_threshold, DependencyRule, LocationRule, PriorityRule, PriorityScorer, Rule,
    RuleVerdict, ScoreBreakdown, TimeRule,
};
use crate::task::Task;

/// Result of [`FilterEngine::filter_tasks`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    /// Tasks whose verdicts all passed, in input order
    pub visible: Vec<Task>,
    /// Every verdict, task-major, rules in registration order
    pub verdicts: Vec<RuleVerdict>,
}

impl FilterOutcome {
    pub fn verdicts_for<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a RuleVerdict> {
        self.verdicts.iter().filter(move |v| v.task_id == task_id)
    }

    pub fn is_visible(&self, task_id: &str) -> bool {
        self.visible.iter().any(|t| t.id == task_id)
    }
}

/// Why a task is or isn't showing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskVisibilityExplanation {
    pub task_id: String,
    pub title: String,
    pub visible: bool,
    /// Ordered by rule priority, highest first
    pub verdicts: Vec<RuleVerdict>,
}

impl TaskVisibilityExplanation {
    /// Verdicts that hide the task.
    pub fn failing(&self) -> impl Iterator<Item = &RuleVerdict> {
        self.verdicts.iter().filter(|v| !v.visible)
    }
}

impl fmt::Display for TaskVisibilityExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.visible { "visible" } else { "hidden" };
        writeln!(f, "{} ({}): {}", self.title, self.task_id, state)?;
        for v in &self.verdicts {
            let mark = if v.visible { "pass" } else { "FAIL" };
            writeln!(f, "  [{mark}] {}: {}", v.rule_name, v.reason)?;
        }
        Ok(())
    }
}

/// A visible task with its priority score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTask {
    pub task: Task,
    pub score: ScoreBreakdown,
    pub threshold: f64,
}

/// Rule pipeline over tasks and a live context.
pub struct FilterEngine {
    config: EngineConfig,
    rules: RwLock<Vec<Arc<dyn Rule>>>,
    audit: Arc<dyn AuditSink>,
    scorer: PriorityScorer,
}

impl FilterEngine {
    /// Engine with the location, time, dependency and priority rules.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        let rules: Vec<Arc<dyn Rule>> = vec![
            Arc::new(LocationRule::new(collaborators.locations.clone(), &config)),
            Arc::new(TimeRule::new(collaborators.calendar.clone(), &config)),
            Arc::new(DependencyRule::new(
                collaborators.dependencies.clone(),
                &config,
            )),
            Arc::new(PriorityRule::new(&config)),
        ];
        Self {
            scorer: PriorityScorer::from_config(&config),
            config,
            rules: RwLock::new(rules),
            audit: collaborators.audit,
        }
    }

    /// Engine with no rules registered.
    pub fn empty(config: EngineConfig, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            scorer: PriorityScorer::from_config(&config),
            config,
            rules: RwLock::new(Vec::new()),
            audit,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a rule. A rule with the same name is replaced in place.
    ///
    /// Waits for in-flight filtering to finish.
    pub async fn add_rule(&self, rule: Arc<dyn Rule>) {
        let mut rules = self.rules.write().await;
        match rules.iter().position(|r| r.name() == rule.name()) {
            Some(idx) => rules[idx] = rule,
            None => rules.push(rule),
        }
    }

    /// Remove the rule called `name`. Returns whether one was removed.
    pub async fn remove_rule(&self, name: &str) -> bool {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|r| r.name() != name);
        rules.len() != before
    }

    pub async fn rule_names(&self) -> Vec<String> {
        self.rules
            .read()
            .await
            .iter()
            .map(|r| r.name().to_string())
            .collect()
    }

    /// Evaluate every rule against every task.
    ///
    /// Tasks are processed concurrently, at most `max_concurrency` at a
    /// time; output order follows input order.
    #[tracing::instrument(skip_all, fields(context_id = %ctx.id, tasks = tasks.len()))]
    pub async fn filter_tasks(&self, ctx: &Context, tasks: &[Task]) -> FilterOutcome {
        let rules = self.rules.read().await;
        let limit = self.config.max_concurrency.max(1);

        let futures: Vec<_> = tasks
            .iter()
            .map(|task| self.evaluate_and_record(&rules, ctx, task))
            .collect();
        let per_task: Vec<Vec<RuleVerdict>> = stream::iter(futures)
            .buffered(limit)
            .collect()
            .await;

        let mut visible = Vec::new();
        let mut verdicts = Vec::with_capacity(tasks.len() * rules.len());
        for (task, task_verdicts) in tasks.iter().zip(per_task) {
            if task_verdicts.iter().all(|v| v.visible) {
                visible.push(task.clone());
            }
            verdicts.extend(task_verdicts);
        }

        tracing::info!(
            visible = visible.len(),
            hidden = tasks.len() - visible.len(),
            rules = rules.len(),
            "filtered tasks"
        );

        FilterOutcome { visible, verdicts }
    }

    /// Evaluate one task the same way `filter_tasks` would, without
    /// writing audit records.
    pub async fn explain_task_visibility(
        &self,
        ctx: &Context,
        task: &Task,
    ) -> TaskVisibilityExplanation {
        let rules = self.rules.read().await;

        let mut ranked: Vec<(i32, RuleVerdict)> = Vec::with_capacity(rules.len());
        for rule in rules.iter() {
            let outcome = rule.apply(ctx, task).await;
            ranked.push((rule.priority(), RuleVerdict::new(&task.id, rule.name(), outcome)));
        }
        // stable: equal priorities keep registration order
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        let verdicts: Vec<RuleVerdict> = ranked.into_iter().map(|(_, v)| v).collect();
        TaskVisibilityExplanation {
            task_id: task.id.clone(),
            title: task.title.clone(),
            visible: verdicts.iter().all(|v| v.visible),
            verdicts,
        }
    }

    /// Filter, then order the visible tasks by priority score.
    ///
    /// Ties go to the earlier due date, then to the lower task id.
    pub async fn rank_tasks(&self, ctx: &Context, tasks: &[Task]) -> Vec<RankedTask> {
        let outcome = self.filter_tasks(ctx, tasks).await;
        let threshold = dynamic_threshold(ctx);

        let mut ranked: Vec<RankedTask> = outcome
            .visible
            .into_iter()
            .map(|task| RankedTask {
                score: self.scorer.score(ctx, &task),
                threshold,
                task,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_score
                .partial_cmp(&a.score.total_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| match (a.task.due_at, b.task.due_at) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
                .then_with(|| a.task.id.cmp(&b.task.id))
        });
        ranked
    }

    async fn evaluate_and_record(
        &self,
        rules: &[Arc<dyn Rule>],
        ctx: &Context,
        task: &Task,
    ) -> Vec<RuleVerdict> {
        let mut verdicts = Vec::with_capacity(rules.len());
        for rule in rules {
            let outcome = rule.apply(ctx, task).await;
            let verdict = RuleVerdict::new(&task.id, rule.name(), outcome);
            tracing::debug!(
                task_id = %verdict.task_id,
                rule = %verdict.rule_name,
                visible = verdict.visible,
                reason = %verdict.reason,
                "verdict"
            );
            self.record(ctx, &verdict).await;
            verdicts.push(verdict);
        }
        verdicts
    }

    async fn record(&self, ctx: &Context, verdict: &RuleVerdict) {
        let record = AuditRecord {
            task_id: verdict.task_id.clone(),
            context_id: ctx.id.clone(),
            rule_name: verdict.rule_name.clone(),
            visible: verdict.visible,
            reason: verdict.reason.clone(),
            recorded_at: ctx.timestamp,
        };
        if let Err(e) = bounded(
            "audit_record",
            self.config.lookup_timeout(),
            self.audit.record(&record),
        )
        .await
        {
            tracing::warn!(
                task_id = %record.task_id,
                rule = %record.rule_name,
                error = %e,
                "failed to record verdict"
            );
        }
    }
}
