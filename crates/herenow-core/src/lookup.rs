//! Read-only collaborator interfaces.
//!
//! Persistence lives outside this crate. The engine reaches tasks'
//! locations, dependencies, statuses and the user's calendar only
//! through these traits, and hands one [`AuditRecord`] per verdict to an
//! [`AuditSink`]. Implementations must be safe for concurrent calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::LookupError;
use crate::task::{CalendarEvent, Location, TaskDependency, TaskStatus};

pub type LookupResult<T> = std::result::Result<T, LookupError>;

/// Locations at which a task can be done.
#[async_trait]
pub trait LocationLookup: Send + Sync {
    async fn locations_for_task(&self, task_id: &str) -> LookupResult<Vec<Location>>;
}

/// The user's calendar.
#[async_trait]
pub trait CalendarLookup: Send + Sync {
    /// Events that intersect `[start, end]`.
    async fn events_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> LookupResult<Vec<CalendarEvent>>;
}

/// The task dependency graph.
#[async_trait]
pub trait DependencyLookup: Send + Sync {
    /// Outgoing edges of `task_id` (what it depends on).
    async fn dependencies_for_task(&self, task_id: &str) -> LookupResult<Vec<TaskDependency>>;

    async fn status_of_task(&self, task_id: &str) -> LookupResult<TaskStatus>;
}

/// One persisted (task, rule) decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub task_id: String,
    pub context_id: String,
    pub rule_name: String,
    pub visible: bool,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> LookupResult<()>;
}

/// Audit sink that emits each record as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> LookupResult<()> {
        tracing::info!(
            target: "herenow::audit",
            task_id = %record.task_id,
            context_id = %record.context_id,
            rule = %record.rule_name,
            visible = record.visible,
            reason = %record.reason,
            "rule verdict"
        );
        Ok(())
    }
}

/// The collaborators the default rule set needs.
#[derive(Clone)]
pub struct Collaborators {
    pub locations: Arc<dyn LocationLookup>,
    pub calendar: Arc<dyn CalendarLookup>,
    pub dependencies: Arc<dyn DependencyLookup>,
    pub audit: Arc<dyn AuditSink>,
}

impl Collaborators {
    /// Use one store for every lookup and the audit sink.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: LocationLookup + CalendarLookup + DependencyLookup + AuditSink + 'static,
    {
        Self {
            locations: store.clone(),
            calendar: store.clone(),
            dependencies: store.clone(),
            audit: store,
        }
    }

    /// Replace the audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
}

/// Run a collaborator call under a time budget.
///
/// An elapsed budget becomes [`LookupError::Timeout`] so callers apply
/// the same fallback policy as for any other lookup failure.
pub async fn bounded<T, F>(operation: &'static str, budget: Duration, call: F) -> LookupResult<T>
where
    F: Future<Output = LookupResult<T>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(LookupError::Timeout {
            operation,
            after: budget,
        }),
    }
}
