//! In-memory collaborator store.
//!
//! Implements every lookup trait plus the audit sink over plain maps.
//! Handy for embedding the engine without a database and for tests,
//! which can also make individual lookups fail or stall.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::error::LookupError;
use crate::lookup::{
    AuditRecord, AuditSink, CalendarLookup, DependencyLookup, LocationLookup, LookupResult,
};
use crate::task::{CalendarEvent, Location, TaskDependency, TaskStatus};

/// Which lookups should report a backend failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureModes {
    pub locations: bool,
    pub calendar: bool,
    pub dependencies: bool,
    pub statuses: bool,
    pub audit: bool,
}

#[derive(Debug, Default)]
struct StoreInner {
    locations: HashMap<String, Vec<Location>>,
    events: HashMap<String, Vec<CalendarEvent>>,
    dependencies: HashMap<String, Vec<TaskDependency>>,
    statuses: HashMap<String, TaskStatus>,
    audit: Vec<AuditRecord>,
    failures: FailureModes,
    latency: Option<Duration>,
}

/// Thread-safe in-memory implementation of all collaborators.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `location` as a valid place for `task_id`.
    pub fn add_location(&self, task_id: impl Into<String>, location: Location) {
        self.write()
            .locations
            .entry(task_id.into())
            .or_default()
            .push(location);
    }

    pub fn add_event(&self, user_id: impl Into<String>, event: CalendarEvent) {
        self.write()
            .events
            .entry(user_id.into())
            .or_default()
            .push(event);
    }

    pub fn add_dependency(&self, dependency: TaskDependency) {
        self.write()
            .dependencies
            .entry(dependency.task_id.clone())
            .or_default()
            .push(dependency);
    }

    pub fn set_status(&self, task_id: impl Into<String>, status: TaskStatus) {
        self.write().statuses.insert(task_id.into(), status);
    }

    pub fn set_failures(&self, failures: FailureModes) {
        self.write().failures = failures;
    }

    /// Delay every lookup by `latency` before answering.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.write().latency = latency;
    }

    /// Audit records received so far, in arrival order.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.read().audit.clone()
    }

    pub fn clear_audit(&self) {
        self.write().audit.clear();
    }

    async fn stall(&self) {
        let latency = self.read().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn failing(&self, pick: impl Fn(&FailureModes) -> bool) -> bool {
        pick(&self.read().failures)
    }
}

#[async_trait]
impl LocationLookup for MemoryStore {
    async fn locations_for_task(&self, task_id: &str) -> LookupResult<Vec<Location>> {
        self.stall().await;
        if self.failing(|f| f.locations) {
            return Err(LookupError::backend("location store", "unavailable"));
        }
        Ok(self.read().locations.get(task_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl CalendarLookup for MemoryStore {
    async fn events_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> LookupResult<Vec<CalendarEvent>> {
        self.stall().await;
        if self.failing(|f| f.calendar) {
            return Err(LookupError::backend("calendar store", "unavailable"));
        }
        Ok(self
            .read()
            .events
            .get(user_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.overlaps(start, end))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl DependencyLookup for MemoryStore {
    async fn dependencies_for_task(&self, task_id: &str) -> LookupResult<Vec<TaskDependency>> {
        self.stall().await;
        if self.failing(|f| f.dependencies) {
            return Err(LookupError::backend("dependency store", "unavailable"));
        }
        Ok(self
            .read()
            .dependencies
            .get(task_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn status_of_task(&self, task_id: &str) -> LookupResult<TaskStatus> {
        self.stall().await;
        if self.failing(|f| f.statuses) {
            return Err(LookupError::backend("task store", "unavailable"));
        }
        self.read()
            .statuses
            .get(task_id)
            .copied()
            .ok_or_else(|| LookupError::NotFound {
                kind: "task",
                id: task_id.to_string(),
            })
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record(&self, record: &AuditRecord) -> LookupResult<()> {
        if self.failing(|f| f.audit) {
            return Err(LookupError::backend("audit store", "write rejected"));
        }
        self.write().audit.push(record.clone());
        Ok(())
    }
}
