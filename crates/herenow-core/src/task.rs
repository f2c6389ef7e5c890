//! Task-side data consumed by the engine.
//!
//! Tasks, locations, dependencies and calendar events are owned by the
//! task-management collaborators. The engine only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geo::Coordinates;

/// Task status as tracked by the task-management collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Cancelled,
    Blocked,
}

impl TaskStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// Task priority on the engine's 1-10 scale.
///
/// Some task-creation paths use a 1-5 scale; convert those with
/// [`Priority::from_five_point`] before handing tasks to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Clamp `value` into 1-10.
    pub fn new(value: i32) -> Self {
        Self(value.clamp(Self::MIN as i32, Self::MAX as i32) as u8)
    }

    /// Convert a 1-5 priority (5 = most important) to the 1-10 scale.
    pub fn from_five_point(value: i32) -> Self {
        Self::new(value.clamp(1, 5) * 2)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Priority as a fraction of the maximum, in (0, 1].
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / Self::MAX as f64
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority(5)
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority::new(value)
    }
}

impl From<Priority> for i32 {
    fn from(p: Priority) -> Self {
        p.0 as i32
    }
}

/// A task as seen by the visibility engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    /// Estimated duration in minutes (null if not set)
    #[serde(default)]
    pub estimated_minutes: Option<i64>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task with default priority and no estimate.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: TaskStatus::Pending,
            priority: Priority::default(),
            estimated_minutes: None,
            due_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Priority::new(priority);
        self
    }

    pub fn with_estimate(mut self, minutes: i64) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    /// Positive estimate in minutes, if one is set.
    pub fn estimate(&self) -> Option<u32> {
        self.estimated_minutes
            .filter(|m| *m > 0)
            .map(|m| m.min(u32::MAX as i64) as u32)
    }

    /// Title and description lower-cased, for keyword heuristics.
    pub fn searchable_text(&self) -> String {
        let mut text = self.title.to_lowercase();
        if let Some(desc) = &self.description {
            text.push(' ');
            text.push_str(&desc.to_lowercase());
        }
        text
    }
}

/// A place where a task can be done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

impl Location {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius_meters: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            latitude,
            longitude,
            radius_meters,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Whether a dependency gates visibility.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Prerequisite must be completed first
    Blocking,
    /// Ordering hint only
    Suggested,
}

/// Edge in the dependency graph: `task_id` depends on `depends_on_task_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: String,
    pub depends_on_task_id: String,
    pub kind: DependencyKind,
}

impl TaskDependency {
    pub fn blocking(task_id: impl Into<String>, depends_on: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            depends_on_task_id: depends_on.into(),
            kind: DependencyKind::Blocking,
        }
    }

    pub fn suggested(task_id: impl Into<String>, depends_on: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            depends_on_task_id: depends_on.into(),
            kind: DependencyKind::Suggested,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.kind == DependencyKind::Blocking
    }
}

/// Calendar event for conflict detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default = "default_busy")]
    pub busy: bool,
}

fn default_busy() -> bool {
    true
}

impl CalendarEvent {
    /// Create a new busy calendar event
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start_time,
            end_time,
            busy: true,
        }
    }

    /// Mark the event as free time (shown on the calendar but not blocking).
    pub fn free(mut self) -> Self {
        self.busy = false;
        self
    }

    /// Check if this event overlaps with a time range
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_priority_clamps() {
        assert_eq!(Priority::new(0).value(), 1);
        assert_eq!(Priority::new(42).value(), 10);
        assert_eq!(Priority::new(7).value(), 7);
    }

    #[test]
    fn test_five_point_conversion() {
        assert_eq!(Priority::from_five_point(1).value(), 2);
        assert_eq!(Priority::from_five_point(3).value(), 6);
        assert_eq!(Priority::from_five_point(5).value(), 10);
        assert_eq!(Priority::from_five_point(9).value(), 10);
    }

    #[test]
    fn test_priority_deserializes_from_integer() {
        let task: Task = serde_json::from_str(r#"{"id":"t","title":"x","priority":14}"#).unwrap();
        assert_eq!(task.priority.value(), 10);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_estimate_ignores_non_positive() {
        assert_eq!(Task::new("t", "x").with_estimate(0).estimate(), None);
        assert_eq!(Task::new("t", "x").with_estimate(-5).estimate(), None);
        assert_eq!(Task::new("t", "x").with_estimate(45).estimate(), Some(45));
    }

    #[test]
    fn test_searchable_text() {
        let task = Task::new("t", "Write Report").with_description("For the CLIENT");
        assert_eq!(task.searchable_text(), "write report for the client");
    }

    #[test]
    fn test_event_overlap_is_exclusive_at_edges() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let event = CalendarEvent::new("e1", "Standup", start, start + Duration::minutes(30));

        assert!(event.overlaps(start - Duration::minutes(10), start + Duration::minutes(1)));
        assert!(!event.overlaps(start - Duration::minutes(10), start));
        assert!(!event.overlaps(start + Duration::minutes(30), start + Duration::hours(1)));
    }

    #[test]
    fn test_dependency_constructors() {
        assert!(TaskDependency::blocking("a", "b").is_blocking());
        assert!(!TaskDependency::suggested("a", "b").is_blocking());
    }
}
