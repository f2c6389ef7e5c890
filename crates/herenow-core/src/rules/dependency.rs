//! Gating on blocking prerequisites.
//!
//! A task stays hidden until every blocking prerequisite is completed.
//! Suggested dependencies never gate and only show up in the reason.
//!
//! Circular blocking dependencies are detected while reading the graph:
//! a task that can reach itself over blocking edges is hidden for good,
//! whatever the statuses of the other members. Lookup failures hide the
//! task as well.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use super::{names, Rule, RuleOutcome};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::LookupError;
use crate::lookup::{bounded, DependencyLookup};
use crate::task::{Task, TaskDependency};

pub struct DependencyRule {
    enabled: bool,
    timeout: Duration,
    lookup: Arc<dyn DependencyLookup>,
}

impl DependencyRule {
    pub fn new(lookup: Arc<dyn DependencyLookup>, config: &EngineConfig) -> Self {
        Self {
            enabled: config.dependency_enabled,
            timeout: config.lookup_timeout(),
            lookup,
        }
    }

    async fn dependencies_of(&self, task_id: &str) -> Result<Vec<TaskDependency>, LookupError> {
        bounded(
            "dependencies_for_task",
            self.timeout,
            self.lookup.dependencies_for_task(task_id),
        )
        .await
    }

    /// Shortest blocking path from `root` back to itself, if any.
    ///
    /// Breadth-first over blocking edges with a visited set, so each
    /// task's dependencies are fetched at most once.
    async fn find_cycle(
        &self,
        root: &str,
        direct: &[&TaskDependency],
    ) -> Result<Option<Vec<String>>, LookupError> {
        let mut parent: HashMap<String, String> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        visited.insert(root.to_string());
        for dep in direct {
            if dep.depends_on_task_id == root {
                return Ok(Some(vec![root.to_string(), root.to_string()]));
            }
            if visited.insert(dep.depends_on_task_id.clone()) {
                parent.insert(dep.depends_on_task_id.clone(), root.to_string());
                queue.push_back(dep.depends_on_task_id.clone());
            }
        }

        while let Some(node) = queue.pop_front() {
            for dep in self.dependencies_of(&node).await? {
                if !dep.is_blocking() {
                    continue;
                }
                let next = dep.depends_on_task_id;
                if next == root {
                    return Ok(Some(trace_path(root, &node, &parent)));
                }
                if visited.insert(next.clone()) {
                    parent.insert(next.clone(), node.clone());
                    queue.push_back(next);
                }
            }
        }

        Ok(None)
    }
}

/// Rebuild `root -> ... -> last -> root` from the BFS parent links.
fn trace_path(root: &str, last: &str, parent: &HashMap<String, String>) -> Vec<String> {
    let mut path = vec![root.to_string(), last.to_string()];
    let mut current = last;
    while let Some(prev) = parent.get(current) {
        if prev == root {
            break;
        }
        path.push(prev.clone());
        current = prev;
    }
    path.push(root.to_string());
    // collected as root, last, ..., first; the middle needs reversing
    let len = path.len();
    path[1..len - 1].reverse();
    path
}

#[async_trait]
impl Rule for DependencyRule {
    fn name(&self) -> &str {
        names::DEPENDENCY
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn apply(&self, _ctx: &Context, task: &Task) -> RuleOutcome {
        if !self.enabled {
            return RuleOutcome::pass("dependency filtering disabled");
        }

        let deps = match self.dependencies_of(&task.id).await {
            Ok(deps) => deps,
            Err(e) => {
                tracing::warn!(
                    task_id = %task.id,
                    error = %e,
                    "dependency lookup failed, hiding task"
                );
                return RuleOutcome::fail(format!("could not load dependencies: {e}"));
            }
        };

        if deps.is_empty() {
            return RuleOutcome::pass("no dependencies");
        }

        let mut seen = HashSet::new();
        let (blocking, suggested): (Vec<&TaskDependency>, Vec<&TaskDependency>) = deps
            .iter()
            .filter(|d| seen.insert((d.depends_on_task_id.as_str(), d.kind)))
            .partition(|d| d.is_blocking());

        match self.find_cycle(&task.id, &blocking).await {
            Ok(Some(path)) => {
                return RuleOutcome::fail(format!(
                    "circular blocking dependency: {}",
                    path.join(" -> ")
                ));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    task_id = %task.id,
                    error = %e,
                    "dependency graph walk failed, hiding task"
                );
                return RuleOutcome::fail(format!("could not resolve dependency graph: {e}"));
            }
        }

        let mut unmet = Vec::new();
        for dep in &blocking {
            let id = &dep.depends_on_task_id;
            match bounded("status_of_task", self.timeout, self.lookup.status_of_task(id)).await {
                Ok(status) if status.is_completed() => {}
                Ok(status) => unmet.push(format!("{id} ({status})")),
                Err(e) => {
                    tracing::warn!(
                        task_id = %task.id,
                        prerequisite = %id,
                        error = %e,
                        "status lookup failed"
                    );
                    unmet.push(format!("{id} (status unknown)"));
                }
            }
        }

        if !unmet.is_empty() {
            return RuleOutcome::fail(format!("waiting on {}", unmet.join(", ")));
        }

        let mut reason = if blocking.is_empty() {
            "no blocking dependencies".to_string()
        } else {
            format!("all {} blocking prerequisites completed", blocking.len())
        };
        if !suggested.is_empty() {
            let ids: Vec<&str> = suggested
                .iter()
                .map(|d| d.depends_on_task_id.as_str())
                .collect();
            reason.push_str(&format!("; suggested first: {}", ids.join(", ")));
        }
        RuleOutcome::pass(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FailureModes, MemoryStore};
    use crate::task::TaskStatus;
    use chrono::Utc;

    fn ctx() -> Context {
        Context::new("u1", Utc::now())
    }

    fn rule(store: Arc<MemoryStore>) -> DependencyRule {
        DependencyRule::new(store, &EngineConfig::default())
    }

    #[tokio::test]
    async fn test_no_dependencies() {
        let out = rule(Arc::new(MemoryStore::new()))
            .apply(&ctx(), &Task::new("t1", "x"))
            .await;
        assert!(out.visible);
        assert_eq!(out.reason, "no dependencies");
    }

    #[tokio::test]
    async fn test_incomplete_blocking_prerequisite_hides() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::blocking("t1", "t0"));
        store.set_status("t0", TaskStatus::Active);

        let out = rule(store.clone()).apply(&ctx(), &Task::new("t1", "x")).await;
        assert!(!out.visible);
        assert_eq!(out.reason, "waiting on t0 (active)");

        store.set_status("t0", TaskStatus::Completed);
        let out = rule(store).apply(&ctx(), &Task::new("t1", "x")).await;
        assert!(out.visible);
        assert_eq!(out.reason, "all 1 blocking prerequisites completed");
    }

    #[tokio::test]
    async fn test_cancelled_prerequisite_still_blocks() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::blocking("t1", "t0"));
        store.set_status("t0", TaskStatus::Cancelled);

        let out = rule(store).apply(&ctx(), &Task::new("t1", "x")).await;
        assert!(!out.visible);
        assert!(out.reason.contains("t0 (cancelled)"));
    }

    #[tokio::test]
    async fn test_lists_every_unmet_prerequisite() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::blocking("t1", "a"));
        store.add_dependency(TaskDependency::blocking("t1", "b"));
        store.add_dependency(TaskDependency::blocking("t1", "c"));
        store.set_status("a", TaskStatus::Pending);
        store.set_status("b", TaskStatus::Completed);

        let out = rule(store).apply(&ctx(), &Task::new("t1", "x")).await;
        assert!(!out.visible);
        assert_eq!(out.reason, "waiting on a (pending), c (status unknown)");
    }

    #[tokio::test]
    async fn test_suggested_dependencies_never_gate() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::suggested("t1", "t0"));
        store.set_status("t0", TaskStatus::Pending);

        let out = rule(store).apply(&ctx(), &Task::new("t1", "x")).await;
        assert!(out.visible);
        assert_eq!(out.reason, "no blocking dependencies; suggested first: t0");
    }

    #[tokio::test]
    async fn test_two_task_cycle_blocks_both_even_when_completed() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::blocking("a", "b"));
        store.add_dependency(TaskDependency::blocking("b", "a"));
        store.set_status("a", TaskStatus::Completed);
        store.set_status("b", TaskStatus::Completed);

        let rule = rule(store);
        let out_a = rule.apply(&ctx(), &Task::new("a", "x")).await;
        let out_b = rule.apply(&ctx(), &Task::new("b", "y")).await;
        assert!(!out_a.visible);
        assert!(!out_b.visible);
        assert_eq!(out_a.reason, "circular blocking dependency: a -> b -> a");
        assert_eq!(out_b.reason, "circular blocking dependency: b -> a -> b");
    }

    #[tokio::test]
    async fn test_longer_cycle_path() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::blocking("a", "b"));
        store.add_dependency(TaskDependency::blocking("b", "c"));
        store.add_dependency(TaskDependency::blocking("c", "a"));

        let out = rule(store).apply(&ctx(), &Task::new("a", "x")).await;
        assert!(!out.visible);
        assert_eq!(out.reason, "circular blocking dependency: a -> b -> c -> a");
    }

    #[tokio::test]
    async fn test_self_dependency_is_a_cycle() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::blocking("a", "a"));
        let out = rule(store).apply(&ctx(), &Task::new("a", "x")).await;
        assert!(!out.visible);
        assert_eq!(out.reason, "circular blocking dependency: a -> a");
    }

    #[tokio::test]
    async fn test_task_downstream_of_cycle_is_not_itself_cyclic() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::blocking("a", "b"));
        store.add_dependency(TaskDependency::blocking("b", "a"));
        store.add_dependency(TaskDependency::blocking("c", "a"));
        store.set_status("a", TaskStatus::Pending);

        let out = rule(store).apply(&ctx(), &Task::new("c", "x")).await;
        assert!(!out.visible);
        assert_eq!(out.reason, "waiting on a (pending)");
    }

    #[tokio::test]
    async fn test_suggested_edges_do_not_form_cycles() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::blocking("a", "b"));
        store.add_dependency(TaskDependency::suggested("b", "a"));
        store.set_status("b", TaskStatus::Completed);

        let out = rule(store).apply(&ctx(), &Task::new("a", "x")).await;
        assert!(out.visible, "{}", out.reason);
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_closed() {
        let store = Arc::new(MemoryStore::new());
        store.set_failures(FailureModes {
            dependencies: true,
            ..Default::default()
        });
        let out = rule(store).apply(&ctx(), &Task::new("a", "x")).await;
        assert!(!out.visible);
        assert!(out.reason.starts_with("could not load dependencies"));
    }

    #[tokio::test]
    async fn test_status_lookup_failure_counts_as_unmet() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::blocking("t1", "t0"));
        store.set_status("t0", TaskStatus::Completed);
        store.set_failures(FailureModes {
            statuses: true,
            ..Default::default()
        });

        let out = rule(store).apply(&ctx(), &Task::new("t1", "x")).await;
        assert!(!out.visible);
        assert_eq!(out.reason, "waiting on t0 (status unknown)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout_fails_closed() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::blocking("t1", "t0"));
        store.set_status("t0", TaskStatus::Completed);
        store.set_latency(Some(Duration::from_secs(30)));

        let out = rule(store).apply(&ctx(), &Task::new("t1", "x")).await;
        assert!(!out.visible);
        assert_eq!(
            out.reason,
            "could not load dependencies: dependencies_for_task timed out after 2000ms"
        );
    }

    /// Answers the graph instantly but never returns a status in time.
    struct StalledStatuses;

    #[async_trait]
    impl DependencyLookup for StalledStatuses {
        async fn dependencies_for_task(
            &self,
            task_id: &str,
        ) -> Result<Vec<TaskDependency>, LookupError> {
            Ok(if task_id == "t1" {
                vec![TaskDependency::blocking("t1", "t0")]
            } else {
                Vec::new()
            })
        }

        async fn status_of_task(&self, _task_id: &str) -> Result<TaskStatus, LookupError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(TaskStatus::Completed)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_timeout_counts_as_unmet() {
        let rule = DependencyRule::new(Arc::new(StalledStatuses), &EngineConfig::default());
        let out = rule.apply(&ctx(), &Task::new("t1", "x")).await;
        assert!(!out.visible);
        assert_eq!(out.reason, "waiting on t0 (status unknown)");
    }

    #[tokio::test]
    async fn test_disabled() {
        let store = Arc::new(MemoryStore::new());
        store.add_dependency(TaskDependency::blocking("a", "a"));
        let config = EngineConfig {
            dependency_enabled: false,
            ..Default::default()
        };
        let out = DependencyRule::new(store, &config)
            .apply(&ctx(), &Task::new("a", "x"))
            .await;
        assert!(out.visible);
        assert_eq!(out.reason, "dependency filtering disabled");
    }

    #[test]
    fn test_trace_path_orders_from_root() {
        let mut parent = HashMap::new();
        parent.insert("b".to_string(), "a".to_string());
        parent.insert("c".to_string(), "b".to_string());
        parent.insert("d".to_string(), "c".to_string());
        assert_eq!(trace_path("a", "d", &parent), vec!["a", "b", "c", "d", "a"]);
        assert_eq!(trace_path("a", "b", &parent), vec!["a", "b", "a"]);
    }
}
