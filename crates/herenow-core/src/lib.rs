//! # herenow Core Library
//!
//! Decides which of a user's tasks are actionable right now. Given a
//! snapshot of the user's situation (position, free time, energy,
//! social setting) the engine runs a set of pluggable rules over every
//! task and keeps only the tasks that all rules accept.
//!
//! ## Architecture
//!
//! - **Rules**: location geofences, time and energy fit, blocking
//!   dependencies, and a priority score against a context-dependent
//!   threshold
//! - **Engine**: concurrent evaluation, AND-aggregation, per-verdict
//!   audit records, explanations and ranking
//! - **Lookups**: async traits for the stores the rules read from; an
//!   in-memory implementation ships with the crate
//!
//! ## Key Components
//!
//! - [`FilterEngine`]: Rule registry and evaluation entry points
//! - [`Rule`]: Trait for visibility rules
//! - [`EngineConfig`]: TOML-backed engine configuration
//! - [`MemoryStore`]: In-memory collaborator store

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod geo;
pub mod logging;
pub mod lookup;
pub mod memory;
pub mod rules;
pub mod task;

pub use config::EngineConfig;
pub use context::{Context, SocialContext};
pub use engine::{FilterEngine, FilterOutcome, RankedTask, TaskVisibilityExplanation};
pub use error::{ConfigError, CoreError, LookupError};
pub use geo::{distance_meters, Coordinates};
pub use logging::{init_logging, LoggingConfig};
pub use lookup::{
    AuditRecord, AuditSink, CalendarLookup, Collaborators, DependencyLookup, LocationLookup,
    TracingAuditSink,
};
pub use memory::{FailureModes, MemoryStore};
pub use rules::{Rule, RuleOutcome, RuleVerdict, ScoreBreakdown};
pub use task::{CalendarEvent, DependencyKind, Location, Priority, Task, TaskDependency, TaskStatus};
