//! Romforge Planner: project configuration, quick-build triggers and build planning

pub mod builder;
pub mod config;
pub mod error;
pub mod insertable;
pub mod planner;
pub mod resources;
pub mod triggers;


#[cfg(test)]
pub mod test_utils;

pub use builder::build_graph;
pub use config::{Config, ToolSettings};
pub use error::ConfigError;
pub use insertable::Insertable;
pub use planner::{BuildKind, BuildPlan, PlanOutcome, Planner};
pub use resources::{create_report, hash_build_order, level_digests, ResourceDigests};
pub use triggers::TriggerGraph;
