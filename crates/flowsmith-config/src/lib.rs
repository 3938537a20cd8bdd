//! Flowsmith Config
//!
//! This crate contains the serializable configuration types for flowsmith.
//! These types represent a plan before it is resolved into a task graph, and
//! the engine settings used to reach the inference and context services.
//!
//! Configuration is loaded from JSON files:
//! - the plan file handed to `flowsmith run` / `flowsmith resolve`
//! - the engine settings file (default `~/.flowsmith/config.json`)

mod plan;
mod settings;

pub use plan::{PlanDef, TaskDef};
pub use settings::{
  EngineSettings, ProviderKind, ProviderSettings, SearchKind, SearchSettings, SettingsError,
};
