//! Shared types, error model, and configuration for ClearMind.
//!
//! This crate is the foundation depended on by all other ClearMind crates.
//! It provides:
//! - [`ClearMindError`] and [`ErrorKind`]: the unified error type and its user-facing tags
//! - Domain types ([`TaskKind`], [`TaskResult`], [`ActionPlan`], [`ChatTurn`], ...)
//! - Configuration ([`AppConfig`], [`ModelConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ModelConfig, StorageConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{ClearMindError, ErrorKind, Result};
pub use types::{
    ActionPlan, ChatRole, ChatTurn, MemoryCard, PlanStep, Priority, Simplification, TaskKind,
    TaskResult,
};
