// src/config/mod.rs

//! Graph configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate invariants like kind-dependency acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_path, load_and_validate, load_from_path};
pub use model::{
    CacheConfig, GraphConfig, KindConfig, RawGraphConfig, RetrySection, TaskConfig,
    TaskgraphSection, TemplateConfig,
};
