// src/parameters.rs

//! Run parameters: the inputs describing *this* run (which revision, which
//! target method, which labels to leave alone, ...).
//!
//! Parameters are read from a `.toml` or `.json` file. Fields not modelled
//! here are preserved in [`Parameters::extra`] so that providers and target
//! methods can consult them.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, TaskgraphError};
use crate::fs::FileSystem;

/// Name of the built-in filter that applies `target_tasks_method`.
pub const TARGET_TASKS_METHOD_FILTER: &str = "target_tasks_method";

/// `try_mode` value that enables the template morph.
pub const TRY_TASK_CONFIG_MODE: &str = "try_task_config";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub project: String,

    /// Trust level of the run, `"1"` to `"3"`.
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub head_repository: String,

    #[serde(default)]
    pub head_rev: String,

    #[serde(default)]
    pub base_repository: String,

    /// Unix timestamp (seconds) of the push.
    #[serde(default)]
    pub build_date: i64,

    /// Name of the target-selection method.
    #[serde(default = "default_target_tasks_method")]
    pub target_tasks_method: String,

    /// If false, every target task is exempt from optimization.
    #[serde(default = "default_true")]
    pub optimize_target_tasks: bool,

    /// Add tasks with the `always_target` attribute to the target graph.
    #[serde(default)]
    pub enable_always_target: bool,

    /// Labels never removed or replaced.
    #[serde(default)]
    pub do_not_optimize: Vec<String>,

    /// Label -> identifier of tasks created by a prior, related run.
    #[serde(default)]
    pub existing_tasks: BTreeMap<String, String>,

    /// Target filters applied in order.
    #[serde(default = "default_filters")]
    pub filters: Vec<String>,

    #[serde(default)]
    pub try_mode: Option<String>,

    #[serde(default)]
    pub try_task_config: TryTaskConfig,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Configuration for template-driven runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TryTaskConfig {
    /// Labels the templates apply to.
    #[serde(default)]
    pub tasks: Vec<String>,

    /// Template name -> input passed to that template.
    #[serde(default)]
    pub templates: BTreeMap<String, Value>,
}

fn default_level() -> String {
    "3".to_string()
}

fn default_target_tasks_method() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_filters() -> Vec<String> {
    vec![TARGET_TASKS_METHOD_FILTER.to_string()]
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            project: String::new(),
            level: default_level(),
            head_repository: String::new(),
            head_rev: String::new(),
            base_repository: String::new(),
            build_date: 0,
            target_tasks_method: default_target_tasks_method(),
            optimize_target_tasks: true,
            enable_always_target: false,
            do_not_optimize: Vec::new(),
            existing_tasks: BTreeMap::new(),
            filters: default_filters(),
            try_mode: None,
            try_task_config: TryTaskConfig::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl Parameters {
    /// Load parameters from a `.json` or `.toml` file.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let contents = fs.read_to_string(path)?;
        let params = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") => toml::from_str(&contents)?,
            other => {
                return Err(TaskgraphError::ConfigError(format!(
                    "parameters file {path:?} must be .json or .toml (got {other:?})"
                )));
            }
        };
        Ok(params)
    }

    /// Numeric trust level.
    pub fn level_number(&self) -> Result<u8> {
        self.level
            .parse::<u8>()
            .ok()
            .filter(|l| (1..=3).contains(l))
            .ok_or_else(|| {
                TaskgraphError::ConfigError(format!(
                    "parameter `level` must be 1, 2 or 3 (got {:?})",
                    self.level
                ))
            })
    }

    /// Whether this is a template-driven run.
    pub fn is_try_task_config(&self) -> bool {
        self.try_mode.as_deref() == Some(TRY_TASK_CONFIG_MODE)
    }
}
