// src/config/model.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value;

use crate::task::Optimization;

/// Graph configuration as read from `taskgraph.toml`, before validation.
///
/// ```toml
/// [taskgraph]
/// trust-domain = "example"
/// max-routes = 64
///
/// [kind.build]
/// kind-dependencies = ["docker-image"]
///
/// [kind.build.task.linux]
/// dependencies = { docker-image = "docker-image-linux" }
/// task = { payload = { command = ["make"] } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawGraphConfig {
    pub taskgraph: TaskgraphSection,

    /// Named templates for the template morph.
    #[serde(default)]
    pub templates: BTreeMap<String, TemplateConfig>,

    /// All kinds from `[kind.<name>]`.
    #[serde(default)]
    pub kind: BTreeMap<String, KindConfig>,
}

/// Validated graph configuration. Build it with `GraphConfig::try_from`.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub taskgraph: TaskgraphSection,
    pub templates: BTreeMap<String, TemplateConfig>,
    pub kind: BTreeMap<String, KindConfig>,
}

impl GraphConfig {
    pub(crate) fn new_unchecked(
        taskgraph: TaskgraphSection,
        templates: BTreeMap<String, TemplateConfig>,
        kind: BTreeMap<String, KindConfig>,
    ) -> Self {
        Self {
            taskgraph,
            templates,
            kind,
        }
    }

    pub fn trust_domain(&self) -> &str {
        &self.taskgraph.trust_domain
    }

    /// Scheduler id stamped on every submitted task.
    pub fn scheduler_id(&self, level: &str) -> String {
        format!("{}-level-{}", self.taskgraph.trust_domain, level)
    }
}

/// `[taskgraph]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TaskgraphSection {
    /// Prefix for index namespaces and scheduler ids.
    pub trust_domain: String,

    /// Root URL of the execution and index services. Empty means "use
    /// `TASKCLUSTER_ROOT_URL`".
    #[serde(default)]
    pub root_url: String,

    /// Label of the image task the index morph depends on.
    #[serde(default = "default_index_image_label")]
    pub index_image_label: String,

    /// Maximum number of routes the execution service accepts per task.
    #[serde(default = "default_max_routes")]
    pub max_routes: usize,

    /// Maximum number of concurrent create-task calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub retry: RetrySection,
}

fn default_index_image_label() -> String {
    "docker-image-index-task".to_string()
}

fn default_max_routes() -> usize {
    64
}

fn default_concurrency() -> usize {
    50
}

impl TaskgraphSection {
    pub fn new(trust_domain: impl Into<String>) -> Self {
        Self {
            trust_domain: trust_domain.into(),
            root_url: String::new(),
            index_image_label: default_index_image_label(),
            max_routes: default_max_routes(),
            concurrency: default_concurrency(),
            retry: RetrySection::default(),
        }
    }
}

/// `[taskgraph.retry]`: backoff for index and queue requests.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    250
}

fn default_max_backoff() -> u64 {
    10_000
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// `[templates.<name>]`: a minijinja template rendering a JSON object with
/// optional `task` and `attributes` keys.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    pub source: String,
}

/// `[kind.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KindConfig {
    /// Kinds whose tasks must be loaded before this one.
    #[serde(default)]
    pub kind_dependencies: Vec<String>,

    /// Tasks of this kind, keyed by name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[kind.<kind>.task.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TaskConfig {
    /// Explicit label; defaults to `<kind>-<name>`.
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Edge name -> label of the dependency.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub soft_dependencies: Vec<String>,

    #[serde(default)]
    pub optimization: Option<Optimization>,

    #[serde(default)]
    pub release_artifacts: Option<BTreeSet<String>>,

    #[serde(default)]
    pub cache: Option<CacheConfig>,

    /// The opaque payload.
    #[serde(default = "empty_object")]
    pub task: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Cached-task declaration; see [`crate::provider::cached`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    #[serde(rename = "type")]
    pub cache_type: String,
    pub name: String,
    pub digest_data: Vec<String>,
}
