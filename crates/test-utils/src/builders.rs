#![allow(dead_code)]

use std::collections::BTreeMap;

use serde_json::Value;
use taskgraph::config::{
    CacheConfig, GraphConfig, KindConfig, RawGraphConfig, TaskConfig, TaskgraphSection,
    TemplateConfig,
};
use taskgraph::task::{Optimization, Task, TaskGraph};

/// Builder for `GraphConfig` to simplify test setup.
pub struct GraphConfigBuilder {
    config: RawGraphConfig,
}

impl GraphConfigBuilder {
    pub fn new(trust_domain: &str) -> Self {
        Self {
            config: RawGraphConfig {
                taskgraph: TaskgraphSection::new(trust_domain),
                templates: BTreeMap::new(),
                kind: BTreeMap::new(),
            },
        }
    }

    pub fn with_kind(mut self, name: &str, kind: KindConfig) -> Self {
        self.config.kind.insert(name.to_string(), kind);
        self
    }

    pub fn with_template(mut self, name: &str, source: &str) -> Self {
        self.config.templates.insert(
            name.to_string(),
            TemplateConfig {
                source: source.to_string(),
            },
        );
        self
    }

    pub fn with_max_routes(mut self, max_routes: usize) -> Self {
        self.config.taskgraph.max_routes = max_routes;
        self
    }

    pub fn with_root_url(mut self, root_url: &str) -> Self {
        self.config.taskgraph.root_url = root_url.to_string();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.taskgraph.concurrency = concurrency;
        self
    }

    pub fn build(self) -> GraphConfig {
        GraphConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `KindConfig`.
#[derive(Default)]
pub struct KindBuilder {
    kind: KindConfig,
}

impl KindBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn after(mut self, kind: &str) -> Self {
        self.kind.kind_dependencies.push(kind.to_string());
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.kind.task.insert(name.to_string(), task);
        self
    }

    pub fn build(self) -> KindConfig {
        self.kind
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(payload: Value) -> Self {
        Self {
            task: TaskConfig {
                task: payload,
                ..TaskConfig::default()
            },
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.task.label = Some(label.to_string());
        self
    }

    pub fn depends_on(mut self, name: &str, label: &str) -> Self {
        self.task
            .dependencies
            .insert(name.to_string(), label.to_string());
        self
    }

    pub fn soft_depends_on(mut self, label: &str) -> Self {
        self.task.soft_dependencies.push(label.to_string());
        self
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.task
            .attributes
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn optimization(mut self, strategy: &str, arg: Value) -> Self {
        self.task.optimization = Some(Optimization::new(strategy, arg));
        self
    }

    pub fn cache(mut self, cache_type: &str, name: &str, digest_data: &[&str]) -> Self {
        self.task.cache = Some(CacheConfig {
            cache_type: cache_type.to_string(),
            name: name.to_string(),
            digest_data: digest_data.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Builder for a `Task` as a provider would produce it.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(kind: &str, label: &str) -> Self {
        Self {
            task: Task::new(kind, label, serde_json::json!({})),
        }
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.task.task = payload;
        self
    }

    pub fn depends_on(mut self, name: &str, label: &str) -> Self {
        self.task
            .dependencies
            .insert(name.to_string(), label.to_string());
        self
    }

    pub fn soft_depends_on(mut self, label: &str) -> Self {
        self.task.soft_dependencies.push(label.to_string());
        self
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.task
            .attributes
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn optimization(mut self, strategy: &str, arg: Value) -> Self {
        self.task.optimization = Some(Optimization::new(strategy, arg));
        self
    }

    pub fn task_id(mut self, task_id: &str) -> Self {
        self.task.task_id = Some(task_id.to_string());
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// A label-keyed graph with edges from each task's `dependencies`.
pub fn task_graph(tasks: impl IntoIterator<Item = Task>) -> TaskGraph {
    let tasks = tasks
        .into_iter()
        .map(|t| (t.label.clone(), t))
        .collect();
    TaskGraph::from_tasks(tasks).expect("Failed to build task graph")
}
