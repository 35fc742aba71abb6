// src/provider/kind.rs

use anyhow::{Context, bail};
use tracing::debug;

use crate::config::{GraphConfig, KindConfig};
use crate::parameters::Parameters;
use crate::provider::TaskProvider;
use crate::provider::cached::{add_optimization, digest_data};
use crate::task::Task;

/// Provider for the tasks declared in a `[kind.<name>]` config section.
#[derive(Debug, Clone)]
pub struct ConfigKind {
    name: String,
    config: KindConfig,
}

impl ConfigKind {
    pub fn new(name: String, config: KindConfig) -> Self {
        Self { name, config }
    }
}

impl TaskProvider for ConfigKind {
    fn kind(&self) -> &str {
        &self.name
    }

    fn kind_dependencies(&self) -> &[String] {
        &self.config.kind_dependencies
    }

    fn load_tasks(
        &self,
        params: &Parameters,
        config: &GraphConfig,
        _loaded: &[Task],
    ) -> anyhow::Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(self.config.task.len());

        for (name, tc) in &self.config.task {
            let label = tc
                .label
                .clone()
                .unwrap_or_else(|| format!("{}-{}", self.name, name));

            let mut task = Task::new(self.name.clone(), label, tc.task.clone());
            for (key, value) in &tc.attributes {
                if key == crate::task::KIND_ATTRIBUTE && *value != self.name {
                    bail!(
                        "task '{}' sets attribute kind = '{}' in kind '{}'",
                        task.label,
                        value,
                        self.name
                    );
                }
                task.attributes.insert(key.clone(), value.clone());
            }
            task.dependencies = tc.dependencies.clone();
            task.soft_dependencies = tc.soft_dependencies.clone();
            task.optimization = tc.optimization.clone();
            task.release_artifacts = tc.release_artifacts.clone();

            if let Some(cache) = &tc.cache {
                if task.optimization.is_some() {
                    bail!(
                        "task '{}' declares both `optimization` and `cache`",
                        task.label
                    );
                }
                let digest = digest_data(&cache.digest_data);
                add_optimization(
                    &mut task,
                    config.trust_domain(),
                    &cache.cache_type,
                    &cache.name,
                    &digest,
                    params,
                )
                .with_context(|| format!("making task '{}' a cached task", task.label))?;
            }

            debug!(kind = %self.name, label = %task.label, "loaded task");
            tasks.push(task);
        }

        Ok(tasks)
    }
}
