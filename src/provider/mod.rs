// src/provider/mod.rs

//! Task providers.
//!
//! A provider produces the tasks of one *kind* and names their dependencies.
//! Providers may depend on other kinds, in which case they are loaded after
//! them and receive their tasks.
//!
//! - [`kind`] implements the config-driven provider built from
//!   `[kind.<name>]` sections.
//! - [`cached`] turns tasks into index-cached tasks.

pub mod cached;
pub mod kind;

use std::fmt::Debug;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::GraphConfig;
use crate::errors::{Result, TaskgraphError};
use crate::parameters::Parameters;
use crate::task::{Task, TaskGraph};

pub use kind::ConfigKind;

/// A source of tasks of a single kind.
pub trait TaskProvider: Send + Sync + Debug {
    /// Name of the kind this provider produces.
    fn kind(&self) -> &str;

    /// Kinds that must be loaded before this one.
    fn kind_dependencies(&self) -> &[String];

    /// Produce this kind's tasks. `loaded` holds every task of the kinds
    /// loaded so far (including all of `kind_dependencies`).
    fn load_tasks(
        &self,
        params: &Parameters,
        config: &GraphConfig,
        loaded: &[Task],
    ) -> anyhow::Result<Vec<Task>>;

    /// Name `task`'s dependencies as `(label, edge name)` pairs against the
    /// full task set.
    ///
    /// The default reads the task's own `dependencies` map.
    fn get_dependencies(
        &self,
        task: &Task,
        _full_task_set: &TaskGraph,
    ) -> anyhow::Result<Vec<(String, String)>> {
        Ok(task
            .dependencies
            .iter()
            .map(|(name, label)| (label.clone(), name.clone()))
            .collect())
    }
}

/// Order providers so that every provider comes after its kind
/// dependencies. Ties are broken by kind name.
pub fn order_providers(
    mut providers: Vec<Box<dyn TaskProvider>>,
) -> Result<Vec<Box<dyn TaskProvider>>> {
    providers.sort_by(|a, b| a.kind().cmp(b.kind()));

    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for p in &providers {
        if graph.contains_node(p.kind()) {
            return Err(TaskgraphError::ConfigError(format!(
                "kind '{}' is provided more than once",
                p.kind()
            )));
        }
        graph.add_node(p.kind());
    }
    for p in &providers {
        for dep in p.kind_dependencies() {
            if !graph.contains_node(dep.as_str()) {
                return Err(TaskgraphError::ConfigError(format!(
                    "kind '{}' depends on unknown kind '{}'",
                    p.kind(),
                    dep
                )));
            }
            graph.add_edge(dep.as_str(), p.kind(), ());
        }
    }

    let order: Vec<String> = match toposort(&graph, None) {
        Ok(order) => order.into_iter().map(str::to_string).collect(),
        Err(cycle) => {
            return Err(TaskgraphError::KindCycle(format!(
                "cycle detected in kind dependencies involving kind '{}'",
                cycle.node_id()
            )));
        }
    };

    let mut slots: Vec<Option<Box<dyn TaskProvider>>> = providers.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());
    for kind in order {
        if let Some(slot) = slots
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|p| p.kind() == kind))
        {
            if let Some(p) = slot.take() {
                ordered.push(p);
            }
        }
    }
    Ok(ordered)
}

/// One [`ConfigKind`] provider per `[kind.<name>]` section.
pub fn providers_from_config(config: &GraphConfig) -> Vec<Box<dyn TaskProvider>> {
    config
        .kind
        .iter()
        .map(|(name, kind)| Box::new(ConfigKind::new(name.clone(), kind.clone())) as Box<dyn TaskProvider>)
        .collect()
}
