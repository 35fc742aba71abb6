// src/target.rs

//! Target selection: which tasks this run actually wants.
//!
//! A *method* chooses labels from the full task graph and is picked by the
//! `target_tasks_method` parameter. *Filters* are applied in the order given
//! by the `filters` parameter, each narrowing the current target set; the
//! built-in `target_tasks_method` filter is where the method is applied.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::errors::{Result, TaskgraphError};
use crate::parameters::{Parameters, TARGET_TASKS_METHOD_FILTER};
use crate::task::TaskGraph;

/// `(full task graph, parameters) -> labels`.
pub type TargetMethod = Arc<dyn Fn(&TaskGraph, &Parameters) -> Result<BTreeSet<String>> + Send + Sync>;

/// `(current target set, parameters) -> labels`, which must be a subset.
pub type TargetFilter = Arc<dyn Fn(&TaskGraph, &Parameters) -> Result<BTreeSet<String>> + Send + Sync>;

/// Attribute listing the projects (comma separated, or `all`) a task runs on.
pub const RUN_ON_PROJECTS: &str = "run_on_projects";

#[derive(Clone, Default)]
pub struct TargetRegistry {
    methods: BTreeMap<String, TargetMethod>,
    filters: BTreeMap<String, TargetFilter>,
}

impl fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetRegistry")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TargetRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in methods `default`, `all` and `nothing`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_method("default", Arc::new(target_tasks_default));
        registry.register_method(
            "all",
            Arc::new(|full: &TaskGraph, _: &Parameters| -> Result<BTreeSet<String>> {
                Ok(full.keys().map(str::to_string).collect())
            }),
        );
        registry.register_method(
            "nothing",
            Arc::new(|_: &TaskGraph, _: &Parameters| -> Result<BTreeSet<String>> { Ok(BTreeSet::new()) }),
        );
        registry
    }

    pub fn register_method(&mut self, name: impl Into<String>, method: TargetMethod) {
        self.methods.insert(name.into(), method);
    }

    pub fn register_filter(&mut self, name: impl Into<String>, filter: TargetFilter) {
        self.filters.insert(name.into(), filter);
    }

    /// Run the configured filters over `full` and return the target labels.
    pub fn select(&self, full: &TaskGraph, params: &Parameters) -> Result<BTreeSet<String>> {
        let mut current: BTreeSet<String> = full.keys().map(str::to_string).collect();

        for name in &params.filters {
            let before = current.len();
            let chosen = if name == TARGET_TASKS_METHOD_FILTER {
                let method = self
                    .methods
                    .get(&params.target_tasks_method)
                    .ok_or_else(|| TaskgraphError::UnknownTargetMethod(params.target_tasks_method.clone()))?;
                method(full, params)?
            } else {
                let filter = self
                    .filters
                    .get(name)
                    .ok_or_else(|| TaskgraphError::UnknownTargetMethod(name.clone()))?;
                let set = full.restrict_to(crate::dag::Graph::from_nodes(current.iter().cloned()))?;
                filter(&set, params)?
            };

            if let Some(unknown) = chosen.iter().find(|l| !full.contains(l)) {
                return Err(TaskgraphError::TaskNotFound(format!(
                    "target filter '{name}' selected unknown label '{unknown}'"
                )));
            }
            current = current.intersection(&chosen).cloned().collect();
            info!(
                filter = %name,
                pruned = before - current.len(),
                remaining = current.len(),
                "applied target filter"
            );
        }

        Ok(current)
    }
}

/// Select tasks whose `run_on_projects` is absent, contains `all`, or
/// contains the run's project.
pub fn target_tasks_default(full: &TaskGraph, params: &Parameters) -> Result<BTreeSet<String>> {
    Ok(full
        .iter()
        .filter(|task| match task.attribute(RUN_ON_PROJECTS) {
            None => true,
            Some(projects) => projects
                .split(',')
                .map(str::trim)
                .any(|p| p == "all" || p == params.project),
        })
        .map(|task| task.label.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use serde_json::json;

    fn graph() -> TaskGraph {
        let mut a = Task::new("build", "a", json!({}));
        a.attributes.insert(RUN_ON_PROJECTS.into(), "main, release".into());
        let mut b = Task::new("build", "b", json!({}));
        b.attributes.insert(RUN_ON_PROJECTS.into(), "all".into());
        let c = Task::new("test", "c", json!({}));
        TaskGraph::without_edges([a, b, c]).unwrap()
    }

    fn params(project: &str, method: &str) -> Parameters {
        Parameters {
            project: project.into(),
            target_tasks_method: method.into(),
            ..Parameters::default()
        }
    }

    #[test]
    fn default_method_honours_run_on_projects() {
        let reg = TargetRegistry::with_defaults();
        let main = reg.select(&graph(), &params("main", "default")).unwrap();
        assert_eq!(main.len(), 3);
        let other = reg.select(&graph(), &params("try", "default")).unwrap();
        assert_eq!(other, BTreeSet::from(["b".to_string(), "c".to_string()]));
    }

    #[test]
    fn unknown_method_is_an_error() {
        let reg = TargetRegistry::with_defaults();
        let res = reg.select(&graph(), &params("main", "bogus"));
        assert!(matches!(res, Err(TaskgraphError::UnknownTargetMethod(_))));
    }

    #[test]
    fn filters_narrow_in_order() {
        let mut reg = TargetRegistry::with_defaults();
        reg.register_filter(
            "only-build",
            Arc::new(|set: &TaskGraph, _: &Parameters| -> Result<BTreeSet<String>> {
                Ok(set.iter().filter(|t| t.kind == "build").map(|t| t.label.clone()).collect())
            }),
        );
        let mut p = params("main", "all");
        p.filters = vec!["target_tasks_method".into(), "only-build".into()];
        let chosen = reg.select(&graph(), &p).unwrap();
        assert_eq!(chosen, BTreeSet::from(["a".to_string(), "b".to_string()]));
    }
}
