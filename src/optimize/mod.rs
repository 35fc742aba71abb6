// src/optimize/mod.rs

//! Optimization: drop tasks whose results are not needed and reuse tasks
//! that already exist.
//!
//! Three steps over the target task graph:
//!
//! 1. **Removal** (preorder, dependents first). A task is asked
//!    `should_remove` only once every task depending on it has been removed,
//!    so nothing is removed while something still needs it.
//! 2. **Replacement** (postorder, dependencies first). A task whose
//!    dependencies are all removed or replaced is replaced by an entry of
//!    the existing-tasks map, or else by its strategy's `should_replace`.
//! 3. **Subgraph resolution**. Survivors get identifiers, their payload
//!    references are resolved and the graph is rewritten into identifier
//!    space.

pub mod strategies;
pub mod strategy;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::dag::{Edge, Graph};
use crate::errors::{Result, TaskgraphError};
use crate::parameters::Parameters;
use crate::payload::references::ReferenceContext;
use crate::payload::resolve_task_references;
use crate::slugid::slugid;
use crate::task::{LabelToTaskId, Task, TaskGraph};

pub use strategy::{
    OptimizationStrategy, Replacement, SplitArgs, StrategyFuture, StrategyRegistry, split_by_key,
};

/// Everything the optimizer needs besides the graph itself.
#[derive(Debug, Clone, Copy)]
pub struct Optimizer<'a> {
    pub params: &'a Parameters,
    /// Labels never removed or replaced.
    pub do_not_optimize: &'a BTreeSet<String>,
    /// Labels of tasks that already exist, with their identifiers.
    pub existing_tasks: &'a LabelToTaskId,
    pub strategies: &'a StrategyRegistry,
    pub decision_task_id: &'a str,
    pub root_url: &'a str,
}

impl Optimizer<'_> {
    /// Optimize `target`, returning the graph keyed by identifier and the
    /// identifier of every surviving or replaced label.
    pub async fn optimize(&self, target: &TaskGraph) -> Result<(TaskGraph, LabelToTaskId)> {
        let removed = self.removal_pass(target).await?;
        let (removed, replaced, mut label_to_taskid) =
            self.replacement_pass(target, removed).await?;

        info!(
            removed = removed.len(),
            replaced = replaced.len(),
            kept = target.len() - removed.len() - replaced.len(),
            "optimized task graph"
        );

        let optimized = self.get_subgraph(target, &removed, &replaced, &mut label_to_taskid)?;
        Ok((optimized, label_to_taskid))
    }

    fn strategy_for(&self, task: &Task) -> Result<Option<(Arc<dyn OptimizationStrategy>, Value)>> {
        match &task.optimization {
            None => Ok(None),
            Some(opt) => {
                let strategy = self.strategies.get(&opt.strategy)?;
                Ok(Some((strategy, opt.arg.clone())))
            }
        }
    }

    async fn removal_pass(&self, target: &TaskGraph) -> Result<BTreeSet<String>> {
        let dependents = target.graph().reverse_links_dict();
        let mut removed = BTreeSet::new();

        for label in target.graph().visit_preorder() {
            if self.do_not_optimize.contains(&label) {
                continue;
            }
            let live_dependent = dependents
                .get(&label)
                .is_some_and(|deps| deps.iter().any(|d| !removed.contains(d)));
            if live_dependent {
                continue;
            }

            let task = lookup(target, &label)?;
            let Some((strategy, arg)) = self.strategy_for(task)? else {
                continue;
            };
            if strategy.should_remove(task, self.params, &arg).await? {
                debug!(label = %label, "removing task");
                removed.insert(label);
            }
        }

        Ok(removed)
    }

    async fn replacement_pass(
        &self,
        target: &TaskGraph,
        mut removed: BTreeSet<String>,
    ) -> Result<(BTreeSet<String>, BTreeSet<String>, LabelToTaskId)> {
        let dependencies = target.graph().links_dict();
        let mut replaced = BTreeSet::new();
        let mut label_to_taskid = LabelToTaskId::new();

        for label in target.graph().visit_postorder() {
            if self.do_not_optimize.contains(&label) || removed.contains(&label) {
                continue;
            }
            let blocked = dependencies
                .get(&label)
                .is_some_and(|deps| deps.iter().any(|d| !removed.contains(d) && !replaced.contains(d)));
            if blocked {
                continue;
            }

            if let Some(task_id) = self.existing_tasks.get(&label) {
                debug!(label = %label, task_id = %task_id, "reusing existing task");
                label_to_taskid.insert(label.clone(), task_id.clone());
                replaced.insert(label);
                continue;
            }

            let task = lookup(target, &label)?;
            let Some((strategy, arg)) = self.strategy_for(task)? else {
                continue;
            };
            match strategy.should_replace(task, self.params, &arg).await? {
                Replacement::Keep => {}
                Replacement::Remove => {
                    debug!(label = %label, "removing task at replacement");
                    removed.insert(label);
                }
                Replacement::TaskId(task_id) => {
                    debug!(label = %label, task_id = %task_id, "replacing task");
                    label_to_taskid.insert(label.clone(), task_id);
                    replaced.insert(label);
                }
            }
        }

        Ok((removed, replaced, label_to_taskid))
    }

    fn get_subgraph(
        &self,
        target: &TaskGraph,
        removed: &BTreeSet<String>,
        replaced: &BTreeSet<String>,
        label_to_taskid: &mut LabelToTaskId,
    ) -> Result<TaskGraph> {
        let omitted = |label: &str| removed.contains(label) || replaced.contains(label);

        let dangling: Vec<Edge> = target
            .graph()
            .edges()
            .iter()
            .filter(|e| !omitted(e.from.as_str()) && removed.contains(&e.to))
            .cloned()
            .collect();
        if !dangling.is_empty() {
            return Err(TaskgraphError::Integrity { edges: dangling });
        }

        for label in target.keys().filter(|l| !omitted(*l)) {
            if !label_to_taskid.contains_key(label) {
                label_to_taskid.insert(label.to_string(), slugid());
            }
        }
        let label_to_taskid: &LabelToTaskId = label_to_taskid;

        let named_links = target.graph().named_links_dict();
        let mut tasks = BTreeMap::new();
        let mut edges = BTreeSet::new();

        for task in target.iter().filter(|t| !omitted(t.label.as_str())) {
            let task_id = lookup_id(label_to_taskid, &task.label)?;

            let mut dependencies: BTreeMap<String, String> = BTreeMap::new();
            if let Some(named) = named_links.get(&task.label) {
                for (name, dep) in named {
                    dependencies.insert(name.clone(), lookup_id(label_to_taskid, dep)?.to_string());
                }
            }
            for soft in &task.soft_dependencies {
                if omitted(soft.as_str()) {
                    continue;
                }
                if let Some(id) = label_to_taskid.get(soft) {
                    dependencies.insert(soft.clone(), id.clone());
                    edges.insert(Edge::new(task_id, id.clone(), soft.clone()));
                }
            }

            let ctx = ReferenceContext {
                label: &task.label,
                task_id,
                decision_task_id: self.decision_task_id,
                dependencies: &dependencies,
                root_url: self.root_url,
            };
            let mut payload = resolve_task_references(&task.task, &ctx)?;
            append_dependencies(&task.label, &mut payload, dependencies.values())?;

            let mut resolved = task.clone();
            resolved.task = payload;
            resolved.dependencies = dependencies;
            resolved.task_id = Some(task_id.to_string());
            tasks.insert(task_id.to_string(), resolved);
        }

        for edge in target.graph().edges() {
            if let (Some(from), Some(to)) = (label_to_taskid.get(&edge.from), label_to_taskid.get(&edge.to)) {
                if tasks.contains_key(from) && tasks.contains_key(to) {
                    edges.insert(Edge::new(from.clone(), to.clone(), edge.name.clone()));
                }
            }
        }

        let graph = Graph::new(tasks.keys().cloned().collect(), edges);
        TaskGraph::new(tasks, graph)
    }
}

fn lookup<'g>(graph: &'g TaskGraph, label: &str) -> Result<&'g Task> {
    graph
        .get(label)
        .ok_or_else(|| TaskgraphError::TaskNotFound(label.to_string()))
}

fn lookup_id<'m>(map: &'m LabelToTaskId, label: &str) -> Result<&'m str> {
    map.get(label)
        .map(String::as_str)
        .ok_or_else(|| TaskgraphError::TaskNotFound(label.to_string()))
}

/// Add `ids` to the payload's `dependencies` list, sorted and without
/// duplicates.
fn append_dependencies<'i>(
    label: &str,
    payload: &mut Value,
    ids: impl Iterator<Item = &'i String>,
) -> Result<()> {
    let ids: BTreeSet<&String> = ids.collect();
    if ids.is_empty() {
        return Ok(());
    }
    let invalid = |message: &str| TaskgraphError::TaskReference {
        label: label.to_string(),
        message: message.to_string(),
    };
    let list = payload
        .as_object_mut()
        .ok_or_else(|| invalid("payload must be an object"))?
        .entry("dependencies")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| invalid("payload `dependencies` must be a list"))?;
    for id in ids {
        let id = Value::String(id.clone());
        if !list.contains(&id) {
            list.push(id);
        }
    }
    Ok(())
}
