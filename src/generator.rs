// src/generator.rs

//! The phase pipeline.
//!
//! ```text
//! full_task_set -> full_task_graph -> target_task_set -> target_task_graph
//!     -> optimized_task_graph -> morphed_task_graph
//! ```
//!
//! Each phase is computed on first access from the one before it and cached,
//! so every phase can be inspected independently without recomputing the
//! earlier ones.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::info;

use crate::config::GraphConfig;
use crate::dag::{Edge, Graph};
use crate::errors::{Result, TaskgraphError};
use crate::morph::{Morph, default_morphs, morph};
use crate::optimize::{Optimizer, StrategyRegistry};
use crate::parameters::Parameters;
use crate::provider::{TaskProvider, order_providers, providers_from_config};
use crate::target::TargetRegistry;
use crate::task::{LabelToTaskId, Task, TaskGraph};

/// Attribute marking tasks added to every target graph when
/// `enable_always_target` is set.
pub const ALWAYS_TARGET: &str = "always_target";

type Resolved = (Arc<TaskGraph>, Arc<LabelToTaskId>);

#[derive(Debug)]
pub struct Generator {
    params: Parameters,
    config: GraphConfig,
    providers: Vec<Box<dyn TaskProvider>>,
    targets: TargetRegistry,
    strategies: StrategyRegistry,
    morphs: Vec<Box<dyn Morph>>,
    decision_task_id: String,

    full_task_set: Option<Arc<TaskGraph>>,
    full_task_graph: Option<Arc<TaskGraph>>,
    target_task_set: Option<Arc<TaskGraph>>,
    target_task_graph: Option<Arc<TaskGraph>>,
    optimized: Option<Resolved>,
    morphed: Option<Resolved>,
}

impl Generator {
    /// A generator over the kinds declared in `config`, with the built-in
    /// target methods and morphs.
    pub fn new(
        params: Parameters,
        config: GraphConfig,
        strategies: StrategyRegistry,
        decision_task_id: impl Into<String>,
    ) -> Result<Self> {
        let providers = order_providers(providers_from_config(&config))?;
        Ok(Self {
            params,
            config,
            providers,
            targets: TargetRegistry::with_defaults(),
            strategies,
            morphs: default_morphs(),
            decision_task_id: decision_task_id.into(),
            full_task_set: None,
            full_task_graph: None,
            target_task_set: None,
            target_task_graph: None,
            optimized: None,
            morphed: None,
        })
    }

    /// Resume from a previously computed full task graph; providers are not
    /// consulted.
    pub fn from_full_task_graph(
        params: Parameters,
        config: GraphConfig,
        strategies: StrategyRegistry,
        decision_task_id: impl Into<String>,
        full_task_graph: TaskGraph,
    ) -> Result<Self> {
        let full_task_set = full_task_graph.restrict_to(Graph::from_nodes(
            full_task_graph.graph().nodes().iter().cloned(),
        ))?;
        Ok(Self {
            params,
            config,
            providers: Vec::new(),
            targets: TargetRegistry::with_defaults(),
            strategies,
            morphs: default_morphs(),
            decision_task_id: decision_task_id.into(),
            full_task_set: Some(Arc::new(full_task_set)),
            full_task_graph: Some(Arc::new(full_task_graph)),
            target_task_set: None,
            target_task_graph: None,
            optimized: None,
            morphed: None,
        })
    }

    /// Replace the providers (they are re-ordered by kind dependencies).
    pub fn with_providers(mut self, providers: Vec<Box<dyn TaskProvider>>) -> Result<Self> {
        self.providers = order_providers(providers)?;
        Ok(self)
    }

    pub fn with_targets(mut self, targets: TargetRegistry) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_morphs(mut self, morphs: Vec<Box<dyn Morph>>) -> Self {
        self.morphs = morphs;
        self
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn decision_task_id(&self) -> &str {
        &self.decision_task_id
    }

    /// Every task from every provider, without edges.
    pub fn full_task_set(&mut self) -> Result<Arc<TaskGraph>> {
        if let Some(set) = &self.full_task_set {
            return Ok(set.clone());
        }

        let mut loaded: Vec<Task> = Vec::new();
        let mut kind_of: BTreeMap<String, String> = BTreeMap::new();
        for provider in &self.providers {
            let kind = provider.kind();
            let tasks = provider
                .load_tasks(&self.params, &self.config, &loaded)
                .map_err(|e| TaskgraphError::Provider {
                    kind: kind.to_string(),
                    message: format!("{e:#}"),
                })?;
            let count = tasks.len();
            for task in tasks {
                if task.kind != kind {
                    return Err(TaskgraphError::Provider {
                        kind: kind.to_string(),
                        message: format!("task '{}' claims kind '{}'", task.label, task.kind),
                    });
                }
                if let Some(other) = kind_of.insert(task.label.clone(), kind.to_string()) {
                    return Err(TaskgraphError::DuplicateLabel {
                        label: task.label.clone(),
                        kinds: vec![other, kind.to_string()],
                    });
                }
                loaded.push(task);
            }
            info!(kind, count, "loaded tasks");
        }

        let set = Arc::new(TaskGraph::without_edges(loaded)?);
        info!(count = set.len(), "generated full task set");
        self.full_task_set = Some(set.clone());
        Ok(set)
    }

    /// The full task set with the edges its providers name.
    pub fn full_task_graph(&mut self) -> Result<Arc<TaskGraph>> {
        if let Some(graph) = &self.full_task_graph {
            return Ok(graph.clone());
        }

        let set = self.full_task_set()?;
        let mut tasks = BTreeMap::new();
        let mut edges = BTreeSet::new();
        for task in set.iter() {
            let provider = self
                .providers
                .iter()
                .find(|p| p.kind() == task.kind)
                .ok_or_else(|| TaskgraphError::Provider {
                    kind: task.kind.clone(),
                    message: "no provider for this kind".to_string(),
                })?;
            let deps = provider
                .get_dependencies(task, &set)
                .map_err(|e| TaskgraphError::Provider {
                    kind: task.kind.clone(),
                    message: format!("{e:#}"),
                })?;

            let mut task = task.clone();
            task.dependencies.clear();
            for (dep, name) in deps {
                if !set.contains(&dep) {
                    return Err(TaskgraphError::InvalidTaskGraph(format!(
                        "task '{}' depends on unknown task '{}' (as '{}')",
                        task.label, dep, name
                    )));
                }
                edges.insert(Edge::new(task.label.clone(), dep.clone(), name.clone()));
                task.dependencies.insert(name, dep);
            }
            tasks.insert(task.label.clone(), task);
        }

        let graph = Arc::new(TaskGraph::new(tasks, Graph::new(set.graph().nodes().clone(), edges))?);
        info!(
            count = graph.len(),
            edges = graph.graph().edges().len(),
            "generated full task graph"
        );
        self.full_task_graph = Some(graph.clone());
        Ok(graph)
    }

    /// The tasks this run targets, without edges.
    pub fn target_task_set(&mut self) -> Result<Arc<TaskGraph>> {
        if let Some(set) = &self.target_task_set {
            return Ok(set.clone());
        }

        let full = self.full_task_graph()?;
        let labels = self.targets.select(&full, &self.params)?;
        let set = Arc::new(full.restrict_to(Graph::from_nodes(labels))?);
        info!(
            count = set.len(),
            method = %self.params.target_tasks_method,
            "generated target task set"
        );
        self.target_task_set = Some(set.clone());
        Ok(set)
    }

    /// The target tasks and everything they transitively depend on.
    pub fn target_task_graph(&mut self) -> Result<Arc<TaskGraph>> {
        if let Some(graph) = &self.target_task_graph {
            return Ok(graph.clone());
        }

        let full = self.full_task_graph()?;
        let mut seed: BTreeSet<String> = self.target_task_set()?.keys().map(str::to_string).collect();
        if self.params.enable_always_target {
            seed.extend(
                full.iter()
                    .filter(|t| t.attribute(ALWAYS_TARGET) == Some("true"))
                    .map(|t| t.label.clone()),
            );
        }

        let closure = full.graph().transitive_closure(&seed)?;
        let graph = Arc::new(full.restrict_to(closure)?);
        info!(count = graph.len(), "generated target task graph");
        self.target_task_graph = Some(graph.clone());
        Ok(graph)
    }

    /// Labels the optimizer must leave alone.
    pub fn do_not_optimize(&mut self) -> Result<BTreeSet<String>> {
        let mut labels: BTreeSet<String> = self.params.do_not_optimize.iter().cloned().collect();
        if !self.params.optimize_target_tasks {
            labels.extend(self.target_task_set()?.keys().map(str::to_string));
        }
        Ok(labels)
    }

    /// The optimized graph (keyed by identifier) and the label map.
    pub async fn optimized_task_graph(&mut self) -> Result<Resolved> {
        if let Some(optimized) = &self.optimized {
            return Ok(optimized.clone());
        }

        let target = self.target_task_graph()?;
        let do_not_optimize = self.do_not_optimize()?;
        let existing_tasks: LabelToTaskId = self.params.existing_tasks.clone();
        let (graph, label_to_taskid) = Optimizer {
            params: &self.params,
            do_not_optimize: &do_not_optimize,
            existing_tasks: &existing_tasks,
            strategies: &self.strategies,
            decision_task_id: &self.decision_task_id,
            root_url: &self.config.taskgraph.root_url,
        }
        .optimize(&target)
        .await?;

        let optimized = (Arc::new(graph), Arc::new(label_to_taskid));
        info!(count = optimized.0.len(), "generated optimized task graph");
        self.optimized = Some(optimized.clone());
        Ok(optimized)
    }

    /// The final graph to submit and the final label map.
    pub async fn morphed_task_graph(&mut self) -> Result<Resolved> {
        if let Some(morphed) = &self.morphed {
            return Ok(morphed.clone());
        }

        let (graph, label_to_taskid) = self.optimized_task_graph().await?;
        let (graph, label_to_taskid) = morph(
            &self.morphs,
            TaskGraph::clone(&graph),
            LabelToTaskId::clone(&label_to_taskid),
            &self.params,
            &self.config,
        )?;

        let morphed = (Arc::new(graph), Arc::new(label_to_taskid));
        info!(count = morphed.0.len(), "generated morphed task graph");
        self.morphed = Some(morphed.clone());
        Ok(morphed)
    }
}
