// src/morph/mod.rs

//! Rewrites applied to the optimized graph before submission.
//!
//! Each morph takes the graph (keyed by identifier) and the label map and
//! returns new ones. Morphs are the only place after optimization where new
//! tasks may appear; such tasks get fresh identifiers and are added to both
//! the graph and the label map.

pub mod routes;
pub mod templates;

use std::collections::BTreeSet;
use std::fmt::Debug;

use tracing::info;

use crate::config::GraphConfig;
use crate::dag::{Edge, Graph};
use crate::errors::{Result, TaskgraphError};
use crate::parameters::Parameters;
use crate::task::{LabelToTaskId, Task, TaskGraph};

pub use routes::IndexTaskMorph;
pub use templates::TemplateMorph;

/// A single graph rewrite.
pub trait Morph: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn apply(
        &self,
        graph: TaskGraph,
        label_to_taskid: LabelToTaskId,
        params: &Parameters,
        config: &GraphConfig,
    ) -> Result<(TaskGraph, LabelToTaskId)>;
}

/// The morphs every run applies, in order.
pub fn default_morphs() -> Vec<Box<dyn Morph>> {
    vec![Box::new(IndexTaskMorph), Box::new(TemplateMorph)]
}

/// Apply `morphs` in sequence.
pub fn morph(
    morphs: &[Box<dyn Morph>],
    mut graph: TaskGraph,
    mut label_to_taskid: LabelToTaskId,
    params: &Parameters,
    config: &GraphConfig,
) -> Result<(TaskGraph, LabelToTaskId)> {
    for m in morphs {
        let before = graph.len();
        (graph, label_to_taskid) = m.apply(graph, label_to_taskid, params, config)?;
        info!(morph = m.name(), before, after = graph.len(), "applied morph");
    }
    Ok((graph, label_to_taskid))
}

/// Add `new_tasks` (which must carry identifiers and id-space
/// dependencies) to `graph`.
///
/// Dependencies on identifiers outside the graph stay in the task but yield
/// no edge.
pub fn amend_taskgraph(
    graph: TaskGraph,
    mut label_to_taskid: LabelToTaskId,
    new_tasks: Vec<Task>,
) -> Result<(TaskGraph, LabelToTaskId)> {
    let (mut tasks, graph) = graph.into_parts();
    let mut edges: BTreeSet<Edge> = graph.edges().clone();

    for task in new_tasks {
        let task_id = task.task_id.clone().ok_or_else(|| {
            TaskgraphError::InvalidTaskGraph(format!("added task '{}' has no task_id", task.label))
        })?;
        if label_to_taskid.contains_key(&task.label) || tasks.contains_key(&task_id) {
            return Err(TaskgraphError::DuplicateLabel {
                label: task.label.clone(),
                kinds: vec![task.kind.clone()],
            });
        }
        label_to_taskid.insert(task.label.clone(), task_id.clone());
        for (name, dep) in &task.dependencies {
            edges.insert(Edge::new(task_id.clone(), dep.clone(), name.clone()));
        }
        tasks.insert(task_id, task);
    }

    edges.retain(|e| tasks.contains_key(&e.to));
    let graph = Graph::new(tasks.keys().cloned().collect(), edges);
    Ok((TaskGraph::new(tasks, graph)?, label_to_taskid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskgraphSection;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn id_task(label: &str, id: &str, deps: &[(&str, &str)]) -> Task {
        let mut t = Task::new("test", label, json!({}));
        t.task_id = Some(id.to_string());
        for (name, dep) in deps {
            t.dependencies.insert(name.to_string(), dep.to_string());
        }
        t
    }

    fn base() -> (TaskGraph, LabelToTaskId) {
        let t = id_task("a", "id-a", &[]);
        let graph = TaskGraph::from_tasks([("id-a".to_string(), t)].into()).unwrap();
        (graph, [("a".to_string(), "id-a".to_string())].into())
    }

    #[test]
    fn amend_adds_nodes_and_edges() {
        let (graph, map) = base();
        let added = id_task("b", "id-b", &[("parent", "id-a"), ("image", "elsewhere")]);
        let (graph, map) = amend_taskgraph(graph, map, vec![added]).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(map["b"], "id-b");
        assert_eq!(graph.graph().edges().len(), 1);
        assert_eq!(graph.get("id-b").unwrap().dependencies["image"], "elsewhere");
    }

    #[test]
    fn amend_rejects_existing_labels() {
        let (graph, map) = base();
        let res = amend_taskgraph(graph, map, vec![id_task("a", "id-other", &[])]);
        assert!(matches!(res, Err(TaskgraphError::DuplicateLabel { .. })));
    }

    #[derive(Debug)]
    struct DropAll;

    impl Morph for DropAll {
        fn name(&self) -> &str {
            "drop-all"
        }

        fn apply(
            &self,
            _graph: TaskGraph,
            _label_to_taskid: LabelToTaskId,
            _params: &Parameters,
            _config: &GraphConfig,
        ) -> Result<(TaskGraph, LabelToTaskId)> {
            Ok((TaskGraph::from_tasks(BTreeMap::new())?, LabelToTaskId::new()))
        }
    }

    #[test]
    fn morph_may_shrink_the_graph() {
        let (graph, map) = base();
        let config = GraphConfig::new_unchecked(
            TaskgraphSection::new("example"),
            BTreeMap::new(),
            BTreeMap::new(),
        );
        let morphs: Vec<Box<dyn Morph>> = vec![Box::new(DropAll)];

        // The info event must be enabled so its fields are evaluated.
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        let (graph, map) = tracing::subscriber::with_default(subscriber, || {
            morph(&morphs, graph, map, &Parameters::default(), &config)
        })
        .unwrap();

        assert!(graph.is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn amend_requires_identifiers() {
        let (graph, map) = base();
        let res = amend_taskgraph(graph, map, vec![Task::new("test", "c", json!({}))]);
        assert!(res.is_err());
    }
}
