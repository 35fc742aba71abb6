// src/task/taskgraph.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dag::{Edge, Graph};
use crate::errors::{Result, TaskgraphError};
use crate::task::model::Task;

/// A [`Graph`] paired with the tasks its nodes name.
///
/// Invariant: `graph.nodes() == keys(tasks)`, and every edge joins two nodes.
/// Keys are labels before optimization and identifiers afterwards.
///
/// The serialized form is just the key -> task map; edges are re-derived from
/// each task's `dependencies` on the way back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Task>",
    into = "BTreeMap<String, Task>"
)]
pub struct TaskGraph {
    tasks: BTreeMap<String, Task>,
    graph: Graph,
}

impl TaskGraph {
    /// Validated construction from a task map and an explicit graph.
    pub fn new(tasks: BTreeMap<String, Task>, graph: Graph) -> Result<Self> {
        let keys: BTreeSet<String> = tasks.keys().cloned().collect();
        if &keys != graph.nodes() {
            let missing_tasks: Vec<&String> = graph.nodes().difference(&keys).collect();
            let missing_nodes: Vec<&String> = keys.difference(graph.nodes()).collect();
            return Err(TaskgraphError::InvalidTaskGraph(format!(
                "graph nodes and task keys differ: nodes without tasks {missing_tasks:?}, \
                 tasks without nodes {missing_nodes:?}"
            )));
        }

        let dangling: Vec<&Edge> = graph
            .edges()
            .iter()
            .filter(|e| !keys.contains(&e.from) || !keys.contains(&e.to))
            .collect();
        if !dangling.is_empty() {
            return Err(TaskgraphError::InvalidTaskGraph(format!(
                "edges reference unknown nodes: {dangling:?}"
            )));
        }

        Ok(Self { tasks, graph })
    }

    /// A graph of the given tasks with no edges, keyed by label.
    pub fn without_edges(tasks: impl IntoIterator<Item = Task>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for mut task in tasks {
            task.validate()?;
            if map.contains_key(&task.label) {
                return Err(TaskgraphError::DuplicateLabel {
                    label: task.label.clone(),
                    kinds: vec![task.kind.clone()],
                });
            }
            map.insert(task.label.clone(), task);
        }
        let graph = Graph::from_nodes(map.keys().cloned());
        Ok(Self { tasks: map, graph })
    }

    /// Build a graph whose edges come from each task's named `dependencies`.
    ///
    /// Dependencies naming keys outside `tasks` yield no edge; after
    /// optimization those are references to replaced tasks.
    pub fn from_tasks(tasks: BTreeMap<String, Task>) -> Result<Self> {
        let mut edges = BTreeSet::new();
        for (key, task) in &tasks {
            if *key != task.label && task.task_id.as_deref() != Some(key.as_str()) {
                return Err(TaskgraphError::InvalidTaskGraph(format!(
                    "key '{key}' matches neither the label nor the task_id of task '{}'",
                    task.label
                )));
            }
            for (name, dep) in &task.dependencies {
                if tasks.contains_key(dep) {
                    edges.insert(Edge::new(key.clone(), dep.clone(), name.clone()));
                }
            }
        }
        let graph = Graph::new(tasks.keys().cloned().collect(), edges);
        Self::new(tasks, graph)
    }

    pub fn tasks(&self) -> &BTreeMap<String, Task> {
        &self.tasks
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn get(&self, key: &str) -> Option<&Task> {
        self.tasks.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn into_parts(self) -> (BTreeMap<String, Task>, Graph) {
        (self.tasks, self.graph)
    }

    /// Restrict to the nodes of `graph`, which must be a subgraph of this one.
    pub fn restrict_to(&self, graph: Graph) -> Result<Self> {
        let mut tasks = BTreeMap::new();
        for node in graph.nodes() {
            let task = self
                .tasks
                .get(node)
                .ok_or_else(|| TaskgraphError::TaskNotFound(node.clone()))?;
            tasks.insert(node.clone(), task.clone());
        }
        Self::new(tasks, graph)
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: Value) -> Result<Self> {
        let tasks: BTreeMap<String, Task> = serde_json::from_value(value)?;
        Self::try_from(tasks)
    }
}

impl TryFrom<BTreeMap<String, Task>> for TaskGraph {
    type Error = TaskgraphError;

    fn try_from(mut tasks: BTreeMap<String, Task>) -> std::result::Result<Self, Self::Error> {
        for task in tasks.values_mut() {
            task.validate()?;
        }
        Self::from_tasks(tasks)
    }
}

impl From<TaskGraph> for BTreeMap<String, Task> {
    fn from(graph: TaskGraph) -> Self {
        graph.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(label: &str, deps: &[(&str, &str)]) -> Task {
        let mut t = Task::new("test", label, json!({"payload": label}));
        for (name, dep) in deps {
            t.dependencies.insert(name.to_string(), dep.to_string());
        }
        t
    }

    fn sample() -> TaskGraph {
        let tasks: BTreeMap<String, Task> = [
            task("a", &[("build", "b"), ("docker-image", "c")]),
            task("b", &[("docker-image", "c")]),
            task("c", &[]),
        ]
        .into_iter()
        .map(|t| (t.label.clone(), t))
        .collect();
        TaskGraph::from_tasks(tasks).unwrap()
    }

    #[test]
    fn from_tasks_derives_named_edges() {
        let g = sample();
        assert_eq!(g.graph().edges().len(), 3);
        assert!(g.graph().edges().contains(&Edge::new("a", "b", "build")));
    }

    #[test]
    fn json_round_trip_is_equal() {
        let g = sample();
        let back = TaskGraph::from_json(g.to_json().unwrap()).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn new_rejects_node_key_mismatch() {
        let tasks = BTreeMap::from([("a".to_string(), task("a", &[]))]);
        let graph = Graph::from_nodes(["a", "b"]);
        let err = TaskGraph::new(tasks, graph).unwrap_err();
        assert!(err.to_string().contains("\"b\""));
    }

    #[test]
    fn without_edges_rejects_duplicates() {
        let res = TaskGraph::without_edges([task("a", &[]), task("a", &[])]);
        assert!(matches!(res, Err(TaskgraphError::DuplicateLabel { .. })));
    }

    #[test]
    fn restrict_to_closure() {
        let g = sample();
        let seed = BTreeSet::from(["b".to_string()]);
        let sub = g.restrict_to(g.graph().transitive_closure(&seed).unwrap()).unwrap();
        assert_eq!(sub.keys().collect::<Vec<_>>(), vec!["b", "c"]);
    }
}
