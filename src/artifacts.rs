// src/artifacts.rs

//! JSON documents written by a decision run for downstream tooling
//! (actions, debugging, resumption).

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::parameters::Parameters;
use crate::task::{LabelToTaskId, TaskGraph};

pub const PARAMETERS: &str = "parameters.json";
pub const FULL_TASK_GRAPH: &str = "full-task-graph.json";
pub const TARGET_TASKS: &str = "target-tasks.json";
pub const TASK_GRAPH: &str = "task-graph.json";
pub const LABEL_TO_TASKID: &str = "label-to-taskid.json";

/// What a decision run persists.
#[derive(Debug, Clone, Copy)]
pub struct Artifacts<'a> {
    pub parameters: &'a Parameters,
    /// Keyed by label.
    pub full_task_graph: &'a TaskGraph,
    pub target_tasks: &'a BTreeSet<String>,
    /// The morphed graph, keyed by identifier.
    pub task_graph: &'a TaskGraph,
    pub label_to_taskid: &'a LabelToTaskId,
}

pub fn write_artifacts(fs: &dyn FileSystem, dir: &Path, artifacts: &Artifacts<'_>) -> Result<()> {
    write_json(fs, &dir.join(PARAMETERS), artifacts.parameters)?;
    write_json(fs, &dir.join(FULL_TASK_GRAPH), artifacts.full_task_graph)?;
    write_json(fs, &dir.join(TARGET_TASKS), artifacts.target_tasks)?;
    write_json(fs, &dir.join(TASK_GRAPH), artifacts.task_graph)?;
    write_json(fs, &dir.join(LABEL_TO_TASKID), artifacts.label_to_taskid)?;
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(fs: &dyn FileSystem, path: &Path, value: &T) -> Result<()> {
    let mut contents = serde_json::to_vec_pretty(value)?;
    contents.push(b'\n');
    fs.write(path, &contents)?;
    debug!(path = %path.display(), "wrote artifact");
    Ok(())
}

/// Read back a full task graph written by [`write_artifacts`].
pub fn read_full_task_graph(fs: &dyn FileSystem, dir: &Path) -> Result<TaskGraph> {
    let contents = fs.read_to_string(&dir.join(FULL_TASK_GRAPH))?;
    TaskGraph::from_json(serde_json::from_str(&contents)?)
}
