// src/morph/routes.rs

//! Route overflow: the execution service caps the number of routes a task
//! may carry. Tasks over the cap lose their `index.` routes to an auxiliary
//! `index-task-<label>` task that inserts those index paths on the parent's
//! behalf once it completes.

use std::collections::BTreeSet;

use regex::Regex;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::GraphConfig;
use crate::errors::{Result, TaskgraphError};
use crate::morph::{Morph, amend_taskgraph};
use crate::parameters::Parameters;
use crate::slugid::slugid;
use crate::task::{LabelToTaskId, Task, TaskGraph};

const INDEX_ROUTE_PREFIX: &str = "index.";
const INDEX_TASK_PURPOSE: &str = "index-task";
const IMAGE_ARTIFACT: &str = "public/image.tar.zst";

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexTaskMorph;

impl Morph for IndexTaskMorph {
    fn name(&self) -> &str {
        "add-index-tasks"
    }

    fn apply(
        &self,
        graph: TaskGraph,
        label_to_taskid: LabelToTaskId,
        params: &Parameters,
        config: &GraphConfig,
    ) -> Result<(TaskGraph, LabelToTaskId)> {
        let max_routes = config.taskgraph.max_routes;
        let overflowing: Vec<String> = graph
            .iter()
            .filter(|t| t.routes().len() > max_routes)
            .filter_map(|t| t.task_id.clone())
            .collect();
        if overflowing.is_empty() {
            return Ok((graph, label_to_taskid));
        }

        let (mut tasks, dag) = graph.into_parts();
        let mut added = Vec::with_capacity(overflowing.len());
        for task_id in overflowing {
            let Some(parent) = tasks.get_mut(&task_id) else {
                continue;
            };
            let index_paths = strip_index_routes(parent)?;
            debug!(
                label = %parent.label,
                moved = index_paths.len(),
                "moving index routes to an index task"
            );
            added.push(make_index_task(parent, &index_paths, &label_to_taskid, params, config)?);
        }

        let graph = TaskGraph::new(tasks, dag)?;
        amend_taskgraph(graph, label_to_taskid, added)
    }
}

/// Remove every `index.` route from `task`, returning the index paths.
fn strip_index_routes(task: &mut Task) -> Result<Vec<String>> {
    let routes = task.routes();
    let (index, other): (Vec<String>, Vec<String>) = routes
        .into_iter()
        .partition(|r| r.starts_with(INDEX_ROUTE_PREFIX));

    let payload = task.task.as_object_mut().ok_or_else(|| TaskgraphError::TaskReference {
        label: task.label.clone(),
        message: "payload must be an object".to_string(),
    })?;
    payload.insert(
        "routes".to_string(),
        Value::Array(other.into_iter().map(Value::String).collect()),
    );

    Ok(index
        .into_iter()
        .map(|r| r[INDEX_ROUTE_PREFIX.len()..].to_string())
        .collect())
}

/// Scopes for inserting `index_paths`, with every path under
/// `<trust-domain>.v2.<project>.` folded into one wildcard scope.
pub fn index_scopes(trust_domain: &str, index_paths: &[String]) -> Result<Vec<String>> {
    let domain = Regex::new(&format!(r"^{}\.v2\.[^.]+\.", regex::escape(trust_domain)))
        .map_err(|e| TaskgraphError::ConfigError(format!("invalid trust domain: {e}")))?;

    let scopes: BTreeSet<String> = index_paths
        .iter()
        .map(|path| match domain.find(path) {
            Some(m) => format!("index:insert-task:{}*", m.as_str()),
            None => format!("index:insert-task:{path}"),
        })
        .collect();
    Ok(scopes.into_iter().collect())
}

fn make_index_task(
    parent: &Task,
    index_paths: &[String],
    label_to_taskid: &LabelToTaskId,
    params: &Parameters,
    config: &GraphConfig,
) -> Result<Task> {
    let parent_id = parent.task_id.clone().ok_or_else(|| {
        TaskgraphError::InvalidTaskGraph(format!("task '{}' has no task_id", parent.label))
    })?;
    let trust_domain = config.trust_domain();
    let label = format!("{INDEX_TASK_PURPOSE}-{}", parent.label);

    let mut dependencies = vec![("parent".to_string(), parent_id.clone())];
    let image = match label_to_taskid.get(&config.taskgraph.index_image_label) {
        Some(image_id) => {
            dependencies.push(("docker-image".to_string(), image_id.clone()));
            json!({"type": "task-image", "taskId": image_id, "path": IMAGE_ARTIFACT})
        }
        None => json!({
            "type": "indexed-image",
            "namespace": format!("{trust_domain}.cache.level-3.docker-images.v2.{INDEX_TASK_PURPOSE}.latest"),
            "path": IMAGE_ARTIFACT,
        }),
    };

    let rank = parent
        .task
        .pointer("/extra/index/rank")
        .cloned()
        .unwrap_or(json!(0));
    let deadline = parent
        .task
        .get("deadline")
        .cloned()
        .unwrap_or_else(|| json!({"relative-datestamp": "1 day"}));
    let metadata = parent.task.get("metadata");
    let field = |name: &str| {
        metadata
            .and_then(|m| m.get(name))
            .cloned()
            .unwrap_or_else(|| json!(""))
    };

    let mut command = vec![json!("insert-indexes.js")];
    command.extend(index_paths.iter().map(|p| json!(p)));

    let task_def = json!({
        "taskQueueId": format!("{trust_domain}-{}/misc", params.level),
        "dependencies": dependencies.iter().map(|(_, id)| id.clone()).collect::<Vec<_>>(),
        "created": {"relative-datestamp": "0 seconds"},
        "deadline": deadline.clone(),
        "expires": deadline,
        "metadata": {
            "name": label,
            "description": format!("Index routes for {}", parent.label),
            "owner": field("owner"),
            "source": field("source"),
        },
        "scopes": index_scopes(trust_domain, index_paths)?,
        "payload": {
            "image": image,
            "command": command,
            "env": {
                "TARGET_TASKID": parent_id,
                "INDEX_RANK": rank,
            },
            "features": {"taskclusterProxy": true},
            "maxRunTime": 600,
        },
    });

    let mut task = Task::new("misc", label, task_def);
    task.dependencies = dependencies.into_iter().collect();
    task.task_id = Some(slugid());
    Ok(task)
}
