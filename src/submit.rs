// src/submit.rs

//! Submission of the final graph to the execution service.
//!
//! Tasks are created dependencies-first: a task is only sent once every
//! task it depends on inside the graph has been created. Independent tasks
//! are created concurrently, up to a fixed limit.
//!
//! Before anything is sent, each payload is completed:
//! - `taskGroupId` and `schedulerId` are stamped on it;
//! - a task with no dependency inside the graph depends on the decision
//!   task, so nothing starts before the decision task has finished;
//! - `relative-datestamp` placeholders are resolved against one instant.
//!
//! The first failure stops further submissions; calls already in flight are
//! allowed to finish. Created tasks are never retracted.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::client::ExecutionService;
use crate::errors::{Result, TaskgraphError};
use crate::payload::resolve_timestamps;
use crate::task::TaskGraph;

/// Run-wide values stamped on every submitted task.
#[derive(Debug, Clone)]
pub struct SubmitContext {
    pub decision_task_id: String,
    pub scheduler_id: String,
    pub concurrency: usize,
    pub now: DateTime<Utc>,
}

struct Prepared {
    label: String,
    definition: Value,
}

/// Create every task of `graph` (keyed by identifier) through `queue`.
pub async fn create_tasks(
    graph: &TaskGraph,
    queue: &dyn ExecutionService,
    ctx: &SubmitContext,
) -> Result<()> {
    let order: Vec<String> = graph.graph().visit_postorder().collect();
    let links = graph.graph().links_dict();

    let mut prepared: BTreeMap<&str, Prepared> = BTreeMap::new();
    for task_id in &order {
        let task = graph
            .get(task_id)
            .ok_or_else(|| TaskgraphError::TaskNotFound(task_id.clone()))?;
        let has_graph_deps = links.get(task_id).is_some_and(|l| !l.is_empty());
        let definition = prepare(&task.label, &task.task, has_graph_deps, ctx)?;
        prepared.insert(
            task_id.as_str(),
            Prepared {
                label: task.label.clone(),
                definition,
            },
        );
    }

    // Each task waits on a count of its in-graph dependencies; creating a
    // task decrements the counts of its dependents.
    let dependents = graph.graph().reverse_links_dict();
    let mut remaining: HashMap<&str, usize> = order
        .iter()
        .map(|id| (id.as_str(), links.get(id).map_or(0, |deps| deps.len())))
        .collect();
    let mut ready: VecDeque<&str> = order
        .iter()
        .map(String::as_str)
        .filter(|id| remaining.get(id) == Some(&0))
        .collect();

    let limit = ctx.concurrency.max(1);
    let mut created = 0usize;
    let mut in_flight = FuturesUnordered::new();
    let mut failure: Option<TaskgraphError> = None;

    loop {
        while failure.is_none() && in_flight.len() < limit {
            let Some(task_id) = ready.pop_front() else {
                break;
            };
            let p = prepared
                .get(task_id)
                .ok_or_else(|| TaskgraphError::TaskNotFound(task_id.to_string()))?;
            in_flight.push(submit_one(queue, task_id, &p.label, &p.definition));
        }

        match in_flight.next().await {
            Some((task_id, Ok(()))) => {
                created += 1;
                for dependent in dependents.get(task_id).into_iter().flatten() {
                    if let Some(count) = remaining.get_mut(dependent.as_str()) {
                        *count -= 1;
                        if *count == 0 {
                            ready.push_back(dependent.as_str());
                        }
                    }
                }
            }
            Some((_, Err(err))) => {
                error!(error = %err, "task submission failed");
                failure.get_or_insert(err);
            }
            None => break,
        }
    }

    if let Some(err) = failure {
        return Err(err);
    }
    if created < order.len() {
        return Err(TaskgraphError::InvalidTaskGraph(format!(
            "could not submit {} tasks whose dependencies never completed",
            order.len() - created
        )));
    }

    info!(count = created, "submitted tasks");
    Ok(())
}

fn prepare(label: &str, task: &Value, has_graph_deps: bool, ctx: &SubmitContext) -> Result<Value> {
    let mut definition = task.clone();
    let object = definition
        .as_object_mut()
        .ok_or_else(|| TaskgraphError::TaskReference {
            label: label.to_string(),
            message: "payload must be an object".to_string(),
        })?;

    if !has_graph_deps {
        let deps = object
            .entry("dependencies")
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| TaskgraphError::TaskReference {
                label: label.to_string(),
                message: "payload `dependencies` must be a list".to_string(),
            })?;
        deps.push(Value::String(ctx.decision_task_id.clone()));
    }
    object.insert(
        "taskGroupId".to_string(),
        Value::String(ctx.decision_task_id.clone()),
    );
    object.insert(
        "schedulerId".to_string(),
        Value::String(ctx.scheduler_id.clone()),
    );

    resolve_timestamps(label, &definition, ctx.now)
}

async fn submit_one<'a>(
    queue: &'a dyn ExecutionService,
    task_id: &'a str,
    label: &'a str,
    definition: &'a Value,
) -> (&'a str, Result<()>) {
    debug!(label = %label, task_id = %task_id, "creating task");
    let res = queue
        .create_task(task_id, definition)
        .await
        .map_err(|err| TaskgraphError::Submission {
            label: label.to_string(),
            task_id: task_id.to_string(),
            message: match err {
                TaskgraphError::Service(message) => message,
                other => other.to_string(),
            },
        });
    (task_id, res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ServiceFuture;
    use crate::task::Task;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        created: Mutex<Vec<(String, Value)>>,
        fail: Option<String>,
    }

    impl ExecutionService for Recorder {
        fn create_task<'a>(&'a self, task_id: &'a str, def: &'a Value) -> ServiceFuture<'a, ()> {
            Box::pin(async move {
                if self.fail.as_deref() == Some(task_id) {
                    return Err(TaskgraphError::Service("scopes missing".into()));
                }
                self.created
                    .lock()
                    .unwrap()
                    .push((task_id.to_string(), def.clone()));
                Ok(())
            })
        }
    }

    fn graph() -> TaskGraph {
        let mut build = Task::new("build", "build", json!({"expires": {"relative-datestamp": "1 day"}}));
        build.task_id = Some("id-build".into());
        let mut test = Task::new("test", "test", json!({"dependencies": ["id-build"]}));
        test.task_id = Some("id-test".into());
        test.dependencies.insert("build".into(), "id-build".into());
        TaskGraph::from_tasks(
            [("id-build".to_string(), build), ("id-test".to_string(), test)].into(),
        )
        .unwrap()
    }

    fn ctx() -> SubmitContext {
        SubmitContext {
            decision_task_id: "decision".into(),
            scheduler_id: "example-level-3".into(),
            concurrency: 4,
            now: DateTime::from_timestamp(0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn submits_dependencies_first_with_context() {
        let queue = Recorder::default();
        create_tasks(&graph(), &queue, &ctx()).await.unwrap();

        let created = queue.created.lock().unwrap();
        let ids: Vec<&str> = created.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["id-build", "id-test"]);

        let (_, build) = &created[0];
        assert_eq!(build["dependencies"], json!(["decision"]));
        assert_eq!(build["taskGroupId"], "decision");
        assert_eq!(build["schedulerId"], "example-level-3");
        assert_eq!(build["expires"], "1970-01-02T00:00:00.000Z");

        let (_, test) = &created[1];
        assert_eq!(test["dependencies"], json!(["id-build"]));
    }

    #[tokio::test]
    async fn failure_stops_dependents_and_reports_remote_message() {
        let queue = Recorder {
            fail: Some("id-build".into()),
            ..Default::default()
        };
        let res = create_tasks(&graph(), &queue, &ctx()).await;
        match res {
            Err(TaskgraphError::Submission { label, task_id, message }) => {
                assert_eq!(label, "build");
                assert_eq!(task_id, "id-build");
                assert_eq!(message, "scopes missing");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(queue.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn long_chain_is_created_in_dependency_order() {
        // task-0 <- task-1 <- ... <- task-199
        let tasks = (0..200)
            .map(|i| {
                let id = format!("task-{i}");
                let mut task = Task::new("chain", format!("chain-{i}"), json!({}));
                task.task_id = Some(id.clone());
                if i > 0 {
                    task.dependencies.insert("parent".into(), format!("task-{}", i - 1));
                }
                (id, task)
            })
            .collect();
        let graph = TaskGraph::from_tasks(tasks).unwrap();

        let queue = Recorder::default();
        create_tasks(&graph, &queue, &ctx()).await.unwrap();

        let created = queue.created.lock().unwrap();
        let ids: Vec<&str> = created.iter().map(|(id, _)| id.as_str()).collect();
        let expected: Vec<String> = (0..200).map(|i| format!("task-{i}")).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn fan_out_waits_for_shared_dependency_only() {
        // root <- leaf-0..leaf-9 <- sink
        let mut tasks: BTreeMap<String, Task> = BTreeMap::new();
        let mut root = Task::new("fan", "root", json!({}));
        root.task_id = Some("root".into());
        tasks.insert("root".into(), root);
        let mut sink = Task::new("fan", "sink", json!({}));
        sink.task_id = Some("sink".into());
        for i in 0..10 {
            let id = format!("leaf-{i}");
            let mut leaf = Task::new("fan", id.clone(), json!({}));
            leaf.task_id = Some(id.clone());
            leaf.dependencies.insert("root".into(), "root".into());
            sink.dependencies.insert(id.clone(), id.clone());
            tasks.insert(id, leaf);
        }
        tasks.insert("sink".into(), sink);
        let graph = TaskGraph::from_tasks(tasks).unwrap();

        let queue = Recorder::default();
        create_tasks(&graph, &queue, &ctx()).await.unwrap();

        let created = queue.created.lock().unwrap();
        assert_eq!(created.len(), 12);
        assert_eq!(created[0].0, "root");
        assert_eq!(created[11].0, "sink");
    }
}
