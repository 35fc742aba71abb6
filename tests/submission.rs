mod common;

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use common::*;
use serde_json::json;
use taskgraph::errors::TaskgraphError;
use taskgraph::submit::{SubmitContext, create_tasks};
use taskgraph::task::{Task, TaskGraph};

fn context(concurrency: usize) -> SubmitContext {
    SubmitContext {
        decision_task_id: DECISION_TASK_ID.into(),
        scheduler_id: "demo-level-3".into(),
        concurrency,
        now: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

/// `toolchain <- build <- {test, lint}`, keyed by identifier.
fn id_graph() -> TaskGraph {
    let tasks: Vec<Task> = vec![
        TaskBuilder::new("toolchain", "toolchain-clang")
            .task_id("id-toolchain")
            .payload(json!({"deadline": {"relative-datestamp": "1 day"}}))
            .build(),
        TaskBuilder::new("build", "build-linux")
            .task_id("id-build")
            .depends_on("toolchain", "id-toolchain")
            .payload(json!({"dependencies": ["id-toolchain"]}))
            .build(),
        TaskBuilder::new("test", "test-linux")
            .task_id("id-test")
            .depends_on("build", "id-build")
            .payload(json!({"dependencies": ["id-build"]}))
            .build(),
        TaskBuilder::new("lint", "lint-linux")
            .task_id("id-lint")
            .depends_on("build", "id-build")
            .payload(json!({"dependencies": ["id-build"]}))
            .build(),
    ];
    let by_id: BTreeMap<String, Task> = tasks
        .into_iter()
        .map(|t| (t.task_id.clone().unwrap(), t))
        .collect();
    TaskGraph::from_tasks(by_id).unwrap()
}

fn position(ids: &[String], id: &str) -> usize {
    ids.iter().position(|i| i == id).unwrap()
}

#[tokio::test]
async fn tasks_are_created_after_their_dependencies() {
    init_tracing();
    let queue = RecordingQueue::new();
    with_timeout(create_tasks(&id_graph(), &queue, &context(2)))
        .await
        .unwrap();

    let ids = queue.created_ids();
    assert_eq!(ids.len(), 4);
    assert!(position(&ids, "id-toolchain") < position(&ids, "id-build"));
    assert!(position(&ids, "id-build") < position(&ids, "id-test"));
    assert!(position(&ids, "id-build") < position(&ids, "id-lint"));
}

#[tokio::test]
async fn definitions_are_completed_before_submission() {
    init_tracing();
    let queue = RecordingQueue::new();
    create_tasks(&id_graph(), &queue, &context(8)).await.unwrap();

    let created: BTreeMap<String, serde_json::Value> = queue.created().into_iter().collect();

    let root = &created["id-toolchain"];
    assert_eq!(root["dependencies"], json!([DECISION_TASK_ID]));
    assert_eq!(root["deadline"], "2024-01-02T00:00:00.000Z");

    let build = &created["id-build"];
    assert_eq!(build["dependencies"], json!(["id-toolchain"]));
    assert_eq!(build["taskGroupId"], DECISION_TASK_ID);
    assert_eq!(build["schedulerId"], "demo-level-3");
}

#[tokio::test]
async fn a_rejected_task_stops_its_dependents() {
    init_tracing();
    let queue = RecordingQueue::rejecting("id-build", "insufficient scopes");

    let err = create_tasks(&id_graph(), &queue, &context(4)).await.unwrap_err();
    match err {
        TaskgraphError::Submission {
            label,
            task_id,
            message,
        } => {
            assert_eq!(label, "build-linux");
            assert_eq!(task_id, "id-build");
            assert_eq!(message, "insufficient scopes");
        }
        other => panic!("expected Submission error, got {other:?}"),
    }
    assert_eq!(queue.created_ids(), vec!["id-toolchain".to_string()]);
}

#[tokio::test]
async fn empty_graph_submits_nothing() {
    let queue = RecordingQueue::new();
    let graph = TaskGraph::from_tasks(BTreeMap::new()).unwrap();
    create_tasks(&graph, &queue, &context(1)).await.unwrap();
    assert!(queue.created().is_empty());
}
