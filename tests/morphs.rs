mod common;

use std::collections::BTreeMap;

use common::*;
use serde_json::{Value, json};
use taskgraph::errors::TaskgraphError;
use taskgraph::parameters::{Parameters, TryTaskConfig};

fn routes(index: usize, other: usize) -> Vec<String> {
    let mut routes: Vec<String> = (0..index)
        .map(|i| format!("index.demo.v2.demo.build.linux.{i}"))
        .collect();
    routes.extend((0..other).map(|i| format!("notify.email.{i}.on-failed")));
    routes
}

fn routed_build(routes: Vec<String>) -> GraphConfigBuilder {
    GraphConfigBuilder::new("demo").with_kind(
        "build",
        KindBuilder::new()
            .with_task(
                "linux",
                TaskConfigBuilder::new(json!({
                    "routes": routes,
                    "metadata": {"owner": "ci@example.com", "source": "https://example.com/ci"},
                    "payload": {},
                }))
                .build(),
            )
            .build(),
    )
}

#[tokio::test]
async fn overflowing_routes_move_to_an_index_task() {
    init_tracing();
    let config = routed_build(routes(12, 3)).with_max_routes(10).build();
    let mut generator = generator(
        demo_params(),
        config,
        strategies(FakeIndex::new(), FakeChangedFiles::default()),
    );

    let (graph, label_to_taskid) = generator.morphed_task_graph().await.unwrap();
    assert_eq!(graph.len(), 2);

    let parent_id = &label_to_taskid["build-linux"];
    let parent = graph.get(parent_id).unwrap();
    assert_eq!(parent.routes(), routes(0, 3));

    let index_id = &label_to_taskid["index-task-build-linux"];
    let index_task = graph.get(index_id).unwrap();
    assert_eq!(index_task.kind, "misc");
    assert_eq!(index_task.dependencies["parent"], *parent_id);
    assert_eq!(index_task.task["payload"]["env"]["TARGET_TASKID"], json!(parent_id));

    let command = index_task.task["payload"]["command"].as_array().unwrap();
    assert_eq!(command.len(), 13);
    assert_eq!(command[0], "insert-indexes.js");
    assert_eq!(command[1], "demo.v2.demo.build.linux.0");
    assert_eq!(index_task.task["scopes"], json!(["index:insert-task:demo.v2.demo.*"]));
    assert_eq!(index_task.task["metadata"]["owner"], "ci@example.com");

    // No image task in the graph, so the image comes from the index.
    assert_eq!(index_task.task["payload"]["image"]["type"], "indexed-image");
    assert!(graph.graph().links_dict()[index_id].contains(parent_id));
}

#[tokio::test]
async fn tasks_within_the_route_limit_are_untouched() {
    init_tracing();
    let config = routed_build(routes(8, 2)).with_max_routes(10).build();
    let mut generator = generator(
        demo_params(),
        config,
        strategies(FakeIndex::new(), FakeChangedFiles::default()),
    );

    let (graph, label_to_taskid) = generator.morphed_task_graph().await.unwrap();
    assert_eq!(graph.len(), 1);
    assert_eq!(graph.get(&label_to_taskid["build-linux"]).unwrap().routes().len(), 10);
}

fn try_params(tasks: &[&str], templates: &[(&str, Value)]) -> Parameters {
    Parameters {
        try_mode: Some("try_task_config".into()),
        try_task_config: TryTaskConfig {
            tasks: tasks.iter().map(|s| s.to_string()).collect(),
            templates: templates
                .iter()
                .map(|(n, v)| (n.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        },
        ..demo_params()
    }
}

const REBUILD: &str = r#"{"attributes": {"kind": "{{ kind }}", "rebuild": "{{ input }}"}}"#;

#[tokio::test]
async fn templates_rewrite_selected_tasks() {
    init_tracing();
    let config = three_kind_config().with_template("rebuild", REBUILD).build();
    let params = try_params(&["test-linux"], &[("rebuild", json!(5))]);
    let mut generator = generator(params, config, strategies(FakeIndex::new(), FakeChangedFiles::default()));

    let (graph, label_to_taskid) = generator.morphed_task_graph().await.unwrap();
    let test = graph.get(&label_to_taskid["test-linux"]).unwrap();
    assert_eq!(test.attribute("rebuild"), Some("5"));
    assert_eq!(test.attribute("kind"), Some("test"));

    let build = graph.get(&label_to_taskid["build-linux"]).unwrap();
    assert_eq!(build.attribute("rebuild"), None);
}

#[tokio::test]
async fn templates_are_ignored_outside_try_task_config_mode() {
    init_tracing();
    let config = three_kind_config().with_template("rebuild", REBUILD).build();
    let params = Parameters {
        try_mode: None,
        ..try_params(&[], &[("rebuild", json!(5))])
    };
    let mut generator = generator(params, config, strategies(FakeIndex::new(), FakeChangedFiles::default()));

    let (graph, _) = generator.morphed_task_graph().await.unwrap();
    assert!(graph.iter().all(|t| t.attribute("rebuild").is_none()));
}

#[tokio::test]
async fn unknown_template_is_an_error() {
    init_tracing();
    let params = try_params(&[], &[("missing", json!(null))]);
    let mut generator = generator(
        params,
        three_kind_config().build(),
        strategies(FakeIndex::new(), FakeChangedFiles::default()),
    );

    match generator.morphed_task_graph().await {
        Err(TaskgraphError::Template { name, .. }) => assert_eq!(name, "missing"),
        other => panic!("expected Template error, got {other:?}"),
    }
}
