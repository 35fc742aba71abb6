mod common;

use std::collections::BTreeSet;

use common::*;
use serde_json::json;
use taskgraph::errors::TaskgraphError;
use taskgraph::generator::ALWAYS_TARGET;

fn labels<'a>(keys: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    keys.map(str::to_string).collect()
}

#[test]
fn full_graph_carries_config_dependencies() {
    init_tracing();
    let mut generator = generator(
        demo_params(),
        three_kind_config().build(),
        strategies(FakeIndex::new(), FakeChangedFiles::default()),
    );

    let full = generator.full_task_graph().unwrap();
    assert_eq!(
        labels(full.keys()),
        labels(["build-linux", "docker-image-linux", "test-linux"].into_iter())
    );
    assert_eq!(full.graph().edges().len(), 2);

    let links = full.graph().links_dict();
    assert!(links["test-linux"].contains("build-linux"));
    assert!(links["build-linux"].contains("docker-image-linux"));
    assert_eq!(full.get("build-linux").unwrap().attribute("kind"), Some("build"));
}

#[test]
fn target_graph_pulls_in_dependencies_of_targets() {
    init_tracing();
    let mut generator = generator(
        demo_params(),
        three_kind_config().build(),
        strategies(FakeIndex::new(), FakeChangedFiles::default()),
    );

    let target_set = generator.target_task_set().unwrap();
    assert_eq!(labels(target_set.keys()), labels(["test-linux"].into_iter()));
    assert!(target_set.graph().edges().is_empty());

    let target_graph = generator.target_task_graph().unwrap();
    assert_eq!(target_graph.len(), 3);
    assert_eq!(target_graph.graph().edges().len(), 2);
}

#[test]
fn always_target_tasks_join_the_target_graph_when_enabled() {
    init_tracing();
    let config = three_kind_config()
        .with_kind(
            "lint",
            KindBuilder::new()
                .with_task(
                    "docs",
                    TaskConfigBuilder::new(json!({}))
                        .attribute("run_on_projects", "other")
                        .attribute(ALWAYS_TARGET, "true")
                        .build(),
                )
                .build(),
        )
        .build();

    let mut disabled = generator(
        demo_params(),
        config.clone(),
        strategies(FakeIndex::new(), FakeChangedFiles::default()),
    );
    assert!(!disabled.target_task_graph().unwrap().contains("lint-docs"));

    let params = taskgraph::parameters::Parameters {
        enable_always_target: true,
        ..demo_params()
    };
    let mut enabled = generator(params, config, strategies(FakeIndex::new(), FakeChangedFiles::default()));
    let graph = enabled.target_task_graph().unwrap();
    assert!(graph.contains("lint-docs"));
    // The target set itself is not widened.
    assert!(!enabled.target_task_set().unwrap().contains("lint-docs"));
}

#[test]
fn unknown_dependency_label_is_rejected() {
    init_tracing();
    let config = GraphConfigBuilder::new("demo")
        .with_kind(
            "build",
            KindBuilder::new()
                .with_task(
                    "linux",
                    TaskConfigBuilder::new(json!({}))
                        .depends_on("toolchain", "toolchain-missing")
                        .build(),
                )
                .build(),
        )
        .build();
    let mut generator = generator(
        demo_params(),
        config,
        strategies(FakeIndex::new(), FakeChangedFiles::default()),
    );

    match generator.full_task_graph() {
        Err(TaskgraphError::InvalidTaskGraph(msg)) => assert!(msg.contains("toolchain-missing")),
        other => panic!("expected InvalidTaskGraph, got {other:?}"),
    }
}

#[test]
fn duplicate_labels_across_kinds_are_rejected() {
    init_tracing();
    let config = GraphConfigBuilder::new("demo")
        .with_kind(
            "build",
            KindBuilder::new()
                .with_task("a", TaskConfigBuilder::new(json!({})).label("shared").build())
                .build(),
        )
        .with_kind(
            "test",
            KindBuilder::new()
                .with_task("b", TaskConfigBuilder::new(json!({})).label("shared").build())
                .build(),
        )
        .build();
    let mut generator = generator(
        demo_params(),
        config,
        strategies(FakeIndex::new(), FakeChangedFiles::default()),
    );

    match generator.full_task_set() {
        Err(TaskgraphError::DuplicateLabel { label, mut kinds }) => {
            assert_eq!(label, "shared");
            kinds.sort();
            assert_eq!(kinds, vec!["build".to_string(), "test".to_string()]);
        }
        other => panic!("expected DuplicateLabel, got {other:?}"),
    }
}

#[tokio::test]
async fn unoptimized_run_keeps_every_task_with_fresh_identifiers() {
    init_tracing();
    let mut generator = generator(
        demo_params(),
        three_kind_config().build(),
        strategies(FakeIndex::new(), FakeChangedFiles::default()),
    );

    let (graph, label_to_taskid) = generator.morphed_task_graph().await.unwrap();
    assert_eq!(graph.len(), 3);
    assert_eq!(label_to_taskid.len(), 3);

    let test_id = &label_to_taskid["test-linux"];
    let build_id = &label_to_taskid["build-linux"];
    let test = graph.get(test_id).unwrap();
    assert_eq!(test.task_id.as_deref(), Some(test_id.as_str()));
    assert_eq!(test.dependencies["build"], *build_id);
    assert_eq!(test.task["dependencies"], json!([build_id]));
    assert!(graph.graph().links_dict()[test_id].contains(build_id));
}

#[tokio::test]
async fn phases_are_computed_once() {
    init_tracing();
    let mut generator = generator(
        demo_params(),
        three_kind_config().build(),
        strategies(FakeIndex::new(), FakeChangedFiles::default()),
    );

    let first = generator.optimized_task_graph().await.unwrap();
    let second = generator.optimized_task_graph().await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&first.0, &second.0));
    assert_eq!(first.1, second.1);
}
