#![allow(dead_code, unused_imports)]

use std::sync::Arc;

use serde_json::json;
use taskgraph::config::GraphConfig;
use taskgraph::generator::Generator;
use taskgraph::optimize::StrategyRegistry;
use taskgraph::parameters::Parameters;

pub use taskgraph_test_utils::builders::{
    GraphConfigBuilder, KindBuilder, TaskBuilder, TaskConfigBuilder, task_graph,
};
pub use taskgraph_test_utils::fake_services::{FakeChangedFiles, FakeIndex, RecordingQueue};
pub use taskgraph_test_utils::{init_tracing, with_timeout};

pub const DECISION_TASK_ID: &str = "decision-task-id";

pub fn strategies(index: FakeIndex, changed: FakeChangedFiles) -> StrategyRegistry {
    StrategyRegistry::with_defaults(Arc::new(index), Arc::new(changed))
        .expect("default strategies register")
}

/// Three kinds chained `docker-image <- build <- test`.
///
/// Only `test-linux` is targeted for project `demo`; the other two run on
/// project `other` and enter the target graph as dependencies.
pub fn three_kind_config() -> GraphConfigBuilder {
    GraphConfigBuilder::new("demo")
        .with_kind(
            "docker-image",
            KindBuilder::new()
                .with_task(
                    "linux",
                    TaskConfigBuilder::new(json!({"payload": {"image": "linux"}}))
                        .attribute("run_on_projects", "other")
                        .build(),
                )
                .build(),
        )
        .with_kind(
            "build",
            KindBuilder::new()
                .after("docker-image")
                .with_task(
                    "linux",
                    TaskConfigBuilder::new(json!({"payload": {"command": ["make"]}}))
                        .depends_on("docker-image", "docker-image-linux")
                        .attribute("run_on_projects", "other")
                        .build(),
                )
                .build(),
        )
        .with_kind(
            "test",
            KindBuilder::new()
                .after("build")
                .with_task(
                    "linux",
                    TaskConfigBuilder::new(json!({"payload": {"command": ["make", "check"]}}))
                        .depends_on("build", "build-linux")
                        .build(),
                )
                .build(),
        )
}

pub fn demo_params() -> Parameters {
    Parameters {
        project: "demo".into(),
        head_repository: "https://hg.example.com/demo".into(),
        head_rev: "abcdef".into(),
        build_date: 1_700_000_000,
        ..Parameters::default()
    }
}

pub fn generator(params: Parameters, config: GraphConfig, strategies: StrategyRegistry) -> Generator {
    Generator::new(params, config, strategies, DECISION_TASK_ID).expect("generator builds")
}
