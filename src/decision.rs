// src/decision.rs

//! The decision run: generate the graph, persist the artifacts and submit.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::artifacts::{Artifacts, write_artifacts};
use crate::client::{ExecutionService, HttpChangedFiles, HttpIndex, HttpQueue};
use crate::config::{GraphConfig, config_path, load_and_validate};
use crate::errors::{Result, TaskgraphError};
use crate::fs::FileSystem;
use crate::generator::Generator;
use crate::optimize::StrategyRegistry;
use crate::parameters::Parameters;
use crate::submit::{SubmitContext, create_tasks};

/// Environment variable consulted when `root-url` is not configured.
pub const ROOT_URL_ENV: &str = "TASKCLUSTER_ROOT_URL";

/// Outcome of [`run_decision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionSummary {
    pub target_tasks: usize,
    pub submitted: usize,
    pub dry_run: bool,
}

/// Load `taskgraph.toml` from `root`, filling in the root URL from the
/// environment when the file leaves it empty.
pub fn load_graph_config(root: &Path) -> Result<GraphConfig> {
    let mut config = load_and_validate(config_path(root))?;
    if config.taskgraph.root_url.is_empty() {
        if let Ok(url) = std::env::var(ROOT_URL_ENV) {
            config.taskgraph.root_url = url;
        }
    }
    Ok(config)
}

/// Parameters from `path`, or the defaults.
pub fn load_parameters(fs: &dyn FileSystem, path: Option<&Path>) -> Result<Parameters> {
    match path {
        Some(path) => Parameters::load(fs, path),
        None => Ok(Parameters::default()),
    }
}

/// Strategies backed by the HTTP index and changed-files services.
pub fn http_strategies(client: &reqwest::Client, config: &GraphConfig) -> Result<StrategyRegistry> {
    let retry = config.taskgraph.retry;
    StrategyRegistry::with_defaults(
        Arc::new(HttpIndex::new(client.clone(), &config.taskgraph.root_url, retry)),
        Arc::new(HttpChangedFiles::new(client.clone(), retry)),
    )
}

pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("taskgraph/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TaskgraphError::Service(format!("building HTTP client: {e}")))
}

/// Run every phase, write artifacts into `artifacts_dir` and, unless `queue`
/// is `None`, submit the morphed graph.
pub async fn run_decision(
    generator: &mut Generator,
    fs: &dyn FileSystem,
    artifacts_dir: &Path,
    queue: Option<&dyn ExecutionService>,
) -> Result<DecisionSummary> {
    let full = generator.full_task_graph()?;
    let target_tasks: BTreeSet<String> = generator.target_task_set()?.keys().map(str::to_string).collect();
    let (graph, label_to_taskid) = generator.morphed_task_graph().await?;

    write_artifacts(
        fs,
        artifacts_dir,
        &Artifacts {
            parameters: generator.params(),
            full_task_graph: &full,
            target_tasks: &target_tasks,
            task_graph: &graph,
            label_to_taskid: &label_to_taskid,
        },
    )?;
    info!(dir = %artifacts_dir.display(), "wrote artifacts");

    let Some(queue) = queue else {
        info!(count = graph.len(), "dry run; not submitting");
        return Ok(DecisionSummary {
            target_tasks: target_tasks.len(),
            submitted: 0,
            dry_run: true,
        });
    };

    let ctx = SubmitContext {
        decision_task_id: generator.decision_task_id().to_string(),
        scheduler_id: generator.config().scheduler_id(&generator.params().level),
        concurrency: generator.config().taskgraph.concurrency,
        now: Utc::now(),
    };
    create_tasks(&graph, queue, &ctx).await?;

    Ok(DecisionSummary {
        target_tasks: target_tasks.len(),
        submitted: graph.len(),
        dry_run: false,
    })
}

/// Inputs of a full decision run from the command line.
#[derive(Debug, Clone)]
pub struct DecisionOptions {
    pub root: PathBuf,
    pub parameters: Option<PathBuf>,
    pub artifacts_dir: PathBuf,
    pub decision_task_id: String,
    pub dry_run: bool,
}

/// Wire the HTTP services and run [`run_decision`].
pub async fn taskgraph_decision(opts: &DecisionOptions, fs: &dyn FileSystem) -> Result<DecisionSummary> {
    let config = load_graph_config(&opts.root)?;
    let params = load_parameters(fs, opts.parameters.as_deref())?;
    params.level_number()?;

    let client = http_client()?;
    let strategies = http_strategies(&client, &config)?;
    let queue = HttpQueue::new(client, &config.taskgraph.root_url, config.taskgraph.retry);

    let mut generator = Generator::new(params, config, strategies, opts.decision_task_id.clone())?;
    let queue: Option<&dyn ExecutionService> = if opts.dry_run { None } else { Some(&queue) };
    run_decision(&mut generator, fs, &opts.artifacts_dir, queue).await
}
