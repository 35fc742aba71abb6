// src/lib.rs

pub mod artifacts;
pub mod cli;
pub mod client;
pub mod config;
pub mod dag;
pub mod decision;
pub mod errors;
pub mod fs;
pub mod generator;
pub mod logging;
pub mod morph;
pub mod optimize;
pub mod parameters;
pub mod payload;
pub mod provider;
pub mod slugid;
pub mod submit;
pub mod target;
pub mod task;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::cli::{CliArgs, Command, CommonArgs, ShowArgs};
use crate::decision::{
    DecisionOptions, http_client, http_strategies, load_graph_config, load_parameters,
    taskgraph_decision,
};
use crate::fs::{FileSystem, RealFileSystem};
use crate::generator::Generator;
use crate::task::TaskGraph;

/// Environment variable holding the decision task's own identifier.
pub const TASK_ID_ENV: &str = "TASK_ID";

#[derive(Debug, Clone, Copy)]
enum Phase {
    Full,
    Target,
    TargetGraph,
    Optimized,
    Morphed,
}

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let fs = RealFileSystem;
    let decision_task_id = std::env::var(TASK_ID_ENV).unwrap_or_else(|_| slugid::slugid());

    match args.command {
        Command::Full(show) => show_phase(Phase::Full, &show, &fs, decision_task_id).await,
        Command::Target(show) => show_phase(Phase::Target, &show, &fs, decision_task_id).await,
        Command::TargetGraph(show) => {
            show_phase(Phase::TargetGraph, &show, &fs, decision_task_id).await
        }
        Command::Optimized(show) => {
            show_phase(Phase::Optimized, &show, &fs, decision_task_id).await
        }
        Command::Morphed(show) => show_phase(Phase::Morphed, &show, &fs, decision_task_id).await,
        Command::Decision(d) => {
            let opts = DecisionOptions {
                root: d.common.root,
                parameters: d.common.parameters,
                artifacts_dir: d.artifacts,
                decision_task_id,
                dry_run: d.dry_run,
            };
            let summary = taskgraph_decision(&opts, &fs).await?;
            info!(
                target_tasks = summary.target_tasks,
                submitted = summary.submitted,
                dry_run = summary.dry_run,
                "decision complete"
            );
            Ok(())
        }
    }
}

fn generator(common: &CommonArgs, fs: &dyn FileSystem, decision_task_id: String) -> Result<Generator> {
    let config = load_graph_config(&common.root)?;
    let params = load_parameters(fs, common.parameters.as_deref())?;
    let strategies = http_strategies(&http_client()?, &config)?;
    Ok(Generator::new(params, config, strategies, decision_task_id)?)
}

async fn show_phase(
    phase: Phase,
    show: &ShowArgs,
    fs: &dyn FileSystem,
    decision_task_id: String,
) -> Result<()> {
    let mut generator = generator(&show.common, fs, decision_task_id)?;
    let graph: Arc<TaskGraph> = match phase {
        Phase::Full => generator.full_task_graph()?,
        Phase::Target => generator.target_task_set()?,
        Phase::TargetGraph => generator.target_task_graph()?,
        Phase::Optimized => generator.optimized_task_graph().await?.0,
        Phase::Morphed => generator.morphed_task_graph().await?.0,
    };

    if show.labels {
        let mut labels: Vec<&str> = graph.iter().map(|t| t.label.as_str()).collect();
        labels.sort_unstable();
        for label in labels {
            println!("{label}");
        }
    } else {
        println!("{}", serde_json::to_string_pretty(graph.as_ref())?);
    }
    Ok(())
}
