// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::dag::Edge;

#[derive(Error, Debug)]
pub enum TaskgraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task label '{label}' (produced by kinds {kinds:?})")]
    DuplicateLabel { label: String, kinds: Vec<String> },

    #[error("Invalid task graph: {0}")]
    InvalidTaskGraph(String),

    #[error("Cycle detected in kind dependencies: {0}")]
    KindCycle(String),

    #[error("Unknown optimization strategy: {0}")]
    UnknownStrategy(String),

    #[error("Task '{label}' has an invalid optimization argument: {message}")]
    InvalidOptimization { label: String, message: String },

    #[error("Unknown target tasks method or filter: {0}")]
    UnknownTargetMethod(String),

    #[error("Provider for kind '{kind}' failed: {message}")]
    Provider { kind: String, message: String },

    #[error("Surviving tasks depend on removed tasks: {}", format_edges(.edges))]
    Integrity { edges: Vec<Edge> },

    #[error("Task '{label}': {message}")]
    TaskReference { label: String, message: String },

    #[error("Template '{name}' failed: {message}")]
    Template { name: String, message: String },

    #[error("Submitting task '{label}' ({task_id}) failed: {message}")]
    Submission {
        label: String,
        task_id: String,
        message: String,
    },

    #[error("External service error: {0}")]
    Service(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn format_edges(edges: &[Edge]) -> String {
    edges
        .iter()
        .map(|e| format!("{} -[{}]-> {}", e.from, e.name, e.to))
        .collect::<Vec<_>>()
        .join(", ")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskgraphError>;
