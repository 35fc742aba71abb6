// src/payload/references.rs

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::errors::{Result, TaskgraphError};
use crate::payload::rewrite;

static TASK_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("static regex"));
static ARTIFACT_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^/]+)/([^>]+)>").expect("static regex"));

/// Everything a task's references may resolve against.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceContext<'a> {
    pub label: &'a str,
    pub task_id: &'a str,
    pub decision_task_id: &'a str,
    /// Dependency name -> identifier.
    pub dependencies: &'a BTreeMap<String, String>,
    pub root_url: &'a str,
}

/// Resolve `task-reference` and `artifact-reference` placeholders in `task`.
///
/// In a `task-reference` string, `<name>` becomes the identifier of the
/// dependency called `name`; `<self>` and `<decision>` name the task itself
/// and the decision task, and `<<>` escapes a literal `<`.
///
/// In an `artifact-reference` string, `<name/public/path>` becomes the URL
/// of that public artifact of the dependency.
pub fn resolve_task_references(task: &Value, ctx: &ReferenceContext<'_>) -> Result<Value> {
    rewrite(task, &mut |key, value| match (key, value) {
        ("task-reference", Value::String(s)) => task_reference(s, ctx).map(Some),
        ("artifact-reference", Value::String(s)) => artifact_reference(s, ctx).map(Some),
        _ => Ok(None),
    })
}

fn task_reference(template: &str, ctx: &ReferenceContext<'_>) -> Result<Value> {
    let mut failure = None;
    let out = TASK_REFERENCE.replace_all(template, |caps: &Captures<'_>| {
        let key = &caps[1];
        match key {
            "self" => ctx.task_id.to_string(),
            "decision" => ctx.decision_task_id.to_string(),
            "<" => "<".to_string(),
            name => match ctx.dependencies.get(name) {
                Some(id) => id.clone(),
                None => {
                    failure.get_or_insert_with(|| format!("has no dependency named '{name}'"));
                    String::new()
                }
            },
        }
    });
    match failure {
        Some(message) => Err(reference_error(ctx, message)),
        None => Ok(Value::String(out.into_owned())),
    }
}

fn artifact_reference(template: &str, ctx: &ReferenceContext<'_>) -> Result<Value> {
    let mut failure = None;
    let out = ARTIFACT_REFERENCE.replace_all(template, |caps: &Captures<'_>| {
        let (dependency, artifact) = (&caps[1], &caps[2]);
        let task_id = match dependency {
            "self" => {
                failure.get_or_insert_with(|| "can't reference artifacts of self".to_string());
                return String::new();
            }
            "decision" => ctx.decision_task_id,
            name => match ctx.dependencies.get(name) {
                Some(id) => id.as_str(),
                None => {
                    failure.get_or_insert_with(|| format!("has no dependency named '{name}'"));
                    return String::new();
                }
            },
        };
        if !artifact.starts_with("public/") {
            failure.get_or_insert_with(|| {
                format!("artifact-reference only supports public artifacts, not '{artifact}'")
            });
            return String::new();
        }
        artifact_url(ctx.root_url, task_id, artifact)
    });
    match failure {
        Some(message) => Err(reference_error(ctx, message)),
        None => Ok(Value::String(out.into_owned())),
    }
}

/// Public URL of `artifact` produced by `task_id`.
pub fn artifact_url(root_url: &str, task_id: &str, artifact: &str) -> String {
    format!(
        "{}/api/queue/v1/task/{}/artifacts/{}",
        root_url.trim_end_matches('/'),
        task_id,
        artifact
    )
}

fn reference_error(ctx: &ReferenceContext<'_>, message: String) -> TaskgraphError {
    TaskgraphError::TaskReference {
        label: ctx.label.to_string(),
        message,
    }
}
