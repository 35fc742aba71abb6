// src/morph/templates.rs

//! Template morph for template-driven runs.
//!
//! When `try_mode` is `try_task_config`, each template named in
//! `try_task_config.templates` is rendered (in name order) for every task
//! listed in `try_task_config.tasks`, or for every task when that list is
//! empty. The template sees the task and the template's input:
//!
//! | variable | value |
//! |---|---|
//! | `task` | the payload |
//! | `attributes` | the attributes |
//! | `kind`, `label`, `task_id` | as on the task |
//! | `input` | `try_task_config.templates[<name>]` |
//!
//! The rendered text is parsed as JSON. Its `task` and `attributes` keys,
//! when present, replace the task's own; blank output changes nothing.

use std::collections::{BTreeMap, BTreeSet};

use minijinja::{Environment, context};
use serde_json::Value;
use tracing::debug;

use crate::config::GraphConfig;
use crate::errors::{Result, TaskgraphError};
use crate::morph::Morph;
use crate::parameters::Parameters;
use crate::task::{LabelToTaskId, Task, TaskGraph};

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateMorph;

impl Morph for TemplateMorph {
    fn name(&self) -> &str {
        "apply-templates"
    }

    fn apply(
        &self,
        graph: TaskGraph,
        label_to_taskid: LabelToTaskId,
        params: &Parameters,
        config: &GraphConfig,
    ) -> Result<(TaskGraph, LabelToTaskId)> {
        let try_config = &params.try_task_config;
        if !params.is_try_task_config() || try_config.templates.is_empty() {
            return Ok((graph, label_to_taskid));
        }

        let mut sources = BTreeMap::new();
        for name in try_config.templates.keys() {
            let template = config.templates.get(name).ok_or_else(|| TaskgraphError::Template {
                name: name.clone(),
                message: "no such template in the graph configuration".to_string(),
            })?;
            sources.insert(name.as_str(), template.source.as_str());
        }

        let selected: BTreeSet<&str> = try_config.tasks.iter().map(String::as_str).collect();
        let env = Environment::new();
        let (mut tasks, dag) = graph.into_parts();

        for task in tasks.values_mut() {
            if !selected.is_empty() && !selected.contains(task.label.as_str()) {
                continue;
            }
            for (name, source) in &sources {
                let input = try_config.templates.get(*name).unwrap_or(&Value::Null);
                apply_template(&env, name, source, input, task)?;
            }
        }

        Ok((TaskGraph::new(tasks, dag)?, label_to_taskid))
    }
}

fn apply_template(
    env: &Environment<'_>,
    name: &str,
    source: &str,
    input: &Value,
    task: &mut Task,
) -> Result<()> {
    let template_error = |message: String| TaskgraphError::Template {
        name: name.to_string(),
        message: format!("{} (task '{}')", message, task.label),
    };

    let rendered = env
        .render_str(
            source,
            context! {
                task => &task.task,
                attributes => &task.attributes,
                kind => &task.kind,
                label => &task.label,
                task_id => &task.task_id,
                input => input,
            },
        )
        .map_err(|e| template_error(e.to_string()))?;
    if rendered.trim().is_empty() {
        return Ok(());
    }

    let mut result: Value =
        serde_json::from_str(&rendered).map_err(|e| template_error(format!("output is not JSON: {e}")))?;

    if let Some(payload) = result.get_mut("task") {
        task.task = payload.take();
    }
    if let Some(attributes) = result.get_mut("attributes") {
        let attributes: BTreeMap<String, String> = serde_json::from_value(attributes.take())
            .map_err(|e| template_error(format!("attributes must map strings to strings: {e}")))?;
        task.attributes = attributes;
        task.validate()?;
    }
    debug!(template = name, label = %task.label, "applied template");
    Ok(())
}
