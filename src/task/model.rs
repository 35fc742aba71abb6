// src/task/model.rs

//! The task entity as produced by providers and rewritten by each phase.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, TaskgraphError};

/// Attribute key that always mirrors [`Task::kind`].
pub const KIND_ATTRIBUTE: &str = "kind";

/// A single optimization directive: the strategy name and its argument.
///
/// Serialized as a one-key map, e.g. `{"index-search": ["path.a", "path.b"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, Value>"
)]
pub struct Optimization {
    pub strategy: String,
    pub arg: Value,
}

impl Optimization {
    pub fn new(strategy: impl Into<String>, arg: Value) -> Self {
        Self {
            strategy: strategy.into(),
            arg,
        }
    }
}

impl TryFrom<BTreeMap<String, Value>> for Optimization {
    type Error = String;

    fn try_from(map: BTreeMap<String, Value>) -> std::result::Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!(
                "optimization must name exactly one strategy (got {:?})",
                map.keys().collect::<Vec<_>>()
            ));
        }
        let (strategy, arg) = map
            .into_iter()
            .next()
            .ok_or_else(|| "optimization must name exactly one strategy".to_string())?;
        Ok(Self { strategy, arg })
    }
}

impl From<Optimization> for BTreeMap<String, Value> {
    fn from(opt: Optimization) -> Self {
        BTreeMap::from([(opt.strategy, opt.arg)])
    }
}

/// A unit of work in the graph.
///
/// `task` is the payload interpreted only by the execution service. Labels
/// are unique within one generation; `task_id` stays unset until the
/// optimizer (or a morph) assigns the final identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub kind: String,
    pub label: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub task: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization: Option<Optimization>,
    /// Relationship name -> label (or, after optimization, identifier).
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub soft_dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_artifacts: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl Task {
    pub fn new(kind: impl Into<String>, label: impl Into<String>, task: Value) -> Self {
        let kind = kind.into();
        let mut attributes = BTreeMap::new();
        attributes.insert(KIND_ATTRIBUTE.to_string(), kind.clone());
        Self {
            kind,
            label: label.into(),
            attributes,
            task,
            optimization: None,
            dependencies: BTreeMap::new(),
            soft_dependencies: Vec::new(),
            release_artifacts: None,
            task_id: None,
        }
    }

    /// Check construction invariants: a non-empty label and a `kind`
    /// attribute that agrees with `kind` (inserted when missing).
    pub fn validate(&mut self) -> Result<()> {
        if self.label.is_empty() {
            return Err(TaskgraphError::InvalidTaskGraph(format!(
                "task of kind '{}' has an empty label",
                self.kind
            )));
        }
        match self.attributes.get(KIND_ATTRIBUTE) {
            None => {
                self.attributes
                    .insert(KIND_ATTRIBUTE.to_string(), self.kind.clone());
            }
            Some(kind) if *kind == self.kind => {}
            Some(kind) => {
                return Err(TaskgraphError::InvalidTaskGraph(format!(
                    "task '{}' has kind '{}' but attribute kind = '{}'",
                    self.label, self.kind, kind
                )));
            }
        }
        Ok(())
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The `routes` array of the payload, if any.
    pub fn routes(&self) -> Vec<String> {
        self.task
            .get("routes")
            .and_then(Value::as_array)
            .map(|routes| {
                routes
                    .iter()
                    .filter_map(|r| r.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
