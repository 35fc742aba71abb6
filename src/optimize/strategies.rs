// src/optimize/strategies.rs

//! Built-in optimization strategies.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde_json::Value;
use tracing::debug;

use crate::client::{ChangedFiles, IndexService};
use crate::errors::{Result, TaskgraphError};
use crate::optimize::strategy::{OptimizationStrategy, Replacement, SplitArgs, StrategyFuture};
use crate::parameters::Parameters;
use crate::task::Task;

/// Keep everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl OptimizationStrategy for Never {}

/// Remove unconditionally (subject to the dependent check).
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl OptimizationStrategy for Always {
    fn should_remove<'a>(
        &'a self,
        _task: &'a Task,
        _params: &'a Parameters,
        _arg: &'a Value,
    ) -> StrategyFuture<'a, bool> {
        Box::pin(async { Ok(true) })
    }
}

fn string_list(task: &Task, arg: &Value, what: &str) -> Result<Vec<String>> {
    let invalid = || TaskgraphError::InvalidOptimization {
        label: task.label.clone(),
        message: format!("expected a list of {what}, got {arg}"),
    };
    arg.as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

/// Replace with the first task found at one of the given index paths.
///
/// The argument is an ordered list of paths; earlier paths win.
#[derive(Debug, Clone)]
pub struct IndexSearch {
    index: Arc<dyn IndexService>,
}

impl IndexSearch {
    pub fn new(index: Arc<dyn IndexService>) -> Self {
        Self { index }
    }
}

impl OptimizationStrategy for IndexSearch {
    fn should_replace<'a>(
        &'a self,
        task: &'a Task,
        _params: &'a Parameters,
        arg: &'a Value,
    ) -> StrategyFuture<'a, Replacement> {
        Box::pin(async move {
            for path in string_list(task, arg, "index paths")? {
                if let Some(task_id) = self.index.find_task_id(&path).await? {
                    debug!(label = %task.label, index_path = %path, task_id = %task_id, "found indexed task");
                    return Ok(Replacement::TaskId(task_id));
                }
            }
            Ok(Replacement::Keep)
        })
    }
}

/// Remove unless a file changed by the head revision matches one of the
/// given glob patterns.
///
/// Changed files are fetched once per `(repository, revision)`.
#[derive(Debug)]
pub struct SkipUnlessChanged {
    changed: Arc<dyn ChangedFiles>,
    cache: Mutex<BTreeMap<(String, String), Arc<Vec<String>>>>,
}

impl SkipUnlessChanged {
    pub fn new(changed: Arc<dyn ChangedFiles>) -> Self {
        Self {
            changed,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    async fn files_changed(&self, repository: &str, revision: &str) -> Result<Arc<Vec<String>>> {
        let key = (repository.to_string(), revision.to_string());
        let cached = {
            let cache = self
                .cache
                .lock()
                .map_err(|_| TaskgraphError::Service("changed-files cache poisoned".into()))?;
            cache.get(&key).cloned()
        };
        if let Some(files) = cached {
            return Ok(files);
        }

        let files = Arc::new(self.changed.files_changed(repository, revision).await?);
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| TaskgraphError::Service("changed-files cache poisoned".into()))?;
        cache.insert(key, files.clone());
        Ok(files)
    }
}

fn compile_patterns(task: &Task, patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| TaskgraphError::InvalidOptimization {
                label: task.label.clone(),
                message: format!("bad file pattern '{pattern}': {e}"),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| TaskgraphError::InvalidOptimization {
        label: task.label.clone(),
        message: e.to_string(),
    })
}

impl OptimizationStrategy for SkipUnlessChanged {
    fn should_remove<'a>(
        &'a self,
        task: &'a Task,
        params: &'a Parameters,
        arg: &'a Value,
    ) -> StrategyFuture<'a, bool> {
        Box::pin(async move {
            let patterns = compile_patterns(task, &string_list(task, arg, "file patterns")?)?;

            if params.head_repository.is_empty() || params.head_rev.is_empty() {
                debug!(label = %task.label, "no head revision; not skipping");
                return Ok(false);
            }

            let files = self
                .files_changed(&params.head_repository, &params.head_rev)
                .await?;
            let changed = files.iter().any(|f| patterns.is_match(f));
            if !changed {
                debug!(label = %task.label, "no changed file matches; skipping");
            }
            Ok(!changed)
        })
    }
}

/// Logical OR over substrategies, stopping at the first affirmative answer.
pub struct Either {
    substrategies: Vec<Arc<dyn OptimizationStrategy>>,
    split: Option<SplitArgs>,
}

impl fmt::Debug for Either {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Either")
            .field("substrategies", &self.substrategies)
            .field("split", &self.split.is_some())
            .finish()
    }
}

impl Either {
    pub fn new(substrategies: Vec<Arc<dyn OptimizationStrategy>>, split: Option<SplitArgs>) -> Self {
        Self {
            substrategies,
            split,
        }
    }

    fn args(&self, task: &Task, arg: &Value) -> Result<Vec<Value>> {
        let args = match &self.split {
            None => vec![arg.clone(); self.substrategies.len()],
            Some(split) => split(task, arg)?,
        };
        if args.len() != self.substrategies.len() {
            return Err(TaskgraphError::InvalidOptimization {
                label: task.label.clone(),
                message: format!(
                    "composite of {} strategies got {} arguments",
                    self.substrategies.len(),
                    args.len()
                ),
            });
        }
        Ok(args)
    }
}

impl OptimizationStrategy for Either {
    fn should_remove<'a>(
        &'a self,
        task: &'a Task,
        params: &'a Parameters,
        arg: &'a Value,
    ) -> StrategyFuture<'a, bool> {
        Box::pin(async move {
            let args = self.args(task, arg)?;
            for (sub, sub_arg) in self.substrategies.iter().zip(&args) {
                if sub.should_remove(task, params, sub_arg).await? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    fn should_replace<'a>(
        &'a self,
        task: &'a Task,
        params: &'a Parameters,
        arg: &'a Value,
    ) -> StrategyFuture<'a, Replacement> {
        Box::pin(async move {
            let args = self.args(task, arg)?;
            for (sub, sub_arg) in self.substrategies.iter().zip(&args) {
                let answer = sub.should_replace(task, params, sub_arg).await?;
                if answer.is_affirmative() {
                    return Ok(answer);
                }
            }
            Ok(Replacement::Keep)
        })
    }
}

/// Another name for an existing strategy.
#[derive(Debug, Clone)]
pub struct Alias {
    inner: Arc<dyn OptimizationStrategy>,
}

impl Alias {
    pub fn new(inner: Arc<dyn OptimizationStrategy>) -> Self {
        Self { inner }
    }
}

impl OptimizationStrategy for Alias {
    fn should_remove<'a>(
        &'a self,
        task: &'a Task,
        params: &'a Parameters,
        arg: &'a Value,
    ) -> StrategyFuture<'a, bool> {
        self.inner.should_remove(task, params, arg)
    }

    fn should_replace<'a>(
        &'a self,
        task: &'a Task,
        params: &'a Parameters,
        arg: &'a Value,
    ) -> StrategyFuture<'a, Replacement> {
        self.inner.should_replace(task, params, arg)
    }
}
