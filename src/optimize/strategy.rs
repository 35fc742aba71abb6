// src/optimize/strategy.rs

//! Strategy trait and the name -> strategy registry.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::client::{ChangedFiles, IndexService};
use crate::errors::{Result, TaskgraphError};
use crate::optimize::strategies::{Alias, Always, Either, IndexSearch, Never, SkipUnlessChanged};
use crate::parameters::Parameters;
use crate::task::Task;

/// Boxed future returned by strategy calls.
pub type StrategyFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Outcome of [`OptimizationStrategy::should_replace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Keep the task.
    Keep,
    /// The task is not needed after all; treated like removal.
    Remove,
    /// An equivalent task already exists under this identifier.
    TaskId(String),
}

impl Replacement {
    /// Whether a composite should stop at this answer.
    pub fn is_affirmative(&self) -> bool {
        !matches!(self, Replacement::Keep)
    }
}

/// A way of deciding that a task can be skipped or reused.
///
/// Strategies may call external services but never touch the graph. Both
/// methods default to "keep the task".
pub trait OptimizationStrategy: Send + Sync + Debug {
    fn should_remove<'a>(
        &'a self,
        _task: &'a Task,
        _params: &'a Parameters,
        _arg: &'a Value,
    ) -> StrategyFuture<'a, bool> {
        Box::pin(async { Ok(false) })
    }

    fn should_replace<'a>(
        &'a self,
        _task: &'a Task,
        _params: &'a Parameters,
        _arg: &'a Value,
    ) -> StrategyFuture<'a, Replacement> {
        Box::pin(async { Ok(Replacement::Keep) })
    }
}

/// Derives the per-substrategy arguments of a composite from its own.
pub type SplitArgs = Arc<dyn Fn(&Task, &Value) -> Result<Vec<Value>> + Send + Sync>;

/// Strategies by name.
///
/// Composites are resolved when they are registered, so a typo in a
/// substrategy name fails at start-up rather than mid-optimization.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn OptimizationStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in strategies, wired to the given services.
    ///
    /// | name | behaviour |
    /// |---|---|
    /// | `never` | keep |
    /// | `always` | remove |
    /// | `index-search` | replace with the first indexed task |
    /// | `skip-unless-changed` | remove unless a changed file matches |
    /// | `skip-unless-changed-or-cached` | either of the two above, argument split by key |
    pub fn with_defaults(
        index: Arc<dyn IndexService>,
        changed: Arc<dyn ChangedFiles>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        registry.register("never", Arc::new(Never));
        registry.register("always", Arc::new(Always));
        registry.register("index-search", Arc::new(IndexSearch::new(index)));
        registry.register("skip-unless-changed", Arc::new(SkipUnlessChanged::new(changed)));
        registry.either(
            "skip-unless-changed-or-cached",
            &["skip-unless-changed", "index-search"],
            Some(split_by_key(&["skip-unless-changed", "index-search"])),
        )?;
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, strategy: Arc<dyn OptimizationStrategy>) {
        self.strategies.insert(name.into(), strategy);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn OptimizationStrategy>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| TaskgraphError::UnknownStrategy(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Register `name` as another name for `target`.
    pub fn alias(&mut self, name: impl Into<String>, target: &str) -> Result<()> {
        let inner = self.get(target)?;
        self.register(name, Arc::new(Alias::new(inner)));
        Ok(())
    }

    /// Register `name` as the logical OR of `substrategies`, in order.
    ///
    /// Without `split`, every substrategy receives the composite's argument.
    pub fn either(
        &mut self,
        name: impl Into<String>,
        substrategies: &[&str],
        split: Option<SplitArgs>,
    ) -> Result<()> {
        let subs = substrategies
            .iter()
            .map(|s| self.get(s))
            .collect::<Result<Vec<_>>>()?;
        self.register(name, Arc::new(Either::new(subs, split)));
        Ok(())
    }
}

/// Split an object argument into one value per key, in `keys` order.
pub fn split_by_key(keys: &[&str]) -> SplitArgs {
    let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    Arc::new(move |task: &Task, arg: &Value| -> Result<Vec<Value>> {
        keys.iter()
            .map(|key| {
                arg.get(key).cloned().ok_or_else(|| TaskgraphError::InvalidOptimization {
                    label: task.label.clone(),
                    message: format!("missing key '{key}'"),
                })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct NoIndex;
    impl IndexService for NoIndex {
        fn find_task_id<'a>(&'a self, _: &'a str) -> crate::client::ServiceFuture<'a, Option<String>> {
            Box::pin(async { Ok(None) })
        }
    }

    #[derive(Debug)]
    struct NoChanges;
    impl ChangedFiles for NoChanges {
        fn files_changed<'a>(
            &'a self,
            _: &'a str,
            _: &'a str,
        ) -> crate::client::ServiceFuture<'a, Vec<String>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    #[test]
    fn defaults_are_registered() {
        let reg = StrategyRegistry::with_defaults(Arc::new(NoIndex), Arc::new(NoChanges)).unwrap();
        for name in [
            "never",
            "always",
            "index-search",
            "skip-unless-changed",
            "skip-unless-changed-or-cached",
        ] {
            assert!(reg.contains(name), "{name} missing");
        }
    }

    #[test]
    fn composites_fail_fast_on_unknown_names() {
        let mut reg = StrategyRegistry::new();
        reg.register("never", Arc::new(Never));
        assert!(matches!(
            reg.alias("keep", "nevr"),
            Err(TaskgraphError::UnknownStrategy(name)) if name == "nevr"
        ));
        assert!(reg.either("combo", &["never", "bogus"], None).is_err());
        assert!(reg.alias("keep", "never").is_ok());
    }

    #[test]
    fn split_by_key_requires_every_key() {
        let split = split_by_key(&["a", "b"]);
        let task = Task::new("k", "t", json!({}));
        assert_eq!(
            split(&task, &json!({"a": 1, "b": [2]})).unwrap(),
            vec![json!(1), json!([2])]
        );
        assert!(split(&task, &json!({"a": 1})).is_err());
    }
}
