// src/provider/cached.rs

//! Cached tasks: tasks whose output is fully determined by a digest of their
//! inputs, so that a previous run's result can be found in the index and
//! reused.

use blake3::Hasher;
use chrono::DateTime;
use serde_json::{Value, json};

use crate::errors::{Result, TaskgraphError};
use crate::parameters::Parameters;
use crate::task::{Optimization, Task};

/// Highest trust level; cache lookups start here.
const MAX_LEVEL: u8 = 3;

/// Digest of the given inputs, one per line.
pub fn digest_data(data: &[String]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(data.join("\n").as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Index path holding the task cached under `digest` at `level`.
pub fn cached_index_path(
    trust_domain: &str,
    level: u8,
    cache_type: &str,
    cache_name: &str,
    digest: &str,
) -> String {
    format!("{trust_domain}.cache.level-{level}.{cache_type}.{cache_name}.hash.{digest}")
}

/// Turn `task` into a cached task.
///
/// - Optimization becomes `index-search` over the digest path at every level
///   from 3 down to the run's level, so higher-trust results are preferred.
/// - The task registers the digest path at the run's level, plus `latest`
///   and `pushdate` routes for humans.
/// - `cached_task_*` attributes record what was cached.
pub fn add_optimization(
    task: &mut Task,
    trust_domain: &str,
    cache_type: &str,
    cache_name: &str,
    digest: &str,
    params: &Parameters,
) -> Result<()> {
    let level = params.level_number()?;

    let index_paths: Vec<Value> = (level..=MAX_LEVEL)
        .rev()
        .map(|l| Value::String(cached_index_path(trust_domain, l, cache_type, cache_name, digest)))
        .collect();
    task.optimization = Some(Optimization::new("index-search", Value::Array(index_paths)));

    let build_date = DateTime::from_timestamp(params.build_date, 0).ok_or_else(|| {
        TaskgraphError::ConfigError(format!("invalid build_date {}", params.build_date))
    })?;
    let prefix = format!("{trust_domain}.cache.level-{level}.{cache_type}.{cache_name}");
    let routes = [
        format!(
            "index.{}",
            cached_index_path(trust_domain, level, cache_type, cache_name, digest)
        ),
        format!("index.{prefix}.latest"),
        format!(
            "index.{prefix}.pushdate.{}",
            build_date.format("%Y.%m.%d.%Y%m%d%H%M%S")
        ),
    ];

    let payload = task.task.as_object_mut().ok_or_else(|| TaskgraphError::TaskReference {
        label: task.label.clone(),
        message: "cached task payload must be an object".to_string(),
    })?;
    let existing = payload.entry("routes").or_insert_with(|| json!([]));
    let list = existing.as_array_mut().ok_or_else(|| TaskgraphError::TaskReference {
        label: task.label.clone(),
        message: "`routes` must be an array".to_string(),
    })?;
    list.extend(routes.into_iter().map(Value::String));

    task.attributes
        .insert("cached_task_type".to_string(), cache_type.to_string());
    task.attributes
        .insert("cached_task_name".to_string(), cache_name.to_string());
    task.attributes
        .insert("cached_task_digest".to_string(), digest.to_string());
    Ok(())
}
