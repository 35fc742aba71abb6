// src/client/mod.rs

//! External services the core talks to.
//!
//! The optimizer and the submitter only see the traits defined here, so
//! tests can swap in in-memory fakes while production uses the HTTP
//! implementations:
//!
//! - [`index`]: cache-index lookups (`index path -> task id`).
//! - [`vcs`]: files changed by a revision.
//! - [`queue`]: the execution service's create-task call.
//! - [`retry`]: shared bounded backoff.

pub mod index;
pub mod queue;
pub mod retry;
pub mod vcs;

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::errors::Result;

pub use index::HttpIndex;
pub use queue::HttpQueue;
pub use vcs::HttpChangedFiles;

/// Boxed future returned by service calls.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Key-value lookup from an index path to a previously created task.
pub trait IndexService: Send + Sync + Debug {
    /// `Ok(None)` when nothing is indexed at `index_path`.
    fn find_task_id<'a>(&'a self, index_path: &'a str) -> ServiceFuture<'a, Option<String>>;
}

/// Source of the files touched by a revision.
pub trait ChangedFiles: Send + Sync + Debug {
    fn files_changed<'a>(
        &'a self,
        repository: &'a str,
        revision: &'a str,
    ) -> ServiceFuture<'a, Vec<String>>;
}

/// The service that runs tasks.
pub trait ExecutionService: Send + Sync + Debug {
    /// Create `task_id` from `task_def`. Errors carry the remote message
    /// when the service supplied one.
    fn create_task<'a>(&'a self, task_id: &'a str, task_def: &'a Value) -> ServiceFuture<'a, ()>;
}

/// Pull a human-readable message out of an error response body.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status}: {body}"))
}

/// Join `root_url` and an API path.
pub(crate) fn api_url(root_url: &str, path: &str) -> String {
    format!("{}/{}", root_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
