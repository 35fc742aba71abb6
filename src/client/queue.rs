// src/client/queue.rs

use serde_json::Value;
use tracing::debug;

use crate::client::retry::{AttemptError, with_retries};
use crate::client::{ExecutionService, ServiceFuture, api_url, error_message};
use crate::config::RetrySection;
use crate::errors::TaskgraphError;

/// The execution service's queue API over HTTP.
///
/// Creating a task under a fixed identifier is idempotent for an identical
/// definition, so transient failures are retried.
#[derive(Debug, Clone)]
pub struct HttpQueue {
    client: reqwest::Client,
    root_url: String,
    retry: RetrySection,
}

impl HttpQueue {
    pub fn new(client: reqwest::Client, root_url: &str, retry: RetrySection) -> Self {
        Self {
            client,
            root_url: root_url.to_string(),
            retry,
        }
    }

    async fn put_task(&self, task_id: &str, task_def: &Value) -> std::result::Result<(), AttemptError> {
        let url = api_url(&self.root_url, &format!("api/queue/v1/task/{task_id}"));
        let resp = self
            .client
            .put(&url)
            .json(task_def)
            .send()
            .await
            .map_err(AttemptError::from_transport)?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AttemptError::from_status(status, error_message(status, &body)))
    }
}

impl ExecutionService for HttpQueue {
    fn create_task<'a>(&'a self, task_id: &'a str, task_def: &'a Value) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            with_retries(&self.retry, task_id, || self.put_task(task_id, task_def))
                .await
                .map_err(|e| TaskgraphError::Service(e.message().to_string()))?;
            debug!(task_id, "created task");
            Ok(())
        })
    }
}
