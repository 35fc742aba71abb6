// src/client/index.rs

use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::retry::{AttemptError, with_retries};
use crate::client::{IndexService, ServiceFuture, api_url, error_message};
use crate::config::RetrySection;

/// Index lookups over HTTP.
///
/// A 404 is a miss. Transport errors and 5xx responses are retried and,
/// once retries are exhausted, also reported as a miss so that the task is
/// simply kept.
#[derive(Debug, Clone)]
pub struct HttpIndex {
    client: reqwest::Client,
    root_url: String,
    retry: RetrySection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexedTask {
    task_id: String,
}

impl HttpIndex {
    pub fn new(client: reqwest::Client, root_url: &str, retry: RetrySection) -> Self {
        Self {
            client,
            root_url: root_url.to_string(),
            retry,
        }
    }

    async fn lookup(&self, index_path: &str) -> std::result::Result<Option<String>, AttemptError> {
        let url = api_url(&self.root_url, &format!("api/index/v1/task/{index_path}"));
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(AttemptError::from_transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AttemptError::from_status(status, error_message(status, &body)));
        }

        let indexed: IndexedTask = resp
            .json()
            .await
            .map_err(|e| AttemptError::Permanent(format!("invalid index response: {e}")))?;
        Ok(Some(indexed.task_id))
    }
}

impl IndexService for HttpIndex {
    fn find_task_id<'a>(&'a self, index_path: &'a str) -> ServiceFuture<'a, Option<String>> {
        Box::pin(async move {
            match with_retries(&self.retry, index_path, || self.lookup(index_path)).await {
                Ok(found) => {
                    debug!(index_path, found = ?found, "index lookup");
                    Ok(found)
                }
                Err(AttemptError::Transient(message)) => {
                    warn!(index_path, error = %message, "index lookup kept failing; treating as a miss");
                    Ok(None)
                }
                Err(AttemptError::Permanent(message)) => Err(crate::errors::TaskgraphError::Service(
                    format!("index lookup of '{index_path}' failed: {message}"),
                )),
            }
        })
    }
}
