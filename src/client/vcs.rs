// src/client/vcs.rs

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::debug;

use crate::client::retry::{AttemptError, with_retries};
use crate::client::{ChangedFiles, ServiceFuture, api_url, error_message};
use crate::config::RetrySection;
use crate::errors::TaskgraphError;

/// Changed files from the repository's `json-automationrelevance` endpoint,
/// which lists every changeset of the push together with its files.
#[derive(Debug, Clone)]
pub struct HttpChangedFiles {
    client: reqwest::Client,
    retry: RetrySection,
}

#[derive(Deserialize)]
struct Relevance {
    changesets: Vec<Changeset>,
}

#[derive(Deserialize)]
struct Changeset {
    #[serde(default)]
    files: Vec<String>,
}

impl HttpChangedFiles {
    pub fn new(client: reqwest::Client, retry: RetrySection) -> Self {
        Self { client, retry }
    }

    async fn fetch(&self, url: &str) -> std::result::Result<Vec<String>, AttemptError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AttemptError::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AttemptError::from_status(status, error_message(status, &body)));
        }

        let relevance: Relevance = resp
            .json()
            .await
            .map_err(|e| AttemptError::Permanent(format!("invalid automationrelevance response: {e}")))?;

        let files: BTreeSet<String> = relevance
            .changesets
            .into_iter()
            .flat_map(|c| c.files)
            .collect();
        Ok(files.into_iter().collect())
    }
}

impl ChangedFiles for HttpChangedFiles {
    fn files_changed<'a>(
        &'a self,
        repository: &'a str,
        revision: &'a str,
    ) -> ServiceFuture<'a, Vec<String>> {
        Box::pin(async move {
            let url = api_url(repository, &format!("json-automationrelevance/{revision}"));
            let files = with_retries(&self.retry, &url, || self.fetch(&url))
                .await
                .map_err(|e| {
                    TaskgraphError::Service(format!(
                        "querying files changed by {revision} in {repository}: {}",
                        e.message()
                    ))
                })?;
            debug!(repository, revision, count = files.len(), "fetched changed files");
            Ok(files)
        })
    }
}
