use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use taskgraph::client::{ChangedFiles, ExecutionService, IndexService, ServiceFuture};
use taskgraph::errors::TaskgraphError;

/// An index backed by a map. Records every lookup.
#[derive(Debug, Default, Clone)]
pub struct FakeIndex {
    entries: BTreeMap<String, String>,
    lookups: Arc<Mutex<Vec<String>>>,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, path: &str, task_id: &str) -> Self {
        self.entries.insert(path.to_string(), task_id.to_string());
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

impl IndexService for FakeIndex {
    fn find_task_id<'a>(&'a self, index_path: &'a str) -> ServiceFuture<'a, Option<String>> {
        Box::pin(async move {
            self.lookups.lock().unwrap().push(index_path.to_string());
            Ok(self.entries.get(index_path).cloned())
        })
    }
}

/// Changed files for any repository and revision.
#[derive(Debug, Default, Clone)]
pub struct FakeChangedFiles {
    files: Vec<String>,
}

impl FakeChangedFiles {
    pub fn new(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ChangedFiles for FakeChangedFiles {
    fn files_changed<'a>(&'a self, _: &'a str, _: &'a str) -> ServiceFuture<'a, Vec<String>> {
        Box::pin(async move { Ok(self.files.clone()) })
    }
}

/// An execution service that:
/// - records which tasks were created, in order
/// - optionally rejects one task id with a remote error message.
#[derive(Debug, Default, Clone)]
pub struct RecordingQueue {
    created: Arc<Mutex<Vec<(String, Value)>>>,
    reject: Option<(String, String)>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(task_id: &str, message: &str) -> Self {
        Self {
            reject: Some((task_id.to_string(), message.to_string())),
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<(String, Value)> {
        self.created.lock().unwrap().clone()
    }

    pub fn created_ids(&self) -> Vec<String> {
        self.created().into_iter().map(|(id, _)| id).collect()
    }
}

impl ExecutionService for RecordingQueue {
    fn create_task<'a>(&'a self, task_id: &'a str, task_def: &'a Value) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            if let Some((rejected, message)) = &self.reject {
                if rejected == task_id {
                    return Err(TaskgraphError::Service(message.clone()));
                }
            }
            self.created
                .lock()
                .unwrap()
                .push((task_id.to_string(), task_def.clone()));
            Ok(())
        })
    }
}
