// src/task/mod.rs

//! Task entity and the task graph pairing it with a [`Graph`](crate::dag::Graph).

pub mod model;
pub mod taskgraph;

pub use model::{KIND_ATTRIBUTE, Optimization, Task};
pub use taskgraph::TaskGraph;

/// Canonical task label type.
pub type Label = String;

/// Final identifier assigned to a task for submission.
pub type TaskId = String;

/// Map from labels to their final identifiers.
pub type LabelToTaskId = std::collections::BTreeMap<Label, TaskId>;
