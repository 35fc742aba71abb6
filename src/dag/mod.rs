// src/dag/mod.rs

//! Generic DAG primitive.
//!
//! - [`graph`] holds the immutable graph of string labels and named edges,
//!   plus transitive closure and adjacency views.
//! - [`traversal`] provides the dependency-respecting node orderings used by
//!   the optimizer and the submitter.
//!
//! Nothing here knows about tasks.

pub mod graph;
pub mod traversal;

pub use graph::{Edge, Graph};
pub use traversal::Traversal;
