// src/dag/traversal.rs

//! Stateful, single-pass node traversals over a [`Graph`](super::Graph).

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Iterator yielding each node only once all of its `links` have been
/// yielded.
///
/// The work queue starts with every node in sorted order. A popped node whose
/// links have all been seen is emitted; otherwise its unseen links are queued
/// followed by the node itself. On acyclic input every node is emitted
/// exactly once. On cyclic input the iterator never terminates.
#[derive(Debug)]
pub struct Traversal {
    queue: VecDeque<String>,
    links: BTreeMap<String, BTreeSet<String>>,
    seen: HashSet<String>,
}

impl Traversal {
    pub(crate) fn new(nodes: &BTreeSet<String>, links: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self {
            queue: nodes.iter().cloned().collect(),
            links,
            seen: HashSet::new(),
        }
    }
}

impl Iterator for Traversal {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some(node) = self.queue.pop_front() {
            if self.seen.contains(&node) {
                continue;
            }

            let unseen: Vec<String> = self
                .links
                .get(&node)
                .map(|links| {
                    links
                        .iter()
                        .filter(|n| !self.seen.contains(*n))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();

            if unseen.is_empty() {
                self.seen.insert(node.clone());
                return Some(node);
            }

            self.queue.extend(unseen);
            self.queue.push_back(node);
        }
        None
    }
}
