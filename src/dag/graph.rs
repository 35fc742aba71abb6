// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::dag::traversal::Traversal;
use crate::errors::{Result, TaskgraphError};

/// A named, directed edge `from -> to`.
///
/// `from` depends on `to`; `name` is the relationship name the dependent uses
/// to refer to its dependency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub name: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            name: name.into(),
        }
    }
}

/// Immutable DAG of string node labels with named multi-edges.
///
/// At most one edge of a given name exists between an ordered pair of nodes;
/// differently-named edges between the same pair are allowed. Acyclicity is
/// not checked: the traversal methods may loop forever on cyclic input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    nodes: BTreeSet<String>,
    edges: BTreeSet<Edge>,
}

impl Graph {
    pub fn new(nodes: BTreeSet<String>, edges: BTreeSet<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// A graph with the given nodes and no edges.
    pub fn from_nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            edges: BTreeSet::new(),
        }
    }

    pub fn nodes(&self) -> &BTreeSet<String> {
        &self.nodes
    }

    pub fn edges(&self) -> &BTreeSet<Edge> {
        &self.edges
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Return the subgraph of `seed` plus everything reachable from it by
    /// following edges forward, along with every edge that justifies that
    /// reachability.
    ///
    /// Fails if `seed` names nodes that are not in this graph.
    pub fn transitive_closure(&self, seed: &BTreeSet<String>) -> Result<Graph> {
        let unknown: Vec<&String> = seed.difference(&self.nodes).collect();
        if !unknown.is_empty() {
            return Err(TaskgraphError::InvalidTaskGraph(format!(
                "unknown nodes in transitive closure: {unknown:?}"
            )));
        }

        let mut adjacency: BTreeMap<&str, Vec<&Edge>> = BTreeMap::new();
        for edge in &self.edges {
            adjacency.entry(edge.from.as_str()).or_default().push(edge);
        }

        let mut nodes = seed.clone();
        let mut edges = BTreeSet::new();
        let mut stack: Vec<String> = seed.iter().cloned().collect();

        while let Some(node) = stack.pop() {
            let Some(out) = adjacency.get(node.as_str()) else {
                continue;
            };
            for edge in out {
                edges.insert((*edge).clone());
                if nodes.insert(edge.to.clone()) {
                    stack.push(edge.to.clone());
                }
            }
        }

        Ok(Graph { nodes, edges })
    }

    /// Yield every node after all the nodes it links to (its dependencies).
    pub fn visit_postorder(&self) -> Traversal {
        Traversal::new(&self.nodes, self.links_dict())
    }

    /// Yield every node after all the nodes that link to it (its dependents).
    pub fn visit_preorder(&self) -> Traversal {
        Traversal::new(&self.nodes, self.reverse_links_dict())
    }

    /// `node -> {nodes it links to}`; every node has an entry.
    pub fn links_dict(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut links: BTreeMap<String, BTreeSet<String>> = self
            .nodes
            .iter()
            .map(|n| (n.clone(), BTreeSet::new()))
            .collect();
        for edge in &self.edges {
            links
                .entry(edge.from.clone())
                .or_default()
                .insert(edge.to.clone());
        }
        links
    }

    /// `node -> {edge name -> target}`; every node has an entry.
    pub fn named_links_dict(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        let mut links: BTreeMap<String, BTreeMap<String, String>> = self
            .nodes
            .iter()
            .map(|n| (n.clone(), BTreeMap::new()))
            .collect();
        for edge in &self.edges {
            links
                .entry(edge.from.clone())
                .or_default()
                .insert(edge.name.clone(), edge.to.clone());
        }
        links
    }

    /// `node -> {nodes linking to it}`; every node has an entry.
    pub fn reverse_links_dict(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut links: BTreeMap<String, BTreeSet<String>> = self
            .nodes
            .iter()
            .map(|n| (n.clone(), BTreeSet::new()))
            .collect();
        for edge in &self.edges {
            links
                .entry(edge.to.clone())
                .or_default()
                .insert(edge.from.clone());
        }
        links
    }
}
