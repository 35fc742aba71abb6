use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use taskgraph::dag::{Edge, Graph};

// Strategy to generate an acyclic graph.
// Node i may only link to nodes 0..i, so there are no cycles.
pub fn acyclic_graph(max_nodes: usize) -> impl Strategy<Value = Graph> {
    (1..=max_nodes).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            move |raw_links| {
                let nodes: BTreeSet<String> = (0..n).map(node).collect();
                let mut edges = BTreeSet::new();
                for (i, targets) in raw_links.into_iter().enumerate() {
                    if i == 0 {
                        continue;
                    }
                    for (k, t) in targets.into_iter().enumerate() {
                        edges.insert(Edge::new(node(i), node(t % i), format!("dep{k}")));
                    }
                }
                Graph::new(nodes, edges)
            },
        )
    })
}

pub fn node(i: usize) -> String {
    format!("task-{i}")
}

fn reachable(links: &BTreeMap<String, BTreeSet<String>>, seed: &BTreeSet<String>) -> BTreeSet<String> {
    let mut seen = seed.clone();
    let mut stack: Vec<String> = seed.iter().cloned().collect();
    while let Some(n) = stack.pop() {
        for next in &links[&n] {
            if seen.insert(next.clone()) {
                stack.push(next.clone());
            }
        }
    }
    seen
}

proptest! {
    #[test]
    fn closure_is_exactly_the_reachable_set(
        graph in acyclic_graph(12),
        picks in proptest::collection::vec(any::<usize>(), 0..4),
    ) {
        let n = graph.nodes().len();
        let seed: BTreeSet<String> = picks.into_iter().map(|p| node(p % n)).collect();

        let closure = graph.transitive_closure(&seed).unwrap();
        prop_assert!(closure.nodes().is_superset(&seed));
        prop_assert_eq!(closure.nodes(), &reachable(&graph.links_dict(), &seed));

        // Every closure edge is a graph edge between closure nodes, and no
        // edge leaving a closure node is missing.
        for edge in graph.edges() {
            let inside = closure.nodes().contains(&edge.from);
            prop_assert_eq!(inside, closure.edges().contains(edge));
        }
    }

    #[test]
    fn postorder_visits_dependencies_first(graph in acyclic_graph(12)) {
        let order: Vec<String> = graph.visit_postorder().collect();
        prop_assert_eq!(order.len(), graph.nodes().len());

        let position: BTreeMap<&str, usize> =
            order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        prop_assert_eq!(position.len(), order.len());
        for edge in graph.edges() {
            prop_assert!(position[edge.to.as_str()] < position[edge.from.as_str()]);
        }
    }

    #[test]
    fn preorder_visits_dependents_first(graph in acyclic_graph(12)) {
        let order: Vec<String> = graph.visit_preorder().collect();
        prop_assert_eq!(order.len(), graph.nodes().len());

        let position: BTreeMap<&str, usize> =
            order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        for edge in graph.edges() {
            prop_assert!(position[edge.from.as_str()] < position[edge.to.as_str()]);
        }
    }
}
