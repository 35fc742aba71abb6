use std::collections::BTreeMap;

use proptest::prelude::*;
use serde_json::json;
use taskgraph::task::{Task, TaskGraph};

use crate::graph::acyclic_graph;

proptest! {
    #[test]
    fn task_graph_survives_a_json_round_trip(graph in acyclic_graph(10)) {
        let links = graph.named_links_dict();
        let tasks: BTreeMap<String, Task> = graph
            .nodes()
            .iter()
            .map(|label| {
                let mut task = Task::new("build", label.clone(), json!({"payload": {"label": label}}));
                for (name, dep) in &links[label] {
                    task.dependencies.insert(name.clone(), dep.clone());
                }
                (label.clone(), task)
            })
            .collect();
        let original = TaskGraph::new(tasks, graph.clone()).unwrap();

        let restored = TaskGraph::from_json(original.to_json().unwrap()).unwrap();
        prop_assert_eq!(restored.graph(), &graph);
        prop_assert_eq!(restored, original);
    }
}
