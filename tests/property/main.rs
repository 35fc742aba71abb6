mod graph;
mod task_graph;
