// ABOUTME: Graphviz DOT rendering for graphs
// ABOUTME: Output is byte-stable: node and edge lines are each sorted lexicographically

use super::graph::Graph;

impl Graph {
    /// Render the graph as Graphviz DOT. Task nodes carry their task name;
    /// graph inputs and terminal outputs are rendered as diamond nodes hanging
    /// off their consumer or provider. Two calls on the same graph return
    /// byte-equal strings, so the output is safe to snapshot in tests.
    pub fn graphviz(&self, label_edges: bool) -> String {
        let tasks = self.tasks();
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        for task in tasks {
            nodes.push(format!("  {} [label=\"{}\"];", task.name(), task.name()));
        }

        for (id, &provider_idx) in self.providers() {
            let provider = tasks[provider_idx].name();
            match self.consumers().get(id) {
                Some(consumer_list) if !consumer_list.is_empty() => {
                    for &consumer_idx in consumer_list {
                        let consumer = tasks[consumer_idx].name();
                        if label_edges {
                            edges.push(format!("  {provider} -> {consumer} [label=\"{id}\"];"));
                        } else {
                            edges.push(format!("  {provider} -> {consumer};"));
                        }
                    }
                }
                _ => {
                    // A provided key nobody consumes is a terminal output.
                    nodes.push(format!(
                        "  {provider}_output_{id} [label=\"Output\", shape=diamond];"
                    ));
                    if label_edges {
                        edges.push(format!(
                            "  {provider} -> {provider}_output_{id} [label=\"{id}\"];"
                        ));
                    } else {
                        edges.push(format!("  {provider} -> {provider}_output_{id};"));
                    }
                }
            }
        }

        for id in self.inputs() {
            if let Some(consumer_list) = self.consumers().get(id) {
                for &consumer_idx in consumer_list {
                    let consumer = tasks[consumer_idx].name();
                    nodes.push(format!(
                        "  {consumer}_input_{id} [label=\"Input - {id}\", shape=diamond];"
                    ));
                    edges.push(format!("  {consumer}_input_{id} -> {consumer};"));
                }
            }
        }

        nodes.sort();
        edges.sort();

        let mut out = String::from("digraph G {\n");
        for node in &nodes {
            out.push_str(node);
            out.push('\n');
        }
        out.push('\n');
        for edge in &edges {
            out.push_str(edge);
            out.push('\n');
        }
        out.push_str("}\n");
        out
    }
}
