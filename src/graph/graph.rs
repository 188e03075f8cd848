// ABOUTME: Graph assembly and validation, plus the public run entry points
// ABOUTME: A built Graph is an immutable, validated, acyclic set of tasks

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::Graph as DiGraph;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use super::error::{ExecutionError, GraphError};
use super::scheduler::Scheduler;
use crate::binder::{Binding, ExposeBinder, MapBinder, SharedBinder};
use crate::key::KeyId;
use crate::metrics;
use crate::task::{IntoTasks, Task};

/// Hard cap on the number of tasks in a single graph. The scheduler runs
/// every ready task concurrently with no parallelism bound, so a runaway
/// fan-out has to be caught at construction time.
pub const MAX_TASKS: usize = 1000;

/// A validated, acyclic set of tasks with a computed provider index and input
/// set. Graphs are immutable; run them with [`Graph::run`] or embed them in a
/// larger graph with [`Graph::as_task`].
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    tasks: Vec<Task>,
    providers: IndexMap<KeyId, usize>,
    consumers: IndexMap<KeyId, Vec<usize>>,
    inputs: Vec<KeyId>,
}

/// Collects task sets and validates them into a [`Graph`].
pub struct GraphBuilder {
    name: String,
    tasks: Vec<Task>,
}

impl GraphBuilder {
    /// Append a task set (a single task, a conditional, or a collection).
    pub fn task(mut self, set: impl IntoTasks) -> Self {
        self.tasks.extend(set.into_tasks());
        self
    }

    /// Validate the collected tasks and build the graph. Validation order:
    /// size cap, task-name uniqueness, provider uniqueness, acyclicity.
    pub fn build(self) -> Result<Graph, GraphError> {
        let tasks = self.tasks;

        if tasks.len() > MAX_TASKS {
            return Err(GraphError::TooManyTasks { count: tasks.len() });
        }

        let mut names = HashSet::with_capacity(tasks.len());
        for task in &tasks {
            if !names.insert(task.name().to_string()) {
                return Err(GraphError::DuplicateTaskNames {
                    name: task.name().to_string(),
                });
            }
        }

        let mut providers: IndexMap<KeyId, usize> = IndexMap::new();
        for (idx, task) in tasks.iter().enumerate() {
            for id in task.provides() {
                if let Some(&existing) = providers.get(id) {
                    return Err(GraphError::DuplicateProvidedKeys {
                        id: id.clone(),
                        first: tasks[existing].name().to_string(),
                        second: task.name().to_string(),
                    });
                }
                providers.insert(id.clone(), idx);
            }
        }

        let mut consumers: IndexMap<KeyId, Vec<usize>> = IndexMap::new();
        let mut inputs = BTreeSet::new();
        for (idx, task) in tasks.iter().enumerate() {
            for dep in task.depends() {
                let entry = consumers.entry(dep.clone()).or_default();
                if !entry.contains(&idx) {
                    entry.push(idx);
                }
                if !providers.contains_key(dep) {
                    inputs.insert(dep.clone());
                }
            }
        }

        // Tasks are nodes; each provided-key dependency contributes an edge
        // from the provider to the consumer. Ids with no provider are graph
        // inputs and contribute no edge.
        let mut dependency_graph = DiGraph::<String, ()>::new();
        let node_indices: Vec<_> = tasks
            .iter()
            .map(|task| dependency_graph.add_node(task.name().to_string()))
            .collect();
        for (idx, task) in tasks.iter().enumerate() {
            let mut seen = HashSet::new();
            for dep in task.depends() {
                if !seen.insert(dep) {
                    continue;
                }
                if let Some(&provider_idx) = providers.get(dep) {
                    dependency_graph.add_edge(node_indices[provider_idx], node_indices[idx], ());
                }
            }
        }
        toposort(&dependency_graph, None).map_err(|cycle| GraphError::Cycle {
            tasks: vec![dependency_graph[cycle.node_id()].clone()],
        })?;

        Ok(Graph {
            name: self.name,
            tasks,
            providers,
            consumers,
            inputs: inputs.into_iter().collect(),
        })
    }
}

impl Graph {
    pub fn builder(name: impl Into<String>) -> GraphBuilder {
        GraphBuilder {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Ids the caller must supply bindings for: every depended-on key not
    /// provided by any task. Sorted.
    pub fn inputs(&self) -> &[KeyId] {
        &self.inputs
    }

    pub(crate) fn providers(&self) -> &IndexMap<KeyId, usize> {
        &self.providers
    }

    pub(crate) fn consumers(&self) -> &IndexMap<KeyId, Vec<usize>> {
        &self.consumers
    }

    /// Run the graph to completion against a fresh binder. The returned binder
    /// holds every binding produced by the run, inputs included.
    pub async fn run(&self, inputs: Vec<Binding>) -> Result<SharedBinder, ExecutionError> {
        self.run_with_cancel(CancellationToken::new(), inputs).await
    }

    /// Run the graph, aborting (and draining in-flight tasks) when the given
    /// token is cancelled.
    pub async fn run_with_cancel(
        &self,
        cancel: CancellationToken,
        inputs: Vec<Binding>,
    ) -> Result<SharedBinder, ExecutionError> {
        let binder: SharedBinder = Arc::new(MapBinder::new());
        self.execute_on(cancel, binder.clone(), inputs).await?;
        Ok(binder)
    }

    /// Run the graph with a deadline. On timeout the run is cancelled and
    /// returns [`ExecutionError::Cancelled`] once in-flight tasks have
    /// drained.
    pub async fn run_with_timeout(
        &self,
        timeout: Duration,
        inputs: Vec<Binding>,
    ) -> Result<SharedBinder, ExecutionError> {
        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };
        let result = self.run_with_cancel(cancel, inputs).await;
        timer.abort();
        result
    }

    /// Drive the graph over the given binder. Records one latency sample per
    /// invocation, tagged with the graph name and outcome.
    pub(crate) async fn execute_on(
        &self,
        cancel: CancellationToken,
        binder: SharedBinder,
        inputs: Vec<Binding>,
    ) -> Result<(), ExecutionError> {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        info!(
            graph = %self.name,
            run_id = %run_id,
            tasks = self.tasks.len(),
            "starting graph run"
        );

        let result = Scheduler::new(self).run(cancel, &run_id, binder, inputs).await;

        let millis = started.elapsed().as_secs_f64() * 1000.0;
        metrics::record_execution(&self.name, result.is_ok(), millis);

        match &result {
            Ok(()) => {
                info!(graph = %self.name, run_id = %run_id, elapsed_ms = millis, "graph run completed")
            }
            Err(err) => {
                error!(graph = %self.name, run_id = %run_id, elapsed_ms = millis, error = %err, "graph run failed")
            }
        }
        result
    }

    /// Expose this graph as a single task within a larger graph. The task
    /// depends on this graph's inputs and provides the chosen exposed ids;
    /// exposed bindings surface in the parent binder as soon as the inner
    /// tasks producing them complete. Inner bindings outside the exposed set
    /// stay private to the inner run.
    pub fn as_task(&self, exposed: Vec<KeyId>) -> Result<Task, GraphError> {
        for id in &exposed {
            if !self.providers.contains_key(id) && !self.inputs.contains(id) {
                return Err(GraphError::ExposedKeyNotProvided {
                    id: id.clone(),
                    graph: self.name.clone(),
                });
            }
        }

        let graph = self.clone();
        let expose = exposed.clone();
        Ok(Task::new(
            self.name.clone(),
            self.inputs.clone(),
            exposed,
            move |ctx, outer| {
                let graph = graph.clone();
                let expose = expose.clone();
                async move {
                    let internal: SharedBinder = Arc::new(MapBinder::new());
                    let binder: SharedBinder =
                        Arc::new(ExposeBinder::new(internal, outer, expose));
                    graph
                        .execute_on(ctx.cancel.clone(), binder, Vec::new())
                        .await?;
                    // Exposed bindings were stored straight into the parent
                    // binder while the inner run progressed.
                    Ok(Vec::new())
                }
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;

    fn provider_task(name: &str, provides: &Key<i32>) -> Task {
        let key = provides.clone();
        Task::new(name, vec![], vec![provides.id()], move |_ctx, _b| {
            let key = key.clone();
            async move { Ok(vec![key.bind(0)]) }
        })
    }

    fn relay_task(name: &str, depends: &Key<i32>, provides: &Key<i32>) -> Task {
        Task::from_fn1(name, provides.clone(), depends.clone(), |v: i32| async move {
            Ok(v)
        })
    }

    #[test]
    fn test_inputs_are_unprovided_dependencies() {
        let input = Key::<i32>::new("input");
        let mid = Key::<i32>::new("mid");
        let out = Key::<i32>::new("out");

        let graph = Graph::builder("test_graph")
            .task(relay_task("first", &input, &mid))
            .task(relay_task("second", &mid, &out))
            .build()
            .unwrap();

        assert_eq!(graph.inputs(), &[input.id()]);
        assert_eq!(graph.tasks().len(), 2);
    }

    #[test]
    fn test_duplicate_task_names_rejected() {
        let key1 = Key::<i32>::new("key1");
        let key2 = Key::<i32>::new("key2");

        let err = Graph::builder("test_graph")
            .task(provider_task("task", &key1))
            .task(provider_task("task", &key2))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateTaskNames { ref name } if name == "task"));
    }

    #[test]
    fn test_duplicate_provided_keys_rejected() {
        let key1 = Key::<i32>::new("key1");

        let err = Graph::builder("test_graph")
            .task(provider_task("task1", &key1))
            .task(provider_task("task2", &key1))
            .build()
            .unwrap_err();
        assert!(
            matches!(err, GraphError::DuplicateProvidedKeys { ref id, .. } if *id == key1.id())
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let key1 = Key::<i32>::new("key1");
        let key2 = Key::<i32>::new("key2");

        let err = Graph::builder("test_graph")
            .task(relay_task("task1", &key1, &key2))
            .task(relay_task("task2", &key2, &key1))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let key1 = Key::<i32>::new("key1");

        let err = Graph::builder("test_graph")
            .task(relay_task("task1", &key1, &key1))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
    }

    #[test]
    fn test_too_many_tasks_rejected() {
        let mut builder = Graph::builder("test_graph");
        for i in 0..=MAX_TASKS {
            let key = Key::<i32>::new(format!("key{i}"));
            builder = builder.task(provider_task(&format!("task{i}"), &key));
        }
        let err = builder.build().unwrap_err();
        assert!(matches!(err, GraphError::TooManyTasks { count } if count == MAX_TASKS + 1));
    }

    #[test]
    fn test_as_task_rejects_unprovided_exposed_key() {
        let key1 = Key::<i32>::new("key1");
        let other = Key::<i32>::new("other");

        let graph = Graph::builder("inner")
            .task(provider_task("task", &key1))
            .build()
            .unwrap();

        let err = graph.as_task(vec![other.id()]).unwrap_err();
        assert!(
            matches!(err, GraphError::ExposedKeyNotProvided { ref id, .. } if *id == other.id())
        );
    }
}
