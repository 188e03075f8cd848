// ABOUTME: The parallel dataflow scheduler driving a graph run to completion
// ABOUTME: Per-key signalling fires tasks the moment their last dependency is bound

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::error::ExecutionError;
use super::graph::Graph;
use crate::binder::{Binding, SharedBinder};
use crate::key::KeyId;
use crate::task::{Task, TaskContext};

struct TaskState {
    outstanding: usize,
    satisfied: HashSet<KeyId>,
    launched: bool,
}

/// Drives one run of a graph: seeds the binder, launches tasks as their
/// dependencies bind, and surfaces the first fatal error after draining
/// whatever is still in flight. Every ready task runs concurrently; there is
/// no parallelism cap.
pub(crate) struct Scheduler<'a> {
    graph: &'a Graph,
}

impl<'a> Scheduler<'a> {
    pub(crate) fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    pub(crate) async fn run(
        &self,
        cancel: CancellationToken,
        run_id: &str,
        binder: SharedBinder,
        inputs: Vec<Binding>,
    ) -> Result<(), ExecutionError> {
        // Watch before seeding so no binding can slip between the initial
        // satisfaction scan and the event stream.
        let (key_tx, mut key_rx) = mpsc::unbounded_channel::<KeyId>();
        binder.watch(key_tx);

        if !inputs.is_empty() {
            binder.store(inputs)?;
        }

        let missing: Vec<KeyId> = self
            .graph
            .inputs()
            .iter()
            .filter(|id| !binder.has(std::slice::from_ref(*id)))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ExecutionError::MissingInputs { missing });
        }

        let tasks = self.graph.tasks();
        let total = tasks.len();
        if total == 0 {
            return Ok(());
        }

        let child = cancel.child_token();
        let base_ctx = TaskContext::new(
            self.graph.name().to_string(),
            run_id.to_string(),
            child.clone(),
        );
        let (done_tx, mut done_rx) =
            mpsc::unbounded_channel::<(usize, anyhow::Result<Vec<Binding>>)>();

        let mut states: Vec<TaskState> = tasks
            .iter()
            .map(|task| {
                let deps: HashSet<&KeyId> = task.depends().iter().collect();
                TaskState {
                    outstanding: deps.len(),
                    satisfied: HashSet::new(),
                    launched: false,
                }
            })
            .collect();

        let mut in_flight = 0usize;
        let mut completed = 0usize;
        let mut first_err: Option<ExecutionError> = None;

        let launch = |idx: usize, states: &mut [TaskState], in_flight: &mut usize| {
            states[idx].launched = true;
            *in_flight += 1;
            let task = tasks[idx].clone();
            let ctx = base_ctx.for_task(task.name());
            let binder = binder.clone();
            let done_tx = done_tx.clone();
            debug!(task = %task.name(), "launching task");
            tokio::spawn(async move {
                let result = task.execute(ctx, binder).await;
                // The receiver only goes away once the run is over, at which
                // point stragglers are intentionally dropped.
                let _ = done_tx.send((idx, result));
            });
        };

        // Initial scan: dependencies bound before the run started (inputs, or
        // bindings visible through a layered binder) count as satisfied.
        for idx in 0..total {
            for dep in tasks[idx].depends().to_vec() {
                if binder.has(std::slice::from_ref(&dep)) && states[idx].satisfied.insert(dep) {
                    states[idx].outstanding -= 1;
                }
            }
            if states[idx].outstanding == 0 {
                launch(idx, &mut states, &mut in_flight);
            }
        }

        loop {
            match &first_err {
                Some(_) if in_flight == 0 => break,
                None if completed == total => break,
                _ => {}
            }

            tokio::select! {
                _ = cancel.cancelled(), if first_err.is_none() => {
                    warn!(graph = %self.graph.name(), "run cancelled by caller, draining in-flight tasks");
                    first_err = Some(ExecutionError::Cancelled);
                    child.cancel();
                }
                Some(id) = key_rx.recv(), if first_err.is_none() => {
                    let mut ready = Vec::new();
                    if let Some(consumer_list) = self.graph.consumers().get(&id) {
                        for &consumer in consumer_list {
                            let state = &mut states[consumer];
                            if state.satisfied.insert(id.clone()) {
                                state.outstanding -= 1;
                                if state.outstanding == 0 && !state.launched {
                                    ready.push(consumer);
                                }
                            }
                        }
                    }
                    for idx in ready {
                        launch(idx, &mut states, &mut in_flight);
                    }
                }
                Some((idx, result)) = done_rx.recv() => {
                    in_flight -= 1;
                    completed += 1;
                    let task = &tasks[idx];
                    match result {
                        Ok(bindings) if first_err.is_none() => {
                            match self.commit(task, bindings, &binder) {
                                Ok(()) => debug!(task = %task.name(), "task completed"),
                                Err(err) => {
                                    error!(task = %task.name(), error = %err, "cancelling run");
                                    first_err = Some(err);
                                    child.cancel();
                                }
                            }
                        }
                        Ok(_) => {
                            debug!(task = %task.name(), "discarding bindings completed after failure");
                        }
                        Err(err) if first_err.is_none() => {
                            error!(task = %task.name(), error = %err, "task failed, cancelling run");
                            first_err = Some(ExecutionError::Task {
                                task: task.name().to_string(),
                                error: err,
                            });
                            child.cancel();
                        }
                        Err(err) => {
                            debug!(task = %task.name(), error = %err, "discarding error observed after failure");
                        }
                    }
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Validate a completed task's bindings against its declaration and store
    /// them. A returned binding outside the declared set, or a declared key
    /// left unbound afterwards, is a mismatch. The bound-afterwards check
    /// (rather than an exact set comparison on the return value) admits tasks
    /// that store their outputs through an expose binder and return nothing.
    fn commit(
        &self,
        task: &Task,
        bindings: Vec<Binding>,
        binder: &SharedBinder,
    ) -> Result<(), ExecutionError> {
        let declared: HashSet<&KeyId> = task.provides().iter().collect();
        let mut unexpected: Vec<KeyId> = bindings
            .iter()
            .map(Binding::id)
            .filter(|id| !declared.contains(id))
            .cloned()
            .collect();
        if !unexpected.is_empty() {
            unexpected.sort();
            return Err(ExecutionError::ProvidesMismatch {
                task: task.name().to_string(),
                missing: Vec::new(),
                unexpected,
            });
        }

        if !bindings.is_empty() {
            binder.store(bindings)?;
        }

        let mut missing: Vec<KeyId> = task
            .provides()
            .iter()
            .filter(|id| !binder.has(std::slice::from_ref(*id)))
            .cloned()
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(ExecutionError::ProvidesMismatch {
                task: task.name().to_string(),
                missing,
                unexpected: Vec::new(),
            });
        }

        Ok(())
    }
}
