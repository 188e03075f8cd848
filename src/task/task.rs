// ABOUTME: The Task type, its execution context, and the task constructors
// ABOUTME: Tasks declare dependency and provided key ids and run against a shared binder

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

use crate::binder::{Binding, SharedBinder};
use crate::key::{Key, KeyId, ReadKey};

type ExecuteFn =
    Arc<dyn Fn(TaskContext, SharedBinder) -> BoxFuture<'static, anyhow::Result<Vec<Binding>>> + Send + Sync>;

/// Runtime context handed to every task execution.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Name of the graph being run.
    pub graph: String,
    /// Unique id minted for this run.
    pub run_id: String,
    /// Name of the task being executed.
    pub task: String,
    /// When this task execution started.
    pub started_at: DateTime<Utc>,
    /// Cancelled by the scheduler on the first fatal error, on timeout, or
    /// when the caller cancels the run. Tasks are expected to return promptly
    /// once this fires.
    pub cancel: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(graph: String, run_id: String, cancel: CancellationToken) -> Self {
        Self {
            graph,
            run_id,
            task: String::new(),
            started_at: Utc::now(),
            cancel,
        }
    }

    pub(crate) fn for_task(&self, task: &str) -> Self {
        Self {
            graph: self.graph.clone(),
            run_id: self.run_id.clone(),
            task: task.to_string(),
            started_at: Utc::now(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A small unit of work within a graph. Tasks form the nodes of the graph;
/// edges are derived from the key ids they depend on and provide.
#[derive(Clone)]
pub struct Task {
    name: String,
    depends: Vec<KeyId>,
    provides: Vec<KeyId>,
    execute: ExecuteFn,
}

impl Task {
    /// Build a task with any number of inputs and outputs. On success the
    /// execute function must return one binding per provided key id.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        depends: Vec<KeyId>,
        provides: Vec<KeyId>,
        f: F,
    ) -> Self
    where
        F: Fn(TaskContext, SharedBinder) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<Binding>>> + Send + 'static,
    {
        Self {
            name: name.into(),
            depends,
            provides,
            execute: Arc::new(move |ctx, binder| f(ctx, binder).boxed()),
        }
    }

    /// Build a task which may consume inputs but provides no bindings.
    pub fn no_output<F, Fut>(name: impl Into<String>, depends: Vec<KeyId>, f: F) -> Self
    where
        F: Fn(TaskContext, SharedBinder) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(name, depends, Vec::new(), move |ctx, binder| {
            let fut = f(ctx, binder);
            async move {
                fut.await?;
                Ok(Vec::new())
            }
        })
    }

    /// Build a task which produces a single output binding.
    pub fn single<T, F, Fut>(
        name: impl Into<String>,
        key: Key<T>,
        depends: Vec<KeyId>,
        f: F,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(TaskContext, SharedBinder) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let provides = vec![key.id()];
        Self::new(name, depends, provides, move |ctx, binder| {
            let fut = f(ctx, binder);
            let key = key.clone();
            async move { Ok(vec![key.bind(fut.await?)]) }
        })
    }

    /// Build a task from a function of one typed argument, auto-wiring the
    /// dependency read and the result binding.
    pub fn from_fn1<A1, Res, K1, F, Fut>(
        name: impl Into<String>,
        result: Key<Res>,
        dep1: K1,
        f: F,
    ) -> Self
    where
        A1: Send + 'static,
        Res: Clone + Send + Sync + 'static,
        K1: ReadKey<A1> + 'static,
        F: Fn(A1) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Res>> + Send + 'static,
    {
        let depends = vec![dep1.id()];
        let provides = vec![result.id()];
        let dep1 = Arc::new(dep1);
        let f = Arc::new(f);
        Self::new(name, depends, provides, move |_ctx, binder| {
            let dep1 = dep1.clone();
            let f = f.clone();
            let result = result.clone();
            async move {
                let arg1 = dep1.get(binder.as_ref())?;
                let value = (*f)(arg1).await?;
                Ok(vec![result.bind(value)])
            }
        })
    }

    /// Build a task from a function of two typed arguments.
    pub fn from_fn2<A1, A2, Res, K1, K2, F, Fut>(
        name: impl Into<String>,
        result: Key<Res>,
        dep1: K1,
        dep2: K2,
        f: F,
    ) -> Self
    where
        A1: Send + 'static,
        A2: Send + 'static,
        Res: Clone + Send + Sync + 'static,
        K1: ReadKey<A1> + 'static,
        K2: ReadKey<A2> + 'static,
        F: Fn(A1, A2) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Res>> + Send + 'static,
    {
        let depends = vec![dep1.id(), dep2.id()];
        let provides = vec![result.id()];
        let dep1 = Arc::new(dep1);
        let dep2 = Arc::new(dep2);
        let f = Arc::new(f);
        Self::new(name, depends, provides, move |_ctx, binder| {
            let dep1 = dep1.clone();
            let dep2 = dep2.clone();
            let f = f.clone();
            let result = result.clone();
            async move {
                let arg1 = dep1.get(binder.as_ref())?;
                let arg2 = dep2.get(binder.as_ref())?;
                let value = (*f)(arg1, arg2).await?;
                Ok(vec![result.bind(value)])
            }
        })
    }

    /// Build a task from a function of three typed arguments.
    pub fn from_fn3<A1, A2, A3, Res, K1, K2, K3, F, Fut>(
        name: impl Into<String>,
        result: Key<Res>,
        dep1: K1,
        dep2: K2,
        dep3: K3,
        f: F,
    ) -> Self
    where
        A1: Send + 'static,
        A2: Send + 'static,
        A3: Send + 'static,
        Res: Clone + Send + Sync + 'static,
        K1: ReadKey<A1> + 'static,
        K2: ReadKey<A2> + 'static,
        K3: ReadKey<A3> + 'static,
        F: Fn(A1, A2, A3) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Res>> + Send + 'static,
    {
        let depends = vec![dep1.id(), dep2.id(), dep3.id()];
        let provides = vec![result.id()];
        let dep1 = Arc::new(dep1);
        let dep2 = Arc::new(dep2);
        let dep3 = Arc::new(dep3);
        let f = Arc::new(f);
        Self::new(name, depends, provides, move |_ctx, binder| {
            let dep1 = dep1.clone();
            let dep2 = dep2.clone();
            let dep3 = dep3.clone();
            let f = f.clone();
            let result = result.clone();
            async move {
                let arg1 = dep1.get(binder.as_ref())?;
                let arg2 = dep2.get(binder.as_ref())?;
                let arg3 = dep3.get(binder.as_ref())?;
                let value = (*f)(arg1, arg2, arg3).await?;
                Ok(vec![result.bind(value)])
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ids of the keys which must be bound before this task can run.
    pub fn depends(&self) -> &[KeyId] {
        &self.depends
    }

    /// Ids of the keys this task provides bindings for.
    pub fn provides(&self) -> &[KeyId] {
        &self.provides
    }

    /// Perform this task's unit of work. Any error terminates the processing
    /// of the entire graph.
    pub async fn execute(
        &self,
        ctx: TaskContext,
        binder: SharedBinder,
    ) -> anyhow::Result<Vec<Binding>> {
        (self.execute)(ctx, binder).await
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("depends", &self.depends)
            .field("provides", &self.provides)
            .finish()
    }
}

/// A nestable collection of tasks. A single [`Task`] acts as a singleton set,
/// and collections flatten recursively.
pub trait IntoTasks {
    fn into_tasks(self) -> Vec<Task>;
}

impl IntoTasks for Task {
    fn into_tasks(self) -> Vec<Task> {
        vec![self]
    }
}

impl<T: IntoTasks> IntoTasks for Vec<T> {
    fn into_tasks(self) -> Vec<Task> {
        self.into_iter().flat_map(IntoTasks::into_tasks).collect()
    }
}

/// A task which binds the result key to true without reading its
/// dependencies. Intended as a fan-in barrier for conditional gates that wait
/// on multiple tasks.
pub fn all_bound(name: impl Into<String>, result: Key<bool>, depends: Vec<KeyId>) -> Task {
    Task::new(name, depends, vec![result.id()], move |_ctx, _binder| {
        let result = result.clone();
        async move { Ok(vec![result.bind(true)]) }
    })
}
