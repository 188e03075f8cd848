// ABOUTME: Conditional execution: predicates over bindings and the Conditional wrapper
// ABOUTME: Wrapped tasks run only when their gate holds, otherwise defaults are bound

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::task::{IntoTasks, Task};
use crate::binder::{Binder, Binding};
use crate::key::{KeyId, ReadKey};

/// A boxed boolean read-only key, as held by the built-in conditions.
pub type BoolKey = Box<dyn ReadKey<bool>>;

/// A predicate over bindings used to gate a wrapped task. `deps` must name
/// every key id `evaluate` reads, so the scheduler can delay the gate until
/// they are bound.
pub trait Condition: Send + Sync {
    fn evaluate(&self, binder: &dyn Binder) -> anyhow::Result<bool>;

    fn deps(&self) -> Vec<KeyId>;
}

/// True if and only if every contained key is bound present and true.
/// Short-circuits on the first false; read errors propagate.
pub struct AllTrue(pub Vec<BoolKey>);

impl Condition for AllTrue {
    fn evaluate(&self, binder: &dyn Binder) -> anyhow::Result<bool> {
        for key in &self.0 {
            if !key.get(binder)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn deps(&self) -> Vec<KeyId> {
        self.0.iter().map(|key| key.id()).collect()
    }
}

/// True if any contained key is bound present and true. Short-circuits on the
/// first true.
pub struct AnyTrue(pub Vec<BoolKey>);

impl Condition for AnyTrue {
    fn evaluate(&self, binder: &dyn Binder) -> anyhow::Result<bool> {
        for key in &self.0 {
            if key.get(binder)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn deps(&self) -> Vec<KeyId> {
        self.0.iter().map(|key| key.id()).collect()
    }
}

/// Wraps tasks so they only run when the condition evaluates to true. When it
/// evaluates to false, the default bindings are used, with any provided key
/// not covered by a default bound absent.
///
/// The wrapped tasks do not run until all of their own dependencies and all of
/// the condition's dependencies have been bound. To gate on keys of arbitrary
/// type being bound, wrap them with [`presence`](crate::key::presence); to
/// gate on specific values, use [`mapped`](crate::key::mapped).
pub struct Conditional {
    prefix: String,
    wrapped: Vec<Task>,
    condition: Arc<dyn Condition>,
    defaults: Vec<Binding>,
}

impl Conditional {
    pub fn new(wrapped: impl IntoTasks, condition: impl Condition + 'static) -> Self {
        Self {
            prefix: String::new(),
            wrapped: wrapped.into_tasks(),
            condition: Arc::new(condition),
            defaults: Vec::new(),
        }
    }

    /// Prefix prepended to each wrapped task's name, to keep names unique when
    /// the same task set is wrapped more than once.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Bindings to use for provided keys when the condition is false.
    pub fn with_defaults(mut self, bindings: Vec<Binding>) -> Self {
        self.defaults = bindings;
        self
    }
}

impl IntoTasks for Conditional {
    fn into_tasks(self) -> Vec<Task> {
        let defaults: HashMap<KeyId, Binding> = self
            .defaults
            .into_iter()
            .map(|b| (b.id().clone(), b))
            .collect();
        let condition = self.condition;
        let condition_deps = condition.deps();

        self.wrapped
            .into_iter()
            .map(|task| {
                let mut depends = task.depends().to_vec();
                for dep in &condition_deps {
                    if !depends.contains(dep) {
                        depends.push(dep.clone());
                    }
                }
                let name = format!("{}{}", self.prefix, task.name());
                let provides = task.provides().to_vec();

                let condition = condition.clone();
                let defaults = defaults.clone();
                Task::new(name, depends, provides, move |ctx, binder| {
                    let condition = condition.clone();
                    let defaults = defaults.clone();
                    let task = task.clone();
                    async move {
                        if condition.evaluate(binder.as_ref())? {
                            return task.execute(ctx, binder).await;
                        }
                        debug!(task = %ctx.task, "condition not met, binding defaults");
                        Ok(task
                            .provides()
                            .iter()
                            .map(|id| match defaults.get(id) {
                                Some(binding) => binding.clone(),
                                None => Binding::absent(id.clone()),
                            })
                            .collect())
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;

    #[test]
    fn test_wrapped_task_gains_condition_deps() {
        let input = Key::<i32>::new("input");
        let output = Key::<i32>::new("output");
        let gate = Key::<bool>::new("gate");

        let task = Task::from_fn1("double", output, input.clone(), |v: i32| async move {
            Ok(v * 2)
        });

        let tasks = Conditional::new(task, AllTrue(vec![Box::new(gate.clone())]))
            .with_prefix("gated_")
            .into_tasks();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name(), "gated_double");
        assert_eq!(tasks[0].depends(), &[input.id(), gate.id()]);
    }

    #[test]
    fn test_shared_deps_are_not_duplicated() {
        let flag = Key::<bool>::new("flag");
        let output = Key::<i32>::new("output");

        let task = Task::from_fn1("pass", output, flag.clone(), |v: bool| async move {
            Ok(i32::from(v))
        });

        let tasks = Conditional::new(task, AllTrue(vec![Box::new(flag.clone())])).into_tasks();
        assert_eq!(tasks[0].depends(), &[flag.id()]);
    }

    #[test]
    fn test_condition_deps() {
        let a = Key::<bool>::new("a");
        let b = Key::<bool>::new("b");
        let all = AllTrue(vec![Box::new(a.clone()), Box::new(b.clone())]);
        assert_eq!(all.deps(), vec![a.id(), b.id()]);
    }

    #[test]
    fn test_short_circuit_evaluation() {
        let bound = Key::<bool>::new("bound");
        let unbound = Key::<bool>::new("unbound");

        let binder = crate::binder::MapBinder::new();
        binder.store(vec![bound.bind(false)]).unwrap();

        // AllTrue stops at the first false key, so the unbound key is never read.
        let all = AllTrue(vec![Box::new(bound.clone()), Box::new(unbound.clone())]);
        assert!(!all.evaluate(&binder).unwrap());

        // AnyTrue has no true key to stop at, so the unbound read surfaces.
        let any = AnyTrue(vec![Box::new(bound), Box::new(unbound)]);
        assert!(any.evaluate(&binder).is_err());
    }
}
