// ABOUTME: Integration tests for task constructors and conditional wrapping
// ABOUTME: Each task runs inside a single-task graph like production tasks do

use keyflow::{
    all_bound, optional, presence, AllTrue, AnyTrue, Conditional, ExecutionError, Graph, Key,
    Maybe, ReadKey, Task,
};

mod common;
use common::{expect_absent, expect_present, run_task};

#[tokio::test]
async fn test_new_task() {
    let key1 = Key::<String>::new("key1");
    let key2 = Key::<String>::new("key2");

    let reader = key1.clone();
    let writer = key2.clone();
    let task = Task::new(
        "task",
        vec![key1.id()],
        vec![key2.id()],
        move |_ctx, binder| {
            let reader = reader.clone();
            let writer = writer.clone();
            async move {
                let val = reader.get(binder.as_ref())?;
                Ok(vec![writer.bind(format!("{val}{val}"))])
            }
        },
    );

    let binder = run_task(task, vec![key1.bind("bar".to_string())]).await;
    expect_present(binder.as_ref(), &key2, "barbar".to_string());
}

#[tokio::test]
async fn test_task_error_aborts_run() {
    let key1 = Key::<String>::new("key1");
    let key2 = Key::<String>::new("key2");

    let task = Task::new(
        "task",
        vec![key1.id()],
        vec![key2.id()],
        |_ctx, _binder| async move { Err(anyhow::anyhow!("sentinel error")) },
    );

    let graph = Graph::builder("test_graph").task(task).build().unwrap();
    let err = graph
        .run(vec![key1.bind("bar".to_string())])
        .await
        .unwrap_err();
    match err {
        ExecutionError::Task { task, error } => {
            assert_eq!(task, "task");
            assert!(error.to_string().contains("sentinel error"));
        }
        other => panic!("expected task error, got {other}"),
    }
}

#[tokio::test]
async fn test_no_output_task() {
    let key1 = Key::<String>::new("key1");

    let reader = key1.clone();
    let task = Task::no_output("task", vec![key1.id()], move |_ctx, binder| {
        let reader = reader.clone();
        async move {
            reader.get(binder.as_ref())?;
            Ok(())
        }
    });

    let binder = run_task(task, vec![key1.bind("bar".to_string())]).await;
    expect_present(binder.as_ref(), &key1, "bar".to_string());
}

#[tokio::test]
async fn test_single_task() {
    let key1 = Key::<String>::new("key1");
    let key2 = Key::<String>::new("key2");

    let reader = key1.clone();
    let task = Task::single(
        "task",
        key2.clone(),
        vec![key1.id()],
        move |_ctx, binder| {
            let reader = reader.clone();
            async move { Ok(reader.get(binder.as_ref())?) }
        },
    );

    let binder = run_task(task, vec![key1.bind("bar".to_string())]).await;
    expect_present(binder.as_ref(), &key2, "bar".to_string());
}

#[tokio::test]
async fn test_from_fn_constructors() {
    let key1 = Key::<String>::new("key1");
    let key2 = Key::<String>::new("key2");
    let key3 = Key::<String>::new("key3");

    let doubled = Key::<String>::new("doubled");
    let task1 = Task::from_fn1("task1", doubled.clone(), key1.clone(), |a: String| async move {
        Ok(format!("{a}{a}"))
    });
    let binder = run_task(task1, vec![key1.bind("bar".to_string())]).await;
    expect_present(binder.as_ref(), &doubled, "barbar".to_string());

    let joined = Key::<String>::new("joined");
    let task2 = Task::from_fn2(
        "task2",
        joined.clone(),
        key1.clone(),
        key2.clone(),
        |a: String, b: String| async move { Ok(format!("{a}{b}")) },
    );
    let binder = run_task(
        task2,
        vec![key1.bind("foo".to_string()), key2.bind("bar".to_string())],
    )
    .await;
    expect_present(binder.as_ref(), &joined, "foobar".to_string());

    let all = Key::<String>::new("all");
    let task3 = Task::from_fn3(
        "task3",
        all.clone(),
        key1.clone(),
        key2.clone(),
        key3.clone(),
        |a: String, b: String, c: String| async move { Ok(format!("{a}{b}{c}")) },
    );
    let binder = run_task(
        task3,
        vec![
            key1.bind("a".to_string()),
            key2.bind("b".to_string()),
            key3.bind("c".to_string()),
        ],
    )
    .await;
    expect_present(binder.as_ref(), &all, "abc".to_string());
}

#[tokio::test]
async fn test_from_fn_with_optional_dependency() {
    let key1 = Key::<i32>::new("key1");
    let fallback = Key::<i32>::new("fallback");

    let task = Task::from_fn1(
        "task",
        fallback.clone(),
        optional(key1.clone()),
        |maybe: Maybe<i32>| async move { Ok(maybe.into_value().unwrap_or(-1)) },
    );

    // The dependency is bound absent; the optional read turns that into a value.
    let binder = run_task(task, vec![key1.bind_absent()]).await;
    expect_present(binder.as_ref(), &fallback, -1);
}

#[tokio::test]
async fn test_conditional_condition_met() {
    let key1 = Key::<String>::new("key1");
    let key2 = Key::<String>::new("key2");
    let bool_key = Key::<bool>::new("boolkey");

    let task = Task::from_fn1("task", key2.clone(), key1.clone(), |a: String| async move {
        Ok(format!("{a}{a}"))
    });
    let wrapped = Conditional::new(task, AllTrue(vec![Box::new(bool_key.clone())]))
        .with_prefix("cond_");

    let graph = Graph::builder("test_graph").task(wrapped).build().unwrap();
    assert_eq!(graph.tasks()[0].name(), "cond_task");

    let binder = common::run_graph(
        &graph,
        vec![key1.bind("bar".to_string()), bool_key.bind(true)],
    )
    .await;
    expect_present(binder.as_ref(), &key2, "barbar".to_string());
}

#[tokio::test]
async fn test_conditional_condition_not_met() {
    let key1 = Key::<String>::new("key1");
    let key2 = Key::<String>::new("key2");
    let bool_key = Key::<bool>::new("boolkey");

    let task = Task::from_fn1("task", key2.clone(), key1.clone(), |a: String| async move {
        Ok(format!("{a}{a}"))
    });
    let wrapped = Conditional::new(task, AnyTrue(vec![Box::new(bool_key.clone())]));

    let graph = Graph::builder("test_graph").task(wrapped).build().unwrap();
    let binder = common::run_graph(
        &graph,
        vec![key1.bind("bar".to_string()), bool_key.bind(false)],
    )
    .await;
    expect_absent(binder.as_ref(), &key2.id());
}

#[tokio::test]
async fn test_conditional_defaults_used_when_not_met() {
    let key1 = Key::<String>::new("key1");
    let result = Key::<String>::new("result");
    let cond = Key::<bool>::new("cond");

    let task = Task::from_fn1("task", result.clone(), key1.clone(), |a: String| async move {
        Ok(a)
    });
    let wrapped = Conditional::new(task, AllTrue(vec![Box::new(cond.clone())]))
        .with_defaults(vec![result.bind("x".to_string())]);

    let graph = Graph::builder("test_graph").task(wrapped).build().unwrap();
    let binder = common::run_graph(
        &graph,
        vec![key1.bind("bar".to_string()), cond.bind(false)],
    )
    .await;
    expect_present(binder.as_ref(), &result, "x".to_string());
}

#[tokio::test]
async fn test_conditional_gated_on_presence() {
    let value = Key::<String>::new("value");
    let result = Key::<String>::new("result");

    let task = Task::from_fn1(
        "task",
        result.clone(),
        optional(value.clone()),
        |maybe: Maybe<String>| async move { Ok(maybe.into_value().unwrap_or_default()) },
    );
    let wrapped = Conditional::new(task, AllTrue(vec![Box::new(presence(value.clone()))]));

    let graph = Graph::builder("test_graph").task(wrapped).build().unwrap();
    let binder = common::run_graph(&graph, vec![value.bind_absent()]).await;
    // The value is bound absent, so presence gates the task off.
    expect_absent(binder.as_ref(), &result.id());
}

#[tokio::test]
async fn test_all_bound_barrier() {
    let key1 = Key::<String>::new("key1");
    let key2 = Key::<String>::new("key2");
    let done = Key::<bool>::new("done");

    let task = all_bound("barrier", done.clone(), vec![key1.id(), key2.id()]);
    let binder = run_task(
        task,
        vec![key1.bind("a".to_string()), key2.bind("b".to_string())],
    )
    .await;
    expect_present(binder.as_ref(), &done, true);
}
