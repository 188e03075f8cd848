// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Binding assertions and small task builders shared by the test suites

#![allow(dead_code)]

use std::fmt::Debug;
use std::time::Duration;

use keyflow::{BindStatus, Binder, Binding, Graph, Key, KeyId, ReadKey, SharedBinder, Task};

/// Run a graph with a safety timeout so a scheduling bug cannot hang the
/// suite.
pub async fn run_graph(graph: &Graph, inputs: Vec<Binding>) -> SharedBinder {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    graph
        .run_with_timeout(Duration::from_secs(10), inputs)
        .await
        .expect("graph run failed")
}

/// Build a single-task graph around the given task and run it.
pub async fn run_task(task: Task, inputs: Vec<Binding>) -> SharedBinder {
    let graph = Graph::builder("test_graph")
        .task(task)
        .build()
        .expect("failed to build single-task graph");
    run_graph(&graph, inputs).await
}

pub fn expect_present<T: PartialEq + Debug>(binder: &dyn Binder, key: &dyn ReadKey<T>, want: T) {
    match key.get(binder) {
        Ok(got) => assert_eq!(got, want, "difference in bound value for {}", key.id()),
        Err(err) => panic!("expected {} to be present: {}", key.id(), err),
    }
}

pub fn expect_absent(binder: &dyn Binder, id: &KeyId) {
    let got = binder.get(id).status();
    assert_eq!(got, BindStatus::Absent, "difference in status for {}", id);
}

pub fn expect_pending(binder: &dyn Binder, id: &KeyId) {
    let got = binder.get(id).status();
    assert_eq!(got, BindStatus::Pending, "difference in status for {}", id);
}

/// Assert the binder holds exactly the given ids, no more.
pub fn expect_exact_ids(binder: &dyn Binder, mut want: Vec<KeyId>) {
    let mut got: Vec<KeyId> = binder.get_all().iter().map(|b| b.id().clone()).collect();
    got.sort();
    want.sort();
    assert_eq!(got, want, "difference in stored binding ids");
}

/// A task with no dependencies binding the key to a constant.
pub fn constant_task(name: &str, key: &Key<i32>, value: i32) -> Task {
    let key = key.clone();
    Task::new(name, vec![], vec![key.id()], move |_ctx, _binder| {
        let key = key.clone();
        async move { Ok(vec![key.bind(value)]) }
    })
}

/// A task that declares the given outputs but always fails.
pub fn failing_task(name: &str, provides: Vec<KeyId>, message: &'static str) -> Task {
    Task::new(name, vec![], provides, move |_ctx, _binder| async move {
        Err(anyhow::anyhow!(message))
    })
}
