// tests/seen_diff.rs
//
// The seen-set diff: idempotent per batch, monotone across cycles.

use std::collections::HashSet;

use jobwatch::fetch::Listing;
use jobwatch::poll::ResultBatch;
use jobwatch::seen::diff_and_persist;
use jobwatch::store::{MemoryStore, StateStore};
use jobwatch::task::SearchTask;

fn batch(keys: &[&str]) -> ResultBatch {
    keys.iter()
        .map(|k| ((*k).to_string(), Listing::new(*k)))
        .collect()
}

fn task() -> SearchTask {
    SearchTask::new("software_developer", "tampa")
}

#[tokio::test]
async fn first_diff_reports_everything_second_reports_nothing() {
    let store = MemoryStore::new();
    let task = task();
    let b = batch(&["a", "b", "c"]);

    let first = diff_and_persist(&store, &task, &b).await.unwrap();
    assert_eq!(first.len(), 3);

    let second = diff_and_persist(&store, &task, &b).await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn diff_reports_only_unseen_keys() {
    let store = MemoryStore::new();
    let task = task();

    diff_and_persist(&store, &task, &batch(&["a", "b"]))
        .await
        .unwrap();

    let new = diff_and_persist(&store, &task, &batch(&["a", "b", "c", "d"]))
        .await
        .unwrap();
    let expected: HashSet<String> = ["c".to_string(), "d".to_string()].into();
    assert_eq!(new, expected);
}

#[tokio::test]
async fn seen_set_only_ever_grows() {
    let store = MemoryStore::new();
    let task = task();

    diff_and_persist(&store, &task, &batch(&["a", "b"]))
        .await
        .unwrap();
    let after_first = store.seen_keys(&task).await.unwrap();

    // A later cycle where previously seen listings dropped off the source.
    diff_and_persist(&store, &task, &batch(&["b", "c"]))
        .await
        .unwrap();
    let after_second = store.seen_keys(&task).await.unwrap();

    assert!(after_second.is_superset(&after_first));
    assert_eq!(after_second.len(), 3);
}

#[tokio::test]
async fn empty_batch_is_a_no_op_diff() {
    let store = MemoryStore::new();
    let task = task();

    let new = diff_and_persist(&store, &task, &ResultBatch::new())
        .await
        .unwrap();
    assert!(new.is_empty());
    assert!(store.seen_keys(&task).await.unwrap().is_empty());
}

#[tokio::test]
async fn tasks_do_not_share_seen_state() {
    let store = MemoryStore::new();
    let a = SearchTask::new("rust", "remote");
    let b = SearchTask::new("rust", "berlin");

    diff_and_persist(&store, &a, &batch(&["x"])).await.unwrap();
    let new_for_b = diff_and_persist(&store, &b, &batch(&["x"])).await.unwrap();
    assert_eq!(new_for_b.len(), 1);
}
