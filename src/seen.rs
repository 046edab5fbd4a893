// src/seen.rs
use std::collections::HashSet;

use anyhow::{Context, Result};

use crate::poll::ResultBatch;
use crate::store::StateStore;
use crate::task::SearchTask;

/// Diff a freshly aggregated batch against the persisted seen set, persist
/// the union, and return the keys never seen before.
///
/// The union is written even when nothing is new, so repeated runs and
/// restarts converge on the same store state; running the same batch twice
/// yields an empty second diff. The set only ever grows.
pub async fn diff_and_persist(
    store: &dyn StateStore,
    task: &SearchTask,
    batch: &ResultBatch,
) -> Result<HashSet<String>> {
    let old = store
        .seen_keys(task)
        .await
        .with_context(|| format!("reading seen keys for {task}"))?;

    let new: HashSet<String> = batch
        .keys()
        .filter(|key| !old.contains(*key))
        .cloned()
        .collect();

    store
        .add_seen_keys(task, &new)
        .await
        .with_context(|| format!("persisting seen keys for {task}"))?;

    Ok(new)
}
