// src/store/mod.rs
pub mod memory;
pub mod redis;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::task::SearchTask;

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Durable per-task state: the last-poll stamp, the acknowledgement flag,
/// and the set of every listing key seen so far. The three keys are
/// independent (no multi-key transaction), so callers write them in a
/// restart-safe order: seen set, then stamp, then flag.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn last_poll(&self, task: &SearchTask) -> Result<Option<u64>>;
    async fn set_last_poll(&self, task: &SearchTask, unix: u64) -> Result<()>;

    /// Absent state reads as acknowledged: a task nobody was ever alerted
    /// about has nothing pending dismissal.
    async fn acknowledged(&self, task: &SearchTask) -> Result<bool>;
    async fn set_acknowledged(&self, task: &SearchTask, value: bool) -> Result<()>;

    async fn seen_keys(&self, task: &SearchTask) -> Result<HashSet<String>>;
    /// Set-union write; keys already stored are never removed.
    async fn add_seen_keys(&self, task: &SearchTask, keys: &HashSet<String>) -> Result<()>;
}

pub(crate) fn key_last_poll(task: &SearchTask) -> String {
    format!("last_poll_{}", task.key_suffix())
}

pub(crate) fn key_acknowledged(task: &SearchTask) -> String {
    format!("acknowledged_{}", task.key_suffix())
}

pub(crate) fn key_seen(task: &SearchTask) -> String {
    format!("seen_{}", task.key_suffix())
}
