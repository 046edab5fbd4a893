// src/store/memory.rs
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{key_acknowledged, key_last_poll, key_seen, StateStore};
use crate::task::SearchTask;

/// Process-local store for tests and storeless runs. State is lost on
/// restart; the pipeline then simply re-discovers everything once.
#[derive(Debug, Default)]
pub struct MemoryStore {
    stamps: Mutex<HashMap<String, u64>>,
    flags: Mutex<HashMap<String, bool>>,
    seen: Mutex<HashMap<String, HashSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn last_poll(&self, task: &SearchTask) -> Result<Option<u64>> {
        let stamps = self.stamps.lock().expect("stamps mutex poisoned");
        Ok(stamps.get(&key_last_poll(task)).copied())
    }

    async fn set_last_poll(&self, task: &SearchTask, unix: u64) -> Result<()> {
        let mut stamps = self.stamps.lock().expect("stamps mutex poisoned");
        stamps.insert(key_last_poll(task), unix);
        Ok(())
    }

    async fn acknowledged(&self, task: &SearchTask) -> Result<bool> {
        let flags = self.flags.lock().expect("flags mutex poisoned");
        Ok(flags.get(&key_acknowledged(task)).copied().unwrap_or(true))
    }

    async fn set_acknowledged(&self, task: &SearchTask, value: bool) -> Result<()> {
        let mut flags = self.flags.lock().expect("flags mutex poisoned");
        flags.insert(key_acknowledged(task), value);
        Ok(())
    }

    async fn seen_keys(&self, task: &SearchTask) -> Result<HashSet<String>> {
        let seen = self.seen.lock().expect("seen mutex poisoned");
        Ok(seen.get(&key_seen(task)).cloned().unwrap_or_default())
    }

    async fn add_seen_keys(&self, task: &SearchTask, keys: &HashSet<String>) -> Result<()> {
        let mut seen = self.seen.lock().expect("seen mutex poisoned");
        seen.entry(key_seen(task))
            .or_default()
            .extend(keys.iter().cloned());
        Ok(())
    }
}
