pub mod webhook;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;

use crate::report::ReportEntry;
use crate::store::StateStore;
use crate::task::SearchTask;

pub use webhook::WebhookSink;

/// One alert-worthy discovery: the task, the keys never seen before, and a
/// compact report of the matching listings. Built once per notifying cycle
/// and discarded after dispatch.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub task: SearchTask,
    pub new_keys: HashSet<String>,
    pub report: Vec<ReportEntry>,
    pub ts: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, ev: &NotificationEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Sink that only writes to the log. Keeps discoveries observable when no
/// delivery channel is configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        tracing::info!(
            target: "notify",
            query = %ev.task.query,
            location = %ev.task.location,
            new = ev.new_keys.len(),
            "new listings found"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Fan-out over every configured sink. A failing sink is logged and does
/// not stop the others; delivery failure never reaches the watch loop.
pub struct SinkMux {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl SinkMux {
    pub fn new(sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    pub async fn notify(&self, ev: &NotificationEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(ev).await {
                tracing::warn!(
                    target: "notify",
                    sink = sink.name(),
                    query = %ev.task.query,
                    location = %ev.task.location,
                    error = ?e,
                    "sink delivery failed"
                );
                counter!("watch_sink_errors_total").increment(1);
            }
        }
    }
}

/// Tracks which tasks have an alert open (dispatched, not yet dismissed).
/// Shared between the watch loop and whatever surface acknowledgements
/// arrive from, hence the mutex.
#[derive(Debug, Default)]
pub struct AlertRegistry {
    open: Mutex<HashSet<SearchTask>>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the alert slot for `task`; false if one is already open.
    pub fn try_open(&self, task: &SearchTask) -> bool {
        self.open
            .lock()
            .expect("alert registry mutex poisoned")
            .insert(task.clone())
    }

    pub fn close(&self, task: &SearchTask) -> bool {
        self.open
            .lock()
            .expect("alert registry mutex poisoned")
            .remove(task)
    }

    pub fn is_open(&self, task: &SearchTask) -> bool {
        self.open
            .lock()
            .expect("alert registry mutex poisoned")
            .contains(task)
    }

    pub fn open_count(&self) -> usize {
        self.open
            .lock()
            .expect("alert registry mutex poisoned")
            .len()
    }
}

/// The one path that re-arms the poll gate: flips the stored flag back to
/// acknowledged and releases the in-flight slot. Handed to whatever surface
/// the human dismisses alerts from. No timeout ever does this implicitly.
#[derive(Clone)]
pub struct Acknowledger {
    store: Arc<dyn StateStore>,
    registry: Arc<AlertRegistry>,
}

impl Acknowledger {
    pub fn new(store: Arc<dyn StateStore>, registry: Arc<AlertRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn acknowledge(&self, task: &SearchTask) -> Result<()> {
        self.store
            .set_acknowledged(task, true)
            .await
            .with_context(|| format!("acknowledging {task}"))?;
        self.registry.close(task);
        counter!("watch_acks_total").increment(1);
        tracing::info!(
            target: "notify",
            query = %task.query,
            location = %task.location,
            "alert acknowledged"
        );
        Ok(())
    }
}
