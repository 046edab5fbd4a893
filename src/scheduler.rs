//! The watch loop. One task at a time, fixed round-robin order, a stagger
//! pause between tasks so simultaneous due-times don't turn into a burst of
//! network sweeps. Page-level concurrency lives inside the poll cycle; each
//! dispatched alert gets its own worker so an open alert never stalls the
//! loop.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::FetchLimits;
use crate::fetch::PageFetcher;
use crate::gate;
use crate::notify::{AlertRegistry, NotificationEvent, SinkMux};
use crate::poll::{self, PollOutcome, ResultBatch};
use crate::report;
use crate::seen;
use crate::store::StateStore;
use crate::task::SearchTask;

/// Loop timing and the fixed task list.
#[derive(Debug, Clone)]
pub struct SchedulerCfg {
    pub tasks: Vec<SearchTask>,
    pub poll_interval: Duration,
    pub stagger: Duration,
    pub limits: FetchLimits,
    /// When set, every discovery batch also lands as a report file here.
    pub archive_dir: Option<PathBuf>,
}

pub struct Scheduler {
    store: Arc<dyn StateStore>,
    fetcher: Arc<dyn PageFetcher>,
    sinks: Arc<SinkMux>,
    registry: Arc<AlertRegistry>,
    cfg: SchedulerCfg,
    cancel: CancellationToken,
    alerts: tokio::sync::Mutex<JoinSet<()>>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn StateStore>,
        fetcher: Arc<dyn PageFetcher>,
        sinks: Arc<SinkMux>,
        registry: Arc<AlertRegistry>,
        cfg: SchedulerCfg,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            fetcher,
            sinks,
            registry,
            cfg,
            cancel,
            alerts: tokio::sync::Mutex::new(JoinSet::new()),
        }
    }

    /// Runs until cancelled. Nothing short of cancellation stops the loop;
    /// a failing task is logged and the next one is still evaluated on
    /// schedule.
    pub async fn run(self) {
        tracing::info!(
            target: "scheduler",
            tasks = self.cfg.tasks.len(),
            poll_interval_secs = self.cfg.poll_interval.as_secs(),
            stagger_secs = self.cfg.stagger.as_secs(),
            "watch loop starting"
        );

        'outer: loop {
            for task in &self.cfg.tasks {
                if self.cancel.is_cancelled() {
                    break 'outer;
                }

                self.tick(task).await;
                gauge!("watch_last_cycle_ts").set(Utc::now().timestamp() as f64);

                tokio::select! {
                    _ = self.cancel.cancelled() => break 'outer,
                    _ = tokio::time::sleep(self.cfg.stagger) => {}
                }
            }
        }

        self.drain_alerts().await;
        tracing::info!(target: "scheduler", "watch loop stopped");
    }

    /// Gate check plus, when due, one full cycle for `task`.
    pub async fn tick(&self, task: &SearchTask) {
        let now = Utc::now().timestamp().max(0) as u64;
        let due = gate::should_poll(
            self.store.as_ref(),
            task,
            now,
            self.cfg.poll_interval.as_secs(),
        )
        .await;

        if !due {
            tracing::info!(
                target: "scheduler",
                query = %task.query,
                location = %task.location,
                "skipping, gate closed"
            );
            counter!("watch_polls_skipped_total").increment(1);
            return;
        }

        self.cycle(task, now).await;
    }

    /// One gate-free cycle, then wait for the alert worker to finish.
    /// Backs the `--once` CLI path.
    pub async fn run_once(&self, task: &SearchTask) {
        let now = Utc::now().timestamp().max(0) as u64;
        self.cycle(task, now).await;
        self.drain_alerts().await;
    }

    /// Joins every outstanding alert worker. The only blocking step of a
    /// shutdown.
    pub async fn drain_alerts(&self) {
        let mut alerts = self.alerts.lock().await;
        while alerts.join_next().await.is_some() {}
    }

    async fn cycle(&self, task: &SearchTask, now: u64) {
        counter!("watch_polls_total").increment(1);
        tracing::info!(
            target: "scheduler",
            query = %task.query,
            location = %task.location,
            "polling"
        );

        let outcome = match poll::run_poll(
            self.fetcher.as_ref(),
            task,
            self.cfg.limits,
            &self.cancel,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    target: "scheduler",
                    source = self.fetcher.name(),
                    query = %task.query,
                    location = %task.location,
                    error = ?e,
                    "poll cycle failed"
                );
                counter!("watch_poll_errors_total").increment(1);
                return;
            }
        };

        let batch = match outcome {
            PollOutcome::Completed { batch, .. } => batch,
            PollOutcome::Aborted => {
                tracing::info!(
                    target: "scheduler",
                    query = %task.query,
                    location = %task.location,
                    "poll aborted by shutdown, nothing committed"
                );
                return;
            }
        };

        // Commit point. Order matters for restart safety: the seen set
        // first, then the poll stamp, then (only when alerting) the gate
        // flag. A crash between writes re-runs the cycle as a no-op diff.
        let new_keys = match seen::diff_and_persist(self.store.as_ref(), task, &batch).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(
                    target: "scheduler",
                    query = %task.query,
                    location = %task.location,
                    error = ?e,
                    "seen-set commit failed, cycle not recorded"
                );
                counter!("watch_store_errors_total").increment(1);
                return;
            }
        };

        if let Err(e) = self.store.set_last_poll(task, now).await {
            tracing::warn!(
                target: "scheduler",
                query = %task.query,
                location = %task.location,
                error = ?e,
                "last-poll stamp failed"
            );
            counter!("watch_store_errors_total").increment(1);
            return;
        }

        tracing::info!(
            target: "scheduler",
            query = %task.query,
            location = %task.location,
            batch = batch.len(),
            new = new_keys.len(),
            "cycle complete"
        );
        counter!("watch_new_listings_total").increment(new_keys.len() as u64);

        if new_keys.is_empty() {
            return;
        }

        if let Err(e) = self.store.set_acknowledged(task, false).await {
            tracing::warn!(
                target: "scheduler",
                query = %task.query,
                location = %task.location,
                error = ?e,
                "gate flag write failed, not alerting on unrecorded state"
            );
            counter!("watch_store_errors_total").increment(1);
            return;
        }

        self.dispatch(task, new_keys, &batch).await;
    }

    async fn dispatch(&self, task: &SearchTask, new_keys: HashSet<String>, batch: &ResultBatch) {
        // The gate should make a second event per task impossible, but the
        // registry guards against stale gate state anyway.
        if !self.registry.try_open(task) {
            tracing::warn!(
                target: "scheduler",
                query = %task.query,
                location = %task.location,
                "alert already open, suppressing duplicate"
            );
            counter!("watch_alerts_suppressed_total").increment(1);
            return;
        }

        let ev = NotificationEvent {
            task: task.clone(),
            report: report::build_report(batch, &new_keys),
            new_keys,
            ts: Utc::now(),
        };
        counter!("watch_alerts_total").increment(1);

        if let Some(dir) = &self.cfg.archive_dir {
            report::archive_report(dir, task, &ev.report).await;
        }

        let sinks = Arc::clone(&self.sinks);
        let mut alerts = self.alerts.lock().await;
        alerts.spawn(async move {
            sinks.notify(&ev).await;
        });
    }
}
