// tests/watch_scenarios.rs
//
// End-to-end watch cycles against a scripted fetcher and an in-memory
// store: first discovery, gate suppression, post-acknowledgement delta,
// and the in-flight duplicate guard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use jobwatch::config::FetchLimits;
use jobwatch::fetch::{FetchedPage, Listing, PageFetcher};
use jobwatch::notify::{
    Acknowledger, AlertRegistry, NotificationEvent, NotificationSink, SinkMux,
};
use jobwatch::scheduler::{SchedulerCfg, Scheduler};
use jobwatch::store::{MemoryStore, StateStore};
use jobwatch::task::SearchTask;

struct SwappableFetcher {
    pages: Mutex<HashMap<u64, FetchedPage>>,
    calls: Mutex<Vec<u64>>,
}

impl SwappableFetcher {
    fn new(pages: HashMap<u64, FetchedPage>) -> Self {
        Self {
            pages: Mutex::new(pages),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn set_pages(&self, pages: HashMap<u64, FetchedPage>) {
        *self.pages.lock().unwrap() = pages;
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for SwappableFetcher {
    async fn fetch_page(&self, _task: &SearchTask, offset: u64) -> Result<FetchedPage> {
        self.calls.lock().unwrap().push(offset);
        let pages = self.pages.lock().unwrap();
        match pages.get(&offset) {
            Some(page) => Ok(page.clone()),
            None => anyhow::bail!("no scripted page at offset {offset}"),
        }
    }

    fn name(&self) -> &'static str {
        "swappable"
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        self.events.lock().unwrap().push(ev.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn page_of(keys: &[&str]) -> FetchedPage {
    FetchedPage {
        listings: keys.iter().map(|k| Listing::new(*k)).collect(),
        total_hint: keys.len() as u64,
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    fetcher: Arc<SwappableFetcher>,
    registry: Arc<AlertRegistry>,
    events: Arc<Mutex<Vec<NotificationEvent>>>,
    scheduler: Scheduler,
    task: SearchTask,
}

const INTERVAL_SECS: u64 = 180;

fn harness(first_page: FetchedPage) -> Harness {
    let task = SearchTask::new("software_developer", "tampa");
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(SwappableFetcher::new(HashMap::from([(0, first_page)])));
    let registry = Arc::new(AlertRegistry::new());
    let sink = RecordingSink::default();
    let events = Arc::clone(&sink.events);

    let scheduler = Scheduler::new(
        Arc::clone(&store) as Arc<dyn StateStore>,
        Arc::clone(&fetcher) as Arc<dyn PageFetcher>,
        Arc::new(SinkMux::new(vec![Box::new(sink)])),
        Arc::clone(&registry),
        SchedulerCfg {
            tasks: vec![task.clone()],
            poll_interval: Duration::from_secs(INTERVAL_SECS),
            stagger: Duration::from_millis(1),
            limits: FetchLimits::default(),
            archive_dir: None,
        },
        CancellationToken::new(),
    );

    Harness {
        store,
        fetcher,
        registry,
        events,
        scheduler,
        task,
    }
}

fn now_unix() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

#[tokio::test]
async fn first_discovery_then_gate_then_acknowledged_delta() {
    let h = harness(page_of(&["k0", "k1", "k2", "k3", "k4", "k5", "k6"]));

    // First-ever poll: everything is new, one alert fires.
    h.scheduler.tick(&h.task).await;
    h.scheduler.drain_alerts().await;

    assert_eq!(h.fetcher.call_count(), 1, "hint of 7 needs only page 0");
    assert_eq!(h.store.seen_keys(&h.task).await.unwrap().len(), 7);
    assert!(!h.store.acknowledged(&h.task).await.unwrap());
    assert!(h.store.last_poll(&h.task).await.unwrap().is_some());
    assert!(h.registry.is_open(&h.task));
    {
        let events = h.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].new_keys.len(), 7);
        assert_eq!(events[0].report.len(), 7);
    }

    // Cooldown elapsed but the alert is still open, so the gate blocks
    // and nothing is fetched.
    h.store
        .set_last_poll(&h.task, now_unix() - 100 * INTERVAL_SECS)
        .await
        .unwrap();
    h.scheduler.tick(&h.task).await;
    h.scheduler.drain_alerts().await;

    assert_eq!(h.fetcher.call_count(), 1, "gate must prevent the fetch");
    assert_eq!(h.events.lock().unwrap().len(), 1);

    // Human dismisses the alert; the next due poll reports exactly the
    // two additions.
    let ack = Acknowledger::new(
        Arc::clone(&h.store) as Arc<dyn StateStore>,
        Arc::clone(&h.registry),
    );
    ack.acknowledge(&h.task).await.unwrap();
    assert!(!h.registry.is_open(&h.task));

    h.fetcher.set_pages(HashMap::from([(
        0,
        page_of(&["k0", "k1", "k2", "k3", "k4", "k5", "k6", "k7", "k8"]),
    )]));
    h.store
        .set_last_poll(&h.task, now_unix() - 2 * INTERVAL_SECS)
        .await
        .unwrap();

    h.scheduler.tick(&h.task).await;
    h.scheduler.drain_alerts().await;

    assert_eq!(h.store.seen_keys(&h.task).await.unwrap().len(), 9);
    {
        let events = h.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        let mut new: Vec<&str> = events[1].new_keys.iter().map(String::as_str).collect();
        new.sort();
        assert_eq!(new, vec!["k7", "k8"]);
    }

    // Stale gate state must not produce a second open alert: force the
    // stored flag back to acknowledged while the previous alert is still
    // open, and let another delta arrive.
    h.store.set_acknowledged(&h.task, true).await.unwrap();
    h.store
        .set_last_poll(&h.task, now_unix() - 2 * INTERVAL_SECS)
        .await
        .unwrap();
    h.fetcher.set_pages(HashMap::from([(
        0,
        page_of(&[
            "k0", "k1", "k2", "k3", "k4", "k5", "k6", "k7", "k8", "k9",
        ]),
    )]));

    h.scheduler.tick(&h.task).await;
    h.scheduler.drain_alerts().await;

    assert_eq!(
        h.events.lock().unwrap().len(),
        2,
        "in-flight registry must suppress the duplicate"
    );
    assert!(h.registry.is_open(&h.task));
    // The delta itself was still recorded.
    assert_eq!(h.store.seen_keys(&h.task).await.unwrap().len(), 10);
    assert!(!h.store.acknowledged(&h.task).await.unwrap());
}

#[tokio::test]
async fn empty_result_set_raises_no_alert() {
    let h = harness(FetchedPage {
        listings: vec![],
        total_hint: 0,
    });

    h.scheduler.tick(&h.task).await;
    h.scheduler.drain_alerts().await;

    assert_eq!(h.fetcher.call_count(), 1);
    assert!(h.events.lock().unwrap().is_empty());
    assert!(h.store.acknowledged(&h.task).await.unwrap());
    assert!(!h.registry.is_open(&h.task));
    // The cycle still counts against the cooldown.
    assert!(h.store.last_poll(&h.task).await.unwrap().is_some());
}

#[tokio::test]
async fn failed_first_page_leaves_no_trace_and_next_tick_retries() {
    let h = harness(page_of(&["k0"]));
    // No page at offset 0 -> the scripted fetcher errors.
    h.fetcher.set_pages(HashMap::new());

    h.scheduler.tick(&h.task).await;
    h.scheduler.drain_alerts().await;

    assert!(h.events.lock().unwrap().is_empty());
    assert!(h.store.seen_keys(&h.task).await.unwrap().is_empty());
    assert!(
        h.store.last_poll(&h.task).await.unwrap().is_none(),
        "a failed cycle must not consume the cooldown"
    );

    // The source recovers; the very next tick polls again.
    h.fetcher.set_pages(HashMap::from([(0, page_of(&["k0"]))]));
    h.scheduler.tick(&h.task).await;
    h.scheduler.drain_alerts().await;

    assert_eq!(h.events.lock().unwrap().len(), 1);
    assert_eq!(h.store.seen_keys(&h.task).await.unwrap().len(), 1);
}

#[tokio::test]
async fn repeat_poll_with_no_delta_stays_quiet() {
    let h = harness(page_of(&["k0", "k1"]));

    h.scheduler.tick(&h.task).await;
    h.scheduler.drain_alerts().await;
    assert_eq!(h.events.lock().unwrap().len(), 1);

    let ack = Acknowledger::new(
        Arc::clone(&h.store) as Arc<dyn StateStore>,
        Arc::clone(&h.registry),
    );
    ack.acknowledge(&h.task).await.unwrap();
    h.store
        .set_last_poll(&h.task, now_unix() - 2 * INTERVAL_SECS)
        .await
        .unwrap();

    h.scheduler.tick(&h.task).await;
    h.scheduler.drain_alerts().await;

    assert_eq!(h.events.lock().unwrap().len(), 1, "same keys, no new alert");
    assert!(
        h.store.acknowledged(&h.task).await.unwrap(),
        "a quiet cycle must not close the gate"
    );
}
