//! Job-listing watcher, binary entrypoint.
//! Boots the watch loop plus the small HTTP surface (/health, /metrics,
//! POST /ack). `--once <query> <location>` runs a single gate-free cycle
//! and exits.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jobwatch::api::{self, ApiState};
use jobwatch::config::WatchConfig;
use jobwatch::fetch::http::HttpPageFetcher;
use jobwatch::fetch::PageFetcher;
use jobwatch::metrics::Metrics;
use jobwatch::notify::{
    Acknowledger, AlertRegistry, LogSink, NotificationSink, SinkMux, WebhookSink,
};
use jobwatch::scheduler::{SchedulerCfg, Scheduler};
use jobwatch::store::{MemoryStore, RedisStore, StateStore};
use jobwatch::task::SearchTask;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobwatch=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut cfg = WatchConfig::load_default().context("loading watch config")?;
    // Env wins over the file for deployment-shaped settings.
    if let Ok(url) = std::env::var("REDIS_URL") {
        cfg.redis_url = Some(url);
    }
    if let Ok(url) = std::env::var("WEBHOOK_URL") {
        cfg.webhook_url = Some(url);
    }

    let store: Arc<dyn StateStore> = match cfg.redis_url.as_deref() {
        Some(url) => Arc::new(RedisStore::connect(url).context("connecting to redis")?),
        None => {
            tracing::warn!("no redis configured, state is in-memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let fetcher: Arc<dyn PageFetcher> = Arc::new(
        HttpPageFetcher::from_url(cfg.search_url.clone()).with_radius(cfg.search_radius),
    );

    let mut sinks: Vec<Box<dyn NotificationSink>> = Vec::new();
    match cfg.webhook_url.clone() {
        Some(url) => sinks.push(Box::new(WebhookSink::new(url))),
        None => {
            tracing::info!("no webhook configured, alerts go to the log only");
            sinks.push(Box::new(LogSink));
        }
    }
    let sinks = Arc::new(SinkMux::new(sinks));

    let registry = Arc::new(AlertRegistry::new());
    let metrics = Metrics::init();
    let cancel = CancellationToken::new();

    let sched_cfg = SchedulerCfg {
        tasks: cfg.tasks.clone(),
        poll_interval: cfg.poll_interval(),
        stagger: cfg.stagger(),
        limits: cfg.limits,
        archive_dir: cfg.archive_dir.clone(),
    };

    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("--once") {
        let (query, location) = match (args.get(2), args.get(3)) {
            (Some(q), Some(l)) => (q.clone(), l.clone()),
            _ => anyhow::bail!("usage: jobwatch --once <query> <location>"),
        };
        let task = SearchTask::new(query, location);
        let scheduler = Scheduler::new(store, fetcher, sinks, registry, sched_cfg, cancel);
        scheduler.run_once(&task).await;
        return Ok(());
    }

    let acknowledger = Acknowledger::new(Arc::clone(&store), Arc::clone(&registry));
    let router = api::router(ApiState { acknowledger }).merge(metrics.router());
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("binding {}", cfg.listen_addr))?;
    tracing::info!(addr = %cfg.listen_addr, "http surface listening");

    let scheduler = Scheduler::new(store, fetcher, sinks, registry, sched_cfg, cancel.clone());
    let watch = tokio::spawn(scheduler.run());

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::warn!(error = ?e, "http surface stopped");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown signal received, draining");
    cancel.cancel();
    let _ = watch.await;
    server.abort();
    Ok(())
}
