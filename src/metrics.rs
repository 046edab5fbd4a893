use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watch_polls_total", "Poll cycles started.");
        describe_counter!("watch_polls_skipped_total", "Tasks skipped by the gate.");
        describe_counter!("watch_poll_errors_total", "Poll cycles that failed outright.");
        describe_counter!(
            "watch_page_errors_total",
            "Single-page failures tolerated within a cycle."
        );
        describe_counter!("watch_fetch_errors_total", "HTTP request failures.");
        describe_counter!("watch_listings_total", "Listings parsed from the source.");
        describe_counter!("watch_new_listings_total", "Listings never seen before.");
        describe_counter!("watch_alerts_total", "Notification events dispatched.");
        describe_counter!(
            "watch_alerts_suppressed_total",
            "Events suppressed by the in-flight registry."
        );
        describe_counter!("watch_acks_total", "Alerts acknowledged.");
        describe_counter!("watch_sink_errors_total", "Sink delivery failures.");
        describe_counter!(
            "watch_store_errors_total",
            "State-store failures surfaced to the watch loop."
        );
        describe_histogram!("watch_parse_ms", "Search-page parse time in milliseconds.");
        describe_histogram!(
            "watch_poll_duration_ms",
            "Wall time of one cycle's page sweep."
        );
        describe_gauge!(
            "watch_last_cycle_ts",
            "Unix ts when the watch loop last finished a task."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and register every series.
    pub fn init() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");
        ensure_metrics_described();
        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
