//! One poll cycle: page 0 first (it carries the total-count hint), then the
//! remaining pages with bounded fan-out, merged unique-by-key. A failed page
//! contributes nothing; a cancelled cycle commits nothing.

use std::collections::HashMap;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;

use crate::config::FetchLimits;
use crate::fetch::{FetchedPage, Listing, PageFetcher};
use crate::task::SearchTask;

/// Unique-by-key merge of every page fetched during one poll cycle.
pub type ResultBatch = HashMap<String, Listing>;

/// Outcome of one cycle. Shutdown mid-cycle is a first-class branch, not an
/// error: the caller discards partial results and retries on restart.
#[derive(Debug)]
pub enum PollOutcome {
    Completed {
        batch: ResultBatch,
        total_available: u64,
    },
    Aborted,
}

/// The source stops serving past a hard result cap regardless of the hint.
pub fn clamp_total(total_hint: u64, max_results: u64) -> u64 {
    total_hint.min(max_results)
}

/// Ceiling division without floats: any partial page still counts as a page.
pub fn page_count(total: u64, page_size: u64) -> u64 {
    (total + page_size - 1) / page_size
}

/// Result offsets of the pages after page 0.
pub fn remaining_offsets(total: u64, page_size: u64) -> Vec<u64> {
    (1..page_count(total, page_size))
        .map(|page| page * page_size)
        .collect()
}

/// Pages 1..N complete in any order; the first listing to claim a key wins.
fn merge_page(batch: &mut ResultBatch, page: FetchedPage) {
    for listing in page.listings {
        batch.entry(listing.key.clone()).or_insert(listing);
    }
}

pub async fn run_poll(
    fetcher: &dyn PageFetcher,
    task: &SearchTask,
    limits: FetchLimits,
    cancel: &CancellationToken,
) -> Result<PollOutcome> {
    if cancel.is_cancelled() {
        return Ok(PollOutcome::Aborted);
    }

    let first = fetcher
        .fetch_page(task, 0)
        .await
        .with_context(|| format!("first page for {task}"))?;

    let total = clamp_total(first.total_hint, limits.max_results);
    let pages = page_count(total, limits.page_size);
    tracing::info!(
        target: "poll",
        query = %task.query,
        location = %task.location,
        total,
        pages,
        "first page fetched"
    );

    let mut batch = ResultBatch::new();
    merge_page(&mut batch, first);

    if pages > 1 {
        let t0 = std::time::Instant::now();
        let mut results = stream::iter(remaining_offsets(total, limits.page_size))
            .map(|offset| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                match fetcher.fetch_page(task, offset).await {
                    Ok(page) => Some(page),
                    Err(e) => {
                        tracing::warn!(
                            target: "poll",
                            source = fetcher.name(),
                            query = %task.query,
                            location = %task.location,
                            offset,
                            error = ?e,
                            "page fetch failed, contributing nothing"
                        );
                        counter!("watch_page_errors_total").increment(1);
                        None
                    }
                }
            })
            .buffer_unordered(limits.fetch_concurrency);

        while let Some(page) = results.next().await {
            if cancel.is_cancelled() {
                return Ok(PollOutcome::Aborted);
            }
            if let Some(page) = page {
                merge_page(&mut batch, page);
            }
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("watch_poll_duration_ms").record(ms);
        tracing::info!(
            target: "poll",
            query = %task.query,
            location = %task.location,
            elapsed_ms = ms,
            "page sweep complete"
        );
    }

    if cancel.is_cancelled() {
        return Ok(PollOutcome::Aborted);
    }

    Ok(PollOutcome::Completed {
        batch,
        total_available: total,
    })
}
