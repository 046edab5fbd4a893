use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use super::{FetchedPage, Listing, PageFetcher};
use crate::task::SearchTask;

/// Wire shape of one search page. The total hint is spread over per-tier
/// summaries and has to be summed.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Listing>,
    #[serde(default)]
    meta: Vec<TierSummary>,
}

#[derive(Debug, Deserialize)]
struct TierSummary {
    #[serde(rename = "jobCount")]
    job_count: u64,
}

/// Fetches search pages from a JSON endpoint, or replays a canned body for
/// tests.
pub struct HttpPageFetcher {
    mode: Mode,
    radius: Option<u32>,
}

enum Mode {
    Http {
        base_url: String,
        client: reqwest::Client,
    },
    Fixture(String),
}

impl HttpPageFetcher {
    pub fn from_url(base_url: String) -> Self {
        Self {
            mode: Mode::Http {
                base_url,
                client: reqwest::Client::new(),
            },
            radius: None,
        }
    }

    /// Search radius in miles. The source only accepts it on paginated
    /// requests, so page 0 goes out without it.
    pub fn with_radius(mut self, radius: Option<u32>) -> Self {
        self.radius = radius;
        self
    }

    /// Replays the same body for every offset; parsing still runs for real.
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
            radius: None,
        }
    }

    fn parse_body(body: &str) -> Result<FetchedPage> {
        let t0 = std::time::Instant::now();
        let parsed: SearchResponse =
            serde_json::from_str(body).context("parsing search response json")?;
        let total_hint = parsed.meta.iter().map(|t| t.job_count).sum();
        let page = FetchedPage {
            listings: parsed.results,
            total_hint,
        };

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("watch_parse_ms").record(ms);
        counter!("watch_listings_total").increment(page.listings.len() as u64);
        Ok(page)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, task: &SearchTask, offset: u64) -> Result<FetchedPage> {
        match &self.mode {
            Mode::Fixture(body) => Self::parse_body(body),

            Mode::Http { base_url, client } => {
                let mut params: Vec<(&str, String)> = vec![
                    ("q", task.query.clone()),
                    ("l", task.location.clone()),
                    ("sort", "date".to_string()),
                ];
                if offset > 0 {
                    if let Some(radius) = self.radius {
                        params.push(("radius", radius.to_string()));
                    }
                    params.push(("start", offset.to_string()));
                }

                let resp = match client.get(base_url.as_str()).query(&params).send().await {
                    Ok(resp) => resp,
                    Err(e) => {
                        tracing::warn!(
                            target: "fetch",
                            query = %task.query,
                            location = %task.location,
                            offset,
                            error = ?e,
                            "search page request failed"
                        );
                        counter!("watch_fetch_errors_total").increment(1);
                        return Err(e).context("search page request");
                    }
                };
                let body = resp
                    .error_for_status()
                    .context("search page status")?
                    .text()
                    .await
                    .context("search page body")?;
                Self::parse_body(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
