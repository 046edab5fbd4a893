// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::task::SearchTask;

const ENV_PATH: &str = "WATCH_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/watch.toml";

/// Page-sweep limits handed to the poll cycle.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FetchLimits {
    /// Results per page as served by the source.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Hard cap applied to the source's total-count hint. The source itself
    /// stops serving past 1000 results per search.
    #[serde(default = "default_max_results")]
    pub max_results: u64,
    /// Fan-out ceiling for pages 1..N of one cycle.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_results: default_max_results(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

fn default_page_size() -> u64 {
    10
}
fn default_max_results() -> u64 {
    1000
}
fn default_fetch_concurrency() -> usize {
    5
}
fn default_poll_interval() -> u64 {
    3
}
fn default_stagger() -> u64 {
    5
}
fn default_listen_addr() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// The fixed set of searches to watch.
    pub tasks: Vec<SearchTask>,
    /// Cooldown between polls of the same task.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u64,
    /// Pause between evaluating successive tasks.
    #[serde(default = "default_stagger")]
    pub stagger_minutes: u64,
    #[serde(default)]
    pub limits: FetchLimits,
    /// JSON search endpoint the page fetcher talks to.
    pub search_url: String,
    /// Search radius in miles, forwarded to the source when set.
    #[serde(default)]
    pub search_radius: Option<u32>,
    /// When set, each discovery batch also lands as a JSON report file here.
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
    /// Alert webhook; when absent, discoveries only reach the log.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Redis for durable state; when absent, state is in-memory only.
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl WatchConfig {
    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading watch config from {}", path.display()))?;
        let cfg: WatchConfig = toml::from_str(&content)
            .with_context(|| format!("parsing watch config {}", path.display()))?;
        cfg.validate()
    }

    /// Load using env var + fallback:
    /// 1) $WATCH_CONFIG_PATH
    /// 2) config/watch.toml
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("WATCH_CONFIG_PATH points to non-existent path"));
        }
        Self::load_from(Path::new(DEFAULT_PATH))
    }

    fn validate(self) -> Result<Self> {
        if self.tasks.is_empty() {
            return Err(anyhow!("watch config needs at least one task"));
        }
        if self.limits.page_size == 0 {
            return Err(anyhow!("page_size must be positive"));
        }
        if self.limits.fetch_concurrency == 0 {
            return Err(anyhow!("fetch_concurrency must be positive"));
        }
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes * 60)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_secs(self.stagger_minutes * 60)
    }
}
