// src/fetch/mod.rs
pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::task::SearchTask;

/// One discovered posting. `key` is the source's stable unique identifier;
/// every other attribute rides along opaquely for reporting and is never
/// touched by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "jobkey")]
    pub key: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Listing {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// One page of search results plus the source's total-count hint. The hint
/// comes from page 0 and drives how many further pages get requested.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub listings: Vec<Listing>,
    pub total_hint: u64,
}

/// Capability to fetch one page of a search at a result offset.
/// Implementations must be safe to call concurrently for different offsets
/// of the same task; a failed call must not corrupt the others.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, task: &SearchTask, offset: u64) -> Result<FetchedPage>;
    fn name(&self) -> &'static str;
}
