// src/report.rs
use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tokio::fs;

use crate::fetch::Listing;
use crate::poll::ResultBatch;
use crate::task::SearchTask;

/// Attributes lifted out of a raw listing for human-facing alert bodies.
/// Everything else stays behind in the opaque record.
const REPORTED_FIELDS: &[&str] = &[
    "company",
    "companyRating",
    "createDate",
    "displayTitle",
    "formattedLocation",
    "formattedRelativeTime",
    "link",
    "pubDate",
    "remoteWorkModel",
    "salarySnippet",
    "title",
];

/// Epoch-millis attributes that get a readable mirror next to the raw value.
const DATE_MIRRORS: &[(&str, &str)] = &[
    ("createDate", "formattedCreateDate"),
    ("pubDate", "formattedPubDate"),
];

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub key: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

/// Compact report for the newly discovered keys, sorted by key so the
/// output is stable regardless of page-arrival order.
pub fn build_report(batch: &ResultBatch, new_keys: &HashSet<String>) -> Vec<ReportEntry> {
    let mut keys: Vec<&String> = new_keys.iter().collect();
    keys.sort();
    keys.into_iter()
        .filter_map(|key| batch.get(key))
        .map(entry_for)
        .collect()
}

fn entry_for(listing: &Listing) -> ReportEntry {
    let mut fields = serde_json::Map::new();
    for name in REPORTED_FIELDS {
        if let Some(value) = listing.extra.get(*name) {
            fields.insert((*name).to_string(), value.clone());
        }
    }

    for (raw, formatted) in DATE_MIRRORS {
        if let Some(ms) = listing.extra.get(*raw).and_then(Value::as_i64) {
            if let Some(dt) = chrono::DateTime::from_timestamp_millis(ms) {
                fields.insert(
                    (*formatted).to_string(),
                    Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
                );
            }
        }
    }

    ReportEntry {
        key: listing.key.clone(),
        fields,
    }
}

/// Drops the report as pretty JSON under `dir`, one file per task,
/// overwritten on every notifying cycle. Failures are logged, never fatal.
pub async fn archive_report(dir: &Path, task: &SearchTask, report: &[ReportEntry]) {
    if let Err(e) = fs::create_dir_all(dir).await {
        tracing::warn!(target: "report", dir = %dir.display(), error = ?e, "archive dir");
        return;
    }
    let path = dir.join(format!("{}_report.json", task.key_suffix()));
    let body = serde_json::to_vec_pretty(report).unwrap_or_default();
    if let Err(e) = fs::write(&path, body).await {
        tracing::warn!(target: "report", path = %path.display(), error = ?e, "write report");
    }
}
