use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{NotificationEvent, NotificationSink};

/// Discord-compatible webhook sink with a per-request timeout and bounded
/// exponential retries. After the retries are spent the failure is the
/// caller's to log; the event is not queued anywhere.
pub struct WebhookSink {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl WebhookSink {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    fn describe(ev: &NotificationEvent) -> String {
        let mut lines: Vec<String> = ev
            .report
            .iter()
            .take(10)
            .map(|entry| {
                let title = entry
                    .fields
                    .get("displayTitle")
                    .or_else(|| entry.fields.get("title"))
                    .and_then(|v| v.as_str())
                    .unwrap_or(entry.key.as_str());
                let company = entry
                    .fields
                    .get("company")
                    .and_then(|v| v.as_str())
                    .unwrap_or("—");
                format!("• {title} ({company})")
            })
            .collect();
        if ev.new_keys.len() > lines.len() {
            lines.push(format!("… and {} more", ev.new_keys.len() - lines.len()));
        }

        format!(
            "**{} new listings**\n{}\n**Time (UTC):** {}",
            ev.new_keys.len(),
            lines.join("\n"),
            ev.ts.to_rfc3339()
        )
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let title = format!("New listings: {}", ev.task);
        let payload = WebhookPayload::embed(&title, &Self::describe(ev));

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("webhook request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[derive(Serialize)]
struct WebhookEmbed {
    title: String,
    description: String,
}

#[derive(Serialize)]
struct WebhookPayload {
    content: Option<String>,
    embeds: Vec<WebhookEmbed>,
}

impl WebhookPayload {
    fn embed(title: &str, description: &str) -> Self {
        Self {
            content: None,
            embeds: vec![WebhookEmbed {
                title: title.to_string(),
                description: description.to_string(),
            }],
        }
    }
}
