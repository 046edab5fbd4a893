use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};

use super::{key_acknowledged, key_last_poll, key_seen, StateStore};
use crate::task::SearchTask;

/// Redis-backed store. The stamp and the flag live as plain string values,
/// the seen keys as a Redis SET so the union write is one SADD.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn connect(url: &str) -> Result<Self> {
        let cfg = Config::from_url(url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .context("creating redis pool")?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn last_poll(&self, task: &SearchTask) -> Result<Option<u64>> {
        let mut conn = self.pool.get().await.context("redis connection")?;
        let value: Option<u64> = conn
            .get(key_last_poll(task))
            .await
            .context("GET last_poll")?;
        Ok(value)
    }

    async fn set_last_poll(&self, task: &SearchTask, unix: u64) -> Result<()> {
        let mut conn = self.pool.get().await.context("redis connection")?;
        let _: () = conn
            .set(key_last_poll(task), unix)
            .await
            .context("SET last_poll")?;
        Ok(())
    }

    async fn acknowledged(&self, task: &SearchTask) -> Result<bool> {
        let mut conn = self.pool.get().await.context("redis connection")?;
        let value: Option<u8> = conn
            .get(key_acknowledged(task))
            .await
            .context("GET acknowledged")?;
        Ok(value.map(|v| v != 0).unwrap_or(true))
    }

    async fn set_acknowledged(&self, task: &SearchTask, value: bool) -> Result<()> {
        let mut conn = self.pool.get().await.context("redis connection")?;
        let _: () = conn
            .set(key_acknowledged(task), u8::from(value))
            .await
            .context("SET acknowledged")?;
        Ok(())
    }

    async fn seen_keys(&self, task: &SearchTask) -> Result<HashSet<String>> {
        let mut conn = self.pool.get().await.context("redis connection")?;
        let members: Vec<String> = conn
            .smembers(key_seen(task))
            .await
            .context("SMEMBERS seen")?;
        Ok(members.into_iter().collect())
    }

    async fn add_seen_keys(&self, task: &SearchTask, keys: &HashSet<String>) -> Result<()> {
        // SADD rejects an empty member list; the union with nothing is a no-op.
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await.context("redis connection")?;
        let members: Vec<&str> = keys.iter().map(String::as_str).collect();
        let _: () = conn
            .sadd(key_seen(task), members)
            .await
            .context("SADD seen")?;
        Ok(())
    }
}
