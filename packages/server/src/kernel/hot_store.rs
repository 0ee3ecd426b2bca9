//! Hot State store connection.
//!
//! Request paths and the non-blocking workers share one auto-reconnecting
//! [`ConnectionManager`]. Blocking reads (`BRPOP`, `XREADGROUP BLOCK`) stall
//! every command queued behind them on a multiplexed connection, so workers
//! that block take a [`HotStore::dedicated_connection`] of their own.

use std::collections::HashMap;

use anyhow::{Context, Result};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{AsyncCommands, RedisResult};

#[derive(Clone)]
pub struct HotStore {
    client: redis::Client,
    manager: ConnectionManager,
}

impl HotStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid REDIS_URL")?;
        let manager = ConnectionManager::new(client.clone())
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { client, manager })
    }

    /// Shared connection handle. Cloning is cheap.
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// A fresh connection for a single worker that issues blocking commands.
    pub async fn dedicated_connection(&self) -> RedisResult<MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut con = self.connection();
        let _: String = redis::cmd("PING").query_async(&mut con).await?;
        Ok(())
    }

    /// Destructively pop up to `count` members from an unordered set.
    pub async fn pop_batch(&self, set: &str, count: usize) -> RedisResult<Vec<String>> {
        let mut con = self.connection();
        let members: Vec<String> = redis::cmd("SPOP")
            .arg(set)
            .arg(count)
            .query_async(&mut con)
            .await?;
        Ok(members)
    }

    pub async fn hash(&self, key: &str) -> RedisResult<HashMap<String, String>> {
        let mut con = self.connection();
        con.hgetall(key).await
    }

    /// Read several hashes in one round trip. Missing keys come back empty.
    pub async fn hashes(&self, keys: &[String]) -> RedisResult<Vec<HashMap<String, String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for key in keys {
            pipe.hgetall(key);
        }

        let mut con = self.connection();
        pipe.query_async(&mut con).await
    }
}
