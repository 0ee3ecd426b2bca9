//! Durable persistence of follow-graph changes.
//!
//! Consumes `social:events` through a consumer group. An entry is acked only
//! after its edge is written to Postgres and the event is queued for fan-out,
//! so a crash between the two replays the entry from the pending list on
//! restart. Both writes are idempotent.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisResult};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{SocialAction, SocialEvent};
use super::models::Follow;
use crate::common::datetime_from_millis;
use crate::kernel::keys;
use crate::kernel::{HotStore, Service};

const READ_COUNT: usize = 100;

pub struct SocialEdgeSync {
    hot: HotStore,
    pool: PgPool,
    consumer: String,
    block_timeout: Duration,
    retry_delay: Duration,
}

impl SocialEdgeSync {
    pub fn new(
        hot: HotStore,
        pool: PgPool,
        consumer: impl Into<String>,
        block_timeout: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            hot,
            pool,
            consumer: consumer.into(),
            block_timeout,
            retry_delay,
        }
    }

    /// Create the consumer group at the start of the stream. An existing
    /// group is left untouched.
    pub async fn ensure_group(&self, con: &mut MultiplexedConnection) -> RedisResult<()> {
        let created: RedisResult<()> = con
            .xgroup_create_mkstream(keys::SOCIAL_EVENTS, keys::SOCIAL_EDGE_GROUP, "0")
            .await;
        match created {
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            other => other,
        }
    }

    /// Persist everything currently in the stream without blocking: this
    /// consumer's pending entries first, then undelivered ones.
    pub async fn sync_available(&self) -> Result<usize> {
        let mut con = self.hot.dedicated_connection().await?;
        self.ensure_group(&mut con).await?;

        let mut applied = 0;
        for id in ["0", ">"] {
            loop {
                let entries = self.read(&mut con, id, None).await?;
                if entries.is_empty() {
                    break;
                }
                applied += self.apply_batch(&mut con, entries).await?;
            }
        }
        Ok(applied)
    }

    async fn read(
        &self,
        con: &mut MultiplexedConnection,
        id: &str,
        block: Option<Duration>,
    ) -> RedisResult<Vec<StreamId>> {
        let mut opts = StreamReadOptions::default()
            .group(keys::SOCIAL_EDGE_GROUP, &self.consumer)
            .count(READ_COUNT);
        if let Some(block) = block {
            opts = opts.block(block.as_millis() as usize);
        }

        let reply: Option<StreamReadReply> = con
            .xread_options(&[keys::SOCIAL_EVENTS], &[id], &opts)
            .await?;
        Ok(reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default())
    }

    /// Apply entries in stream order. Stops at the first failure so later
    /// changes to the same edge are never persisted ahead of earlier ones.
    async fn apply_batch(
        &self,
        con: &mut MultiplexedConnection,
        entries: Vec<StreamId>,
    ) -> Result<usize> {
        let mut applied = 0;

        for entry in entries {
            let fields: HashMap<String, String> = entry
                .map
                .iter()
                .filter_map(|(k, v)| {
                    redis::from_redis_value::<String>(v)
                        .ok()
                        .map(|v| (k.clone(), v))
                })
                .collect();

            match SocialEvent::from_fields(&fields) {
                Ok(event) => {
                    self.apply(&event).await?;
                    applied += 1;
                }
                Err(e) => {
                    warn!(entry_id = %entry.id, error = %e, "Dropping malformed social event");
                }
            }

            let _: i64 = con
                .xack(keys::SOCIAL_EVENTS, keys::SOCIAL_EDGE_GROUP, &[&entry.id])
                .await?;
        }

        Ok(applied)
    }

    async fn apply(&self, event: &SocialEvent) -> Result<()> {
        match event.action {
            SocialAction::Follow => {
                let created_at = datetime_from_millis(event.timestamp).unwrap_or_else(Utc::now);
                Follow::upsert(event.follower_id, event.following_id, created_at, &self.pool)
                    .await?;
            }
            SocialAction::Unfollow => {
                Follow::delete(event.follower_id, event.following_id, &self.pool).await?;
            }
        }

        let payload = serde_json::to_string(event)?;
        let mut con = self.hot.connection();
        let _: () = con.lpush(keys::QUEUE_SOCIAL, payload).await?;

        debug!(
            action = event.action.as_str(),
            follower = %event.follower_id,
            following = %event.following_id,
            "Persisted social edge"
        );
        Ok(())
    }

    async fn connect(&self) -> Result<MultiplexedConnection> {
        let mut con = self.hot.dedicated_connection().await?;
        self.ensure_group(&mut con).await?;
        Ok(con)
    }
}

#[async_trait]
impl Service for SocialEdgeSync {
    fn name(&self) -> &'static str {
        "social-edge-sync"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(consumer = %self.consumer, "Social edge sync started");

        let mut con: Option<MultiplexedConnection> = None;
        let mut pending = true;

        while !shutdown.is_cancelled() {
            if con.is_none() {
                match self.connect().await {
                    Ok(fresh) => con = Some(fresh),
                    Err(e) => {
                        warn!(error = %e, "Social edge sync could not connect");
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(self.retry_delay) => continue,
                        }
                    }
                }
            }
            let Some(active) = con.as_mut() else {
                continue;
            };

            let (id, block) = if pending {
                ("0", None)
            } else {
                (">", Some(self.block_timeout))
            };

            let read = tokio::select! {
                _ = shutdown.cancelled() => break,
                read = self.read(active, id, block) => read,
            };

            let failed = match read {
                Ok(entries) if entries.is_empty() => {
                    pending = false;
                    false
                }
                Ok(entries) => match self.apply_batch(active, entries).await {
                    Ok(_) => false,
                    Err(e) => {
                        warn!(error = %e, "Social edge batch failed, will replay pending entries");
                        true
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Social stream read failed");
                    con = None;
                    true
                }
            };

            if failed {
                pending = true;
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }

        info!("Social edge sync stopped");
        Ok(())
    }
}
