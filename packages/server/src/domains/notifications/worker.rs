//! Event fan-out worker.
//!
//! One loop blocking-pops every side-effect queue. Scripts push with LPUSH,
//! so popping from the right keeps each queue first-in first-out. A failing
//! event is logged and dropped: notifications are best-effort and never
//! requeued.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::activity::ActivityLog;
use super::events::{FanoutEvent, FanoutPlan};
use super::models::{ActivityEntry, Notification};
use crate::common::{datetime_from_millis, PlayerId};
use crate::config::FanoutSettings;
use crate::domains::game::models::{Player, PlayerState};
use crate::kernel::keys;
use crate::kernel::{publish_json, BroadcastPublisher, HotStore, Service};

pub struct FanoutWorker {
    hot: HotStore,
    pool: PgPool,
    broadcast: Arc<dyn BroadcastPublisher>,
    activity: ActivityLog,
    settings: FanoutSettings,
    retry_delay: Duration,
}

impl FanoutWorker {
    pub fn new(
        hot: HotStore,
        pool: PgPool,
        broadcast: Arc<dyn BroadcastPublisher>,
        activity: ActivityLog,
        settings: FanoutSettings,
        retry_delay: Duration,
    ) -> Self {
        Self {
            hot,
            pool,
            broadcast,
            activity,
            settings,
            retry_delay,
        }
    }

    /// Process one queued payload end to end.
    pub async fn handle(&self, queue: &str, payload: &str) -> Result<()> {
        let event = FanoutEvent::parse(queue, payload)?;
        let names = self.display_names(&event.participants()).await?;
        let plan = event.plan(&names);
        self.execute(plan).await?;

        debug!(kind = event.kind(), "Fan-out event handled");
        Ok(())
    }

    /// Drain every queue without blocking. Returns the number of events
    /// popped, handled or not.
    pub async fn drain_available(&self) -> Result<usize> {
        let mut con = self.hot.connection();
        let mut popped = 0;

        for queue in keys::FANOUT_QUEUES {
            loop {
                let payload: Option<String> = con.rpop(queue, None).await?;
                let Some(payload) = payload else {
                    break;
                };
                popped += 1;
                self.handle_logged(queue, &payload).await;
            }
        }
        Ok(popped)
    }

    async fn handle_logged(&self, queue: &str, payload: &str) {
        if let Err(e) = self.handle(queue, payload).await {
            error!(queue, error = %e, payload, "Fan-out handler failed, dropping event");
        }
    }

    async fn execute(&self, plan: FanoutPlan) -> Result<()> {
        for n in plan.notifications {
            Notification::create(n.player_id, n.kind, &n.message, n.data, &self.pool).await?;
        }

        for b in plan.broadcasts {
            if let Err(e) = publish_json(self.broadcast.as_ref(), b.subject.clone(), &b.body).await {
                warn!(subject = %b.subject, error = %e, "Broadcast publish failed");
            }
        }

        if let Some(a) = plan.activity {
            self.activity.record(ActivityEntry {
                player_id: a.player_id,
                target_id: a.target_id,
                action: a.action,
                detail: a.detail,
                created_at: datetime_from_millis(a.timestamp).unwrap_or_else(chrono::Utc::now),
            });
        }
        Ok(())
    }

    /// Names from the durable profile, falling back to Hot State for players
    /// not reconciled yet.
    async fn display_names(&self, ids: &[PlayerId]) -> Result<HashMap<PlayerId, String>> {
        let mut names = Player::find_names(ids, &self.pool).await?;

        let missing: Vec<PlayerId> = ids
            .iter()
            .filter(|id| !names.contains_key(*id))
            .copied()
            .collect();
        if missing.is_empty() {
            return Ok(names);
        }

        let player_keys: Vec<String> = missing.iter().map(|id| keys::player(*id)).collect();
        let hashes = self.hot.hashes(&player_keys).await?;
        for (id, hash) in missing.into_iter().zip(hashes.iter()) {
            if let Some(state) = PlayerState::from_hash(id, hash) {
                names.insert(id, state.name);
            }
        }
        Ok(names)
    }

    async fn pop(&self, con: &mut MultiplexedConnection) -> redis::RedisResult<Option<(String, String)>> {
        redis::cmd("BRPOP")
            .arg(&keys::FANOUT_QUEUES[..])
            .arg(self.settings.block_timeout.as_secs().max(1))
            .query_async(con)
            .await
    }
}

#[async_trait]
impl Service for FanoutWorker {
    fn name(&self) -> &'static str {
        "fanout"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(queues = keys::FANOUT_QUEUES.len(), "Fan-out worker started");

        let mut con: Option<MultiplexedConnection> = None;

        while !shutdown.is_cancelled() {
            if con.is_none() {
                match self.hot.dedicated_connection().await {
                    Ok(fresh) => con = Some(fresh),
                    Err(e) => {
                        error!(error = %e, "Fan-out worker could not connect");
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

            let popped = tokio::select! {
                _ = shutdown.cancelled() => break,
                popped = self.pop(active) => popped,
            };

            match popped {
                Ok(Some((queue, payload))) => self.handle_logged(&queue, &payload).await,
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "Fan-out dequeue failed");
                    con = None;
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        info!("Fan-out worker stopped");
        Ok(())
    }
}
