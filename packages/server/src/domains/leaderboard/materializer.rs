//! Leaderboard materializer.
//!
//! On a fixed interval, drains the leaderboard dirty set in batches and
//! rewrites each player's score on the gold, level and activity boards. A
//! lost marker only delays a rank change.

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::reads::Board;
use crate::common::{now_millis, PlayerId};
use crate::config::LeaderboardSettings;
use crate::kernel::{keys, HotStore, Service};

pub struct LeaderboardMaterializer {
    hot: HotStore,
    settings: LeaderboardSettings,
}

impl LeaderboardMaterializer {
    pub fn new(hot: HotStore, settings: LeaderboardSettings) -> Self {
        Self { hot, settings }
    }

    /// Drain every pending marker. Returns how many players were ranked.
    pub async fn materialize(&self, now_ms: i64) -> Result<usize> {
        let mut ranked = 0;

        loop {
            let members = self
                .hot
                .pop_batch(keys::DIRTY_LEADERBOARD, self.settings.batch_size)
                .await?;
            if members.is_empty() {
                break;
            }

            let ids: Vec<PlayerId> = members
                .iter()
                .filter_map(|m| PlayerId::parse(m).ok())
                .collect();

            let mut read = redis::pipe();
            for id in &ids {
                read.cmd("HMGET").arg(keys::player(*id)).arg("gold").arg("level");
            }
            let mut con = self.hot.connection();
            let rows: Vec<(Option<i64>, Option<i64>)> = read.query_async(&mut con).await?;

            let mut write = redis::pipe();
            let mut batch = 0;
            for (id, (gold, level)) in ids.iter().zip(rows) {
                // Both absent: the player hash is gone.
                if gold.is_none() && level.is_none() {
                    continue;
                }
                let member = id.to_string();
                write
                    .zadd(Board::Gold.key(), &member, gold.unwrap_or(0))
                    .ignore()
                    .zadd(Board::Level.key(), &member, level.unwrap_or(1))
                    .ignore()
                    .zadd(Board::Active.key(), &member, now_ms)
                    .ignore();
                batch += 1;
            }

            if batch > 0 {
                let _: () = write.query_async(&mut con).await?;
            }
            ranked += batch;

            if members.len() < self.settings.batch_size {
                break;
            }
        }

        Ok(ranked)
    }
}

#[async_trait]
impl Service for LeaderboardMaterializer {
    fn name(&self) -> &'static str {
        "leaderboard"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            "leaderboard materializer starting"
        );

        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let started = std::time::Instant::now();
            match self.materialize(now_millis()).await {
                Ok(0) => {}
                Ok(count) => debug!(
                    count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "leaderboards updated"
                ),
                // Markers popped before the failure wait for the player's next mutation.
                Err(e) => error!(error = %e, "leaderboard materialization failed"),
            }
        }

        info!("leaderboard materializer stopped");
        Ok(())
    }
}
