//! Reconciliation worker.
//!
//! Each cycle pops up to `batch_size` markers from both dirty sets, reads the
//! current Hot State records and upserts them. A record that fails to persist
//! is logged and dropped; its next mutation marks it dirty again, so Hot State
//! stays authoritative while Postgres lags behind by at most a few cycles.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::PlayerId;
use crate::config::SyncSettings;
use crate::domains::game::models::{Player, PlayerState, Plot, PlotState};
use crate::kernel::{keys, HotStore, Service};

/// What one cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub players: usize,
    pub plots: usize,
    pub failed: usize,
    /// At least one set yielded a full batch, so more work is likely pending.
    pub full: bool,
}

pub struct ReconciliationWorker {
    hot: HotStore,
    pool: PgPool,
    settings: SyncSettings,
    retry_delay: Duration,
}

impl ReconciliationWorker {
    pub fn new(hot: HotStore, pool: PgPool, settings: SyncSettings, retry_delay: Duration) -> Self {
        Self {
            hot,
            pool,
            settings,
            retry_delay,
        }
    }

    /// Drain one batch from each dirty set. Players go first so a plot row
    /// never lands before its owner's row.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        let player_ids = self
            .hot
            .pop_batch(keys::DIRTY_PLAYERS, self.settings.batch_size)
            .await?;
        report.full |= player_ids.len() >= self.settings.batch_size;
        self.sync_players(&player_ids, &mut report).await?;

        let plot_members = self
            .hot
            .pop_batch(keys::DIRTY_PLOTS, self.settings.batch_size)
            .await?;
        report.full |= plot_members.len() >= self.settings.batch_size;
        self.sync_plots(&plot_members, &mut report).await?;

        Ok(report)
    }

    async fn sync_players(&self, members: &[String], report: &mut CycleReport) -> Result<()> {
        let ids: Vec<PlayerId> = members
            .iter()
            .filter_map(|m| match PlayerId::parse(m) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(member = %m, "dropping malformed dirty player marker");
                    None
                }
            })
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        let player_keys: Vec<String> = ids.iter().map(|id| keys::player(*id)).collect();
        let hashes = match self.hot.hashes(&player_keys).await {
            Ok(hashes) => hashes,
            Err(e) => {
                self.restore(keys::DIRTY_PLAYERS, members).await;
                return Err(e.into());
            }
        };

        for (id, hash) in ids.iter().zip(hashes.iter()) {
            let Some(state) = PlayerState::from_hash(*id, hash) else {
                debug!(player_id = %id, "dirty player has no hot record");
                continue;
            };

            match Player::upsert_state(&state, &self.pool).await {
                Ok(()) => report.players += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(player_id = %id, error = %e, "failed to persist player");
                }
            }
        }
        Ok(())
    }

    async fn sync_plots(&self, members: &[String], report: &mut CycleReport) -> Result<()> {
        let plots: Vec<(PlayerId, u32)> = members
            .iter()
            .filter_map(|m| {
                let parsed = keys::parse_plot_member(m);
                if parsed.is_none() {
                    warn!(member = %m, "dropping malformed dirty plot marker");
                }
                parsed
            })
            .collect();
        if plots.is_empty() {
            return Ok(());
        }

        let plot_keys: Vec<String> = plots.iter().map(|(id, pos)| keys::plot(*id, *pos)).collect();
        let hashes = match self.hot.hashes(&plot_keys).await {
            Ok(hashes) => hashes,
            Err(e) => {
                self.restore(keys::DIRTY_PLOTS, members).await;
                return Err(e.into());
            }
        };

        for ((id, position), hash) in plots.iter().zip(hashes.iter()) {
            let Some(state) = PlotState::from_hash(*id, *position, hash) else {
                debug!(player_id = %id, position, "dirty plot has no hot record");
                continue;
            };

            match Plot::upsert_state(&state, &self.pool).await {
                Ok(()) => report.plots += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(player_id = %id, position, error = %e, "failed to persist plot");
                }
            }
        }
        Ok(())
    }

    /// Put popped markers back after a failed read so the records are not
    /// forgotten until their next mutation.
    async fn restore(&self, set: &str, members: &[String]) {
        if members.is_empty() {
            return;
        }
        let mut con = self.hot.connection();
        let result: redis::RedisResult<i64> = redis::cmd("SADD")
            .arg(set)
            .arg(members)
            .query_async(&mut con)
            .await;
        if let Err(e) = result {
            warn!(set, count = members.len(), error = %e, "could not restore dirty markers");
        }
    }
}

#[async_trait]
impl Service for ReconciliationWorker {
    fn name(&self) -> &'static str {
        "reconciliation"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(
            batch_size = self.settings.batch_size,
            "reconciliation worker starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let delay = match self.run_cycle().await {
                Ok(report) => {
                    if report.players + report.plots + report.failed > 0 {
                        debug!(
                            players = report.players,
                            plots = report.plots,
                            failed = report.failed,
                            "reconciled batch"
                        );
                    }
                    if report.full {
                        self.settings.busy_delay
                    } else {
                        self.settings.idle_delay
                    }
                }
                Err(e) => {
                    error!(error = %e, "reconciliation cycle failed");
                    self.retry_delay
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("reconciliation worker stopped");
        Ok(())
    }
}
