//! Server dependencies shared by services and request paths.

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;
use crate::domains::game::{GameConfig, GameService};
use crate::domains::leaderboard::Leaderboard;
use crate::domains::social::FollowService;
use crate::kernel::{BroadcastPublisher, HotStore, LogOnlyBroadcast, NatsBroadcast};

/// Services are built once here and cloned out, so every caller shares the
/// same loaded scripts.
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub hot: HotStore,
    pub broadcast: Arc<dyn BroadcastPublisher>,
    game: GameService,
    social: FollowService,
}

impl ServerDeps {
    pub fn new(
        db_pool: PgPool,
        hot: HotStore,
        broadcast: Arc<dyn BroadcastPublisher>,
        game_config: GameConfig,
    ) -> Self {
        let game = GameService::new(hot.clone(), Arc::new(game_config));
        let social = FollowService::new(hot.clone(), db_pool.clone());
        Self {
            db_pool,
            hot,
            broadcast,
            game,
            social,
        }
    }

    /// Connect the broadcast transport named by the config, falling back to
    /// log-only delivery when no NATS server is configured.
    pub async fn connect_broadcast(config: &Config) -> Result<Arc<dyn BroadcastPublisher>> {
        match &config.nats_url {
            Some(url) => {
                let client = async_nats::connect(url)
                    .await
                    .with_context(|| format!("Failed to connect to NATS at {}", url))?;
                tracing::info!(url = %url, "broadcasting over NATS");
                Ok(Arc::new(NatsBroadcast::new(client)))
            }
            None => {
                tracing::warn!("NATS_URL not set, broadcasts will only be logged");
                Ok(Arc::new(LogOnlyBroadcast))
            }
        }
    }

    pub fn game(&self) -> GameService {
        self.game.clone()
    }

    pub fn social(&self) -> FollowService {
        self.social.clone()
    }

    pub fn leaderboard(&self) -> Leaderboard {
        Leaderboard::new(self.hot.clone())
    }
}
