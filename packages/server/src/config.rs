use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    /// Broadcasts are only logged when no NATS server is configured
    pub nats_url: Option<String>,
    pub sync: SyncSettings,
    pub leaderboard: LeaderboardSettings,
    pub fanout: FanoutSettings,
    /// Pause applied by every background loop after a store failure
    pub store_retry_delay: Duration,
    pub social_resync_batch_size: i64,
}

/// Tuning for the dirty-set reconciliation worker
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub batch_size: usize,
    /// Sleep after a full batch (more work is likely pending)
    pub busy_delay: Duration,
    /// Sleep after a partial or empty batch
    pub idle_delay: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            busy_delay: Duration::from_millis(50),
            idle_delay: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LeaderboardSettings {
    pub interval: Duration,
    pub batch_size: usize,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FanoutSettings {
    /// How long one blocking dequeue waits before the loop re-checks shutdown
    pub block_timeout: Duration,
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self {
            block_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let sync_defaults = SyncSettings::default();
        let leaderboard_defaults = LeaderboardSettings::default();
        let fanout_defaults = FanoutSettings::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            nats_url: env::var("NATS_URL").ok().filter(|url| !url.is_empty()),
            sync: SyncSettings {
                batch_size: env_batch_size("SYNC_BATCH_SIZE", sync_defaults.batch_size)?,
                busy_delay: env_millis("SYNC_BUSY_DELAY_MS", sync_defaults.busy_delay)?,
                idle_delay: env_millis("SYNC_IDLE_DELAY_MS", sync_defaults.idle_delay)?,
            },
            leaderboard: LeaderboardSettings {
                interval: Duration::from_secs(env_or(
                    "LEADERBOARD_INTERVAL_SECS",
                    leaderboard_defaults.interval.as_secs(),
                )?),
                batch_size: env_batch_size(
                    "LEADERBOARD_BATCH_SIZE",
                    leaderboard_defaults.batch_size,
                )?,
            },
            fanout: FanoutSettings {
                block_timeout: Duration::from_secs(env_or(
                    "FANOUT_BLOCK_SECS",
                    fanout_defaults.block_timeout.as_secs(),
                )?),
            },
            store_retry_delay: env_millis("STORE_RETRY_DELAY_MS", Duration::from_millis(5000))?,
            social_resync_batch_size: env_batch_size("SOCIAL_RESYNC_BATCH_SIZE", 1000)?,
        })
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}

/// Like [`env_or`], but the value must be at least 1.
fn env_batch_size<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + From<u8>,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let size = env_or(name, default)?;
    anyhow::ensure!(size >= T::from(1), "{} must be at least 1", name);
    Ok(size)
}

fn env_millis(name: &str, default: Duration) -> Result<Duration> {
    let millis = env_or(name, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}
