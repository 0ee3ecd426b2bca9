// Main entry point for the farm state services

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use farm_core::domains::game::GameConfig;
use farm_core::domains::leaderboard::LeaderboardMaterializer;
use farm_core::domains::notifications::{activity_log, FanoutWorker};
use farm_core::domains::social::{resync_social_graph, ResyncOutcome, SocialEdgeSync};
use farm_core::domains::sync::ReconciliationWorker;
use farm_core::kernel::{HotStore, ServerDeps, ServiceHost};
use farm_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "farm-server")]
#[command(about = "Hot state reconciliation, leaderboards, fan-out and social graph services")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run background services until Ctrl-C or SIGTERM
    Run {
        /// Only start these services (repeatable). Defaults to all.
        #[arg(long, value_enum)]
        only: Vec<ServiceKind>,
    },

    /// Load the durable follow graph into the hot store
    ResyncSocial {
        /// Ignore the already-synced sentinel
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ServiceKind {
    Reconciliation,
    Leaderboard,
    Fanout,
    SocialEdgeSync,
}

impl ServiceKind {
    const ALL: [ServiceKind; 4] = [
        ServiceKind::Reconciliation,
        ServiceKind::Leaderboard,
        ServiceKind::Fanout,
        ServiceKind::SocialEdgeSync,
    ];
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,farm_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Connect to hot store
    let hot = HotStore::connect(&config.redis_url).await?;
    hot.ping().await.context("Hot store did not answer PING")?;
    tracing::info!("Hot store connected");

    match cli.command {
        Commands::ResyncSocial { force } => {
            resync(&hot, &pool, &config, force).await?;
        }
        Commands::Run { only } => {
            resync(&hot, &pool, &config, false).await?;

            let broadcast = ServerDeps::connect_broadcast(&config).await?;
            let deps = ServerDeps::new(pool, hot, broadcast, GameConfig::default());
            let selected: Vec<ServiceKind> = ServiceKind::ALL
                .into_iter()
                .filter(|kind| only.is_empty() || only.contains(kind))
                .collect();

            build_host(&deps, &config, &selected)
                .run_until_shutdown()
                .await?;
        }
    }

    Ok(())
}

async fn resync(hot: &HotStore, pool: &sqlx::PgPool, config: &Config, force: bool) -> Result<()> {
    match resync_social_graph(hot, pool, config.social_resync_batch_size, force)
        .await
        .context("Social graph resync failed")?
    {
        ResyncOutcome::Skipped => {}
        ResyncOutcome::Loaded { edges } => tracing::info!(edges, "Social graph loaded"),
    }
    Ok(())
}

fn build_host(deps: &ServerDeps, config: &Config, selected: &[ServiceKind]) -> ServiceHost {
    let mut host = ServiceHost::new();

    for kind in selected {
        host = match kind {
            ServiceKind::Reconciliation => host.with_service(ReconciliationWorker::new(
                deps.hot.clone(),
                deps.db_pool.clone(),
                config.sync.clone(),
                config.store_retry_delay,
            )),
            ServiceKind::Leaderboard => host.with_service(LeaderboardMaterializer::new(
                deps.hot.clone(),
                config.leaderboard.clone(),
            )),
            ServiceKind::Fanout => {
                let (activity, writer) = activity_log(deps.db_pool.clone());
                host.with_service(writer).with_service(FanoutWorker::new(
                    deps.hot.clone(),
                    deps.db_pool.clone(),
                    deps.broadcast.clone(),
                    activity,
                    config.fanout.clone(),
                    config.store_retry_delay,
                ))
            }
            ServiceKind::SocialEdgeSync => host.with_service(SocialEdgeSync::new(
                deps.hot.clone(),
                deps.db_pool.clone(),
                "farm-server",
                config.fanout.block_timeout,
                config.store_retry_delay,
            )),
        };
    }

    tracing::info!(services = host.len(), "Services registered");
    host
}
