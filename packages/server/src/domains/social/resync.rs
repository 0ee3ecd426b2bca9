use anyhow::Result;
use redis::AsyncCommands;
use sqlx::PgPool;
use tracing::info;

use super::models::Follow;
use crate::common::now_millis;
use crate::kernel::keys;
use crate::kernel::HotStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// The sentinel was already present and no force was requested.
    Skipped,
    Loaded { edges: u64 },
}

/// Load every durable follow edge into Hot State.
///
/// Runs once per Hot State lifetime: the `social:synced` sentinel is written
/// only after the last page lands, so an interrupted load is retried on the
/// next start. ZADD is idempotent, so a forced rerun over warm relations only
/// refreshes scores.
pub async fn resync_social_graph(
    hot: &HotStore,
    pool: &PgPool,
    batch_size: i64,
    force: bool,
) -> Result<ResyncOutcome> {
    let mut con = hot.connection();

    if !force {
        let synced: bool = con.exists(keys::SOCIAL_SYNCED).await?;
        if synced {
            info!("Social graph already loaded, skipping resync");
            return Ok(ResyncOutcome::Skipped);
        }
    }

    let batch_size = batch_size.max(1);
    let mut cursor = None;
    let mut edges = 0u64;

    loop {
        let page = Follow::find_page(cursor, batch_size, pool).await?;
        let Some(last) = page.last() else {
            break;
        };
        cursor = Some(last.cursor());

        let mut pipe = redis::pipe();
        for edge in &page {
            let score = edge.created_at.timestamp_millis();
            pipe.zadd(keys::following(edge.follower_id), edge.following_id.to_string(), score)
                .ignore()
                .zadd(keys::followers(edge.following_id), edge.follower_id.to_string(), score)
                .ignore();
        }
        let _: () = pipe.query_async(&mut con).await?;

        edges += page.len() as u64;
        if (page.len() as i64) < batch_size {
            break;
        }
    }

    let _: () = con.set(keys::SOCIAL_SYNCED, now_millis()).await?;
    info!(edges, "Social graph resynced from database");
    Ok(ResyncOutcome::Loaded { edges })
}
