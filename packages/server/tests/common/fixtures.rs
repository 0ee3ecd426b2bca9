//! Test fixtures for creating test data.
//!
//! Players are created through the registration script so every fixture
//! starts from the same state gameplay does. Direct hash writes are only used
//! to skip grinding (gold, care needs).

use anyhow::Result;
use farm_core::common::{now_millis, PlayerId};
use farm_core::kernel::keys;
use redis::AsyncCommands;

use super::TestHarness;

/// Register a fresh player and return their id.
pub async fn register_player(ctx: &TestHarness, name: &str) -> Result<PlayerId> {
    let id = PlayerId::new();
    ctx.game().register_player(id, name).await?;
    Ok(id)
}

/// Register a player and plant `crop_id` at `position`, planted one full
/// growth period ago so it is mature at `now_millis()`.
pub async fn player_with_mature_crop(
    ctx: &TestHarness,
    name: &str,
    position: u32,
    crop_id: &str,
) -> Result<PlayerId> {
    let id = register_player(ctx, name).await?;
    let mature_secs = ctx
        .game()
        .config()
        .crop(crop_id)
        .map(|c| c.mature_secs)
        .unwrap_or(0);
    ctx.game()
        .plant(id, position, crop_id, now_millis() - mature_secs * 1000 - 1)
        .await?;
    Ok(id)
}

pub async fn set_gold(ctx: &TestHarness, id: PlayerId, gold: i64) -> Result<()> {
    let mut con = ctx.redis();
    let _: () = con.hset(keys::player(id), "gold", gold).await?;
    Ok(())
}

pub async fn set_plot_flag(
    ctx: &TestHarness,
    id: PlayerId,
    position: u32,
    field: &str,
    value: bool,
) -> Result<()> {
    let mut con = ctx.redis();
    let _: () = con
        .hset(keys::plot(id, position), field, value.to_string())
        .await?;
    Ok(())
}

/// Remove every dirty marker belonging to `id` so a test can observe
/// whether an action re-marks it.
pub async fn clear_dirty_marks(ctx: &TestHarness, id: PlayerId, positions: u32) -> Result<()> {
    let mut con = ctx.redis();
    let plot_members: Vec<String> = (0..positions).map(|p| keys::plot_member(id, p)).collect();
    let _: () = redis::pipe()
        .srem(keys::DIRTY_PLAYERS, id.to_string())
        .ignore()
        .srem(keys::DIRTY_LEADERBOARD, id.to_string())
        .ignore()
        .srem(keys::DIRTY_PLOTS, plot_members)
        .ignore()
        .query_async(&mut con)
        .await?;
    Ok(())
}

pub async fn is_member(ctx: &TestHarness, set: &str, member: &str) -> Result<bool> {
    let mut con = ctx.redis();
    Ok(con.sismember(set, member).await?)
}
