//! Integration tests for the dirty-set reconciliation worker.

mod common;

use std::time::Duration;

use crate::common::*;
use farm_core::common::{now_millis, PlayerId};
use farm_core::domains::game::models::{Player, Plot};
use farm_core::domains::sync::ReconciliationWorker;
use farm_core::kernel::{keys, Service};
use farm_core::SyncSettings;
use redis::AsyncCommands;
use test_context::test_context;
use tokio_util::sync::CancellationToken;

fn worker(ctx: &TestHarness, batch_size: usize) -> ReconciliationWorker {
    ReconciliationWorker::new(
        ctx.hot.clone(),
        ctx.db_pool.clone(),
        SyncSettings {
            batch_size,
            busy_delay: Duration::from_millis(10),
            idle_delay: Duration::from_millis(50),
        },
        Duration::from_millis(100),
    )
}

/// Run cycles until both dirty sets are empty.
async fn drain(ctx: &TestHarness) {
    let worker = worker(ctx, 500);
    for _ in 0..20 {
        let report = worker.run_cycle().await.unwrap();
        if !report.full {
            return;
        }
    }
}

/// Tests in this binary share the dirty sets, so a concurrent test may pop
/// our markers and be the one to write them. Poll until the row matches.
async fn persisted_player(ctx: &TestHarness, id: PlayerId, done: impl Fn(&Player) -> bool) -> Player {
    for _ in 0..40 {
        drain(ctx).await;
        if let Some(player) = Player::find_by_id(id, &ctx.db_pool).await.unwrap() {
            if done(&player) {
                return player;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("player {} never reached the expected durable state", id);
}

async fn persisted_plot(
    ctx: &TestHarness,
    id: PlayerId,
    position: u32,
    done: impl Fn(&Plot) -> bool,
) -> Plot {
    for _ in 0..40 {
        drain(ctx).await;
        if let Some(plot) = Plot::find(id, position, &ctx.db_pool).await.unwrap() {
            if done(&plot) {
                return plot;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("plot {}:{} never reached the expected durable state", id, position);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn registration_is_persisted_after_a_cycle(ctx: &TestHarness) {
    let id = register_player(ctx, "Persisted").await.unwrap();

    let player = persisted_player(ctx, id, |_| true).await;
    assert_eq!(player.name, "Persisted");
    assert_eq!(player.gold, 1000);
    assert_eq!(player.land_count, 6);
    assert!(!player.has_dog);

    for position in 0..6 {
        let plot = persisted_plot(ctx, id, position, |_| true).await;
        assert_eq!(plot.status, "empty");
        assert_eq!(plot.land_type, "normal");
    }
    let plots = Plot::find_for_player(id, &ctx.db_pool).await.unwrap();
    assert_eq!(plots.len(), 6);

    assert!(!is_member(ctx, keys::DIRTY_PLAYERS, &id.to_string()).await.unwrap());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn later_mutations_overwrite_the_durable_copy(ctx: &TestHarness) {
    let id = register_player(ctx, "Grower").await.unwrap();
    persisted_player(ctx, id, |_| true).await;

    let now = now_millis();
    ctx.game().plant(id, 2, "carrot", now).await.unwrap();

    persisted_player(ctx, id, |p| p.gold == 980).await;
    let plot = persisted_plot(ctx, id, 2, |p| p.status == "planted").await;
    assert_eq!(plot.crop_id.as_deref(), Some("carrot"));
    assert_eq!(
        plot.mature_at.map(|t| t.timestamp_millis()),
        Some(now + 60_000)
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn avatar_survives_reconciliation(ctx: &TestHarness) {
    let id = register_player(ctx, "Pictured").await.unwrap();
    persisted_player(ctx, id, |_| true).await;

    // Profile edits land directly in Postgres, outside the game loop.
    sqlx::query("UPDATE players SET avatar = $2 WHERE id = $1")
        .bind(id)
        .bind("https://cdn.example/avatar.png")
        .execute(&ctx.db_pool)
        .await
        .unwrap();
    set_gold(ctx, id, 4242).await.unwrap();
    let mut con = ctx.redis();
    let _: () = con.sadd(keys::DIRTY_PLAYERS, id.to_string()).await.unwrap();

    let player = persisted_player(ctx, id, |p| p.gold == 4242).await;
    assert_eq!(player.avatar.as_deref(), Some("https://cdn.example/avatar.png"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn malformed_and_orphan_markers_are_dropped(ctx: &TestHarness) {
    let mut con = ctx.redis();
    let orphan = PlayerId::new();
    let _: () = con
        .sadd(keys::DIRTY_PLAYERS, vec!["not-a-player".to_string(), orphan.to_string()])
        .await
        .unwrap();
    let _: () = con
        .sadd(keys::DIRTY_PLOTS, keys::plot_member(orphan, 0))
        .await
        .unwrap();

    drain(ctx).await;

    assert!(!is_member(ctx, keys::DIRTY_PLAYERS, "not-a-player").await.unwrap());
    assert!(Player::find_by_id(orphan, &ctx.db_pool).await.unwrap().is_none());
    assert!(Plot::find(orphan, 0, &ctx.db_pool).await.unwrap().is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn service_loop_persists_until_cancelled(ctx: &TestHarness) {
    let id = register_player(ctx, "Background").await.unwrap();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(Box::new(worker(ctx, 50)).run(shutdown.clone()));

    let mut persisted = None;
    for _ in 0..50 {
        persisted = Player::find_by_id(id, &ctx.db_pool).await.unwrap();
        if persisted.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    shutdown.cancel();
    handle.await.unwrap().unwrap();
    assert!(persisted.is_some());
}
