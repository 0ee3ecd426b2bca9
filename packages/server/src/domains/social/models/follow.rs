use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::PlayerId;

/// Durable follow edge (follower -> following).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub follower_id: PlayerId,
    pub following_id: PlayerId,
    pub created_at: DateTime<Utc>,
}

/// Keyset cursor for paging the whole edge table in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowCursor {
    pub created_at: DateTime<Utc>,
    pub follower_id: PlayerId,
    pub following_id: PlayerId,
}

impl Follow {
    pub fn cursor(&self) -> FollowCursor {
        FollowCursor {
            created_at: self.created_at,
            follower_id: self.follower_id,
            following_id: self.following_id,
        }
    }

    /// Insert the edge; replays of the same event keep the original timestamp.
    pub async fn upsert(
        follower_id: PlayerId,
        following_id: PlayerId,
        created_at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO follows (follower_id, following_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (follower_id, following_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .bind(created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete(follower_id: PlayerId, following_id: PlayerId, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(follower_id)
            .bind(following_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn exists(follower_id: PlayerId, following_id: PlayerId, pool: &PgPool) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    pub async fn count_following(id: PlayerId, pool: &PgPool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn count_followers(id: PlayerId, pool: &PgPool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE following_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Most recent edges where `id` is the follower.
    pub async fn find_following(id: PlayerId, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM follows WHERE follower_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Most recent edges where `id` is being followed.
    pub async fn find_followers(id: PlayerId, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM follows WHERE following_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Page through every edge in creation order, strictly after `after`.
    pub async fn find_page(
        after: Option<FollowCursor>,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        match after {
            None => sqlx::query_as::<_, Self>(
                r#"
                SELECT * FROM follows
                ORDER BY created_at, follower_id, following_id
                LIMIT $1
                "#,
            )
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(Into::into),
            Some(cursor) => sqlx::query_as::<_, Self>(
                r#"
                SELECT * FROM follows
                WHERE (created_at, follower_id, following_id) > ($1, $2, $3)
                ORDER BY created_at, follower_id, following_id
                LIMIT $4
                "#,
            )
            .bind(cursor.created_at)
            .bind(cursor.follower_id)
            .bind(cursor.following_id)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(Into::into),
        }
    }
}
