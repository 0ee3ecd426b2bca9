use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::common::PlayerId;

/// One row of the player activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityEntry {
    pub player_id: PlayerId,
    pub target_id: Option<PlayerId>,
    pub action: String,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    /// Insert a batch in a single statement.
    pub async fn insert_batch(entries: &[ActivityEntry], pool: &PgPool) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO activity_log (player_id, target_id, action, detail, created_at) ",
        );
        builder.push_values(entries, |mut row, entry| {
            row.push_bind(entry.player_id)
                .push_bind(entry.target_id)
                .push_bind(&entry.action)
                .push_bind(&entry.detail)
                .push_bind(entry.created_at);
        });

        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Entries where `player_id` acted or was acted upon, most recent first.
    pub async fn find_recent(player_id: PlayerId, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT player_id, target_id, action, detail, created_at
            FROM activity_log
            WHERE player_id = $1 OR target_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(player_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
