use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;

use crate::common::{NotificationId, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewFollower,
    MutualFollow,
    Steal,
    DogBite,
    CareAssist,
    ClearAssist,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewFollower => "new_follower",
            Self::MutualFollow => "mutual_follow",
            Self::Steal => "steal",
            Self::DogBite => "dog_bite",
            Self::CareAssist => "care_assist",
            Self::ClearAssist => "clear_assist",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_follower" => Ok(Self::NewFollower),
            "mutual_follow" => Ok(Self::MutualFollow),
            "steal" => Ok(Self::Steal),
            "dog_bite" => Ok(Self::DogBite),
            "care_assist" => Ok(Self::CareAssist),
            "clear_assist" => Ok(Self::ClearAssist),
            _ => Err(anyhow::anyhow!("Invalid notification kind: {}", s)),
        }
    }
}

/// A notification addressed to one player.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: NotificationId,
    pub player_id: PlayerId,
    pub kind: String,
    pub message: String,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn kind(&self) -> Option<NotificationKind> {
        self.kind.parse().ok()
    }

    pub async fn create(
        player_id: PlayerId,
        kind: NotificationKind,
        message: &str,
        data: serde_json::Value,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO notifications (id, player_id, kind, message, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(NotificationId::new())
        .bind(player_id)
        .bind(kind.as_str())
        .bind(message)
        .bind(data)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Most recent first.
    pub async fn find_for_player(
        player_id: PlayerId,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM notifications
            WHERE player_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(player_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Mark one notification read. Returns false if it does not belong to
    /// `player_id` or does not exist.
    pub async fn mark_read(id: NotificationId, player_id: PlayerId, pool: &PgPool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND player_id = $2")
                .bind(id)
                .bind(player_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn unread_count(player_id: PlayerId, pool: &PgPool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE player_id = $1 AND NOT read",
        )
        .bind(player_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_parse_back() {
        for kind in [
            NotificationKind::NewFollower,
            NotificationKind::MutualFollow,
            NotificationKind::Steal,
            NotificationKind::DogBite,
            NotificationKind::CareAssist,
            NotificationKind::ClearAssist,
        ] {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::String(kind.to_string())
            );
        }
    }
}
