use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;

use super::HashFields;
use crate::common::{datetime_from_millis, PlayerId};

/// Live player record as held in Hot State.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub gold: i64,
    pub exp: i64,
    pub level: i64,
    pub land_count: u32,
    pub has_dog: bool,
    /// Unix millis; 0 when no dog was ever bought.
    pub dog_active_until: i64,
    /// Hot-only, never persisted.
    pub last_disaster_check: i64,
}

impl PlayerState {
    /// Map a `farm:player:{id}` hash. `None` when the hash does not exist.
    pub fn from_hash(id: PlayerId, hash: &HashMap<String, String>) -> Option<Self> {
        if hash.is_empty() {
            return None;
        }
        let f = HashFields(hash);

        Some(Self {
            id,
            name: f.text("name").unwrap_or_default(),
            gold: f.int("gold").max(0),
            exp: f.int("exp"),
            level: f.int_or("level", 1),
            land_count: f.int("landCount").max(0) as u32,
            has_dog: f.flag("hasDog"),
            dog_active_until: f.int("dogActiveUntil"),
            last_disaster_check: f.int("lastDisasterCheck"),
        })
    }
}

/// Durable player row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Option<String>,
    pub gold: i64,
    pub exp: i64,
    pub level: i64,
    pub land_count: i32,
    pub has_dog: bool,
    pub dog_active_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public profile fields used to enrich listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Option<String>,
    pub level: i64,
    pub gold: i64,
}

impl Player {
    /// Write the Hot State view of a player. Avatar and creation time are
    /// owned by the durable side and survive the upsert.
    pub async fn upsert_state(state: &PlayerState, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO players (id, name, gold, exp, level, land_count, has_dog, dog_active_until)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                gold = EXCLUDED.gold,
                exp = EXCLUDED.exp,
                level = EXCLUDED.level,
                land_count = EXCLUDED.land_count,
                has_dog = EXCLUDED.has_dog,
                dog_active_until = EXCLUDED.dog_active_until,
                updated_at = NOW()
            "#,
        )
        .bind(state.id)
        .bind(&state.name)
        .bind(state.gold)
        .bind(state.exp)
        .bind(state.level)
        .bind(state.land_count as i32)
        .bind(state.has_dog)
        .bind(datetime_from_millis(state.dog_active_until))
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(id: PlayerId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM players WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_profiles(ids: &[PlayerId], pool: &PgPool) -> Result<Vec<PlayerProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, PlayerProfile>(
            "SELECT id, name, avatar, level, gold FROM players WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Display names keyed by id. Unknown ids are simply absent.
    pub async fn find_names(ids: &[PlayerId], pool: &PgPool) -> Result<HashMap<PlayerId, String>> {
        let rows = Self::find_profiles(ids, pool).await?;
        Ok(rows.into_iter().map(|p| (p.id, p.name)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_hash_maps_to_none() {
        assert!(PlayerState::from_hash(PlayerId::new(), &HashMap::new()).is_none());
    }

    #[test]
    fn test_hash_fields_map_onto_state() {
        let id = PlayerId::new();
        let state = PlayerState::from_hash(
            id,
            &hash(&[
                ("name", "Mei"),
                ("gold", "1250"),
                ("exp", "40"),
                ("level", "3"),
                ("landCount", "7"),
                ("hasDog", "true"),
                ("dogActiveUntil", "5000"),
            ]),
        )
        .unwrap();

        assert_eq!(state.name, "Mei");
        assert_eq!(state.gold, 1250);
        assert_eq!(state.level, 3);
        assert_eq!(state.land_count, 7);
        assert!(state.has_dog);
        assert_eq!(state.dog_active_until, 5000);
        assert_eq!(state.last_disaster_check, 0);
    }

    #[test]
    fn test_defaults_for_sparse_hash() {
        let state = PlayerState::from_hash(PlayerId::new(), &hash(&[("gold", "-3")])).unwrap();
        assert_eq!(state.gold, 0);
        assert_eq!(state.level, 1);
        assert!(!state.has_dog);
    }
}
