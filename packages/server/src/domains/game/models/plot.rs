use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::HashFields;
use crate::common::{datetime_from_millis, PlayerId};
use crate::domains::game::config::LandTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotStatus {
    Empty,
    Planted,
    Harvestable,
    Withered,
}

impl PlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Planted => "planted",
            Self::Harvestable => "harvestable",
            Self::Withered => "withered",
        }
    }
}

impl fmt::Display for PlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlotStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(Self::Empty),
            "planted" => Ok(Self::Planted),
            "harvestable" => Ok(Self::Harvestable),
            "withered" => Ok(Self::Withered),
            _ => Err(anyhow::anyhow!("Invalid plot status: {}", s)),
        }
    }
}

/// Live plot record as held in Hot State.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotState {
    pub player_id: PlayerId,
    pub position: u32,
    pub status: PlotStatus,
    pub crop_id: Option<String>,
    pub planted_at: i64,
    pub mature_at: i64,
    pub stolen_count: i64,
    pub needs_weeding: bool,
    pub needs_pest_control: bool,
    pub needs_water: bool,
    pub land_type: LandTier,
    /// Crop value captured at planting so harvest and steal read it atomically.
    pub harvest_gold: i64,
    pub harvest_exp: i64,
}

impl PlotState {
    /// Map a `farm:plot:{id}:{pos}` hash. `None` when the hash does not exist.
    pub fn from_hash(
        player_id: PlayerId,
        position: u32,
        hash: &HashMap<String, String>,
    ) -> Option<Self> {
        if hash.is_empty() {
            return None;
        }
        let f = HashFields(hash);

        Some(Self {
            player_id,
            position,
            status: f
                .text("status")
                .and_then(|s| s.parse().ok())
                .unwrap_or(PlotStatus::Empty),
            crop_id: f.text("cropId"),
            planted_at: f.int("plantedAt"),
            mature_at: f.int("matureAt"),
            stolen_count: f.int("stolenCount"),
            needs_weeding: f.flag("needsWeeding"),
            needs_pest_control: f.flag("needsPestControl"),
            needs_water: f.flag("needsWater"),
            land_type: f
                .text("landType")
                .and_then(|s| s.parse().ok())
                .unwrap_or(LandTier::Normal),
            harvest_gold: f.int("harvestGold"),
            harvest_exp: f.int("harvestExp"),
        })
    }
}

/// Durable plot row, keyed by (player_id, position).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plot {
    pub player_id: PlayerId,
    pub position: i32,
    pub status: String,
    pub crop_id: Option<String>,
    pub planted_at: Option<DateTime<Utc>>,
    pub mature_at: Option<DateTime<Utc>>,
    pub stolen_count: i32,
    pub needs_weeding: bool,
    pub needs_pest_control: bool,
    pub needs_water: bool,
    pub land_type: String,
    pub updated_at: DateTime<Utc>,
}

impl Plot {
    pub async fn upsert_state(state: &PlotState, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plots (
                player_id, position, status, crop_id, planted_at, mature_at,
                stolen_count, needs_weeding, needs_pest_control, needs_water, land_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (player_id, position) DO UPDATE SET
                status = EXCLUDED.status,
                crop_id = EXCLUDED.crop_id,
                planted_at = EXCLUDED.planted_at,
                mature_at = EXCLUDED.mature_at,
                stolen_count = EXCLUDED.stolen_count,
                needs_weeding = EXCLUDED.needs_weeding,
                needs_pest_control = EXCLUDED.needs_pest_control,
                needs_water = EXCLUDED.needs_water,
                land_type = EXCLUDED.land_type,
                updated_at = NOW()
            "#,
        )
        .bind(state.player_id)
        .bind(state.position as i32)
        .bind(state.status.as_str())
        .bind(state.crop_id.as_deref())
        .bind(datetime_from_millis(state.planted_at))
        .bind(datetime_from_millis(state.mature_at))
        .bind(state.stolen_count as i32)
        .bind(state.needs_weeding)
        .bind(state.needs_pest_control)
        .bind(state.needs_water)
        .bind(state.land_type.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_for_player(player_id: PlayerId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM plots WHERE player_id = $1 ORDER BY position",
        )
        .bind(player_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find(player_id: PlayerId, position: u32, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM plots WHERE player_id = $1 AND position = $2")
            .bind(player_id)
            .bind(position as i32)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
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
    fn test_planted_plot_maps() {
        let id = PlayerId::new();
        let plot = PlotState::from_hash(
            id,
            2,
            &hash(&[
                ("status", "planted"),
                ("cropId", "carrot"),
                ("plantedAt", "1000"),
                ("matureAt", "61000"),
                ("stolenCount", "1"),
                ("needsWeeding", "true"),
                ("needsPestControl", "false"),
                ("landType", "red"),
                ("harvestGold", "35"),
                ("harvestExp", "5"),
            ]),
        )
        .unwrap();

        assert_eq!(plot.status, PlotStatus::Planted);
        assert_eq!(plot.crop_id.as_deref(), Some("carrot"));
        assert_eq!(plot.land_type, LandTier::Red);
        assert!(plot.needs_weeding);
        assert!(!plot.needs_water);
        assert_eq!(plot.mature_at, 61_000);
    }

    #[test]
    fn test_empty_crop_id_is_none() {
        let plot =
            PlotState::from_hash(PlayerId::new(), 0, &hash(&[("status", "empty"), ("cropId", "")]))
                .unwrap();
        assert_eq!(plot.crop_id, None);
    }

    #[test]
    fn test_unknown_status_falls_back_to_empty() {
        let plot =
            PlotState::from_hash(PlayerId::new(), 0, &hash(&[("status", "haunted")])).unwrap();
        assert_eq!(plot.status, PlotStatus::Empty);
    }
}
