//! Game balance.
//!
//! Durations are stored in seconds here and converted to milliseconds at the
//! script boundary, since every timestamp in Hot State is Unix millis.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Plot soil tier. Higher tiers unlock more valuable crops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandTier {
    Normal,
    Red,
    Black,
    Gold,
}

impl LandTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Red => "red",
            Self::Black => "black",
            Self::Gold => "gold",
        }
    }

    /// Ordinal used by scripts to compare tiers.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Red => 1,
            Self::Black => 2,
            Self::Gold => 3,
        }
    }

}

impl fmt::Display for LandTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LandTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "red" => Ok(Self::Red),
            "black" => Ok(Self::Black),
            "gold" => Ok(Self::Gold),
            _ => Err(anyhow::anyhow!("Invalid land tier: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub id: String,
    pub seed_price: i64,
    pub sell_price: i64,
    /// Units produced per harvest; gold at harvest is `sell_price * yield_count`.
    pub yield_count: i64,
    pub mature_secs: i64,
    pub exp: i64,
    pub required_tier: LandTier,
}

impl Crop {
    fn new(
        id: &str,
        seed_price: i64,
        sell_price: i64,
        yield_count: i64,
        mature_secs: i64,
        exp: i64,
        required_tier: LandTier,
    ) -> Self {
        Self {
            id: id.to_string(),
            seed_price,
            sell_price,
            yield_count,
            mature_secs,
            exp,
            required_tier,
        }
    }

    pub fn harvest_gold(&self) -> i64 {
        self.sell_price * self.yield_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeStep {
    pub cost: i64,
    pub level_required: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FertilizerKind {
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fertilizer {
    pub price: i64,
    pub reduce_secs: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CareKind {
    Water,
    Weed,
    Pest,
}

impl CareKind {
    /// Plot hash field holding this care flag.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Water => "needsWater",
            Self::Weed => "needsWeeding",
            Self::Pest => "needsPestControl",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::Weed => "weed",
            Self::Pest => "pest",
        }
    }
}

impl FromStr for CareKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "water" => Ok(Self::Water),
            "weed" => Ok(Self::Weed),
            "pest" => Ok(Self::Pest),
            _ => Err(anyhow::anyhow!("Invalid care kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterConfig {
    /// Minimum time between two ticks for the same player.
    pub interval_secs: i64,
    /// Per-plot chance, in percent, of each care need appearing on a tick.
    pub weed_chance: u8,
    pub pest_chance: u8,
    pub water_chance: u8,
    /// Crops younger than this share of their growth time are left alone.
    pub young_crop_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub crops: Vec<Crop>,
    pub initial_gold: i64,
    pub initial_land_count: u32,
    pub max_land_count: u32,
    pub expand_base_cost: i64,
    pub normal_fertilizer: Fertilizer,
    pub high_fertilizer: Fertilizer,
    pub dog_price: i64,
    pub dog_food_price: i64,
    pub dog_food_secs: i64,
    /// Yield lost per theft, in basis points of the harvest.
    pub steal_penalty_bp: i64,
    pub max_stolen_count: i64,
    /// Yield lost per outstanding weed or pest need, in basis points.
    pub health_penalty_bp: i64,
    /// Harvest yield never drops below this, in basis points.
    pub min_yield_bp: i64,
    pub thief_window_secs: i64,
    pub care_exp: i64,
    pub daily_exp_cap: i64,
    pub daily_exp_window_secs: i64,
    pub disaster: DisasterConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        use LandTier::*;

        Self {
            crops: vec![
                Crop::new("radish", 10, 15, 1, 30, 2, Normal),
                Crop::new("carrot", 20, 35, 1, 60, 5, Normal),
                Crop::new("potato", 150, 280, 1, 600, 40, Normal),
                Crop::new("corn", 50, 60, 2, 120, 10, Normal),
                Crop::new("strawberry", 80, 100, 2, 180, 15, Red),
                Crop::new("tomato", 200, 180, 2, 240, 20, Red),
                Crop::new("watermelon", 150, 120, 3, 300, 25, Red),
                Crop::new("pumpkin", 500, 1200, 1, 1800, 100, Black),
            ],
            initial_gold: 1000,
            initial_land_count: 6,
            max_land_count: 18,
            expand_base_cost: 1000,
            normal_fertilizer: Fertilizer {
                price: 50,
                reduce_secs: 3600,
            },
            high_fertilizer: Fertilizer {
                price: 200,
                reduce_secs: 14400,
            },
            dog_price: 2000,
            dog_food_price: 200,
            dog_food_secs: 86400,
            steal_penalty_bp: 1000,
            max_stolen_count: 3,
            health_penalty_bp: 2000,
            min_yield_bp: 1000,
            thief_window_secs: 172_800,
            care_exp: 5,
            daily_exp_cap: 500,
            daily_exp_window_secs: 172_800,
            disaster: DisasterConfig {
                interval_secs: 60,
                weed_chance: 10,
                pest_chance: 10,
                water_chance: 15,
                young_crop_fraction: 0.2,
            },
        }
    }
}

impl GameConfig {
    pub fn crop(&self, id: &str) -> Option<&Crop> {
        self.crops.iter().find(|c| c.id == id)
    }

    /// Cost and level gate for upgrading *from* `tier`. `None` at the top tier.
    pub fn upgrade_from(&self, tier: LandTier) -> Option<UpgradeStep> {
        match tier {
            LandTier::Normal => Some(UpgradeStep {
                cost: 5000,
                level_required: 5,
            }),
            LandTier::Red => Some(UpgradeStep {
                cost: 20_000,
                level_required: 15,
            }),
            LandTier::Black => Some(UpgradeStep {
                cost: 100_000,
                level_required: 30,
            }),
            LandTier::Gold => None,
        }
    }

    pub fn fertilizer(&self, kind: FertilizerKind) -> Fertilizer {
        match kind {
            FertilizerKind::Normal => self.normal_fertilizer,
            FertilizerKind::High => self.high_fertilizer,
        }
    }
}
