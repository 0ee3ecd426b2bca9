//! Atomic gameplay actions.
//!
//! Each action is a single server-side script: preconditions are checked and
//! mutations applied inside one transaction, so concurrent requests never
//! observe or act on an intermediate state. The Rust side only validates
//! inputs the script cannot (crop catalogue, self-steal), builds keys and
//! decodes the reply.

use std::sync::Arc;

use rand::Rng;
use redis::Script;
use serde::Serialize;
use tracing::debug;

use crate::common::PlayerId;
use crate::domains::game::config::{CareKind, FertilizerKind, GameConfig, LandTier};
use crate::domains::game::errors::{ActionError, Rejection};
use crate::domains::game::models::{PlayerState, PlotState, PlotStatus};
use crate::kernel::keys;
use crate::kernel::scripts::{invoke, value_at, ScriptReply};
use crate::kernel::HotStore;

struct GameScripts {
    register: Script,
    plant: Script,
    harvest: Script,
    steal: Script,
    care: Script,
    clear: Script,
    fertilize: Script,
    upgrade_land: Script,
    expand_land: Script,
    dog: Script,
    disaster_tick: Script,
}

impl GameScripts {
    fn load() -> Self {
        Self {
            register: Script::new(include_str!("lua/register.lua")),
            plant: Script::new(include_str!("lua/plant.lua")),
            harvest: Script::new(include_str!("lua/harvest.lua")),
            steal: Script::new(include_str!("lua/steal.lua")),
            care: Script::new(include_str!("lua/care.lua")),
            clear: Script::new(include_str!("lua/clear.lua")),
            fertilize: Script::new(include_str!("lua/fertilize.lua")),
            upgrade_land: Script::new(include_str!("lua/upgrade_land.lua")),
            expand_land: Script::new(include_str!("lua/expand_land.lua")),
            dog: Script::new(include_str!("lua/dog.lua")),
            disaster_tick: Script::new(include_str!("lua/disaster_tick.lua")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantOutcome {
    pub mature_at: i64,
    pub gold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestOutcome {
    pub crop_id: String,
    pub gold_gained: i64,
    pub exp_gained: i64,
    pub multiplier: f64,
    /// Player totals after the harvest.
    pub gold: i64,
    pub exp: i64,
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StealOutcome {
    pub gold_gained: i64,
    pub stolen_count: i64,
    pub gold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CareOutcome {
    /// Zero once the daily cap is reached.
    pub exp_gained: i64,
    pub exp: i64,
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearOutcome {
    pub previous_status: PlotStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FertilizeOutcome {
    pub mature_at: i64,
    pub gold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeOutcome {
    pub land_type: LandTier,
    pub gold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandOutcome {
    pub position: u32,
    pub land_count: u32,
    pub cost: i64,
    pub gold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DogOutcome {
    pub active_until: i64,
    pub gold: i64,
}

/// Entry point for every gameplay mutation.
#[derive(Clone)]
pub struct GameService {
    hot: HotStore,
    config: Arc<GameConfig>,
    scripts: Arc<GameScripts>,
}

impl GameService {
    pub fn new(hot: HotStore, config: Arc<GameConfig>) -> Self {
        Self {
            hot,
            config,
            scripts: Arc::new(GameScripts::load()),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Whether both handles run the same loaded scripts.
    pub fn shares_scripts_with(&self, other: &GameService) -> bool {
        Arc::ptr_eq(&self.scripts, &other.scripts)
    }

    async fn run(
        &self,
        action: &'static str,
        script: &Script,
        keys: Vec<String>,
        args: Vec<String>,
    ) -> Result<Vec<String>, ActionError> {
        let mut con = self.hot.connection();
        let raw = invoke(script, &keys, &args, &mut con).await?;

        match ScriptReply::decode(raw)? {
            ScriptReply::Ok(values) => Ok(values),
            ScriptReply::Fail(reason) => {
                let rejection: Rejection = reason.parse()?;
                debug!(action, reason = %rejection, "action rejected");
                Err(ActionError::Rejected(rejection))
            }
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub async fn register_player(&self, id: PlayerId, name: &str) -> Result<(), ActionError> {
        self.run(
            "register",
            &self.scripts.register,
            vec![
                keys::player(id),
                keys::DIRTY_PLAYERS.to_string(),
                keys::DIRTY_PLOTS.to_string(),
                keys::DIRTY_LEADERBOARD.to_string(),
            ],
            vec![
                id.to_string(),
                name.to_string(),
                self.config.initial_gold.to_string(),
                self.config.initial_land_count.to_string(),
                keys::plot_prefix(id),
            ],
        )
        .await?;
        Ok(())
    }

    // =========================================================================
    // Crops
    // =========================================================================

    pub async fn plant(
        &self,
        player: PlayerId,
        position: u32,
        crop_id: &str,
        now_ms: i64,
    ) -> Result<PlantOutcome, ActionError> {
        let crop = self
            .config
            .crop(crop_id)
            .ok_or(ActionError::Rejected(Rejection::UnknownCrop))?;
        let mature_at = now_ms + crop.mature_secs * 1000;

        let values = self
            .run(
                "plant",
                &self.scripts.plant,
                vec![
                    keys::plot(player, position),
                    keys::player(player),
                    keys::thieves(player, position),
                    keys::DIRTY_PLOTS.to_string(),
                    keys::DIRTY_PLAYERS.to_string(),
                    keys::DIRTY_LEADERBOARD.to_string(),
                ],
                vec![
                    crop.id.clone(),
                    crop.seed_price.to_string(),
                    crop.required_tier.rank().to_string(),
                    now_ms.to_string(),
                    mature_at.to_string(),
                    crop.harvest_gold().to_string(),
                    crop.exp.to_string(),
                    keys::plot_member(player, position),
                    player.to_string(),
                ],
            )
            .await?;

        Ok(PlantOutcome {
            mature_at: value_at(&values, 0)?,
            gold: value_at(&values, 1)?,
        })
    }

    pub async fn harvest(
        &self,
        player: PlayerId,
        position: u32,
        now_ms: i64,
    ) -> Result<HarvestOutcome, ActionError> {
        let values = self
            .run(
                "harvest",
                &self.scripts.harvest,
                vec![
                    keys::plot(player, position),
                    keys::player(player),
                    keys::thieves(player, position),
                    keys::DIRTY_PLOTS.to_string(),
                    keys::DIRTY_PLAYERS.to_string(),
                    keys::DIRTY_LEADERBOARD.to_string(),
                ],
                vec![
                    now_ms.to_string(),
                    self.config.steal_penalty_bp.to_string(),
                    self.config.health_penalty_bp.to_string(),
                    self.config.min_yield_bp.to_string(),
                    keys::plot_member(player, position),
                    player.to_string(),
                ],
            )
            .await?;

        Ok(HarvestOutcome {
            gold_gained: value_at(&values, 0)?,
            exp_gained: value_at(&values, 1)?,
            multiplier: value_at::<i64>(&values, 2)? as f64 / 10_000.0,
            gold: value_at(&values, 3)?,
            exp: value_at(&values, 4)?,
            level: value_at(&values, 5)?,
            crop_id: values.get(6).cloned().unwrap_or_default(),
        })
    }

    pub async fn steal(
        &self,
        stealer: PlayerId,
        victim: PlayerId,
        position: u32,
        now_ms: i64,
    ) -> Result<StealOutcome, ActionError> {
        if stealer == victim {
            return Err(Rejection::CannotStealOwnPlot.into());
        }

        let values = self
            .run(
                "steal",
                &self.scripts.steal,
                vec![
                    keys::plot(victim, position),
                    keys::player(victim),
                    keys::player(stealer),
                    keys::thieves(victim, position),
                    keys::DIRTY_PLOTS.to_string(),
                    keys::DIRTY_PLAYERS.to_string(),
                    keys::DIRTY_LEADERBOARD.to_string(),
                    keys::QUEUE_STEAL.to_string(),
                    keys::QUEUE_DOG.to_string(),
                ],
                vec![
                    stealer.to_string(),
                    victim.to_string(),
                    position.to_string(),
                    now_ms.to_string(),
                    self.config.max_stolen_count.to_string(),
                    self.config.steal_penalty_bp.to_string(),
                    self.config.thief_window_secs.to_string(),
                    keys::plot_member(victim, position),
                ],
            )
            .await?;

        Ok(StealOutcome {
            gold_gained: value_at(&values, 0)?,
            stolen_count: value_at(&values, 1)?,
            gold: value_at(&values, 2)?,
        })
    }

    // =========================================================================
    // Plot upkeep
    // =========================================================================

    /// Water, weed or de-pest a plot. `operator` may be someone other than the
    /// owner; the owner then receives an assist event.
    pub async fn care(
        &self,
        operator: PlayerId,
        owner: PlayerId,
        position: u32,
        kind: CareKind,
        now_ms: i64,
    ) -> Result<CareOutcome, ActionError> {
        let values = self
            .run(
                "care",
                &self.scripts.care,
                vec![
                    keys::plot(owner, position),
                    keys::player(operator),
                    keys::daily_exp(operator),
                    keys::DIRTY_PLOTS.to_string(),
                    keys::DIRTY_PLAYERS.to_string(),
                    keys::DIRTY_LEADERBOARD.to_string(),
                    keys::QUEUE_CARE.to_string(),
                ],
                vec![
                    kind.field().to_string(),
                    self.config.care_exp.to_string(),
                    self.config.daily_exp_cap.to_string(),
                    self.config.daily_exp_window_secs.to_string(),
                    operator.to_string(),
                    owner.to_string(),
                    position.to_string(),
                    kind.as_str().to_string(),
                    now_ms.to_string(),
                    keys::plot_member(owner, position),
                ],
            )
            .await?;

        Ok(CareOutcome {
            exp_gained: value_at(&values, 0)?,
            exp: value_at(&values, 1)?,
            level: value_at(&values, 2)?,
        })
    }

    /// Shovel a plot back to empty.
    pub async fn clear(
        &self,
        operator: PlayerId,
        owner: PlayerId,
        position: u32,
        now_ms: i64,
    ) -> Result<ClearOutcome, ActionError> {
        let values = self
            .run(
                "clear",
                &self.scripts.clear,
                vec![
                    keys::plot(owner, position),
                    keys::thieves(owner, position),
                    keys::DIRTY_PLOTS.to_string(),
                    keys::QUEUE_CLEAR.to_string(),
                ],
                vec![
                    operator.to_string(),
                    owner.to_string(),
                    position.to_string(),
                    now_ms.to_string(),
                    keys::plot_member(owner, position),
                ],
            )
            .await?;

        let previous_status = values
            .first()
            .and_then(|s| s.parse().ok())
            .unwrap_or(PlotStatus::Empty);
        Ok(ClearOutcome { previous_status })
    }

    pub async fn fertilize(
        &self,
        player: PlayerId,
        position: u32,
        kind: FertilizerKind,
        now_ms: i64,
    ) -> Result<FertilizeOutcome, ActionError> {
        let fertilizer = self.config.fertilizer(kind);

        let values = self
            .run(
                "fertilize",
                &self.scripts.fertilize,
                vec![
                    keys::plot(player, position),
                    keys::player(player),
                    keys::DIRTY_PLOTS.to_string(),
                    keys::DIRTY_PLAYERS.to_string(),
                    keys::DIRTY_LEADERBOARD.to_string(),
                ],
                vec![
                    fertilizer.price.to_string(),
                    (fertilizer.reduce_secs * 1000).to_string(),
                    now_ms.to_string(),
                    keys::plot_member(player, position),
                    player.to_string(),
                ],
            )
            .await?;

        Ok(FertilizeOutcome {
            mature_at: value_at(&values, 0)?,
            gold: value_at(&values, 1)?,
        })
    }

    // =========================================================================
    // Land
    // =========================================================================

    pub async fn upgrade_land(
        &self,
        player: PlayerId,
        position: u32,
    ) -> Result<UpgradeOutcome, ActionError> {
        let mut args = vec![keys::plot_member(player, position), player.to_string()];
        for tier in [LandTier::Normal, LandTier::Red, LandTier::Black] {
            if let Some(step) = self.config.upgrade_from(tier) {
                args.push(step.cost.to_string());
                args.push(step.level_required.to_string());
            }
        }

        let values = self
            .run(
                "upgrade_land",
                &self.scripts.upgrade_land,
                vec![
                    keys::plot(player, position),
                    keys::player(player),
                    keys::DIRTY_PLOTS.to_string(),
                    keys::DIRTY_PLAYERS.to_string(),
                    keys::DIRTY_LEADERBOARD.to_string(),
                ],
                args,
            )
            .await?;

        Ok(UpgradeOutcome {
            land_type: value_at(&values, 0)?,
            gold: value_at(&values, 1)?,
        })
    }

    pub async fn expand_land(&self, player: PlayerId) -> Result<ExpandOutcome, ActionError> {
        let values = self
            .run(
                "expand_land",
                &self.scripts.expand_land,
                vec![
                    keys::player(player),
                    keys::DIRTY_PLOTS.to_string(),
                    keys::DIRTY_PLAYERS.to_string(),
                    keys::DIRTY_LEADERBOARD.to_string(),
                ],
                vec![
                    self.config.expand_base_cost.to_string(),
                    self.config.max_land_count.to_string(),
                    keys::plot_prefix(player),
                    player.to_string(),
                ],
            )
            .await?;

        Ok(ExpandOutcome {
            position: value_at(&values, 0)?,
            land_count: value_at(&values, 1)?,
            cost: value_at(&values, 2)?,
            gold: value_at(&values, 3)?,
        })
    }

    // =========================================================================
    // Dog
    // =========================================================================

    pub async fn buy_dog(&self, player: PlayerId, now_ms: i64) -> Result<DogOutcome, ActionError> {
        self.dog("buy", self.config.dog_price, player, now_ms).await
    }

    pub async fn feed_dog(&self, player: PlayerId, now_ms: i64) -> Result<DogOutcome, ActionError> {
        self.dog("feed", self.config.dog_food_price, player, now_ms)
            .await
    }

    async fn dog(
        &self,
        mode: &'static str,
        price: i64,
        player: PlayerId,
        now_ms: i64,
    ) -> Result<DogOutcome, ActionError> {
        let values = self
            .run(
                "dog",
                &self.scripts.dog,
                vec![
                    keys::player(player),
                    keys::DIRTY_PLAYERS.to_string(),
                    keys::DIRTY_LEADERBOARD.to_string(),
                ],
                vec![
                    mode.to_string(),
                    price.to_string(),
                    (self.config.dog_food_secs * 1000).to_string(),
                    now_ms.to_string(),
                    player.to_string(),
                ],
            )
            .await?;

        Ok(DogOutcome {
            active_until: value_at(&values, 0)?,
            gold: value_at(&values, 1)?,
        })
    }

    // =========================================================================
    // Disasters
    // =========================================================================

    /// Roll care needs for every growing plot of `player`. Returns the affected
    /// positions; empty when the player was checked too recently.
    pub async fn disaster_tick(&self, player: PlayerId, now_ms: i64) -> Result<Vec<u32>, ActionError> {
        let rolls = {
            let mut rng = rand::thread_rng();
            (0..self.config.max_land_count * 3)
                .map(|_| rng.gen_range(0..100u8))
                .collect::<Vec<_>>()
        };
        self.disaster_tick_with_rolls(player, now_ms, &rolls).await
    }

    /// Deterministic form of [`Self::disaster_tick`]. `rolls` holds three
    /// values in `0..100` per position (weeds, pests, water); a need appears
    /// when its roll is below the configured chance. Missing rolls never hit.
    pub async fn disaster_tick_with_rolls(
        &self,
        player: PlayerId,
        now_ms: i64,
        rolls: &[u8],
    ) -> Result<Vec<u32>, ActionError> {
        let disaster = &self.config.disaster;
        let mut args = vec![
            now_ms.to_string(),
            (disaster.interval_secs * 1000).to_string(),
            keys::plot_prefix(player),
            player.to_string(),
            disaster.weed_chance.to_string(),
            disaster.pest_chance.to_string(),
            disaster.water_chance.to_string(),
            disaster.young_crop_fraction.to_string(),
        ];
        args.extend(rolls.iter().map(|r| r.to_string()));

        let values = self
            .run(
                "disaster_tick",
                &self.scripts.disaster_tick,
                vec![keys::player(player), keys::DIRTY_PLOTS.to_string()],
                args,
            )
            .await?;

        (0..values.len())
            .map(|i| Ok(value_at::<u32>(&values, i)?))
            .collect()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn player(&self, id: PlayerId) -> Result<Option<PlayerState>, ActionError> {
        let hash = self.hot.hash(&keys::player(id)).await?;
        Ok(PlayerState::from_hash(id, &hash))
    }

    pub async fn plot(&self, id: PlayerId, position: u32) -> Result<Option<PlotState>, ActionError> {
        let hash = self.hot.hash(&keys::plot(id, position)).await?;
        Ok(PlotState::from_hash(id, position, &hash))
    }

    /// All plots of a player in position order.
    pub async fn plots(&self, id: PlayerId) -> Result<Vec<PlotState>, ActionError> {
        let Some(player) = self.player(id).await? else {
            return Err(Rejection::PlayerNotFound.into());
        };

        let plot_keys: Vec<String> = (0..player.land_count).map(|p| keys::plot(id, p)).collect();
        let hashes = self.hot.hashes(&plot_keys).await?;

        Ok(hashes
            .iter()
            .enumerate()
            .filter_map(|(position, hash)| PlotState::from_hash(id, position as u32, hash))
            .collect())
    }
}
