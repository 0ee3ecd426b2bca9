//! Player and plot state, game balance, and the atomic action engine.

pub mod actions;
pub mod config;
pub mod errors;
pub mod models;

pub use actions::*;
pub use config::{CareKind, Crop, FertilizerKind, GameConfig, LandTier};
pub use errors::{ActionError, Rejection};
pub use models::{Player, PlayerProfile, PlayerState, Plot, PlotState, PlotStatus};
