//! Ranking projections over Hot State.

pub mod materializer;
pub mod reads;

pub use materializer::LeaderboardMaterializer;
pub use reads::{Board, Leaderboard, LeaderboardEntry};
