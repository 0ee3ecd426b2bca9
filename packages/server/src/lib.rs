// Farm State Core
//
// Cache-authoritative runtime state for the farming game. Gameplay mutations run
// as atomic scripts against the hot store; background services reconcile the
// hot store into Postgres, materialize leaderboards and fan out side effects.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
