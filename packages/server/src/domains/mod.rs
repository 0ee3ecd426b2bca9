pub mod game;
pub mod leaderboard;
pub mod notifications;
pub mod social;
pub mod sync;
