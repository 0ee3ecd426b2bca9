//! Hot State key contracts.
//!
//! Every key the engine touches is built here so scripts, workers and tests
//! agree on the layout. Lua scripts that need to address plots they were not
//! handed explicitly (expand, disaster tick, registration) receive
//! [`plot_prefix`] and append the position themselves.

use crate::common::PlayerId;

pub const DIRTY_PLOTS: &str = "farm:dirty:plots";
pub const DIRTY_PLAYERS: &str = "farm:dirty:players";
/// Consumed only by the leaderboard materializer.
pub const DIRTY_LEADERBOARD: &str = "farm:dirty:leaderboard";

pub const QUEUE_STEAL: &str = "farm:queue:steal";
pub const QUEUE_DOG: &str = "farm:queue:dog";
pub const QUEUE_SOCIAL: &str = "farm:queue:social";
pub const QUEUE_CARE: &str = "farm:queue:care";
pub const QUEUE_CLEAR: &str = "farm:queue:clear";

/// All fan-out queues, in the order the blocking dequeue polls them.
pub const FANOUT_QUEUES: [&str; 5] = [QUEUE_STEAL, QUEUE_DOG, QUEUE_SOCIAL, QUEUE_CARE, QUEUE_CLEAR];

pub const SOCIAL_EVENTS: &str = "social:events";
pub const SOCIAL_EDGE_GROUP: &str = "social-edge-sync";
pub const SOCIAL_SYNCED: &str = "social:synced";
/// Players whose ranked relations in Hot State are authoritative. A member's
/// empty relation means no edges, not a cold cache.
pub const SOCIAL_WARM: &str = "social:warm";

pub fn player(id: PlayerId) -> String {
    format!("farm:player:{}", id)
}

pub fn plot_prefix(id: PlayerId) -> String {
    format!("farm:plot:{}:", id)
}

pub fn plot(id: PlayerId, position: u32) -> String {
    format!("farm:plot:{}:{}", id, position)
}

pub fn thieves(id: PlayerId, position: u32) -> String {
    format!("farm:plot:{}:{}:thieves", id, position)
}

pub fn daily_exp(id: PlayerId) -> String {
    format!("farm:daily_exp:{}", id)
}

pub fn leaderboard(board: &str) -> String {
    format!("farm:leaderboard:{}", board)
}

pub fn following(id: PlayerId) -> String {
    format!("social:following:{}", id)
}

pub fn followers(id: PlayerId) -> String {
    format!("social:followers:{}", id)
}

/// Dirty-plot set member for a plot.
pub fn plot_member(id: PlayerId, position: u32) -> String {
    format!("{}:{}", id, position)
}

/// Inverse of [`plot_member`]. Returns `None` for anything malformed.
pub fn parse_plot_member(member: &str) -> Option<(PlayerId, u32)> {
    let (id, position) = member.rsplit_once(':')?;
    Some((PlayerId::parse(id).ok()?, position.parse().ok()?))
}
