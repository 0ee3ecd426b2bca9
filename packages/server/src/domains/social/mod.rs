pub mod edge_sync;
pub mod errors;
pub mod events;
pub mod models;
pub mod resync;
pub mod service;

pub use edge_sync::SocialEdgeSync;
pub use errors::SocialError;
pub use events::{SocialAction, SocialEvent};
pub use models::{Follow, FollowCursor};
pub use resync::{resync_social_graph, ResyncOutcome};
pub use service::{FollowEntry, FollowOutcome, FollowService, SocialStats};
