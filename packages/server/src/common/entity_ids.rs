//! Typed ID definitions for domain entities.
//!
//! Player ids arrive already resolved by the authentication gateway; the
//! typed wrapper keeps them from being confused with other uuids once inside.

pub use super::id::Id;

/// Marker type for Player entities.
pub struct Player;

/// Marker type for Notification records.
pub struct Notification;

/// Typed ID for Player entities.
pub type PlayerId = Id<Player>;

/// Typed ID for Notification records.
pub type NotificationId = Id<Notification>;
