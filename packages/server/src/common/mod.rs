// Common types and utilities shared across the application

pub mod entity_ids;
pub mod id;
pub mod pagination;
pub mod time;

pub use entity_ids::*;
pub use id::Id;
pub use pagination::{Page, PageRequest};
pub use time::{datetime_from_millis, millis_from_datetime, now_millis};
