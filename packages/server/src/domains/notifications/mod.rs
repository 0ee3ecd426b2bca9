pub mod activity;
pub mod events;
pub mod models;
pub mod worker;

pub use activity::{activity_log, ActivityLog, ActivityLogWriter};
pub use events::{FanoutEvent, FanoutPlan};
pub use models::{ActivityEntry, Notification, NotificationKind};
pub use worker::FanoutWorker;
