pub mod activity;
pub mod notification;

pub use activity::*;
pub use notification::*;
