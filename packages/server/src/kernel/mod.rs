//! Kernel module - server infrastructure and dependencies.

pub mod broadcast;
pub mod deps;
pub mod hot_store;
pub mod keys;
pub mod scripts;
pub mod service_host;

pub use broadcast::{
    player_subject, publish_json, BroadcastPublisher, LogOnlyBroadcast, NatsBroadcast,
    PublishedMessage, TestBroadcast, GLOBAL_SUBJECT,
};
pub use deps::ServerDeps;
pub use hot_store::HotStore;
pub use service_host::{Service, ServiceHost};
