//! Dirty-set reconciliation from Hot State into Postgres.

pub mod worker;

pub use worker::{CycleReport, ReconciliationWorker};
