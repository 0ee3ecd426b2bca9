//! Batched activity log.
//!
//! Handlers hand entries to an [`ActivityLog`] without waiting; the single
//! [`ActivityLogWriter`] task owns the buffer and inserts it when it fills up
//! or when the flush interval elapses, whichever comes first.
//!
//! The writer ignores shutdown. It stops, after a final flush, once every
//! handle has been dropped.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::models::ActivityEntry;
use crate::kernel::Service;

pub const FLUSH_SIZE: usize = 100;
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const CHANNEL_CAPACITY: usize = 1000;

/// Cheap, cloneable handle for recording activity.
#[derive(Clone)]
pub struct ActivityLog {
    tx: mpsc::Sender<ActivityEntry>,
}

impl ActivityLog {
    /// Queue an entry. Drops it with a warning when the writer is saturated
    /// or gone.
    pub fn record(&self, entry: ActivityEntry) {
        match self.tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                warn!(action = %entry.action, "Activity log buffer full, dropping entry");
            }
            Err(TrySendError::Closed(entry)) => {
                warn!(action = %entry.action, "Activity log writer stopped, dropping entry");
            }
        }
    }
}

pub struct ActivityLogWriter {
    rx: mpsc::Receiver<ActivityEntry>,
    pool: PgPool,
    flush_size: usize,
    flush_interval: Duration,
}

/// Create a connected handle and writer.
pub fn activity_log(pool: PgPool) -> (ActivityLog, ActivityLogWriter) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        ActivityLog { tx },
        ActivityLogWriter {
            rx,
            pool,
            flush_size: FLUSH_SIZE,
            flush_interval: FLUSH_INTERVAL,
        },
    )
}

impl ActivityLogWriter {
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    async fn flush(&self, buffer: &mut Vec<ActivityEntry>) {
        if buffer.is_empty() {
            return;
        }
        match ActivityEntry::insert_batch(buffer, &self.pool).await {
            Ok(rows) => debug!(rows, "Flushed activity log"),
            Err(e) => error!(error = %e, dropped = buffer.len(), "Activity log flush failed"),
        }
        buffer.clear();
    }
}

#[async_trait]
impl Service for ActivityLogWriter {
    fn name(&self) -> &'static str {
        "activity-log"
    }

    /// Ignores the shutdown token and runs until the channel closes.
    async fn run(mut self: Box<Self>, _shutdown: CancellationToken) -> Result<()> {
        let mut buffer: Vec<ActivityEntry> = Vec::with_capacity(self.flush_size);
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = self.rx.recv() => match received {
                    Some(entry) => {
                        buffer.push(entry);
                        if buffer.len() >= self.flush_size {
                            self.flush(&mut buffer).await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => self.flush(&mut buffer).await,
            }
        }

        self.flush(&mut buffer).await;

        info!("Activity log writer stopped");
        Ok(())
    }
}
