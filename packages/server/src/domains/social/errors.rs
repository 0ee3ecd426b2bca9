use thiserror::Error;

use crate::kernel::scripts::MalformedReply;

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("cannot follow yourself")]
    SelfFollow,

    #[error("already following")]
    AlreadyFollowing,

    #[error("not following")]
    NotFollowing,

    #[error("hot store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("database error: {0:#}")]
    Database(anyhow::Error),

    #[error(transparent)]
    MalformedReply(#[from] MalformedReply),
}

impl SocialError {
    /// Stable reason string for precondition failures.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::SelfFollow => Some("SelfFollow"),
            Self::AlreadyFollowing => Some("AlreadyFollowing"),
            Self::NotFollowing => Some("NotFollowing"),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for SocialError {
    fn from(e: anyhow::Error) -> Self {
        Self::Database(e)
    }
}
