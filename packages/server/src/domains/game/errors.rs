use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::kernel::scripts::MalformedReply;

/// Why an action was refused. Expected outcomes, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    LandNotEmpty,
    NotMature,
    NotReady,
    Protected,
    NotHarvestable,
    AlreadyFullyStolen,
    AlreadyStolenByCaller,
    CannotStealOwnPlot,
    NoCareNeeded,
    InsufficientGold,
    NoCrop,
    AlreadyMature,
    LevelTooLow,
    MaxLimitReached,
    MaxTierReached,
    LandTierTooLow,
    UnknownCrop,
    NoDog,
    PlotNotFound,
    PlayerNotFound,
    AlreadyRegistered,
}

impl Rejection {
    /// Stable reason string shared with the scripts and API callers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LandNotEmpty => "LandNotEmpty",
            Self::NotMature => "NotMature",
            Self::NotReady => "NotReady",
            Self::Protected => "Protected",
            Self::NotHarvestable => "NotHarvestable",
            Self::AlreadyFullyStolen => "AlreadyFullyStolen",
            Self::AlreadyStolenByCaller => "AlreadyStolenByCaller",
            Self::CannotStealOwnPlot => "CannotStealOwnPlot",
            Self::NoCareNeeded => "NoCareNeeded",
            Self::InsufficientGold => "InsufficientGold",
            Self::NoCrop => "NoCrop",
            Self::AlreadyMature => "AlreadyMature",
            Self::LevelTooLow => "LevelTooLow",
            Self::MaxLimitReached => "MaxLimitReached",
            Self::MaxTierReached => "MaxTierReached",
            Self::LandTierTooLow => "LandTierTooLow",
            Self::UnknownCrop => "UnknownCrop",
            Self::NoDog => "NoDog",
            Self::PlotNotFound => "PlotNotFound",
            Self::PlayerNotFound => "PlayerNotFound",
            Self::AlreadyRegistered => "AlreadyRegistered",
        }
    }

    /// Resource exhaustion as opposed to a plain precondition miss.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::InsufficientGold | Self::MaxLimitReached)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rejection {
    type Err = MalformedReply;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "LandNotEmpty" => Self::LandNotEmpty,
            "NotMature" => Self::NotMature,
            "NotReady" => Self::NotReady,
            "Protected" => Self::Protected,
            "NotHarvestable" => Self::NotHarvestable,
            "AlreadyFullyStolen" => Self::AlreadyFullyStolen,
            "AlreadyStolenByCaller" => Self::AlreadyStolenByCaller,
            "CannotStealOwnPlot" => Self::CannotStealOwnPlot,
            "NoCareNeeded" => Self::NoCareNeeded,
            "InsufficientGold" => Self::InsufficientGold,
            "NoCrop" => Self::NoCrop,
            "AlreadyMature" => Self::AlreadyMature,
            "LevelTooLow" => Self::LevelTooLow,
            "MaxLimitReached" => Self::MaxLimitReached,
            "MaxTierReached" => Self::MaxTierReached,
            "LandTierTooLow" => Self::LandTierTooLow,
            "UnknownCrop" => Self::UnknownCrop,
            "NoDog" => Self::NoDog,
            "PlotNotFound" => Self::PlotNotFound,
            "PlayerNotFound" => Self::PlayerNotFound,
            "AlreadyRegistered" => Self::AlreadyRegistered,
            other => return Err(MalformedReply(format!("unknown rejection {:?}", other))),
        })
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("rejected: {0}")]
    Rejected(Rejection),

    #[error("hot store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error(transparent)]
    MalformedReply(#[from] MalformedReply),
}

impl ActionError {
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(r) => Some(*r),
            _ => None,
        }
    }
}

impl From<Rejection> for ActionError {
    fn from(r: Rejection) -> Self {
        Self::Rejected(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strings_parse_back() {
        for r in [
            Rejection::LandNotEmpty,
            Rejection::AlreadyStolenByCaller,
            Rejection::MaxTierReached,
            Rejection::AlreadyRegistered,
        ] {
            assert_eq!(r.as_str().parse::<Rejection>().unwrap(), r);
        }
        assert!("Whatever".parse::<Rejection>().is_err());
    }

    #[test]
    fn test_rejection_is_exposed() {
        let err = ActionError::from(Rejection::Protected);
        assert_eq!(err.rejection(), Some(Rejection::Protected));
        assert_eq!(err.to_string(), "rejected: Protected");
    }
}
