use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::common::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SocialAction {
    Follow,
    Unfollow,
}

impl SocialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "FOLLOW",
            Self::Unfollow => "UNFOLLOW",
        }
    }
}

/// Follow-graph change, appended to the social stream in the same
/// transaction as the edge mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialEvent {
    pub action: SocialAction,
    pub follower_id: PlayerId,
    pub following_id: PlayerId,
    /// For FOLLOW: the reverse edge already existed. For UNFOLLOW: the pair
    /// was mutual until this call.
    pub is_mutual: bool,
    /// Unix millis; also the edge's rank score.
    pub timestamp: i64,
}

impl SocialEvent {
    /// Decode the field map of a stream entry.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| {
            fields
                .get(name)
                .map(String::as_str)
                .ok_or_else(|| anyhow!("social event missing field {}", name))
        };

        let action = match get("action")? {
            "FOLLOW" => SocialAction::Follow,
            "UNFOLLOW" => SocialAction::Unfollow,
            other => return Err(anyhow!("unknown social action {}", other)),
        };

        Ok(Self {
            action,
            follower_id: PlayerId::parse(get("followerId")?).context("bad followerId")?,
            following_id: PlayerId::parse(get("followingId")?).context("bad followingId")?,
            is_mutual: get("isMutual")? == "true",
            timestamp: get("timestamp")?.parse().context("bad timestamp")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, String)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_stream_fields_decode() {
        let a = PlayerId::new();
        let b = PlayerId::new();
        let event = SocialEvent::from_fields(&fields(&[
            ("action", "FOLLOW".into()),
            ("followerId", a.to_string()),
            ("followingId", b.to_string()),
            ("isMutual", "true".into()),
            ("timestamp", "1700000000000".into()),
        ]))
        .unwrap();

        assert_eq!(event.action, SocialAction::Follow);
        assert_eq!(event.follower_id, a);
        assert_eq!(event.following_id, b);
        assert!(event.is_mutual);
        assert_eq!(event.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_missing_or_unknown_fields_fail() {
        assert!(SocialEvent::from_fields(&fields(&[("action", "FOLLOW".into())])).is_err());
        assert!(SocialEvent::from_fields(&fields(&[
            ("action", "POKE".into()),
            ("followerId", PlayerId::new().to_string()),
            ("followingId", PlayerId::new().to_string()),
            ("isMutual", "false".into()),
            ("timestamp", "1".into()),
        ]))
        .is_err());
    }

    #[test]
    fn test_json_shape_is_camel_case() {
        let event = SocialEvent {
            action: SocialAction::Unfollow,
            follower_id: PlayerId::new(),
            following_id: PlayerId::new(),
            is_mutual: false,
            timestamp: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "UNFOLLOW");
        assert_eq!(json["isMutual"], false);
        let back: SocialEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
