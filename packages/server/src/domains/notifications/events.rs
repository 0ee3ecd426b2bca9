//! Side-effect events drained from the fan-out queues, and the pure mapping
//! from an event to the notifications, broadcasts and activity it produces.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::models::NotificationKind;
use crate::common::PlayerId;
use crate::domains::social::{SocialAction, SocialEvent};
use crate::kernel::keys;
use crate::kernel::{player_subject, GLOBAL_SUBJECT};

const UNKNOWN_NAME: &str = "Someone";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StealEvent {
    pub stealer_id: PlayerId,
    pub victim_id: PlayerId,
    pub position: u32,
    #[serde(default)]
    pub crop_id: String,
    pub gold: i64,
    pub stolen_count: i64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DogBiteEvent {
    pub stealer_id: PlayerId,
    pub victim_id: PlayerId,
    pub position: u32,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareEvent {
    pub operator_id: PlayerId,
    pub owner_id: PlayerId,
    pub position: u32,
    pub care_kind: String,
    pub exp: i64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearEvent {
    pub operator_id: PlayerId,
    pub owner_id: PlayerId,
    pub position: u32,
    pub previous_status: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanoutEvent {
    Steal(StealEvent),
    DogBite(DogBiteEvent),
    Social(SocialEvent),
    Care(CareEvent),
    Clear(ClearEvent),
}

impl FanoutEvent {
    /// Decode a payload by the queue it was popped from.
    pub fn parse(queue: &str, payload: &str) -> Result<Self> {
        let event = match queue {
            keys::QUEUE_STEAL => Self::Steal(serde_json::from_str(payload).context("bad steal event")?),
            keys::QUEUE_DOG => Self::DogBite(serde_json::from_str(payload).context("bad dog bite event")?),
            keys::QUEUE_SOCIAL => Self::Social(serde_json::from_str(payload).context("bad social event")?),
            keys::QUEUE_CARE => Self::Care(serde_json::from_str(payload).context("bad care event")?),
            keys::QUEUE_CLEAR => Self::Clear(serde_json::from_str(payload).context("bad clear event")?),
            other => return Err(anyhow!("unknown fan-out queue {}", other)),
        };
        Ok(event)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Steal(_) => "steal",
            Self::DogBite(_) => "dog_bite",
            Self::Social(_) => "social",
            Self::Care(_) => "care",
            Self::Clear(_) => "clear",
        }
    }

    /// Players whose display names the plan needs.
    pub fn participants(&self) -> Vec<PlayerId> {
        match self {
            Self::Steal(e) => vec![e.stealer_id, e.victim_id],
            Self::DogBite(e) => vec![e.stealer_id, e.victim_id],
            Self::Social(e) => vec![e.follower_id, e.following_id],
            Self::Care(e) => vec![e.operator_id, e.owner_id],
            Self::Clear(e) => vec![e.operator_id, e.owner_id],
        }
    }

    pub fn plan(&self, names: &HashMap<PlayerId, String>) -> FanoutPlan {
        let name = |id: &PlayerId| {
            names
                .get(id)
                .filter(|n| !n.is_empty())
                .map(String::as_str)
                .unwrap_or(UNKNOWN_NAME)
                .to_string()
        };

        match self {
            Self::Steal(e) => {
                let stealer = name(&e.stealer_id);
                let data = json!({
                    "stealerId": e.stealer_id,
                    "stealerName": stealer,
                    "position": e.position,
                    "cropId": e.crop_id,
                    "gold": e.gold,
                    "stolenCount": e.stolen_count,
                });
                FanoutPlan {
                    notifications: vec![NewNotification {
                        player_id: e.victim_id,
                        kind: NotificationKind::Steal,
                        message: format!(
                            "{} stole {} gold of {} from plot {}",
                            stealer, e.gold, e.crop_id, e.position
                        ),
                        data: data.clone(),
                    }],
                    broadcasts: vec![
                        Broadcast::to_player(e.victim_id, "steal", data),
                        Broadcast {
                            subject: GLOBAL_SUBJECT.to_string(),
                            body: json!({
                                "type": "steal",
                                "stealerName": stealer,
                                "victimName": name(&e.victim_id),
                                "gold": e.gold,
                                "timestamp": e.timestamp,
                            }),
                        },
                    ],
                    activity: Some(NewActivity {
                        player_id: e.stealer_id,
                        target_id: Some(e.victim_id),
                        action: "steal".into(),
                        detail: json!({ "position": e.position, "cropId": e.crop_id, "gold": e.gold }),
                        timestamp: e.timestamp,
                    }),
                }
            }
            Self::DogBite(e) => {
                let victim = name(&e.victim_id);
                let data = json!({
                    "victimId": e.victim_id,
                    "victimName": victim,
                    "position": e.position,
                });
                FanoutPlan {
                    notifications: vec![NewNotification {
                        player_id: e.stealer_id,
                        kind: NotificationKind::DogBite,
                        message: format!("{}'s dog chased you off plot {}", victim, e.position),
                        data: data.clone(),
                    }],
                    broadcasts: vec![
                        Broadcast::to_player(e.stealer_id, "dog_bite", data),
                        Broadcast::to_player(
                            e.victim_id,
                            "dog_guarded",
                            json!({
                                "stealerId": e.stealer_id,
                                "stealerName": name(&e.stealer_id),
                                "position": e.position,
                            }),
                        ),
                    ],
                    activity: Some(NewActivity {
                        player_id: e.stealer_id,
                        target_id: Some(e.victim_id),
                        action: "dog_bite".into(),
                        detail: json!({ "position": e.position }),
                        timestamp: e.timestamp,
                    }),
                }
            }
            Self::Social(e) => match e.action {
                SocialAction::Follow if e.is_mutual => {
                    let friends = [
                        (e.following_id, e.follower_id),
                        (e.follower_id, e.following_id),
                    ];
                    let notifications: Vec<NewNotification> = friends
                        .iter()
                        .map(|(to, friend)| NewNotification {
                            player_id: *to,
                            kind: NotificationKind::MutualFollow,
                            message: format!("You and {} are now friends!", name(friend)),
                            data: json!({
                                "friendId": friend,
                                "friendName": name(friend),
                            }),
                        })
                        .collect();
                    let broadcasts = notifications
                        .iter()
                        .map(|n| {
                            Broadcast::to_player(n.player_id, n.kind.as_str(), n.data.clone())
                        })
                        .collect();
                    FanoutPlan {
                        notifications,
                        broadcasts,
                        activity: Some(follow_activity(e)),
                    }
                }
                SocialAction::Follow => {
                    let follower = name(&e.follower_id);
                    let data = json!({
                        "followerId": e.follower_id,
                        "followerName": follower,
                        "isMutual": false,
                    });
                    FanoutPlan {
                        notifications: vec![NewNotification {
                            player_id: e.following_id,
                            kind: NotificationKind::NewFollower,
                            message: format!("{} started following you", follower),
                            data: data.clone(),
                        }],
                        broadcasts: vec![Broadcast::to_player(
                            e.following_id,
                            NotificationKind::NewFollower.as_str(),
                            data,
                        )],
                        activity: Some(follow_activity(e)),
                    }
                }
                // Unfollows are silent towards the other party.
                SocialAction::Unfollow => FanoutPlan {
                    notifications: Vec::new(),
                    broadcasts: Vec::new(),
                    activity: Some(NewActivity {
                        player_id: e.follower_id,
                        target_id: Some(e.following_id),
                        action: "unfollow".into(),
                        detail: json!({ "wasMutual": e.is_mutual }),
                        timestamp: e.timestamp,
                    }),
                },
            },
            Self::Care(e) => {
                let operator = name(&e.operator_id);
                let data = json!({
                    "operatorId": e.operator_id,
                    "operatorName": operator,
                    "position": e.position,
                    "careKind": e.care_kind,
                });
                FanoutPlan {
                    notifications: vec![NewNotification {
                        player_id: e.owner_id,
                        kind: NotificationKind::CareAssist,
                        message: format!(
                            "{} helped with {} on plot {}",
                            operator, e.care_kind, e.position
                        ),
                        data: data.clone(),
                    }],
                    broadcasts: vec![Broadcast::to_player(e.owner_id, "care_assist", data)],
                    activity: Some(NewActivity {
                        player_id: e.operator_id,
                        target_id: Some(e.owner_id),
                        action: "care".into(),
                        detail: json!({ "position": e.position, "careKind": e.care_kind, "exp": e.exp }),
                        timestamp: e.timestamp,
                    }),
                }
            }
            Self::Clear(e) => {
                let operator = name(&e.operator_id);
                let data = json!({
                    "operatorId": e.operator_id,
                    "operatorName": operator,
                    "position": e.position,
                    "previousStatus": e.previous_status,
                });
                FanoutPlan {
                    notifications: vec![NewNotification {
                        player_id: e.owner_id,
                        kind: NotificationKind::ClearAssist,
                        message: format!("{} cleared plot {} for you", operator, e.position),
                        data: data.clone(),
                    }],
                    broadcasts: vec![Broadcast::to_player(e.owner_id, "clear_assist", data)],
                    activity: Some(NewActivity {
                        player_id: e.operator_id,
                        target_id: Some(e.owner_id),
                        action: "clear".into(),
                        detail: json!({ "position": e.position }),
                        timestamp: e.timestamp,
                    }),
                }
            }
        }
    }
}

fn follow_activity(e: &SocialEvent) -> NewActivity {
    NewActivity {
        player_id: e.follower_id,
        target_id: Some(e.following_id),
        action: "follow".into(),
        detail: json!({ "isMutual": e.is_mutual }),
        timestamp: e.timestamp,
    }
}

/// Everything one event turns into.
#[derive(Debug, Clone, PartialEq)]
pub struct FanoutPlan {
    pub notifications: Vec<NewNotification>,
    pub broadcasts: Vec<Broadcast>,
    pub activity: Option<NewActivity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub player_id: PlayerId,
    pub kind: NotificationKind,
    pub message: String,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    pub subject: String,
    pub body: Value,
}

impl Broadcast {
    fn to_player(id: PlayerId, kind: &str, mut data: Value) -> Self {
        if let Value::Object(map) = &mut data {
            map.insert("type".into(), Value::String(kind.to_string()));
        }
        Self {
            subject: player_subject(id),
            body: data,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub player_id: PlayerId,
    pub target_id: Option<PlayerId>,
    pub action: String,
    pub detail: Value,
    /// Unix millis.
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pairs: &[(PlayerId, &str)]) -> HashMap<PlayerId, String> {
        pairs.iter().map(|(id, n)| (*id, n.to_string())).collect()
    }

    #[test]
    fn test_steal_payload_from_script_parses() {
        let stealer = PlayerId::new();
        let victim = PlayerId::new();
        let payload = format!(
            r#"{{"type":"steal","stealerId":"{}","victimId":"{}","position":3,"cropId":"carrot","gold":3,"stolenCount":1,"timestamp":1700000000000}}"#,
            stealer, victim
        );

        let event = FanoutEvent::parse(keys::QUEUE_STEAL, &payload).unwrap();
        let FanoutEvent::Steal(steal) = &event else {
            panic!("expected steal, got {:?}", event);
        };
        assert_eq!(steal.stealer_id, stealer);
        assert_eq!(steal.gold, 3);
        assert_eq!(event.participants(), vec![stealer, victim]);
    }

    #[test]
    fn test_unknown_queue_and_bad_payload_fail() {
        assert!(FanoutEvent::parse("farm:queue:nope", "{}").is_err());
        assert!(FanoutEvent::parse(keys::QUEUE_CARE, "not json").is_err());
    }

    #[test]
    fn test_steal_plan_notifies_victim_by_name() {
        let stealer = PlayerId::new();
        let victim = PlayerId::new();
        let event = FanoutEvent::Steal(StealEvent {
            stealer_id: stealer,
            victim_id: victim,
            position: 2,
            crop_id: "wheat".into(),
            gold: 4,
            stolen_count: 1,
            timestamp: 10,
        });

        let plan = event.plan(&names(&[(stealer, "Rin")]));
        assert_eq!(plan.notifications.len(), 1);
        let notification = &plan.notifications[0];
        assert_eq!(notification.player_id, victim);
        assert_eq!(notification.kind, NotificationKind::Steal);
        assert!(notification.message.starts_with("Rin stole 4 gold"));

        assert_eq!(plan.broadcasts.len(), 2);
        assert_eq!(plan.broadcasts[0].subject, player_subject(victim));
        assert_eq!(plan.broadcasts[0].body["type"], "steal");
        assert_eq!(plan.broadcasts[1].subject, GLOBAL_SUBJECT);
        assert_eq!(plan.broadcasts[1].body["victimName"], UNKNOWN_NAME);

        assert_eq!(plan.activity.unwrap().player_id, stealer);
    }

    #[test]
    fn test_mutual_follow_uses_mutual_kind() {
        let a = PlayerId::new();
        let b = PlayerId::new();
        let mut social = SocialEvent {
            action: SocialAction::Follow,
            follower_id: a,
            following_id: b,
            is_mutual: true,
            timestamp: 1,
        };

        let plan = FanoutEvent::Social(social.clone()).plan(&names(&[(a, "Ada"), (b, "Bea")]));
        assert_eq!(plan.notifications.len(), 2);
        assert!(plan
            .notifications
            .iter()
            .all(|n| n.kind == NotificationKind::MutualFollow));

        let to_b = &plan.notifications[0];
        assert_eq!(to_b.player_id, b);
        assert_eq!(to_b.message, "You and Ada are now friends!");
        assert_eq!(to_b.data["friendId"], a.to_string());

        let to_a = &plan.notifications[1];
        assert_eq!(to_a.player_id, a);
        assert_eq!(to_a.message, "You and Bea are now friends!");
        assert_eq!(to_a.data["friendId"], b.to_string());

        let subjects: Vec<String> = plan.broadcasts.iter().map(|c| c.subject.clone()).collect();
        assert_eq!(subjects, vec![player_subject(b), player_subject(a)]);
        assert_eq!(plan.broadcasts[1].body["type"], "mutual_follow");

        social.is_mutual = false;
        let plan = FanoutEvent::Social(social.clone()).plan(&HashMap::new());
        assert_eq!(plan.notifications.len(), 1);
        assert_eq!(plan.notifications[0].kind, NotificationKind::NewFollower);
        assert_eq!(plan.notifications[0].player_id, b);

        social.action = SocialAction::Unfollow;
        let plan = FanoutEvent::Social(social).plan(&HashMap::new());
        assert!(plan.notifications.is_empty());
        assert!(plan.broadcasts.is_empty());
        assert_eq!(plan.activity.unwrap().action, "unfollow");
    }

    #[test]
    fn test_dog_bite_notifies_the_stealer() {
        let stealer = PlayerId::new();
        let victim = PlayerId::new();
        let plan = FanoutEvent::DogBite(DogBiteEvent {
            stealer_id: stealer,
            victim_id: victim,
            position: 0,
            timestamp: 1,
        })
        .plan(&names(&[(victim, "Bo")]));

        let notification = &plan.notifications[0];
        assert_eq!(notification.player_id, stealer);
        assert_eq!(notification.kind, NotificationKind::DogBite);
        assert!(notification.message.contains("Bo's dog"));
        assert_eq!(plan.broadcasts[1].subject, player_subject(victim));
    }
}
