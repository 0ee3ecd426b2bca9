//! Follow graph engine.
//!
//! Every edge lives in two ranked relations scored by creation time:
//! `social:following:{a}` holds b and `social:followers:{b}` holds a. Follow
//! and unfollow flip both relations and append a stream event in one script,
//! so neither direction is ever observed without the other.

use std::collections::HashMap;
use std::sync::Arc;

use redis::{AsyncCommands, Script};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};

use super::errors::SocialError;
use super::models::Follow;
use crate::common::{Page, PageRequest, PlayerId};
use crate::domains::game::models::{Player, PlayerProfile, PlayerState};
use crate::kernel::keys;
use crate::kernel::scripts::{invoke, MalformedReply, ScriptReply};
use crate::kernel::HotStore;

/// Most edges loaded per direction when a cold relation is rebuilt.
pub const REBUILD_LIMIT: i64 = 5000;
const FRIENDS_SCRATCH_TTL_SECS: i64 = 60;

struct SocialScripts {
    follow: Script,
    unfollow: Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowOutcome {
    pub is_mutual: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEntry {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Option<String>,
    pub level: i64,
    pub gold: i64,
    /// Unix millis the edge was created.
    pub followed_at: i64,
    pub is_mutual: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialStats {
    pub following: i64,
    pub followers: i64,
}

#[derive(Clone)]
pub struct FollowService {
    hot: HotStore,
    pool: PgPool,
    scripts: Arc<SocialScripts>,
}

impl FollowService {
    pub fn new(hot: HotStore, pool: PgPool) -> Self {
        Self {
            hot,
            pool,
            scripts: Arc::new(SocialScripts {
                follow: Script::new(include_str!("lua/follow.lua")),
                unfollow: Script::new(include_str!("lua/unfollow.lua")),
            }),
        }
    }

    pub async fn follow(
        &self,
        follower: PlayerId,
        followee: PlayerId,
        now_ms: i64,
    ) -> Result<FollowOutcome, SocialError> {
        if follower == followee {
            return Err(SocialError::SelfFollow);
        }
        self.ensure_warm(follower).await?;
        self.ensure_warm(followee).await?;

        let is_mutual = self.mutate(&self.scripts.follow, follower, followee, now_ms).await?;
        debug!(follower = %follower, followee = %followee, is_mutual, "followed");
        Ok(FollowOutcome { is_mutual })
    }

    pub async fn unfollow(
        &self,
        follower: PlayerId,
        followee: PlayerId,
        now_ms: i64,
    ) -> Result<(), SocialError> {
        if follower == followee {
            return Err(SocialError::NotFollowing);
        }
        self.ensure_warm(follower).await?;
        self.ensure_warm(followee).await?;

        self.mutate(&self.scripts.unfollow, follower, followee, now_ms)
            .await?;
        debug!(follower = %follower, followee = %followee, "unfollowed");
        Ok(())
    }

    async fn mutate(
        &self,
        script: &Script,
        follower: PlayerId,
        followee: PlayerId,
        now_ms: i64,
    ) -> Result<bool, SocialError> {
        let mut con = self.hot.connection();
        let raw = invoke(
            script,
            &[
                keys::following(follower),
                keys::followers(followee),
                keys::following(followee),
                keys::SOCIAL_EVENTS.to_string(),
                keys::SOCIAL_WARM.to_string(),
            ],
            &[follower.to_string(), followee.to_string(), now_ms.to_string()],
            &mut con,
        )
        .await?;

        match ScriptReply::decode(raw)? {
            ScriptReply::Ok(values) => Ok(values.first().map(String::as_str) == Some("true")),
            ScriptReply::Fail(reason) => Err(match reason.as_str() {
                "AlreadyFollowing" => SocialError::AlreadyFollowing,
                "NotFollowing" => SocialError::NotFollowing,
                other => MalformedReply(format!("unknown social rejection {:?}", other)).into(),
            }),
        }
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Players `user` follows, most recent first.
    pub async fn following(
        &self,
        user: PlayerId,
        page: PageRequest,
    ) -> Result<Page<FollowEntry>, SocialError> {
        self.ensure_warm(user).await?;
        self.list(&keys::following(user), Some(&keys::followers(user)), page)
            .await
    }

    /// Players following `user`, most recent first.
    pub async fn followers(
        &self,
        user: PlayerId,
        page: PageRequest,
    ) -> Result<Page<FollowEntry>, SocialError> {
        self.ensure_warm(user).await?;
        self.list(&keys::followers(user), Some(&keys::following(user)), page)
            .await
    }

    /// Mutual follows of `user`.
    pub async fn friends(
        &self,
        user: PlayerId,
        page: PageRequest,
    ) -> Result<Page<FollowEntry>, SocialError> {
        self.ensure_warm(user).await?;

        let scratch = format!("social:friends:{}", user);
        let mut con = self.hot.connection();
        let _: () = redis::pipe()
            .cmd("ZINTERSTORE")
            .arg(&scratch)
            .arg(2)
            .arg(keys::following(user))
            .arg(keys::followers(user))
            .arg("AGGREGATE")
            .arg("MAX")
            .ignore()
            .expire(&scratch, FRIENDS_SCRATCH_TTL_SECS)
            .ignore()
            .query_async(&mut con)
            .await?;

        self.list(&scratch, None, page).await
    }

    pub async fn stats(&self, user: PlayerId) -> Result<SocialStats, SocialError> {
        self.ensure_warm(user).await?;

        let mut con = self.hot.connection();
        let (following, followers): (i64, i64) = redis::pipe()
            .zcard(keys::following(user))
            .zcard(keys::followers(user))
            .query_async(&mut con)
            .await?;
        Ok(SocialStats {
            following,
            followers,
        })
    }

    /// Page `relation` by descending score. A member is mutual when it is also
    /// in `reverse`; `None` means every member is mutual.
    async fn list(
        &self,
        relation: &str,
        reverse: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<FollowEntry>, SocialError> {
        let (start, stop) = page.window();
        let mut con = self.hot.connection();

        let total: i64 = con.zcard(relation).await?;
        let rows: Vec<(String, f64)> = con.zrevrange_withscores(relation, start, stop).await?;

        let edges: Vec<(PlayerId, i64)> = rows
            .into_iter()
            .filter_map(|(member, score)| PlayerId::parse(&member).ok().map(|id| (id, score as i64)))
            .collect();
        let ids: Vec<PlayerId> = edges.iter().map(|(id, _)| *id).collect();

        let mutual: Vec<bool> = match reverse {
            Some(reverse) if !ids.is_empty() => {
                let mut pipe = redis::pipe();
                for id in &ids {
                    pipe.zscore(reverse, id.to_string());
                }
                let scores: Vec<Option<f64>> = pipe.query_async(&mut con).await?;
                scores.into_iter().map(|s| s.is_some()).collect()
            }
            Some(_) => Vec::new(),
            None => vec![true; ids.len()],
        };

        let profiles = self.profiles(&ids).await?;

        let data = edges
            .into_iter()
            .zip(mutual)
            .map(|((id, followed_at), is_mutual)| {
                let profile = profiles.get(&id);
                FollowEntry {
                    id,
                    name: profile.map(|p| p.name.clone()).unwrap_or_default(),
                    avatar: profile.and_then(|p| p.avatar.clone()),
                    level: profile.map(|p| p.level).unwrap_or(1),
                    gold: profile.map(|p| p.gold).unwrap_or(0),
                    followed_at,
                    is_mutual,
                }
            })
            .collect();

        Ok(Page::new(data, page, total))
    }

    /// Durable profiles, falling back to Hot State for players whose first
    /// reconciliation has not landed yet.
    async fn profiles(
        &self,
        ids: &[PlayerId],
    ) -> Result<HashMap<PlayerId, PlayerProfile>, SocialError> {
        let mut profiles: HashMap<PlayerId, PlayerProfile> = Player::find_profiles(ids, &self.pool)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let missing: Vec<PlayerId> = ids
            .iter()
            .filter(|id| !profiles.contains_key(*id))
            .copied()
            .collect();
        if missing.is_empty() {
            return Ok(profiles);
        }

        let player_keys: Vec<String> = missing.iter().map(|id| keys::player(*id)).collect();
        let hashes = self.hot.hashes(&player_keys).await?;
        for (id, hash) in missing.iter().zip(hashes.iter()) {
            if let Some(state) = PlayerState::from_hash(*id, hash) {
                profiles.insert(
                    *id,
                    PlayerProfile {
                        id: *id,
                        name: state.name,
                        avatar: None,
                        level: state.level,
                        gold: state.gold,
                    },
                );
            }
        }
        Ok(profiles)
    }

    // =========================================================================
    // Cache warm-up
    // =========================================================================

    /// Rebuild `user`'s ranked relations from Postgres when a relation is empty
    /// in Hot State but the durable store has edges for it.
    ///
    /// Runs at most once per player per Hot State lifetime. Once a player is in
    /// [`keys::SOCIAL_WARM`] their relations are only changed by the follow
    /// scripts, so an unfollow that edge sync has not persisted yet is never
    /// read back from Postgres.
    pub async fn ensure_warm(&self, user: PlayerId) -> Result<(), SocialError> {
        let mut con = self.hot.connection();
        let warm: bool = con.sismember(keys::SOCIAL_WARM, user.to_string()).await?;
        if warm {
            return Ok(());
        }

        let (following_card, followers_card): (i64, i64) = redis::pipe()
            .zcard(keys::following(user))
            .zcard(keys::followers(user))
            .query_async(&mut con)
            .await?;

        if following_card == 0 && Follow::count_following(user, &self.pool).await? > 0 {
            let edges = Follow::find_following(user, REBUILD_LIMIT, &self.pool).await?;
            let items: Vec<(i64, String)> = edges
                .iter()
                .map(|e| (e.created_at.timestamp_millis(), e.following_id.to_string()))
                .collect();
            let _: () = con.zadd_multiple(keys::following(user), &items).await?;
            info!(player_id = %user, count = items.len(), "rebuilt following relation");
        }

        if followers_card == 0 && Follow::count_followers(user, &self.pool).await? > 0 {
            let edges = Follow::find_followers(user, REBUILD_LIMIT, &self.pool).await?;
            let items: Vec<(i64, String)> = edges
                .iter()
                .map(|e| (e.created_at.timestamp_millis(), e.follower_id.to_string()))
                .collect();
            let _: () = con.zadd_multiple(keys::followers(user), &items).await?;
            info!(player_id = %user, count = items.len(), "rebuilt followers relation");
        }

        let _: () = con.sadd(keys::SOCIAL_WARM, user.to_string()).await?;
        Ok(())
    }
}
