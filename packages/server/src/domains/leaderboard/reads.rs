use std::fmt;
use std::str::FromStr;

use redis::{AsyncCommands, RedisResult};
use serde::Serialize;

use crate::common::PlayerId;
use crate::kernel::{keys, HotStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Board {
    Gold,
    Level,
    /// Most recent activity first.
    Active,
}

impl Board {
    pub const ALL: [Board; 3] = [Board::Gold, Board::Level, Board::Active];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Level => "level",
            Self::Active => "active",
        }
    }

    pub fn key(&self) -> String {
        keys::leaderboard(self.as_str())
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Board {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gold" => Ok(Self::Gold),
            "level" => Ok(Self::Level),
            "active" => Ok(Self::Active),
            _ => Err(anyhow::anyhow!("Invalid leaderboard: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    /// 1-based.
    pub rank: u64,
    pub score: f64,
}

/// Read side of the materialized boards.
#[derive(Clone)]
pub struct Leaderboard {
    hot: HotStore,
}

impl Leaderboard {
    pub fn new(hot: HotStore) -> Self {
        Self { hot }
    }

    /// Highest scores first.
    pub async fn top(&self, board: Board, limit: usize) -> RedisResult<Vec<LeaderboardEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut con = self.hot.connection();
        let rows: Vec<(String, f64)> = con
            .zrevrange_withscores(board.key(), 0, limit as isize - 1)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(member, score)| PlayerId::parse(&member).ok().map(|id| (id, score)))
            .enumerate()
            .map(|(i, (player_id, score))| LeaderboardEntry {
                player_id,
                rank: i as u64 + 1,
                score,
            })
            .collect())
    }

    /// `None` when the player has not been materialized onto the board yet.
    pub async fn rank_of(
        &self,
        board: Board,
        player: PlayerId,
    ) -> RedisResult<Option<LeaderboardEntry>> {
        let mut con = self.hot.connection();
        let member = player.to_string();

        let rank: Option<u64> = con.zrevrank(board.key(), &member).await?;
        let score: Option<f64> = con.zscore(board.key(), &member).await?;

        Ok(match (rank, score) {
            (Some(rank), Some(score)) => Some(LeaderboardEntry {
                player_id: player,
                rank: rank + 1,
                score,
            }),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_keys_are_distinct() {
        let keys: std::collections::HashSet<String> = Board::ALL.iter().map(|b| b.key()).collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(Board::Gold.key(), "farm:leaderboard:gold");
    }

    #[test]
    fn test_board_parse() {
        assert_eq!("active".parse::<Board>().unwrap(), Board::Active);
        assert!("speed".parse::<Board>().is_err());
    }
}
