//! Scoring bookkeeping and leaderboard ordering
//!
//! All functions here are pure. The host runs them at reveal time and ships
//! the resulting scores; replicas only ever sort what they were sent.

use crate::rules::GameRules;
use crate::state::{Player, PlayerId, RoundResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One line of the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub player_id: PlayerId,
    pub display_name: String,
    pub score: i64,
}

/// Sum of every round's awarded points, per player
pub fn totals<G: GameRules>(history: &[RoundResult<G>]) -> BTreeMap<PlayerId, i64> {
    let mut totals = BTreeMap::new();
    for result in history {
        for (player, points) in &result.points_awarded {
            *totals.entry(player.clone()).or_insert(0) += *points;
        }
    }
    totals
}

/// Overwrites each player's running score with the totals of `history`
pub fn apply_totals<G: GameRules>(players: &mut [Player], history: &[RoundResult<G>]) {
    let totals = totals(history);
    for player in players {
        player.score = totals.get(&player.id).copied().unwrap_or(0);
    }
}

/// Stable sort by score, highest first; ties keep join order
pub fn rank(players: &[Player]) -> Vec<Standing> {
    let mut standings: Vec<Standing> = players
        .iter()
        .map(|p| Standing {
            player_id: p.id.clone(),
            display_name: p.display_name.clone(),
            score: p.score,
        })
        .collect();
    standings.sort_by(|a, b| b.score.cmp(&a.score));
    standings
}

/// The unique top scorer of a round, if anyone scored at all
pub fn round_winner(points: &BTreeMap<PlayerId, i64>) -> Option<PlayerId> {
    let best = points.values().copied().max()?;
    if best <= 0 {
        return None;
    }
    let mut leaders = points.iter().filter(|(_, p)| **p == best);
    let (winner, _) = leaders.next()?;
    if leaders.next().is_some() {
        return None;
    }
    Some(winner.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RosterEntry;

    fn player(id: &str, score: i64) -> Player {
        let mut p = Player::new(&RosterEntry::new(id, id), false);
        p.score = score;
        p
    }

    #[test]
    fn test_rank_orders_by_score() {
        let players = vec![player("a", 1), player("b", 5), player("c", 3)];
        let ids: Vec<_> = rank(&players).into_iter().map(|s| s.player_id).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_rank_ties_keep_join_order() {
        let players = vec![player("a", 2), player("b", 4), player("c", 2), player("d", 4)];
        let ids: Vec<_> = rank(&players).into_iter().map(|s| s.player_id).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_round_winner_requires_unique_positive_top() {
        let mut points = BTreeMap::new();
        assert_eq!(round_winner(&points), None);

        points.insert("a".to_string(), 0);
        assert_eq!(round_winner(&points), None);

        points.insert("b".to_string(), 2);
        assert_eq!(round_winner(&points), Some("b".to_string()));

        points.insert("c".to_string(), 2);
        assert_eq!(round_winner(&points), None);
    }
}
