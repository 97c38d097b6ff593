//! Replicated game state
//!
//! `GameState` is exactly what a snapshot carries: the host owns the one
//! authoritative copy and replicas hold a projection of it. Host-private
//! bookkeeping (the round ledger, timers) lives outside of it.

use crate::phase::Phase;
use crate::rules::{GameRules, RecordedAction};
use crate::transport::RosterEntry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Stable participant identity, the same across reconnects
pub type PlayerId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub avatar: String,
    pub is_host: bool,
    pub score: i64,
    /// Submitted in the current input phase
    pub has_acted: bool,
}

impl Player {
    pub fn new(entry: &RosterEntry, is_host: bool) -> Self {
        Self {
            id: entry.id.clone(),
            display_name: entry.display_name.clone(),
            avatar: entry.avatar.clone(),
            is_host,
            score: 0,
            has_acted: false,
        }
    }
}

/// Write-once record of a finished round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct RoundResult<G: GameRules> {
    pub round: u32,
    pub content: G::Content,
    pub submissions: Vec<RecordedAction<G::Phase, G::Action>>,
    pub tally: BTreeMap<PlayerId, u32>,
    pub winner: Option<PlayerId>,
    pub points_awarded: BTreeMap<PlayerId, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct GameState<G: GameRules> {
    pub phase: Phase<G::Phase>,
    pub round: u32,
    pub max_rounds: u32,
    /// Join order; also the leaderboard tie-break
    pub players: Vec<Player>,
    /// Seconds left on the current phase countdown
    pub time_remaining: u32,
    pub content: Option<G::Content>,
    pub history: Vec<RoundResult<G>>,
    /// Keys of content already shown this game
    pub used_content: BTreeSet<String>,
}

impl<G: GameRules> GameState<G> {
    pub fn new(max_rounds: u32) -> Self {
        Self {
            phase: Phase::Setup,
            round: 0,
            max_rounds,
            players: Vec::new(),
            time_remaining: 0,
            content: None,
            history: Vec::new(),
            used_content: BTreeSet::new(),
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    /// Adds a player unless one with the same id is already present.
    ///
    /// A second host is never admitted: `is_host` is downgraded when the
    /// state already has one.
    pub fn add_player(&mut self, entry: &RosterEntry, is_host: bool) -> bool {
        if self.player(&entry.id).is_some() {
            return false;
        }
        let is_host = is_host && self.host().is_none();
        self.players.push(Player::new(entry, is_host));
        true
    }

    pub fn reset_acted(&mut self) {
        for player in &mut self.players {
            player.has_acted = false;
        }
    }

    pub fn statuses(&self) -> BTreeMap<PlayerId, bool> {
        self.players
            .iter()
            .map(|p| (p.id.clone(), p.has_acted))
            .collect()
    }

    pub fn scores(&self) -> BTreeMap<PlayerId, i64> {
        self.players
            .iter()
            .map(|p| (p.id.clone(), p.score))
            .collect()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id.clone()).collect()
    }

    /// Merges an incoming player list by id.
    ///
    /// Known players are overwritten with the incoming record, unknown ones
    /// are appended in incoming order, and local players missing from the
    /// incoming list are kept.
    pub fn merge_players(&mut self, incoming: &[Player]) {
        for player in incoming {
            match self.player_mut(&player.id) {
                Some(existing) => *existing = player.clone(),
                None => self.players.push(player.clone()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Ledger, RoundOutcome};
    use rand::rngs::StdRng;

    #[derive(Debug, Clone, PartialEq)]
    struct Dummy;

    impl GameRules for Dummy {
        type Phase = u8;
        type Content = String;
        type Action = String;

        fn name(&self) -> &'static str {
            "dummy"
        }
        fn input_phases(&self) -> Vec<u8> {
            vec![0]
        }
        fn min_players(&self) -> usize {
            1
        }
        fn phase_seconds(&self, _phase: &Phase<u8>) -> u32 {
            10
        }
        fn generate_content(
            &self,
            _round: u32,
            _used: &BTreeSet<String>,
            _rng: &mut StdRng,
        ) -> (String, String) {
            ("k".into(), "c".into())
        }
        fn sentinel(&self, _phase: &u8) -> String {
            String::new()
        }
        fn score_round(&self, _content: &String, _ledger: &Ledger<Self>) -> RoundOutcome {
            RoundOutcome::default()
        }
    }

    fn entry(id: &str) -> RosterEntry {
        RosterEntry::new(id, id.to_uppercase())
    }

    #[test]
    fn test_add_player_rejects_duplicates() {
        let mut state: GameState<Dummy> = GameState::new(3);
        assert!(state.add_player(&entry("a"), true));
        assert!(!state.add_player(&entry("a"), false));
        assert_eq!(state.players.len(), 1);
    }

    #[test]
    fn test_only_one_host() {
        let mut state: GameState<Dummy> = GameState::new(3);
        state.add_player(&entry("a"), true);
        state.add_player(&entry("b"), true);
        assert_eq!(state.players.iter().filter(|p| p.is_host).count(), 1);
        assert_eq!(state.host().map(|p| p.id.as_str()), Some("a"));
    }

    #[test]
    fn test_merge_players_keeps_unlisted_and_appends_new() {
        let mut state: GameState<Dummy> = GameState::new(3);
        state.add_player(&entry("a"), true);
        state.add_player(&entry("local"), false);

        let mut a = Player::new(&entry("a"), true);
        a.score = 7;
        let c = Player::new(&entry("c"), false);
        state.merge_players(&[a, c]);

        assert_eq!(state.player_ids(), vec!["a", "local", "c"]);
        assert_eq!(state.player("a").map(|p| p.score), Some(7));
    }

    #[test]
    fn test_reset_acted() {
        let mut state: GameState<Dummy> = GameState::new(3);
        state.add_player(&entry("a"), true);
        state.players[0].has_acted = true;
        state.reset_acted();
        assert_eq!(state.statuses().get("a"), Some(&false));
    }
}
