//! The per-game strategy plugged into the replication engine

use crate::phase::Phase;
use crate::state::PlayerId;
use rand::rngs::StdRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

/// One recorded action of a player in an input phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission<A> {
    pub action: A,
    /// True when the host filled in the sentinel on timeout
    pub forced: bool,
}

/// Flattened view of a ledger entry, kept in round results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAction<P, A> {
    pub phase: P,
    pub player: PlayerId,
    pub action: A,
    pub forced: bool,
}

/// Host-private record of everything submitted during the current round
#[derive(Debug, Clone)]
pub struct RoundLedger<P, A> {
    phases: Vec<(P, BTreeMap<PlayerId, Submission<A>>)>,
}

impl<P: Clone + PartialEq, A: Clone> RoundLedger<P, A> {
    pub fn new() -> Self {
        Self { phases: Vec::new() }
    }

    /// Opens the bucket for `phase`; opening twice is a no-op
    pub fn open(&mut self, phase: &P) {
        if !self.phases.iter().any(|(p, _)| p == phase) {
            self.phases.push((phase.clone(), BTreeMap::new()));
        }
    }

    /// Records an action. The first submission of a player in a phase wins,
    /// later ones are ignored and `false` is returned.
    pub fn record(&mut self, phase: &P, player: &str, action: A, forced: bool) -> bool {
        self.open(phase);
        let Some((_, actions)) = self.phases.iter_mut().find(|(p, _)| p == phase) else {
            return false;
        };
        if actions.contains_key(player) {
            return false;
        }
        actions.insert(player.to_string(), Submission { action, forced });
        true
    }

    pub fn has_acted(&self, phase: &P, player: &str) -> bool {
        self.actions(phase)
            .map(|actions| actions.contains_key(player))
            .unwrap_or(false)
    }

    pub fn actions(&self, phase: &P) -> Option<&BTreeMap<PlayerId, Submission<A>>> {
        self.phases
            .iter()
            .find(|(p, _)| p == phase)
            .map(|(_, actions)| actions)
    }

    pub fn action_of(&self, phase: &P, player: &str) -> Option<&A> {
        self.actions(phase)
            .and_then(|actions| actions.get(player))
            .map(|s| &s.action)
    }

    /// Every recorded action, phase by phase
    pub fn flatten(&self) -> Vec<RecordedAction<P, A>> {
        self.phases
            .iter()
            .flat_map(|(phase, actions)| {
                actions.iter().map(move |(player, s)| RecordedAction {
                    phase: phase.clone(),
                    player: player.clone(),
                    action: s.action.clone(),
                    forced: s.forced,
                })
            })
            .collect()
    }
}

impl<P: Clone + PartialEq, A: Clone> Default for RoundLedger<P, A> {
    fn default() -> Self {
        Self::new()
    }
}

/// What a game's scoring function reports for one round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Votes received, correct identifications, ... keyed by player
    pub tally: BTreeMap<PlayerId, u32>,
    /// Points earned this round
    pub points: BTreeMap<PlayerId, i64>,
}

impl RoundOutcome {
    pub fn award(&mut self, player: &str, points: i64) {
        *self.points.entry(player.to_string()).or_insert(0) += points;
    }

    pub fn count(&mut self, player: &str) {
        *self.tally.entry(player.to_string()).or_insert(0) += 1;
    }
}

/// Ledger type of a game
pub type Ledger<G> = RoundLedger<<G as GameRules>::Phase, <G as GameRules>::Action>;

/// Strategy object describing one party game.
///
/// The engine owns the phase cycle, timers, replication and scoring
/// bookkeeping; a game only answers the questions below. Everything here is
/// evaluated on the host.
pub trait GameRules: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Closed enumeration of the game's input phases
    type Phase: Clone + Debug + PartialEq + Eq + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Public per-round content
    type Content: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// What a player submits during an input phase
    type Action: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Namespace for channel topics and message kinds
    fn name(&self) -> &'static str;

    /// Input phases in round order; never empty
    fn input_phases(&self) -> Vec<Self::Phase>;

    fn min_players(&self) -> usize;

    /// Countdown length for a timed phase
    fn phase_seconds(&self, phase: &Phase<Self::Phase>) -> u32;

    /// Picks the content of a new round and returns it with its dedup key.
    /// `used` holds the keys of everything already shown this game.
    fn generate_content(
        &self,
        round: u32,
        used: &BTreeSet<String>,
        rng: &mut StdRng,
    ) -> (String, Self::Content);

    /// Hook run when an input phase after the first is entered, e.g. to
    /// publish the shuffled answers of the previous phase.
    fn enter_phase(
        &self,
        _phase: &Self::Phase,
        _content: &mut Self::Content,
        _ledger: &Ledger<Self>,
        _rng: &mut StdRng,
    ) {
    }

    /// Players whose action is needed before `phase` can complete early.
    /// `eligible` is the roster captured when the phase was entered.
    fn required_actors(
        &self,
        _phase: &Self::Phase,
        _content: &Self::Content,
        _ledger: &Ledger<Self>,
        eligible: &[PlayerId],
    ) -> Vec<PlayerId> {
        eligible.to_vec()
    }

    /// Shape check for a submission
    fn accepts(
        &self,
        _phase: &Self::Phase,
        _player: &str,
        _action: &Self::Action,
        _content: &Self::Content,
        _ledger: &Ledger<Self>,
    ) -> bool {
        true
    }

    /// Placeholder forced onto silent players at timeout
    fn sentinel(&self, phase: &Self::Phase) -> Self::Action;

    /// Scores the finished round from its content and submissions
    fn score_round(&self, content: &Self::Content, ledger: &Ledger<Self>) -> RoundOutcome;

    /// Turns a line of text into an action, for text-driven participants
    fn parse_action(
        &self,
        _phase: &Self::Phase,
        _content: &Self::Content,
        _text: &str,
    ) -> Option<Self::Action> {
        None
    }
}
