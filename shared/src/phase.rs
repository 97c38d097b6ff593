//! Generic per-game phase machine
//!
//! Every game runs the same cycle:
//!
//! ```text
//! Setup -> Input(p1) -> ... -> Input(pn) -> Reveal -+-> Input(p1)   (round < max)
//!                                                   +-> GameOver    (round == max)
//! ```
//!
//! The game only supplies the ordered list of its input phases. Transitions
//! are evaluated by the host alone; replicas adopt whatever phase arrives in
//! a message.

use serde::{Deserialize, Serialize};

/// A phase of a game whose input phases are the closed enumeration `P`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase<P> {
    Setup,
    Input(P),
    Reveal,
    GameOver,
}

impl<P> Phase<P> {
    pub fn is_setup(&self) -> bool {
        matches!(self, Phase::Setup)
    }

    pub fn is_game_over(&self) -> bool {
        matches!(self, Phase::GameOver)
    }

    /// The game-specific input phase, if this is one
    pub fn input(&self) -> Option<&P> {
        match self {
            Phase::Input(p) => Some(p),
            _ => None,
        }
    }
}

impl<P> Default for Phase<P> {
    fn default() -> Self {
        Phase::Setup
    }
}

/// Transition table for one game
#[derive(Debug, Clone)]
pub struct PhaseMachine<P> {
    order: Vec<P>,
    min_players: usize,
    max_rounds: u32,
}

impl<P: Clone + PartialEq> PhaseMachine<P> {
    /// `order` must list at least one input phase
    pub fn new(order: Vec<P>, min_players: usize, max_rounds: u32) -> Self {
        debug_assert!(!order.is_empty(), "a game needs at least one input phase");
        Self {
            order,
            min_players,
            max_rounds: max_rounds.max(1),
        }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn first_input(&self) -> Phase<P> {
        self.order
            .first()
            .cloned()
            .map(Phase::Input)
            .unwrap_or(Phase::Reveal)
    }

    /// `Setup -> Input(first)` once enough players are present on a ready channel.
    ///
    /// Returns `None` when the game must stay where it is; an insufficient
    /// headcount is not an error.
    pub fn start(&self, current: &Phase<P>, roster_len: usize, channel_ready: bool) -> Option<Phase<P>> {
        if !current.is_setup() || !channel_ready || roster_len < self.min_players {
            return None;
        }
        Some(self.first_input())
    }

    /// Exit of an input phase: the next input phase, or `Reveal` after the last one
    pub fn after_input(&self, current: &Phase<P>) -> Option<Phase<P>> {
        let p = current.input()?;
        let idx = self.order.iter().position(|o| o == p)?;
        Some(
            self.order
                .get(idx + 1)
                .cloned()
                .map(Phase::Input)
                .unwrap_or(Phase::Reveal),
        )
    }

    /// Exit of the reveal phase for the round that just finished
    pub fn after_reveal(&self, round: u32) -> Phase<P> {
        if round < self.max_rounds {
            self.first_input()
        } else {
            Phase::GameOver
        }
    }
}
