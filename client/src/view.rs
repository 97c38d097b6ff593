//! What a render callback receives

use shared::{leaderboard, GameRules, GameState, Phase, Player, RoundResult, Standing};
use std::fmt;

/// Read-only slice of the projection plus the local pending action
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame<G: GameRules> {
    pub phase: Phase<G::Phase>,
    pub round: u32,
    pub max_rounds: u32,
    pub time_remaining: u32,
    pub content: Option<G::Content>,
    pub players: Vec<Player>,
    pub leaderboard: Vec<Standing>,
    pub last_result: Option<RoundResult<G>>,
    pub pending: Option<G::Action>,
}

impl<G: GameRules> RenderFrame<G> {
    pub fn new(state: &GameState<G>, time_remaining: u32, pending: Option<G::Action>) -> Self {
        Self {
            phase: state.phase.clone(),
            round: state.round,
            max_rounds: state.max_rounds,
            time_remaining,
            content: state.content.clone(),
            players: state.players.clone(),
            leaderboard: leaderboard::rank(&state.players),
            last_result: state.history.last().cloned(),
            pending,
        }
    }
}

impl<G: GameRules> fmt::Display for RenderFrame<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match &self.phase {
            Phase::Setup => "setup".to_string(),
            Phase::Input(p) => format!("{:?}", p),
            Phase::Reveal => "reveal".to_string(),
            Phase::GameOver => "game over".to_string(),
        };
        write!(
            f,
            "round {}/{} | {} | {}s |",
            self.round, self.max_rounds, phase, self.time_remaining
        )?;
        for player in &self.players {
            let mark = if player.has_acted { "*" } else { "" };
            write!(f, " {}{}:{}", player.display_name, mark, player.score)?;
        }
        if self.pending.is_some() {
            write!(f, " (sent)")?;
        }
        Ok(())
    }
}
