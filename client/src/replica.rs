//! Replica projection
//!
//! A replica never runs game logic. It applies whatever the host sends,
//! keeps the local player's not-yet-confirmed action in a separate overlay
//! and derives its leaderboard from the replicated scores.
//!
//! Late joining is handled here as well: on `Subscribed` the session sends
//! [`ReplicaView::state_request`], and the host's snapshot is merged by
//! player id in [`ReplicaView::apply`].

use crate::timer::DisplayClock;
use crate::view::RenderFrame;
use log::{debug, trace};
use shared::{
    leaderboard, Envelope, GameRules, GameState, Message, Phase, PlayerId, RosterEntry, Standing,
};
use std::collections::BTreeMap;

/// Outcome of applying one envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// Older than the last applied host version
    Stale,
    /// Not addressed to replicas
    Ignored,
}

/// Optimistic local action the host has not confirmed yet
#[derive(Debug, Clone, PartialEq)]
pub struct Pending<G: GameRules> {
    pub phase: G::Phase,
    pub action: G::Action,
}

pub struct ReplicaView<G: GameRules> {
    room: String,
    local: RosterEntry,
    state: GameState<G>,
    /// Highest host version applied so far
    version: u64,
    pending: Option<Pending<G>>,
    clock: DisplayClock,
    final_scores: Option<Vec<Standing>>,
    /// A host roster arrived without the local player
    presence_lost: bool,
}

impl<G: GameRules> ReplicaView<G> {
    pub fn new(room: &str, local: RosterEntry, resync_interval: u32) -> Self {
        Self {
            room: room.to_string(),
            local,
            state: GameState::new(0),
            version: 0,
            pending: None,
            clock: DisplayClock::new(resync_interval),
            final_scores: None,
            presence_lost: false,
        }
    }

    pub fn state(&self) -> &GameState<G> {
        &self.state
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn local_id(&self) -> &PlayerId {
        &self.local.id
    }

    pub fn pending(&self) -> Option<&Pending<G>> {
        self.pending.as_ref()
    }

    pub fn final_scores(&self) -> Option<&[Standing]> {
        self.final_scores.as_deref()
    }

    /// Whether the local player counts as done, overlay included
    pub fn has_acted(&self) -> bool {
        self.pending.is_some()
            || self
                .state
                .player(&self.local.id)
                .map(|p| p.has_acted)
                .unwrap_or(false)
    }

    /// Sorted replicated scores; never recomputed from history
    pub fn leaderboard(&self) -> Vec<Standing> {
        leaderboard::rank(&self.state.players)
    }

    pub fn apply(&mut self, envelope: &Envelope<G>) -> Applied {
        let kind = envelope.message.kind();
        if !kind.from_host() {
            return Applied::Ignored;
        }
        if envelope.version < self.version {
            debug!(
                "Dropping stale {} v{} (at v{})",
                kind.as_str(),
                envelope.version,
                self.version
            );
            return Applied::Stale;
        }
        self.version = envelope.version;
        trace!("Applying {} v{}", kind.as_str(), envelope.version);

        match &envelope.message {
            Message::RoundStart {
                round,
                max_rounds,
                phase,
                content,
                time_remaining,
                players,
            } => {
                self.state.round = *round;
                self.state.max_rounds = *max_rounds;
                self.state.phase = phase.clone();
                self.state.content = Some(content.clone());
                self.state.time_remaining = *time_remaining;
                self.state.merge_players(players);
                self.note_listed(players.iter().any(|p| p.id == self.local.id));
                self.state.reset_acted();
                self.clock.sync(*time_remaining);
                self.final_scores = None;
                self.pending = None;
            }
            Message::PhaseChange {
                phase,
                time_remaining,
                content,
                statuses,
            } => {
                self.state.phase = phase.clone();
                self.state.time_remaining = *time_remaining;
                if let Some(content) = content {
                    self.state.content = Some(content.clone());
                }
                self.apply_statuses(statuses);
                self.note_listed(statuses.contains_key(&self.local.id));
                self.clock.sync(*time_remaining);
                self.pending = None;
            }
            Message::ActionUpdate { statuses } => {
                self.apply_statuses(statuses);
                self.note_listed(statuses.contains_key(&self.local.id));
                if statuses.contains_key(&self.local.id) {
                    self.pending = None;
                }
            }
            Message::TimerSync { time_remaining } => {
                self.state.time_remaining = *time_remaining;
                self.clock.sync(*time_remaining);
            }
            Message::RoundResult { result, scores } => {
                if !self.state.history.iter().any(|r| r.round == result.round) {
                    self.state.history.push(result.clone());
                }
                self.apply_scores(scores);
            }
            Message::GameOver { final_scores } => {
                self.state.phase = Phase::GameOver;
                self.state.time_remaining = 0;
                for standing in final_scores {
                    if let Some(p) = self.state.player_mut(&standing.player_id) {
                        p.score = standing.score;
                    }
                }
                self.clock.sync(0);
                self.final_scores = Some(final_scores.clone());
                self.pending = None;
            }
            Message::StateSnapshot { state } => self.apply_snapshot(state),
            Message::ActionSubmit { .. } | Message::StateRequest | Message::Presence { .. } => {
                return Applied::Ignored;
            }
        }
        Applied::Applied
    }

    /// Replaces the projection with `snapshot`, merging players by id
    fn apply_snapshot(&mut self, snapshot: &GameState<G>) {
        let local_players = std::mem::take(&mut self.state.players);
        self.state = snapshot.clone();
        self.state.players = local_players;
        self.state.merge_players(&snapshot.players);
        self.note_listed(snapshot.players.iter().any(|p| p.id == self.local.id));

        self.final_scores = if self.state.phase.is_game_over() {
            Some(self.leaderboard())
        } else {
            None
        };
        self.clock.sync(self.state.time_remaining);
        self.pending = None;
        debug!(
            "Snapshot applied: round {} with {} players",
            self.state.round,
            self.state.players.len()
        );
    }

    fn note_listed(&mut self, listed: bool) {
        if !listed {
            debug!("Host roster lacks {}, presence needs resending", self.local.id);
        }
        self.presence_lost = !listed;
    }

    /// True once after a host roster arrived without the local player; the
    /// session answers with another `Presence`
    pub fn take_presence_lost(&mut self) -> bool {
        std::mem::take(&mut self.presence_lost)
    }

    fn apply_statuses(&mut self, statuses: &BTreeMap<PlayerId, bool>) {
        for (id, acted) in statuses {
            if let Some(p) = self.state.player_mut(id) {
                p.has_acted = *acted;
            }
        }
    }

    fn apply_scores(&mut self, scores: &BTreeMap<PlayerId, i64>) {
        for (id, score) in scores {
            if let Some(p) = self.state.player_mut(id) {
                p.score = *score;
            }
        }
    }

    /// Records an optimistic local action and builds the submission for the
    /// host. Returns `None` outside an input phase or when already acted.
    pub fn submit_local(&mut self, action: G::Action) -> Option<Envelope<G>> {
        let phase = self.state.phase.input()?.clone();
        if self.has_acted() {
            debug!("Local player already acted in {:?}", phase);
            return None;
        }
        self.pending = Some(Pending {
            phase,
            action: action.clone(),
        });
        Some(self.envelope(Message::ActionSubmit {
            sender_id: self.local.id.clone(),
            action,
        }))
    }

    pub fn state_request(&self) -> Envelope<G> {
        self.envelope(Message::StateRequest)
    }

    pub fn presence(&self) -> Envelope<G> {
        self.envelope(Message::Presence {
            player: self.local.clone(),
        })
    }

    fn envelope(&self, message: Message<G>) -> Envelope<G> {
        Envelope::new(&self.room, &self.local.id, self.version, message)
    }

    /// Local one-second display tick between host resyncs
    pub fn tick_local(&mut self) -> u32 {
        self.clock.tick()
    }

    pub fn frame(&self) -> RenderFrame<G> {
        RenderFrame::new(
            &self.state,
            self.clock.shown(),
            self.pending.as_ref().map(|p| p.action.clone()),
        )
    }
}
