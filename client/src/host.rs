//! Host authority engine
//!
//! The host is the only participant that runs game logic. Every action,
//! whether it comes from the host's own UI or from a replica's
//! `ActionSubmit`, goes through [`HostEngine::submit`]. After each visible
//! mutation the engine bumps its version and queues the message replicas
//! need: full slices for round starts, phase changes, results and game over,
//! a compact status delta for submissions.
//!
//! The engine performs no I/O. The session drains [`HostEngine::drain_outbox`]
//! and broadcasts whatever it finds.

use crate::timer::{PhaseTimer, TimerEvent};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    leaderboard, Envelope, GameRules, GameState, Ledger, Message, Phase, PhaseMachine, PlayerId,
    PlayerRoster, RosterEntry, RoundLedger, RoundResult,
};

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub max_rounds: u32,
    /// Overrides the game's own minimum headcount
    pub min_players: Option<usize>,
    /// Seconds between timer resync broadcasts
    pub resync_interval: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            min_players: None,
            resync_interval: shared::RESYNC_INTERVAL_SECS,
        }
    }
}

/// A queued broadcast and the state version it was produced at
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound<G: GameRules> {
    pub version: u64,
    pub message: Message<G>,
}

/// How the host reacted to an inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum HostInbound {
    /// An action went through the mutator
    Applied,
    /// A replica asked for a snapshot; answer after the reply delay
    SnapshotRequested,
    /// A replica announced itself
    Joined(RosterEntry),
    Ignored,
}

pub struct HostEngine<G: GameRules> {
    rules: G,
    machine: PhaseMachine<G::Phase>,
    state: GameState<G>,
    ledger: Ledger<G>,
    /// Roster captured when the current input phase was entered
    eligible: Vec<PlayerId>,
    timer: PhaseTimer,
    version: u64,
    host_id: PlayerId,
    channel_ready: bool,
    rng: StdRng,
    outbox: Vec<Outbound<G>>,
}

impl<G: GameRules> HostEngine<G> {
    pub fn new(rules: G, host: &RosterEntry, config: HostConfig) -> Self {
        Self::with_rng(rules, host, config, StdRng::from_entropy())
    }

    /// Deterministic content and shuffles, for tests and replays
    pub fn with_seed(rules: G, host: &RosterEntry, config: HostConfig, seed: u64) -> Self {
        Self::with_rng(rules, host, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(rules: G, host: &RosterEntry, config: HostConfig, rng: StdRng) -> Self {
        let machine = PhaseMachine::new(
            rules.input_phases(),
            config.min_players.unwrap_or_else(|| rules.min_players()),
            config.max_rounds,
        );
        let mut state = GameState::new(machine.max_rounds());
        state.add_player(host, true);

        Self {
            rules,
            machine,
            state,
            ledger: RoundLedger::new(),
            eligible: Vec::new(),
            timer: PhaseTimer::new(config.resync_interval),
            version: 0,
            host_id: host.id.clone(),
            channel_ready: false,
            rng,
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> &GameState<G> {
        &self.state
    }

    pub fn rules(&self) -> &G {
        &self.rules
    }

    pub fn ledger(&self) -> &Ledger<G> {
        &self.ledger
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    /// Epoch of the running phase timer
    pub fn phase_epoch(&self) -> u64 {
        self.timer.epoch()
    }

    pub fn drain_outbox(&mut self) -> Vec<Outbound<G>> {
        std::mem::take(&mut self.outbox)
    }

    fn bump(&mut self) {
        self.version += 1;
    }

    fn push(&mut self, message: Message<G>) {
        debug!("Queued {} at v{}", message.kind().as_str(), self.version);
        self.outbox.push(Outbound {
            version: self.version,
            message,
        });
    }

    /// Records the channel's readiness and starts the game if it now can
    pub fn set_channel_ready(&mut self, ready: bool) -> bool {
        self.channel_ready = ready;
        ready && self.maybe_start()
    }

    /// Adds roster entries the state does not know yet.
    ///
    /// Newcomers get a snapshot broadcast so every replica sees them; they
    /// take part from the next input phase on. Players are never removed.
    pub fn sync_roster(&mut self, roster: &impl PlayerRoster) -> bool {
        let mut added = false;
        for entry in roster.entries() {
            if self.state.add_player(&entry, false) {
                info!("Player {} ({}) joined", entry.id, entry.display_name);
                added = true;
            }
        }

        if added {
            self.bump();
            self.snapshot();
            self.maybe_start();
        }
        added
    }

    /// `Setup -> first input phase` once the headcount and channel allow it
    pub fn maybe_start(&mut self) -> bool {
        let next = self.machine.start(
            &self.state.phase,
            self.state.players.len(),
            self.channel_ready,
        );
        if next.is_none() {
            return false;
        }
        self.begin_round();
        true
    }

    fn begin_round(&mut self) {
        self.state.round += 1;
        let (key, content) =
            self.rules
                .generate_content(self.state.round, &self.state.used_content, &mut self.rng);
        self.state.used_content.insert(key);
        self.state.content = Some(content.clone());
        self.ledger = RoundLedger::new();
        self.state.phase = self.machine.first_input();
        self.state.reset_acted();
        self.open_phase();
        self.bump();

        info!(
            "Round {}/{} started with {} players",
            self.state.round,
            self.state.max_rounds,
            self.state.players.len()
        );
        self.push(Message::RoundStart {
            round: self.state.round,
            max_rounds: self.state.max_rounds,
            phase: self.state.phase.clone(),
            content,
            time_remaining: self.state.time_remaining,
            players: self.state.players.clone(),
        });

        self.check_completion();
    }

    fn open_phase(&mut self) {
        let seconds = self.rules.phase_seconds(&self.state.phase);
        self.state.time_remaining = seconds;
        self.timer.restart(seconds);

        if let Some(phase) = self.state.phase.input().cloned() {
            self.ledger.open(&phase);
            self.eligible = self.state.player_ids();
        }
    }

    fn required(&self, phase: &G::Phase) -> Vec<PlayerId> {
        match &self.state.content {
            Some(content) => self
                .rules
                .required_actors(phase, content, &self.ledger, &self.eligible),
            None => Vec::new(),
        }
    }

    /// The single mutator for player actions.
    ///
    /// Returns false, without changing anything, when the action is out of
    /// phase, comes from a player who is not expected to act, repeats an
    /// earlier submission or fails the game's shape check.
    pub fn submit(&mut self, player: &str, action: G::Action) -> bool {
        let Some(phase) = self.state.phase.input().cloned() else {
            debug!("Ignoring action from {} outside an input phase", player);
            return false;
        };
        if !self.required(&phase).iter().any(|id| id == player) {
            debug!("Ignoring action from {}: not expected in {:?}", player, phase);
            return false;
        }
        if self.ledger.has_acted(&phase, player) {
            return false;
        }
        let accepted = match &self.state.content {
            Some(content) => self
                .rules
                .accepts(&phase, player, &action, content, &self.ledger),
            None => false,
        };
        if !accepted {
            debug!("Rejected {:?} from {}", action, player);
            return false;
        }

        self.ledger.record(&phase, player, action, false);
        if let Some(p) = self.state.player_mut(player) {
            p.has_acted = true;
        }
        self.bump();
        self.push(Message::ActionUpdate {
            statuses: self.state.statuses(),
        });

        self.check_completion();
        true
    }

    /// Early exit once every required player is in
    fn check_completion(&mut self) {
        let Some(phase) = self.state.phase.input().cloned() else {
            return;
        };
        let required = self.required(&phase);
        if required.iter().all(|id| self.ledger.has_acted(&phase, id)) {
            debug!("All inputs in for {:?}", phase);
            self.exit_input();
        }
    }

    /// Fills in the sentinel for every required player who stayed silent
    fn force_silent(&mut self) -> usize {
        let Some(phase) = self.state.phase.input().cloned() else {
            return 0;
        };
        let mut forced = 0;
        for id in self.required(&phase) {
            if self.ledger.has_acted(&phase, &id) {
                continue;
            }
            let sentinel = self.rules.sentinel(&phase);
            self.ledger.record(&phase, &id, sentinel, true);
            if let Some(p) = self.state.player_mut(&id) {
                p.has_acted = true;
            }
            forced += 1;
        }
        forced
    }

    fn exit_input(&mut self) {
        let Some(next) = self.machine.after_input(&self.state.phase) else {
            return;
        };

        match next {
            Phase::Input(phase) => {
                self.state.phase = Phase::Input(phase.clone());
                if let Some(content) = self.state.content.as_mut() {
                    self.rules
                        .enter_phase(&phase, content, &self.ledger, &mut self.rng);
                }
                self.state.reset_acted();
                self.open_phase();
                self.bump();

                info!("Round {} entered {:?}", self.state.round, phase);
                self.push(Message::PhaseChange {
                    phase: self.state.phase.clone(),
                    time_remaining: self.state.time_remaining,
                    content: self.state.content.clone(),
                    statuses: self.state.statuses(),
                });

                self.check_completion();
            }
            _ => self.enter_reveal(),
        }
    }

    fn enter_reveal(&mut self) {
        let Some(content) = self.state.content.clone() else {
            return;
        };

        let outcome = self.rules.score_round(&content, &self.ledger);
        let result = RoundResult {
            round: self.state.round,
            content: content.clone(),
            submissions: self.ledger.flatten(),
            tally: outcome.tally,
            winner: leaderboard::round_winner(&outcome.points),
            points_awarded: outcome.points,
        };
        if !self.state.history.iter().any(|r| r.round == result.round) {
            self.state.history.push(result.clone());
        }
        leaderboard::apply_totals(&mut self.state.players, &self.state.history);

        self.state.phase = Phase::Reveal;
        self.open_phase();
        self.bump();

        info!(
            "Round {} revealed, winner: {}",
            self.state.round,
            result.winner.as_deref().unwrap_or("none")
        );
        self.push(Message::PhaseChange {
            phase: Phase::Reveal,
            time_remaining: self.state.time_remaining,
            content: Some(content),
            statuses: self.state.statuses(),
        });
        self.push(Message::RoundResult {
            result,
            scores: self.state.scores(),
        });
    }

    /// Leaves the reveal phase: next round, or game over after the last one
    pub fn advance(&mut self) -> bool {
        if self.state.phase != Phase::Reveal {
            return false;
        }
        match self.machine.after_reveal(self.state.round) {
            Phase::GameOver => self.enter_game_over(),
            _ => self.begin_round(),
        }
        true
    }

    fn enter_game_over(&mut self) {
        self.state.phase = Phase::GameOver;
        self.state.time_remaining = 0;
        self.timer.cancel();
        self.bump();

        let final_scores = leaderboard::rank(&self.state.players);
        info!(
            "Game over after {} rounds, leader: {}",
            self.state.round,
            final_scores
                .first()
                .map(|s| s.display_name.as_str())
                .unwrap_or("nobody")
        );
        self.push(Message::GameOver { final_scores });
    }

    /// One-second driver tick
    pub fn tick(&mut self) {
        match self.timer.tick() {
            TimerEvent::Idle => {}
            TimerEvent::Tick { remaining } => self.state.time_remaining = remaining,
            TimerEvent::Resync { remaining } => {
                self.state.time_remaining = remaining;
                self.push(Message::TimerSync {
                    time_remaining: remaining,
                });
            }
            TimerEvent::Expired { epoch } => {
                self.state.time_remaining = 0;
                self.expire(epoch);
            }
        }
    }

    /// Runs the exit of the phase whose timer carried `epoch`.
    ///
    /// A timer from a phase that already ended is a no-op and returns false.
    pub fn expire(&mut self, epoch: u64) -> bool {
        if epoch != self.timer.epoch() {
            debug!("Stale timer epoch {} (current {})", epoch, self.timer.epoch());
            return false;
        }
        match self.state.phase {
            Phase::Input(_) => {
                let forced = self.force_silent();
                info!("Phase timed out, {} players force-completed", forced);
                self.exit_input();
                true
            }
            Phase::Reveal => self.advance(),
            _ => false,
        }
    }

    pub fn handle(&mut self, envelope: &Envelope<G>) -> HostInbound {
        match &envelope.message {
            Message::ActionSubmit { sender_id, action } => {
                if self.submit(sender_id, action.clone()) {
                    HostInbound::Applied
                } else {
                    HostInbound::Ignored
                }
            }
            Message::StateRequest => {
                debug!("State requested by {}", envelope.sender);
                HostInbound::SnapshotRequested
            }
            Message::Presence { player } => HostInbound::Joined(player.clone()),
            other => {
                debug!(
                    "Host ignoring {} from {}",
                    other.kind().as_str(),
                    envelope.sender
                );
                HostInbound::Ignored
            }
        }
    }

    /// Queues a full snapshot of the current state
    pub fn snapshot(&mut self) {
        self.push(Message::StateSnapshot {
            state: self.state.clone(),
        });
    }

    /// Replaces the state with a fresh game, keeping the players
    pub fn reset(&mut self) {
        let mut state = GameState::new(self.machine.max_rounds());
        for player in &self.state.players {
            let mut player = player.clone();
            player.score = 0;
            player.has_acted = false;
            state.players.push(player);
        }
        self.state = state;
        self.ledger = RoundLedger::new();
        self.eligible.clear();
        self.timer.cancel();
        self.bump();

        info!("Game reset");
        self.snapshot();
        self.maybe_start();
    }
}
