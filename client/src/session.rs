//! Session driver
//!
//! [`SessionCore`] glues one participant's role (host engine or replica
//! projection) to a joined [`Channel`]: it decodes inbound envelopes, routes
//! them, broadcasts whatever the host queued and feeds the render callback.
//! It is synchronous so tests can pump it by hand; [`SessionCore::run`] is
//! the async loop used by the binary.

use crate::host::{HostConfig, HostEngine, HostInbound};
use crate::replica::ReplicaView;
use crate::view::RenderFrame;
use log::{debug, info, warn};
use shared::{
    Channel, ChannelEvent, Envelope, GameRules, GameState, Message, Phase, Roster, RosterEntry,
    Standing,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub room: String,
    pub local: RosterEntry,
    pub is_host: bool,
    pub max_rounds: u32,
    pub min_players: Option<usize>,
    pub resync_interval: u32,
    /// How long the host waits before answering a state request
    pub snapshot_delay: Duration,
    /// Fixed seed for content selection and shuffles
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room: "lobby".to_string(),
            local: RosterEntry::new("player", "Player"),
            is_host: false,
            max_rounds: 3,
            min_players: None,
            resync_interval: shared::RESYNC_INTERVAL_SECS,
            snapshot_delay: Duration::from_millis(shared::SNAPSHOT_REPLY_DELAY_MS),
            seed: None,
        }
    }
}

/// Hooks into the room that hosts the game
pub trait RoomLifecycle: Send {
    /// Called once by the host when a game ends
    fn game_finished(&mut self, room: &str, standings: &[Standing]);
}

/// Lifecycle sink that only logs the final standings
pub struct LogLifecycle;

impl RoomLifecycle for LogLifecycle {
    fn game_finished(&mut self, room: &str, standings: &[Standing]) {
        for (place, standing) in standings.iter().enumerate() {
            info!(
                "[{}] #{} {} with {} points",
                room,
                place + 1,
                standing.display_name,
                standing.score
            );
        }
    }
}

pub type RenderCallback<G> = Box<dyn FnMut(&RenderFrame<G>) + Send>;

/// Commands a UI sends into a running session
#[derive(Debug, Clone)]
pub enum SessionCommand<G: GameRules> {
    Submit(G::Action),
    /// Free text, parsed by the game for the current phase
    Text(String),
    Advance,
    Reset,
    Leave,
}

enum Role<G: GameRules> {
    Host {
        engine: HostEngine<G>,
        roster: Roster,
    },
    Replica(ReplicaView<G>),
}

pub struct SessionCore<G: GameRules, C: Channel> {
    rules: G,
    config: SessionConfig,
    channel: C,
    role: Role<G>,
    snapshot_due: Option<Instant>,
    lifecycle: Option<Box<dyn RoomLifecycle>>,
    render: Option<RenderCallback<G>>,
}

impl<G: GameRules, C: Channel> SessionCore<G, C> {
    pub fn new(rules: G, config: SessionConfig, channel: C) -> Self {
        let role = if config.is_host {
            let host_config = HostConfig {
                max_rounds: config.max_rounds,
                min_players: config.min_players,
                resync_interval: config.resync_interval,
            };
            let engine = match config.seed {
                Some(seed) => {
                    HostEngine::with_seed(rules.clone(), &config.local, host_config, seed)
                }
                None => HostEngine::new(rules.clone(), &config.local, host_config),
            };
            let mut roster = Roster::new();
            roster.upsert(config.local.clone());
            Role::Host { engine, roster }
        } else {
            Role::Replica(ReplicaView::new(
                &config.room,
                config.local.clone(),
                config.resync_interval,
            ))
        };

        Self {
            rules,
            config,
            channel,
            role,
            snapshot_due: None,
            lifecycle: None,
            render: None,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: Box<dyn RoomLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn with_render(mut self, render: RenderCallback<G>) -> Self {
        self.render = Some(render);
        self
    }

    pub fn is_host(&self) -> bool {
        matches!(self.role, Role::Host { .. })
    }

    pub fn host(&self) -> Option<&HostEngine<G>> {
        match &self.role {
            Role::Host { engine, .. } => Some(engine),
            Role::Replica(_) => None,
        }
    }

    pub fn replica(&self) -> Option<&ReplicaView<G>> {
        match &self.role {
            Role::Host { .. } => None,
            Role::Replica(view) => Some(view),
        }
    }

    pub fn state(&self) -> &GameState<G> {
        match &self.role {
            Role::Host { engine, .. } => engine.state(),
            Role::Replica(view) => view.state(),
        }
    }

    pub fn frame(&self) -> RenderFrame<G> {
        match &self.role {
            Role::Host { engine, .. } => {
                RenderFrame::new(engine.state(), engine.state().time_remaining, None)
            }
            Role::Replica(view) => view.frame(),
        }
    }

    /// When the pending snapshot reply is due, if any
    pub fn snapshot_due(&self) -> Option<Instant> {
        self.snapshot_due
    }

    pub fn on_event(&mut self, event: ChannelEvent, now: Instant) {
        match event {
            ChannelEvent::Subscribed => self.on_subscribed(),
            ChannelEvent::Message(bytes) => self.on_payload(&bytes, now),
            ChannelEvent::Closed => {
                warn!("Channel for room {} closed", self.config.room);
                if let Role::Host { engine, .. } = &mut self.role {
                    engine.set_channel_ready(false);
                }
            }
        }
        self.flush();
        self.render();
    }

    fn on_subscribed(&mut self) {
        info!(
            "Subscribed to room {} as {}",
            self.config.room, self.config.local.id
        );
        match &mut self.role {
            Role::Host { engine, .. } => {
                engine.set_channel_ready(true);
            }
            Role::Replica(view) => {
                let presence = view.presence();
                let request = view.state_request();
                self.send(&presence);
                self.send(&request);
            }
        }
    }

    fn on_payload(&mut self, bytes: &[u8], now: Instant) {
        let envelope = match Envelope::<G>::decode(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Ignoring malformed payload ({} bytes): {}", bytes.len(), e);
                return;
            }
        };
        if envelope.room != self.config.room {
            debug!("Ignoring message for room {}", envelope.room);
            return;
        }

        match &mut self.role {
            Role::Host { engine, roster } => match engine.handle(&envelope) {
                HostInbound::SnapshotRequested => {
                    if self.snapshot_due.is_none() {
                        self.snapshot_due = Some(now + self.config.snapshot_delay);
                    }
                }
                HostInbound::Joined(entry) => {
                    roster.upsert(entry);
                    engine.sync_roster(&*roster);
                }
                HostInbound::Applied | HostInbound::Ignored => {}
            },
            Role::Replica(view) => {
                view.apply(&envelope);
                if view.take_presence_lost() {
                    let presence = view.presence();
                    self.send(&presence);
                }
            }
        }
    }

    /// One-second driver tick
    pub fn tick(&mut self) {
        match &mut self.role {
            Role::Host { engine, .. } => engine.tick(),
            Role::Replica(view) => {
                view.tick_local();
            }
        }
        self.flush();
        self.render();
    }

    /// Sends the delayed snapshot reply once it is due
    pub fn poll(&mut self, now: Instant) {
        let Some(due) = self.snapshot_due else {
            return;
        };
        if now < due {
            return;
        }
        self.snapshot_due = None;
        if let Role::Host { engine, .. } = &mut self.role {
            engine.snapshot();
        }
        self.flush();
    }

    /// Submits an action for the local player
    pub fn submit(&mut self, action: G::Action) -> bool {
        let accepted = match &mut self.role {
            Role::Host { engine, .. } => engine.submit(&self.config.local.id, action),
            Role::Replica(view) => match view.submit_local(action) {
                Some(envelope) => {
                    self.send(&envelope);
                    true
                }
                None => false,
            },
        };
        self.flush();
        self.render();
        accepted
    }

    /// Parses `text` for the current input phase and submits it
    pub fn submit_text(&mut self, text: &str) -> bool {
        let parsed = match (&self.state().phase, &self.state().content) {
            (Phase::Input(phase), Some(content)) => self.rules.parse_action(phase, content, text),
            _ => None,
        };
        match parsed {
            Some(action) => self.submit(action),
            None => {
                debug!("Could not parse {:?} for the current phase", text);
                false
            }
        }
    }

    /// Host only: leave the reveal phase early
    pub fn advance(&mut self) -> bool {
        let advanced = match &mut self.role {
            Role::Host { engine, .. } => engine.advance(),
            Role::Replica(_) => false,
        };
        self.flush();
        self.render();
        advanced
    }

    /// Host only: start a fresh game with the same players
    pub fn reset(&mut self) {
        if let Role::Host { engine, .. } = &mut self.role {
            engine.reset();
        }
        self.flush();
        self.render();
    }

    pub fn leave(&mut self) {
        info!("Leaving room {}", self.config.room);
        self.channel.leave();
    }

    /// Broadcasts everything the host engine queued
    fn flush(&mut self) {
        let Role::Host { engine, .. } = &mut self.role else {
            return;
        };
        let host_id = engine.host_id().to_string();
        let outbox = engine.drain_outbox();

        for outbound in outbox {
            if let (Message::GameOver { final_scores }, Some(lifecycle)) =
                (&outbound.message, self.lifecycle.as_mut())
            {
                lifecycle.game_finished(&self.config.room, final_scores);
            }
            let envelope = Envelope::new(
                &self.config.room,
                &host_id,
                outbound.version,
                outbound.message,
            );
            self.send(&envelope);
        }
    }

    fn send(&self, envelope: &Envelope<G>) {
        let kind = envelope.message.kind();
        let bytes = match envelope.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode {}: {}", kind.as_str(), e);
                return;
            }
        };
        if let Err(e) = self.channel.send(bytes) {
            warn!("Dropped {}: {}", kind.event_name(self.rules.name()), e);
        }
    }

    fn render(&mut self) {
        if self.render.is_none() {
            return;
        }
        let frame = self.frame();
        if let Some(render) = self.render.as_mut() {
            render(&frame);
        }
    }

    /// Drives the session until the channel closes or `Leave` arrives
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
        mut commands: mpsc::UnboundedReceiver<SessionCommand<G>>,
    ) -> shared::Result<()> {
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            let due = self.snapshot_due;
            let snapshot_timer = async move {
                match due {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                event = events.recv() => match event {
                    Some(ChannelEvent::Closed) | None => {
                        self.on_event(ChannelEvent::Closed, Instant::now());
                        break;
                    }
                    Some(event) => self.on_event(event, Instant::now()),
                },

                _ = ticker.tick() => self.tick(),

                _ = snapshot_timer => self.poll(Instant::now()),

                command = commands.recv() => match command {
                    Some(SessionCommand::Submit(action)) => {
                        self.submit(action);
                    }
                    Some(SessionCommand::Text(text)) => {
                        if !self.submit_text(&text) {
                            info!("Input {:?} not accepted right now", text);
                        }
                    }
                    Some(SessionCommand::Advance) => {
                        self.advance();
                    }
                    Some(SessionCommand::Reset) => self.reset(),
                    Some(SessionCommand::Leave) | None => break,
                },
            }
        }

        self.leave();
        Ok(())
    }
}
