//! Wire formats
//!
//! Two layers travel over UDP:
//! - `RelayPacket` between a participant and the relay (subscribe, publish, deliver)
//! - `Envelope<G>` as the opaque payload of a publish, carrying one game message
//!
//! Both are bincode encoded. Every `Message` payload is self-sufficient so a
//! receiver with no history can apply it, and applying it twice is harmless.

use crate::error::Result;
use crate::leaderboard::Standing;
use crate::phase::Phase;
use crate::rules::GameRules;
use crate::state::{GameState, Player, PlayerId, RoundResult};
use crate::transport::RosterEntry;
use bincode::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Channel topic for a game session: room id plus game namespace
pub fn topic(room: &str, game: &str) -> String {
    format!("{}:{}", room, game)
}

/// Every message kind of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    RoundStart,
    PhaseChange,
    ActionSubmit,
    ActionUpdate,
    TimerSync,
    RoundResult,
    GameOver,
    StateRequest,
    StateSnapshot,
    Presence,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::RoundStart => "round-start",
            MessageKind::PhaseChange => "phase-change",
            MessageKind::ActionSubmit => "action-submit",
            MessageKind::ActionUpdate => "action-update",
            MessageKind::TimerSync => "timer-sync",
            MessageKind::RoundResult => "round-result",
            MessageKind::GameOver => "game-over",
            MessageKind::StateRequest => "state-request",
            MessageKind::StateSnapshot => "state-snapshot",
            MessageKind::Presence => "presence",
        }
    }

    /// Event name with the game prefix, e.g. `ghostwriter:round-start`
    pub fn event_name(&self, game: &str) -> String {
        format!("{}:{}", game, self.as_str())
    }

    /// Kinds only the host emits; these carry meaningful version stamps
    pub fn from_host(&self) -> bool {
        !matches!(
            self,
            MessageKind::ActionSubmit | MessageKind::StateRequest | MessageKind::Presence
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum Message<G: GameRules> {
    /// Full slice for a fresh round; per-phase fields already reset
    RoundStart {
        round: u32,
        max_rounds: u32,
        phase: Phase<G::Phase>,
        content: G::Content,
        time_remaining: u32,
        players: Vec<Player>,
    },
    PhaseChange {
        phase: Phase<G::Phase>,
        time_remaining: u32,
        content: Option<G::Content>,
        statuses: BTreeMap<PlayerId, bool>,
    },
    /// Replica to host
    ActionSubmit {
        sender_id: PlayerId,
        action: G::Action,
    },
    /// Compact delta: who has acted in the current phase
    ActionUpdate {
        statuses: BTreeMap<PlayerId, bool>,
    },
    TimerSync {
        time_remaining: u32,
    },
    RoundResult {
        result: RoundResult<G>,
        scores: BTreeMap<PlayerId, i64>,
    },
    GameOver {
        final_scores: Vec<Standing>,
    },
    /// Replica to host, on (re)connection
    StateRequest,
    StateSnapshot {
        state: GameState<G>,
    },
    /// Replica announcing itself to the host's roster
    Presence {
        player: RosterEntry,
    },
}

impl<G: GameRules> Message<G> {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::RoundStart { .. } => MessageKind::RoundStart,
            Message::PhaseChange { .. } => MessageKind::PhaseChange,
            Message::ActionSubmit { .. } => MessageKind::ActionSubmit,
            Message::ActionUpdate { .. } => MessageKind::ActionUpdate,
            Message::TimerSync { .. } => MessageKind::TimerSync,
            Message::RoundResult { .. } => MessageKind::RoundResult,
            Message::GameOver { .. } => MessageKind::GameOver,
            Message::StateRequest => MessageKind::StateRequest,
            Message::StateSnapshot { .. } => MessageKind::StateSnapshot,
            Message::Presence { .. } => MessageKind::Presence,
        }
    }
}

/// A game message addressed to a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Envelope<G: GameRules> {
    pub room: String,
    pub sender: PlayerId,
    /// Host state version the message was produced at
    pub version: u64,
    pub message: Message<G>,
}

impl<G: GameRules> Envelope<G> {
    pub fn new(room: &str, sender: &str, version: u64, message: Message<G>) -> Self {
        Self {
            room: room.to_string(),
            sender: sender.to_string(),
            version,
            message,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(deserialize(bytes)?)
    }
}

/// Packets exchanged with the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayPacket {
    Subscribe { topic: String, member: String },
    Subscribed { topic: String },
    Rejected { reason: String },
    /// Answer to traffic from a socket the relay does not know (never
    /// subscribed, or timed out); the participant should subscribe again
    NotSubscribed,
    Publish { topic: String, payload: Vec<u8> },
    Deliver { topic: String, payload: Vec<u8> },
    Heartbeat,
    Unsubscribe { topic: String },
}

impl RelayPacket {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(deserialize(bytes)?)
    }
}
