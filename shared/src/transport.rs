//! Collaborator interfaces consumed by the replication core
//!
//! A `RoomTransport` hands out one `Channel` per room topic. Delivery is
//! best-effort: at-most-once, unordered across kinds, FIFO only per sender.
//! Inbound traffic and the readiness signal arrive on the event receiver
//! returned by `join`.

use crate::error::Result;
use crate::state::PlayerId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Inbound side of a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel is ready to send and receive
    Subscribed,
    /// A payload published by another member
    Message(Vec<u8>),
    Closed,
}

/// Outbound side of a joined channel
pub trait Channel: Send {
    fn is_ready(&self) -> bool;

    /// Fire-and-forget broadcast to every other member.
    ///
    /// Fails with `Error::NotReady` before the subscription is confirmed;
    /// callers log and drop.
    fn send(&self, payload: Vec<u8>) -> Result<()>;

    fn leave(&self);
}

pub trait RoomTransport {
    type Channel: Channel;

    /// Joins `topic` as `member`. `ChannelEvent::Subscribed` follows on the
    /// receiver once the channel is usable.
    fn join(
        &self,
        topic: &str,
        member: &str,
    ) -> Result<(Self::Channel, mpsc::UnboundedReceiver<ChannelEvent>)>;
}

/// Identity fields of a participant, as the lobby knows them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub display_name: String,
    pub avatar: String,
}

impl RosterEntry {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar: String::new(),
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = avatar.into();
        self
    }
}

/// List of participants in a room
pub trait PlayerRoster {
    fn entries(&self) -> Vec<RosterEntry>;
}

impl PlayerRoster for Vec<RosterEntry> {
    fn entries(&self) -> Vec<RosterEntry> {
        self.clone()
    }
}

/// Roster fed by presence announcements, in arrival order
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes an entry; returns true if it was new
    pub fn upsert(&mut self, entry: RosterEntry) -> bool {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                *existing = entry;
                false
            }
            None => {
                self.entries.push(entry);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PlayerRoster for Roster {
    fn entries(&self) -> Vec<RosterEntry> {
        self.entries.clone()
    }
}
