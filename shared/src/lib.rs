//! # Shared protocol and game model
//!
//! Types used by every participant and by the relay:
//!
//! - [`phase`]: the generic `Setup -> Input.. -> Reveal -> GameOver` machine
//! - [`rules`]: the `GameRules` strategy a concrete game implements
//! - [`state`]: the replicated `GameState` and round results
//! - [`leaderboard`]: pure scoring bookkeeping and ranking
//! - [`protocol`]: message envelope and relay packets
//! - [`transport`]: the channel and roster interfaces the core consumes
//! - [`memory`]: an in-process transport for tests and local play

pub mod error;
pub mod leaderboard;
pub mod memory;
pub mod phase;
pub mod protocol;
pub mod rules;
pub mod state;
pub mod transport;

pub use error::{Error, Result};
pub use leaderboard::Standing;
pub use phase::{Phase, PhaseMachine};
pub use protocol::{topic, Envelope, Message, MessageKind, RelayPacket};
pub use rules::{GameRules, Ledger, RecordedAction, RoundLedger, RoundOutcome, Submission};
pub use state::{GameState, Player, PlayerId, RoundResult};
pub use transport::{Channel, ChannelEvent, PlayerRoster, RoomTransport, Roster, RosterEntry};

/// Seconds between host timer resync broadcasts
pub const RESYNC_INTERVAL_SECS: u32 = 2;

/// Delay before the host answers a state request, letting its subscription settle
pub const SNAPSHOT_REPLY_DELAY_MS: u64 = 300;

/// Largest datagram either side will send or accept
pub const MAX_DATAGRAM: usize = 60 * 1024;

/// Relay subscribers are dropped after this long without traffic
pub const SUBSCRIBER_TIMEOUT_SECS: u64 = 10;

/// Participants heartbeat the relay this often
pub const HEARTBEAT_INTERVAL_SECS: u64 = 3;
