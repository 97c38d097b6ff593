//! # Party Game Participant Library
//!
//! This library provides everything one participant of a room needs: the
//! authoritative host engine, the replica projection every other player
//! runs, the session loop that ties either role to a broadcast channel, and
//! the concrete games played on top of them.
//!
//! ## Architecture Overview
//!
//! Exactly one participant per room is the host. Only the host runs game
//! logic; everyone else mirrors what the host broadcasts. The channel is
//! best-effort, so every broadcast is designed to survive loss and
//! duplication:
//!
//! ### Host Authority
//! Every action, local or remote, goes through one mutator on the host.
//! Each visible change bumps a monotonic version stamp that travels with the
//! resulting message. Round starts, phase changes, results and game over
//! carry full slices of the state; submissions only broadcast who has acted.
//!
//! ### Replica Projection
//! Replicas apply host messages idempotently and drop anything older than
//! the last version they applied. A local submission is shown right away
//! through a pending overlay and confirmed when the host's status update
//! arrives.
//!
//! ### Late Joining
//! A replica that (re)subscribes announces itself and asks for the state.
//! The host answers after a short delay with a full snapshot, which the
//! replica merges by player id.
//!
//! ## Module Organization
//!
//! ### Host Module (`host`)
//! The authoritative engine: phase transitions, submission funnel, timeout
//! force-completion, scoring at reveal, roster sync and reset.
//!
//! ### Timer Module (`timer`)
//! The host's per-phase countdown with epoch guards and resync cadence, and
//! the replica's display clock.
//!
//! ### Replica Module (`replica`)
//! Versioned application of host messages, the pending overlay, snapshot
//! merging and the derived leaderboard.
//!
//! ### Session Module (`session`)
//! Routes channel events to the right role, broadcasts the host's queued
//! messages, answers state requests after the reply delay and drives
//! everything from an async loop.
//!
//! ### Network Module (`network`)
//! A UDP channel to the relay server implementing the shared transport
//! traits.
//!
//! ### Games Module (`games`)
//! Ghostwriter (who wrote which answer) and Caption (vote for the best
//! caption), each implementing `GameRules`.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::games::Ghostwriter;
//! use client::network::UdpTransport;
//! use client::session::{SessionCommand, SessionConfig, SessionCore};
//! use shared::{topic, GameRules, RoomTransport, RosterEntry};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let game = Ghostwriter::default();
//!     let transport = UdpTransport::new("127.0.0.1:9000".parse()?);
//!     let (channel, events) = transport.join(&topic("room-1", game.name()), "alice")?;
//!
//!     let config = SessionConfig {
//!         room: "room-1".to_string(),
//!         local: RosterEntry::new("alice", "Alice"),
//!         is_host: true,
//!         ..SessionConfig::default()
//!     };
//!     let session = SessionCore::new(game, config, channel);
//!
//!     let (_commands_tx, commands) = mpsc::unbounded_channel::<SessionCommand<Ghostwriter>>();
//!     session.run(events, commands).await?;
//!     Ok(())
//! }
//! ```

pub mod games;
pub mod host;
pub mod network;
pub mod replica;
pub mod session;
pub mod timer;
pub mod view;
