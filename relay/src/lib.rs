//! # Room Relay Library
//!
//! This library provides the broadcast channel party-game participants talk
//! through. The relay knows nothing about games: it forwards opaque payloads
//! between the sockets subscribed to the same room topic.
//!
//! ## Core Responsibilities
//!
//! ### Topic Subscriptions
//! A participant subscribes one UDP socket to one topic (`"{room}:{game}"`)
//! and receives a `Subscribed` confirmation. That confirmation is what a
//! participant treats as "channel ready". A topic exists for as long as it
//! has subscribers.
//!
//! ### Fan-out
//! Every `Publish` is delivered to every other subscriber of the topic. The
//! publisher never receives its own message.
//!
//! ### Subscriber Health
//! Participants heartbeat periodically. Sockets that stay silent longer than
//! the configured timeout are dropped, which is how crashed participants and
//! abandoned rooms get cleaned up. A dropped socket that keeps talking gets
//! `NotSubscribed` back and subscribes again.
//!
//! ## Delivery Guarantees
//!
//! None beyond UDP: no acknowledgments, no retransmission, no ordering
//! across senders. The game protocol above is built for exactly that: every
//! message is self-sufficient, idempotent and version stamped.
//!
//! ## Module Organization
//!
//! ### Subscribers Module (`subscribers`)
//! The subscription table:
//! - Subscribe, renew and unsubscribe by socket address
//! - Capacity enforcement
//! - Timeout detection and cleanup
//! - Peer lookup for fan-out
//!
//! ### Network Module (`network`)
//! The relay server itself:
//! - UDP socket management and packet decoding
//! - Subscribe/publish/heartbeat handling
//! - Outgoing queue and per-topic fan-out
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use relay::network::{RelayConfig, RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut relay = RelayServer::bind("127.0.0.1:9000", RelayConfig::default()).await?;
//!
//!     // Runs until a `RelayEvent::Shutdown` arrives on `relay.control()`:
//!     // - Receiver task decodes incoming packets
//!     // - Sender task delivers replies and fan-out
//!     // - Timeout checker drops silent subscribers
//!     relay.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod subscribers;
