//! Error type shared by the transport, relay and session layers

use std::io;

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while talking to a room channel.
///
/// None of these are fatal to a participant: callers log and drop, and the
/// worst outcome is a stalled room.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Send attempted before the channel reported itself subscribed
    #[error("channel not ready")]
    NotReady,

    #[error("channel closed")]
    ChannelClosed,

    #[error("subscription rejected: {0}")]
    Rejected(String),
}
