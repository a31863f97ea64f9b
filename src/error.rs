//! Error taxonomy surfaced by the queue/playlist/state-file core.
//!
//! This mirrors MPD's `PlaylistResult` enum: the core never returns raw
//! error codes, it throws (here: returns `Err`) a typed variant that an
//! outer protocol layer maps onto whatever wire format it speaks.

use thiserror::Error;

use crate::player_control::PlayerError;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum QueueError {
    #[error("position/order/range out of bounds")]
    BadRange,

    #[error("no such song")]
    NoSuchSong,

    #[error("no such stored playlist")]
    NoSuchList,

    #[error("stored playlist already exists")]
    ListExists,

    #[error("invalid playlist name")]
    BadName,

    #[error("playlist is too large")]
    TooLarge,

    #[error("not currently playing")]
    NotPlaying,

    #[error("cannot edit the currently playing song")]
    Denied,

    #[error("database feature is disabled")]
    Disabled,

    #[error("player error: {0}")]
    Player(#[from] PlayerError),
}

pub type QueueResult<T> = Result<T, QueueError>;
