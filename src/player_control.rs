//! The boundary between the queue/playlist core and the actual audio
//! player. `PlayerControl` is a trait rather than a concrete type: the
//! real implementation owns a decoder thread and its own mutex, and lives
//! outside this crate entirely.

use std::time::Duration;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::song::DetachedSong;

/// Errors surfaced by the player, distinguishing where they originated so
/// callers can decide whether retrying the same song is worthwhile.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PlayerError {
    #[error("decoder error: {0}")]
    Decoder(String),

    #[error("output error: {0}")]
    Output(String),
}

/// Coarse playback state, mirroring what a `status` command reports.
/// The `Display`/`EnumString` labels are lowercase, matching the state
/// file's `state: play|pause|stop` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Stop,
    Pause,
    Play,
}

/// A snapshot of player state, returned by `GetStatus`.
#[derive(Debug, Clone, Default)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub elapsed_time: Duration,
    pub total_time: Option<Duration>,
    pub bit_rate: Option<u16>,
    pub cross_fade: Duration,
    pub mixramp_db: f32,
    pub mixramp_delay: Option<Duration>,
    pub last_error: Option<PlayerError>,
}

/// What `SyncWithPlayer` needs to decide whether the queued song has
/// become the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncInfo {
    pub state: PlayerState,
    /// Whether the player has already started decoding the queued song.
    pub has_next_song: bool,
}

/// The player-facing half of the playback contract. A real implementation
/// holds its own mutex internally; every method here is expected to be
/// safe to call from the (single) thread that owns the `Playlist`.
pub trait PlayerControl {
    /// Starts playing `song`, replacing whatever is currently playing.
    fn play(&mut self, song: DetachedSong) -> Result<(), PlayerError>;

    /// Hands the player the song that should play next, so it can
    /// pre-decode for gapless/crossfade handover.
    fn enqueue_song(&mut self, song: DetachedSong) -> Result<(), PlayerError>;

    /// Cancels a previously enqueued next-song, if the player hasn't
    /// already switched to it.
    fn cancel(&mut self);

    fn stop(&mut self);

    fn pause(&mut self);

    fn set_pause(&mut self, pause: bool);

    fn seek(&mut self, song: DetachedSong, time: Duration) -> Result<(), PlayerError>;

    fn set_cross_fade(&mut self, duration: Duration);

    fn set_mixramp_db(&mut self, db: f32);

    fn set_mixramp_delay(&mut self, delay: Option<Duration>);

    fn set_border_pause(&mut self, border_pause: bool);

    fn clear_error(&mut self);

    /// Enables whatever audio outputs the partition's config says should
    /// be on. Called once after restoring a playlist from the state file,
    /// before playback resumes, so outputs aren't silently left disabled.
    fn update_audio(&mut self);

    fn get_status(&self) -> PlayerStatus;

    fn get_sync_info(&self) -> SyncInfo;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_state_defaults_to_stop() {
        assert_eq!(PlayerState::default(), PlayerState::Stop);
    }

    #[test]
    fn player_state_labels_match_state_file_tokens() {
        assert_eq!(PlayerState::Play.to_string(), "play");
        assert_eq!("pause".parse::<PlayerState>().unwrap(), PlayerState::Pause);
    }

    #[test]
    fn player_status_defaults_are_sane() {
        let status = PlayerStatus::default();
        assert_eq!(status.state, PlayerState::Stop);
        assert_eq!(status.elapsed_time, Duration::ZERO);
        assert!(status.last_error.is_none());
    }
}
