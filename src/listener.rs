//! Callbacks the playlist invokes synchronously on the main thread
//! whenever queue contents, queue options, or the playing song change.
//! A real daemon uses this to push MPD `idle` events to clients.

use crate::song::DetachedSong;

pub trait QueueListener {
    /// The queue's contents (not just ordering) changed.
    fn on_queue_modified(&mut self);

    /// `random`/`repeat`/`single`/`consume` changed.
    fn on_queue_options_changed(&mut self);

    /// A new song started playing.
    fn on_queue_song_started(&mut self, song: &DetachedSong);
}

/// A listener that does nothing, for callers that don't need events.
#[derive(Debug, Default)]
pub struct NullQueueListener;

impl QueueListener for NullQueueListener {
    fn on_queue_modified(&mut self) {}
    fn on_queue_options_changed(&mut self) {}
    fn on_queue_song_started(&mut self, _song: &DetachedSong) {}
}
