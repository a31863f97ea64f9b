//! Resolves a bare URI (as stored in the queue, a stored playlist, or the
//! state file) into a loadable [`DetachedSong`], checking it against the
//! configured music root.

use std::sync::atomic::{AtomicBool, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use crate::error::{QueueError, QueueResult};
use crate::song::DetachedSong;

pub trait SongLoader {
    /// Resolves `uri` to a playable song, or `None` if it no longer
    /// exists (e.g. removed from the database).
    fn load_song(&self, uri: &str) -> Option<DetachedSong>;
}

/// Rejects any detached (absolute-path) URI that resolves outside
/// `music_root`, logging at most one warning regardless of how many
/// rejected songs are seen — restoring a large stale playlist shouldn't
/// flood the log.
pub struct RootRestrictedLoader<L> {
    inner: L,
    music_root: Utf8PathBuf,
    warned: AtomicBool,
}

impl<L: SongLoader> RootRestrictedLoader<L> {
    pub fn new(inner: L, music_root: Utf8PathBuf) -> Self {
        Self {
            inner,
            music_root,
            warned: AtomicBool::new(false),
        }
    }

    /// Validates and loads `uri`, returning the translated song.
    ///
    /// Mirrors `playlist_check_translate_song`: in-database and remote
    /// URIs pass straight through to the inner loader; absolute paths are
    /// checked against `music_root` first.
    pub fn check_translate(&self, uri: &str) -> QueueResult<DetachedSong> {
        let song = self.inner.load_song(uri).ok_or(QueueError::NoSuchSong)?;
        self.check_translate_song(song)
    }

    /// Validates an already-constructed song (e.g. one just parsed out of
    /// a state-file `song_begin`/`song_end` block). In-database songs are
    /// re-resolved against the loader so their tags stay fresh; detached
    /// absolute-path songs are checked against `music_root` directly
    /// rather than round-tripped through the loader (which only knows
    /// relative, in-database URIs); remote songs pass straight through.
    pub fn check_translate_song(&self, song: DetachedSong) -> QueueResult<DetachedSong> {
        if song.is_in_database() {
            return self.inner.load_song(song.uri()).ok_or(QueueError::NoSuchSong);
        }

        if song.is_absolute_file() {
            let path = Utf8Path::new(song.real_uri());
            if !path.starts_with(&self.music_root) {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    warn!(
                        target: "mpdcore::song_loader",
                        music_root = %self.music_root,
                        "rejected one or more songs outside the music root"
                    );
                }
                return Err(QueueError::NoSuchSong);
            }
        }

        Ok(song)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLoader(Option<DetachedSong>);

    impl SongLoader for FixedLoader {
        fn load_song(&self, _uri: &str) -> Option<DetachedSong> {
            self.0.clone()
        }
    }

    #[test]
    fn rejects_absolute_path_outside_root() {
        let loader = RootRestrictedLoader::new(
            FixedLoader(Some(DetachedSong::new("/outside/song.mp3"))),
            Utf8PathBuf::from("/music"),
        );
        assert_eq!(
            loader.check_translate("song.mp3").unwrap_err(),
            QueueError::NoSuchSong
        );
    }

    #[test]
    fn accepts_absolute_path_inside_root() {
        let loader = RootRestrictedLoader::new(
            FixedLoader(Some(DetachedSong::new("/music/rock/song.mp3"))),
            Utf8PathBuf::from("/music"),
        );
        assert!(loader.check_translate("rock/song.mp3").is_ok());
    }

    #[test]
    fn passes_through_in_database_uris() {
        let loader = RootRestrictedLoader::new(
            FixedLoader(Some(DetachedSong::new("rock/song.mp3"))),
            Utf8PathBuf::from("/music"),
        );
        assert!(loader.check_translate("rock/song.mp3").is_ok());
    }

    #[test]
    fn check_translate_song_validates_already_built_detached_song() {
        let loader = RootRestrictedLoader::new(FixedLoader(None), Utf8PathBuf::from("/music"));
        let song = DetachedSong::new("/music/rock/song.mp3");
        assert!(loader.check_translate_song(song).is_ok());

        let outside = DetachedSong::new("/elsewhere/song.mp3");
        assert_eq!(
            loader.check_translate_song(outside).unwrap_err(),
            QueueError::NoSuchSong
        );
    }

    #[test]
    fn check_translate_song_passes_remote_uris_through_untouched() {
        let loader = RootRestrictedLoader::new(FixedLoader(None), Utf8PathBuf::from("/music"));
        let song = DetachedSong::new("http://example.com/stream.mp3");
        assert!(loader.check_translate_song(song).is_ok());
    }

    #[test]
    fn missing_song_is_no_such_song() {
        let loader = RootRestrictedLoader::new(FixedLoader(None), Utf8PathBuf::from("/music"));
        assert_eq!(
            loader.check_translate("gone.mp3").unwrap_err(),
            QueueError::NoSuchSong
        );
    }
}
