//! Song handles: self-contained descriptors that queue items own.

use std::collections::BTreeMap;
use std::time::Duration;

use camino::Utf8PathBuf;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A tag kind. `Other` covers any tag name not otherwise listed, so
/// state-file song blocks round-trip arbitrary tag lines without losing
/// them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
    Artist,
    AlbumArtist,
    Album,
    Title,
    Track,
    Disc,
    Date,
    Genre,
    Label,
    /// Any tag name this crate doesn't special-case, kept verbatim so it
    /// still round-trips through the state file.
    Other(String),
}

impl Tag {
    /// The label used for this tag's `  <TagKey>: <value>` line in a
    /// `song_begin`/`song_end` state-file block.
    pub fn label(&self) -> &str {
        match self {
            Tag::Artist => "Artist",
            Tag::AlbumArtist => "AlbumArtist",
            Tag::Album => "Album",
            Tag::Title => "Title",
            Tag::Track => "Track",
            Tag::Disc => "Disc",
            Tag::Date => "Date",
            Tag::Genre => "Genre",
            Tag::Label => "Label",
            Tag::Other(name) => name,
        }
    }

    /// Parses a `<TagKey>` label back into a `Tag`, falling back to
    /// `Other` for anything this crate doesn't special-case so unknown
    /// tags still round-trip.
    pub fn from_label(label: &str) -> Tag {
        match label {
            "Artist" => Tag::Artist,
            "AlbumArtist" => Tag::AlbumArtist,
            "Album" => Tag::Album,
            "Title" => Tag::Title,
            "Track" => Tag::Track,
            "Disc" => Tag::Disc,
            "Date" => Tag::Date,
            "Genre" => Tag::Genre,
            "Label" => Tag::Label,
            other => Tag::Other(other.to_string()),
        }
    }
}

/// A hint about the audio format of a song, used only for display/state
/// purposes here; decoding is an external collaborator's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub bits: u8,
    pub channels: u8,
}

/// A self-contained song descriptor: URI, optional resolved "real" URI,
/// tags, and virtual-track offsets.
///
/// Two songs are the same song (see [`DetachedSong::is_same`]) iff both
/// their URI and real URI match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetachedSong {
    uri: String,
    real_uri: Option<String>,
    tags: BTreeMap<Tag, String>,
    duration: Option<Duration>,
    audio_format: Option<AudioFormat>,
    last_modified: Option<Timestamp>,
    added: Option<Timestamp>,
    start_time: Duration,
    end_time: Duration,
}

impl DetachedSong {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_real_uri(mut self, real_uri: impl Into<String>) -> Self {
        self.real_uri = Some(real_uri.into());
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The URI decoders should actually open: the resolved "real" URI if
    /// one was set, otherwise the plain URI.
    pub fn real_uri(&self) -> &str {
        self.real_uri.as_deref().unwrap_or(&self.uri)
    }

    pub fn is_uri(&self, uri: &str) -> bool {
        self.uri == uri
    }

    /// Two songs are the same iff both URI and real URI match.
    pub fn is_same(&self, other: &DetachedSong) -> bool {
        self.uri == other.uri && self.real_uri() == other.real_uri()
    }

    pub fn is_real_uri(&self, real_uri: &str) -> bool {
        self.real_uri() == real_uri
    }

    /// In-database songs have a relative URI: no scheme, no absolute path.
    pub fn is_in_database(&self) -> bool {
        !has_scheme(&self.uri) && !Utf8PathBuf::from(&self.uri).is_absolute()
    }

    pub fn is_remote(&self) -> bool {
        has_scheme(self.real_uri())
    }

    pub fn is_absolute_file(&self) -> bool {
        Utf8PathBuf::from(self.real_uri()).is_absolute()
    }

    pub fn tag(&self, tag: &Tag) -> Option<&str> {
        self.tags.get(tag).map(String::as_str)
    }

    pub fn set_tag(&mut self, tag: Tag, value: impl Into<String>) {
        self.tags.insert(tag, value.into());
    }

    pub fn tags(&self) -> impl Iterator<Item = (&Tag, &str)> {
        self.tags.iter().map(|(t, v)| (t, v.as_str()))
    }

    /// Copies every tag from `other` into `self`, overwriting collisions.
    /// Used when the player delivers a freshly-decoded tag for a stream.
    pub fn move_tag_items_from(&mut self, other: DetachedSong) {
        for (tag, value) in other.tags {
            self.tags.insert(tag, value);
        }
        if other.duration.is_some() {
            self.duration = other.duration;
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }

    pub fn audio_format(&self) -> Option<AudioFormat> {
        self.audio_format
    }

    pub fn set_audio_format(&mut self, format: AudioFormat) {
        self.audio_format = Some(format);
    }

    pub fn last_modified(&self) -> Option<Timestamp> {
        self.last_modified
    }

    pub fn set_last_modified(&mut self, ts: Timestamp) {
        self.last_modified = Some(ts);
    }

    pub fn added(&self) -> Option<Timestamp> {
        self.added
    }

    pub fn set_added(&mut self, ts: Timestamp) {
        self.added = Some(ts);
    }

    pub fn start_time(&self) -> Duration {
        self.start_time
    }

    pub fn end_time(&self) -> Duration {
        self.end_time
    }

    pub fn set_start_time(&mut self, t: Duration) {
        self.start_time = t;
    }

    pub fn set_end_time(&mut self, t: Duration) {
        self.end_time = t;
    }

    /// Effective playback duration taking the virtual-track range into
    /// account, when known.
    pub fn range_duration(&self) -> Option<Duration> {
        let end = if self.end_time > Duration::ZERO {
            self.end_time
        } else {
            self.duration?
        };
        Some(end.saturating_sub(self.start_time))
    }
}

fn has_scheme(uri: &str) -> bool {
    // "scheme://..." — a run of ascii-alphanumeric/+/-/. followed by "://"
    match uri.find("://") {
        Some(idx) => uri[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            && idx > 0,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_song_has_relative_uri() {
        let song = DetachedSong::new("rock/song.mp3");
        assert!(song.is_in_database());
        assert!(!song.is_remote());
    }

    #[test]
    fn absolute_path_is_detached() {
        let song = DetachedSong::new("/srv/music/song.mp3");
        assert!(!song.is_in_database());
        assert!(song.is_absolute_file());
    }

    #[test]
    fn scheme_uri_is_detached_and_remote() {
        let song = DetachedSong::new("http://example.com/stream.mp3");
        assert!(!song.is_in_database());
        assert!(song.is_remote());
    }

    #[test]
    fn tag_label_round_trips() {
        for tag in [Tag::Artist, Tag::Album, Tag::Genre, Tag::Other("MUSICBRAINZ_TRACKID".into())] {
            assert_eq!(Tag::from_label(tag.label()), tag);
        }
    }

    #[test]
    fn same_song_requires_matching_real_uri() {
        let a = DetachedSong::new("a.mp3").with_real_uri("local:///a.mp3");
        let b = DetachedSong::new("a.mp3").with_real_uri("local:///a.mp3");
        let c = DetachedSong::new("a.mp3").with_real_uri("local:///other.mp3");
        assert!(a.is_same(&b));
        assert!(!a.is_same(&c));
    }
}
