//! Persists mixer volume, output enablement, every partition's playlist,
//! and storage mounts to a line-oriented text file, and restores them on
//! startup.
//!
//! Writes are debounced: [`StateFile::check_modified`] only arms a timer
//! the first time it notices a change since the last write, so a burst of
//! queue edits costs one write, not one per edit. [`StateFile::write`]
//! replaces the file atomically (write to a temp file in the same
//! directory, then rename) so a crash mid-write never corrupts the
//! previous, still-valid copy.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::io::Write as _;
use std::str::Lines;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, error, warn};

use crate::config::StateFileConfig;
use crate::output::OutputSet;
use crate::partition::Partition;
use crate::player_control::{PlayerControl, PlayerState};
use crate::queue::{ConsumeMode, Queue, SingleMode};
use crate::song::{DetachedSong, Tag};
use crate::song_loader::{RootRestrictedLoader, SongLoader};
use crate::storage::CompositeStorage;

const SW_VOLUME: &str = "sw_volume: ";
const AUDIO_DEVICE_STATE: &str = "audio_device_state:";
const PARTITION_PREFIX: &str = "partition: ";

const STATE: &str = "state: ";
const CURRENT: &str = "current: ";
const TIME: &str = "time: ";
const RANDOM: &str = "random: ";
const REPEAT: &str = "repeat: ";
const SINGLE: &str = "single: ";
const CONSUME: &str = "consume: ";
const CROSSFADE: &str = "crossfade: ";
const MIXRAMPDB: &str = "mixrampdb: ";
const MIXRAMPDELAY: &str = "mixrampdelay: ";

const PLAYLIST_BEGIN: &str = "playlist_begin";
const PLAYLIST_END: &str = "playlist_end";
const PRIO: &str = "Prio: ";
const SONG_BEGIN: &str = "song_begin: ";
const SONG_END: &str = "song_end";
const RANGE: &str = "Range: ";
const LAST_MODIFIED: &str = "Last-Modified: ";
const ADDED: &str = "Added: ";

const MOUNT_BEGIN: &str = "mount_begin";
const MOUNT_END: &str = "mount_end";
const MOUNT_URI: &str = "uri: ";
const MOUNT_URL: &str = "mounted_url: ";

/// The first few malformed entries are logged individually; the rest are
/// only counted, so a badly truncated state file doesn't flood the log.
const MAX_LOGGED_FAILURES: usize = 8;

/// What went wrong while restoring a playlist from the state file. Kept
/// separate from [`crate::error::QueueError`] because these are counts,
/// not a single failure the caller needs to react to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub malformed_entries: usize,
}

/// A cheap fingerprint of everything that would change on disk, used to
/// decide whether a write is actually necessary. Computed only from the
/// default partition (and the storage layer, which only the default
/// partition persists mounts for) — a non-default partition's activity
/// alone never triggers a save, matching how only the default partition's
/// mixer/playlist own the top of the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Hashes {
    volume: u32,
    outputs: u32,
    playlist: u32,
    mounts: u32,
}

fn current_hashes(partitions: &[Partition], mounts: &dyn CompositeStorage) -> Hashes {
    let default = &partitions[0];
    Hashes {
        volume: default.mixer.software_volume_state_hash(),
        outputs: default.outputs.state_version(),
        playlist: playlist_hash(default),
        mounts: mounts_hash(mounts),
    }
}

fn playlist_hash(partition: &Partition) -> u32 {
    let status = partition.player.get_status();
    let mut hash = partition.playlist.queue().version;
    if partition.playlist.is_playing() {
        hash ^= (status.elapsed_time.as_secs() as u32) << 8;
    }
    if let Some(position) = partition.playlist.current_position() {
        hash ^= (position as u32) << 16;
    }
    hash ^= (status.cross_fade.as_secs() as u32) << 20;
    hash ^= (status.state as u32) << 24;
    hash ^= (partition.playlist.queue().single as u32) << 25;
    hash ^= (partition.playlist.queue().random as u32) << 27;
    hash ^= (partition.playlist.queue().repeat as u32) << 28;
    hash ^= (partition.playlist.queue().consume as u32) << 29;
    hash
}

fn mounts_hash(mounts: &dyn CompositeStorage) -> u32 {
    let mut hash = 0u32;
    for mount in mounts.mounts() {
        hash = hash.wrapping_mul(33).wrapping_add(poly_hash(mount.local_path.as_str()));
        hash = hash.wrapping_mul(33).wrapping_add(poly_hash(&mount.storage_uri));
    }
    hash
}

fn poly_hash(s: &str) -> u32 {
    s.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)))
}

/// Owns the debounce timer and the last-written fingerprint. Stateless
/// otherwise: the actual queue/playlist/mixer/output/storage state lives
/// with the caller, passed in on every call.
pub struct StateFile {
    config: StateFileConfig,
    remembered: Hashes,
    deadline: Option<Instant>,
}

impl StateFile {
    pub fn new(config: StateFileConfig) -> Self {
        Self {
            config,
            remembered: Hashes::default(),
            deadline: None,
        }
    }

    pub fn config(&self) -> &StateFileConfig {
        &self.config
    }

    fn remember(&mut self, partitions: &[Partition], mounts: &dyn CompositeStorage) {
        self.remembered = current_hashes(partitions, mounts);
    }

    fn is_modified(&self, partitions: &[Partition], mounts: &dyn CompositeStorage) -> bool {
        current_hashes(partitions, mounts) != self.remembered
    }

    /// Arms the debounce timer if the state changed since the last write
    /// and nothing is already pending. Call this regularly (e.g. once per
    /// main-loop tick); it does not write anything itself.
    pub fn check_modified(&mut self, now: Instant, partitions: &[Partition], mounts: &dyn CompositeStorage) {
        if self.deadline.is_none() && self.is_modified(partitions, mounts) {
            self.deadline = Some(now + self.config.debounce);
        }
    }

    pub fn write_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Writes the file if the debounce deadline has passed. Returns
    /// whether a write was attempted. Failures are logged, never
    /// propagated: a bad disk must not take playback down with it.
    pub fn poll(&mut self, now: Instant, partitions: &[Partition], mounts: &dyn CompositeStorage) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.write(partitions, mounts);
                true
            }
            _ => false,
        }
    }

    /// Writes immediately, bypassing the debounce timer. Used on clean
    /// shutdown, where the daemon only gets one more chance.
    pub fn force_write(&mut self, partitions: &[Partition], mounts: &dyn CompositeStorage) {
        self.deadline = None;
        self.write(partitions, mounts);
    }

    fn write(&mut self, partitions: &[Partition], mounts: &dyn CompositeStorage) {
        debug!(target: "mpdcore::state_file", path = %self.config.path, "saving state file");
        if let Err(error) = self.write_atomic(partitions, mounts) {
            error!(target: "mpdcore::state_file", %error, "failed to save state file");
        }
        self.remember(partitions, mounts);
    }

    fn write_atomic(&self, partitions: &[Partition], mounts: &dyn CompositeStorage) -> io::Result<()> {
        let contents = render_state(partitions, mounts);
        let dir = self.config.path.parent().unwrap_or_else(|| Utf8Path::new("."));
        let mut tmp = tempfile::Builder::new().prefix(".state").tempfile_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.persist(&self.config.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Loads the file at `config.path`, restoring into `partitions[0]`
    /// (the default partition, which the caller must have already
    /// created) and any further partitions named by `partition:` lines,
    /// created on demand via `make_partition`. Only a file-open failure
    /// (including "file does not exist") is surfaced as an error; every
    /// other problem is logged and the offending line is skipped.
    pub fn load<L: SongLoader>(
        &mut self,
        song_loader: &RootRestrictedLoader<L>,
        partitions: &mut Vec<Partition>,
        make_partition: impl FnMut(&str) -> Partition,
        mounts: &mut dyn CompositeStorage,
    ) -> io::Result<RestoreReport> {
        debug!(target: "mpdcore::state_file", path = %self.config.path, "loading state file");
        let text = fs::read_to_string(&self.config.path)?;
        let report = read_state(&text, &self.config, song_loader, partitions, make_partition, mounts);
        self.remember(partitions, mounts);
        Ok(report)
    }
}

// ---- writing ------------------------------------------------------------

fn render_state(partitions: &[Partition], mounts: &dyn CompositeStorage) -> String {
    let mut buf = String::new();
    for (index, partition) in partitions.iter().enumerate() {
        if index != 0 {
            writeln!(buf, "{PARTITION_PREFIX}{}", partition.name).unwrap();
        }
        save_mixer(&mut buf, partition.mixer.as_ref());
        save_outputs(&mut buf, partition.outputs.as_ref());
        save_playlist(&mut buf, partition);
        if index == 0 {
            save_mounts(&mut buf, mounts);
        }
    }
    buf
}

fn save_mixer(buf: &mut String, mixer: &dyn crate::mixer::MixerMemento) {
    if let Some(volume) = mixer.save_software_volume_state() {
        writeln!(buf, "{SW_VOLUME}{volume}").unwrap();
    }
}

fn save_outputs(buf: &mut String, outputs: &dyn OutputSet) {
    for output in outputs.outputs() {
        writeln!(buf, "{AUDIO_DEVICE_STATE}{}:{}", output.enabled as u8, output.name).unwrap();
    }
}

fn save_playlist(buf: &mut String, partition: &Partition) {
    let status = partition.player.get_status();
    writeln!(buf, "{STATE}{}", status.state).unwrap();
    if let Some(position) = partition.playlist.current_position() {
        writeln!(buf, "{CURRENT}{position}").unwrap();
        writeln!(buf, "{TIME}{:.1}", status.elapsed_time.as_secs_f64()).unwrap();
    }
    writeln!(buf, "{RANDOM}{}", partition.playlist.queue().random as u8).unwrap();
    writeln!(buf, "{REPEAT}{}", partition.playlist.queue().repeat as u8).unwrap();
    writeln!(buf, "{SINGLE}{}", partition.playlist.queue().single).unwrap();
    writeln!(buf, "{CONSUME}{}", partition.playlist.queue().consume).unwrap();
    writeln!(buf, "{CROSSFADE}{}", status.cross_fade.as_secs()).unwrap();
    writeln!(buf, "{MIXRAMPDB}{}", status.mixramp_db).unwrap();
    if let Some(delay) = status.mixramp_delay {
        writeln!(buf, "{MIXRAMPDELAY}{}", delay.as_secs_f64()).unwrap();
    }
    writeln!(buf, "{PLAYLIST_BEGIN}").unwrap();
    save_queue(buf, partition.playlist.queue());
    writeln!(buf, "{PLAYLIST_END}").unwrap();
}

fn save_queue(buf: &mut String, queue: &Queue) {
    for position in 0..queue.len() {
        let priority = queue.priority_at_position(position);
        if priority != 0 {
            writeln!(buf, "{PRIO}{priority}").unwrap();
        }
        save_song(buf, position, queue.get(position));
    }
}

fn save_song(buf: &mut String, position: usize, song: &DetachedSong) {
    let plain = song.is_in_database()
        && song.start_time() == Duration::ZERO
        && song.end_time() == Duration::ZERO
        && song.last_modified().is_none()
        && song.added().is_none();

    if plain {
        writeln!(buf, "{position}:{}", song.uri()).unwrap();
        return;
    }

    writeln!(buf, "{SONG_BEGIN}{}", song.uri()).unwrap();
    for (tag, value) in song.tags() {
        writeln!(buf, "  {}: {value}", tag.label()).unwrap();
    }
    if song.start_time() != Duration::ZERO || song.end_time() != Duration::ZERO {
        let end = if song.end_time() != Duration::ZERO {
            song.end_time().as_millis().to_string()
        } else {
            String::new()
        };
        writeln!(buf, "  {RANGE}{}-{end}", song.start_time().as_millis()).unwrap();
    }
    if let Some(ts) = song.last_modified() {
        writeln!(buf, "  {LAST_MODIFIED}{ts}").unwrap();
    }
    if let Some(ts) = song.added() {
        writeln!(buf, "  {ADDED}{ts}").unwrap();
    }
    writeln!(buf, "{SONG_END}").unwrap();
}

fn save_mounts(buf: &mut String, mounts: &dyn CompositeStorage) {
    for mount in mounts.mounts() {
        writeln!(buf, "{MOUNT_BEGIN}").unwrap();
        writeln!(buf, "{MOUNT_URI}{}", mount.local_path).unwrap();
        writeln!(buf, "{MOUNT_URL}{}", mount.storage_uri).unwrap();
        writeln!(buf, "{MOUNT_END}").unwrap();
    }
}

// ---- reading --------------------------------------------------------------

fn read_state<L: SongLoader>(
    text: &str,
    config: &StateFileConfig,
    song_loader: &RootRestrictedLoader<L>,
    partitions: &mut Vec<Partition>,
    mut make_partition: impl FnMut(&str) -> Partition,
    mounts: &mut dyn CompositeStorage,
) -> RestoreReport {
    assert!(!partitions.is_empty(), "the default partition must exist before loading state");

    let mut lines = text.lines();
    let mut current_idx = 0usize;
    let mut malformed_entries = 0usize;

    while let Some(line) = lines.next() {
        if let Some(rest) = line.strip_prefix(SW_VOLUME) {
            match rest.trim().parse::<u8>() {
                Ok(volume) => partitions[current_idx].mixer.load_software_volume_state(volume.min(100)),
                Err(_) => warn!(target: "mpdcore::state_file", line, "malformed sw_volume line"),
            }
        } else if let Some(rest) = line.strip_prefix(AUDIO_DEVICE_STATE) {
            restore_output_line(rest, partitions, current_idx);
        } else if let Some(rest) = line.strip_prefix(STATE) {
            restore_playlist(rest, &mut lines, config, song_loader, &mut partitions[current_idx], &mut malformed_entries);
        } else if let Some(name) = line.strip_prefix(PARTITION_PREFIX) {
            let name = name.trim();
            current_idx = match partitions.iter().position(|p| p.name == name) {
                Some(idx) => idx,
                None => {
                    partitions.push(make_partition(name));
                    partitions.len() - 1
                }
            };
        } else if line.starts_with(MOUNT_BEGIN) {
            if current_idx == 0 {
                restore_mount(&mut lines, mounts);
            } else {
                skip_block(&mut lines, MOUNT_END);
            }
        } else if !line.trim().is_empty() {
            warn!(target: "mpdcore::state_file", line, "unrecognized line in state file");
        }
    }

    RestoreReport { malformed_entries }
}

fn restore_output_line(rest: &str, partitions: &mut [Partition], current_idx: usize) {
    let Some((value, name)) = rest.split_once(':') else {
        return;
    };
    let enabled = match value.trim() {
        "0" => false,
        "1" => true,
        _ => return,
    };
    let name = name.trim();

    if partitions[current_idx].is_default() {
        partitions[current_idx].outputs.set_enabled(name, enabled);
        return;
    }

    // Non-default partitions don't own outputs of their own: an output
    // named here migrates from wherever it currently lives.
    let source_idx = (0..partitions.len())
        .find(|&i| i != current_idx && partitions[i].outputs.find_by_name(name).is_some());
    if let Some(source_idx) = source_idx {
        move_output(partitions, source_idx, current_idx, name);
        partitions[current_idx].outputs.set_enabled(name, enabled);
    }
}

fn move_output(partitions: &mut [Partition], from: usize, to: usize, name: &str) {
    let lo = from.min(to);
    let hi = from.max(to);
    let (left, right) = partitions.split_at_mut(hi);
    if from == lo {
        left[lo].move_output_to(&mut right[0], name);
    } else {
        right[0].move_output_to(&mut left[lo], name);
    }
}

fn restore_playlist<L: SongLoader>(
    state_value: &str,
    lines: &mut Lines<'_>,
    config: &StateFileConfig,
    song_loader: &RootRestrictedLoader<L>,
    partition: &mut Partition,
    malformed_entries: &mut usize,
) {
    let state = state_value.trim().parse::<PlayerState>().unwrap_or(PlayerState::Stop);
    let mut current: Option<usize> = None;
    let mut seek_time = Duration::ZERO;
    let mut random_mode = false;

    while let Some(line) = lines.next() {
        if let Some(rest) = line.strip_prefix(TIME) {
            seek_time = Duration::from_secs_f64(rest.trim().parse().unwrap_or(0.0));
        } else if let Some(rest) = line.strip_prefix(CURRENT) {
            current = rest.trim().parse::<usize>().ok();
        } else if let Some(rest) = line.strip_prefix(RANDOM) {
            random_mode = rest.trim() == "1";
        } else if let Some(rest) = line.strip_prefix(REPEAT) {
            partition.playlist.set_repeat(partition.player.as_mut(), rest.trim() == "1");
        } else if let Some(rest) = line.strip_prefix(SINGLE) {
            let mode = rest.trim().parse::<SingleMode>().unwrap_or(SingleMode::Off);
            partition.playlist.set_single(partition.player.as_mut(), mode);
        } else if let Some(rest) = line.strip_prefix(CONSUME) {
            let mode = rest.trim().parse::<ConsumeMode>().unwrap_or(ConsumeMode::Off);
            partition.playlist.set_consume(partition.player.as_mut(), mode);
        } else if let Some(rest) = line.strip_prefix(CROSSFADE) {
            if let Ok(secs) = rest.trim().parse::<u64>() {
                partition.player.set_cross_fade(Duration::from_secs(secs));
            }
        } else if let Some(rest) = line.strip_prefix(MIXRAMPDB) {
            if let Ok(db) = rest.trim().parse::<f32>() {
                partition.player.set_mixramp_db(db);
            }
        } else if let Some(rest) = line.strip_prefix(MIXRAMPDELAY) {
            match rest.trim().parse::<f64>() {
                Ok(secs) if secs > 0.0 => partition.player.set_mixramp_delay(Some(Duration::from_secs_f64(secs))),
                _ => partition.player.set_mixramp_delay(None),
            }
        } else if line.starts_with(PLAYLIST_BEGIN) {
            restore_songs(lines, song_loader, &mut partition.playlist.queue, malformed_entries);
            break;
        } else {
            warn!(target: "mpdcore::state_file", line, "unrecognized line in playlist state block");
        }
    }

    partition.playlist.queue.increment_version();
    partition.playlist.set_random(partition.player.as_mut(), random_mode);

    if partition.playlist.queue().is_empty() {
        return;
    }

    let current = current
        .filter(|&p| partition.playlist.queue().is_valid_position(p))
        .unwrap_or(0);
    let effective_state = if state == PlayerState::Play && config.restore_paused {
        PlayerState::Pause
    } else {
        state
    };

    if effective_state == PlayerState::Stop {
        partition.playlist.restore_current_position(current);
        return;
    }

    partition.player.update_audio();

    let result = if seek_time == Duration::ZERO {
        partition.playlist.play_position(partition.player.as_mut(), current)
    } else {
        partition.playlist.seek_song_position(partition.player.as_mut(), current, seek_time)
    };
    if let Err(error) = result {
        warn!(target: "mpdcore::state_file", %error, "failed to resume playback from saved state");
        return;
    }

    if effective_state == PlayerState::Pause {
        partition.player.pause();
    }
}

fn restore_songs<L: SongLoader>(
    lines: &mut Lines<'_>,
    song_loader: &RootRestrictedLoader<L>,
    queue: &mut Queue,
    malformed_entries: &mut usize,
) {
    let log_malformed = |entries: &mut usize, line: &str, what: &str| {
        *entries += 1;
        if *entries <= MAX_LOGGED_FAILURES {
            warn!(target: "mpdcore::state_file", line, what, "dropping playlist entry");
        }
    };

    while let Some(mut line) = lines.next() {
        if line.starts_with(PLAYLIST_END) {
            return;
        }

        let mut priority = 0u8;
        if let Some(rest) = line.strip_prefix(PRIO) {
            priority = rest.trim().parse().unwrap_or(0);
            match lines.next() {
                Some(next) => line = next,
                None => return,
            }
        }

        let song = if let Some(uri) = line.strip_prefix(SONG_BEGIN) {
            parse_full_song(uri, lines)
        } else {
            parse_brief_song(line)
        };

        let Some(song) = song else {
            log_malformed(malformed_entries, line, "malformed");
            continue;
        };

        if queue.is_full() {
            continue;
        }

        match song_loader.check_translate_song(song) {
            Ok(song) => {
                let _ = queue.append(song, priority);
            }
            Err(_) => log_malformed(malformed_entries, line, "rejected"),
        }
    }
}

fn parse_brief_song(line: &str) -> Option<DetachedSong> {
    let (position, uri) = line.split_once(':')?;
    position.trim().parse::<u64>().ok()?;
    if uri.is_empty() {
        return None;
    }
    Some(DetachedSong::new(uri))
}

fn parse_full_song(uri: &str, lines: &mut Lines<'_>) -> Option<DetachedSong> {
    let mut song = DetachedSong::new(uri);
    for line in lines.by_ref() {
        if line == SONG_END {
            return Some(song);
        }
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(RANGE) {
            let (start, end) = rest.split_once('-')?;
            if let Ok(ms) = start.parse::<u64>() {
                song.set_start_time(Duration::from_millis(ms));
            }
            if let Ok(ms) = end.parse::<u64>() {
                song.set_end_time(Duration::from_millis(ms));
            }
        } else if let Some(rest) = trimmed.strip_prefix(LAST_MODIFIED) {
            if let Ok(ts) = rest.parse() {
                song.set_last_modified(ts);
            }
        } else if let Some(rest) = trimmed.strip_prefix(ADDED) {
            if let Ok(ts) = rest.parse() {
                song.set_added(ts);
            }
        } else if let Some((key, value)) = trimmed.split_once(": ") {
            song.set_tag(Tag::from_label(key), value);
        }
    }
    None
}

fn restore_mount(lines: &mut Lines<'_>, mounts: &mut dyn CompositeStorage) {
    let mut uri = None;
    let mut url = None;
    while let Some(line) = lines.next() {
        if line.starts_with(MOUNT_END) {
            break;
        }
        if let Some(rest) = line.strip_prefix(MOUNT_URI) {
            uri = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix(MOUNT_URL) {
            url = Some(rest.to_string());
        } else {
            warn!(target: "mpdcore::state_file", line, "unrecognized line in mount block");
        }
    }

    match (uri, url) {
        (Some(uri), Some(url)) => {
            let path = Utf8PathBuf::from(uri);
            if mounts.is_mount_point(&path) {
                error!(target: "mpdcore::state_file", %path, "mount point already in use, skipping");
            } else if mounts.is_mounted(&url) {
                error!(target: "mpdcore::state_file", %url, "storage already mounted elsewhere, skipping");
            } else {
                mounts.mount(path, url);
            }
        }
        _ => error!(target: "mpdcore::state_file", "mount block missing uri or mounted_url"),
    }
}

fn skip_block(lines: &mut Lines<'_>, end: &str) {
    for line in lines.by_ref() {
        if line.starts_with(end) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::NullQueueListener;
    use crate::mixer::testing::MockMixer;
    use crate::output::testing::MockOutputSet;
    use crate::output::OutputState;
    use crate::player_control::{PlayerError, PlayerStatus, SyncInfo};
    use crate::storage::testing::MockStorage;

    struct NullPlayer {
        status: PlayerStatus,
    }

    impl Default for NullPlayer {
        fn default() -> Self {
            Self { status: PlayerStatus::default() }
        }
    }

    impl PlayerControl for NullPlayer {
        fn play(&mut self, _song: DetachedSong) -> Result<(), PlayerError> {
            self.status.state = PlayerState::Play;
            Ok(())
        }
        fn enqueue_song(&mut self, _song: DetachedSong) -> Result<(), PlayerError> {
            Ok(())
        }
        fn cancel(&mut self) {}
        fn stop(&mut self) {
            self.status.state = PlayerState::Stop;
        }
        fn pause(&mut self) {
            self.status.state = PlayerState::Pause;
        }
        fn set_pause(&mut self, pause: bool) {
            self.status.state = if pause { PlayerState::Pause } else { PlayerState::Play };
        }
        fn seek(&mut self, _song: DetachedSong, _time: Duration) -> Result<(), PlayerError> {
            self.status.state = PlayerState::Play;
            Ok(())
        }
        fn set_cross_fade(&mut self, duration: Duration) {
            self.status.cross_fade = duration;
        }
        fn set_mixramp_db(&mut self, db: f32) {
            self.status.mixramp_db = db;
        }
        fn set_mixramp_delay(&mut self, delay: Option<Duration>) {
            self.status.mixramp_delay = delay;
        }
        fn set_border_pause(&mut self, _border_pause: bool) {}
        fn clear_error(&mut self) {}
        fn update_audio(&mut self) {}
        fn get_status(&self) -> PlayerStatus {
            self.status.clone()
        }
        fn get_sync_info(&self) -> SyncInfo {
            SyncInfo { state: self.status.state, has_next_song: false }
        }
    }

    struct AllowAll;

    impl SongLoader for AllowAll {
        fn load_song(&self, uri: &str) -> Option<DetachedSong> {
            Some(DetachedSong::new(uri))
        }
    }

    fn default_partition() -> Partition {
        named_partition(crate::partition::DEFAULT_PARTITION_NAME, MockOutputSet::default())
    }

    fn named_partition(name: &str, outputs: MockOutputSet) -> Partition {
        Partition::new(
            name,
            16,
            Box::new(NullQueueListener),
            Box::new(MockMixer::default()),
            Box::new(outputs),
            Box::new(NullPlayer::default()),
        )
    }

    fn loader() -> RootRestrictedLoader<AllowAll> {
        RootRestrictedLoader::new(AllowAll, "/music".into())
    }

    fn config() -> StateFileConfig {
        StateFileConfig {
            path: "/tmp/does-not-matter".into(),
            debounce: Duration::from_secs(2),
            restore_paused: false,
        }
    }

    #[test]
    fn debounce_schedules_exactly_one_write_for_a_burst_of_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("state")).unwrap();
        let mut state_file = StateFile::new(StateFileConfig {
            path,
            debounce: Duration::from_secs(2),
            restore_paused: false,
        });
        let mut partitions = vec![default_partition()];
        let mounts = MockStorage::default();
        let start = Instant::now();

        state_file.remember(&partitions, &mounts);
        state_file.check_modified(start, &partitions, &mounts);
        assert!(!state_file.write_pending(), "no-op tick must not arm the timer");

        partitions[0].mixer.load_software_volume_state(42);
        state_file.check_modified(start, &partitions, &mounts);
        assert!(state_file.write_pending());

        // Further edits before the deadline must not push the deadline out.
        for volume in 43..53 {
            partitions[0].mixer.load_software_volume_state(volume);
            state_file.check_modified(start + Duration::from_millis(10), &partitions, &mounts);
        }

        assert!(!state_file.poll(start + Duration::from_millis(100), &partitions, &mounts));
        assert!(state_file.poll(start + Duration::from_secs(3), &partitions, &mounts));
        assert!(!state_file.write_pending());
    }

    #[test]
    fn write_then_read_round_trips_playlist_and_mounts() {
        let mut partition = default_partition();
        partition.mixer.load_software_volume_state(77);
        partition.outputs.set_enabled("speakers", true);

        partition.playlist.queue.random = false;
        partition
            .playlist
            .append_song(partition.player.as_mut(), DetachedSong::new("rock/a.mp3"), 0)
            .unwrap();
        let mut tagged = DetachedSong::new("/music/jazz/b.mp3");
        tagged.set_tag(Tag::Artist, "Miles Davis");
        partition.playlist.append_song(partition.player.as_mut(), tagged, 0).unwrap();
        partition
            .playlist
            .append_song(partition.player.as_mut(), DetachedSong::new("rock/c.mp3"), 0)
            .unwrap();
        partition.playlist.play_position(partition.player.as_mut(), 1).unwrap();
        partition.player.pause();

        let mut mounts = MockStorage::default();
        mounts.mount("archive".into(), "nfs://host/share".into());

        let text = render_state(std::slice::from_ref(&partition), &mounts);
        assert!(text.contains("sw_volume: 77"));
        assert!(text.contains("audio_device_state:1:speakers"));
        assert!(text.contains("state: pause"));
        assert!(text.contains("current: 1"));
        assert!(text.contains(SONG_BEGIN));
        assert!(text.contains("Artist: Miles Davis"));
        assert!(text.contains(MOUNT_BEGIN));
        assert!(text.contains("mounted_url: nfs://host/share"));

        let mut partitions = vec![default_partition()];
        let song_loader = loader();
        let mut restored_mounts = MockStorage::default();
        let report = read_state(&text, &config(), &song_loader, &mut partitions, |_| unreachable!(), &mut restored_mounts);

        assert_eq!(report.malformed_entries, 0);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].mixer.save_software_volume_state(), Some(77));
        assert!(partitions[0].outputs.find_by_name("speakers").unwrap().enabled);
        assert_eq!(partitions[0].playlist.queue().len(), 3);
        assert_eq!(partitions[0].playlist.current_position(), Some(1));
        pretty_assertions::assert_eq!(partitions[0].playlist.queue().get(1).tag(&Tag::Artist), Some("Miles Davis"));
        pretty_assertions::assert_eq!(restored_mounts.mounts()[0].storage_uri, "nfs://host/share");
    }

    #[test]
    fn stopped_playlist_restores_current_without_starting_playback() {
        let mut partition = default_partition();
        partition
            .playlist
            .append_song(partition.player.as_mut(), DetachedSong::new("a.mp3"), 0)
            .unwrap();
        partition
            .playlist
            .append_song(partition.player.as_mut(), DetachedSong::new("b.mp3"), 0)
            .unwrap();

        let text = "state: stop\ncurrent: 1\nrandom: 0\nrepeat: 0\nsingle: 0\nconsume: 0\ncrossfade: 0\nmixrampdb: 0\nplaylist_begin\n0:a.mp3\n1:b.mp3\nplaylist_end\n";

        let mut partitions = vec![default_partition()];
        let song_loader = loader();
        let mut mounts = MockStorage::default();
        read_state(text, &config(), &song_loader, &mut partitions, |_| unreachable!(), &mut mounts);

        assert!(!partitions[0].playlist.is_playing());
        assert_eq!(partitions[0].playlist.current_position(), Some(1));
    }

    #[test]
    fn malformed_playlist_lines_are_counted_and_skipped() {
        let text = "state: stop\nrandom: 0\nrepeat: 0\nsingle: 0\nconsume: 0\ncrossfade: 0\nmixrampdb: 0\nplaylist_begin\nnot-a-valid-line\n0:a.mp3\nplaylist_end\n";

        let mut partitions = vec![default_partition()];
        let song_loader = loader();
        let mut mounts = MockStorage::default();
        let report = read_state(text, &config(), &song_loader, &mut partitions, |_| unreachable!(), &mut mounts);

        assert_eq!(report.malformed_entries, 1);
        assert_eq!(partitions[0].playlist.queue().len(), 1);
    }

    #[test]
    fn songs_outside_music_root_are_rejected_without_aborting_the_restore() {
        let text = "state: stop\nrandom: 0\nrepeat: 0\nsingle: 0\nconsume: 0\ncrossfade: 0\nmixrampdb: 0\nplaylist_begin\nsong_begin: /elsewhere/song.mp3\nsong_end\n0:rock/a.mp3\nplaylist_end\n";

        let mut partitions = vec![default_partition()];
        let song_loader = loader();
        let mut mounts = MockStorage::default();
        let report = read_state(text, &config(), &song_loader, &mut partitions, |_| unreachable!(), &mut mounts);

        assert_eq!(report.malformed_entries, 1);
        assert_eq!(partitions[0].playlist.queue().len(), 1);
        assert_eq!(partitions[0].playlist.queue().get(0).uri(), "rock/a.mp3");
    }

    #[test]
    fn partition_line_creates_and_switches_to_a_new_partition() {
        let text = "sw_volume: 50\npartition: upstairs\nsw_volume: 90\n";

        let mut partitions = vec![default_partition()];
        let song_loader = loader();
        let mut mounts = MockStorage::default();
        read_state(text, &config(), &song_loader, &mut partitions, |name| {
            let mut p = default_partition();
            p.name = name.to_string();
            p
        }, &mut mounts);

        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].mixer.save_software_volume_state(), Some(50));
        assert_eq!(partitions[1].name, "upstairs");
        assert_eq!(partitions[1].mixer.save_software_volume_state(), Some(90));
    }

    #[test]
    fn output_line_in_non_default_partition_migrates_it_from_default() {
        let mut outputs = MockOutputSet::default();
        outputs.outputs.push(OutputState { name: "speakers".into(), enabled: false });
        let default = named_partition(crate::partition::DEFAULT_PARTITION_NAME, outputs);

        let text = "partition: upstairs\naudio_device_state:1:speakers\n";
        let mut partitions = vec![default];
        let song_loader = loader();
        let mut mounts = MockStorage::default();
        read_state(text, &config(), &song_loader, &mut partitions, |name| {
            let mut p = default_partition();
            p.name = name.to_string();
            p
        }, &mut mounts);

        assert!(partitions[0].outputs.find_by_name("speakers").is_none());
        assert!(partitions[1].outputs.find_by_name("speakers").unwrap().enabled);
    }
}
