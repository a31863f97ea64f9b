//! Tracks what's playing, what's queued next, and drives the
//! [`PlayerControl`] as the queue advances.
//!
//! `Playlist` owns a [`Queue`] by composition; its relationship to the
//! player is the opposite: `PlayerControl` is passed in by every method
//! that needs it rather than stored, since ownership of the real player
//! lives with the surrounding daemon.

use std::time::Duration;

use crate::error::{QueueError, QueueResult};
use crate::listener::QueueListener;
use crate::player_control::{PlayerControl, PlayerError, PlayerState};
use crate::queue::{ConsumeMode, Queue, SingleMode};
use crate::song::DetachedSong;

pub struct Playlist {
    pub(crate) queue: Queue,
    current: Option<usize>,
    queued: Option<usize>,
    playing: bool,
    pub stop_on_error: bool,
    bulk_edit: bool,
    bulk_modified: bool,
    bulk_queued_song_prev: Option<DetachedSong>,
    error_count: u32,
    listener: Box<dyn QueueListener>,
}

impl Playlist {
    pub fn new(max_length: usize, listener: Box<dyn QueueListener>) -> Self {
        Self {
            queue: Queue::new(max_length),
            current: None,
            queued: None,
            playing: false,
            stop_on_error: false,
            bulk_edit: false,
            bulk_modified: false,
            bulk_queued_song_prev: None,
            error_count: 0,
            listener,
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_order(&self) -> Option<usize> {
        self.current
    }

    pub fn queued_order(&self) -> Option<usize> {
        self.queued
    }

    pub fn current_position(&self) -> Option<usize> {
        self.current.map(|o| self.queue.order_to_position(o))
    }

    pub fn current_song(&self) -> Option<&DetachedSong> {
        self.current.map(|o| self.queue.get_order(o))
    }

    /// Sets `current` to `position` directly, without touching the player.
    /// Only meaningful while stopped — used by the state file to restore a
    /// stopped playlist's last-played song without resuming playback.
    pub(crate) fn restore_current_position(&mut self, position: usize) {
        if self.queue.is_valid_position(position) {
            self.current = Some(self.queue.position_to_order(position));
        }
    }

    fn queued_song(&self) -> Option<DetachedSong> {
        self.queued.map(|o| self.queue.get_order(o).clone())
    }

    fn on_modified(&mut self) {
        if self.bulk_edit {
            self.bulk_modified = true;
            return;
        }
        self.queue.increment_version();
        self.listener.on_queue_modified();
    }

    /// Common tail of every edit op: refresh what the player should play
    /// next (skipped mid-bulk-edit) and notify listeners.
    fn finish_edit(&mut self, player: &mut dyn PlayerControl, prev: Option<DetachedSong>) {
        if !self.bulk_edit {
            self.update_queued_song(player, prev);
        }
        self.on_modified();
    }

    pub fn begin_bulk(&mut self) {
        self.bulk_edit = true;
        self.bulk_modified = false;
        self.bulk_queued_song_prev = self.queued_song();
    }

    pub fn commit_bulk(&mut self, player: &mut dyn PlayerControl) {
        self.bulk_edit = false;
        if self.bulk_modified {
            let prev = self.bulk_queued_song_prev.take();
            self.update_queued_song(player, prev);
            self.queue.increment_version();
            self.listener.on_queue_modified();
        }
        self.bulk_modified = false;
    }

    // ---- editing ----------------------------------------------------

    pub fn append_song(
        &mut self,
        player: &mut dyn PlayerControl,
        song: DetachedSong,
        priority: u8,
    ) -> QueueResult<u32> {
        let prev = self.queued_song();
        let id = self.queue.append(song, priority)?;

        if self.queue.random {
            let start = self.current.map(|c| c + 1).unwrap_or(0);
            let end = self.queue.len();
            self.queue.shuffle_order_last_with_priority(start, end);
        }

        self.finish_edit(player, prev);
        Ok(id)
    }

    pub fn swap_positions(
        &mut self,
        player: &mut dyn PlayerControl,
        position1: usize,
        position2: usize,
    ) -> QueueResult<()> {
        if !self.queue.is_valid_position(position1) || !self.queue.is_valid_position(position2) {
            return Err(QueueError::BadRange);
        }

        // `order[]` is untouched by a position swap, so current/queued
        // (order-indices) stay valid without remapping.
        let prev = self.queued_song();
        self.queue.swap_positions(position1, position2);
        self.finish_edit(player, prev);
        Ok(())
    }

    pub fn swap_ids(&mut self, player: &mut dyn PlayerControl, id1: u32, id2: u32) -> QueueResult<()> {
        let position1 = self.queue.id_to_position(id1).ok_or(QueueError::NoSuchSong)?;
        let position2 = self.queue.id_to_position(id2).ok_or(QueueError::NoSuchSong)?;
        self.swap_positions(player, position1, position2)
    }

    /// Deletes the song at `position`. If it was the actively-playing
    /// (non-paused) song, advances to whatever `GetNextOrder` names next,
    /// or stops if nothing follows.
    pub fn delete_position(&mut self, player: &mut dyn PlayerControl, position: usize) -> QueueResult<()> {
        if !self.queue.is_valid_position(position) {
            return Err(QueueError::BadRange);
        }

        let deleted_order = self.queue.position_to_order(position);
        let deleting_current = self.current == Some(deleted_order);
        let paused = self.playing && player.get_status().state == PlayerState::Pause;

        let next_id_if_current = if deleting_current && self.playing && !paused {
            self.queue
                .get_next_order(deleted_order)
                .map(|o| self.queue.position_to_id(self.queue.order_to_position(o)))
        } else {
            None
        };

        let current_id = self
            .current
            .filter(|&o| o != deleted_order)
            .map(|o| self.queue.position_to_id(self.queue.order_to_position(o)));
        let queued_id = self
            .queued
            .filter(|&o| o != deleted_order)
            .map(|o| self.queue.position_to_id(self.queue.order_to_position(o)));

        let prev = self.queued_song();
        self.queue.delete_position(position);

        self.current = current_id
            .and_then(|id| self.queue.id_to_position(id))
            .map(|p| self.queue.position_to_order(p));
        self.queued = queued_id
            .and_then(|id| self.queue.id_to_position(id))
            .map(|p| self.queue.position_to_order(p));

        self.finish_edit(player, prev);

        if deleting_current {
            match next_id_if_current {
                Some(id) => {
                    if let Some(position) = self.queue.id_to_position(id) {
                        self.play_position(player, position)?;
                    }
                }
                None if self.playing && !paused => self.stop(player),
                _ => {}
            }
        }

        Ok(())
    }

    pub fn delete_order(&mut self, player: &mut dyn PlayerControl, order: usize) -> QueueResult<()> {
        if !self.queue.is_valid_order(order) {
            return Err(QueueError::BadRange);
        }
        self.delete_position(player, self.queue.order_to_position(order))
    }

    pub fn delete_id(&mut self, player: &mut dyn PlayerControl, id: u32) -> QueueResult<()> {
        let position = self.queue.id_to_position(id).ok_or(QueueError::NoSuchSong)?;
        self.delete_position(player, position)
    }

    pub fn delete_range(&mut self, player: &mut dyn PlayerControl, start: usize, end: usize) -> QueueResult<()> {
        if start >= end || end > self.queue.len() {
            return Err(QueueError::BadRange);
        }
        for position in (start..end).rev() {
            self.delete_position(player, position)?;
        }
        Ok(())
    }

    /// Removes every non-playing queue entry whose URI is `uri` — used
    /// when the database drops a song out from under the queue.
    pub fn stale_song(&mut self, player: &mut dyn PlayerControl, uri: &str) {
        let positions: Vec<usize> = (0..self.queue.len())
            .filter(|&p| self.queue.get(p).is_uri(uri))
            .filter(|&p| Some(self.queue.position_to_order(p)) != self.current)
            .collect();
        for position in positions.into_iter().rev() {
            let _ = self.delete_position(player, position);
        }
    }

    pub fn clear(&mut self, player: &mut dyn PlayerControl) {
        if self.playing {
            self.stop(player);
        }
        self.queue.clear();
        self.current = None;
        self.queued = None;
        self.on_modified();
    }

    pub fn move_range(&mut self, player: &mut dyn PlayerControl, start: usize, end: usize, to: usize) -> QueueResult<()> {
        if start >= end || end > self.queue.len() || to > self.queue.len() - (end - start) {
            return Err(QueueError::BadRange);
        }

        let current_id = self
            .current
            .map(|o| self.queue.position_to_id(self.queue.order_to_position(o)));
        let queued_id = self
            .queued
            .map(|o| self.queue.position_to_id(self.queue.order_to_position(o)));

        let prev = self.queued_song();
        self.queue.move_range(start, end, to);

        self.current = current_id
            .and_then(|id| self.queue.id_to_position(id))
            .map(|p| self.queue.position_to_order(p));
        self.queued = queued_id
            .and_then(|id| self.queue.id_to_position(id))
            .map(|p| self.queue.position_to_order(p));

        self.finish_edit(player, prev);
        Ok(())
    }

    /// Shuffles `[start, end)`, keeping the currently playing song (if
    /// inside the range) pinned at `start` so playback isn't disturbed.
    pub fn shuffle(&mut self, player: &mut dyn PlayerControl, start: usize, end: usize) -> QueueResult<()> {
        if start >= end || end > self.queue.len() {
            return Err(QueueError::BadRange);
        }

        let current_id = self
            .current
            .map(|o| self.queue.position_to_id(self.queue.order_to_position(o)));
        let current_position = self.current.map(|o| self.queue.order_to_position(o));

        let prev = self.queued_song();
        match current_position {
            Some(pos) if pos >= start && pos < end => {
                self.queue.swap_positions(pos, start);
                self.queue.shuffle_range(start + 1, end);
            }
            _ => self.queue.shuffle_range(start, end),
        }

        self.current = current_id
            .and_then(|id| self.queue.id_to_position(id))
            .map(|p| self.queue.position_to_order(p));

        self.finish_edit(player, prev);
        Ok(())
    }

    pub fn set_priority_id(&mut self, player: &mut dyn PlayerControl, id: u32, priority: u8) -> QueueResult<()> {
        let position = self.queue.id_to_position(id).ok_or(QueueError::NoSuchSong)?;
        self.set_priority_position(player, position, priority)
    }

    fn set_priority_position(&mut self, player: &mut dyn PlayerControl, position: usize, priority: u8) -> QueueResult<()> {
        let after_order = self.current;
        let prev = self.queued_song();
        self.queue.set_priority(position, priority, after_order, true);
        self.finish_edit(player, prev);
        Ok(())
    }

    pub fn set_priority_range(
        &mut self,
        player: &mut dyn PlayerControl,
        start: usize,
        end: usize,
        priority: u8,
    ) -> QueueResult<()> {
        if start >= end || end > self.queue.len() {
            return Err(QueueError::BadRange);
        }
        let after_order = self.current;
        let prev = self.queued_song();
        self.queue.set_priority_range(start, end, priority, after_order);
        self.finish_edit(player, prev);
        Ok(())
    }

    /// Sets a song's virtual-track start/end offsets. Refuses to touch the
    /// song that's actively playing.
    pub fn set_song_range(
        &mut self,
        player: &mut dyn PlayerControl,
        position: usize,
        start: Duration,
        end: Duration,
    ) -> QueueResult<()> {
        if !self.queue.is_valid_position(position) {
            return Err(QueueError::BadRange);
        }
        let order = self.queue.position_to_order(position);
        if Some(order) == self.current && self.playing {
            return Err(QueueError::Denied);
        }

        let prev = self.queued_song();
        let was_queued = Some(order) == self.queued;

        let song = self.queue.get_mut(position);
        song.set_start_time(start);
        song.set_end_time(end);
        self.queue.modify_at_position(position);

        if was_queued {
            player.cancel();
            self.queued = None;
        }

        self.finish_edit(player, prev);
        Ok(())
    }

    pub fn tag_modified(&mut self, real_uri: &str, update: DetachedSong) {
        let mut changed = false;
        for position in 0..self.queue.len() {
            if self.queue.get(position).is_real_uri(real_uri) {
                self.queue.get_mut(position).move_tag_items_from(update.clone());
                self.queue.modify_at_position(position);
                changed = true;
            }
        }
        if changed {
            self.on_modified();
        }
    }

    // ---- playback -----------------------------------------------------

    /// Moves `order` into the "current" slot: just before `current` if
    /// not playing (so it plays next), just after if playing (so the
    /// remainder of the random order is preserved). With no current song
    /// at all, it lands at order-index 0.
    fn move_order_to_current(&mut self, order: usize) -> usize {
        match (self.playing, self.current) {
            (false, Some(current)) => self.queue.move_order(order, current),
            (false, None) => self.queue.move_order(order, 0),
            (true, Some(current)) if order <= current => self.queue.move_order(order, current),
            (true, Some(current)) => self.queue.move_order(order, current + 1),
            (true, None) => self.queue.move_order(order, 0),
        }
    }

    fn play_order(&mut self, player: &mut dyn PlayerControl, order: usize) -> QueueResult<()> {
        if !self.queue.is_valid_order(order) {
            return Err(QueueError::BadRange);
        }
        self.stop_on_error = false;
        self.error_count = 0;
        player.clear_error();
        let song = self.queue.get_order(order).clone();
        player.play(song).map_err(QueueError::Player)?;
        self.current = Some(order);
        self.queued = None;
        self.playing = true;
        Ok(())
    }

    pub fn play_position(&mut self, player: &mut dyn PlayerControl, position: usize) -> QueueResult<()> {
        if !self.queue.is_valid_position(position) {
            return Err(QueueError::BadRange);
        }
        let order = self.queue.position_to_order(position);
        let order = if self.queue.random {
            self.move_order_to_current(order)
        } else {
            order
        };
        self.play_order(player, order)
    }

    pub fn play_id(&mut self, player: &mut dyn PlayerControl, id: u32) -> QueueResult<()> {
        let position = self.queue.id_to_position(id).ok_or(QueueError::NoSuchSong)?;
        self.play_position(player, position)
    }

    pub fn play_any(&mut self, player: &mut dyn PlayerControl) -> QueueResult<()> {
        if self.queue.is_empty() {
            return Err(QueueError::NoSuchSong);
        }
        let order = self.current.unwrap_or(0);
        self.play_order(player, order)
    }

    pub fn play_next(&mut self, player: &mut dyn PlayerControl) -> QueueResult<()> {
        let mut current = self.current.ok_or(QueueError::NotPlaying)?;
        let mut next_order = self.queue.get_next_order(current);

        if self.queue.random && self.queue.repeat && next_order == Some(0) {
            let position = self.queue.order_to_position(current);
            self.queue.shuffle_order();
            current = self.queue.position_to_order(position);
            self.current = Some(current);
            next_order = self.queue.get_next_order(current);
        }

        let consume = self.queue.consume;
        let Some(next_order) = next_order else {
            self.stop(player);
            if consume == ConsumeMode::OneShot {
                self.queue.consume = ConsumeMode::Off;
            }
            return Ok(());
        };

        let next_id = self.queue.position_to_id(self.queue.order_to_position(next_order));

        if consume != ConsumeMode::Off {
            let old_position = self.queue.order_to_position(current);
            self.queue.delete_position(old_position);
            if consume == ConsumeMode::OneShot {
                self.queue.consume = ConsumeMode::Off;
            }
        }

        match self.queue.id_to_position(next_id) {
            Some(position) => {
                let order = self.queue.position_to_order(position);
                self.play_order(player, order)
            }
            None => {
                self.stop(player);
                Ok(())
            }
        }
    }

    pub fn play_previous(&mut self, player: &mut dyn PlayerControl) -> QueueResult<()> {
        let current = self.current.ok_or(QueueError::NotPlaying)?;
        let order = if current > 0 {
            current - 1
        } else if self.queue.repeat {
            self.queue.len() - 1
        } else {
            current
        };
        self.play_order(player, order)
    }

    fn seek_song_order(&mut self, player: &mut dyn PlayerControl, order: usize, time: Duration) -> QueueResult<()> {
        if !self.queue.is_valid_order(order) {
            return Err(QueueError::BadRange);
        }
        player.clear_error();
        let order = if self.queue.random {
            self.move_order_to_current(order)
        } else {
            order
        };
        let song = self.queue.get_order(order).clone();
        self.error_count = 0;
        self.stop_on_error = true;
        player.seek(song, time).map_err(QueueError::Player)?;
        self.current = Some(order);
        self.queued = None;
        self.playing = true;
        Ok(())
    }

    pub fn seek_song_position(&mut self, player: &mut dyn PlayerControl, position: usize, time: Duration) -> QueueResult<()> {
        if !self.queue.is_valid_position(position) {
            return Err(QueueError::BadRange);
        }
        self.seek_song_order(player, self.queue.position_to_order(position), time)
    }

    pub fn seek_song_id(&mut self, player: &mut dyn PlayerControl, id: u32, time: Duration) -> QueueResult<()> {
        let position = self.queue.id_to_position(id).ok_or(QueueError::NoSuchSong)?;
        self.seek_song_position(player, position, time)
    }

    pub fn seek_current(&mut self, player: &mut dyn PlayerControl, time: Duration) -> QueueResult<()> {
        let current = self.current.ok_or(QueueError::NotPlaying)?;
        self.seek_song_order(player, current, time)
    }

    pub fn stop(&mut self, player: &mut dyn PlayerControl) {
        if !self.playing {
            return;
        }
        player.stop();
        self.queued = None;
        self.playing = false;

        if self.queue.random {
            let position = self.current.map(|o| self.queue.order_to_position(o));
            self.queue.shuffle_order();
            self.current = position.map(|p| self.queue.position_to_order(p));
        }
    }

    /// `single=ONE_SHOT` songs pause rather than auto-advance once; this
    /// clears that one-shot state. Returns whether it fired.
    pub fn border_pause(&mut self, player: &mut dyn PlayerControl) -> bool {
        if self.queue.single != SingleMode::OneShot {
            return false;
        }
        self.queue.single = SingleMode::Off;
        player.set_border_pause(false);
        self.listener.on_queue_options_changed();
        true
    }

    // ---- mode setters ---------------------------------------------------

    pub fn set_repeat(&mut self, player: &mut dyn PlayerControl, repeat: bool) -> bool {
        if self.queue.repeat == repeat {
            return false;
        }
        let prev = self.queued_song();
        self.queue.repeat = repeat;
        self.update_queued_song(player, prev);
        self.listener.on_queue_options_changed();
        true
    }

    pub fn set_single(&mut self, player: &mut dyn PlayerControl, single: SingleMode) -> bool {
        if self.queue.single == single {
            return false;
        }
        let prev = self.queued_song();
        self.queue.single = single;
        self.update_queued_song(player, prev);
        self.listener.on_queue_options_changed();
        true
    }

    pub fn set_consume(&mut self, player: &mut dyn PlayerControl, consume: ConsumeMode) -> bool {
        if self.queue.consume == consume {
            return false;
        }
        let prev = self.queued_song();
        self.queue.consume = consume;
        self.update_queued_song(player, prev);
        self.listener.on_queue_options_changed();
        true
    }

    pub fn set_random(&mut self, player: &mut dyn PlayerControl, random: bool) -> bool {
        if self.queue.random == random {
            return false;
        }

        let current_position = self.current.map(|o| self.queue.order_to_position(o));
        let prev = self.queued_song();
        self.queue.random = random;

        if random {
            self.queue.shuffle_order();
            if let Some(position) = current_position {
                let order = self.queue.position_to_order(position);
                self.current = Some(self.queue.move_order(order, 0));
            }
        } else {
            self.queue.restore_order();
            self.current = current_position;
        }

        self.update_queued_song(player, prev);
        self.listener.on_queue_options_changed();
        true
    }

    // ---- player-driven events -------------------------------------------

    /// Decides whether the song handed to the player as "next" needs to
    /// change, given what it was before this edit (`prev`).
    fn update_queued_song(&mut self, player: &mut dyn PlayerControl, prev: Option<DetachedSong>) {
        if !self.playing {
            return;
        }
        if self.bulk_edit && prev.is_none() {
            return;
        }

        let Some(mut current) = self.current else {
            return;
        };
        let mut next_order = self.queue.get_next_order(current);

        if next_order == Some(0) && self.queue.random && self.queue.single == SingleMode::Off {
            let position = self.queue.order_to_position(current);
            self.queue.shuffle_order();
            current = self.queue.position_to_order(position);
            self.current = Some(current);
            next_order = self.queue.get_next_order(current);
        }

        let next_song = next_order.map(|o| self.queue.get_order(o).clone());
        let changed = match (&next_song, &prev) {
            (Some(a), Some(b)) => !a.is_same(b),
            (None, None) => false,
            _ => true,
        };

        if changed {
            player.cancel();
            match next_song {
                Some(song) => {
                    let _ = player.enqueue_song(song);
                    self.queued = next_order;
                }
                None => self.queued = None,
            }
        } else {
            self.queued = next_order;
        }
    }

    /// Reacts to a player-thread event: stopped, or switched to its
    /// preloaded "next" song.
    pub fn sync_with_player(&mut self, player: &mut dyn PlayerControl) {
        let sync = player.get_sync_info();

        if sync.state == PlayerState::Stop {
            self.resume_playback(player);
        } else if !sync.has_next_song && self.queued.is_some() {
            self.queued_song_started(player);
        }

        if self.playing {
            let prev = self.queued_song();
            self.update_queued_song(player, prev);
        }
    }

    fn resume_playback(&mut self, player: &mut dyn PlayerControl) {
        if !self.playing {
            return;
        }

        let status = player.get_status();
        match status.last_error {
            Some(err) => {
                self.error_count += 1;
                let is_output = matches!(err, PlayerError::Output(_));
                if self.stop_on_error || is_output || self.error_count as usize >= self.queue.len().max(1) {
                    self.stop(player);
                } else {
                    let _ = self.play_next(player);
                }
            }
            None => {
                self.error_count = 0;
                let _ = self.play_next(player);
            }
        }
    }

    fn queued_song_started(&mut self, player: &mut dyn PlayerControl) {
        let Some(queued) = self.queued else {
            return;
        };
        let old_current = self.current;
        self.current = Some(queued);
        self.queued = None;

        if self.queue.consume != ConsumeMode::Off {
            if let Some(old) = old_current {
                let old_position = self.queue.order_to_position(old);
                self.queue.delete_position(old_position);
                if let Some(current) = self.current {
                    if current > old {
                        self.current = Some(current - 1);
                    }
                }
            }
        }

        if let Some(current) = self.current {
            let position = self.queue.order_to_position(current);
            self.queue.set_priority(position, 0, None, false);
            let song = self.queue.get_order(current).clone();
            self.listener.on_queue_song_started(&song);
        }
    }
}
