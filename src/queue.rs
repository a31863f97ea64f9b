//! The song queue: an ordered list of songs plus an independent play-order
//! permutation, priorities and a version counter clients poll against.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{QueueError, QueueResult};
use crate::id_table::{HASH_MULT, IdTable};
use crate::rand_engine::RandomEngine;
use crate::song::DetachedSong;

/// `single` playback mode: play one song and stop, or keep replaying it
/// under `repeat`.
///
/// The `Display`/`EnumString` labels are the exact tokens the state file
/// uses on its `single:` line (`0`/`1`/`oneshot`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
pub enum SingleMode {
    #[default]
    #[strum(serialize = "0")]
    Off,
    #[strum(serialize = "1")]
    On,
    /// Behaves like `On` until the border pause is reached once, then
    /// reverts to `Off`.
    #[strum(serialize = "oneshot")]
    OneShot,
}

/// `consume` playback mode: delete each song once it has played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
pub enum ConsumeMode {
    #[default]
    #[strum(serialize = "0")]
    Off,
    #[strum(serialize = "1")]
    On,
    /// Consume exactly one song, then revert to `Off`.
    #[strum(serialize = "oneshot")]
    OneShot,
}

impl ConsumeMode {
    pub fn is_enabled(self) -> bool {
        !matches!(self, ConsumeMode::Off)
    }
}

/// One slot in the queue: an owned song plus queue-local bookkeeping.
#[derive(Debug, Clone)]
pub struct Item {
    pub song: DetachedSong,
    pub id: u32,
    /// The queue version at which this item was last changed.
    pub version: u32,
    /// 0..255, higher plays first in random mode.
    pub priority: u8,
}

/// The song queue: an ordered list of items plus an independent play-order
/// permutation that random-mode shuffling operates on.
#[derive(Debug)]
pub struct Queue {
    pub max_length: usize,
    items: Vec<Item>,
    /// order-index -> position.
    order: Vec<usize>,
    id_table: IdTable,

    pub version: u32,
    pub repeat: bool,
    pub single: SingleMode,
    pub consume: ConsumeMode,
    pub random: bool,

    rand: RandomEngine,
}

/// Version just below `2^31`, matching MPD's wraparound point.
const VERSION_WRAP: u32 = (1u32 << 31) - 1;

impl Queue {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            items: Vec::new(),
            order: Vec::new(),
            id_table: IdTable::new(max_length * HASH_MULT),
            version: 1,
            repeat: false,
            single: SingleMode::Off,
            consume: ConsumeMode::Off,
            random: false,
            rand: RandomEngine::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_length
    }

    pub fn is_valid_position(&self, position: usize) -> bool {
        position < self.items.len()
    }

    pub fn is_valid_order(&self, order: usize) -> bool {
        order < self.items.len()
    }

    pub fn id_to_position(&self, id: u32) -> Option<usize> {
        let pos = self.id_table.id_to_position(id);
        (pos >= 0).then_some(pos as usize)
    }

    pub fn position_to_id(&self, position: usize) -> u32 {
        self.items[position].id
    }

    pub fn order_to_position(&self, order: usize) -> usize {
        self.order[order]
    }

    pub fn position_to_order(&self, position: usize) -> usize {
        self.order
            .iter()
            .position(|&p| p == position)
            .expect("order is always a permutation of all positions")
    }

    pub fn priority_at_position(&self, position: usize) -> u8 {
        self.items[position].priority
    }

    pub fn item_at_order(&self, order: usize) -> &Item {
        &self.items[self.order_to_position(order)]
    }

    pub fn get(&self, position: usize) -> &DetachedSong {
        &self.items[position].song
    }

    pub fn get_mut(&mut self, position: usize) -> &mut DetachedSong {
        &mut self.items[position].song
    }

    pub fn get_order(&self, order: usize) -> &DetachedSong {
        self.get(self.order_to_position(order))
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Items whose `version` is newer than the client's last-seen
    /// version — or equal to it, or zero, both of which always count as
    /// changed (zero marks an item added before versioning began).
    pub fn query_changes(&self, since_version: u32) -> impl Iterator<Item = (usize, &Item)> {
        self.items.iter().enumerate().filter(move |(_, item)| {
            since_version > self.version || item.version >= since_version || item.version == 0
        })
    }

    /// The order-index following `order`, honoring `single`/`repeat`/
    /// `consume`. `None` means end of queue.
    pub fn get_next_order(&self, order: usize) -> Option<usize> {
        debug_assert!(order < self.items.len());

        if self.single != SingleMode::Off && self.repeat && self.consume == ConsumeMode::Off {
            Some(order)
        } else if order + 1 < self.items.len() {
            Some(order + 1)
        } else if self.repeat && (order > 0 || self.consume == ConsumeMode::Off) {
            Some(0)
        } else {
            None
        }
    }

    /// Bumps the logical version, resetting it (and zeroing all item
    /// versions) if it's about to overflow the 31-bit range clients see.
    pub fn increment_version(&mut self) {
        self.version += 1;

        if self.version >= VERSION_WRAP {
            for item in &mut self.items {
                item.version = 0;
            }
            self.version = 1;
        }
    }

    pub fn modify_at_position(&mut self, position: usize) {
        self.items[position].version = self.version;
    }

    pub fn modify_at_order(&mut self, order: usize) {
        let position = self.order_to_position(order);
        self.modify_at_position(position);
    }

    /// Appends `song` at the end of the queue; fails with `TooLarge` if
    /// the queue is already full.
    pub fn append(&mut self, song: DetachedSong, priority: u8) -> QueueResult<u32> {
        if self.is_full() {
            return Err(QueueError::TooLarge);
        }

        let position = self.items.len();
        let id = self.id_table.insert(position);

        self.items.push(Item {
            song,
            id,
            version: self.version,
            priority,
        });
        self.order.push(position);

        Ok(id)
    }

    pub fn swap_positions(&mut self, position1: usize, position2: usize) {
        let id1 = self.items[position1].id;
        let id2 = self.items[position2].id;

        self.items.swap(position1, position2);
        self.items[position1].version = self.version;
        self.items[position2].version = self.version;

        self.id_table.r#move(id1, position2);
        self.id_table.r#move(id2, position1);
    }

    pub fn swap_orders(&mut self, order1: usize, order2: usize) {
        self.order.swap(order1, order2);
    }

    fn move_item_to(&mut self, from: usize, to: usize) {
        let from_id = self.items[from].id;
        self.items[to] = self.items[from].clone();
        self.items[to].version = self.version;
        self.id_table.r#move(from_id, to);
    }

    /// Moves a contiguous `[start, end)` block of positions so that
    /// `start` ends up at `to`. Keeps `order[]` pointing at the same
    /// logical order-indexes, remapped to the songs' new positions.
    pub fn move_range(&mut self, start: usize, end: usize, to: usize) {
        if start == to || start == end {
            return;
        }

        let block: Vec<Item> = self.items[start..end].to_vec();
        let block_len = end - start;

        if to > start {
            for i in end..end + (to - start) {
                self.move_item_to(i, start + i - end);
            }
        } else {
            let mut i = start as isize - 1;
            while i >= to as isize {
                self.move_item_to(i as usize, i as usize + block_len);
                i -= 1;
            }
        }

        for (i, item) in block.into_iter().enumerate() {
            let dest = to + i;
            self.id_table.r#move(item.id, dest);
            self.items[dest] = item;
            self.items[dest].version = self.version;
        }

        if self.random {
            let length = self.items.len();
            for slot in self.order.iter_mut().take(length) {
                if *slot >= end && *slot < to + end - start {
                    *slot -= end - start;
                } else if *slot < start && *slot >= to {
                    *slot += end - start;
                } else if *slot >= start && *slot < end {
                    *slot += to - start;
                }
            }
        }
    }

    /// Lifts `from_order` out of the order list and reinserts it at
    /// `to_order`, shifting everything in between.
    pub fn move_order(&mut self, from_order: usize, to_order: usize) -> usize {
        let from_position = self.order_to_position(from_order);

        if from_order < to_order {
            for i in from_order..to_order {
                self.order[i] = self.order[i + 1];
            }
        } else {
            for i in (to_order + 1..=from_order).rev() {
                self.order[i] = self.order[i - 1];
            }
        }

        self.order[to_order] = from_position;
        to_order
    }

    pub fn move_order_before(&mut self, from_order: usize, to_order: usize) -> usize {
        let adjust = (from_order < to_order) as usize;
        self.move_order(from_order, to_order - adjust)
    }

    pub fn move_order_after(&mut self, from_order: usize, to_order: usize) -> usize {
        let adjust = (from_order > to_order) as usize;
        self.move_order(from_order, to_order + adjust)
    }

    /// Removes the song at `position`, compacting `items` and `order`.
    pub fn delete_position(&mut self, position: usize) -> DetachedSong {
        let id = self.position_to_id(position);
        let order = self.position_to_order(position);

        let removed = self.items.remove(position);
        self.id_table.erase(id);

        // Everything after `position` shifted down by one slot.
        for (pos, item) in self.items.iter().enumerate().skip(position) {
            self.id_table.r#move(item.id, pos);
        }

        self.order.remove(order);
        for slot in self.order.iter_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }

        removed.song
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.id_table = IdTable::new(self.max_length * HASH_MULT);
    }

    /// Restores `order[i] = i` for all `i` (natural, non-random order).
    pub fn restore_order(&mut self) {
        for (i, slot) in self.order.iter_mut().enumerate() {
            *slot = i;
        }
    }

    pub fn shuffle_order_range(&mut self, start: usize, end: usize) {
        debug_assert!(self.random);
        self.order[start..end].shuffle(self.rand.get());
    }

    /// Groups `order[start..end)` by priority (stable, descending), then
    /// shuffles within each priority group so higher-priority songs always
    /// sort ahead without losing randomness inside a tier.
    pub fn shuffle_order_range_with_priority(&mut self, start: usize, end: usize) {
        debug_assert!(self.random);
        if start == end {
            return;
        }

        let items = &self.items;
        self.order[start..end].sort_by(|&a, &b| items[b].priority.cmp(&items[a].priority));

        let mut group_start = start;
        let mut group_priority = self.items[self.order[start]].priority;
        for i in start + 1..end {
            let priority = self.items[self.order[i]].priority;
            if priority != group_priority {
                self.shuffle_order_range(group_start, i);
                group_start = i;
                group_priority = priority;
            }
        }
        self.shuffle_order_range(group_start, end);
    }

    pub fn shuffle_order(&mut self) {
        let length = self.items.len();
        self.shuffle_order_range_with_priority(0, length);
    }

    /// Swaps `order[start]` with a random entry in `[start, end)`.
    pub fn shuffle_order_first(&mut self, start: usize, end: usize) {
        let idx = self.rand.get().random_range(start..end);
        self.swap_orders(start, idx);
    }

    /// Shuffles the just-appended last order-entry within its priority
    /// group, so a newly queued song in random mode lands somewhere in its
    /// priority stratum rather than always dead last.
    pub fn shuffle_order_last_with_priority(&mut self, start: usize, end: usize) {
        debug_assert!(start < end);

        let last_priority = self.items[self.order_to_position(end - 1)].priority;
        let mut start = start;
        while self.items[self.order_to_position(start)].priority != last_priority {
            start += 1;
            debug_assert!(start < end);
        }

        let idx = self.rand.get().random_range(start..end);
        self.swap_orders(end - 1, idx);
    }

    /// Physically shuffles positions `[start, end)` (Fisher-Yates via
    /// repeated `swap_positions`), ignoring the order permutation.
    pub fn shuffle_range(&mut self, start: usize, end: usize) {
        for i in start..end {
            let idx = self.rand.get().random_range(start..end);
            self.swap_positions(i, idx);
        }
    }

    /// First order-index at or after `start_order` whose priority is `<=
    /// priority`, skipping `exclude_order`.
    fn find_priority_order(&self, start_order: usize, priority: u8, exclude_order: usize) -> usize {
        for i in start_order..self.items.len() {
            if i != exclude_order && self.items[self.order[i]].priority <= priority {
                return i;
            }
        }
        self.items.len()
    }

    fn count_same_priority(&self, start_order: usize, priority: u8) -> usize {
        for i in start_order..self.items.len() {
            if self.items[self.order[i]].priority != priority {
                return i - start_order;
            }
        }
        self.items.len() - start_order
    }

    /// Sets `position`'s priority. In random mode (and `reorder=true`),
    /// also moves the item within `order[]` so it plays right after
    /// `after_order` (typically "currently playing") but before any
    /// lower-or-equal-priority song, without disturbing songs already
    /// played.
    pub fn set_priority(
        &mut self,
        position: usize,
        priority: u8,
        after_order: Option<usize>,
        reorder: bool,
    ) -> bool {
        let old_priority = self.items[position].priority;
        if old_priority == priority {
            return false;
        }

        self.items[position].version = self.version;
        self.items[position].priority = priority;

        if !self.random || !reorder {
            return true;
        }

        let order = self.position_to_order(position);
        if let Some(after_order) = after_order {
            if order == after_order {
                return true;
            }

            if order < after_order {
                let after_position = self.order_to_position(after_order);
                let after_priority = self.items[after_position].priority;
                if priority <= old_priority || priority <= after_priority {
                    return true;
                }
            }
        }

        let search_from = after_order.map(|o| o + 1).unwrap_or(0);
        let before_order = self.find_priority_order(search_from, priority, order);
        let new_order = if before_order > order {
            before_order - 1
        } else {
            before_order
        };
        self.move_order(order, new_order);

        let priority_count = self.count_same_priority(new_order, priority);
        debug_assert!(priority_count >= 1);
        self.shuffle_order_first(new_order, new_order + priority_count);

        true
    }

    /// `after_order` is resolved once, up front (typically the currently
    /// playing song's order-index), matching the playlist-level caller
    /// which computes it before looping over the position range.
    pub fn set_priority_range(
        &mut self,
        start_position: usize,
        end_position: usize,
        priority: u8,
        after_order: Option<usize>,
    ) -> bool {
        let mut modified = false;
        for position in start_position..end_position {
            modified |= self.set_priority(position, priority, after_order, true);
        }
        modified
    }
}
