//! Maps stable queue ids to their current position in the queue.
//!
//! A direct-indexed sparse table rather than a hash map: ids are handed out
//! by sweeping a rotating cursor over a `4x`-overprovisioned array, so the
//! common case (insert at the back, occasional delete) never needs to
//! rehash anything when the queue is reordered.

/// Overprovisioning factor for the id space relative to the queue's
/// `max_length`, so `GenerateId` essentially never wraps in normal use.
pub const HASH_MULT: usize = 4;

/// Sentinel stored for an id that isn't currently bound to a position.
const FREE: i64 = -1;

#[derive(Debug)]
pub struct IdTable {
    /// How many entries of `data` have ever been touched. Id 0 is never
    /// issued, so this starts at 1.
    initialized: u32,
    next: u32,
    data: Vec<i64>,
}

impl IdTable {
    pub fn new(size: usize) -> Self {
        Self {
            initialized: 1,
            next: 1,
            data: vec![FREE; size.max(2)],
        }
    }

    /// Returns the position bound to `id`, or `-1` if `id` is unknown or
    /// has been freed.
    pub fn id_to_position(&self, id: u32) -> i64 {
        if (id as usize) < self.initialized as usize {
            self.data[id as usize]
        } else {
            -1
        }
    }

    /// Sweeps the cursor to find a free id, growing `initialized` lazily so
    /// that never-used slots need not be zeroed up front.
    pub fn generate_id(&mut self) -> u32 {
        debug_assert!(self.next > 0);
        debug_assert!((self.next as usize) <= self.initialized as usize);

        loop {
            let id = self.next;

            self.next += 1;
            if self.next as usize == self.data.len() {
                self.next = 1;
            }

            if id == self.initialized {
                self.initialized += 1;
                return id;
            }

            debug_assert!((id as usize) < self.initialized as usize);

            if self.data[id as usize] < 0 {
                return id;
            }
        }
    }

    pub fn insert(&mut self, position: usize) -> u32 {
        let id = self.generate_id();
        self.data[id as usize] = position as i64;
        id
    }

    pub fn r#move(&mut self, id: u32, position: usize) {
        debug_assert!((id as usize) < self.initialized as usize);
        debug_assert!(self.data[id as usize] >= 0);
        self.data[id as usize] = position as i64;
    }

    pub fn erase(&mut self, id: u32) {
        debug_assert!((id as usize) < self.initialized as usize);
        debug_assert!(self.data[id as usize] >= 0);
        self.data[id as usize] = FREE;
    }
}
