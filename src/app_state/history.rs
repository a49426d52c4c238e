//! Fixed-capacity circular history of valid readings

use crate::temperature::Temperature;

/// Index after `current` in a ring of `len` slots.
#[inline]
pub const fn next_index(current: usize, len: usize) -> usize {
    (current + 1) % len
}

/// Index before `current` in a ring of `len` slots.
#[inline]
pub const fn prev_index(current: usize, len: usize) -> usize {
    if current == 0 { len - 1 } else { current - 1 }
}

/// Ring buffer of the last `N` valid readings.
///
/// `cursor` is always the slot the next push lands in, which is also the
/// oldest retained entry (or still [`Temperature::NO_VALUE`] while the ring is
/// filling up).
#[derive(Debug, Clone)]
pub struct History<const N: usize> {
    slots: [Temperature; N],
    cursor: usize,
}

impl<const N: usize> History<N> {
    pub const fn new() -> Self {
        const { assert!(N > 0, "history needs at least one slot") };
        Self {
            slots: [Temperature::NO_VALUE; N],
            cursor: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Overwrite the oldest slot and advance the cursor.
    pub fn push(&mut self, value: Temperature) {
        self.slots[self.cursor] = value;
        self.cursor = next_index(self.cursor, N);
    }

    /// Walk backwards from the most recent entry.
    ///
    /// Stops after one full lap or at the first slot that was never written.
    pub fn newest_first(&self) -> NewestFirst<'_, N> {
        NewestFirst {
            slots: &self.slots,
            index: prev_index(self.cursor, N),
            remaining: N,
        }
    }
}

impl<const N: usize> Default for History<N> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct NewestFirst<'a, const N: usize> {
    slots: &'a [Temperature; N],
    index: usize,
    remaining: usize,
}

impl<const N: usize> Iterator for NewestFirst<'_, N> {
    type Item = Temperature;

    fn next(&mut self) -> Option<Temperature> {
        if self.remaining == 0 {
            return None;
        }

        let value = self.slots[self.index];
        if !value.is_valid() {
            self.remaining = 0;
            return None;
        }

        self.remaining -= 1;
        self.index = prev_index(self.index, N);
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
