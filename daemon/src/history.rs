//! Fixed-capacity position history (sliding window)

use nalgebra::Point2;

pub type Position = Point2<f64>;

/// Ring buffer of the most recent positions, iterated oldest-first.
///
/// Once `capacity` samples are stored, each push overwrites the oldest slot.
#[derive(Debug, Clone)]
pub struct History {
    buffer: Vec<Position>,
    head: usize,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    pub fn push(&mut self, position: Position) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(position);
        } else {
            self.buffer[self.head] = position;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.head = 0;
    }

    pub fn first(&self) -> Option<&Position> {
        self.iter().next()
    }

    pub fn last(&self) -> Option<&Position> {
        if self.is_empty() {
            return None;
        }
        // head is 0 until the buffer wraps, so this covers both cases
        let idx = (self.head + self.buffer.len() - 1) % self.buffer.len();
        self.buffer.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> + '_ {
        let (newer, older) = self.buffer.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    pub fn to_vec(&self) -> Vec<Position> {
        self.iter().copied().collect()
    }
}
