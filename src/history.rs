use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::Record;

/// How many records a buffer may retain.
///
/// `Bounded(0)` means "retain nothing": the buffer becomes a no-op sink.
/// `Unbounded` never evicts, which means memory grows with the run length.
/// That is a documented risk the caller accepts, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capacity {
    /// Keep at most this many records, evicting the oldest first.
    Bounded(usize),
    /// Never evict.
    Unbounded,
}

impl Capacity {
    /// The retention limit, or `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Capacity::Bounded(limit) => Some(*limit),
            Capacity::Unbounded => None,
        }
    }
}

impl From<usize> for Capacity {
    fn from(limit: usize) -> Self {
        Capacity::Bounded(limit)
    }
}

/// A bounded, ordered buffer of records with FIFO eviction.
///
/// Appending is O(1) amortized and never fails; once the buffer is at
/// capacity the oldest record is evicted to make room for the newest.
/// Indexing is relative to the current window: index `0` is the oldest
/// *retained* record and negative indices count from the end, so `-1` is
/// always the most recent record.
///
/// # Examples
///
/// ```
/// use runlog::{Capacity, History, record};
///
/// let mut history = History::new(Capacity::Bounded(2));
/// history.push(record! { "id": "a" });
/// history.push(record! { "id": "b" });
/// history.push(record! { "id": "c" });
///
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.get(0).unwrap()["id"], "b");
/// assert_eq!(history.get(-1).unwrap()["id"], "c");
/// ```
#[derive(Debug)]
pub struct History {
    entries: VecDeque<Record>,
    capacity: Capacity,
}

impl History {
    /// Creates an empty history with the given capacity.
    pub fn new(capacity: Capacity) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Appends a record, evicting the oldest one first when at capacity.
    pub fn push(&mut self, record: Record) {
        match self.capacity {
            Capacity::Bounded(0) => {}
            Capacity::Bounded(limit) => {
                if self.entries.len() >= limit {
                    self.entries.pop_front();
                }
                self.entries.push_back(record);
            }
            Capacity::Unbounded => self.entries.push_back(record),
        }
    }

    /// Returns the record at a zero-based or negative (from-end) index.
    ///
    /// Fails with [`Error::OutOfRange`] when the index falls outside the
    /// currently retained window, either because the record was evicted or
    /// because it was never produced.
    pub fn get(&self, index: i64) -> Result<&Record> {
        let len = self.entries.len() as i64;
        let resolved = if index < 0 { index + len } else { index };
        if resolved < 0 || resolved >= len {
            return Err(Error::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(&self.entries[resolved as usize])
    }

    /// Number of currently retained records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured retention bound.
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Iterates retained records from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter()
    }
}
