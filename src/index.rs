//! The in-memory sorted index: an order-statistics container over the
//! active segment's entries, plus the helper used to re-sort records
//! pulled from sealed segments during a fetch.
//!
//! A sorted `Vec` with binary search is sufficient given the fixed
//! segment quota; there is no need for a balanced tree.

/// One resolved message location: which segment it lives in, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub message_id: u64,
    pub offset: u64,
    pub size: u32,
    pub segment_id: u32,
}

/// Fetch direction: ascending (`+1`) or descending (`-1`) by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn from_i8(value: i8) -> Direction {
        if value < 0 {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }

    fn step(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

/// Ascending-by-id sorted list of [`IndexEntry`] values.
#[derive(Debug, Default, Clone)]
pub struct SortedIndex {
    entries: Vec<IndexEntry>,
}

impl SortedIndex {
    pub fn new() -> Self {
        SortedIndex {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SortedIndex {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Inserts `entry`, preserving ascending order by `message_id`.
    ///
    /// Appends are already monotonic within a single partition, so this
    /// is an append in the common case; the binary search keeps the
    /// container correct even if that assumption is ever violated.
    pub fn insert(&mut self, entry: IndexEntry) {
        let pos = self
            .entries
            .partition_point(|e| e.message_id < entry.message_id);
        self.entries.insert(pos, entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn front(&self) -> Option<&IndexEntry> {
        self.entries.first()
    }

    pub fn back(&self) -> Option<&IndexEntry> {
        self.entries.last()
    }

    pub fn get(&self, pos: usize) -> Option<&IndexEntry> {
        self.entries.get(pos)
    }

    /// Locates `id`. Returns `(found, position, insertion_position)`: if
    /// `found` is `true`, `position == insertion_position`.
    pub fn find(&self, id: u64) -> (bool, usize, usize) {
        match self.entries.binary_search_by_key(&id, |e| e.message_id) {
            Ok(pos) => (true, pos, pos),
            Err(insertion_pos) => (false, insertion_pos, insertion_pos),
        }
    }

    /// Walks from `start_id` in `direction`, collecting up to `count`
    /// entries. If `start_id` is absent, walking starts from its
    /// insertion position for `Forward`, or one position before it for
    /// `Backward` (the insertion position is the first entry greater
    /// than `start_id`, which a backward walk must skip).
    pub fn retrieve(&self, start_id: u64, count: usize, direction: Direction) -> Vec<IndexEntry> {
        if count == 0 || self.entries.is_empty() {
            return Vec::new();
        }

        let (found, pos, insertion_pos) = self.find(start_id);
        let mut current_pos: i64 = if found {
            pos as i64
        } else if direction == Direction::Backward {
            insertion_pos as i64 - 1
        } else {
            insertion_pos as i64
        };

        let step = direction.step();
        let len = self.entries.len() as i64;
        let mut collected = Vec::with_capacity(count.min(self.entries.len()));

        while collected.len() < count && current_pos >= 0 && current_pos < len {
            collected.push(self.entries[current_pos as usize]);
            current_pos += step;
        }

        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64) -> IndexEntry {
        IndexEntry {
            message_id: id,
            offset: id * 10,
            size: 1,
            segment_id: 0,
        }
    }

    #[test]
    fn insert_keeps_ascending_order_even_out_of_order_input() {
        let mut index = SortedIndex::new();
        for id in [5, 1, 3, 2, 4] {
            index.insert(entry(id));
        }
        let ids: Vec<u64> = (0..index.len())
            .map(|i| index.get(i).unwrap().message_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn find_reports_insertion_position_when_absent() {
        let mut index = SortedIndex::new();
        for id in [10, 20, 30] {
            index.insert(entry(id));
        }
        assert_eq!(index.find(20), (true, 1, 1));
        assert_eq!(index.find(25), (false, 2, 2));
        assert_eq!(index.find(5), (false, 0, 0));
        assert_eq!(index.find(100), (false, 3, 3));
    }

    #[test]
    fn retrieve_forward_stops_at_bounds() {
        let mut index = SortedIndex::new();
        for id in 1..=5u64 {
            index.insert(entry(id));
        }
        let got = index.retrieve(3, 10, Direction::Forward);
        let ids: Vec<u64> = got.iter().map(|e| e.message_id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn retrieve_backward_from_missing_start_uses_insertion_point() {
        let mut index = SortedIndex::new();
        for id in [1, 2, 4, 5] {
            index.insert(entry(id));
        }
        // 3 is absent; insertion position is 2 (entry with id 4), so a
        // backward walk must start one before it, at id 2.
        let got = index.retrieve(3, 2, Direction::Backward);
        let ids: Vec<u64> = got.iter().map(|e| e.message_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn retrieve_backward_from_start_past_max_returns_whole_tail() {
        let mut index = SortedIndex::new();
        for id in 1..=10u64 {
            index.insert(entry(id));
        }
        // start_id=7 is present; walking backward should still collect the
        // full requested count even when it spans every lower entry.
        let got = index.retrieve(7, 5, Direction::Backward);
        let ids: Vec<u64> = got.iter().map(|e| e.message_id).collect();
        assert_eq!(ids, vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn retrieve_returns_empty_for_zero_count() {
        let mut index = SortedIndex::new();
        index.insert(entry(1));
        assert!(index.retrieve(1, 0, Direction::Forward).is_empty());
    }
}
