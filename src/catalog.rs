//! The segment catalog: an ordered, append-only list of sealed-segment
//! descriptors used by the fetch planner to prune which `.idx` files are
//! worth loading from disk.

use crate::index::Direction;

/// The `{min_id, max_id}` range covered by one sealed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub min_id: u64,
    pub max_id: u64,
}

impl SegmentDescriptor {
    /// Whether this segment could hold entries satisfying a fetch
    /// starting at `start_id` walking in `direction`: for a forward
    /// fetch, the segment must not end strictly before `start_id`; for
    /// a backward fetch, it must not start strictly after it.
    pub fn has(&self, start_id: u64, direction: Direction) -> bool {
        match direction {
            Direction::Forward => self.max_id >= start_id,
            Direction::Backward => self.min_id <= start_id,
        }
    }
}

/// Ordered sequence of sealed-segment descriptors, indexed by segment id.
#[derive(Debug, Default, Clone)]
pub struct SegmentCatalog {
    descriptors: Vec<SegmentDescriptor>,
}

impl SegmentCatalog {
    pub fn new() -> Self {
        SegmentCatalog {
            descriptors: Vec::new(),
        }
    }

    pub fn push(&mut self, descriptor: SegmentDescriptor) {
        self.descriptors.push(descriptor);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, segment_id: usize) -> Option<&SegmentDescriptor> {
        self.descriptors.get(segment_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &SegmentDescriptor)> {
        self.descriptors.iter().enumerate()
    }

    pub fn max_id(&self) -> Option<u64> {
        self.descriptors.iter().map(|d| d.max_id).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_forward_excludes_segments_entirely_before_start() {
        let descriptor = SegmentDescriptor {
            min_id: 1,
            max_id: 10,
        };
        assert!(descriptor.has(10, Direction::Forward));
        assert!(!descriptor.has(11, Direction::Forward));
    }

    #[test]
    fn has_backward_excludes_segments_entirely_after_start() {
        let descriptor = SegmentDescriptor {
            min_id: 11,
            max_id: 20,
        };
        assert!(descriptor.has(11, Direction::Backward));
        assert!(!descriptor.has(10, Direction::Backward));
    }

    #[test]
    fn catalog_tracks_max_id_across_descriptors() {
        let mut catalog = SegmentCatalog::new();
        catalog.push(SegmentDescriptor {
            min_id: 1,
            max_id: 4,
        });
        catalog.push(SegmentDescriptor {
            min_id: 5,
            max_id: 8,
        });
        assert_eq!(catalog.max_id(), Some(8));
    }
}
