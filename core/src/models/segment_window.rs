use std::collections::{BTreeSet, HashSet};

/// Per-channel ordered sequence of segment numbers currently referenced by
/// the live playlist on disk. Segment numbers are monotonically
/// non-decreasing across a channel's lifetime and never reset on
/// transitions.
#[derive(Debug, Clone, Default)]
pub struct SegmentWindow {
    segments: BTreeSet<u64>,
    highest_seen: u64,
}

impl SegmentWindow {
    pub fn observe(&mut self, segment_numbers: impl IntoIterator<Item = u64>) {
        for n in segment_numbers {
            self.segments.insert(n);
            if n > self.highest_seen {
                self.highest_seen = n;
            }
        }
    }

    pub fn highest(&self) -> u64 {
        self.highest_seen
    }

    pub fn current(&self) -> &BTreeSet<u64> {
        &self.segments
    }
}

/// Per-channel set of segment numbers at which a discontinuity marker must
/// be injected when the playlist is served.
#[derive(Debug, Clone, Default)]
pub struct TransitionMarkers {
    pending: HashSet<u64>,
}

impl TransitionMarkers {
    pub fn record(&mut self, segment_number: u64) {
        self.pending.insert(segment_number);
    }

    pub fn contains(&self, segment_number: u64) -> bool {
        self.pending.contains(&segment_number)
    }

    pub fn current(&self) -> &HashSet<u64> {
        &self.pending
    }

    pub fn clear(&mut self, segment_number: u64) {
        self.pending.remove(&segment_number);
    }
}
