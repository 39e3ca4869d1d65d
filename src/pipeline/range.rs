use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Half-open `[start, stop)` slice of a stage's work units.
///
/// A negative `stop` means "to the end". Re-running a stage with a shifted
/// `start` resumes after the last committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRange {
    pub start: usize,
    pub stop: Option<usize>,
}

impl Default for WorkRange {
    fn default() -> Self {
        Self::ALL
    }
}

impl WorkRange {
    pub const ALL: WorkRange = WorkRange {
        start: 0,
        stop: None,
    };

    /// Builds a range from CLI values, where `stop = -1` means the end.
    pub fn from_cli(start: usize, stop: i64) -> Self {
        Self {
            start,
            stop: usize::try_from(stop).ok(),
        }
    }

    /// Clamps the range to a list of `len` units.
    pub fn bounds(&self, len: usize) -> Range<usize> {
        let stop = self.stop.map_or(len, |s| s.min(len));
        let start = self.start.min(stop);
        start..stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_stop_is_end() {
        let range = WorkRange::from_cli(2, -1);
        assert_eq!(range.bounds(10), 2..10);
    }

    #[test]
    fn test_bounds_are_clamped() {
        assert_eq!(WorkRange::from_cli(5, 100).bounds(8), 5..8);
        assert_eq!(WorkRange::from_cli(20, -1).bounds(8), 8..8);
        assert_eq!(WorkRange::from_cli(6, 3).bounds(8), 3..3);
    }
}
