// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Thread-local scratch state for layer searches
//!
//! Each thread keeps one `SearchScratch` holding the visited marks and both
//! search heaps. Buffers are cleared, never dropped, between searches so the
//! steady state allocates nothing.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::search::SearchCandidate;

/// Heaps that grew past this many entries are released after the search.
const HEAP_RETAIN: usize = 4096;

/// Epoch-stamped visited marks, one `u32` stamp per slot.
///
/// Starting a new pass only bumps the epoch; stamps are zeroed when the
/// epoch counter wraps.
#[derive(Debug, Default)]
pub struct VisitedMarks {
    stamps: Vec<u32>,
    epoch: u32,
}

impl VisitedMarks {
    /// Start a new pass over at least `slots` slots.
    pub fn begin(&mut self, slots: usize) {
        if slots > self.stamps.len() {
            self.stamps.resize(slots, 0);
        }
        self.epoch = match self.epoch.checked_add(1) {
            Some(epoch) => epoch,
            None => {
                self.stamps.fill(0);
                1
            }
        };
    }

    /// Mark `slot`; `true` the first time it is seen in this pass.
    #[inline]
    pub fn mark(&mut self, slot: u32) -> bool {
        let stamp = &mut self.stamps[slot as usize];
        let fresh = *stamp != self.epoch;
        *stamp = self.epoch;
        fresh
    }

    #[cfg(test)]
    fn is_marked(&self, slot: u32) -> bool {
        self.stamps.get(slot as usize) == Some(&self.epoch)
    }
}

#[derive(Debug, Default)]
pub struct SearchScratch {
    pub visited: VisitedMarks,
    /// Unexpanded candidates, closest first
    pub frontier: BinaryHeap<Reverse<SearchCandidate>>,
    /// Best results so far, worst on top
    pub results: BinaryHeap<SearchCandidate>,
}

impl SearchScratch {
    fn reset(&mut self, slots: usize) {
        self.visited.begin(slots);
        self.frontier.clear();
        self.results.clear();
    }

    fn release_oversized(&mut self) {
        if self.frontier.capacity() > HEAP_RETAIN {
            self.frontier = BinaryHeap::new();
        }
        if self.results.capacity() > HEAP_RETAIN {
            self.results = BinaryHeap::new();
        }
    }
}

thread_local! {
    static SCRATCH: RefCell<SearchScratch> = RefCell::new(SearchScratch::default());
}

/// Run `f` with this thread's scratch, reset for a graph of `slots` slots.
///
/// Not reentrant: `f` must not call back into `with_scratch`.
pub fn with_scratch<F, R>(slots: usize, f: F) -> R
where
    F: FnOnce(&mut SearchScratch) -> R,
{
    SCRATCH.with(|cell| {
        let mut scratch = cell.borrow_mut();
        scratch.reset(slots);
        let out = f(&mut scratch);
        scratch.release_oversized();
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(slot: u32, distance: f32) -> SearchCandidate {
        SearchCandidate { distance, seq: u64::from(slot), slot }
    }

    #[test]
    fn test_marks_reset_per_pass() {
        let mut marks = VisitedMarks::default();
        marks.begin(4);
        assert!(marks.mark(2));
        assert!(!marks.mark(2));
        assert!(marks.is_marked(2));

        marks.begin(8);
        assert!(!marks.is_marked(2));
        assert!(marks.mark(7));
    }

    #[test]
    fn test_epoch_wrap_zeroes_stamps() {
        let mut marks = VisitedMarks::default();
        marks.begin(3);
        marks.epoch = u32::MAX;
        marks.mark(1);
        marks.begin(3);
        assert_eq!(marks.epoch, 1);
        assert!(!marks.is_marked(1));
        assert!(marks.mark(1));
    }

    #[test]
    fn test_scratch_cleared_between_calls() {
        with_scratch(16, |s| {
            s.visited.mark(3);
            s.frontier.push(Reverse(candidate(3, 1.0)));
            s.results.push(candidate(3, 1.0));
        });
        with_scratch(16, |s| {
            assert!(s.frontier.is_empty());
            assert!(s.results.is_empty());
            assert!(s.visited.mark(3));
        });
    }

    #[test]
    fn test_oversized_heaps_released() {
        with_scratch(1, |s| {
            s.results.reserve(HEAP_RETAIN * 2);
        });
        let capacity = with_scratch(1, |s| s.results.capacity());
        assert!(capacity <= HEAP_RETAIN);
    }
}
