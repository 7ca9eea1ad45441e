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

//! Bounded best-first graph search
//!
//! Shared by insertion (to gather neighbor candidates) and by queries. A
//! min-heap holds the frontier and a max-heap of width `ef` holds the best
//! results so far; expansion stops once the closest unexpanded candidate is
//! worse than the worst kept result.
//!
//! Candidates order by `(distance, seq)`, where `seq` is the node's insertion
//! sequence number, so equal distances resolve to the earlier insertion.

use std::cmp::{Ordering, Reverse};

use sochdb_simd::{DistanceFn, Scalar};

use crate::graph::ProximityGraph;
use crate::storage::VectorStore;
use crate::scratch::with_scratch;

/// Priority queue entry for search
#[derive(Debug, Clone, Copy)]
pub struct SearchCandidate {
    pub distance: f32,
    /// Insertion sequence of the node, for tie-breaking
    pub seq: u64,
    pub slot: u32,
}

impl PartialEq for SearchCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchCandidate {}

impl PartialOrd for SearchCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Stored vectors plus the kernel that measures them.
#[derive(Clone, Copy)]
pub struct Space<'a, T: Scalar> {
    vectors: &'a VectorStore<T>,
    kernel: DistanceFn<T>,
}

impl<'a, T: Scalar> Space<'a, T> {
    pub fn new(vectors: &'a VectorStore<T>, kernel: DistanceFn<T>) -> Self {
        Self { vectors, kernel }
    }

    #[inline]
    pub fn vector(&self, slot: u32) -> &'a [T] {
        self.vectors.get(slot)
    }

    /// Distance between two stored points.
    #[inline]
    pub fn distance(&self, a: u32, b: u32) -> f32 {
        (self.kernel)(self.vectors.get(a), self.vectors.get(b))
    }

    #[inline]
    pub fn distance_to(&self, query: &[T], slot: u32) -> f32 {
        (self.kernel)(query, self.vectors.get(slot))
    }
}

pub struct SearchExecutor<'a, T: Scalar> {
    graph: &'a ProximityGraph,
    space: Space<'a, T>,
}

impl<'a, T: Scalar> SearchExecutor<'a, T> {
    pub fn new(graph: &'a ProximityGraph, space: Space<'a, T>) -> Self {
        Self { graph, space }
    }

    #[inline]
    fn candidate(&self, query: &[T], slot: u32) -> SearchCandidate {
        self.graph.candidate(slot, self.space.distance_to(query, slot))
    }

    /// Single-path greedy walk on `level`: move to any closer neighbor until
    /// none is closer.
    pub fn greedy_closest(&self, query: &[T], start: SearchCandidate, level: usize) -> SearchCandidate {
        let mut best = start;
        loop {
            let mut improved = false;
            for &neighbor in self.graph.neighbors(best.slot, level) {
                let candidate = self.candidate(query, neighbor);
                if candidate < best {
                    best = candidate;
                    improved = true;
                }
            }
            if !improved {
                return best;
            }
        }
    }

    /// Best-first search on one layer. Returns up to `ef` candidates, ascending.
    pub fn search_layer(
        &self,
        query: &[T],
        entries: &[SearchCandidate],
        ef: usize,
        level: usize,
    ) -> Vec<SearchCandidate> {
        // wider than the graph buys nothing
        let ef = ef.clamp(1, self.graph.node_count().max(1));
        with_scratch(self.graph.node_count(), |scratch| {
            let visited = &mut scratch.visited;
            let frontier = &mut scratch.frontier;
            let results = &mut scratch.results;

            for &entry in entries {
                if visited.mark(entry.slot) {
                    frontier.push(Reverse(entry));
                    results.push(entry);
                }
            }
            while results.len() > ef {
                results.pop();
            }

            while let Some(Reverse(current)) = frontier.pop() {
                if let Some(worst) = results.peek() {
                    if results.len() >= ef && current > *worst {
                        break;
                    }
                }

                for &neighbor in self.graph.neighbors(current.slot, level) {
                    if !visited.mark(neighbor) {
                        continue;
                    }
                    let candidate = self.candidate(query, neighbor);
                    let admit = results.len() < ef || results.peek().is_some_and(|worst| candidate < *worst);
                    if admit {
                        frontier.push(Reverse(candidate));
                        results.push(candidate);
                        if results.len() > ef {
                            results.pop();
                        }
                    }
                }
            }

            let mut found: Vec<SearchCandidate> = results.drain().collect();
            found.sort_unstable();
            found
        })
    }

    /// Descend from the entry point with greedy steps, then run the full-width
    /// search on layer 0. Returns the `k` closest live points, ascending.
    pub fn knn(&self, query: &[T], k: usize, ef: usize) -> Vec<SearchCandidate> {
        let Some(entry) = self.graph.entry_point() else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut nearest = self.candidate(query, entry);
        for level in (1..=self.graph.max_level()).rev() {
            nearest = self.greedy_closest(query, nearest, level);
        }

        let mut found = self.search_layer(query, &[nearest], ef.max(k), 0);
        found.retain(|c| self.graph.is_live(c.slot));
        found.truncate(k);
        found
    }
}
