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

//! Multi-layer proximity graph (HNSW)
//!
//! Nodes live in a slot-indexed arena; neighbor lists are plain slot
//! sequences, so there are no ownership cycles and a freed slot can be reused
//! by the next insertion.
//!
//! ## Layer assignment
//!
//! Each node draws its top layer as `floor(-ln(U) * mL)` with `mL = 1/ln(M)`
//! from a seeded `ChaCha8Rng`, so the expected population of layer `l` shrinks
//! by a factor of `M` per level. The draw is capped at `max_level`.
//!
//! ## Neighbor selection
//!
//! Candidates are considered closest first. A candidate is kept only if it is
//! not closer to some already-kept neighbor than to the base node. Lists that
//! overflow their cap after a back-edge are re-selected with the same rule.
//!
//! ## Removal
//!
//! Every node also records, per layer, the nodes whose lists point at it.
//! Removal uses those back-links to visit only the referrers of the removed
//! node. Each referrer re-selects from its remaining neighbors plus the
//! removed node's neighbors on that layer. If the entry point was removed,
//! the live node with the highest layer takes over.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use smallvec::SmallVec;
use sochdb_simd::Scalar;
use tracing::debug;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::search::{SearchCandidate, SearchExecutor, Space};

/// Neighbor lists up to this length stay inline.
pub const INLINE_NEIGHBORS: usize = 32;

pub type NeighborList = SmallVec<[u32; INLINE_NEIGHBORS]>;

#[derive(Debug, Clone)]
struct Node {
    level: usize,
    seq: u64,
    live: bool,
    /// One list per layer `0..=level`
    layers: Vec<NeighborList>,
    /// Nodes linking here, per layer
    incoming: Vec<NeighborList>,
}

impl Node {
    fn new(level: usize, seq: u64) -> Self {
        Self {
            level,
            seq,
            live: true,
            layers: (0..=level).map(|_| NeighborList::new()).collect(),
            incoming: (0..=level).map(|_| NeighborList::new()).collect(),
        }
    }
}

/// Structural health of the graph.
///
/// Ids are slots as produced by the graph; [`GraphReport::map_ids`] converts
/// them to caller keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphReport<Id = u32> {
    pub total_nodes: usize,
    /// Live nodes reachable from the entry point on layer 0
    pub reachable_nodes: usize,
    pub unreachable_nodes: Vec<Id>,
    /// `(node, level, degree)` for lists above their cap
    pub over_degree_nodes: Vec<(Id, usize, usize)>,
    pub self_loop_nodes: Vec<Id>,
    /// `(node, level)` for lists that reference a dead or missing slot
    pub dangling_references: Vec<(Id, usize)>,
    /// `(node, level)` where recorded back-links disagree with neighbor lists
    pub unmatched_back_links: Vec<(Id, usize)>,
    /// Entry point is live and sits on the top layer, or the graph is empty
    pub entry_point_valid: bool,
    pub is_valid: bool,
}

impl<Id> GraphReport<Id> {
    pub fn map_ids<U>(self, mut f: impl FnMut(Id) -> U) -> GraphReport<U> {
        GraphReport {
            total_nodes: self.total_nodes,
            reachable_nodes: self.reachable_nodes,
            unreachable_nodes: self.unreachable_nodes.into_iter().map(&mut f).collect(),
            over_degree_nodes: self
                .over_degree_nodes
                .into_iter()
                .map(|(id, level, degree)| (f(id), level, degree))
                .collect(),
            self_loop_nodes: self.self_loop_nodes.into_iter().map(&mut f).collect(),
            dangling_references: self
                .dangling_references
                .into_iter()
                .map(|(id, level)| (f(id), level))
                .collect(),
            unmatched_back_links: self
                .unmatched_back_links
                .into_iter()
                .map(|(id, level)| (f(id), level))
                .collect(),
            entry_point_valid: self.entry_point_valid,
            is_valid: self.is_valid,
        }
    }
}

/// Keep candidates (ascending by distance to the base node) that are not
/// closer to an already-kept candidate than to the base, up to `cap`.
pub fn select_diverse<T: Scalar>(
    space: &Space<'_, T>,
    candidates: &[SearchCandidate],
    cap: usize,
) -> NeighborList {
    let mut selected = NeighborList::new();
    for candidate in candidates {
        if selected.len() >= cap {
            break;
        }
        let dominated = selected
            .iter()
            .any(|&kept| space.distance(candidate.slot, kept) < candidate.distance);
        if !dominated {
            selected.push(candidate.slot);
        }
    }
    selected
}

#[derive(Debug)]
pub struct ProximityGraph {
    nodes: Vec<Node>,
    entry_point: Option<u32>,
    max_level: usize,
    live: usize,
    next_seq: u64,
    connectivity: usize,
    connectivity_base: usize,
    level_cap: usize,
    level_multiplier: f64,
    seed: u64,
    rng: ChaCha8Rng,
}

impl ProximityGraph {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            nodes: Vec::new(),
            entry_point: None,
            max_level: 0,
            live: 0,
            next_seq: 0,
            connectivity: config.connectivity,
            connectivity_base: config.connectivity_base,
            level_cap: config.max_level,
            level_multiplier: config.level_multiplier(),
            seed: config.seed,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
        }
    }

    /// Live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Arena length, live or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    #[inline]
    pub fn capacity_at(&self, level: usize) -> usize {
        if level == 0 {
            self.connectivity_base
        } else {
            self.connectivity
        }
    }

    #[inline]
    pub fn is_live(&self, slot: u32) -> bool {
        self.nodes.get(slot as usize).is_some_and(|n| n.live)
    }

    pub fn level_of(&self, slot: u32) -> Option<usize> {
        self.nodes.get(slot as usize).filter(|n| n.live).map(|n| n.level)
    }

    /// Neighbors of `slot` on `level`; empty above the node's top layer.
    #[inline]
    pub fn neighbors(&self, slot: u32, level: usize) -> &[u32] {
        self.nodes[slot as usize]
            .layers
            .get(level)
            .map_or(&[], |list| list.as_slice())
    }

    #[inline]
    pub fn candidate(&self, slot: u32, distance: f32) -> SearchCandidate {
        SearchCandidate {
            distance,
            seq: self.nodes[slot as usize].seq,
            slot,
        }
    }

    /// Mean layer-0 degree over live nodes.
    pub fn average_base_degree(&self) -> f32 {
        if self.live == 0 {
            return 0.0;
        }
        let edges: usize = self
            .nodes
            .iter()
            .filter(|n| n.live)
            .map(|n| n.layers[0].len())
            .sum();
        edges as f32 / self.live as f32
    }

    pub fn reserve(&mut self, slots: usize) -> Result<()> {
        self.nodes.try_reserve(slots.saturating_sub(self.nodes.len()))?;
        Ok(())
    }

    /// Make room for inserting at `slot`. After this succeeds, `insert` does
    /// not grow the arena fallibly.
    pub fn prepare(&mut self, slot: u32) -> Result<()> {
        if slot as usize >= self.nodes.len() {
            self.nodes.try_reserve(1)?;
        }
        Ok(())
    }

    fn draw_level(&mut self) -> usize {
        // 1 - [0, 1) keeps ln away from zero
        let u: f64 = 1.0 - self.rng.r#gen::<f64>();
        let level = (-u.ln() * self.level_multiplier).floor() as usize;
        level.min(self.level_cap)
    }

    /// Link the point stored at `slot` into the graph.
    ///
    /// `space` must already hold the vector for `slot`.
    pub fn insert<T: Scalar>(&mut self, slot: u32, space: &Space<'_, T>, expansion: usize) {
        let level = self.draw_level();
        let node = Node::new(level, self.next_seq);
        self.next_seq += 1;

        let idx = slot as usize;
        if idx < self.nodes.len() {
            self.nodes[idx] = node;
        } else {
            debug_assert_eq!(idx, self.nodes.len());
            self.nodes.push(node);
        }
        self.live += 1;

        let Some(entry) = self.entry_point else {
            debug!(slot, level, "entry point established");
            self.entry_point = Some(slot);
            self.max_level = level;
            return;
        };

        let query = space.vector(slot);
        let mut entries = {
            let executor = SearchExecutor::new(self, *space);
            let mut nearest = self.candidate(entry, space.distance_to(query, entry));
            for l in ((level + 1)..=self.max_level).rev() {
                nearest = executor.greedy_closest(query, nearest, l);
            }
            vec![nearest]
        };

        for l in (0..=level.min(self.max_level)).rev() {
            let candidates = SearchExecutor::new(self, *space).search_layer(query, &entries, expansion, l);
            let selected = select_diverse(space, &candidates, self.capacity_at(l));
            for &neighbor in &selected {
                self.link(neighbor, slot, l, space);
            }
            self.set_neighbors(slot, l, selected);
            entries = candidates;
        }

        if level > self.max_level {
            debug!(slot, level, previous = self.max_level, "entry point replaced");
            self.entry_point = Some(slot);
            self.max_level = level;
        }
    }

    /// Replace `node`'s list on `level`, keeping back-links in step.
    fn set_neighbors(&mut self, node: u32, level: usize, list: NeighborList) {
        let old = std::mem::take(&mut self.nodes[node as usize].layers[level]);
        for &dropped in old.iter().filter(|n| !list.contains(n)) {
            // removed nodes have no back-link lists left
            if let Some(back) = self.nodes[dropped as usize].incoming.get_mut(level) {
                back.retain(|r| *r != node);
            }
        }
        for &added in list.iter().filter(|n| !old.contains(n)) {
            if let Some(back) = self.nodes[added as usize].incoming.get_mut(level) {
                back.push(node);
            }
        }
        self.nodes[node as usize].layers[level] = list;
    }

    /// Add `to` to `from`'s list on `level`, re-selecting if it overflows.
    fn link<T: Scalar>(&mut self, from: u32, to: u32, level: usize, space: &Space<'_, T>) {
        let cap = self.capacity_at(level);
        let list = &mut self.nodes[from as usize].layers[level];
        if list.contains(&to) {
            return;
        }
        if list.len() < cap {
            list.push(to);
            self.nodes[to as usize].incoming[level].push(from);
            return;
        }
        let mut pool: NeighborList = list.clone();
        pool.push(to);
        self.reselect(from, level, pool, space);
    }

    fn reselect<T: Scalar>(&mut self, node: u32, level: usize, pool: NeighborList, space: &Space<'_, T>) {
        let mut candidates: Vec<SearchCandidate> = pool
            .iter()
            .map(|&n| self.candidate(n, space.distance(node, n)))
            .collect();
        candidates.sort_unstable();
        let selected = select_diverse(space, &candidates, self.capacity_at(level));
        self.set_neighbors(node, level, selected);
    }

    /// Unlink `slot`. No-op if it is not a live node.
    pub fn remove<T: Scalar>(&mut self, slot: u32, space: &Space<'_, T>) {
        let Some(node) = self.nodes.get_mut(slot as usize).filter(|n| n.live) else {
            return;
        };
        node.live = false;
        let orphans_by_layer = std::mem::take(&mut node.layers);
        let referrers_by_layer = std::mem::take(&mut node.incoming);
        self.live -= 1;

        for (l, (orphans, referrers)) in orphans_by_layer.iter().zip(&referrers_by_layer).enumerate() {
            for &n in orphans {
                self.nodes[n as usize].incoming[l].retain(|r| *r != slot);
            }

            for &referrer in referrers {
                let mut pool: NeighborList = self.nodes[referrer as usize].layers[l]
                    .iter()
                    .copied()
                    .filter(|&n| n != slot)
                    .collect();
                for &n in orphans {
                    if n != referrer && n != slot && self.is_live(n) && !pool.contains(&n) {
                        pool.push(n);
                    }
                }
                if pool.len() <= self.capacity_at(l) {
                    self.set_neighbors(referrer, l, pool);
                } else {
                    self.reselect(referrer, l, pool, space);
                }
            }
        }

        if self.entry_point == Some(slot) {
            self.elect_entry_point();
        }
    }

    /// Highest-layer live node, earliest insertion on ties.
    fn elect_entry_point(&mut self) {
        let best = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.live)
            .max_by(|(_, a), (_, b)| a.level.cmp(&b.level).then_with(|| b.seq.cmp(&a.seq)));
        match best {
            Some((slot, node)) => {
                debug!(slot, level = node.level, "entry point replaced after removal");
                self.entry_point = Some(slot as u32);
                self.max_level = node.level;
            }
            None => {
                self.entry_point = None;
                self.max_level = 0;
            }
        }
    }

    /// Drop every node and restart the level sequence from the seed.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.entry_point = None;
        self.max_level = 0;
        self.live = 0;
        self.next_seq = 0;
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }

    pub fn check(&self) -> GraphReport<u32> {
        let mut over_degree_nodes = Vec::new();
        let mut self_loop_nodes = Vec::new();
        let mut dangling_references = Vec::new();
        let mut unmatched_back_links = Vec::new();

        for (slot, node) in self.nodes.iter().enumerate().filter(|(_, n)| n.live) {
            let slot = slot as u32;
            let mut has_self_loop = false;
            for (level, list) in node.layers.iter().enumerate() {
                if list.len() > self.capacity_at(level) {
                    over_degree_nodes.push((slot, level, list.len()));
                }
                if list.contains(&slot) {
                    has_self_loop = true;
                }
                if list
                    .iter()
                    .any(|&n| self.level_of(n).is_none_or(|top| top < level))
                {
                    dangling_references.push((slot, level));
                }
                let forward_matched = list.iter().all(|&n| {
                    self.nodes
                        .get(n as usize)
                        .and_then(|target| target.incoming.get(level))
                        .is_some_and(|back| back.contains(&slot))
                });
                let backward_matched = node.incoming[level].iter().all(|&r| {
                    self.is_live(r) && self.neighbors(r, level).contains(&slot)
                });
                if !forward_matched || !backward_matched {
                    unmatched_back_links.push((slot, level));
                }
            }
            if has_self_loop {
                self_loop_nodes.push(slot);
            }
        }

        let mut reached = vec![false; self.nodes.len()];
        let mut reachable_nodes = 0;
        if let Some(entry) = self.entry_point.filter(|&e| self.is_live(e)) {
            let mut stack = vec![entry];
            reached[entry as usize] = true;
            while let Some(current) = stack.pop() {
                reachable_nodes += 1;
                for &n in self.neighbors(current, 0) {
                    if self.is_live(n) && !reached[n as usize] {
                        reached[n as usize] = true;
                        stack.push(n);
                    }
                }
            }
        }
        let unreachable_nodes: Vec<u32> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(s, n)| n.live && !reached[*s])
            .map(|(s, _)| s as u32)
            .collect();

        let entry_point_valid = match self.entry_point {
            None => self.live == 0,
            Some(e) => self.level_of(e) == Some(self.max_level)
                && self.nodes.iter().filter(|n| n.live).all(|n| n.level <= self.max_level),
        };

        let is_valid = entry_point_valid
            && unreachable_nodes.is_empty()
            && over_degree_nodes.is_empty()
            && self_loop_nodes.is_empty()
            && dangling_references.is_empty()
            && unmatched_back_links.is_empty();

        GraphReport {
            total_nodes: self.live,
            reachable_nodes,
            unreachable_nodes,
            over_degree_nodes,
            self_loop_nodes,
            dangling_references,
            unmatched_back_links,
            entry_point_valid,
            is_valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::VectorStore;
    use sochdb_simd::kernels::serial;

    fn fixture(points: &[[f32; 2]]) -> VectorStore<f32> {
        let mut store = VectorStore::new(2);
        for (i, p) in points.iter().enumerate() {
            store.put(i as u32, p);
        }
        store
    }

    fn build(store: &VectorStore<f32>, config: &IndexConfig) -> ProximityGraph {
        let space = Space::new(store, serial::l2sq_f32);
        let mut graph = ProximityGraph::new(config);
        for slot in 0..store.slots() as u32 {
            graph.insert(slot, &space, config.expansion_add);
        }
        graph
    }

    fn grid(n: usize) -> Vec<[f32; 2]> {
        (0..n * n).map(|i| [(i % n) as f32, (i / n) as f32]).collect()
    }

    #[test]
    fn test_first_insert_is_entry_point() {
        let store = fixture(&[[1.0, 1.0]]);
        let graph = build(&store, &IndexConfig::new(2));
        assert_eq!(graph.entry_point(), Some(0));
        assert_eq!(graph.len(), 1);
        assert!(graph.check().is_valid);
    }

    #[test]
    fn test_select_diverse_skips_shadowed() {
        // 1 and 2 sit on the same side of 0, 3 on the other
        let store = fixture(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [-1.5, 0.0]]);
        let space = Space::new(&store, serial::l2sq_f32);
        let mut graph = ProximityGraph::new(&IndexConfig::new(2));
        graph.nodes = (0..4).map(|s| Node::new(0, s)).collect();
        let mut candidates: Vec<_> = [1u32, 2, 3]
            .iter()
            .map(|&s| graph.candidate(s, space.distance(0, s)))
            .collect();
        candidates.sort();
        let selected = select_diverse(&space, &candidates, 8);
        assert_eq!(selected.as_slice(), &[1, 3]);

        let capped = select_diverse(&space, &candidates, 1);
        assert_eq!(capped.as_slice(), &[1]);
    }

    #[test]
    fn test_degree_caps_hold() {
        let points = grid(12);
        let store = fixture(&points);
        let config = IndexConfig::new(2).with_connectivity(4).with_expansion_add(32);
        let graph = build(&store, &config);
        let report = graph.check();
        assert!(report.over_degree_nodes.is_empty());
        assert!(report.self_loop_nodes.is_empty());
        assert!(report.dangling_references.is_empty());
        assert!(report.entry_point_valid);
        assert_eq!(report.total_nodes, points.len());
    }

    #[test]
    fn test_layers_decay() {
        let points = grid(30);
        let store = fixture(&points);
        let config = IndexConfig::new(2).with_connectivity(4).with_expansion_add(16);
        let graph = build(&store, &config);
        let above_zero = graph.nodes.iter().filter(|n| n.level >= 1).count();
        let above_one = graph.nodes.iter().filter(|n| n.level >= 2).count();
        // expected ~225 and ~56 for M = 4
        assert!(above_zero < points.len() / 2);
        assert!(above_one <= above_zero);
        assert!(graph.max_level() >= 1);
    }

    #[test]
    fn test_same_seed_same_graph() {
        let points = grid(8);
        let store = fixture(&points);
        let config = IndexConfig::new(2).with_connectivity(4).with_seed(7);
        let a = build(&store, &config);
        let b = build(&store, &config);
        assert_eq!(a.entry_point(), b.entry_point());
        for slot in 0..points.len() as u32 {
            assert_eq!(a.level_of(slot), b.level_of(slot));
            assert_eq!(a.neighbors(slot, 0), b.neighbors(slot, 0));
        }
    }

    #[test]
    fn test_remove_splices_everywhere() {
        let points = grid(10);
        let store = fixture(&points);
        let config = IndexConfig::new(2).with_connectivity(4).with_expansion_add(32);
        let mut graph = build(&store, &config);
        let space = Space::new(&store, serial::l2sq_f32);

        let victims: Vec<u32> = (0..points.len() as u32).step_by(3).collect();
        for &v in &victims {
            graph.remove(v, &space);
        }
        assert_eq!(graph.len(), points.len() - victims.len());
        for slot in 0..points.len() as u32 {
            if !graph.is_live(slot) {
                continue;
            }
            for level in 0..=graph.level_of(slot).unwrap() {
                for n in graph.neighbors(slot, level) {
                    assert!(!victims.contains(n), "{slot} still links {n}");
                }
            }
        }
        let report = graph.check();
        assert!(report.dangling_references.is_empty());
        assert!(report.entry_point_valid);
    }

    #[test]
    fn test_back_links_follow_churn() {
        let points = grid(10);
        let store = fixture(&points);
        let config = IndexConfig::new(2).with_connectivity(3).with_expansion_add(16);
        let mut graph = build(&store, &config);
        let space = Space::new(&store, serial::l2sq_f32);
        assert!(graph.check().unmatched_back_links.is_empty());

        for slot in (0..points.len() as u32).filter(|s| s % 4 == 1) {
            graph.remove(slot, &space);
        }
        assert!(graph.check().unmatched_back_links.is_empty());

        // freed slots are taken again by fresh nodes
        for slot in (0..points.len() as u32).filter(|s| s % 4 == 1) {
            graph.insert(slot, &space, config.expansion_add);
        }
        let report = graph.check();
        assert!(report.unmatched_back_links.is_empty());
        assert!(report.dangling_references.is_empty());
        assert_eq!(report.total_nodes, points.len());

        for slot in 0..points.len() as u32 {
            for level in 0..=graph.level_of(slot).unwrap() {
                for &n in graph.neighbors(slot, level) {
                    assert!(graph.nodes[n as usize].incoming[level].contains(&slot));
                }
            }
        }
    }

    #[test]
    fn test_removed_node_drops_back_links() {
        let points = grid(4);
        let store = fixture(&points);
        let mut graph = build(&store, &IndexConfig::new(2).with_connectivity(3));
        let space = Space::new(&store, serial::l2sq_f32);

        let victim = 5;
        graph.remove(victim, &space);
        assert!(graph.nodes[victim as usize].incoming.is_empty());
        for node in graph.nodes.iter().filter(|n| n.live) {
            for back in &node.incoming {
                assert!(!back.contains(&victim));
            }
        }
    }

    #[test]
    fn test_remove_entry_point_elects_highest() {
        let points = grid(6);
        let store = fixture(&points);
        let config = IndexConfig::new(2).with_connectivity(3);
        let mut graph = build(&store, &config);
        let space = Space::new(&store, serial::l2sq_f32);

        while let Some(entry) = graph.entry_point() {
            graph.remove(entry, &space);
            if let Some(next) = graph.entry_point() {
                let top = graph.level_of(next).unwrap();
                assert_eq!(top, graph.max_level());
                assert!(graph.check().entry_point_valid);
            }
        }
        assert!(graph.is_empty());
        assert_eq!(graph.max_level(), 0);
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let store = fixture(&[[0.0, 0.0], [1.0, 1.0]]);
        let mut graph = build(&store, &IndexConfig::new(2));
        let space = Space::new(&store, serial::l2sq_f32);
        graph.remove(1, &space);
        graph.remove(1, &space);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_clear_restarts_sequence() {
        let points = grid(5);
        let store = fixture(&points);
        let config = IndexConfig::new(2).with_connectivity(4);
        let mut graph = build(&store, &config);
        let levels: Vec<_> = (0..points.len() as u32).map(|s| graph.level_of(s)).collect();

        graph.clear();
        assert!(graph.is_empty());
        assert_eq!(graph.entry_point(), None);

        let space = Space::new(&store, serial::l2sq_f32);
        for slot in 0..points.len() as u32 {
            graph.insert(slot, &space, config.expansion_add);
        }
        let again: Vec<_> = (0..points.len() as u32).map(|s| graph.level_of(s)).collect();
        assert_eq!(levels, again);
    }
}
