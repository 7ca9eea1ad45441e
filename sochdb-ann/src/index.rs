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

//! Dense vector index
//!
//! Ties a [`ProximityGraph`] to a resolved distance kernel and an external
//! key map. All methods take `&self`: searches share a read lock, mutations
//! take the write lock.

use std::collections::HashSet;
use std::fmt;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sochdb_simd::{MetricKind, MetricResolver, Scalar, TypedKernel};
use tracing::{debug, info, trace};

use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::graph::{GraphReport, ProximityGraph};
use crate::search::{SearchCandidate, SearchExecutor, Space};
use crate::slots::SlotMap;
use crate::storage::VectorStore;

/// One search result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub key: u64,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub size: usize,
    pub capacity: usize,
    pub max_level: usize,
    pub dimensions: usize,
    pub avg_base_degree: f32,
    pub isa: &'static str,
}

struct IndexInner<T: Scalar> {
    slots: SlotMap,
    vectors: VectorStore<T>,
    graph: ProximityGraph,
}

impl<T: Scalar> IndexInner<T> {
    fn hits(&self, found: Vec<SearchCandidate>) -> Vec<SearchHit> {
        found
            .into_iter()
            .filter_map(|c| {
                self.slots.key_of(c.slot).map(|key| SearchHit {
                    key,
                    distance: c.distance,
                })
            })
            .collect()
    }

    /// Brute force over every live slot.
    fn exact(&self, space: Space<'_, T>, query: &[T], k: usize) -> Vec<SearchCandidate> {
        let live: Vec<u32> = self.slots.iter().map(|(slot, _)| slot).collect();
        let mut all: Vec<SearchCandidate> = live
            .par_iter()
            .map(|&slot| self.graph.candidate(slot, space.distance_to(query, slot)))
            .collect();
        if all.len() > k {
            all.select_nth_unstable(k);
            all.truncate(k);
        }
        all.sort_unstable();
        all
    }
}

/// Approximate nearest-neighbor index over fixed-length vectors.
pub struct DenseIndex<T: Scalar = f32> {
    config: IndexConfig,
    kernel: TypedKernel<T>,
    inner: RwLock<IndexInner<T>>,
}

impl<T: Scalar> DenseIndex<T> {
    /// Build an index with kernels from the process-wide resolver.
    pub fn new(config: IndexConfig) -> Result<Self> {
        Self::with_resolver(config, MetricResolver::global())
    }

    /// Fails with `UnsupportedMetric` if `resolver` has no kernel for the
    /// configured metric over `T`.
    pub fn with_resolver(config: IndexConfig, resolver: &MetricResolver) -> Result<Self> {
        Self::build(config, resolver, SlotMap::new())
    }

    fn build(config: IndexConfig, resolver: &MetricResolver, slots: SlotMap) -> Result<Self> {
        config.validate()?;
        let kernel = resolver.resolve_typed::<T>(config.metric)?;
        let scalar = T::KIND;
        info!(
            dimensions = config.dimensions,
            metric = %config.metric,
            scalar = %scalar,
            isa = kernel.isa_name(),
            connectivity = config.connectivity,
            expansion_add = config.expansion_add,
            expansion_search = config.expansion_search,
            "dense index created"
        );
        let inner = IndexInner {
            slots,
            vectors: VectorStore::new(config.dimensions),
            graph: ProximityGraph::new(&config),
        };
        Ok(Self {
            config,
            kernel,
            inner: RwLock::new(inner),
        })
    }

    #[inline]
    fn check_dimensions(&self, actual: usize) -> Result<()> {
        if actual != self.config.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.config.dimensions,
                actual,
            });
        }
        Ok(())
    }

    /// Pre-allocate room for `capacity` points. Advisory.
    pub fn reserve(&self, capacity: usize) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.slots.reserve(capacity)?;
        inner.vectors.reserve(capacity)?;
        inner.graph.reserve(capacity)?;
        debug!(capacity, "reserved");
        Ok(())
    }

    pub fn add(&self, key: u64, vector: &[T]) -> Result<()> {
        self.check_dimensions(vector.len())?;

        let mut guard = self.inner.write();
        let IndexInner { slots, vectors, graph } = &mut *guard;
        if slots.contains(key) {
            return Err(IndexError::DuplicateKey(key));
        }

        // every fallible step happens before anything is bound
        let slot = slots.next_slot()?;
        vectors.prepare(slot)?;
        graph.prepare(slot)?;
        let slot = slots.allocate(key)?;

        vectors.put(slot, vector);
        let space = Space::new(vectors, self.kernel.func());
        graph.insert(slot, &space, self.config.expansion_add);
        trace!(key, slot, "added");
        Ok(())
    }

    pub fn remove(&self, key: u64) -> Result<()> {
        let mut guard = self.inner.write();
        let IndexInner { slots, vectors, graph } = &mut *guard;
        let slot = slots.release(key)?;
        let space = Space::new(vectors, self.kernel.func());
        graph.remove(slot, &space);
        trace!(key, slot, "removed");
        Ok(())
    }

    /// Up to `k` nearest keys, ascending by distance.
    pub fn search(&self, query: &[T], k: usize) -> Result<Vec<SearchHit>> {
        self.search_with_expansion(query, k, self.config.expansion_search)
    }

    /// `search` with a per-call candidate width. `ef` below `k` is raised to `k`.
    pub fn search_with_expansion(&self, query: &[T], k: usize, ef: usize) -> Result<Vec<SearchHit>> {
        self.check_dimensions(query.len())?;
        let inner = self.inner.read();
        if k == 0 || inner.slots.is_empty() {
            return Ok(Vec::new());
        }

        let k = k.min(inner.slots.len());
        let space = Space::new(&inner.vectors, self.kernel.func());
        let mut found = SearchExecutor::new(&inner.graph, space).knn(query, k, ef);

        if found.len() < k {
            // only after removals have cut the graph
            debug!(found = found.len(), wanted = k, "graph search came up short, scanning");
            found = inner.exact(space, query, k);
        }
        Ok(inner.hits(found))
    }

    /// Exact k nearest neighbors by brute force.
    pub fn search_exact(&self, query: &[T], k: usize) -> Result<Vec<SearchHit>> {
        self.check_dimensions(query.len())?;
        let inner = self.inner.read();
        if k == 0 {
            return Ok(Vec::new());
        }
        let space = Space::new(&inner.vectors, self.kernel.func());
        let found = inner.exact(space, query, k);
        Ok(inner.hits(found))
    }

    pub fn size(&self) -> usize {
        self.inner.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn contains(&self, key: u64) -> bool {
        self.inner.read().slots.contains(key)
    }

    /// Copy of the stored vector.
    pub fn get(&self, key: u64) -> Option<Vec<T>> {
        let inner = self.inner.read();
        let slot = inner.slots.slot_of(key)?;
        Some(inner.vectors.get(slot).to_vec())
    }

    /// Live keys in slot order.
    pub fn keys(&self) -> Vec<u64> {
        self.inner.read().slots.iter().map(|(_, key)| key).collect()
    }

    /// Points that fit without reallocating vector storage.
    pub fn capacity(&self) -> usize {
        self.inner.read().vectors.capacity()
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    pub fn metric(&self) -> MetricKind {
        self.config.metric
    }

    /// ISA of the distance kernel in use, e.g. `"skylake"`.
    pub fn isa_name(&self) -> &'static str {
        self.kernel.isa_name()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn kernel(&self) -> TypedKernel<T> {
        self.kernel
    }

    /// Drop every point. Configuration and reserved capacity are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.slots.clear();
        inner.vectors.clear();
        inner.graph.clear();
        debug!("cleared");
    }

    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read();
        IndexStats {
            size: inner.slots.len(),
            capacity: inner.vectors.capacity(),
            max_level: inner.graph.max_level(),
            dimensions: self.config.dimensions,
            avg_base_degree: inner.graph.average_base_degree(),
            isa: self.kernel.isa_name(),
        }
    }

    /// Structural report with node ids translated to keys.
    pub fn check_graph(&self) -> GraphReport<u64> {
        let inner = self.inner.read();
        debug_assert_eq!(inner.slots.len(), inner.graph.len());
        // reported nodes are live, and live nodes always have a key
        inner
            .graph
            .check()
            .map_ids(|slot| inner.slots.key_of(slot).unwrap_or(u64::MAX))
    }
}

impl<T: Scalar> fmt::Debug for DenseIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseIndex")
            .field("config", &self.config)
            .field("size", &self.size())
            .field("isa", &self.kernel.isa_name())
            .finish()
    }
}

/// Fraction of `exact` keys present in `approx`. `1.0` when `exact` is empty.
pub fn recall_at_k(approx: &[SearchHit], exact: &[SearchHit]) -> f32 {
    if exact.is_empty() {
        return 1.0;
    }
    let found: HashSet<u64> = approx.iter().map(|h| h.key).collect();
    let hits = exact.iter().filter(|h| found.contains(&h.key)).count();
    hits as f32 / exact.len() as f32
}
