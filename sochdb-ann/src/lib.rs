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

//! SochDB Approximate Nearest-Neighbor Index
//!
//! An HNSW dense index over fixed-dimensional vectors, with distance kernels
//! resolved once per index from [`sochdb_simd`].
//!
//! ## Layout
//!
//! - **Graph** (`graph`): the multi-layer proximity graph, slot-indexed.
//! - **Search** (`search`): bounded best-first traversal used by both
//!   insertion and queries.
//! - **Index** (`index`): `DenseIndex`, which owns the graph, the vector
//!   arena and the key <-> slot map behind a `parking_lot::RwLock`.
//!
//! ```rust,ignore
//! use sochdb_ann::{DenseIndex, IndexConfig, MetricKind};
//!
//! let index: DenseIndex = DenseIndex::new(IndexConfig::new(784).with_metric(MetricKind::Cosine))?;
//! index.reserve(60_000)?;
//! index.add(42, &vector)?;
//! let hits = index.search(&query, 10)?;
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod search;
pub mod slots;
pub mod storage;
mod scratch;

pub use config::IndexConfig;
pub use error::{IndexError, Result};
pub use graph::{GraphReport, ProximityGraph};
pub use index::{DenseIndex, IndexStats, SearchHit, recall_at_k};
pub use search::{SearchCandidate, SearchExecutor, Space};

pub use sochdb_simd::{CapabilityLevel, CapabilitySet, MetricKind, MetricResolver, Scalar, ScalarKind};
