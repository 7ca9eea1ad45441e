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

//! Index configuration

use serde::{Deserialize, Serialize};
use sochdb_simd::MetricKind;

use crate::error::{IndexError, Result};

/// Neighbors per node on layers above 0 (M).
pub const DEFAULT_CONNECTIVITY: usize = 16;
/// Candidate list width while inserting (efConstruction).
pub const DEFAULT_EXPANSION_ADD: usize = 128;
/// Candidate list width while querying (ef).
pub const DEFAULT_EXPANSION_SEARCH: usize = 64;
/// Hard cap on the drawn top layer.
pub const DEFAULT_MAX_LEVEL: usize = 16;
pub const DEFAULT_SEED: u64 = 0x5DEE_CE66_D1CE_4E5B;

const MAX_LEVEL_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Vector length, fixed for the life of the index
    pub dimensions: usize,
    pub metric: MetricKind,
    /// Max neighbors per node per layer, layers >= 1
    pub connectivity: usize,
    /// Max neighbors per node on layer 0
    pub connectivity_base: usize,
    pub expansion_add: usize,
    pub expansion_search: usize,
    /// Seed for layer assignment; same seed and insertion order give the same graph
    pub seed: u64,
    pub max_level: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimensions: 0,
            metric: MetricKind::Cosine,
            connectivity: DEFAULT_CONNECTIVITY,
            connectivity_base: DEFAULT_CONNECTIVITY * 2,
            expansion_add: DEFAULT_EXPANSION_ADD,
            expansion_search: DEFAULT_EXPANSION_SEARCH,
            seed: DEFAULT_SEED,
            max_level: DEFAULT_MAX_LEVEL,
        }
    }
}

impl IndexConfig {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    pub fn with_metric(mut self, metric: MetricKind) -> Self {
        self.metric = metric;
        self
    }

    /// Sets M and resets the layer-0 cap to `2 * M`.
    pub fn with_connectivity(mut self, connectivity: usize) -> Self {
        self.connectivity = connectivity;
        self.connectivity_base = connectivity.saturating_mul(2);
        self
    }

    pub fn with_expansion_add(mut self, expansion_add: usize) -> Self {
        self.expansion_add = expansion_add;
        self
    }

    pub fn with_expansion_search(mut self, expansion_search: usize) -> Self {
        self.expansion_search = expansion_search;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(IndexError::InvalidConfig("dimensions must be positive".into()));
        }
        if self.connectivity < 2 {
            return Err(IndexError::InvalidConfig(format!(
                "connectivity must be at least 2, got {}",
                self.connectivity
            )));
        }
        if self.connectivity_base < self.connectivity {
            return Err(IndexError::InvalidConfig(format!(
                "connectivity_base ({}) must not be below connectivity ({})",
                self.connectivity_base, self.connectivity
            )));
        }
        if self.expansion_add == 0 || self.expansion_search == 0 {
            return Err(IndexError::InvalidConfig("expansion widths must be positive".into()));
        }
        if self.max_level > MAX_LEVEL_LIMIT {
            return Err(IndexError::InvalidConfig(format!(
                "max_level must be at most {MAX_LEVEL_LIMIT}, got {}",
                self.max_level
            )));
        }
        Ok(())
    }

    /// mL = 1 / ln(M); layer counts decay by a factor of M per level.
    pub fn level_multiplier(&self) -> f64 {
        1.0 / (self.connectivity as f64).ln()
    }

    /// Neighbor cap for `level`.
    #[inline]
    pub fn capacity_at(&self, level: usize) -> usize {
        if level == 0 {
            self.connectivity_base
        } else {
            self.connectivity
        }
    }
}
