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

//! Error types for the dense index

use std::collections::TryReserveError;

use sochdb_simd::SimdError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("duplicate key: {0}")]
    DuplicateKey(u64),

    #[error("key not found: {0}")]
    KeyNotFound(u64),

    #[error(transparent)]
    UnsupportedMetric(#[from] SimdError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every addressable slot is in use.
    #[error("capacity exhausted: all {limit} slots are in use")]
    CapacityExhausted { limit: usize },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl From<TryReserveError> for IndexError {
    fn from(e: TryReserveError) -> Self {
        IndexError::ResourceExhausted(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
