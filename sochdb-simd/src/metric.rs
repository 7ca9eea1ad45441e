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

//! Metric and scalar-type vocabulary shared by the kernel registry and the index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance function family. Lower is always closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// `1 - (a·b) / (|a|·|b|)`, with `0` when both norms are zero and `1` when one is.
    Cosine,
    /// `Σ (aᵢ - bᵢ)²`, no square root.
    SquaredEuclidean,
    /// `1 - a·b`. Ranks like cosine for unit-length inputs.
    InnerProduct,
}

impl MetricKind {
    pub const COUNT: usize = 3;
    pub const ALL: [MetricKind; Self::COUNT] = [
        MetricKind::Cosine,
        MetricKind::SquaredEuclidean,
        MetricKind::InnerProduct,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            MetricKind::Cosine => "cos",
            MetricKind::SquaredEuclidean => "l2sq",
            MetricKind::InnerProduct => "ip",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element type of stored vectors.
///
/// `F16` and `I8` are declared so configurations can name them; no built-in
/// kernels exist for them yet, so resolving either fails with
/// [`SimdError::UnsupportedMetric`](crate::SimdError::UnsupportedMetric)
/// unless a custom kernel is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    F32,
    F64,
    F16,
    I8,
}

impl ScalarKind {
    pub const COUNT: usize = 4;
    pub const ALL: [ScalarKind; Self::COUNT] =
        [ScalarKind::F32, ScalarKind::F64, ScalarKind::F16, ScalarKind::I8];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn size_bytes(self) -> usize {
        match self {
            ScalarKind::F32 => 4,
            ScalarKind::F64 => 8,
            ScalarKind::F16 => 2,
            ScalarKind::I8 => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::F16 => "f16",
            ScalarKind::I8 => "i8",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_dense() {
        for (i, m) in MetricKind::ALL.iter().enumerate() {
            assert_eq!(m.index(), i);
        }
        for (i, s) in ScalarKind::ALL.iter().enumerate() {
            assert_eq!(s.index(), i);
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(MetricKind::Cosine.to_string(), "cos");
        assert_eq!(MetricKind::SquaredEuclidean.to_string(), "l2sq");
        assert_eq!(ScalarKind::F64.to_string(), "f64");
        assert_eq!(ScalarKind::F16.size_bytes(), 2);
    }
}
