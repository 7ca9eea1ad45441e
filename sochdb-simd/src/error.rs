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

//! Error types for kernel resolution

use thiserror::Error;

use crate::metric::{MetricKind, ScalarKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimdError {
    /// No kernel, not even the portable one, is registered for the pair.
    #[error("unsupported metric: no kernel registered for {metric} over {scalar}")]
    UnsupportedMetric {
        metric: MetricKind,
        scalar: ScalarKind,
    },
}

pub type Result<T> = std::result::Result<T, SimdError>;
