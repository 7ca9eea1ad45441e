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

//! SochDB SIMD Distance Layer
//!
//! Runtime-dispatched distance kernels for dense vector search.
//!
//! ## Pieces
//!
//! - **Capability detection** (`capability`): the SIMD levels the host CPU
//!   supports, probed once per process.
//! - **Kernels** (`kernels`): cosine, squared Euclidean and inner-product
//!   distance. A portable reference implementation per scalar type plus
//!   AVX2/FMA, AVX-512F and NEON variants for `f32`.
//! - **Registry** (`registry`): the `(metric, scalar, capability) -> fn` table.
//! - **Resolver** (`resolver`): picks the strongest usable kernel for a pair,
//!   once, and hands back a plain function pointer.
//!
//! ```rust,ignore
//! use sochdb_simd::{MetricKind, MetricResolver};
//!
//! let kernel = MetricResolver::global().resolve_typed::<f32>(MetricKind::Cosine)?;
//! let d = kernel.distance(&a, &b);
//! println!("cosine via {}", kernel.isa_name());
//! ```

pub mod capability;
pub mod error;
pub mod kernels;
pub mod metric;
pub mod registry;
pub mod resolver;
pub mod scalar;

pub use capability::{CapabilityLevel, CapabilitySet, detect};
pub use error::{Result, SimdError};
pub use metric::{MetricKind, ScalarKind};
pub use registry::{DistanceFn, KernelEntry, KernelFn, KernelRegistry};
pub use resolver::{MetricResolver, ResolvedKernel, TypedKernel, resolve};
pub use scalar::Scalar;

#[inline]
fn global_f32(metric: MetricKind, fallback: DistanceFn<f32>) -> DistanceFn<f32> {
    MetricResolver::global()
        .resolve_typed::<f32>(metric)
        .map(|k| k.func())
        .unwrap_or(fallback)
}

/// Cosine distance through the process-wide resolver.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    global_f32(MetricKind::Cosine, kernels::serial::cos_f32)(a, b)
}

/// Squared Euclidean distance through the process-wide resolver.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    global_f32(MetricKind::SquaredEuclidean, kernels::serial::l2sq_f32)(a, b)
}

/// `1 - a·b` through the process-wide resolver.
pub fn inner_product_distance(a: &[f32], b: &[f32]) -> f32 {
    global_f32(MetricKind::InnerProduct, kernels::serial::ip_f32)(a, b)
}
