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

//! Kernel resolution
//!
//! Picks one concrete function pointer per `(metric, scalar)` pair: the
//! registered kernel with the strongest capability that the host actually
//! supports. Results are cached per resolver in `OnceLock`s, so the first
//! resolution of a pair publishes once and every later call is a plain load.

use std::fmt;
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::capability::{CapabilityLevel, CapabilitySet};
use crate::error::{Result, SimdError};
use crate::metric::{MetricKind, ScalarKind};
use crate::registry::{DistanceFn, KernelFn, KernelRegistry};
use crate::scalar::Scalar;

const CACHE_SLOTS: usize = MetricKind::COUNT * ScalarKind::COUNT;

/// A kernel chosen by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedKernel {
    metric: MetricKind,
    scalar: ScalarKind,
    capability: CapabilityLevel,
    func: KernelFn,
}

impl ResolvedKernel {
    pub fn metric(&self) -> MetricKind {
        self.metric
    }

    pub fn scalar(&self) -> ScalarKind {
        self.scalar
    }

    pub fn capability(&self) -> CapabilityLevel {
        self.capability
    }

    /// Name of the ISA the kernel was built for, e.g. `"haswell"` or `"serial"`.
    pub fn isa_name(&self) -> &'static str {
        self.capability.name()
    }
}

/// A resolved kernel narrowed to its element type, ready to call.
pub struct TypedKernel<T: Scalar> {
    resolved: ResolvedKernel,
    func: DistanceFn<T>,
}

impl<T: Scalar> TypedKernel<T> {
    #[inline(always)]
    pub fn distance(&self, a: &[T], b: &[T]) -> f32 {
        (self.func)(a, b)
    }

    /// The raw pointer, for hot loops that want to hoist the load.
    #[inline]
    pub fn func(&self) -> DistanceFn<T> {
        self.func
    }

    pub fn resolved(&self) -> &ResolvedKernel {
        &self.resolved
    }

    pub fn metric(&self) -> MetricKind {
        self.resolved.metric
    }

    pub fn isa_name(&self) -> &'static str {
        self.resolved.isa_name()
    }
}

impl<T: Scalar> Clone for TypedKernel<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Scalar> Copy for TypedKernel<T> {}

impl<T: Scalar> PartialEq for TypedKernel<T> {
    fn eq(&self, other: &Self) -> bool {
        self.resolved == other.resolved
    }
}

impl<T: Scalar> fmt::Debug for TypedKernel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedKernel")
            .field("metric", &self.resolved.metric)
            .field("scalar", &self.resolved.scalar)
            .field("isa", &self.resolved.isa_name())
            .finish()
    }
}

/// Selection policy.
///
/// Among kernels registered for `(metric, scalar)` whose capability is in
/// `allowed` and in the detected host set, return the strongest one. Later
/// registrations win ties. Deterministic for a fixed registry and mask.
pub fn resolve(
    registry: &KernelRegistry,
    metric: MetricKind,
    scalar: ScalarKind,
    allowed: CapabilitySet,
) -> Result<ResolvedKernel> {
    let usable = allowed.intersect(CapabilitySet::detect());
    registry
        .candidates(metric, scalar)
        .filter(|entry| usable.contains(entry.capability()))
        .max_by_key(|entry| entry.capability())
        .map(|entry| ResolvedKernel {
            metric,
            scalar,
            capability: entry.capability(),
            func: entry.func(),
        })
        .ok_or(SimdError::UnsupportedMetric { metric, scalar })
}

/// Shared resolution context.
///
/// Construct once and share, or use [`MetricResolver::global`]. The registry
/// and capability mask are fixed at construction.
pub struct MetricResolver {
    registry: KernelRegistry,
    capabilities: CapabilitySet,
    cache: [OnceLock<Result<ResolvedKernel>>; CACHE_SLOTS],
}

impl MetricResolver {
    /// Built-in kernels, every detected capability allowed.
    pub fn new() -> Self {
        Self::with_capabilities(CapabilitySet::detect())
    }

    /// Built-in kernels restricted to the portable implementations.
    pub fn serial() -> Self {
        Self::with_capabilities(CapabilitySet::serial())
    }

    pub fn with_capabilities(capabilities: CapabilitySet) -> Self {
        Self::with_registry(KernelRegistry::builtin(), capabilities)
    }

    /// Levels in `capabilities` the host lacks are ignored at resolution time.
    pub fn with_registry(registry: KernelRegistry, capabilities: CapabilitySet) -> Self {
        let detected = CapabilitySet::detect();
        if !detected.is_superset_of(capabilities) {
            warn!(
                requested = ?capabilities,
                detected = ?detected,
                "capability mask includes levels this host does not support"
            );
        }
        Self {
            registry,
            capabilities,
            cache: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    /// Process-wide resolver over the built-in registry and detected host.
    pub fn global() -> &'static MetricResolver {
        static GLOBAL: OnceLock<MetricResolver> = OnceLock::new();
        GLOBAL.get_or_init(MetricResolver::new)
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn registry(&self) -> &KernelRegistry {
        &self.registry
    }

    pub fn resolve(&self, metric: MetricKind, scalar: ScalarKind) -> Result<ResolvedKernel> {
        let slot = &self.cache[metric.index() * ScalarKind::COUNT + scalar.index()];
        slot.get_or_init(|| {
            let result = resolve(&self.registry, metric, scalar, self.capabilities);
            match &result {
                Ok(kernel) => debug!(
                    metric = %metric,
                    scalar = %scalar,
                    isa = kernel.isa_name(),
                    "resolved distance kernel"
                ),
                Err(e) => debug!(metric = %metric, scalar = %scalar, error = %e, "kernel resolution failed"),
            }
            result
        })
        .clone()
    }

    pub fn resolve_typed<T: Scalar>(&self, metric: MetricKind) -> Result<TypedKernel<T>> {
        let resolved = self.resolve(metric, T::KIND)?;
        let func = T::select(resolved.func).ok_or(SimdError::UnsupportedMetric {
            metric,
            scalar: T::KIND,
        })?;
        Ok(TypedKernel { resolved, func })
    }

    /// ISA of the kernel that `resolve` picks for the pair, if any.
    pub fn active_capability_name(&self, metric: MetricKind, scalar: ScalarKind) -> Option<&'static str> {
        self.resolve(metric, scalar).ok().map(|k| k.isa_name())
    }
}

impl Default for MetricResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricResolver")
            .field("capabilities", &self.capabilities)
            .field("kernels", &self.registry.len())
            .finish()
    }
}
