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

//! Kernel registry
//!
//! A flat table of `(metric, scalar, capability) -> fn` entries. The built-in
//! table holds the portable kernels for every supported pair plus whatever
//! vectorized variants exist for the compilation target. Extension kernels
//! (e.g. quantized scalar types) are added through [`KernelRegistry::register`]
//! before the registry is handed to a resolver.

use std::fmt;

use crate::capability::CapabilityLevel;
use crate::kernels::serial;
use crate::metric::{MetricKind, ScalarKind};
use crate::scalar::Scalar;

/// Distance between two equal-length vectors. Lower is closer.
pub type DistanceFn<T> = fn(&[T], &[T]) -> f32;

/// A kernel pointer tagged with its element type.
#[derive(Clone, Copy)]
pub enum KernelFn {
    F32(DistanceFn<f32>),
    F64(DistanceFn<f64>),
}

impl KernelFn {
    pub fn scalar(&self) -> ScalarKind {
        match self {
            KernelFn::F32(_) => ScalarKind::F32,
            KernelFn::F64(_) => ScalarKind::F64,
        }
    }
}

impl PartialEq for KernelFn {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KernelFn::F32(a), KernelFn::F32(b)) => std::ptr::fn_addr_eq(*a, *b),
            (KernelFn::F64(a), KernelFn::F64(b)) => std::ptr::fn_addr_eq(*a, *b),
            _ => false,
        }
    }
}

impl Eq for KernelFn {}

impl fmt::Debug for KernelFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelFn::F32(func) => write!(f, "KernelFn::F32({:p})", *func as *const ()),
            KernelFn::F64(func) => write!(f, "KernelFn::F64({:p})", *func as *const ()),
        }
    }
}

/// One registered implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelEntry {
    metric: MetricKind,
    capability: CapabilityLevel,
    func: KernelFn,
}

impl KernelEntry {
    pub fn metric(&self) -> MetricKind {
        self.metric
    }

    pub fn scalar(&self) -> ScalarKind {
        self.func.scalar()
    }

    /// Minimum capability the host must have for this kernel to be selected.
    pub fn capability(&self) -> CapabilityLevel {
        self.capability
    }

    pub(crate) fn func(&self) -> KernelFn {
        self.func
    }
}

#[derive(Debug, Clone, Default)]
pub struct KernelRegistry {
    entries: Vec<KernelEntry>,
}

impl KernelRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every kernel compiled into this crate for the current target.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();

        registry.push_f32(MetricKind::Cosine, CapabilityLevel::Serial, serial::cos_f32);
        registry.push_f32(MetricKind::SquaredEuclidean, CapabilityLevel::Serial, serial::l2sq_f32);
        registry.push_f32(MetricKind::InnerProduct, CapabilityLevel::Serial, serial::ip_f32);

        registry.push_f64(MetricKind::Cosine, CapabilityLevel::Serial, serial::cos_f64);
        registry.push_f64(MetricKind::SquaredEuclidean, CapabilityLevel::Serial, serial::l2sq_f64);
        registry.push_f64(MetricKind::InnerProduct, CapabilityLevel::Serial, serial::ip_f64);

        #[cfg(target_arch = "x86_64")]
        {
            use crate::kernels::x86;
            registry.push_f32(MetricKind::Cosine, CapabilityLevel::Haswell, x86::cos_f32_haswell);
            registry.push_f32(MetricKind::SquaredEuclidean, CapabilityLevel::Haswell, x86::l2sq_f32_haswell);
            registry.push_f32(MetricKind::InnerProduct, CapabilityLevel::Haswell, x86::ip_f32_haswell);
            registry.push_f32(MetricKind::Cosine, CapabilityLevel::Skylake, x86::cos_f32_skylake);
            registry.push_f32(MetricKind::SquaredEuclidean, CapabilityLevel::Skylake, x86::l2sq_f32_skylake);
            registry.push_f32(MetricKind::InnerProduct, CapabilityLevel::Skylake, x86::ip_f32_skylake);
        }

        #[cfg(target_arch = "aarch64")]
        {
            use crate::kernels::aarch64;
            registry.push_f32(MetricKind::Cosine, CapabilityLevel::Neon, aarch64::cos_f32_neon);
            registry.push_f32(MetricKind::SquaredEuclidean, CapabilityLevel::Neon, aarch64::l2sq_f32_neon);
            registry.push_f32(MetricKind::InnerProduct, CapabilityLevel::Neon, aarch64::ip_f32_neon);
        }

        registry
    }

    /// Add a kernel. Among equal capability levels, the one registered last
    /// wins resolution, so this also overrides a built-in.
    pub fn register<T: Scalar>(
        &mut self,
        metric: MetricKind,
        capability: CapabilityLevel,
        func: DistanceFn<T>,
    ) -> &mut Self {
        self.entries.push(KernelEntry {
            metric,
            capability,
            func: T::wrap(func),
        });
        self
    }

    fn push_f32(&mut self, metric: MetricKind, capability: CapabilityLevel, func: DistanceFn<f32>) {
        self.register::<f32>(metric, capability, func);
    }

    fn push_f64(&mut self, metric: MetricKind, capability: CapabilityLevel, func: DistanceFn<f64>) {
        self.register::<f64>(metric, capability, func);
    }

    pub fn entries(&self) -> &[KernelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries registered for the pair, in registration order.
    pub fn candidates(
        &self,
        metric: MetricKind,
        scalar: ScalarKind,
    ) -> impl Iterator<Item = &KernelEntry> + '_ {
        self.entries
            .iter()
            .filter(move |e| e.metric == metric && e.scalar() == scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_serial_for_every_float_pair() {
        let registry = KernelRegistry::builtin();
        for metric in MetricKind::ALL {
            for scalar in [ScalarKind::F32, ScalarKind::F64] {
                assert!(
                    registry
                        .candidates(metric, scalar)
                        .any(|e| e.capability() == CapabilityLevel::Serial),
                    "missing serial {metric}/{scalar}"
                );
            }
        }
    }

    #[test]
    fn test_builtin_has_nothing_for_extension_scalars() {
        let registry = KernelRegistry::builtin();
        for metric in MetricKind::ALL {
            assert_eq!(registry.candidates(metric, ScalarKind::F16).count(), 0);
            assert_eq!(registry.candidates(metric, ScalarKind::I8).count(), 0);
        }
    }

    #[test]
    fn test_register_chains() {
        fn zero(_: &[f32], _: &[f32]) -> f32 {
            0.0
        }
        let mut registry = KernelRegistry::empty();
        assert!(registry.is_empty());
        registry
            .register::<f32>(MetricKind::Cosine, CapabilityLevel::Serial, zero)
            .register::<f32>(MetricKind::InnerProduct, CapabilityLevel::Serial, zero);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.entries()[1].metric(), MetricKind::InnerProduct);
        assert_eq!(registry.entries()[0].scalar(), ScalarKind::F32);
    }

    #[test]
    fn test_kernel_fn_equality() {
        let a = KernelFn::F32(serial::cos_f32);
        let b = KernelFn::F32(serial::cos_f32);
        let c = KernelFn::F32(serial::l2sq_f32);
        let d = KernelFn::F64(serial::cos_f64);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
