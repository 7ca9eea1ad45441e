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

//! Binding between Rust element types and kernel families.

use std::fmt::Debug;

use crate::metric::ScalarKind;
use crate::registry::{DistanceFn, KernelFn};

/// An element type that can be stored in an index and measured by a kernel.
///
/// Implemented for `f32` and `f64`. Half-precision and int8 storage would add
/// impls here together with their kernels.
pub trait Scalar: Copy + Send + Sync + PartialEq + Debug + 'static {
    const KIND: ScalarKind;

    /// Tag a typed kernel for storage in the registry.
    fn wrap(func: DistanceFn<Self>) -> KernelFn;

    /// Recover a typed kernel; `None` if `func` was registered for another type.
    fn select(func: KernelFn) -> Option<DistanceFn<Self>>;
}

impl Scalar for f32 {
    const KIND: ScalarKind = ScalarKind::F32;

    #[inline]
    fn wrap(func: DistanceFn<Self>) -> KernelFn {
        KernelFn::F32(func)
    }

    #[inline]
    fn select(func: KernelFn) -> Option<DistanceFn<Self>> {
        match func {
            KernelFn::F32(f) => Some(f),
            _ => None,
        }
    }
}

impl Scalar for f64 {
    const KIND: ScalarKind = ScalarKind::F64;

    #[inline]
    fn wrap(func: DistanceFn<Self>) -> KernelFn {
        KernelFn::F64(func)
    }

    #[inline]
    fn select(func: KernelFn) -> Option<DistanceFn<Self>> {
        match func {
            KernelFn::F64(f) => Some(f),
            _ => None,
        }
    }
}
