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

//! NEON kernels.

use std::arch::aarch64::*;

use super::serial::cosine_from_parts;

#[target_feature(enable = "neon")]
unsafe fn cos_f32_neon_impl(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let chunks = n / 4;
    unsafe {
        let mut ab = vdupq_n_f32(0.0);
        let mut a2 = vdupq_n_f32(0.0);
        let mut b2 = vdupq_n_f32(0.0);
        for i in 0..chunks {
            let offset = i * 4;
            let va = vld1q_f32(a.as_ptr().add(offset));
            let vb = vld1q_f32(b.as_ptr().add(offset));
            ab = vfmaq_f32(ab, va, vb);
            a2 = vfmaq_f32(a2, va, va);
            b2 = vfmaq_f32(b2, vb, vb);
        }
        let mut sab = vaddvq_f32(ab);
        let mut sa2 = vaddvq_f32(a2);
        let mut sb2 = vaddvq_f32(b2);
        for i in chunks * 4..n {
            let (x, y) = (a[i], b[i]);
            sab += x * y;
            sa2 += x * x;
            sb2 += y * y;
        }
        cosine_from_parts(sab, sa2, sb2)
    }
}

#[target_feature(enable = "neon")]
unsafe fn l2sq_f32_neon_impl(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let chunks = n / 4;
    unsafe {
        let mut acc = vdupq_n_f32(0.0);
        for i in 0..chunks {
            let offset = i * 4;
            let va = vld1q_f32(a.as_ptr().add(offset));
            let vb = vld1q_f32(b.as_ptr().add(offset));
            let d = vsubq_f32(va, vb);
            acc = vfmaq_f32(acc, d, d);
        }
        let mut sum = vaddvq_f32(acc);
        for i in chunks * 4..n {
            let d = a[i] - b[i];
            sum += d * d;
        }
        sum
    }
}

#[target_feature(enable = "neon")]
unsafe fn dot_f32_neon_impl(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let chunks = n / 4;
    unsafe {
        let mut acc = vdupq_n_f32(0.0);
        for i in 0..chunks {
            let offset = i * 4;
            let va = vld1q_f32(a.as_ptr().add(offset));
            let vb = vld1q_f32(b.as_ptr().add(offset));
            acc = vfmaq_f32(acc, va, vb);
        }
        let mut sum = vaddvq_f32(acc);
        for i in chunks * 4..n {
            sum += a[i] * b[i];
        }
        sum
    }
}

// SAFETY: registered under CapabilityLevel::Neon only; the resolver checks
// the detected set before handing these out.

pub(crate) fn cos_f32_neon(a: &[f32], b: &[f32]) -> f32 {
    unsafe { cos_f32_neon_impl(a, b) }
}

pub(crate) fn l2sq_f32_neon(a: &[f32], b: &[f32]) -> f32 {
    unsafe { l2sq_f32_neon_impl(a, b) }
}

pub(crate) fn ip_f32_neon(a: &[f32], b: &[f32]) -> f32 {
    1.0 - unsafe { dot_f32_neon_impl(a, b) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityLevel, CapabilitySet};
    use crate::kernels::serial;

    #[test]
    fn test_neon_matches_serial() {
        if !CapabilitySet::detect().contains(CapabilityLevel::Neon) {
            return;
        }
        for dim in [1, 3, 4, 5, 784] {
            let a: Vec<f32> = (0..dim).map(|i| (i as f32 * 0.013).sin()).collect();
            let b: Vec<f32> = (0..dim).map(|i| (i as f32 * 0.029).cos()).collect();
            let tol = |x: f32, y: f32| (x - y).abs() <= 1e-4 * x.abs().max(y.abs()).max(1.0);
            assert!(tol(cos_f32_neon(&a, &b), serial::cos_f32(&a, &b)));
            assert!(tol(l2sq_f32_neon(&a, &b), serial::l2sq_f32(&a, &b)));
            assert!(tol(ip_f32_neon(&a, &b), serial::ip_f32(&a, &b)));
        }
    }
}
