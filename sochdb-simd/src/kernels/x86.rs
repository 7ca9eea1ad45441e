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

//! AVX2+FMA (Haswell) and AVX-512F (Skylake) kernels.

use std::arch::x86_64::*;

use super::serial::cosine_from_parts;

// ============================================================================
// Haswell
// ============================================================================

#[inline]
#[target_feature(enable = "avx2,fma")]
fn hsum256(v: __m256) -> f32 {
    let hi = _mm256_extractf128_ps(v, 1);
    let lo = _mm256_castps256_ps128(v);
    let sum4 = _mm_add_ps(lo, hi);
    let sum2 = _mm_add_ps(sum4, _mm_movehl_ps(sum4, sum4));
    let sum1 = _mm_add_ss(sum2, _mm_shuffle_ps(sum2, sum2, 1));
    _mm_cvtss_f32(sum1)
}

#[target_feature(enable = "avx2,fma")]
unsafe fn cos_f32_avx2(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let chunks = n / 8;
    unsafe {
        let mut ab = _mm256_setzero_ps();
        let mut a2 = _mm256_setzero_ps();
        let mut b2 = _mm256_setzero_ps();
        for i in 0..chunks {
            let offset = i * 8;
            let va = _mm256_loadu_ps(a.as_ptr().add(offset));
            let vb = _mm256_loadu_ps(b.as_ptr().add(offset));
            ab = _mm256_fmadd_ps(va, vb, ab);
            a2 = _mm256_fmadd_ps(va, va, a2);
            b2 = _mm256_fmadd_ps(vb, vb, b2);
        }
        let mut sab = hsum256(ab);
        let mut sa2 = hsum256(a2);
        let mut sb2 = hsum256(b2);
        for i in chunks * 8..n {
            let (x, y) = (a[i], b[i]);
            sab += x * y;
            sa2 += x * x;
            sb2 += y * y;
        }
        cosine_from_parts(sab, sa2, sb2)
    }
}

#[target_feature(enable = "avx2,fma")]
unsafe fn l2sq_f32_avx2(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let chunks = n / 8;
    unsafe {
        let mut acc = _mm256_setzero_ps();
        for i in 0..chunks {
            let offset = i * 8;
            let va = _mm256_loadu_ps(a.as_ptr().add(offset));
            let vb = _mm256_loadu_ps(b.as_ptr().add(offset));
            let d = _mm256_sub_ps(va, vb);
            acc = _mm256_fmadd_ps(d, d, acc);
        }
        let mut sum = hsum256(acc);
        for i in chunks * 8..n {
            let d = a[i] - b[i];
            sum += d * d;
        }
        sum
    }
}

#[target_feature(enable = "avx2,fma")]
unsafe fn dot_f32_avx2(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let chunks = n / 8;
    unsafe {
        let mut acc = _mm256_setzero_ps();
        for i in 0..chunks {
            let offset = i * 8;
            let va = _mm256_loadu_ps(a.as_ptr().add(offset));
            let vb = _mm256_loadu_ps(b.as_ptr().add(offset));
            acc = _mm256_fmadd_ps(va, vb, acc);
        }
        let mut sum = hsum256(acc);
        for i in chunks * 8..n {
            sum += a[i] * b[i];
        }
        sum
    }
}

// ============================================================================
// Skylake
// ============================================================================

/// Lanes `0..rem` set; `rem` is always below 16.
#[inline(always)]
fn tail_mask(rem: usize) -> __mmask16 {
    ((1u32 << rem) - 1) as __mmask16
}

#[target_feature(enable = "avx512f")]
unsafe fn cos_f32_avx512(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    unsafe {
        let mut ab = _mm512_setzero_ps();
        let mut a2 = _mm512_setzero_ps();
        let mut b2 = _mm512_setzero_ps();
        let mut i = 0;
        while i + 16 <= n {
            let va = _mm512_loadu_ps(a.as_ptr().add(i));
            let vb = _mm512_loadu_ps(b.as_ptr().add(i));
            ab = _mm512_fmadd_ps(va, vb, ab);
            a2 = _mm512_fmadd_ps(va, va, a2);
            b2 = _mm512_fmadd_ps(vb, vb, b2);
            i += 16;
        }
        if i < n {
            let mask = tail_mask(n - i);
            let va = _mm512_maskz_loadu_ps(mask, a.as_ptr().add(i));
            let vb = _mm512_maskz_loadu_ps(mask, b.as_ptr().add(i));
            ab = _mm512_fmadd_ps(va, vb, ab);
            a2 = _mm512_fmadd_ps(va, va, a2);
            b2 = _mm512_fmadd_ps(vb, vb, b2);
        }
        cosine_from_parts(
            _mm512_reduce_add_ps(ab),
            _mm512_reduce_add_ps(a2),
            _mm512_reduce_add_ps(b2),
        )
    }
}

#[target_feature(enable = "avx512f")]
unsafe fn l2sq_f32_avx512(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    unsafe {
        let mut acc = _mm512_setzero_ps();
        let mut i = 0;
        while i + 16 <= n {
            let va = _mm512_loadu_ps(a.as_ptr().add(i));
            let vb = _mm512_loadu_ps(b.as_ptr().add(i));
            let d = _mm512_sub_ps(va, vb);
            acc = _mm512_fmadd_ps(d, d, acc);
            i += 16;
        }
        if i < n {
            let mask = tail_mask(n - i);
            let va = _mm512_maskz_loadu_ps(mask, a.as_ptr().add(i));
            let vb = _mm512_maskz_loadu_ps(mask, b.as_ptr().add(i));
            let d = _mm512_sub_ps(va, vb);
            acc = _mm512_fmadd_ps(d, d, acc);
        }
        _mm512_reduce_add_ps(acc)
    }
}

#[target_feature(enable = "avx512f")]
unsafe fn dot_f32_avx512(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    unsafe {
        let mut acc = _mm512_setzero_ps();
        let mut i = 0;
        while i + 16 <= n {
            let va = _mm512_loadu_ps(a.as_ptr().add(i));
            let vb = _mm512_loadu_ps(b.as_ptr().add(i));
            acc = _mm512_fmadd_ps(va, vb, acc);
            i += 16;
        }
        if i < n {
            let mask = tail_mask(n - i);
            let va = _mm512_maskz_loadu_ps(mask, a.as_ptr().add(i));
            let vb = _mm512_maskz_loadu_ps(mask, b.as_ptr().add(i));
            acc = _mm512_fmadd_ps(va, vb, acc);
        }
        _mm512_reduce_add_ps(acc)
    }
}

// ============================================================================
// Safe entry points
//
// SAFETY (all below): the registry files these under Haswell / Skylake only,
// and the resolver never selects a level missing from `CapabilitySet::detect()`.
// ============================================================================

pub(crate) fn cos_f32_haswell(a: &[f32], b: &[f32]) -> f32 {
    unsafe { cos_f32_avx2(a, b) }
}

pub(crate) fn l2sq_f32_haswell(a: &[f32], b: &[f32]) -> f32 {
    unsafe { l2sq_f32_avx2(a, b) }
}

pub(crate) fn ip_f32_haswell(a: &[f32], b: &[f32]) -> f32 {
    1.0 - unsafe { dot_f32_avx2(a, b) }
}

pub(crate) fn cos_f32_skylake(a: &[f32], b: &[f32]) -> f32 {
    unsafe { cos_f32_avx512(a, b) }
}

pub(crate) fn l2sq_f32_skylake(a: &[f32], b: &[f32]) -> f32 {
    unsafe { l2sq_f32_avx512(a, b) }
}

pub(crate) fn ip_f32_skylake(a: &[f32], b: &[f32]) -> f32 {
    1.0 - unsafe { dot_f32_avx512(a, b) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityLevel, CapabilitySet};
    use crate::kernels::serial;

    fn vectors(dim: usize) -> (Vec<f32>, Vec<f32>) {
        let a = (0..dim).map(|i| (i as f32 * 0.013).sin()).collect();
        let b = (0..dim).map(|i| (i as f32 * 0.029).cos()).collect();
        (a, b)
    }

    fn close(x: f32, y: f32) -> bool {
        (x - y).abs() <= 1e-4 * x.abs().max(y.abs()).max(1.0)
    }

    #[test]
    fn test_haswell_matches_serial() {
        if !CapabilitySet::detect().contains(CapabilityLevel::Haswell) {
            return;
        }
        // 784 covers whole chunks, the others exercise the tail
        for dim in [1, 7, 8, 9, 31, 784] {
            let (a, b) = vectors(dim);
            assert!(close(cos_f32_haswell(&a, &b), serial::cos_f32(&a, &b)));
            assert!(close(l2sq_f32_haswell(&a, &b), serial::l2sq_f32(&a, &b)));
            assert!(close(ip_f32_haswell(&a, &b), serial::ip_f32(&a, &b)));
        }
    }

    #[test]
    fn test_skylake_matches_serial() {
        if !CapabilitySet::detect().contains(CapabilityLevel::Skylake) {
            return;
        }
        for dim in [1, 15, 16, 17, 100, 784] {
            let (a, b) = vectors(dim);
            assert!(close(cos_f32_skylake(&a, &b), serial::cos_f32(&a, &b)));
            assert!(close(l2sq_f32_skylake(&a, &b), serial::l2sq_f32(&a, &b)));
            assert!(close(ip_f32_skylake(&a, &b), serial::ip_f32(&a, &b)));
        }
    }

    #[test]
    fn test_zero_norms_vectorized() {
        if !CapabilitySet::detect().contains(CapabilityLevel::Haswell) {
            return;
        }
        let zero = vec![0.0f32; 20];
        let one: Vec<f32> = (0..20).map(|i| i as f32).collect();
        assert_eq!(cos_f32_haswell(&zero, &zero), 0.0);
        assert_eq!(cos_f32_haswell(&zero, &one), 1.0);
    }
}
