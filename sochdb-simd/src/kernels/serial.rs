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

//! Portable reference kernels.
//!
//! Plain sequential accumulation, so a given input always produces the same
//! bits. Every vectorized kernel is tested against these.

/// Final cosine step shared by every f32 kernel.
///
/// A zero norm on one side gives `1`, on both sides gives `0`. Dividing through
/// would yield NaN instead.
#[inline(always)]
pub fn cosine_from_parts(ab: f32, a2: f32, b2: f32) -> f32 {
    match (a2 == 0.0, b2 == 0.0) {
        (true, true) => 0.0,
        (true, false) | (false, true) => 1.0,
        (false, false) => 1.0 - ab / (a2.sqrt() * b2.sqrt()),
    }
}

#[inline(always)]
fn cosine_from_parts_f64(ab: f64, a2: f64, b2: f64) -> f64 {
    match (a2 == 0.0, b2 == 0.0) {
        (true, true) => 0.0,
        (true, false) | (false, true) => 1.0,
        (false, false) => 1.0 - ab / (a2.sqrt() * b2.sqrt()),
    }
}

pub fn cos_f32(a: &[f32], b: &[f32]) -> f32 {
    let mut ab = 0.0f32;
    let mut a2 = 0.0f32;
    let mut b2 = 0.0f32;
    for (&x, &y) in a.iter().zip(b) {
        ab += x * y;
        a2 += x * x;
        b2 += y * y;
    }
    cosine_from_parts(ab, a2, b2)
}

pub fn l2sq_f32(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for (&x, &y) in a.iter().zip(b) {
        let d = x - y;
        sum += d * d;
    }
    sum
}

pub fn ip_f32(a: &[f32], b: &[f32]) -> f32 {
    1.0 - dot_f32(a, b)
}

#[inline]
pub fn dot_f32(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for (&x, &y) in a.iter().zip(b) {
        sum += x * y;
    }
    sum
}

pub fn cos_f64(a: &[f64], b: &[f64]) -> f32 {
    let mut ab = 0.0f64;
    let mut a2 = 0.0f64;
    let mut b2 = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        ab += x * y;
        a2 += x * x;
        b2 += y * y;
    }
    cosine_from_parts_f64(ab, a2, b2) as f32
}

pub fn l2sq_f64(a: &[f64], b: &[f64]) -> f32 {
    let mut sum = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let d = x - y;
        sum += d * d;
    }
    sum as f32
}

pub fn ip_f64(a: &[f64], b: &[f64]) -> f32 {
    let mut dot = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        dot += x * y;
    }
    (1.0 - dot) as f32
}
