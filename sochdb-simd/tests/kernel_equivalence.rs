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

//! Kernel equivalence and metric properties
//!
//! Every vectorized kernel available on the host must agree with the portable
//! one within floating-point accumulation error.

use proptest::prelude::*;
use sochdb_simd::{
    CapabilityLevel, CapabilitySet, MetricKind, MetricResolver, ScalarKind, TypedKernel,
};

/// Resolvers pinned to each level the host supports, strongest last.
fn pinned_resolvers() -> Vec<(CapabilityLevel, MetricResolver)> {
    CapabilitySet::detect()
        .iter()
        .map(|level| {
            let mask = CapabilitySet::serial().with(level);
            (level, MetricResolver::with_capabilities(mask))
        })
        .collect()
}

fn kernel(resolver: &MetricResolver, metric: MetricKind) -> TypedKernel<f32> {
    resolver.resolve_typed::<f32>(metric).unwrap()
}

fn close(x: f32, y: f32) -> bool {
    (x - y).abs() <= 1e-4 * (1.0 + x.abs().max(y.abs()))
}

fn vector_pair(max_dim: usize) -> impl Strategy<Value = (Vec<f32>, Vec<f32>)> {
    (1usize..max_dim).prop_flat_map(|dim| {
        (
            prop::collection::vec(-1.0f32..1.0, dim),
            prop::collection::vec(-1.0f32..1.0, dim),
        )
    })
}

#[test]
fn test_pinned_resolvers_pick_their_level() {
    for (level, resolver) in pinned_resolvers() {
        for metric in MetricKind::ALL {
            let k = resolver.resolve(metric, ScalarKind::F32).unwrap();
            assert_eq!(k.capability(), level, "{metric} at {level}");
        }
    }
}

#[test]
fn test_fashion_mnist_width() {
    // 784 dims, the width the benchmark dataset uses
    let a: Vec<f32> = (0..784).map(|i| ((i * 37) % 255) as f32 / 255.0).collect();
    let b: Vec<f32> = (0..784).map(|i| ((i * 91) % 255) as f32 / 255.0).collect();
    let serial = MetricResolver::serial();
    for (_, resolver) in pinned_resolvers() {
        for metric in MetricKind::ALL {
            let expected = kernel(&serial, metric).distance(&a, &b);
            let actual = kernel(&resolver, metric).distance(&a, &b);
            let rel = (expected - actual).abs() / expected.abs().max(1e-6);
            assert!(rel < 1e-4 || (expected - actual).abs() < 1e-5, "{metric}: {expected} vs {actual}");
        }
    }
}

#[test]
fn test_cosine_zero_vectors_everywhere() {
    let zero = vec![0.0f32; 37];
    let one: Vec<f32> = (0..37).map(|i| i as f32 - 18.0).collect();
    for (level, resolver) in pinned_resolvers() {
        let cos = kernel(&resolver, MetricKind::Cosine);
        assert_eq!(cos.distance(&zero, &zero), 0.0, "{level}");
        assert_eq!(cos.distance(&zero, &one), 1.0, "{level}");
        assert_eq!(cos.distance(&one, &zero), 1.0, "{level}");
    }
}

#[test]
fn test_convenience_functions() {
    let a = [1.0f32, 0.0, 0.0, 0.0];
    let b = [0.0f32, 1.0, 0.0, 0.0];
    assert!(sochdb_simd::cosine_distance(&a, &a).abs() < 1e-6);
    assert!((sochdb_simd::cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    assert_eq!(sochdb_simd::squared_euclidean(&a, &b), 2.0);
    assert!(sochdb_simd::inner_product_distance(&a, &a).abs() < 1e-6);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_vectorized_matches_serial((a, b) in vector_pair(300)) {
        let serial = MetricResolver::serial();
        for (level, resolver) in pinned_resolvers() {
            for metric in MetricKind::ALL {
                let expected = kernel(&serial, metric).distance(&a, &b);
                let actual = kernel(&resolver, metric).distance(&a, &b);
                prop_assert!(
                    close(expected, actual),
                    "{} at {}: serial {} vs {}", metric, level, expected, actual
                );
            }
        }
    }

    #[test]
    fn test_l2sq_identity_and_symmetry((a, b) in vector_pair(200)) {
        for (_, resolver) in pinned_resolvers() {
            let l2 = kernel(&resolver, MetricKind::SquaredEuclidean);
            prop_assert_eq!(l2.distance(&a, &a), 0.0);
            prop_assert_eq!(l2.distance(&a, &b), l2.distance(&b, &a));
            prop_assert!(l2.distance(&a, &b) >= 0.0);
        }
    }

    #[test]
    fn test_cosine_bounded_and_finite(
        (a, b) in vector_pair(200),
        zero_a in any::<bool>(),
    ) {
        let a = if zero_a { vec![0.0; a.len()] } else { a };
        for (_, resolver) in pinned_resolvers() {
            let cos = kernel(&resolver, MetricKind::Cosine);
            let d = cos.distance(&a, &b);
            prop_assert!(!d.is_nan());
            prop_assert!((-1e-4..=2.0 + 1e-4).contains(&d));
            prop_assert!(close(d, cos.distance(&b, &a)));
        }
    }
}
